/// Route aggregation module
///
/// Combines all route modules into the main API router
pub mod admin;
pub mod status;
pub mod webhook;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::webserver::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(webhook::handle_webhook))
        .route("/health", get(status::health))
        .route("/stats/price", get(status::price))
        .route("/test/notifications", post(status::test_notifications))
        .route("/admin/webhooks", get(admin::list).post(admin::create))
        .route(
            "/admin/webhooks/:id",
            get(admin::get_one).put(admin::update).delete(admin::delete),
        )
        .route(
            "/admin/webhooks/:id/wallets",
            post(admin::add_wallets).delete(admin::remove_wallets),
        )
        .with_state(state)
}
