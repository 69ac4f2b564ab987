//! Admin endpoints for Helius webhook provisioning.
//!
//! These proxy to the upstream provider and never touch the pipeline.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::logger::{self, LogTag};
use crate::webserver::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WalletListBody {
    #[serde(default)]
    pub wallets: Vec<String>,
}

fn upstream_error(e: anyhow::Error) -> Response {
    logger::error(LogTag::Helius, &format!("Provisioning call failed: {}", e));
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({"error": e.to_string()})),
    )
        .into_response()
}

/// `GET /admin/webhooks`
pub async fn list(State(state): State<Arc<AppState>>) -> Response {
    match state.helius.list_webhooks().await {
        Ok(body) => Json(body).into_response(),
        Err(e) => upstream_error(e),
    }
}

/// `POST /admin/webhooks` - create a webhook watching the tracked set.
pub async fn create(State(state): State<Arc<AppState>>) -> Response {
    let wallets: Vec<String> = match state.db.list_wallets(0, 10_000) {
        Ok(wallets) => wallets.into_iter().map(|w| w.address).collect(),
        Err(e) => return upstream_error(e),
    };
    match state.helius.create_webhook(&wallets).await {
        Ok(body) => Json(body).into_response(),
        Err(e) => upstream_error(e),
    }
}

/// `GET /admin/webhooks/:id`
pub async fn get_one(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.helius.get_webhook(&id).await {
        Ok(body) => Json(body).into_response(),
        Err(e) => upstream_error(e),
    }
}

/// `PUT /admin/webhooks/:id` - replace the watched address list.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<WalletListBody>,
) -> Response {
    match state.helius.edit_webhook(&id, &body.wallets).await {
        Ok(body) => Json(body).into_response(),
        Err(e) => upstream_error(e),
    }
}

/// `DELETE /admin/webhooks/:id`
pub async fn delete(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.helius.delete_webhook(&id).await {
        Ok(body) => Json(body).into_response(),
        Err(e) => upstream_error(e),
    }
}

/// `POST /admin/webhooks/:id/wallets`
pub async fn add_wallets(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<WalletListBody>,
) -> Response {
    match state.helius.add_wallets(&id, &body.wallets).await {
        Ok(body) => Json(body).into_response(),
        Err(e) => upstream_error(e),
    }
}

/// `DELETE /admin/webhooks/:id/wallets`
pub async fn remove_wallets(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<WalletListBody>,
) -> Response {
    match state.helius.remove_wallets(&id, &body.wallets).await {
        Ok(body) => Json(body).into_response(),
        Err(e) => upstream_error(e),
    }
}
