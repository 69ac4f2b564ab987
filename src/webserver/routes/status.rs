//! Health, price and test-notification endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::sync::Arc;

use crate::global;
use crate::logger::{self, LogTag};
use crate::webserver::state::AppState;

/// `GET /health` - 200 while the window-store backend answers a ping,
/// 503 otherwise. The body always reports the configured thresholds.
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let store_ok = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            logger::error(LogTag::Webserver, &format!("Window-store ping failed: {}", e));
            false
        }
    };

    let wallet_count = state.db.wallet_count().unwrap_or(0);
    let subscriber_count = state.db.subscriber_count().unwrap_or(0);

    let body = Json(json!({
        "status": if store_ok { "ok" } else { "degraded" },
        "uptime_seconds": global::uptime_seconds(),
        "token_mint": state.config.token.mint,
        "thresholds": {
            "chat_usd": state.config.alerts.chat_threshold_usd,
            "single_usd": state.config.alerts.single_threshold_usd,
            "cumulative_usd": state.config.alerts.cumulative_threshold_usd,
            "window_seconds": state.config.alerts.window_seconds,
            "five_sells_usd": state.config.alerts.five_sells_threshold_usd,
        },
        "tracked_wallets": wallet_count,
        "push_subscribers": subscriber_count,
    }));

    if store_ok {
        (StatusCode::OK, body).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, body).into_response()
    }
}

/// `GET /stats/price` - current USD price of the target token, or 404
/// when no quote is available.
pub async fn price(State(state): State<Arc<AppState>>) -> Response {
    match state.oracle.price_usd(&state.config.token.mint).await {
        Some(price_usd) => Json(json!({
            "mint": state.config.token.mint,
            "label": state.config.token.label,
            "price_usd": price_usd,
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "no price available"})),
        )
            .into_response(),
    }
}

/// `POST /test/notifications` - canned message over each channel.
pub async fn test_notifications(State(state): State<Arc<AppState>>) -> Response {
    let (chat_ok, push_ok) = state.dispatcher.send_test_messages().await;
    Json(json!({
        "chat": chat_ok,
        "push": push_ok,
    }))
    .into_response()
}
