//! Webhook ingress.
//!
//! Helius POSTs either one transaction object or an array of up to ~100.
//! The handler validates, detaches one pipeline task per valid element
//! and acknowledges immediately; processing never blocks the response.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::events::WebhookPayload;
use crate::logger::{self, LogTag};
use crate::webserver::state::AppState;

/// Outcome of validating one batch, before any task is spawned.
pub struct BatchTriage {
    pub accepted: Vec<WebhookPayload>,
    pub skipped: usize,
    pub total: usize,
}

/// Split a top-level body into elements and validate each. An element is
/// accepted only when it deserializes and carries both `signature` and
/// `timestamp`.
pub fn triage_batch(body: Value) -> BatchTriage {
    let elements = match body {
        Value::Array(elements) => elements,
        single => vec![single],
    };
    let total = elements.len();

    let mut accepted = Vec::new();
    let mut skipped = 0usize;
    for element in elements {
        match serde_json::from_value::<WebhookPayload>(element) {
            Ok(payload) if payload.is_well_formed() => accepted.push(payload),
            Ok(payload) => {
                skipped += 1;
                logger::warning(
                    LogTag::Webhook,
                    &format!(
                        "Dropping payload without identity fields (signature={:?})",
                        payload.signature
                    ),
                );
            }
            Err(e) => {
                skipped += 1;
                logger::warning(LogTag::Webhook, &format!("Undecodable payload: {}", e));
            }
        }
    }

    BatchTriage {
        accepted,
        skipped,
        total,
    }
}

/// `POST /webhook`
pub async fn handle_webhook(State(state): State<Arc<AppState>>, body: String) -> Response {
    let json_body: Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => {
            logger::warning(LogTag::Webhook, &format!("Malformed request body: {}", e));
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "body is not valid JSON"})),
            )
                .into_response();
        }
    };

    let triage = triage_batch(json_body);
    let processed = triage.accepted.len();

    for payload in triage.accepted {
        let engine = state.engine.clone();
        // Detached: a panic or slow price fetch in one task never touches
        // the ingress loop or its siblings.
        state.pipeline_tasks.spawn(async move {
            engine.process_payload(payload).await;
        });
    }

    logger::info(
        LogTag::Webhook,
        &format!(
            "Batch accepted: processed={} skipped={} total={}",
            processed, triage.skipped, triage.total
        ),
    );

    Json(json!({
        "processed": processed,
        "skipped": triage.skipped,
        "total": triage.total,
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_object_counts_as_batch_of_one() {
        let triage = triage_batch(json!({
            "signature": "s1",
            "timestamp": 1_700_000_000i64,
            "feePayer": "W1",
            "tokenTransfers": []
        }));
        assert_eq!(triage.total, 1);
        assert_eq!(triage.accepted.len(), 1);
        assert_eq!(triage.skipped, 0);
    }

    #[test]
    fn mixed_batch_counts_valid_and_skipped() {
        let triage = triage_batch(json!([
            {"signature": "s1", "timestamp": 1i64},
            {"signature": "s2", "timestamp": 2i64},
            {"timestamp": 3i64}
        ]));
        assert_eq!(triage.total, 3);
        assert_eq!(triage.accepted.len(), 2);
        assert_eq!(triage.skipped, 1);
    }

    #[test]
    fn missing_timestamp_is_skipped() {
        let triage = triage_batch(json!([{"signature": "s1"}]));
        assert_eq!(triage.skipped, 1);
        assert!(triage.accepted.is_empty());
    }

    #[test]
    fn non_object_elements_are_skipped() {
        let triage = triage_batch(json!(["just a string", 42]));
        assert_eq!(triage.total, 2);
        assert_eq!(triage.skipped, 2);
    }

    #[test]
    fn empty_signature_is_skipped() {
        let triage = triage_batch(json!([{"signature": "", "timestamp": 1i64}]));
        assert_eq!(triage.skipped, 1);
    }
}
