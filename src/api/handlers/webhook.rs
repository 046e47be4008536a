//! Push-mode handler.

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::BatchReportResponse;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, RelayError};

/// `POST /webhook` — Announce the sale carried by a webhook delivery.
///
/// # Errors
///
/// Returns [`RelayError`] if the body has no signature, the transaction is
/// not a sale, or a collaborator fails.
#[utoipa::path(
    post,
    path = "/api/v1/webhook",
    tag = "Feed",
    summary = "Webhook delivery",
    description = "Takes a JSON array whose first element carries a transaction signature, fetches the parsed transaction and announces it if it is a new sale.",
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Delivery handled", body = BatchReportResponse),
        (status = 400, description = "No signature or not a sale", body = ErrorResponse),
        (status = 405, description = "Method other than POST"),
        (status = 500, description = "Parser, ledger or metadata failure", body = ErrorResponse),
    )
)]
pub async fn webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<BatchReportResponse>, RelayError> {
    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| RelayError::FeedFormat(format!("body is not JSON: {e}")))?;
    let report = state.relay.handle_webhook(&value).await?;
    Ok(Json(report.into()))
}

/// Webhook routes. Other methods get 405 from the router.
pub fn routes() -> Router<AppState> {
    Router::new().route("/webhook", post(webhook))
}
