//! Poll-mode handlers: sales (`/activity`) and listings (`/listings`).

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{BatchReportResponse, FeedQuery};
use crate::app_state::AppState;
use crate::domain::EventKind;
use crate::error::{ErrorResponse, RelayError};
use crate::upstream::activity_feed::expect_array;

/// Parses a request body as an activity page.
///
/// # Errors
///
/// Returns [`RelayError::FeedFormat`] if the body is not a JSON array.
pub fn body_as_page(body: &[u8]) -> Result<Vec<serde_json::Value>, RelayError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| RelayError::FeedFormat(format!("body is not JSON: {e}")))?;
    expect_array(value)
}

async fn run_feed(
    state: &AppState,
    query: &FeedQuery,
    body: &[u8],
    kind: EventKind,
) -> Result<BatchReportResponse, RelayError> {
    let report = if query.test {
        let records = body_as_page(body)?;
        tracing::info!(kind = %kind, records = records.len(), "processing supplied test page");
        state.relay.process_batch(&records, kind).await?
    } else {
        match kind {
            EventKind::Sale => state.relay.poll_sales().await?,
            EventKind::Listing => state.relay.poll_listings().await?,
        }
    };
    Ok(report.into())
}

/// `GET|POST /activity` — Announce new sales from the latest feed page.
///
/// # Errors
///
/// Returns [`RelayError`] on malformed input or infrastructure failure.
#[utoipa::path(
    get,
    path = "/api/v1/activity",
    tag = "Feed",
    summary = "Poll sales",
    description = "Fetches the latest activity page (or uses the request body with `?test=true`) and announces sales not yet in the ledger.",
    params(FeedQuery),
    request_body(content = serde_json::Value, description = "Activity page, read only with `?test=true`"),
    responses(
        (status = 200, description = "Batch handled", body = BatchReportResponse),
        (status = 400, description = "Malformed feed", body = ErrorResponse),
        (status = 500, description = "Ledger or upstream failure", body = ErrorResponse),
    )
)]
pub async fn activity(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
    body: Bytes,
) -> Result<Json<BatchReportResponse>, RelayError> {
    run_feed(&state, &query, &body, EventKind::Sale).await.map(Json)
}

/// `GET|POST /listings` — Announce new listings from the latest feed page.
///
/// # Errors
///
/// Returns [`RelayError`] on malformed input or infrastructure failure.
#[utoipa::path(
    get,
    path = "/api/v1/listings",
    tag = "Feed",
    summary = "Poll listings",
    description = "Fetches the latest activity page (or uses the request body with `?test=true`) and announces listings not yet in the ledger.",
    params(FeedQuery),
    request_body(content = serde_json::Value, description = "Activity page, read only with `?test=true`"),
    responses(
        (status = 200, description = "Batch handled", body = BatchReportResponse),
        (status = 400, description = "Malformed feed", body = ErrorResponse),
        (status = 500, description = "Ledger or upstream failure", body = ErrorResponse),
    )
)]
pub async fn listings(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
    body: Bytes,
) -> Result<Json<BatchReportResponse>, RelayError> {
    run_feed(&state, &query, &body, EventKind::Listing).await.map(Json)
}

/// Poll routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/activity", get(activity).post(activity))
        .route("/listings", get(listings).post(listings))
}
