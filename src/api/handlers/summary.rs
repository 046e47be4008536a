//! Top-sales summary trigger.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::SummaryResponse;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, RelayError};

/// `GET|POST /topsales` — Post the trailing-window top sales.
///
/// # Errors
///
/// Returns [`RelayError`] if the ledger is unavailable or the sink rejects
/// the summary.
#[utoipa::path(
    get,
    path = "/api/v1/topsales",
    tag = "Summary",
    summary = "Post top sales",
    description = "Ranks the collection's sales in the trailing window by price and posts one summary. An empty window posts nothing.",
    responses(
        (status = 200, description = "Summary handled", body = SummaryResponse),
        (status = 500, description = "Ledger unavailable", body = ErrorResponse),
        (status = 502, description = "Sink rejected the summary", body = ErrorResponse),
    )
)]
pub async fn top_sales(State(state): State<AppState>) -> Result<Json<SummaryResponse>, RelayError> {
    let outcome = state.aggregator.run().await?;
    Ok(Json(outcome.into()))
}

/// Summary routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/topsales", get(top_sales).post(top_sales))
}
