//! REST endpoint handlers organized by trigger.

pub mod feed;
pub mod summary;
pub mod system;
pub mod webhook;

use axum::Router;

use crate::app_state::AppState;

/// Composes all trigger routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(feed::routes())
        .merge(webhook::routes())
        .merge(summary::routes())
}
