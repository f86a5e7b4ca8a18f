//! HTTP boundary between the router and the gate.
//!
//! The router posts every envelope to `POST /` and reads the (possibly
//! modified) envelope from the response body. This module only maps HTTP to
//! envelopes and errors to statuses; all decisions happen in
//! [`StageDispatcher`].
//!
//! | Situation | Response |
//! |---|---|
//! | stage without a handler, or a non-string `stage` | request bytes echoed unchanged, 200 |
//! | handled stage, admitted or bypassed | request bytes echoed unchanged, 200 |
//! | handled stage, refused | envelope JSON, 200 (refusal lives in `control`) |
//! | body is not JSON | 400 `{"error": ...}` |
//! | counter store failure under the `error` policy | 502 `{"error": ...}` |
//! | whole request exceeds the timeout | 408 |

mod handler;
mod server;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::dispatch::StageDispatcher;

pub use server::{serve, shutdown_signal};

/// Shared state of the HTTP handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    dispatcher: Arc<StageDispatcher>,
}

impl AppState {
    /// Wraps a dispatcher for sharing across connections.
    pub fn new(dispatcher: StageDispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }
}

/// Builds the coprocessor router.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", post(handler::handle_envelope))
        .route("/health", get(handler::health))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
