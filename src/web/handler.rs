use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::envelope::{RequestEnvelope, Stage};
use crate::error::Error;

use super::AppState;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Limiter(_) => StatusCode::BAD_GATEWAY,
            Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// `POST /`: runs one envelope through the dispatcher.
///
/// The stage is read from the raw JSON first, so envelopes the dispatcher
/// does not handle are echoed without being modelled at all. Envelopes the
/// gate leaves untouched are echoed the same way.
pub(super) async fn handle_envelope(State(state): State<AppState>, body: Bytes) -> Response {
    let raw: Value = match serde_json::from_slice(&body) {
        Ok(raw) => raw,
        Err(err) => return malformed(&err),
    };

    let stage = raw
        .get("stage")
        .and_then(Value::as_str)
        .map(|tag| Stage::from(tag.to_string()));
    if !state.dispatcher.handles(stage.as_ref()) {
        return echo(body);
    }

    let envelope: RequestEnvelope = match serde_json::from_value(raw) {
        Ok(envelope) => envelope,
        Err(err) => return malformed(&err),
    };
    let received = envelope.clone();

    match state.dispatcher.dispatch(envelope).await {
        Ok(envelope) if envelope == received => echo(body),
        Ok(envelope) => Json(envelope).into_response(),
        Err(err) => err.into_response(),
    }
}

fn echo(body: Bytes) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

fn malformed(err: &serde_json::Error) -> Response {
    tracing::warn!(error = %err, "rejecting malformed envelope");
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": format!("malformed envelope: {err}") })),
    )
        .into_response()
}

/// `GET /health`: liveness probe.
pub(super) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
