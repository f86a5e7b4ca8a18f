//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use coprocessor_gate::limiter::{
    InMemoryLimiter, LimiterError, RateLimitResponse, RateLimiter, SlidingWindow,
};
use coprocessor_gate::{
    AdmissionGate, ClientIdentifier, RequestEnvelope, RequestGatekeeper, StageDispatcher,
};

/// In-memory store that records every consumption attempt.
pub struct RecordingLimiter {
    inner: InMemoryLimiter,
    calls: Mutex<Vec<(String, u64)>>,
}

impl RecordingLimiter {
    pub fn new(max_requests: u64) -> Self {
        Self {
            // Long window so tests never straddle a window boundary.
            inner: InMemoryLimiter::new(SlidingWindow::new(
                max_requests,
                Duration::from_secs(3600),
            )),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, u64)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl RateLimiter for RecordingLimiter {
    async fn limit(&self, key: &str, cost: u64) -> Result<RateLimitResponse, LimiterError> {
        self.calls.lock().push((key.to_string(), cost));
        self.inner.limit(key, cost).await
    }
}

/// Builds a dispatcher over `limiter` with the default header name.
pub fn dispatcher(limiter: Arc<RecordingLimiter>) -> StageDispatcher {
    StageDispatcher::new(RequestGatekeeper::new(
        ClientIdentifier::default(),
        AdmissionGate::new(limiter),
    ))
}

/// Parses a JSON literal into an envelope.
pub fn envelope(value: Value) -> RequestEnvelope {
    serde_json::from_value(value).expect("valid envelope")
}

/// Admission-stage envelope identified through the fallback header.
pub fn with_header(client: &str) -> RequestEnvelope {
    envelope(json!({
        "stage": "SupergraphRequest",
        "context": { "entries": {} },
        "headers": { "apollographql-client-name": [client] },
        "body": {}
    }))
}
