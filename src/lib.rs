//! Client identification and rate limiting for a GraphQL router.
//!
//! This crate implements an external coprocessor. The router posts an
//! envelope for each request; at the `SupergraphRequest` stage the gate:
//! - **Bypasses** introspection queries entirely
//! - **Identifies** the client from the telemetry context or a header
//! - **Rejects** unidentified requests with 400 before any quota is spent
//! - **Throttles** clients over their sliding window with 429
//!
//! Refusals are written into the envelope (`control.break` plus a GraphQL
//! error in `body.errors`); the router turns them into the HTTP response.
//!
//! # Core Types
//!
//! - [`RequestEnvelope`]: the unit of work exchanged with the router
//! - [`ClientIdentifier`]: resolves a [`ClientIdentity`] from an envelope
//! - [`AdmissionGate`]: asks a [`limiter::RateLimiter`] for an [`AdmissionDecision`]
//! - [`RequestGatekeeper`]: runs the admission sequence and shapes the envelope
//! - [`StageDispatcher`]: routes envelopes by [`Stage`]
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use coprocessor_gate::{
//!     AdmissionGate, ClientIdentifier, RequestEnvelope, RequestGatekeeper, Stage,
//!     StageDispatcher,
//! };
//! use coprocessor_gate::limiter::{InMemoryLimiter, SlidingWindow};
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let gate = AdmissionGate::new(Arc::new(InMemoryLimiter::new(SlidingWindow::default())));
//! let dispatcher =
//!     StageDispatcher::new(RequestGatekeeper::new(ClientIdentifier::default(), gate));
//!
//! // No client name anywhere: refused before the rate limiter is consulted.
//! let envelope = dispatcher
//!     .dispatch(RequestEnvelope::new(Stage::SupergraphRequest))
//!     .await
//!     .unwrap();
//! assert_eq!(envelope.break_status(), Some(400));
//! # });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
mod dispatch;
pub mod envelope;
mod error;
mod gate;
pub mod gatekeeper;
pub mod graphql;
mod identity;
pub mod limiter;
pub mod logging;
mod secret;
pub mod web;

pub use config::{GateConfig, LimiterBackend, StoreFailurePolicy};
pub use dispatch::StageDispatcher;
pub use envelope::{Control, RequestEnvelope, Stage};
pub use error::{ConfigError, Error, RejectionKind};
pub use gate::{AdmissionDecision, AdmissionGate, RateLimitInfo};
pub use gatekeeper::{GateOutcome, RequestGatekeeper, INTROSPECTION_OPERATION};
pub use identity::{
    operation_name, ClientIdentifier, ClientIdentity, CONTEXT_CLIENT_NAME_KEY,
    CONTEXT_OPERATION_NAME_KEY, DEFAULT_CLIENT_NAME_HEADER,
};
pub use secret::Secret;
