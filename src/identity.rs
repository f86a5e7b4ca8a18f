//! Client and operation identification.
//!
//! The client name is resolved from the router's telemetry context first and
//! from a request header second. Both readers are pure functions of the
//! envelope.

use std::fmt;

use crate::envelope::RequestEnvelope;

/// Context key under which the router stores the telemetry client name.
///
/// This is fixed by the router and cannot be configured.
pub const CONTEXT_CLIENT_NAME_KEY: &str = "apollo_telemetry::client_name";

/// Context key under which the router stores the GraphQL operation name.
pub const CONTEXT_OPERATION_NAME_KEY: &str = "operation_name";

/// Header used as the identity fallback unless configured otherwise.
pub const DEFAULT_CLIENT_NAME_HEADER: &str = "apollographql-client-name";

/// Name of a calling client.
///
/// Derived per request and never cached. It is also the rate-limit key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Wraps a client name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the client name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves the calling client from an envelope.
///
/// # Examples
///
/// ```
/// use coprocessor_gate::{ClientIdentifier, RequestEnvelope, Stage};
///
/// let mut envelope = RequestEnvelope::new(Stage::SupergraphRequest);
/// envelope.headers = Some(
///     [("apollographql-client-name".to_string(), vec!["web-client".to_string()])]
///         .into_iter()
///         .collect(),
/// );
///
/// let identifier = ClientIdentifier::default();
/// assert_eq!(identifier.identify(&envelope).unwrap().as_str(), "web-client");
/// ```
#[derive(Debug, Clone)]
pub struct ClientIdentifier {
    header_name: String,
}

impl ClientIdentifier {
    /// Creates an identifier that falls back to `header_name`.
    pub fn new(header_name: impl Into<String>) -> Self {
        Self {
            header_name: header_name.into().to_ascii_lowercase(),
        }
    }

    /// Returns the fallback header name.
    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    /// Resolves the client name. The context entry wins over the header.
    pub fn identify(&self, envelope: &RequestEnvelope) -> Option<ClientIdentity> {
        if let Some(name) = envelope
            .context_entry(CONTEXT_CLIENT_NAME_KEY)
            .and_then(|value| value.as_str())
            .filter(|name| !name.is_empty())
        {
            return Some(ClientIdentity::new(name));
        }

        envelope
            .header_values(&self.header_name)
            .and_then(|values| values.first())
            .filter(|name| !name.is_empty())
            .map(|name| ClientIdentity::new(name.as_str()))
    }
}

impl Default for ClientIdentifier {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_NAME_HEADER)
    }
}

/// Returns the GraphQL operation name recorded in the context, if any.
pub fn operation_name(envelope: &RequestEnvelope) -> Option<&str> {
    envelope
        .context_entry(CONTEXT_OPERATION_NAME_KEY)
        .and_then(|value| value.as_str())
}
