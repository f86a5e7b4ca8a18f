//! The envelope exchanged between the router and the coprocessor.
//!
//! The router posts one envelope per intercepted request and expects the
//! same envelope back. Fields this crate does not model are kept in
//! [`RequestEnvelope::extra`] so they survive the round trip unchanged.
//!
//! Modelled fields are read leniently: a field whose shape does not match
//! reads as absent instead of failing the whole envelope.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Header map as sent by the router: lower-cased name to ordered values.
pub type Headers = BTreeMap<String, Vec<String>>;

/// Lifecycle point at which the router invoked the coprocessor.
///
/// Unrecognized tags are kept verbatim in [`Stage::Other`] and serialize back
/// to the exact string they were read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Stage {
    /// Raw HTTP request entering the router
    RouterRequest,
    /// Raw HTTP response leaving the router
    RouterResponse,
    /// Parsed GraphQL request, before query planning
    SupergraphRequest,
    /// GraphQL response, before serialization
    SupergraphResponse,
    /// Query plan about to be executed
    ExecutionRequest,
    /// Result of query plan execution
    ExecutionResponse,
    /// Request to a single subgraph
    SubgraphRequest,
    /// Response from a single subgraph
    SubgraphResponse,
    /// Any tag this crate does not know about
    Other(String),
}

impl Stage {
    /// Returns the wire tag for this stage.
    pub fn as_str(&self) -> &str {
        match self {
            Stage::RouterRequest => "RouterRequest",
            Stage::RouterResponse => "RouterResponse",
            Stage::SupergraphRequest => "SupergraphRequest",
            Stage::SupergraphResponse => "SupergraphResponse",
            Stage::ExecutionRequest => "ExecutionRequest",
            Stage::ExecutionResponse => "ExecutionResponse",
            Stage::SubgraphRequest => "SubgraphRequest",
            Stage::SubgraphResponse => "SubgraphResponse",
            Stage::Other(tag) => tag,
        }
    }
}

impl From<String> for Stage {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "RouterRequest" => Stage::RouterRequest,
            "RouterResponse" => Stage::RouterResponse,
            "SupergraphRequest" => Stage::SupergraphRequest,
            "SupergraphResponse" => Stage::SupergraphResponse,
            "ExecutionRequest" => Stage::ExecutionRequest,
            "ExecutionResponse" => Stage::ExecutionResponse,
            "SubgraphRequest" => Stage::SubgraphRequest,
            "SubgraphResponse" => Stage::SubgraphResponse,
            _ => Stage::Other(tag),
        }
    }
}

impl From<Stage> for String {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline directive carried back to the router.
///
/// Serializes as `"continue"` or `{"break": <status>}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Control {
    /// Let the request proceed down the pipeline
    Continue,
    /// Stop the pipeline and answer with this HTTP status
    Break(u16),
}

/// Out-of-band request context shared between router plugins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Context entries keyed by plugin-defined names
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub entries: Option<Map<String, Value>>,
    /// Fields of the context object other than `entries`
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One intercepted request as seen by the coprocessor.
///
/// Every field is optional: a missing nested structure is treated as absent
/// by the readers in this crate, never as an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Protocol version announced by the router
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<u64>,
    /// Lifecycle stage of this call
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub stage: Option<Stage>,
    /// Router-assigned request identifier
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    /// Shared plugin context
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub context: Option<Context>,
    /// Request headers
    #[serde(
        default,
        deserialize_with = "lenient_headers",
        skip_serializing_if = "Option::is_none"
    )]
    pub headers: Option<Headers>,
    /// GraphQL request or response payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Short-circuit directive, set by this crate when a request is refused
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub control: Option<Control>,
    /// Top-level fields this crate does not model
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RequestEnvelope {
    /// Creates an empty envelope for the given stage.
    pub fn new(stage: Stage) -> Self {
        Self {
            stage: Some(stage),
            ..Self::default()
        }
    }

    /// Looks up a context entry.
    pub fn context_entry(&self, key: &str) -> Option<&Value> {
        self.context.as_ref()?.entries.as_ref()?.get(key)
    }

    /// Returns the values of a header, matching the name case-insensitively.
    pub fn header_values(&self, name: &str) -> Option<&[String]> {
        self.headers
            .as_ref()?
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }

    /// Returns the HTTP status of the short-circuit directive, if one is set.
    pub fn break_status(&self) -> Option<u16> {
        match self.control {
            Some(Control::Break(status)) => Some(status),
            _ => None,
        }
    }

    /// Stops the pipeline with `status`.
    pub(crate) fn short_circuit(&mut self, status: u16) {
        self.control = Some(Control::Break(status));
    }
}

/// Reads a field as `T`, or as absent when its shape does not fit.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

/// Reads the header map. A bare string value counts as a single value;
/// non-string list items and other shapes are dropped.
fn lenient_headers<'de, D>(deserializer: D) -> Result<Option<Headers>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Object(fields) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };

    let headers = fields
        .into_iter()
        .filter_map(|(name, value)| {
            let values = match value {
                Value::String(single) => vec![single],
                Value::Array(items) => items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::String(item) => Some(item),
                        _ => None,
                    })
                    .collect(),
                _ => return None,
            };
            Some((name, values))
        })
        .collect();
    Ok(Some(headers))
}
