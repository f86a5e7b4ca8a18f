//! GraphQL error objects written into refused envelopes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::RejectionKind;

/// One entry of a GraphQL response `errors` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    /// Human-readable message
    pub message: String,
    /// Machine-readable details
    pub extensions: ErrorExtensions,
}

/// The `extensions` object of a [`GraphQLError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorExtensions {
    /// Error code, e.g. `RATE_LIMIT_EXCEED`
    pub code: String,
    /// Window diagnostics, present on throttling errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitExtension>,
}

/// Window state reported to a throttled client so it can back off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitExtension {
    /// Resolved client name
    pub client_name: String,
    /// Units per window
    pub limit: u64,
    /// Units left in the current window
    pub remaining: u64,
    /// Unix time in milliseconds at which the window ends
    pub reset: u64,
}

impl GraphQLError {
    /// Creates an error whose code comes from `kind`.
    pub fn rejection(kind: RejectionKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            extensions: ErrorExtensions {
                code: kind.code().to_string(),
                rate_limit: None,
            },
        }
    }

    /// Attaches window diagnostics.
    pub fn with_rate_limit(mut self, rate_limit: RateLimitExtension) -> Self {
        self.extensions.rate_limit = Some(rate_limit);
        self
    }

    fn to_value(&self) -> Value {
        // Plain strings and integers only; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Replaces the body with `{ "errors": [error] }`.
pub(crate) fn replace_errors(body: &mut Option<Value>, error: &GraphQLError) {
    *body = Some(json!({ "errors": [error.to_value()] }));
}

/// Appends `error` to `body.errors`, keeping earlier entries and other fields.
///
/// A body that is not an object, or an `errors` field that is not a list, is
/// replaced.
pub(crate) fn append_error(body: &mut Option<Value>, error: &GraphQLError) {
    let value = error.to_value();
    match body {
        Some(Value::Object(fields)) => match fields.get_mut("errors") {
            Some(Value::Array(errors)) => errors.push(value),
            _ => {
                fields.insert("errors".to_string(), Value::Array(vec![value]));
            }
        },
        _ => *body = Some(json!({ "errors": [value] })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttled() -> GraphQLError {
        GraphQLError::rejection(RejectionKind::RateLimited, "slow down").with_rate_limit(
            RateLimitExtension {
                client_name: "web".to_string(),
                limit: 10,
                remaining: 0,
                reset: 1_700_000_010_000,
            },
        )
    }

    #[test]
    fn wire_format_uses_camel_case() {
        assert_eq!(
            serde_json::to_value(throttled()).unwrap(),
            json!({
                "message": "slow down",
                "extensions": {
                    "code": "RATE_LIMIT_EXCEED",
                    "rateLimit": {
                        "clientName": "web",
                        "limit": 10,
                        "remaining": 0,
                        "reset": 1_700_000_010_000u64
                    }
                }
            })
        );
    }

    #[test]
    fn rate_limit_is_omitted_when_absent() {
        let error = GraphQLError::rejection(RejectionKind::MissingClientId, "who?");
        assert_eq!(
            serde_json::to_value(error).unwrap(),
            json!({ "message": "who?", "extensions": { "code": "INVALID_CLIENT_ID" } })
        );
    }

    #[test]
    fn append_keeps_existing_errors_first() {
        let mut body = Some(json!({ "errors": [{ "message": "earlier" }], "data": null }));
        append_error(&mut body, &throttled());

        let body = body.unwrap();
        let errors = body["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0]["message"], "earlier");
        assert_eq!(errors[1]["extensions"]["code"], "RATE_LIMIT_EXCEED");
        assert!(body.get("data").is_some());
    }

    #[test]
    fn append_creates_errors_list() {
        let mut body = Some(json!({ "query": "{ me }" }));
        append_error(&mut body, &throttled());
        assert_eq!(body.as_ref().unwrap()["errors"].as_array().unwrap().len(), 1);

        let mut missing = None;
        append_error(&mut missing, &throttled());
        assert_eq!(missing.unwrap()["errors"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn replace_discards_previous_body() {
        let mut body = Some(json!({ "query": "{ me }", "errors": [{ "message": "x" }] }));
        replace_errors(
            &mut body,
            &GraphQLError::rejection(RejectionKind::MissingClientId, "who?"),
        );

        assert_eq!(
            body.unwrap(),
            json!({ "errors": [{ "message": "who?", "extensions": { "code": "INVALID_CLIENT_ID" } }] })
        );
    }
}
