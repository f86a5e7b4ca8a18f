//! Property-based tests for identity resolution and stage dispatch.

mod common;

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{json, Value};

use common::{dispatcher, RecordingLimiter};
use coprocessor_gate::{ClientIdentifier, Control, RequestEnvelope, Stage};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

fn name() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_-]{1,24}"
}

fn known_stage() -> impl Strategy<Value = Stage> {
    prop_oneof![
        Just(Stage::RouterRequest),
        Just(Stage::RouterResponse),
        Just(Stage::SupergraphResponse),
        Just(Stage::ExecutionRequest),
        Just(Stage::ExecutionResponse),
        Just(Stage::SubgraphRequest),
        Just(Stage::SubgraphResponse),
    ]
}

fn build(context_name: Option<&str>, header_name: Option<&str>) -> RequestEnvelope {
    let mut entries = serde_json::Map::new();
    if let Some(name) = context_name {
        entries.insert("apollo_telemetry::client_name".to_string(), json!(name));
    }
    let mut headers = serde_json::Map::new();
    if let Some(name) = header_name {
        headers.insert("apollographql-client-name".to_string(), json!([name]));
    }
    serde_json::from_value(json!({
        "stage": "SupergraphRequest",
        "context": { "entries": Value::Object(entries) },
        "headers": Value::Object(headers),
        "body": {}
    }))
    .unwrap()
}

proptest! {
    #[test]
    fn context_name_takes_precedence(
        context_name in name(),
        header_name in proptest::option::of(name()),
    ) {
        let envelope = build(Some(&context_name), header_name.as_deref());
        let identity = ClientIdentifier::default().identify(&envelope).unwrap();
        prop_assert_eq!(identity.as_str(), context_name.as_str());
    }

    #[test]
    fn header_name_is_the_fallback(header_name in name()) {
        let envelope = build(None, Some(&header_name));
        let identity = ClientIdentifier::default().identify(&envelope).unwrap();
        prop_assert_eq!(identity.as_str(), header_name.as_str());
    }

    #[test]
    fn header_lookup_ignores_case(header_name in name(), upper in any::<bool>()) {
        let configured = if upper { "X-Client-Name" } else { "x-client-name" };
        let envelope: RequestEnvelope = serde_json::from_value(json!({
            "stage": "SupergraphRequest",
            "headers": { "X-CLIENT-NAME": [header_name.clone()] }
        }))
        .unwrap();

        let identity = ClientIdentifier::new(configured).identify(&envelope).unwrap();
        prop_assert_eq!(identity.as_str(), header_name.as_str());
    }

    #[test]
    fn non_admission_stages_are_untouched(
        stage in known_stage(),
        client in proptest::option::of(name()),
    ) {
        let limiter = Arc::new(RecordingLimiter::new(1));
        let dispatcher = dispatcher(limiter.clone());
        let mut input = build(client.as_deref(), None);
        input.stage = Some(stage);

        let output = runtime().block_on(dispatcher.dispatch(input.clone())).unwrap();

        prop_assert_eq!(output, input);
        prop_assert!(limiter.calls().is_empty());
    }

    #[test]
    fn introspection_bypasses_with_or_without_identity(
        context_name in proptest::option::of(name()),
        header_name in proptest::option::of(name()),
    ) {
        let limiter = Arc::new(RecordingLimiter::new(1));
        let dispatcher = dispatcher(limiter.clone());
        let mut input = build(context_name.as_deref(), header_name.as_deref());
        if let Some(entries) = input.context.as_mut().and_then(|ctx| ctx.entries.as_mut()) {
            entries.insert("operation_name".to_string(), json!("IntrospectionQuery"));
        }

        let rt = runtime();
        for _ in 0..2 {
            let output = rt.block_on(dispatcher.dispatch(input.clone())).unwrap();
            prop_assert_eq!(&output, &input);
        }
        prop_assert!(limiter.calls().is_empty());
    }

    #[test]
    fn unknown_stage_tags_round_trip(tag in "[A-Z][a-zA-Z]{3,20}") {
        let stage = Stage::from(tag.clone());
        let serialized = serde_json::to_value(&stage).unwrap();
        prop_assert_eq!(serialized, json!(tag));
    }

    #[test]
    fn identified_requests_within_limit_pass(client in name(), burst in 1u64..8) {
        let limiter = Arc::new(RecordingLimiter::new(burst));
        let dispatcher = dispatcher(limiter.clone());
        let rt = runtime();

        for _ in 0..burst {
            let output = rt.block_on(dispatcher.dispatch(build(Some(&client), None))).unwrap();
            prop_assert_eq!(output.control, None);
        }
        let over = rt.block_on(dispatcher.dispatch(build(Some(&client), None))).unwrap();

        prop_assert_eq!(over.control, Some(Control::Break(429)));
        prop_assert_eq!(limiter.calls().len() as u64, burst + 1);
        prop_assert!(limiter.calls().iter().all(|(key, cost)| key == &client && *cost == 1));
    }
}
