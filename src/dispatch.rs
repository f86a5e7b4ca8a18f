use crate::envelope::{RequestEnvelope, Stage};
use crate::error::Error;
use crate::gatekeeper::RequestGatekeeper;

/// Routes each envelope to the handler registered for its stage.
///
/// Only [`Stage::SupergraphRequest`] has a handler. Every other stage,
/// including a missing or unknown one, is returned untouched. Supporting a
/// new stage means adding a match arm; existing arms do not change.
#[derive(Debug, Clone)]
pub struct StageDispatcher {
    gatekeeper: RequestGatekeeper,
}

impl StageDispatcher {
    /// Creates a dispatcher sending admission-stage envelopes to `gatekeeper`.
    pub fn new(gatekeeper: RequestGatekeeper) -> Self {
        Self { gatekeeper }
    }

    /// Returns `true` if envelopes of `stage` are inspected at all.
    pub fn handles(&self, stage: Option<&Stage>) -> bool {
        matches!(stage, Some(Stage::SupergraphRequest))
    }

    /// Runs the handler for the envelope's stage.
    ///
    /// # Errors
    ///
    /// Propagates handler errors; pass-through never fails.
    pub async fn dispatch(&self, envelope: RequestEnvelope) -> Result<RequestEnvelope, Error> {
        match envelope.stage {
            Some(Stage::SupergraphRequest) => self.gatekeeper.process(envelope).await,
            // Default: hand the envelope back as received.
            _ => Ok(envelope),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::AdmissionGate;
    use crate::identity::ClientIdentifier;
    use crate::limiter::{InMemoryLimiter, SlidingWindow};
    use std::sync::Arc;

    fn dispatcher() -> StageDispatcher {
        let gate = AdmissionGate::new(Arc::new(InMemoryLimiter::new(SlidingWindow::default())));
        StageDispatcher::new(RequestGatekeeper::new(ClientIdentifier::default(), gate))
    }

    #[tokio::test]
    async fn other_stages_pass_through() {
        let dispatcher = dispatcher();
        for stage in [
            Some(Stage::RouterRequest),
            Some(Stage::SupergraphResponse),
            Some(Stage::Other("Custom".to_string())),
            None,
        ] {
            let envelope = RequestEnvelope {
                stage: stage.clone(),
                ..RequestEnvelope::default()
            };

            assert!(!dispatcher.handles(stage.as_ref()));
            let output = dispatcher.dispatch(envelope.clone()).await.unwrap();
            assert_eq!(output, envelope);
        }
    }

    #[tokio::test]
    async fn supergraph_request_is_gated() {
        let dispatcher = dispatcher();
        assert!(dispatcher.handles(Some(&Stage::SupergraphRequest)));

        let output = dispatcher
            .dispatch(RequestEnvelope::new(Stage::SupergraphRequest))
            .await
            .unwrap();
        assert_eq!(output.break_status(), Some(400));
    }
}
