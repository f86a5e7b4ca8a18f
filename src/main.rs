use std::net::SocketAddr;

use anyhow::Context;
use tokio::net::TcpListener;

use coprocessor_gate::logging::{init_tracing, DEFAULT_LOG_FILTER};
use coprocessor_gate::web::{serve, AppState};
use coprocessor_gate::{
    AdmissionGate, ClientIdentifier, GateConfig, RequestGatekeeper, StageDispatcher,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(DEFAULT_LOG_FILTER);

    let config = GateConfig::from_env().context("failed to load configuration")?;
    tracing::info!(
        backend = config.backend.name(),
        max_requests = config.window.max_requests,
        window_secs = config.window.window.as_secs(),
        header = %config.client_name_header,
        failure_policy = %config.failure_policy,
        "configuration loaded"
    );

    let limiter = config
        .backend
        .into_limiter(config.window)
        .context("failed to create rate limit store client")?;
    let gatekeeper = RequestGatekeeper::new(
        ClientIdentifier::new(config.client_name_header),
        AdmissionGate::new(limiter),
    )
    .with_failure_policy(config.failure_policy);
    let state = AppState::new(StageDispatcher::new(gatekeeper));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("coprocessor gate listening on http://{}", addr);

    serve(listener, state, config.request_timeout).await?;
    Ok(())
}
