//! Per-protocol reachability probes.
//!
//! Each driver is a pure async function `(ctx, params, timeout) ->
//! ProbeOutcome`, bounded by the caller-supplied timeout. Protocol dispatch
//! is a closed match on [`HealthCheckKind`] rather than a trait-object Probe,
//! since the set of protocols is fixed and closed.

pub mod command_line;
pub mod filesystem;
pub mod grpc;
pub mod http;
pub mod mcp;
pub mod tcp;
pub mod websocket;

use std::time::{Duration, Instant};

use reqwest::Client;

use crate::health::types::{HealthCheckKind, ProbeOutcome};

/// Shared resources handed to every probe driver.
#[derive(Clone)]
pub struct ProbeContext {
    pub http_client: Client,
}

impl ProbeContext {
    pub fn new() -> Self {
        Self {
            http_client: Client::builder()
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }
}

impl Default for ProbeContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the appropriate driver for `kind`, enforcing `timeout` uniformly via
/// `tokio::time::timeout` so a hung driver can never outlive its budget.
pub async fn dispatch(ctx: &ProbeContext, kind: &HealthCheckKind, timeout: Duration) -> ProbeOutcome {
    let start = Instant::now();
    let fut = run(ctx, kind, timeout);
    match tokio::time::timeout(timeout, fut).await {
        Ok(outcome) => outcome,
        Err(_) => ProbeOutcome::failure(start.elapsed().as_millis() as u64, "timed out"),
    }
}

async fn run(ctx: &ProbeContext, kind: &HealthCheckKind, timeout: Duration) -> ProbeOutcome {
    match kind {
        HealthCheckKind::Http(params) => http::probe(ctx, params, timeout).await,
        HealthCheckKind::WebSocket(params) => websocket::probe(params, timeout).await,
        HealthCheckKind::Grpc(params) => grpc::probe(params, timeout).await,
        HealthCheckKind::CommandLine(params) => command_line::probe(params, timeout).await,
        HealthCheckKind::WebRtc(inner) => Box::pin(run(ctx, inner, timeout)).await,
        HealthCheckKind::Tcp(params) => tcp::probe(params, timeout).await,
        HealthCheckKind::Filesystem(params) => filesystem::probe(params).await,
        HealthCheckKind::McpStdio => mcp::probe_stdio(),
    }
}
