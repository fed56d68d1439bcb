//! Raw-TCP HTTP surface serving `/healthz`, `/readyz`, `/doctor`, `/metrics`.
//!
//! A `tokio::net::TcpListener` accept loop, one spawned task per
//! connection, manual request-line parsing, no web framework dependency.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::health::registry::SupervisorRegistry;
use crate::metrics::MetricsFacade;

/// Shared state handed to every connection handler.
pub struct ServerState {
    pub registry: Arc<SupervisorRegistry>,
    pub metrics: Arc<dyn MetricsFacade>,
}

async fn health_artifact_json(registry: &SupervisorRegistry) -> (bool, String) {
    let mut checks = serde_json::Map::new();
    let mut any_down = false;
    let mut any_known = false;

    for name in registry.service_names() {
        if let Some(checker) = registry.checker(&name) {
            // current_status reflects the last executed check without
            // forcing a new probe.
            let status = checker.current_status().await;
            if status == crate::health::types::Status::Down {
                any_down = true;
            }
            if status != crate::health::types::Status::Unknown {
                any_known = true;
            }
            checks.insert(
                name,
                serde_json::json!({ "status": status.as_str() }),
            );
        }
    }

    let top_status = if any_down {
        "down"
    } else if any_known {
        "up"
    } else {
        "unknown"
    };

    let body = serde_json::json!({
        "status": top_status,
        "checks": checks,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    (!any_down, body.to_string())
}

async fn handle_connection(mut stream: tokio::net::TcpStream, state: Arc<ServerState>) {
    let mut buf = [0u8; 1024];
    let n = match tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf)).await {
        Ok(Ok(n)) if n > 0 => n,
        _ => return,
    };

    let request = String::from_utf8_lossy(&buf[..n]);
    let request_line = request.lines().next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let raw_path = parts.next().unwrap_or_default();
    let path = raw_path.split('?').next().unwrap_or(raw_path);

    let (status_line, content_type, body) = match (method, path) {
        ("GET", "/healthz") => {
            let (_healthy, body) = health_artifact_json(&state.registry).await;
            ("200 OK", "application/json", body)
        }
        ("GET", "/readyz") => {
            let (healthy, _) = health_artifact_json(&state.registry).await;
            if healthy {
                ("200 OK", "application/json", "{\"status\":\"ready\"}".to_string())
            } else {
                (
                    "503 Service Unavailable",
                    "application/json",
                    "{\"status\":\"not_ready\"}".to_string(),
                )
            }
        }
        ("GET", "/doctor") => {
            let report = crate::doctor::run().await;
            let body = serde_json::to_string(&report).unwrap_or_else(|_| "{}".to_string());
            ("200 OK", "application/json", body)
        }
        ("GET", "/metrics") => ("200 OK", "text/plain; version=0.0.4", state.metrics.render()),
        _ => ("404 Not Found", "application/json", "{\"error\":\"not_found\"}".to_string()),
    };

    let response = format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );

    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// Bind and serve the health/doctor/metrics HTTP surface, returning the
/// accept loop's join handle.
pub async fn start_server(
    host: &str,
    port: u16,
    state: Arc<ServerState>,
) -> std::io::Result<tokio::task::JoinHandle<()>> {
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "supervision server listening");

    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _peer)) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(handle_connection(stream, state));
                }
                Err(e) => {
                    warn!(error = %e, "server accept error");
                }
            }
        }
    });

    Ok(handle)
}

/// Resolve the bind port from `MCPANY_HEALTH_PORT`, falling back to 8787.
pub fn health_port() -> u16 {
    std::env::var("MCPANY_HEALTH_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8787)
}
