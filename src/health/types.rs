//! Data model for upstream services, health checks, and check results.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default per-probe timeout when a health check doesn't specify one.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default cache duration for a [`crate::health::checker::Checker`].
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(1);

/// Container isolation mode for the command-line probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IsolationMode {
    /// Run the command directly on the host.
    None,
    /// Run the command inside a container sandbox.
    Container,
}

/// Protocol-specific parameters for the HTTP probe.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpParams {
    pub url: String,
    pub method: String,
    pub expected_code: u16,
    pub expected_body_contains: Option<String>,
}

/// Protocol-specific parameters for the WebSocket probe.
#[derive(Debug, Clone, PartialEq)]
pub struct WebSocketParams {
    pub url: String,
    pub message: Option<String>,
    pub expected_response_contains: Option<String>,
}

/// Protocol-specific parameters for the gRPC health probe.
#[derive(Debug, Clone, PartialEq)]
pub struct GrpcParams {
    pub service_name: String,
    pub endpoint: String,
}

/// Protocol-specific parameters for the command-line probe.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandLineParams {
    pub binary: String,
    pub method: Option<String>,
    pub prompt: Option<String>,
    pub expected_response_contains: Option<String>,
    pub working_dir: PathBuf,
    pub isolation: IsolationMode,
}

/// Protocol-specific parameters for a raw TCP connect probe.
#[derive(Debug, Clone, PartialEq)]
pub struct TcpParams {
    pub address: String,
    pub tls: bool,
}

/// Protocol-specific parameters for the filesystem probe.
#[derive(Debug, Clone, PartialEq)]
pub struct FilesystemParams {
    pub root_paths: Vec<PathBuf>,
    pub is_local: bool,
}

/// The protocol-specific shape of a health check, mirroring the service's
/// own protocol. WebRTC embeds either an HTTP or WebSocket check.
#[derive(Debug, Clone, PartialEq)]
pub enum HealthCheckKind {
    Http(HttpParams),
    WebSocket(WebSocketParams),
    Grpc(GrpcParams),
    CommandLine(CommandLineParams),
    WebRtc(Box<HealthCheckKind>),
    Tcp(TcpParams),
    Filesystem(FilesystemParams),
    /// MCP stdio transport: always considered healthy, never dialed.
    McpStdio,
}

/// A health check attached to an [`UpstreamService`].
///
/// `interval` is `None` for synchronous on-demand checks, `Some(d)` for
/// periodic checks scheduled by the [`crate::health::checker::Checker`].
#[derive(Debug, Clone, PartialEq)]
pub struct HealthCheckSpec {
    pub kind: HealthCheckKind,
    pub timeout: Duration,
    pub interval: Option<Duration>,
}

impl HealthCheckSpec {
    pub fn new(kind: HealthCheckKind) -> Self {
        Self {
            kind,
            timeout: DEFAULT_PROBE_TIMEOUT,
            interval: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// `true` when this check embeds an HTTP leaf anywhere (direct or via WebRTC).
    pub fn is_periodic(&self) -> bool {
        self.interval.is_some()
    }
}

/// The protocol tag of an [`UpstreamService`]. Distinct from [`HealthCheckKind`]
/// because a service may exist (and be routed) without a health check at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceProtocol {
    Http,
    OpenApiHttp,
    Grpc,
    WebSocket,
    WebRtcSignaling,
    CommandLine,
    Filesystem,
    Mcp,
}

/// A service the gateway fronts. Exactly one protocol is in play per
/// instance; `name` is the stable key used across stores and metrics labels.
#[derive(Debug, Clone)]
pub struct UpstreamService {
    pub name: String,
    pub id: Option<String>,
    pub disabled: bool,
    pub protocol: ServiceProtocol,
    pub health_check: Option<HealthCheckSpec>,
}

impl UpstreamService {
    /// A service produces no Checker when disabled or health-check-less.
    pub fn needs_checker(&self) -> bool {
        !self.disabled && self.health_check.is_some()
    }
}

/// Tri-valued reachability status. `Unknown` only occurs before the first
/// check completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Up,
    Down,
    Unknown,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Up => "up",
            Status::Down => "down",
            Status::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single probe outcome, pre-classification into `Status`.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub ok: bool,
    pub latency_ms: u64,
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn success(latency_ms: u64) -> Self {
        Self {
            ok: true,
            latency_ms,
            error: None,
        }
    }

    pub fn failure(latency_ms: u64, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            latency_ms,
            error: Some(error.into()),
        }
    }

    pub fn status(&self) -> Status {
        if self.ok {
            Status::Up
        } else {
            Status::Down
        }
    }
}

/// Result of a [`crate::health::checker::Checker::check`] call, as returned
/// to callers (not yet a history record).
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub status: Status,
    pub latency_ms: u64,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// One historical sample for a single service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthRecord {
    pub service_name: String,
    pub timestamp: DateTime<Utc>,
    pub status: Status,
    pub latency_ms: u64,
    pub error: Option<String>,
}

/// One sample of the global system-wide uptime timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemTimelinePoint {
    pub timestamp: DateTime<Utc>,
    pub healthy_services: u32,
    pub total_services: u32,
    pub uptime_pct: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display() {
        assert_eq!(Status::Up.to_string(), "up");
        assert_eq!(Status::Down.to_string(), "down");
        assert_eq!(Status::Unknown.to_string(), "unknown");
    }

    #[test]
    fn probe_outcome_status_mapping() {
        assert_eq!(ProbeOutcome::success(10).status(), Status::Up);
        assert_eq!(ProbeOutcome::failure(10, "x").status(), Status::Down);
    }

    #[test]
    fn needs_checker_respects_disabled_and_missing_check() {
        let mut svc = UpstreamService {
            name: "a".into(),
            id: None,
            disabled: false,
            protocol: ServiceProtocol::Http,
            health_check: None,
        };
        assert!(!svc.needs_checker());
        svc.health_check = Some(HealthCheckSpec::new(HealthCheckKind::McpStdio));
        assert!(svc.needs_checker());
        svc.disabled = true;
        assert!(!svc.needs_checker());
    }
}
