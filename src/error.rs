//! Error types for mcpany-core.
//!
//! One `thiserror`-derived enum covers every failure kind across probes,
//! stores, and the skill manager, following the flat-enum-with-named-variants
//! shape used throughout this crate.

use thiserror::Error;

/// The primary error type for mcpany-core operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The probe reached its target but the result was inadequate
    /// (wrong status code, body mismatch, non-serving gRPC status, ...).
    #[error("probe failure: {0}")]
    ProbeFailure(String),

    /// The probe could not dial the target at all.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// The probe or store operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// SSRF guard rejected a probe target (loopback/link-local/private).
    #[error("blocked target: {0}")]
    Blocked(String),

    /// A config entity failed boundary validation (missing/oversized field).
    #[error("invalid config: {0}")]
    ConfigInvalid(String),

    /// A store lookup found no entity for the given key.
    #[error("not found: {0}")]
    NotFound(String),

    /// An upsert collided with an existing unique key.
    #[error("conflict: {0}")]
    Conflict(String),

    /// I/O or marshaling failure in a durable sink (store, history, skills).
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    /// The traffic recorder's ingest queue was full; the event was dropped.
    #[error("ingest queue overflow, event dropped")]
    IngestOverflow,

    /// Skill name failed the `^[a-z0-9]([-a-z0-9]*[a-z0-9])?$` pattern.
    #[error("invalid skill name: {0}")]
    InvalidSkillName(String),

    /// Asset path escaped the skill's workspace directory.
    #[error("invalid asset path: {0}")]
    InvalidAssetPath(String),

    /// Standard I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML (skill frontmatter) errors.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client errors (probes, alert webhooks, doctor checks).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// SQLite durable-store errors.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),
}

impl GatewayError {
    /// `true` for error kinds the checker turns into `Status::Down` rather
    /// than bubbling as an operational failure.
    pub fn is_probe_outcome(&self) -> bool {
        matches!(
            self,
            GatewayError::ProbeFailure(_)
                | GatewayError::TransportFailure(_)
                | GatewayError::Timeout(_)
                | GatewayError::Blocked(_)
        )
    }
}

/// A specialized `Result` type for mcpany-core operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_failure_display() {
        let err = GatewayError::ProbeFailure("unexpected status 500".into());
        assert_eq!(err.to_string(), "probe failure: unexpected status 500");
    }

    #[test]
    fn blocked_display() {
        let err = GatewayError::Blocked("127.0.0.1 is loopback".into());
        assert!(err.to_string().contains("blocked target"));
    }

    #[test]
    fn is_probe_outcome_classification() {
        assert!(GatewayError::ProbeFailure("x".into()).is_probe_outcome());
        assert!(GatewayError::TransportFailure("x".into()).is_probe_outcome());
        assert!(GatewayError::Timeout(std::time::Duration::from_secs(5)).is_probe_outcome());
        assert!(GatewayError::Blocked("x".into()).is_probe_outcome());
        assert!(!GatewayError::NotFound("x".into()).is_probe_outcome());
        assert!(!GatewayError::Conflict("x".into()).is_probe_outcome());
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: GatewayError = io_err.into();
        assert!(matches!(err, GatewayError::Io(_)));
    }

    #[test]
    fn ingest_overflow_display() {
        assert_eq!(
            GatewayError::IngestOverflow.to_string(),
            "ingest queue overflow, event dropped"
        );
    }
}
