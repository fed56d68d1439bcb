//! Health supervision: per-service probe drivers, a caching/dedup supervisor
//! per service, bounded history, and webhook alerting.

pub mod alerts;
pub mod checker;
pub mod history;
pub mod probes;
pub mod registry;
pub mod ssrf;
pub mod types;

pub use alerts::{AlertDispatcher, WebhookConfig};
pub use checker::{Checker, StatusListener};
pub use history::HealthHistory;
pub use registry::SupervisorRegistry;
pub use types::{
    CheckResult, HealthCheckKind, HealthCheckSpec, HealthRecord, ProbeOutcome, ServiceProtocol,
    Status, SystemTimelinePoint, UpstreamService,
};
