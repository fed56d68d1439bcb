//! Supervisor registry: builds one Checker per upstream service, diffed by
//! name on reload, keyed in a concurrent `DashMap` so readers never block
//! behind a reload in progress.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::info;

use crate::health::alerts::AlertDispatcher;
use crate::health::checker::{Checker, StatusListener};
use crate::health::history::HealthHistory;
use crate::health::probes::ProbeContext;
use crate::health::types::{CheckResult, HealthCheckSpec, Status, UpstreamService};
use crate::metrics::MetricsFacade;

/// Wires a Checker's transition callback to gauge emission, history
/// append, and alert dispatch — the three actions to take on transition.
struct TransitionListener {
    history: Arc<HealthHistory>,
    alerts: Arc<AlertDispatcher>,
    metrics: Arc<dyn MetricsFacade>,
}

#[async_trait]
impl StatusListener for TransitionListener {
    async fn on_check(&self, service: &str, prev: Status, curr: Status, result: &CheckResult) {
        if prev == curr {
            return;
        }

        let gauge_value = if curr == Status::Up { 1.0 } else { 0.0 };
        self.metrics
            .set_gauge("health_check_status", gauge_value, &[("service", service)]);

        self.history.append(crate::health::types::HealthRecord {
            service_name: service.to_string(),
            timestamp: chrono::Utc::now(),
            status: curr,
            latency_ms: result.latency_ms,
            error: result.error.clone(),
        });

        self.alerts.dispatch(service, curr).await;
    }
}

/// A record of what a registered service looked like, to detect protocol or
/// health-check changes on reload.
struct RegisteredEntry {
    checker: Arc<Checker>,
    protocol: crate::health::types::ServiceProtocol,
    health_check: Option<HealthCheckSpec>,
}

/// Builds and tears down Checkers as the service list changes.
pub struct SupervisorRegistry {
    entries: DashMap<String, RegisteredEntry>,
    ctx: Arc<ProbeContext>,
    metrics: Arc<dyn MetricsFacade>,
    history: Arc<HealthHistory>,
    alerts: Arc<AlertDispatcher>,
}

impl SupervisorRegistry {
    pub fn new(
        metrics: Arc<dyn MetricsFacade>,
        history: Arc<HealthHistory>,
        alerts: Arc<AlertDispatcher>,
    ) -> Self {
        Self {
            entries: DashMap::new(),
            ctx: Arc::new(ProbeContext::new()),
            metrics,
            history,
            alerts,
        }
    }

    /// Diff `services` against the currently registered set by name: stop
    /// and drop removed services, create added ones, and replace any whose
    /// protocol or health-check changed.
    pub fn reload(&self, services: &[UpstreamService]) {
        let incoming_names: std::collections::HashSet<&str> =
            services.iter().map(|s| s.name.as_str()).collect();

        let to_remove: Vec<String> = self
            .entries
            .iter()
            .filter(|e| !incoming_names.contains(e.key().as_str()))
            .map(|e| e.key().clone())
            .collect();
        for name in to_remove {
            if let Some((_, entry)) = self.entries.remove(&name) {
                info!(service = %name, "tearing down checker: service removed");
                // Dropping the Arc allows its scheduler task to notice via
                // the running flag on the next tick boundary; explicit stop
                // halts it immediately.
                tokio::spawn(async move {
                    entry.checker.stop().await;
                });
            }
        }

        for service in services {
            if !service.needs_checker() {
                if self.entries.remove(&service.name).is_some() {
                    info!(service = %service.name, "tearing down checker: disabled or no health check");
                }
                continue;
            }

            let needs_replace = match self.entries.get(&service.name) {
                None => true,
                Some(existing) => {
                    existing.protocol != service.protocol
                        || existing.health_check != service.health_check
                }
            };

            if !needs_replace {
                continue;
            }

            if let Some((_, old)) = self.entries.remove(&service.name) {
                let checker = Arc::clone(&old.checker);
                tokio::spawn(async move {
                    checker.stop().await;
                });
            }

            let spec = service.health_check.clone().expect("needs_checker guarantees Some");
            let listener = Arc::new(TransitionListener {
                history: Arc::clone(&self.history),
                alerts: Arc::clone(&self.alerts),
                metrics: Arc::clone(&self.metrics),
            });

            let checker = Arc::new(
                Checker::new(
                    service.name.clone(),
                    spec.clone(),
                    Arc::clone(&self.ctx),
                    Arc::clone(&self.metrics),
                )
                .with_listener(listener),
            );
            checker.start();

            info!(service = %service.name, "registered checker");
            self.entries.insert(
                service.name.clone(),
                RegisteredEntry {
                    checker,
                    protocol: service.protocol,
                    health_check: Some(spec),
                },
            );
        }
    }

    pub fn checker(&self, name: &str) -> Option<Arc<Checker>> {
        self.entries.get(name).map(|e| Arc::clone(&e.checker))
    }

    pub fn service_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The alert dispatcher shared by every checker this registry manages,
    /// for callers (e.g. the topology builder) that need its configured
    /// webhooks rather than its dispatch behavior.
    pub fn alerts(&self) -> &Arc<AlertDispatcher> {
        &self.alerts
    }
}
