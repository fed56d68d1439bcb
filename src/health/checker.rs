//! Per-service health supervisor: wraps a probe with a single-entry cache,
//! status-transition dedup, periodic scheduling, and metrics/history/alert
//! fan-out via a ticker task gated by an `Arc<RwLock<bool>>` running flag.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::health::probes::{self, ProbeContext};
use crate::health::types::{CheckResult, HealthCheckSpec, Status};
use crate::metrics::MetricsFacade;

/// Invoked on every executed Check (i.e. every cache miss); implementations
/// act only when `prev != curr`, per the Checker's dedup contract.
#[async_trait]
pub trait StatusListener: Send + Sync {
    async fn on_check(&self, service: &str, prev: Status, curr: Status, result: &CheckResult);
}

/// One Checker per upstream service.
pub struct Checker {
    name: String,
    spec: HealthCheckSpec,
    ctx: Arc<ProbeContext>,
    cache_duration: Duration,
    cache: Mutex<Option<(Instant, CheckResult)>>,
    state: Mutex<Status>,
    listeners: Vec<Arc<dyn StatusListener>>,
    metrics: Arc<dyn MetricsFacade>,
    running: Arc<RwLock<bool>>,
}

impl Checker {
    pub fn new(
        name: impl Into<String>,
        spec: HealthCheckSpec,
        ctx: Arc<ProbeContext>,
        metrics: Arc<dyn MetricsFacade>,
    ) -> Self {
        Self {
            name: name.into(),
            spec,
            ctx,
            cache_duration: crate::health::types::DEFAULT_CACHE_DURATION,
            cache: Mutex::new(None),
            state: Mutex::new(Status::Unknown),
            listeners: Vec::new(),
            metrics,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub fn with_cache_duration(mut self, duration: Duration) -> Self {
        self.cache_duration = duration;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn StatusListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn current_status(&self) -> Status {
        *self.state.lock().await
    }

    /// Run the check, honoring the cache; always returns a result, never an
    /// error — probe failures surface as `Status::Down` with `error` set.
    pub async fn check(&self) -> CheckResult {
        {
            let cache = self.cache.lock().await;
            if let Some((taken_at, result)) = cache.as_ref() {
                if taken_at.elapsed() < self.cache_duration {
                    return result.clone();
                }
            }
        }

        let outcome = probes::dispatch(&self.ctx, &self.spec.kind, self.spec.timeout).await;

        let curr = outcome.status();
        let result = CheckResult {
            status: curr,
            latency_ms: outcome.latency_ms,
            message: None,
            error: outcome.error.clone(),
        };

        self.metrics.add_sample(
            "health_check_latency_seconds",
            outcome.latency_ms as f64 / 1000.0,
            &[("service", &self.name), ("status", curr.as_str())],
        );

        {
            let mut cache = self.cache.lock().await;
            *cache = Some((Instant::now(), result.clone()));
        }

        let prev = {
            let mut state = self.state.lock().await;
            let prev = *state;
            *state = curr;
            prev
        };

        for listener in &self.listeners {
            listener.on_check(&self.name, prev, curr, &result).await;
        }

        result
    }

    /// Start the periodic scheduler if this check declares an `interval`.
    /// No-op for synchronous (on-demand only) checks.
    pub fn start(self: &Arc<Self>) {
        let Some(interval) = self.spec.interval else {
            return;
        };

        {
            let checker = Arc::clone(self);
            tokio::spawn(async move {
                {
                    let mut running = checker.running.write().await;
                    if *running {
                        warn!(service = %checker.name, "checker scheduler already running");
                        return;
                    }
                    *running = true;
                }

                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await;

                loop {
                    ticker.tick().await;
                    if !*checker.running.read().await {
                        debug!(service = %checker.name, "checker scheduler stopped");
                        break;
                    }
                    checker.check().await;
                }
            });
        }
    }

    /// Halt the periodic scheduler. Synchronous on-demand checks are unaffected.
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}
