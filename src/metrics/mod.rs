//! Metrics facade: a minimal sink (`set_gauge`/`incr_counter`/`add_sample`/
//! `measure_since`) over a process-wide `prometheus::Registry`, initialized
//! once via an idempotent `initialize()`, exactly like `config::mod`'s
//! `static CONFIG: OnceCell<RwLock<Config>>` idiom.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use prometheus::{CounterVec, GaugeVec, HistogramVec, Opts, Registry};
use tracing::warn;

const NAMESPACE: &str = "mcpany";

/// Sink abstraction consumed by the Checker, the traffic recorder, and the
/// `/metrics` HTTP exporter.
pub trait MetricsFacade: Send + Sync {
    fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]);
    fn incr_counter(&self, name: &str, value: u64, labels: &[(&str, &str)]);
    fn add_sample(&self, name: &str, value: f64, labels: &[(&str, &str)]);
    fn measure_since(&self, name: &str, start: Instant, labels: &[(&str, &str)]) {
        let elapsed = start.elapsed().as_secs_f64();
        self.add_sample(name, elapsed, labels);
    }
    /// Render the current registry state in Prometheus text exposition format.
    fn render(&self) -> String;
}

/// Turns a dot-separated metric path into the underscore-separated,
/// namespace-prefixed Prometheus metric name.
fn full_name(path: &str) -> String {
    format!("{}_{}", NAMESPACE, path.replace('.', "_"))
}

/// `prometheus::Registry`-backed implementation. Each distinct metric name
/// lazily registers its vec the first time it's observed, keyed by the sorted
/// label names so later calls with the same name+labels reuse it.
pub struct PrometheusMetrics {
    registry: Registry,
    gauges: DashMap<(String, Vec<String>), GaugeVec>,
    counters: DashMap<(String, Vec<String>), CounterVec>,
    histograms: DashMap<(String, Vec<String>), HistogramVec>,
}

impl PrometheusMetrics {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            gauges: DashMap::new(),
            counters: DashMap::new(),
            histograms: DashMap::new(),
        }
    }

    fn label_key(labels: &[(&str, &str)]) -> Vec<String> {
        let mut names: Vec<String> = labels.iter().map(|(k, _)| k.to_string()).collect();
        names.sort();
        names
    }

    fn label_values<'a>(labels: &'a [(&str, &str)], names: &[String]) -> Vec<&'a str> {
        names
            .iter()
            .map(|n| {
                labels
                    .iter()
                    .find(|(k, _)| k == n)
                    .map(|(_, v)| *v)
                    .unwrap_or("")
            })
            .collect()
    }

    fn gauge_vec(&self, name: &str, label_names: &[String]) -> GaugeVec {
        let key = (name.to_string(), label_names.to_vec());
        if let Some(existing) = self.gauges.get(&key) {
            return existing.clone();
        }
        let names_ref: Vec<&str> = label_names.iter().map(|s| s.as_str()).collect();
        let vec = GaugeVec::new(Opts::new(name, name), &names_ref)
            .expect("gauge vec construction cannot fail for valid metric names");
        if self.registry.register(Box::new(vec.clone())).is_err() {
            warn!(metric = name, "gauge already registered, reusing");
        }
        self.gauges.insert(key, vec.clone());
        vec
    }

    fn counter_vec(&self, name: &str, label_names: &[String]) -> CounterVec {
        let key = (name.to_string(), label_names.to_vec());
        if let Some(existing) = self.counters.get(&key) {
            return existing.clone();
        }
        let names_ref: Vec<&str> = label_names.iter().map(|s| s.as_str()).collect();
        let vec = CounterVec::new(Opts::new(name, name), &names_ref)
            .expect("counter vec construction cannot fail for valid metric names");
        if self.registry.register(Box::new(vec.clone())).is_err() {
            warn!(metric = name, "counter already registered, reusing");
        }
        self.counters.insert(key, vec.clone());
        vec
    }

    fn histogram_vec(&self, name: &str, label_names: &[String]) -> HistogramVec {
        let key = (name.to_string(), label_names.to_vec());
        if let Some(existing) = self.histograms.get(&key) {
            return existing.clone();
        }
        let names_ref: Vec<&str> = label_names.iter().map(|s| s.as_str()).collect();
        let vec = HistogramVec::new(prometheus::HistogramOpts::new(name, name), &names_ref)
            .expect("histogram vec construction cannot fail for valid metric names");
        if self.registry.register(Box::new(vec.clone())).is_err() {
            warn!(metric = name, "histogram already registered, reusing");
        }
        self.histograms.insert(key, vec.clone());
        vec
    }
}

impl Default for PrometheusMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsFacade for PrometheusMetrics {
    fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let full = full_name(name);
        let label_names = Self::label_key(labels);
        let vec = self.gauge_vec(&full, &label_names);
        let values = Self::label_values(labels, &label_names);
        if let Ok(metric) = vec.get_metric_with_label_values(&values) {
            metric.set(value);
        }
    }

    fn incr_counter(&self, name: &str, value: u64, labels: &[(&str, &str)]) {
        let full = full_name(name);
        let label_names = Self::label_key(labels);
        let vec = self.counter_vec(&full, &label_names);
        let values = Self::label_values(labels, &label_names);
        if let Ok(metric) = vec.get_metric_with_label_values(&values) {
            metric.inc_by(value as f64);
        }
    }

    fn add_sample(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let full = full_name(name);
        let label_names = Self::label_key(labels);
        let vec = self.histogram_vec(&full, &label_names);
        let values = Self::label_values(labels, &label_names);
        if let Ok(metric) = vec.get_metric_with_label_values(&values) {
            metric.observe(value);
        }
    }

    fn render(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

static METRICS: OnceCell<Arc<dyn MetricsFacade>> = OnceCell::new();

/// Idempotently install the process-wide metrics sink. Subsequent calls are
/// no-ops; the first caller wins.
pub fn initialize() -> Arc<dyn MetricsFacade> {
    METRICS
        .get_or_init(|| Arc::new(PrometheusMetrics::new()) as Arc<dyn MetricsFacade>)
        .clone()
}

/// Fetch the process-wide sink, initializing it on first access.
pub fn instance() -> Arc<dyn MetricsFacade> {
    initialize()
}
