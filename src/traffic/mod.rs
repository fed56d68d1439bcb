//! Traffic recorder: non-blocking activity ingest into a bounded queue
//! consumed by a single worker — a cloneable sender plus a task draining
//! the receiver into state behind its own mutex.

pub mod types;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::{GatewayError, Result};
pub use types::{MinuteStats, ServiceCounts, SessionStats, TrafficPoint, TrafficStats};

/// Default bounded queue depth before `RecordActivity` starts dropping events.
const DEFAULT_QUEUE_SIZE: usize = 4096;
/// History window returned by `GetTrafficHistory`.
const HISTORY_WINDOW_MINUTES: i64 = 60;
/// Sessions idle longer than this are evictable.
const SESSION_TTL: chrono::Duration = chrono::Duration::hours(1);
/// Minute buckets older than this are pruned.
const MINUTE_RETENTION: chrono::Duration = chrono::Duration::hours(24);
/// Amortized eviction sweep cadence, in accepted events on a session.
const AMORTIZED_SWEEP_EVERY: u64 = 100;
/// Background eviction tick cadence, for idle systems.
const BACKGROUND_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// One accepted activity event, as it travels through the queue.
#[derive(Debug, Clone)]
struct ActivityEvent {
    session_id: String,
    metadata: HashMap<String, String>,
    latency: Duration,
    is_error: bool,
    service_id: Option<String>,
}

/// Drop any metadata value that isn't a JSON string, per the ingest
/// boundary's sanitation rule.
fn sanitize_metadata(raw: HashMap<String, serde_json::Value>) -> HashMap<String, String> {
    raw.into_iter()
        .filter_map(|(k, v)| match v {
            serde_json::Value::String(s) => Some((k, s)),
            _ => None,
        })
        .collect()
}

fn unix_minute(ts: DateTime<Utc>) -> i64 {
    ts.timestamp() / 60
}

/// Mutable state, touched only by the worker task and by readers, both
/// under the same mutex. No I/O ever happens while this is locked.
#[derive(Default)]
struct RecorderState {
    sessions: HashMap<String, SessionStats>,
    minutes: HashMap<i64, MinuteStats>,
}

impl RecorderState {
    fn apply(&mut self, event: ActivityEvent) {
        let latency_ms = event.latency.as_millis() as u64;
        let now = Utc::now();

        let session = self
            .sessions
            .entry(event.session_id.clone())
            .or_insert_with(|| SessionStats::new(event.session_id.clone()));
        session.metadata = event.metadata;
        session.last_active = now;
        session.request_count += 1;
        session.total_latency_ms += latency_ms;
        if event.is_error {
            session.error_count += 1;
        }
        if let Some(service_id) = &event.service_id {
            if !service_id.is_empty() {
                let counts = session.per_service.entry(service_id.clone()).or_default();
                counts.count += 1;
                counts.latency_ms += latency_ms;
                if event.is_error {
                    counts.errors += 1;
                }
            }
        }
        let request_count = session.request_count;

        let minute = self.minutes.entry(unix_minute(now)).or_default();
        minute.requests += 1;
        minute.latency_sum_ms += latency_ms;
        if event.is_error {
            minute.errors += 1;
        }
        if let Some(service_id) = &event.service_id {
            if !service_id.is_empty() {
                let counts = minute.per_service.entry(service_id.clone()).or_default();
                counts.count += 1;
                counts.latency_ms += latency_ms;
                if event.is_error {
                    counts.errors += 1;
                }
            }
        }

        if request_count % AMORTIZED_SWEEP_EVERY == 0 {
            self.evict(now);
        }
    }

    /// Drop minute buckets older than retention and sessions past their TTL.
    fn evict(&mut self, now: DateTime<Utc>) {
        let cutoff_minute = unix_minute(now - MINUTE_RETENTION);
        self.minutes.retain(|&minute, _| minute >= cutoff_minute);

        let session_cutoff = now - SESSION_TTL;
        self.sessions.retain(|_, s| s.last_active >= session_cutoff);
    }

    fn stats(&self, service_id: Option<&str>) -> TrafficStats {
        let mut total_requests = 0u64;
        let mut total_latency_ms = 0u64;
        let mut total_errors = 0u64;

        for session in self.sessions.values() {
            match service_id {
                None => {
                    total_requests += session.request_count;
                    total_latency_ms += session.total_latency_ms;
                    total_errors += session.error_count;
                }
                Some(id) => {
                    if let Some(counts) = session.per_service.get(id) {
                        total_requests += counts.count;
                        total_latency_ms += counts.latency_ms;
                        total_errors += counts.errors;
                    }
                }
            }
        }

        if total_requests == 0 {
            return TrafficStats {
                total_requests: 0,
                avg_latency_ms: 0.0,
                error_rate: 0.0,
            };
        }

        TrafficStats {
            total_requests,
            avg_latency_ms: total_latency_ms as f64 / total_requests as f64,
            error_rate: total_errors as f64 / total_requests as f64,
        }
    }

    /// `(requests, error_rate, avg_latency_ms)` for the current minute bucket,
    /// scoped to one service when given. Used by the topology builder for
    /// per-service `qps`/`error_rate`/`latency_ms` and the active/error
    /// status upgrade, both of which are defined against the current minute
    /// rather than lifetime totals.
    fn current_minute_service_metrics(&self, service_id: &str) -> (u64, f64, f64) {
        let now = Utc::now();
        let counts = self
            .minutes
            .get(&unix_minute(now))
            .and_then(|bucket| bucket.per_service.get(service_id));

        match counts {
            None => (0, 0.0, 0.0),
            Some(c) if c.count == 0 => (0, 0.0, 0.0),
            Some(c) => (
                c.count,
                c.errors as f64 / c.count as f64,
                c.latency_ms as f64 / c.count as f64,
            ),
        }
    }

    fn history(&self, service_id: Option<&str>) -> Vec<TrafficPoint> {
        let now = Utc::now();
        let current_minute = unix_minute(now);
        let mut points = Vec::with_capacity(HISTORY_WINDOW_MINUTES as usize);

        for offset in (0..HISTORY_WINDOW_MINUTES).rev() {
            let minute_key = current_minute - offset;
            let (requests, errors, latency_sum) = match self.minutes.get(&minute_key) {
                None => (0, 0, 0),
                Some(bucket) => match service_id {
                    None => (bucket.requests, bucket.errors, bucket.latency_sum_ms),
                    Some(id) => bucket
                        .per_service
                        .get(id)
                        .map(|c| (c.count, c.errors, c.latency_ms))
                        .unwrap_or((0, 0, 0)),
                },
            };

            let label_ts = now - chrono::Duration::minutes(offset);
            let latency_avg_ms = if requests == 0 {
                0
            } else {
                latency_sum / requests
            };

            points.push(TrafficPoint {
                time: label_ts.with_timezone(&Local).format("%H:%M").to_string(),
                total: requests,
                errors,
                latency_avg_ms,
            });
        }

        points
    }

    /// Clear history and repopulate with one `MinuteStats` per input point,
    /// keyed sequentially ending at the current minute.
    fn seed(&mut self, points: &[TrafficPoint]) {
        self.minutes.clear();
        let now = Utc::now();
        let current_minute = unix_minute(now);
        let start = current_minute - points.len() as i64 + 1;

        for (i, point) in points.iter().enumerate() {
            let stored_latency = point.latency_avg_ms * point.total;
            self.minutes.insert(
                start + i as i64,
                MinuteStats {
                    requests: point.total,
                    errors: point.errors,
                    latency_sum_ms: stored_latency,
                    per_service: HashMap::new(),
                },
            );
        }
    }
}

/// Non-blocking activity ingest with per-session and per-minute aggregates.
pub struct TrafficRecorder {
    tx: AsyncMutex<Option<mpsc::Sender<ActivityEvent>>>,
    worker: AsyncMutex<Option<JoinHandle<()>>>,
    state: Arc<std::sync::Mutex<RecorderState>>,
    running: Arc<std::sync::atomic::AtomicBool>,
}

impl TrafficRecorder {
    pub fn new() -> Arc<Self> {
        Self::with_queue_size(DEFAULT_QUEUE_SIZE)
    }

    pub fn with_queue_size(queue_size: usize) -> Arc<Self> {
        let (tx, mut rx) = mpsc::channel::<ActivityEvent>(queue_size);
        let state = Arc::new(std::sync::Mutex::new(RecorderState::default()));
        let running = Arc::new(std::sync::atomic::AtomicBool::new(true));

        let worker_state = Arc::clone(&state);
        let worker = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                worker_state.lock().unwrap().apply(event);
            }
        });

        let recorder = Arc::new(Self {
            tx: AsyncMutex::new(Some(tx)),
            worker: AsyncMutex::new(Some(worker)),
            state,
            running,
        });

        recorder.spawn_background_sweep();
        recorder
    }

    fn spawn_background_sweep(self: &Arc<Self>) {
        let state = Arc::clone(&self.state);
        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(BACKGROUND_SWEEP_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !running.load(std::sync::atomic::Ordering::SeqCst) {
                    break;
                }
                state.lock().unwrap().evict(Utc::now());
            }
        });
    }

    /// Enqueue an activity event. Non-blocking: drops with a warning if the
    /// queue is full rather than ever stalling the caller.
    pub async fn record_activity(
        &self,
        session_id: impl Into<String>,
        metadata: HashMap<String, serde_json::Value>,
        latency: Duration,
        is_error: bool,
        service_id: Option<String>,
    ) -> Result<()> {
        let event = ActivityEvent {
            session_id: session_id.into(),
            metadata: sanitize_metadata(metadata),
            latency,
            is_error,
            service_id,
        };

        let guard = self.tx.lock().await;
        let Some(tx) = guard.as_ref() else {
            return Err(GatewayError::IngestOverflow);
        };

        match tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("traffic recorder queue full, dropping event");
                Err(GatewayError::IngestOverflow)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(GatewayError::IngestOverflow),
        }
    }

    pub fn get_stats(&self, service_id: Option<&str>) -> TrafficStats {
        self.state.lock().unwrap().stats(service_id)
    }

    pub fn get_traffic_history(&self, service_id: Option<&str>) -> Vec<TrafficPoint> {
        self.state.lock().unwrap().history(service_id)
    }

    /// `(requests, error_rate, avg_latency_ms)` for `service_id` in the
    /// current minute bucket. See [`RecorderState::current_minute_service_metrics`].
    pub fn current_minute_service_metrics(&self, service_id: &str) -> (u64, f64, f64) {
        self.state
            .lock()
            .unwrap()
            .current_minute_service_metrics(service_id)
    }

    pub fn seed_traffic_history(&self, points: &[TrafficPoint]) {
        self.state.lock().unwrap().seed(points);
    }

    /// Snapshot of sessions active within the last hour, for the topology
    /// builder's client list. Idle sessions are excluded here rather than
    /// relying on eviction timing.
    pub fn sessions_snapshot(&self) -> Vec<SessionStats> {
        let cutoff = Utc::now() - SESSION_TTL;
        self.state
            .lock()
            .unwrap()
            .sessions
            .values()
            .filter(|s| s.last_active >= cutoff)
            .cloned()
            .collect()
    }

    /// Drain the queue and stop the worker, deterministically, for tests.
    pub async fn close(&self) {
        self.running.store(false, std::sync::atomic::Ordering::SeqCst);
        let tx = self.tx.lock().await.take();
        drop(tx);
        if let Some(handle) = self.worker.lock().await.take() {
            let _ = handle.await;
        }
    }
}
