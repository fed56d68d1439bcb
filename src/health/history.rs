//! Bounded per-service history ring and the global system-wide uptime
//! timeline, shaped after the session-history ring buffer idiom.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{Duration as ChronoDuration, Utc};

use crate::health::types::{HealthRecord, SystemTimelinePoint};

/// Default per-service ring capacity in production.
pub const DEFAULT_HISTORY_SIZE: usize = 20_000;
/// Default per-service ring capacity under test.
pub const TEST_HISTORY_SIZE: usize = 1_000;
/// Number of points retained in the global timeline (24h at 1/minute).
pub const GLOBAL_TIMELINE_CAP: usize = 1_440;

/// Per-service bounded ring plus the global system timeline.
pub struct HealthHistory {
    cap: usize,
    per_service: Mutex<HashMap<String, VecDeque<HealthRecord>>>,
    global: Mutex<VecDeque<SystemTimelinePoint>>,
}

impl HealthHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            per_service: Mutex::new(HashMap::new()),
            global: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_default_cap() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }

    /// Append a record to its service's ring, dropping the oldest entry once
    /// `len > cap`.
    pub fn append(&self, record: HealthRecord) {
        let mut services = self.per_service.lock().unwrap();
        let ring = services.entry(record.service_name.clone()).or_default();
        ring.push_back(record);
        while ring.len() > self.cap {
            ring.pop_front();
        }
    }

    /// Return a cloned snapshot of one service's ring, oldest first.
    pub fn service_history(&self, service_name: &str) -> Vec<HealthRecord> {
        let services = self.per_service.lock().unwrap();
        services
            .get(service_name)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Compute and append one global timeline point. Seeds 24h of synthetic
    /// points first if the timeline is empty, so the UI has content
    /// immediately on first write.
    pub fn record_global_point(&self, healthy_services: u32, total_services: u32) {
        let uptime_pct = if total_services == 0 {
            100.0
        } else {
            (healthy_services as f64 / total_services as f64) * 100.0
        };

        let mut global = self.global.lock().unwrap();
        if global.is_empty() {
            self.seed_locked(&mut global, uptime_pct);
        }

        global.push_back(SystemTimelinePoint {
            timestamp: Utc::now(),
            healthy_services,
            total_services,
            uptime_pct,
        });
        while global.len() > GLOBAL_TIMELINE_CAP {
            global.pop_front();
        }
    }

    fn seed_locked(&self, global: &mut VecDeque<SystemTimelinePoint>, uptime_pct: f64) {
        let now = Utc::now();
        for i in (1..GLOBAL_TIMELINE_CAP).rev() {
            global.push_back(SystemTimelinePoint {
                timestamp: now - ChronoDuration::minutes(i as i64),
                healthy_services: 0,
                total_services: 0,
                uptime_pct,
            });
        }
    }

    /// Cloned snapshot of the global timeline, oldest first.
    pub fn global_timeline(&self) -> Vec<SystemTimelinePoint> {
        let global = self.global.lock().unwrap();
        global.iter().cloned().collect()
    }
}

impl Default for HealthHistory {
    fn default() -> Self {
        Self::with_default_cap()
    }
}
