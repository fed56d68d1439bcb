//! Data model for the traffic recorder: per-session rolling counters, a
//! per-minute aggregation bucket, and the external-facing history point.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Per-protocol sub-counts tracked both on a session and a minute bucket.
#[derive(Debug, Clone, Default)]
pub struct ServiceCounts {
    pub count: u64,
    pub errors: u64,
    pub latency_ms: u64,
}

/// Rolling per-client counters keyed by derived session-id.
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub id: String,
    pub metadata: HashMap<String, String>,
    pub last_active: DateTime<Utc>,
    pub request_count: u64,
    pub total_latency_ms: u64,
    pub error_count: u64,
    pub per_service: HashMap<String, ServiceCounts>,
}

impl SessionStats {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metadata: HashMap::new(),
            last_active: Utc::now(),
            request_count: 0,
            total_latency_ms: 0,
            error_count: 0,
            per_service: HashMap::new(),
        }
    }
}

/// Aggregation bucket keyed by the Unix minute (`floor(now, 1m).unix()`).
#[derive(Debug, Clone, Default)]
pub struct MinuteStats {
    pub requests: u64,
    pub errors: u64,
    pub latency_sum_ms: u64,
    pub per_service: HashMap<String, ServiceCounts>,
}

/// External-facing minute sample returned by `GetTrafficHistory`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficPoint {
    pub time: String,
    pub total: u64,
    pub errors: u64,
    pub latency_avg_ms: u64,
}

/// Aggregate totals returned by `GetStats`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrafficStats {
    pub total_requests: u64,
    pub avg_latency_ms: f64,
    pub error_rate: f64,
}
