// Stream and playback counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

const MAX_LATENCY_SAMPLES: usize = 1000;

/// Counters shared by every stream a player runs.
#[derive(Debug)]
pub struct StreamMetrics {
    pub streams_started: AtomicU64,
    pub request_errors: AtomicU64,
    pub bytes_received: AtomicU64,
    pub late_bytes: AtomicU64,
    pub decoded_playbacks: AtomicU64,
    pub fallback_playbacks: AtomicU64,
    pub trigger_count: AtomicU64,
    pub total_trigger_ms: AtomicU64,
    pub min_trigger_ms: AtomicU64,
    pub max_trigger_ms: AtomicU64,
    trigger_samples: Mutex<Vec<u64>>,
}

impl StreamMetrics {
    pub fn new() -> Self {
        Self {
            streams_started: AtomicU64::new(0),
            request_errors: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            late_bytes: AtomicU64::new(0),
            decoded_playbacks: AtomicU64::new(0),
            fallback_playbacks: AtomicU64::new(0),
            trigger_count: AtomicU64::new(0),
            total_trigger_ms: AtomicU64::new(0),
            min_trigger_ms: AtomicU64::new(u64::MAX),
            max_trigger_ms: AtomicU64::new(0),
            trigger_samples: Mutex::new(Vec::new()),
        }
    }

    pub fn record_stream_started(&self) {
        self.streams_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request_error(&self) {
        self.request_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_late_bytes(&self, bytes: usize) {
        self.late_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_playback(&self, decoded: bool) {
        if decoded {
            self.decoded_playbacks.fetch_add(1, Ordering::Relaxed);
        } else {
            self.fallback_playbacks.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Time from issuing the request to dispatching playback.
    pub fn record_trigger(&self, latency_ms: u64) {
        self.trigger_count.fetch_add(1, Ordering::Relaxed);
        self.total_trigger_ms.fetch_add(latency_ms, Ordering::Relaxed);

        let mut current_min = self.min_trigger_ms.load(Ordering::Relaxed);
        while latency_ms < current_min {
            match self.min_trigger_ms.compare_exchange_weak(
                current_min,
                latency_ms,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => current_min = x,
            }
        }

        let mut current_max = self.max_trigger_ms.load(Ordering::Relaxed);
        while latency_ms > current_max {
            match self.max_trigger_ms.compare_exchange_weak(
                current_max,
                latency_ms,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => current_max = x,
            }
        }

        if let Ok(mut samples) = self.trigger_samples.lock() {
            samples.push(latency_ms);
            if samples.len() > MAX_LATENCY_SAMPLES {
                samples.remove(0);
            }
        }
    }

    pub fn avg_trigger_ms(&self) -> f64 {
        let count = self.trigger_count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.total_trigger_ms.load(Ordering::Relaxed) as f64 / count as f64
    }

    fn percentile(&self, p: u8) -> u64 {
        if let Ok(samples) = self.trigger_samples.lock() {
            if samples.is_empty() {
                return 0;
            }
            let mut sorted = samples.clone();
            sorted.sort_unstable();
            let index = (sorted.len() * p as usize / 100).min(sorted.len() - 1);
            sorted[index]
        } else {
            0
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let min = self.min_trigger_ms.load(Ordering::Relaxed);
        MetricsSnapshot {
            streams_started: self.streams_started.load(Ordering::Relaxed),
            request_errors: self.request_errors.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            late_bytes: self.late_bytes.load(Ordering::Relaxed),
            decoded_playbacks: self.decoded_playbacks.load(Ordering::Relaxed),
            fallback_playbacks: self.fallback_playbacks.load(Ordering::Relaxed),
            trigger: TriggerStats {
                count: self.trigger_count.load(Ordering::Relaxed),
                avg_ms: self.avg_trigger_ms(),
                min_ms: if min == u64::MAX { 0 } else { min },
                max_ms: self.max_trigger_ms.load(Ordering::Relaxed),
                p50_ms: self.percentile(50),
                p95_ms: self.percentile(95),
            },
        }
    }
}

impl Default for StreamMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub streams_started: u64,
    pub request_errors: u64,
    pub bytes_received: u64,
    pub late_bytes: u64,
    pub decoded_playbacks: u64,
    pub fallback_playbacks: u64,
    pub trigger: TriggerStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerStats {
    pub count: u64,
    pub avg_ms: f64,
    pub min_ms: u64,
    pub max_ms: u64,
    pub p50_ms: u64,
    pub p95_ms: u64,
}
