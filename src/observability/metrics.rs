//! Thread-safe metrics collection
//!
//! Atomic counters for every pipeline stage plus a bounded latency buffer.
//! Counters answer the operational questions that matter for a local
//! router: how often the cache saves a model call, how often the external
//! classifier times out, and how often the shadow model disagrees.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::decision::ResolverStage;

/// Global metrics collector instance
pub static METRICS: Lazy<RouterMetrics> = Lazy::new(RouterMetrics::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static RouterMetrics {
    &METRICS
}

/// Thread-safe metrics collector using atomics
pub struct RouterMetrics {
    // Request flow (atomic for high frequency)
    requests_received: AtomicU64,
    guardrail_unlocks: AtomicU64,
    guardrail_blocks: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,

    // Per-stage resolution counts
    resolved_semantic: AtomicU64,
    resolved_classifier: AtomicU64,
    resolved_fallback: AtomicU64,

    // External classifier health
    classifier_timeouts: AtomicU64,
    classifier_errors: AtomicU64,

    // Out-of-band work
    shadow_runs: AtomicU64,
    shadow_disagreements: AtomicU64,
    shadow_failures: AtomicU64,
    trace_write_failures: AtomicU64,
    corpus_items_learned: AtomicU64,

    // Routing latency in milliseconds (mutex protected, bounded)
    routing_latencies: Mutex<Vec<u64>>,

    uptime_start: AtomicU64,
}

impl RouterMetrics {
    pub fn new() -> Self {
        Self {
            requests_received: AtomicU64::new(0),
            guardrail_unlocks: AtomicU64::new(0),
            guardrail_blocks: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            resolved_semantic: AtomicU64::new(0),
            resolved_classifier: AtomicU64::new(0),
            resolved_fallback: AtomicU64::new(0),
            classifier_timeouts: AtomicU64::new(0),
            classifier_errors: AtomicU64::new(0),
            shadow_runs: AtomicU64::new(0),
            shadow_disagreements: AtomicU64::new(0),
            shadow_failures: AtomicU64::new(0),
            trace_write_failures: AtomicU64::new(0),
            corpus_items_learned: AtomicU64::new(0),
            routing_latencies: Mutex::new(Vec::new()),
            uptime_start: AtomicU64::new(current_timestamp()),
        }
    }

    pub fn request_received(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn guardrail_unlock(&self) {
        self.guardrail_unlocks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn guardrail_block(&self) {
        self.guardrail_blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Count which stage produced the final classification
    pub fn stage_resolved(&self, stage: ResolverStage) {
        match stage {
            ResolverStage::Semantic => {
                self.resolved_semantic.fetch_add(1, Ordering::Relaxed);
            }
            ResolverStage::Classifier => {
                self.resolved_classifier.fetch_add(1, Ordering::Relaxed);
            }
            ResolverStage::Fallback => {
                self.resolved_fallback.fetch_add(1, Ordering::Relaxed);
            }
            // Guardrail and cache outcomes have dedicated counters
            ResolverStage::Guardrail | ResolverStage::Cache => {}
        }
    }

    pub fn classifier_timeout(&self) {
        self.classifier_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn classifier_error(&self) {
        self.classifier_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn shadow_run(&self) {
        self.shadow_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn shadow_disagreement(&self) {
        self.shadow_disagreements.fetch_add(1, Ordering::Relaxed);
    }

    pub fn shadow_failure(&self) {
        self.shadow_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn trace_write_failed(&self) {
        self.trace_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn corpus_item_learned(&self) {
        self.corpus_items_learned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_routing_latency(&self, duration: Duration) {
        if let Ok(mut latencies) = self.routing_latencies.lock() {
            latencies.push(duration.as_millis() as u64);

            // Limit to last 1000 measurements to prevent unbounded growth
            if latencies.len() > 1000 {
                latencies.remove(0);
            }
        }
    }

    fn latency_statistics(&self) -> (f64, f64, f64, f64) {
        if let Ok(latencies) = self.routing_latencies.lock() {
            if latencies.is_empty() {
                (0.0, 0.0, 0.0, 0.0)
            } else {
                let mut sorted = latencies.clone();
                sorted.sort_unstable();

                let avg = sorted.iter().sum::<u64>() as f64 / sorted.len() as f64;
                let p50 = percentile(&sorted, 50.0);
                let p95 = percentile(&sorted, 95.0);
                let p99 = percentile(&sorted, 99.0);

                (avg, p50, p95, p99)
            }
        } else {
            (0.0, 0.0, 0.0, 0.0)
        }
    }

    // Reset all metrics (useful for testing)
    pub fn reset(&self) {
        self.requests_received.store(0, Ordering::Relaxed);
        self.guardrail_unlocks.store(0, Ordering::Relaxed);
        self.guardrail_blocks.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.resolved_semantic.store(0, Ordering::Relaxed);
        self.resolved_classifier.store(0, Ordering::Relaxed);
        self.resolved_fallback.store(0, Ordering::Relaxed);
        self.classifier_timeouts.store(0, Ordering::Relaxed);
        self.classifier_errors.store(0, Ordering::Relaxed);
        self.shadow_runs.store(0, Ordering::Relaxed);
        self.shadow_disagreements.store(0, Ordering::Relaxed);
        self.shadow_failures.store(0, Ordering::Relaxed);
        self.trace_write_failures.store(0, Ordering::Relaxed);
        self.corpus_items_learned.store(0, Ordering::Relaxed);
        self.uptime_start
            .store(current_timestamp(), Ordering::Relaxed);
        if let Ok(mut latencies) = self.routing_latencies.lock() {
            latencies.clear();
        }
    }

    /// Get complete metrics snapshot
    pub fn get_metrics(&self) -> MetricsSnapshot {
        let now = current_timestamp();
        let (avg_latency_ms, p50, p95, p99) = self.latency_statistics();

        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let hit_rate = if hits + misses == 0 {
            0.0
        } else {
            hits as f64 / (hits + misses) as f64
        };

        MetricsSnapshot {
            requests: RequestMetrics {
                received: self.requests_received.load(Ordering::Relaxed),
                guardrail_unlocks: self.guardrail_unlocks.load(Ordering::Relaxed),
                guardrail_blocks: self.guardrail_blocks.load(Ordering::Relaxed),
                avg_latency_ms,
                latency_p50_ms: p50,
                latency_p95_ms: p95,
                latency_p99_ms: p99,
            },
            cache: CacheMetrics {
                hits,
                misses,
                hit_rate,
            },
            stages: StageMetrics {
                semantic: self.resolved_semantic.load(Ordering::Relaxed),
                classifier: self.resolved_classifier.load(Ordering::Relaxed),
                fallback: self.resolved_fallback.load(Ordering::Relaxed),
                classifier_timeouts: self.classifier_timeouts.load(Ordering::Relaxed),
                classifier_errors: self.classifier_errors.load(Ordering::Relaxed),
            },
            background: BackgroundMetrics {
                shadow_runs: self.shadow_runs.load(Ordering::Relaxed),
                shadow_disagreements: self.shadow_disagreements.load(Ordering::Relaxed),
                shadow_failures: self.shadow_failures.load(Ordering::Relaxed),
                trace_write_failures: self.trace_write_failures.load(Ordering::Relaxed),
                corpus_items_learned: self.corpus_items_learned.load(Ordering::Relaxed),
            },
            uptime_seconds: now.saturating_sub(self.uptime_start.load(Ordering::Relaxed)),
            timestamp: now,
        }
    }
}

impl Default for RouterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

// Public metrics structures
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub requests: RequestMetrics,
    pub cache: CacheMetrics,
    pub stages: StageMetrics,
    pub background: BackgroundMetrics,
    pub uptime_seconds: u64,
    pub timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct RequestMetrics {
    pub received: u64,
    pub guardrail_unlocks: u64,
    pub guardrail_blocks: u64,
    pub avg_latency_ms: f64,
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
    pub latency_p99_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct StageMetrics {
    pub semantic: u64,
    pub classifier: u64,
    pub fallback: u64,
    pub classifier_timeouts: u64,
    pub classifier_errors: u64,
}

#[derive(Debug, Serialize)]
pub struct BackgroundMetrics {
    pub shadow_runs: u64,
    pub shadow_disagreements: u64,
    pub shadow_failures: u64,
    pub trace_write_failures: u64,
    pub corpus_items_learned: u64,
}

// Helper functions
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn percentile(sorted_data: &[u64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let len = sorted_data.len();
    let index = (percentile / 100.0) * (len - 1) as f64;

    if index.fract() == 0.0 {
        sorted_data[index as usize] as f64
    } else {
        let lower_index = index.floor() as usize;
        let upper_index = index.ceil() as usize;
        let lower_value = sorted_data[lower_index] as f64;
        let upper_value = sorted_data[upper_index] as f64;

        lower_value + (upper_value - lower_value) * index.fract()
    }
}
