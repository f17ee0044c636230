use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

static REGISTRY: Lazy<MetricsRegistry> = Lazy::new(MetricsRegistry::default);

/// Process-wide registry
pub fn metrics() -> &'static MetricsRegistry {
    &REGISTRY
}

/// Running count/min/max/mean of recorded samples.
///
/// Only aggregates are kept, so a long `watch` session does not grow memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Summary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    #[serde(skip)]
    sum: f64,
}

impl Summary {
    fn record(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
        self.mean = self.sum / self.count as f64;
    }
}

/// Named counters and timing summaries
pub struct MetricsRegistry {
    counters: RwLock<BTreeMap<&'static str, AtomicU64>>,
    timings: Mutex<BTreeMap<&'static str, Summary>>,
    started: Instant,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self {
            counters: RwLock::new(BTreeMap::new()),
            timings: Mutex::new(BTreeMap::new()),
            started: Instant::now(),
        }
    }
}

impl MetricsRegistry {
    pub fn increment(&self, name: &'static str) {
        self.increment_by(name, 1);
    }

    pub fn increment_by(&self, name: &'static str, value: u64) {
        // Poisoning only means a writer panicked; the atomics are still valid.
        {
            let counters = self.counters.read().unwrap_or_else(|e| e.into_inner());
            if let Some(counter) = counters.get(name) {
                counter.fetch_add(value, Ordering::Relaxed);
                return;
            }
        }
        self.counters
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(name)
            .or_default()
            .fetch_add(value, Ordering::Relaxed);
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .map_or(0, |counter| counter.load(Ordering::Relaxed))
    }

    /// Record one sample, in milliseconds by convention
    pub fn record(&self, name: &'static str, value: f64) {
        self.timings().entry(name).or_default().record(value);
    }

    pub fn summary(&self, name: &str) -> Option<Summary> {
        self.timings().get(name).copied()
    }

    pub fn export_json(&self) -> serde_json::Value {
        let counters: BTreeMap<&str, u64> = self
            .counters
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(name, value)| (*name, value.load(Ordering::Relaxed)))
            .collect();

        serde_json::json!({
            "session_id": crate::session_id(),
            "uptime_ms": self.started.elapsed().as_millis() as u64,
            "counters": counters,
            "timings": *self.timings(),
        })
    }

    fn timings(&self) -> MutexGuard<'_, BTreeMap<&'static str, Summary>> {
        self.timings.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Records elapsed milliseconds into the global registry on `stop` or drop
pub struct Timer {
    name: &'static str,
    started: Instant,
    recorded: bool,
}

impl Timer {
    pub fn start(name: &'static str) -> Self {
        Self {
            name,
            started: Instant::now(),
            recorded: false,
        }
    }

    pub fn stop(mut self) -> Duration {
        self.finish()
    }

    fn finish(&mut self) -> Duration {
        let elapsed = self.started.elapsed();
        self.recorded = true;
        metrics().record(self.name, elapsed.as_secs_f64() * 1000.0);
        tracing::trace!(metric = self.name, elapsed_us = elapsed.as_micros() as u64, "timed");
        elapsed
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if !self.recorded {
            self.finish();
        }
    }
}
