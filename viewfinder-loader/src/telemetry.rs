use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// Coarse connection-speed estimate derived from recent probe latencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkClass {
    Fast,
    Moderate,
    Slow,
}

/// Rolling window of probe latencies shared by all controllers.
///
/// Feeds the visibility scheduler's prefetch margin: fast connections
/// widen the margin to hide latency, slow ones shrink it to cut wasted
/// prefetch. Until enough samples exist the estimate is `Moderate`.
#[derive(Debug, Clone, Default)]
pub struct ProbeTelemetry {
    probe_ms: Arc<Mutex<VecDeque<u64>>>,
}

impl ProbeTelemetry {
    const WINDOW: usize = 128;
    const MIN_SAMPLES: usize = 8;

    /// Latency band below which the connection counts as fast.
    const FAST_BELOW_MS: u64 = 150;
    /// Latency band above which the connection counts as slow.
    const SLOW_ABOVE_MS: u64 = 500;

    pub fn new() -> Self {
        Self::default()
    }

    /// Record one successful probe's wall-clock duration.
    pub fn record_probe(&self, duration: Duration) {
        let value = duration.as_millis() as u64;
        let mut data = self.probe_ms.lock();
        data.push_back(value);
        if data.len() > Self::WINDOW {
            data.pop_front();
        }
    }

    fn percentile(sorted: &[u64], pct: f64) -> u64 {
        if sorted.is_empty() {
            return 0;
        }
        let rank = ((sorted.len() as f64 - 1.0) * pct).round() as usize;
        sorted[rank.min(sorted.len() - 1)]
    }

    /// Median probe latency in ms, or `None` with insufficient samples.
    pub fn median_probe_ms(&self) -> Option<u64> {
        let data = self.probe_ms.lock();
        if data.len() < Self::MIN_SAMPLES {
            return None;
        }
        let mut sorted: Vec<u64> = data.iter().copied().collect();
        sorted.sort_unstable();
        Some(Self::percentile(&sorted, 0.5))
    }

    /// Current connection estimate.
    pub fn network_class(&self) -> NetworkClass {
        let Some(median_ms) = self.median_probe_ms() else {
            return NetworkClass::Moderate;
        };
        let class = if median_ms < Self::FAST_BELOW_MS {
            NetworkClass::Fast
        } else if median_ms > Self::SLOW_ABOVE_MS {
            NetworkClass::Slow
        } else {
            NetworkClass::Moderate
        };
        log::trace!("network class {class:?} (median {median_ms}ms)");
        class
    }
}
