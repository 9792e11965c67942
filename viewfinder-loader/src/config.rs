use std::time::Duration;

use thiserror::Error;
use viewfinder_model::Tier;

use crate::telemetry::NetworkClass;

/// Tunables for the loader engine.
///
/// Defaults are the production values; tests and embedders can override
/// individual fields. Capacity and concurrency are fixed for the lifetime
/// of the structures they configure.
#[derive(Debug, Clone)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct LoaderConfig {
    /// Capacity of the process-wide recency set.
    pub recency_capacity: usize,
    /// Maximum simultaneous background probes.
    pub max_concurrent_probes: usize,
    /// Tier the controller upgrades towards on a fresh load.
    pub target_tier: Tier,
    /// Per-probe HTTP timeout in milliseconds.
    pub probe_timeout_ms: u64,
    /// Viewport proximity margin on fast connections, in pixels.
    pub fast_margin_px: u32,
    /// Viewport proximity margin on moderate connections, in pixels.
    pub moderate_margin_px: u32,
    /// Viewport proximity margin on slow connections, in pixels.
    pub slow_margin_px: u32,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            recency_capacity: 500,
            max_concurrent_probes: 5,
            target_tier: Tier::Regular,
            probe_timeout_ms: 30_000,
            fast_margin_px: 1_200,
            moderate_margin_px: 600,
            slow_margin_px: 300,
        }
    }
}

/// Configuration guard-rail violations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("recency_capacity must be non-zero")]
    ZeroRecencyCapacity,

    #[error("max_concurrent_probes must be non-zero")]
    ZeroConcurrency,

    #[error("probe_timeout_ms must be non-zero")]
    ZeroProbeTimeout,
}

impl LoaderConfig {
    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recency_capacity == 0 {
            return Err(ConfigError::ZeroRecencyCapacity);
        }
        if self.max_concurrent_probes == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.probe_timeout_ms == 0 {
            return Err(ConfigError::ZeroProbeTimeout);
        }
        Ok(())
    }

    /// Per-probe HTTP timeout.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Prefetch margin for the given connection estimate: widens on fast
    /// connections to hide latency, shrinks on slow ones to avoid wasted
    /// transfer.
    pub fn prefetch_margin_px(&self, class: NetworkClass) -> u32 {
        match class {
            NetworkClass::Fast => self.fast_margin_px,
            NetworkClass::Moderate => self.moderate_margin_px,
            NetworkClass::Slow => self.slow_margin_px,
        }
    }
}
