use thiserror::Error;
use viewfinder_model::Tier;

/// Errors from a single probe attempt against one resource URL.
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {url}")]
    Status { status: u16, url: String },

    #[error("probe timed out")]
    Timeout,

    #[error("cancelled")]
    Cancelled,
}

impl ProbeError {
    /// Whether the probe was torn down deliberately rather than failing.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Load failures as seen by the lifecycle controller.
///
/// Only [`LoadError::Total`] ever reaches the render surface; tier-scoped
/// failures fall back to the previous good tier and stale completions are
/// discarded without a trace beyond a log line.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Every candidate for a non-first tier failed; the prior tier stays
    /// on screen and upgrades stop for this mount.
    #[error("all candidates failed for {tier}")]
    Tier {
        tier: Tier,
        #[source]
        source: ProbeError,
    },

    /// The first tier attempted also failed; no displayable image exists.
    #[error("no displayable image: first tier failed")]
    Total {
        #[source]
        source: ProbeError,
    },

    /// A completion arrived after its generation was superseded.
    #[error("stale completion for superseded generation")]
    Stale,
}
