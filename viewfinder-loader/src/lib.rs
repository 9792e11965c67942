//! Progressive media delivery engine for the Viewfinder gallery client.
//!
//! For every visible or soon-to-be-visible image this crate decides which
//! resolution tier to request, when to request it, and how many probes may
//! run at once; it remembers what has already rendered so a remounted view
//! never re-shows a loading flash, and it reconciles codec fallbacks so the
//! visible image never regresses in quality.
//!
//! The pieces, leaf-first:
//!
//! - [`recency::BoundedRecencySet`] — fixed-capacity LRU memory of
//!   already-rendered resource URLs, shared process-wide.
//! - [`limiter::ConcurrencyLimiter`] — FIFO cap on simultaneous probes.
//! - [`telemetry::ProbeTelemetry`] — rolling probe latencies feeding the
//!   network-class estimate.
//! - [`visibility::VisibilityScheduler`] — promotes an image to "eligible
//!   to load" as its placeholder nears the viewport.
//! - [`prober`] — the actual fetch, behind an injectable trait.
//! - [`controller::ImageLifecycleController`] — the per-image state
//!   machine tying it all together.

pub mod config;
pub mod controller;
pub mod error;
pub mod limiter;
pub mod prober;
pub mod recency;
pub mod telemetry;
pub mod visibility;

pub use config::LoaderConfig;
pub use controller::{
    ImageLifecycleController, LoaderContext, MountOptions, SurfaceUpdate,
};
pub use error::{LoadError, ProbeError};
pub use limiter::{ConcurrencyLimiter, ProbeSlot};
pub use prober::{FetchPriority, HttpProber, ImageProber};
pub use recency::BoundedRecencySet;
pub use telemetry::{NetworkClass, ProbeTelemetry};
pub use visibility::{
    ObservationId, SurfaceTarget, ViewportObserver, VisibilityScheduler,
};
