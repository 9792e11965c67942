use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use viewfinder_model::{ResourceUrl, Tier, TierLadder, WidthDescriptor};

use crate::config::{ConfigError, LoaderConfig};
use crate::error::{LoadError, ProbeError};
use crate::limiter::ConcurrencyLimiter;
use crate::prober::{FetchPriority, ImageProber};
use crate::recency::BoundedRecencySet;
use crate::telemetry::ProbeTelemetry;
use crate::visibility::{
    ObservationHandle, SurfaceTarget, ViewportObserver, VisibilityScheduler,
};

/// Process-wide collaborators shared by every controller instance.
///
/// Constructed once at startup and passed in explicitly; tests build a
/// fresh context per case instead of reaching for ambient singletons.
#[derive(Debug, Clone)]
pub struct LoaderContext {
    pub config: LoaderConfig,
    pub recency: BoundedRecencySet,
    pub limiter: ConcurrencyLimiter,
    pub scheduler: VisibilityScheduler,
    pub prober: Arc<dyn ImageProber>,
    pub telemetry: ProbeTelemetry,
    /// Runtime the load tasks spawn onto; visibility callbacks may fire
    /// off-runtime.
    pub runtime: Handle,
}

impl LoaderContext {
    pub fn new(
        config: LoaderConfig,
        observer: Arc<dyn ViewportObserver>,
        prober: Arc<dyn ImageProber>,
        runtime: Handle,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let telemetry = ProbeTelemetry::new();
        Ok(Self {
            recency: BoundedRecencySet::new(config.recency_capacity),
            limiter: ConcurrencyLimiter::new(config.max_concurrent_probes),
            scheduler: VisibilityScheduler::new(
                observer,
                telemetry.clone(),
                config.clone(),
            ),
            prober,
            telemetry,
            runtime,
            config,
        })
    }
}

/// Placement configuration supplied by the caller at mount time.
#[derive(Debug, Clone, Copy)]
pub struct MountOptions {
    /// Placeholder element the visibility scheduler watches.
    pub surface: SurfaceTarget,
    /// Above-the-fold content: bypass the scheduler and load immediately.
    pub eager: bool,
    /// Transfer priority forwarded to the prober unchanged.
    pub fetch_priority: FetchPriority,
}

impl MountOptions {
    pub fn new(surface: SurfaceTarget) -> Self {
        Self {
            surface,
            eager: false,
            fetch_priority: FetchPriority::Auto,
        }
    }

    pub fn eager(mut self, eager: bool) -> Self {
        self.eager = eager;
        self
    }

    pub fn fetch_priority(mut self, priority: FetchPriority) -> Self {
        self.fetch_priority = priority;
        self
    }
}

/// What the render surface should paint right now.
///
/// Re-emitted on every state transition. `stable` suppresses fade-in for
/// content that was already cached at mount; `error` is set only when the
/// first tier attempted produced nothing displayable.
#[derive(Debug, Clone, Default)]
pub struct SurfaceUpdate {
    pub url: Option<ResourceUrl>,
    pub tier: Option<Tier>,
    pub stable: bool,
    pub error: bool,
    pub width_descriptors: Arc<[WidthDescriptor]>,
}

/// Per-image state machine: owns the displayed identifier, the stable
/// flag, and a monotonic generation guard that discards completions from
/// a superseded subject when the instance is recycled for another image.
#[derive(Debug)]
pub struct ImageLifecycleController {
    ctx: LoaderContext,
    shared: Arc<Shared>,
    observation: Mutex<Option<ObservationHandle>>,
    cancel: Mutex<Option<oneshot::Sender<()>>>,
}

#[derive(Debug)]
struct Shared {
    generation: AtomicU64,
    display: Mutex<SurfaceUpdate>,
    updates: watch::Sender<SurfaceUpdate>,
}

impl Shared {
    fn new() -> Self {
        let initial = SurfaceUpdate::default();
        let (updates, _) = watch::channel(initial.clone());
        Self {
            generation: AtomicU64::new(0),
            display: Mutex::new(initial),
            updates,
        }
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Start a new subject: supersede in-flight work and reset the
    /// surface to a blank update carrying the new width manifest.
    fn begin_generation(
        &self,
        width_descriptors: Arc<[WidthDescriptor]>,
    ) -> u64 {
        let mut display = self.display.lock();
        let generation =
            self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *display = SurfaceUpdate {
            width_descriptors,
            ..SurfaceUpdate::default()
        };
        self.updates.send_replace(display.clone());
        generation
    }

    /// Show `url` at `tier` unless the completion is stale or would
    /// downgrade what is on screen.
    fn try_display(
        &self,
        generation: u64,
        url: ResourceUrl,
        tier: Tier,
        stable: bool,
    ) -> bool {
        let mut display = self.display.lock();
        if self.generation() != generation {
            log::trace!("{}: {url}", LoadError::Stale);
            return false;
        }
        if let Some(shown) = display.tier
            && tier.rank() <= shown.rank()
        {
            // Never downgrade the visible image, even when a smaller
            // tier's probe completes after a larger one.
            log::trace!(
                "discarding {tier} completion; already showing {shown}"
            );
            return false;
        }
        display.url = Some(url);
        display.tier = Some(tier);
        display.stable = stable;
        display.error = false;
        self.updates.send_replace(display.clone());
        true
    }

    /// Supersede the live generation without starting a new subject.
    /// Taken under the display lock so a completion that already passed
    /// its generation check cannot emit afterwards.
    fn supersede(&self) {
        let _display = self.display.lock();
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Flag the true broken-image case; a no-op once anything displayed.
    fn try_error(&self, generation: u64) -> bool {
        let mut display = self.display.lock();
        if self.generation() != generation || display.url.is_some() {
            return false;
        }
        display.error = true;
        self.updates.send_replace(display.clone());
        true
    }
}

impl ImageLifecycleController {
    pub fn new(ctx: LoaderContext) -> Self {
        Self {
            ctx,
            shared: Arc::new(Shared::new()),
            observation: Mutex::new(None),
            cancel: Mutex::new(None),
        }
    }

    /// Subscribe to surface updates without mounting.
    pub fn updates(&self) -> watch::Receiver<SurfaceUpdate> {
        self.shared.updates.subscribe()
    }

    /// The update the surface should currently paint.
    pub fn current(&self) -> SurfaceUpdate {
        self.shared.updates.borrow().clone()
    }

    /// Mount a subject. Runs the synchronous cache check before first
    /// paint; on a miss, registers with the visibility scheduler (or
    /// starts immediately when eager) and probes tier by tier.
    ///
    /// Mounting over a live subject is retargeting: the generation
    /// advances and in-flight work for the old subject is cancelled.
    pub fn mount(
        &self,
        ladder: TierLadder,
        options: MountOptions,
    ) -> watch::Receiver<SurfaceUpdate> {
        self.teardown();
        let generation =
            self.shared.begin_generation(ladder.width_descriptors());
        log::debug!(
            "mount image {} (generation {generation}, eager {})",
            ladder.id(),
            options.eager
        );

        // CacheCheck: one synchronous set lookup, before first paint. A
        // hit displays with `stable` set so no fade transition plays, and
        // issues no network activity for this mount.
        if let Some((url, tier)) = self.cache_check(&ladder) {
            self.ctx.recency.touch(&url);
            self.shared.try_display(generation, url, tier, true);
            return self.shared.updates.subscribe();
        }

        let (cancel_tx, cancel_rx) = oneshot::channel();
        *self.cancel.lock() = Some(cancel_tx);

        let shared = Arc::clone(&self.shared);
        let ctx = self.ctx.clone();
        let priority = options.fetch_priority;
        let runtime = self.ctx.runtime.clone();
        let handle = self.ctx.scheduler.schedule(
            options.surface,
            options.eager,
            move || {
                runtime.spawn(run_load(
                    shared, ctx, ladder, generation, priority, cancel_rx,
                ));
            },
        );
        *self.observation.lock() = Some(handle);

        self.shared.updates.subscribe()
    }

    /// Reuse this instance for a different image (view recycling).
    pub fn retarget(
        &self,
        ladder: TierLadder,
        options: MountOptions,
    ) -> watch::Receiver<SurfaceUpdate> {
        self.mount(ladder, options)
    }

    /// Detach from the surface: supersede the generation, stop watching
    /// visibility, and abort any in-flight probe so its limiter slot
    /// frees immediately instead of waiting out a network timeout.
    pub fn unmount(&self) {
        self.teardown();
        self.shared.supersede();
    }

    fn teardown(&self) {
        if let Some(observation) = self.observation.lock().take() {
            observation.cancel();
        }
        if let Some(cancel) = self.cancel.lock().take() {
            let _ = cancel.send(());
        }
    }

    // Best immediately-available quality wins: walk down from the target
    // tier and display the highest cached candidate.
    fn cache_check(
        &self,
        ladder: &TierLadder,
    ) -> Option<(ResourceUrl, Tier)> {
        let mut tier = if ladder.is_animated() {
            Tier::Original
        } else {
            self.ctx.config.target_tier
        };
        loop {
            for candidate in ladder.candidates(tier) {
                if self.ctx.recency.has(&candidate) {
                    return Some((candidate, tier));
                }
            }
            if ladder.is_animated() {
                // The collapsed ladder has one candidate at every tier.
                return None;
            }
            tier = tier.previous()?;
        }
    }
}

impl Drop for ImageLifecycleController {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Tier-by-tier load loop for one mount generation.
///
/// Each tier takes one limiter slot for the duration of its candidate
/// attempts; cancellation (unmount or retarget) aborts the in-flight
/// probe and releases the slot immediately. Completions tagged with a
/// superseded generation never touch shared state.
async fn run_load(
    shared: Arc<Shared>,
    ctx: LoaderContext,
    ladder: TierLadder,
    generation: u64,
    priority: FetchPriority,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let target_tier = ctx.config.target_tier;
    let mut tier = ladder.first_tier();
    let mut displayed_any = false;

    loop {
        if shared.generation() != generation {
            return;
        }

        let candidates = ladder.candidates(tier);
        if let Some(hit) =
            candidates.iter().find(|url| ctx.recency.has(url))
        {
            // Already cached (e.g. by another controller); no probe.
            ctx.recency.touch(hit);
            shared.try_display(generation, hit.clone(), tier, true);
        } else {
            let slot = tokio::select! {
                biased;
                _ = &mut cancel_rx => {
                    log::trace!("load for {} cancelled in queue", ladder.id());
                    return;
                }
                slot = ctx.limiter.admit() => slot,
            };

            let mut loaded = false;
            let mut last_error: Option<ProbeError> = None;
            for url in &candidates {
                let started = Instant::now();
                let result = tokio::select! {
                    biased;
                    _ = &mut cancel_rx => {
                        log::trace!(
                            "probe of {url} cancelled mid-flight"
                        );
                        return;
                    }
                    result = ctx.prober.probe(url, priority) => result,
                };

                match result {
                    Ok(()) => {
                        ctx.telemetry.record_probe(started.elapsed());
                        if shared.generation() != generation {
                            log::trace!("{}: {url}", LoadError::Stale);
                            return;
                        }
                        ctx.recency.touch(url);
                        shared.try_display(
                            generation,
                            url.clone(),
                            tier,
                            false,
                        );
                        loaded = true;
                        break;
                    }
                    Err(error) if error.is_cancelled() => return,
                    Err(error) => {
                        log::debug!("probe failed for {url}: {error}");
                        last_error = Some(error);
                    }
                }
            }
            drop(slot);

            if !loaded {
                let source = last_error.unwrap_or_else(|| {
                    ProbeError::Network("no candidates".to_owned())
                });
                if displayed_any {
                    log::debug!(
                        "{}; keeping prior tier",
                        LoadError::Tier { tier, source }
                    );
                } else {
                    log::warn!(
                        "image {}: {}",
                        ladder.id(),
                        LoadError::Total { source }
                    );
                    shared.try_error(generation);
                }
                return;
            }
        }

        displayed_any = true;
        if tier == target_tier {
            return;
        }
        tier = match tier.next() {
            Some(next) => next,
            None => return,
        };
    }
}
