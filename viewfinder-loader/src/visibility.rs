use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::LoaderConfig;
use crate::telemetry::ProbeTelemetry;

/// Opaque handle to a render-surface placeholder in the host view tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceTarget(pub u64);

/// Identifier for one registered observation, used to disconnect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObservationId(pub u64);

/// Injectable viewport-proximity capability.
///
/// The production implementation binds whatever geometry machinery the
/// host platform offers; tests inject a fake that fires synchronously.
/// Implementations must invoke the callback at most once per `observe`
/// call, and should fire on the next frame (not a geometry event) when the
/// target is already inside the margin at observation time, so content
/// that mounts on-screen has no dead zone.
pub trait ViewportObserver: Send + Sync {
    /// Watch `target`; invoke `on_approaching` once it comes within
    /// `margin_px` of the viewport.
    fn observe(
        &self,
        target: SurfaceTarget,
        margin_px: u32,
        on_approaching: Box<dyn FnOnce() + Send>,
    ) -> ObservationId;

    /// Stop watching. Disconnecting an already-fired or unknown
    /// observation is a no-op.
    fn disconnect(&self, id: ObservationId);
}

impl fmt::Debug for dyn ViewportObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ViewportObserver")
    }
}

/// Promotes an image from idle to eligible-to-load as its placeholder
/// nears the viewport.
///
/// The proximity margin is tuned to the current connection estimate, and
/// an explicit eager flag (above-the-fold content) bypasses observation
/// entirely.
#[derive(Debug, Clone)]
pub struct VisibilityScheduler {
    observer: Arc<dyn ViewportObserver>,
    telemetry: ProbeTelemetry,
    config: LoaderConfig,
}

/// Cancellation handle for a scheduled observation.
///
/// Cancelling after the callback fired, or for an eager schedule, is a
/// no-op.
#[derive(Debug)]
pub struct ObservationHandle {
    observer: Option<Arc<dyn ViewportObserver>>,
    slot: Arc<Mutex<Slot>>,
}

#[derive(Debug, Default)]
struct Slot {
    id: Option<ObservationId>,
    done: bool,
}

impl VisibilityScheduler {
    pub fn new(
        observer: Arc<dyn ViewportObserver>,
        telemetry: ProbeTelemetry,
        config: LoaderConfig,
    ) -> Self {
        Self {
            observer,
            telemetry,
            config,
        }
    }

    /// Margin the next observation will use.
    pub fn current_margin_px(&self) -> u32 {
        self.config.prefetch_margin_px(self.telemetry.network_class())
    }

    /// Fire `on_approaching` when `target` nears the viewport, or
    /// immediately when `eager` is set. The callback fires at most once
    /// and the observation auto-disconnects after firing.
    pub fn schedule(
        &self,
        target: SurfaceTarget,
        eager: bool,
        on_approaching: impl FnOnce() + Send + 'static,
    ) -> ObservationHandle {
        if eager {
            log::trace!("eager schedule for {target:?}, bypassing observer");
            on_approaching();
            return ObservationHandle {
                observer: None,
                slot: Arc::new(Mutex::new(Slot {
                    id: None,
                    done: true,
                })),
            };
        }

        let margin_px = self.current_margin_px();
        log::trace!("observing {target:?} with margin {margin_px}px");

        let slot = Arc::new(Mutex::new(Slot::default()));
        let wrapped = {
            let slot = Arc::clone(&slot);
            let observer = Arc::clone(&self.observer);
            Box::new(move || {
                let id = {
                    let mut slot = slot.lock();
                    if slot.done {
                        return;
                    }
                    slot.done = true;
                    slot.id.take()
                };
                if let Some(id) = id {
                    observer.disconnect(id);
                }
                on_approaching();
            })
        };

        let id = self.observer.observe(target, margin_px, wrapped);
        {
            let mut guard = slot.lock();
            if guard.done {
                // Fired synchronously before the id came back; nothing
                // left to disconnect later.
                self.observer.disconnect(id);
            } else {
                guard.id = Some(id);
            }
        }

        ObservationHandle {
            observer: Some(Arc::clone(&self.observer)),
            slot,
        }
    }
}

impl ObservationHandle {
    /// Detach the observation so the callback can no longer fire.
    pub fn cancel(&self) {
        let id = {
            let mut slot = self.slot.lock();
            if slot.done {
                return;
            }
            slot.done = true;
            slot.id.take()
        };
        if let (Some(observer), Some(id)) = (self.observer.as_ref(), id) {
            observer.disconnect(id);
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{ObservationId, SurfaceTarget, ViewportObserver};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    type Callback = Box<dyn FnOnce() + Send>;

    /// Recording observer whose observations are fired by the test.
    #[derive(Default)]
    pub struct FakeObserver {
        next_id: AtomicU64,
        pending: Mutex<HashMap<u64, (SurfaceTarget, u32, Callback)>>,
        pub disconnected: Mutex<Vec<ObservationId>>,
    }

    impl FakeObserver {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Number of observations that have not fired or disconnected.
        pub fn pending(&self) -> usize {
            self.pending.lock().len()
        }

        /// Margin the most recent observation registered with.
        pub fn last_margin(&self) -> Option<u32> {
            let pending = self.pending.lock();
            pending.values().map(|(_, margin, _)| *margin).next()
        }

        /// Fire every pending observation, as if all targets scrolled
        /// into their margins at once.
        pub fn fire_all(&self) {
            let drained: Vec<Callback> = {
                let mut pending = self.pending.lock();
                pending.drain().map(|(_, (_, _, cb))| cb).collect()
            };
            for cb in drained {
                cb();
            }
        }
    }

    impl ViewportObserver for FakeObserver {
        fn observe(
            &self,
            target: SurfaceTarget,
            margin_px: u32,
            on_approaching: Callback,
        ) -> ObservationId {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            self.pending
                .lock()
                .insert(id, (target, margin_px, on_approaching));
            ObservationId(id)
        }

        fn disconnect(&self, id: ObservationId) {
            self.pending.lock().remove(&id.0);
            self.disconnected.lock().push(id);
        }
    }
}
