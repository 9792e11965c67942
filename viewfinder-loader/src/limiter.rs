use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Caps the number of simultaneous background probes.
///
/// Without a cap, a scrolled feed fires hundreds of speculative fetches
/// and the socket pool starves the currently visible ones behind work far
/// below the fold. Admission is FIFO: callers that cannot be admitted
/// queue and are handed the slot on the next release. A queued caller
/// abandons its place by dropping the [`ConcurrencyLimiter::admit`]
/// future; the dead waiter is skipped when its turn comes, with no other
/// side effects.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    limit: usize,
    state: Mutex<State>,
}

#[derive(Debug)]
struct State {
    active: usize,
    waiters: VecDeque<oneshot::Sender<ProbeSlot>>,
}

/// An admitted probe's slot. Releasing is dropping; the slot is handed
/// directly to the next live waiter without the active count ever
/// exceeding the limit.
#[derive(Debug)]
pub struct ProbeSlot {
    inner: Option<Arc<Inner>>,
}

impl ConcurrencyLimiter {
    /// Create a limiter admitting at most `limit` concurrent probes.
    pub fn new(limit: usize) -> Self {
        assert!(limit > 0, "probe limit must be non-zero");
        Self {
            inner: Arc::new(Inner {
                limit,
                state: Mutex::new(State {
                    active: 0,
                    waiters: VecDeque::new(),
                }),
            }),
        }
    }

    /// Non-blocking admission; `None` when the cap is reached.
    pub fn try_admit(&self) -> Option<ProbeSlot> {
        let mut state = self.inner.state.lock();
        if state.active < self.inner.limit {
            state.active += 1;
            Some(ProbeSlot {
                inner: Some(Arc::clone(&self.inner)),
            })
        } else {
            None
        }
    }

    /// Admission that waits its FIFO turn. Dropping the returned future
    /// while queued is cancellation.
    pub async fn admit(&self) -> ProbeSlot {
        loop {
            let rx = {
                let mut state = self.inner.state.lock();
                if state.active < self.inner.limit {
                    state.active += 1;
                    return ProbeSlot {
                        inner: Some(Arc::clone(&self.inner)),
                    };
                }
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                rx
            };

            if let Ok(slot) = rx.await {
                return slot;
            }
            // Sender dropped without a hand-off (limiter torn down mid
            // wait); fall through and retry admission.
        }
    }

    /// Currently admitted probes.
    pub fn active(&self) -> usize {
        self.inner.state.lock().active
    }

    /// Queued admissions, counting not-yet-swept cancelled waiters.
    pub fn queued(&self) -> usize {
        self.inner.state.lock().waiters.len()
    }

    /// The fixed admission cap.
    pub fn limit(&self) -> usize {
        self.inner.limit
    }
}

impl Inner {
    fn release(self: &Arc<Self>) {
        let mut state = self.state.lock();
        loop {
            match state.waiters.pop_front() {
                Some(tx) => {
                    let slot = ProbeSlot {
                        inner: Some(Arc::clone(self)),
                    };
                    match tx.send(slot) {
                        // Slot handed over; active count unchanged.
                        Ok(()) => return,
                        Err(mut dead_slot) => {
                            // Waiter cancelled; disarm the returned slot so
                            // dropping it here cannot re-enter release.
                            dead_slot.inner = None;
                        }
                    }
                }
                None => {
                    state.active -= 1;
                    return;
                }
            }
        }
    }
}

impl ProbeSlot {
    /// Explicitly release the slot (equivalent to dropping it).
    pub fn release(self) {}
}

impl Drop for ProbeSlot {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ConcurrencyLimiter;

    #[test]
    fn try_admit_enforces_the_cap() {
        let limiter = ConcurrencyLimiter::new(2);
        let a = limiter.try_admit().unwrap();
        let _b = limiter.try_admit().unwrap();
        assert!(limiter.try_admit().is_none());
        assert_eq!(limiter.active(), 2);

        drop(a);
        assert_eq!(limiter.active(), 1);
        assert!(limiter.try_admit().is_some());
    }

    #[tokio::test]
    async fn release_admits_waiters_in_fifo_order() {
        let limiter = ConcurrencyLimiter::new(1);
        let held = limiter.try_admit().unwrap();

        let first = tokio::spawn({
            let limiter = limiter.clone();
            async move {
                let _slot = limiter.admit().await;
                1u8
            }
        });
        // Let the first waiter enqueue before the second.
        tokio::task::yield_now().await;
        let second = tokio::spawn({
            let limiter = limiter.clone();
            async move {
                let _slot = limiter.admit().await;
                2u8
            }
        });
        tokio::task::yield_now().await;
        assert_eq!(limiter.queued(), 2);

        drop(held);
        assert_eq!(first.await.unwrap(), 1);
        assert_eq!(second.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn cancelled_waiter_is_skipped_without_losing_the_slot() {
        let limiter = ConcurrencyLimiter::new(1);
        let held = limiter.try_admit().unwrap();

        let mut abandoned = Box::pin(limiter.admit());
        // Poll once so the waiter enqueues, then abandon it.
        tokio::select! {
            biased;
            _ = &mut abandoned => panic!("no slot should be free"),
            _ = tokio::task::yield_now() => {}
        }
        drop(abandoned);

        let survivor = tokio::spawn({
            let limiter = limiter.clone();
            async move { limiter.admit().await }
        });
        tokio::task::yield_now().await;

        drop(held);
        let slot = survivor.await.unwrap();
        assert_eq!(limiter.active(), 1);
        drop(slot);
        assert_eq!(limiter.active(), 0);
    }

    #[tokio::test]
    async fn active_never_exceeds_limit_under_churn() {
        let limiter = ConcurrencyLimiter::new(3);
        let mut tasks = Vec::new();
        for _ in 0..24 {
            let limiter = limiter.clone();
            tasks.push(tokio::spawn(async move {
                let _slot = limiter.admit().await;
                assert!(limiter.active() <= limiter.limit());
                tokio::task::yield_now().await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(limiter.active(), 0);
        assert_eq!(limiter.queued(), 0);
    }
}
