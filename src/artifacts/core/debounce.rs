//! Coalescing debounce for background work
//!
//! Change notifications only mark the debouncer dirty. A periodic tick
//! schedules the task once the notifications have been quiet for a while, and
//! never while a previous run is still in flight.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Clears the in-flight flag when the run ends, even by panic.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    dirty: AtomicBool,
    last_change: Mutex<Instant>,
    in_flight: Arc<AtomicBool>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Debouncer {
            quiet,
            dirty: AtomicBool::new(false),
            last_change: Mutex::new(Instant::now()),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Record a change; the quiet period restarts.
    pub fn notify(&self) {
        *self
            .last_change
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
        self.dirty.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Spawn `task` if a change is pending, the quiet period has elapsed and
    /// no earlier run is in flight. Returns the handle of the spawned run.
    pub fn tick<F, Fut>(&self, task: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if !self.is_dirty() {
            return None;
        }

        let last_change = *self
            .last_change
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if last_change.elapsed() < self.quiet {
            return None;
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        self.dirty.store(false, Ordering::Release);

        let in_flight = InFlight(self.in_flight.clone());
        let run = task();
        Some(tokio::spawn(async move {
            let _in_flight = in_flight;
            run.await;
        }))
    }

    /// Tick every `period` until the returned handle is aborted.
    pub fn spawn_ticker<F, Fut>(self: Arc<Self>, period: Duration, task: F) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                if self.tick(&task).is_some() {
                    tracing::trace!("debounced task scheduled");
                }
            }
        })
    }
}
