//! UI loop hand-off
//!
//! Worker threads never touch UI-owned state. They post tasks through a
//! bounded channel and the UI thread runs them on its own turn, passing in
//! the state it owns (the race store, widgets, ...).
//!
//! ```rust,ignore
//! let (mut ui_loop, ui) = UiLoop::<MemoryRace>::new(64);
//! // hand `ui` to a supervisor, then on the UI thread:
//! ui_loop.run_pending(&mut race);
//! ```

use crate::error::QueueError;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default capacity of the UI channel
pub const DEFAULT_UI_CAPACITY: usize = 128;

/// A unit of work executed on the UI thread with access to its state
pub type UiTask<C> = Box<dyn FnOnce(&mut C) + Send>;

/// Consumer callback invoked on the UI thread
pub type Callback<C, U> = Arc<dyn Fn(&mut C, U) + Send + Sync>;

/// Receiving end, owned by the UI thread
pub struct UiLoop<C> {
    rx: Receiver<UiTask<C>>,
}

/// Sending end, cloned into worker threads
pub struct UiHandle<C> {
    tx: Sender<UiTask<C>>,
}

impl<C> Clone for UiHandle<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<C> std::fmt::Debug for UiHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiHandle").finish_non_exhaustive()
    }
}

impl<C: 'static> UiLoop<C> {
    /// Create a UI loop whose channel holds at most `capacity` pending tasks
    pub fn new(capacity: usize) -> (Self, UiHandle<C>) {
        let (tx, rx) = bounded(capacity.max(1));
        (Self { rx }, UiHandle { tx })
    }

    /// Run every task already queued, returning how many ran
    pub fn run_pending(&mut self, ctx: &mut C) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task(ctx);
            ran += 1;
        }
        ran
    }

    /// Pump tasks as they arrive until `duration` has elapsed
    pub fn run_for(&mut self, ctx: &mut C, duration: Duration) -> usize {
        let deadline = Instant::now() + duration;
        let mut ran = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return ran + self.run_pending(ctx);
            }
            match self.rx.recv_timeout(remaining) {
                Ok(task) => {
                    task(ctx);
                    ran += 1;
                }
                Err(RecvTimeoutError::Timeout) => return ran,
                Err(RecvTimeoutError::Disconnected) => return ran,
            }
        }
    }

    /// Pump tasks until `done` holds for the state or `timeout` elapses
    ///
    /// Returns whether the condition was met.
    pub fn run_until<F>(&mut self, ctx: &mut C, timeout: Duration, mut done: F) -> bool
    where
        F: FnMut(&C) -> bool,
    {
        let deadline = Instant::now() + timeout;
        while !done(ctx) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.rx.recv_timeout(remaining.min(Duration::from_millis(50))) {
                Ok(task) => task(ctx),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return done(ctx),
            }
        }
        true
    }
}

impl<C: 'static> UiHandle<C> {
    /// Post a task, waiting up to `timeout` while the channel is full
    pub fn post_timeout(&self, task: UiTask<C>, timeout: Duration) -> Result<(), QueueError> {
        self.tx.send_timeout(task, timeout).map_err(|e| match e {
            SendTimeoutError::Timeout(_) => QueueError::Full {
                waited_ms: timeout.as_millis() as u64,
            },
            SendTimeoutError::Disconnected(_) => QueueError::Closed,
        })
    }

    /// Post a task without waiting
    pub fn post(&self, task: UiTask<C>) -> Result<(), QueueError> {
        self.post_timeout(task, Duration::ZERO)
    }
}
