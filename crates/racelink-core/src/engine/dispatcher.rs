//! Dispatcher thread body.

use super::{CommandQueue, EngineTimings, HostWatch, StopSignal};
use crate::command::Command;
use crate::error::QueueError;
use crate::ui::{Callback, UiHandle};
use std::sync::Arc;
use std::time::{Duration, Instant};

const STARTUP_SLICE: Duration = Duration::from_millis(20);

/// Turns a dequeued command into what the callback receives
///
/// Returning `None` skips the command.
pub type Transform<T, U> = Arc<dyn Fn(Command<T>) -> Option<U> + Send + Sync>;

/// Drains a queue and posts each item to the UI thread
pub struct Dispatcher<T, U, C> {
    name: String,
    queue: Arc<CommandQueue<Command<T>>>,
    stop: StopSignal,
    host: HostWatch,
    ui: UiHandle<C>,
    callback: Option<Callback<C, U>>,
    transform: Transform<T, U>,
    timings: EngineTimings,
}

impl<T, U, C> Dispatcher<T, U, C>
where
    T: Send + 'static,
    U: Send + 'static,
    C: 'static,
{
    /// Create a dispatcher
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        queue: Arc<CommandQueue<Command<T>>>,
        stop: StopSignal,
        host: HostWatch,
        ui: UiHandle<C>,
        callback: Option<Callback<C, U>>,
        transform: Transform<T, U>,
        timings: EngineTimings,
    ) -> Self {
        Self {
            name: name.into(),
            queue,
            stop,
            host,
            ui,
            callback,
            transform,
            timings,
        }
    }

    fn should_exit(&self) -> bool {
        self.stop.is_set() || !self.host.is_alive()
    }

    /// Drain until stopped and idle for one pop timeout, or the host is gone
    pub fn run(self) {
        self.wait_startup_delay();

        loop {
            match self.queue.pop_timeout(self.timings.pop_timeout) {
                Some(command) => {
                    if !self.deliver(command) {
                        break;
                    }
                }
                None => {
                    if self.should_exit() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("Stop {} dispatcher", self.name);
    }

    /// Sleep out the startup delay, cut short by a stop request
    ///
    /// Whatever is already queued is still drained afterwards.
    fn wait_startup_delay(&self) {
        let deadline = Instant::now() + self.timings.startup_delay;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || self.should_exit() {
                return;
            }
            std::thread::sleep(remaining.min(STARTUP_SLICE));
        }
    }

    /// Returns false once the UI loop is gone
    fn deliver(&self, command: Command<T>) -> bool {
        let kind = command.kind.clone();
        let Some(item) = (self.transform)(command) else {
            tracing::debug!("{}: '{}' produced nothing to deliver", self.name, kind);
            return true;
        };

        let Some(callback) = self.callback.clone() else {
            tracing::debug!("{}: no callback registered, dropping '{}'", self.name, kind);
            return true;
        };

        let task = Box::new(move |ctx: &mut C| callback(ctx, item));
        match self.ui.post_timeout(task, self.timings.deliver_timeout) {
            Ok(()) => true,
            Err(QueueError::Closed) => {
                tracing::warn!("{}: UI loop closed, stopping delivery", self.name);
                false
            }
            Err(e) => {
                tracing::warn!("{}: dropping '{}': {}", self.name, kind, e);
                true
            }
        }
    }
}
