//! Lifecycle owner for one producer/dispatcher pair.

use super::{
    CommandQueue, Dispatcher, EngineTimings, HostToken, Producer, SourceAdapter, StopSignal,
    Transform, WorkerHandle, WorkerState,
};
use crate::command::Command;
use crate::error::Result;
use crate::ui::{Callback, UiHandle};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Owns the queue, stop signal and worker handles of one subsystem
///
/// `T` is the record type the adapter produces, `U` what the callback
/// receives, and `C` the UI-owned state the callback mutates.
pub struct Supervisor<T, U, C> {
    name: String,
    kind: String,
    queue: Arc<CommandQueue<Command<T>>>,
    stop: StopSignal,
    host: HostToken,
    producer: WorkerHandle,
    dispatcher: WorkerHandle,
    callback: Option<Callback<C, U>>,
    ui: UiHandle<C>,
    timings: EngineTimings,
}

impl<T, U, C> Supervisor<T, U, C>
where
    T: Send + 'static,
    U: Send + 'static,
    C: 'static,
{
    /// Create a supervisor named e.g. `cardreader`, tagging records with `kind`
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        ui: UiHandle<C>,
        timings: EngineTimings,
        queue_capacity: usize,
    ) -> Self {
        let name = name.into();
        Self {
            producer: WorkerHandle::new(format!("{name}-producer")),
            dispatcher: WorkerHandle::new(format!("{name}-dispatcher")),
            name,
            kind: kind.into(),
            queue: Arc::new(CommandQueue::new(queue_capacity)),
            stop: StopSignal::new(),
            host: HostToken::new(),
            callback: None,
            ui,
            timings,
        }
    }

    /// Register the consumer callback; only the first registration is kept
    pub fn register_callback<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&mut C, U) + Send + Sync + 'static,
    {
        if self.callback.is_none() {
            self.callback = Some(Arc::new(callback));
        } else {
            tracing::debug!("{}: callback already registered, ignoring", self.name);
        }
        self
    }

    /// True once a callback is registered
    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Start (or heal) both workers
    ///
    /// Clears the stop signal, then spawns a producer built from `connect` and
    /// a dispatcher applying `transform`, each only if its role is absent or
    /// finished. A running role is left untouched. Returns whether a new
    /// producer was spawned, i.e. whether `connect` will be used.
    pub fn start_with<A, F>(&mut self, connect: F, transform: Transform<T, U>) -> Result<bool>
    where
        A: SourceAdapter<Item = T> + 'static,
        F: FnOnce() -> Result<A> + Send + 'static,
    {
        self.stop.clear();

        let producer = Producer::<A>::new(
            self.kind.clone(),
            self.queue.clone(),
            self.stop.clone(),
            self.host.watch(),
            self.timings,
        );
        let spawned = self.producer.ensure_running(move || producer.run(connect))?;
        if spawned {
            tracing::debug!("{}: producer started", self.name);
        }

        let dispatcher = Dispatcher::new(
            self.name.clone(),
            self.queue.clone(),
            self.stop.clone(),
            self.host.watch(),
            self.ui.clone(),
            self.callback.clone(),
            transform,
            self.timings,
        );
        if self.dispatcher.ensure_running(move || dispatcher.run())? {
            tracing::debug!("{}: dispatcher started", self.name);
        }

        Ok(spawned)
    }

    /// Ask both workers to stop; returns immediately
    pub fn stop(&self) {
        self.stop.set();
    }

    /// True iff both workers exist and neither has finished
    pub fn is_alive(&self) -> bool {
        self.producer.is_running() && self.dispatcher.is_running()
    }

    /// State of the producer role
    pub fn producer_state(&self) -> WorkerState {
        self.producer.state()
    }

    /// State of the dispatcher role
    pub fn dispatcher_state(&self) -> WorkerState {
        self.dispatcher.state()
    }

    /// Drop every queued command, returning how many were discarded
    pub fn clear_queue(&self) -> usize {
        self.queue.clear()
    }

    /// Shared handle to the inbound queue
    pub fn queue(&self) -> Arc<CommandQueue<Command<T>>> {
        self.queue.clone()
    }

    /// Clone of the stop signal
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Name used for thread names and log lines
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Timings handed to new workers
    pub fn timings(&self) -> EngineTimings {
        self.timings
    }

    /// Block until neither worker is running or `timeout` elapses
    ///
    /// Returns true if both roles are no longer running.
    pub fn wait_finished(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let producer_done = self.producer.wait_finished(timeout);
        let remaining = deadline.saturating_duration_since(Instant::now());
        producer_done && self.dispatcher.wait_finished(remaining)
    }
}

impl<T, U, C> Drop for Supervisor<T, U, C> {
    fn drop(&mut self) {
        self.stop.set();
    }
}
