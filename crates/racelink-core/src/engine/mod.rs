//! # Supervised producer/dispatcher engine
//!
//! Every station link is built from the same pieces:
//!
//! - a [`SourceAdapter`] owning one external channel,
//! - a [`Producer`] thread pulling records from the adapter into a bounded
//!   [`CommandQueue`],
//! - a [`Dispatcher`] thread draining the queue and posting each item to the
//!   UI loop for the registered callback,
//! - a [`Supervisor`] owning the queue, the [`StopSignal`] and both thread
//!   handles.
//!
//! Cancellation is cooperative: workers check the stop signal and the host
//! liveness once per poll cycle, so shutdown latency is bounded by the
//! adapter's read timeout plus the poll interval.

mod dispatcher;
mod producer;
mod queue;
mod stop;
mod supervisor;
mod worker;

pub use dispatcher::{Dispatcher, Transform};
pub use producer::Producer;
pub use queue::{CommandQueue, DEFAULT_QUEUE_CAPACITY};
pub use stop::{HostToken, HostWatch, StopSignal};
pub use supervisor::Supervisor;
pub use worker::{WorkerHandle, WorkerState};

use crate::error::Result;
use std::time::Duration;

/// An external channel plus its wire protocol
///
/// `poll` blocks for at most the adapter's own read timeout. A timeout is not
/// an error: it returns `Ok(None)`. Any `Err` terminates the producer.
pub trait SourceAdapter: Send {
    /// Normalized record produced by one successful poll
    type Item: Send + 'static;

    /// Pull at most one completed record from the channel
    fn poll(&mut self) -> Result<Option<Self::Item>>;

    /// Release the underlying channel
    fn close(&mut self);
}

/// Timing knobs shared by a producer/dispatcher pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineTimings {
    /// Sleep between producer polls
    pub poll_interval: Duration,
    /// How long a producer waits for queue room before dropping a record
    pub put_timeout: Duration,
    /// How long a dispatcher waits on an empty queue before re-checking exit
    pub pop_timeout: Duration,
    /// Delay before the dispatcher starts draining
    pub startup_delay: Duration,
    /// How long a dispatcher waits for room in the UI channel
    pub deliver_timeout: Duration,
}

impl Default for EngineTimings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            put_timeout: Duration::from_secs(1),
            pop_timeout: Duration::from_secs(5),
            startup_delay: Duration::ZERO,
            deliver_timeout: Duration::from_secs(1),
        }
    }
}

impl EngineTimings {
    /// Timings used by the card reader link
    pub fn card_reader() -> Self {
        Self {
            startup_delay: Duration::from_secs(3),
            ..Self::default()
        }
    }

    /// Timings used by the teamwork link
    pub fn teamwork() -> Self {
        Self {
            poll_interval: Duration::from_millis(20),
            pop_timeout: Duration::from_millis(500),
            ..Self::default()
        }
    }
}
