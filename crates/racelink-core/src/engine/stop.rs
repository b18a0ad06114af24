//! Cooperative cancellation primitives shared by a subsystem's workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Shared stop flag
///
/// Cleared by `start`, set by `stop`, observed by both workers once per poll
/// cycle. Cloning yields another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    /// Create a cleared stop signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Request every worker to stop
    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Reset the flag before a fresh start
    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Check whether a stop has been requested
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Liveness token held by whatever hosts the workers
///
/// Workers hold a [`HostWatch`] and exit once every token is dropped.
#[derive(Debug, Default)]
pub struct HostToken(Arc<()>);

impl HostToken {
    /// Create a new host token
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out a watch for a worker thread
    pub fn watch(&self) -> HostWatch {
        HostWatch(Arc::downgrade(&self.0))
    }
}

/// Worker-side view of a [`HostToken`]
#[derive(Debug, Clone)]
pub struct HostWatch(Weak<()>);

impl HostWatch {
    /// True while the host token still exists
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}
