//! Thread handle bookkeeping for one worker role.

use std::fmt;
use std::io;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Observed state of a worker role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// No thread has been spawned for this role
    Absent,
    /// The thread is still running
    Running,
    /// The thread has returned
    Finished,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::Running => write!(f, "running"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// Holds at most one thread for a named role
///
/// A finished thread is reaped and replaced, never restarted.
#[derive(Debug)]
pub struct WorkerHandle {
    role: String,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Create an empty handle for a role such as `cardreader-producer`
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            thread: None,
        }
    }

    /// Role name, also used as the OS thread name
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Current state of the role
    pub fn state(&self) -> WorkerState {
        match &self.thread {
            None => WorkerState::Absent,
            Some(handle) if handle.is_finished() => WorkerState::Finished,
            Some(_) => WorkerState::Running,
        }
    }

    /// True while a spawned thread has not returned
    pub fn is_running(&self) -> bool {
        self.state() == WorkerState::Running
    }

    /// Make sure a thread is running for this role
    ///
    /// Spawns with `body` when the role is absent or finished; a running
    /// thread is left alone and `body` is dropped. Returns whether a new
    /// thread was spawned.
    pub fn ensure_running<F>(&mut self, body: F) -> io::Result<bool>
    where
        F: FnOnce() + Send + 'static,
    {
        match self.state() {
            WorkerState::Running => return Ok(false),
            WorkerState::Finished => {
                if let Some(old) = self.thread.take() {
                    if old.join().is_err() {
                        tracing::warn!("{} thread panicked before it was replaced", self.role);
                    }
                }
                tracing::debug!("Replacing finished {} thread", self.role);
            }
            WorkerState::Absent => {}
        }

        let handle = std::thread::Builder::new()
            .name(self.role.clone())
            .spawn(body)?;
        self.thread = Some(handle);
        Ok(true)
    }

    /// Wait until the thread finishes or `timeout` elapses
    ///
    /// Returns true if the role is no longer running.
    pub fn wait_finished(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.is_running() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        true
    }
}
