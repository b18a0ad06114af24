//! Producer thread body.

use super::{CommandQueue, EngineTimings, HostWatch, SourceAdapter, StopSignal};
use crate::command::Command;
use crate::error::Result;
use std::sync::Arc;

/// Pulls records from a source adapter and queues them as commands
pub struct Producer<A: SourceAdapter> {
    kind: String,
    queue: Arc<CommandQueue<Command<A::Item>>>,
    stop: StopSignal,
    host: HostWatch,
    timings: EngineTimings,
}

impl<A: SourceAdapter> Producer<A> {
    /// Create a producer tagging every record with `kind`
    pub fn new(
        kind: impl Into<String>,
        queue: Arc<CommandQueue<Command<A::Item>>>,
        stop: StopSignal,
        host: HostWatch,
        timings: EngineTimings,
    ) -> Self {
        Self {
            kind: kind.into(),
            queue,
            stop,
            host,
            timings,
        }
    }

    fn should_exit(&self) -> bool {
        self.stop.is_set() || !self.host.is_alive()
    }

    /// Build the adapter and poll it until stopped or faulted
    ///
    /// The adapter is always closed before this returns.
    pub fn run<F>(self, connect: F)
    where
        F: FnOnce() -> Result<A>,
    {
        let mut adapter = match connect() {
            Ok(adapter) => adapter,
            Err(e) => {
                tracing::error!("{}", e);
                return;
            }
        };
        tracing::debug!("Producer for '{}' connected", self.kind);

        loop {
            if self.should_exit() {
                adapter.close();
                tracing::debug!("Stop producer for '{}'", self.kind);
                return;
            }

            std::thread::sleep(self.timings.poll_interval);

            match adapter.poll() {
                Ok(Some(item)) => {
                    tracing::debug!("Adding '{}' to queue", self.kind);
                    let command = Command::new(self.kind.clone(), item);
                    if let Err(e) = self.queue.push_timeout(command, self.timings.put_timeout) {
                        tracing::warn!("Dropping '{}' record: {}", self.kind, e);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("{}", e);
                    adapter.close();
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::HostToken;
    use crate::error::{ConnectionError, Error};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct ScriptedAdapter {
        script: VecDeque<Result<Option<u32>>>,
        closed: Arc<AtomicBool>,
    }

    impl SourceAdapter for ScriptedAdapter {
        type Item = u32;

        fn poll(&mut self) -> Result<Option<u32>> {
            self.script.pop_front().unwrap_or(Ok(None))
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn fast_timings() -> EngineTimings {
        EngineTimings {
            poll_interval: Duration::from_millis(1),
            put_timeout: Duration::from_millis(10),
            ..EngineTimings::default()
        }
    }

    #[test]
    fn test_adapter_fault_ends_producer_and_closes_channel() {
        let queue = Arc::new(CommandQueue::new(8));
        let host = HostToken::new();
        let closed = Arc::new(AtomicBool::new(false));
        let adapter = ScriptedAdapter {
            script: VecDeque::from(vec![
                Ok(Some(1)),
                Ok(None),
                Ok(Some(2)),
                Err(Error::from(ConnectionError::ConnectionLost {
                    reason: "unplugged".to_string(),
                })),
                Ok(Some(3)),
            ]),
            closed: closed.clone(),
        };

        let producer = Producer::new("n", queue.clone(), StopSignal::new(), host.watch(), fast_timings());
        producer.run(move || Ok(adapter));

        assert!(closed.load(Ordering::SeqCst));
        assert_eq!(queue.try_pop().map(|c| c.payload), Some(1));
        assert_eq!(queue.try_pop().map(|c| c.payload), Some(2));
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn test_connect_failure_never_enqueues() {
        let queue: Arc<CommandQueue<Command<u32>>> = Arc::new(CommandQueue::new(8));
        let host = HostToken::new();
        let producer: Producer<ScriptedAdapter> =
            Producer::new("n", queue.clone(), StopSignal::new(), host.watch(), fast_timings());

        producer.run(|| {
            Err(ConnectionError::DiscoveryFailed {
                reason: "no serial ports found".to_string(),
            }
            .into())
        });
        assert!(queue.is_empty());
    }

    #[test]
    fn test_stop_signal_closes_adapter() {
        let queue = Arc::new(CommandQueue::new(8));
        let host = HostToken::new();
        let stop = StopSignal::new();
        stop.set();
        let closed = Arc::new(AtomicBool::new(false));
        let adapter = ScriptedAdapter {
            script: VecDeque::from(vec![Ok(Some(9))]),
            closed: closed.clone(),
        };

        Producer::new("n", queue.clone(), stop, host.watch(), fast_timings()).run(move || Ok(adapter));
        assert!(closed.load(Ordering::SeqCst));
        assert!(queue.is_empty());
    }
}
