//! End-to-end ordering and shutdown behavior of the supervised engine.

use proptest::prelude::*;
use racelink_core::{
    Command, CommandQueue, EngineTimings, Result, SourceAdapter, Supervisor, Transform, UiLoop,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

struct ReplayAdapter {
    records: VecDeque<u16>,
}

impl SourceAdapter for ReplayAdapter {
    type Item = u16;

    fn poll(&mut self) -> Result<Option<u16>> {
        Ok(self.records.pop_front())
    }

    fn close(&mut self) {}
}

fn fast_timings() -> EngineTimings {
    EngineTimings {
        poll_interval: Duration::from_millis(1),
        put_timeout: Duration::from_secs(1),
        pop_timeout: Duration::from_millis(10),
        startup_delay: Duration::ZERO,
        deliver_timeout: Duration::from_secs(1),
    }
}

fn passthrough() -> Transform<u16, u16> {
    Arc::new(|cmd: Command<u16>| Some(cmd.payload))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_callback_sees_producer_order(records in proptest::collection::vec(any::<u16>(), 0..40)) {
        let (mut ui_loop, ui) = UiLoop::<Vec<u16>>::new(64);
        let mut sup: Supervisor<u16, u16, Vec<u16>> =
            Supervisor::new("fifo", "n", ui, fast_timings(), 8);
        sup.register_callback(|seen, n| seen.push(n));

        let replay = records.clone();
        sup.start_with(move || Ok(ReplayAdapter { records: replay.into() }), passthrough())
            .unwrap();

        let mut seen = Vec::new();
        let expected = records.len();
        prop_assert!(ui_loop.run_until(&mut seen, Duration::from_secs(10), |s| s.len() == expected));
        prop_assert_eq!(&seen, &records);

        sup.stop();
        prop_assert!(sup.wait_finished(Duration::from_secs(2)));
    }

    #[test]
    fn prop_queue_is_fifo(items in proptest::collection::vec(any::<i64>(), 0..100)) {
        let queue = CommandQueue::new(items.len().max(1));
        for item in &items {
            queue.try_push(*item).unwrap();
        }
        let drained: Vec<i64> = std::iter::from_fn(|| queue.try_pop()).collect();
        prop_assert_eq!(drained, items);
    }
}

#[test]
fn test_stop_terminates_both_workers_within_bound() {
    let timings = fast_timings();
    let (_ui_loop, ui) = UiLoop::<Vec<u16>>::new(4);
    let mut sup: Supervisor<u16, u16, Vec<u16>> = Supervisor::new("bound", "n", ui, timings, 4);
    sup.start_with(|| Ok(ReplayAdapter { records: VecDeque::new() }), passthrough())
        .unwrap();
    assert!(sup.is_alive());

    sup.stop();
    // one poll interval plus one adapter timeout, with scheduling slack
    let bound = timings.poll_interval + timings.pop_timeout + Duration::from_millis(500);
    assert!(sup.wait_finished(bound));
    assert!(!sup.is_alive());
}

#[test]
fn test_dropping_supervisor_ends_workers() {
    let (_ui_loop, ui) = UiLoop::<Vec<u16>>::new(4);
    let mut sup: Supervisor<u16, u16, Vec<u16>> =
        Supervisor::new("dropped", "n", ui, fast_timings(), 4);
    sup.start_with(|| Ok(ReplayAdapter { records: VecDeque::new() }), passthrough())
        .unwrap();
    let queue = sup.queue();
    drop(sup);

    std::thread::sleep(Duration::from_millis(200));
    // workers released their clones of the queue when they exited
    assert_eq!(Arc::strong_count(&queue), 1);
}

#[test]
fn test_stop_during_startup_delay_keeps_bound() {
    let timings = EngineTimings {
        poll_interval: Duration::from_millis(20),
        pop_timeout: Duration::from_millis(500),
        startup_delay: Duration::from_millis(300),
        ..fast_timings()
    };
    let (_ui_loop, ui) = UiLoop::<Vec<u16>>::new(4);
    let mut sup: Supervisor<u16, u16, Vec<u16>> = Supervisor::new("delayed", "n", ui, timings, 4);
    sup.start_with(|| Ok(ReplayAdapter { records: VecDeque::new() }), passthrough())
        .unwrap();

    sup.stop();
    let bound = timings.poll_interval + timings.pop_timeout + Duration::from_millis(100);
    assert!(sup.wait_finished(bound));
    assert!(!sup.is_alive());
}
