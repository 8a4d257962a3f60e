//! Integration tests for the event queue.
//!
//! These tests verify the ordering contract:
//! - `(tick, phase, sequence)` total order
//! - `PortUpdate` before `Tick` within a tick
//! - zero-delay re-arming picked up in the same pass
//! - cancellation leaving the remaining order intact

use stagesim::event::{EventKey, Phase};
use stagesim::queue::EventQueue;
use stagesim::types::Tick;
use stagesim::SimError;

type Log = Vec<(Tick, Phase, &'static str)>;
type Queue = EventQueue<Log>;

// ============================================================================
// Helpers
// ============================================================================

fn push(queue: &mut Queue, delay: Tick, phase: Phase, label: &'static str) -> EventKey {
    queue
        .schedule(delay, phase, move |log: &mut Log, q: &mut Queue| {
            log.push((q.now(), phase, label));
            Ok(())
        })
        .unwrap()
}

fn labels(log: &Log) -> Vec<&'static str> {
    log.iter().map(|(_, _, label)| *label).collect()
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn test_total_order_by_tick_phase_sequence() {
    let mut queue = Queue::new();
    let mut log = Log::new();

    push(&mut queue, 2, Phase::Tick, "t2-tick-a");
    push(&mut queue, 1, Phase::Tick, "t1-tick");
    push(&mut queue, 2, Phase::PortUpdate, "t2-port");
    push(&mut queue, 2, Phase::Tick, "t2-tick-b");
    push(&mut queue, 1, Phase::PortUpdate, "t1-port");

    let fired = queue.run_until(&mut log, 10).unwrap();

    assert_eq!(fired, 5);
    assert_eq!(
        labels(&log),
        vec!["t1-port", "t1-tick", "t2-port", "t2-tick-a", "t2-tick-b"]
    );
}

#[test]
fn test_same_slot_is_fifo() {
    let mut queue = Queue::new();
    let mut log = Log::new();

    let names = ["a", "b", "c", "d", "e"];
    for name in names {
        push(&mut queue, 3, Phase::Tick, name);
    }
    queue.run_until(&mut log, 3).unwrap();

    assert_eq!(labels(&log), names.to_vec());
}

#[test]
fn test_run_until_is_inclusive_and_stops() {
    let mut queue = Queue::new();
    let mut log = Log::new();

    push(&mut queue, 5, Phase::Tick, "at-5");
    push(&mut queue, 6, Phase::PortUpdate, "at-6");

    queue.run_until(&mut log, 5).unwrap();
    assert_eq!(labels(&log), vec!["at-5"]);
    assert_eq!(queue.now(), 5);
    assert_eq!(queue.len(), 1);

    queue.run_until(&mut log, 6).unwrap();
    assert_eq!(labels(&log), vec!["at-5", "at-6"]);
}

#[test]
fn test_clock_reaches_end_time_when_idle() {
    let mut queue = Queue::new();
    let mut log = Log::new();

    queue.run_until(&mut log, 100).unwrap();
    assert_eq!(queue.now(), 100);

    // Earlier end times never move the clock back.
    queue.run_until(&mut log, 50).unwrap();
    assert_eq!(queue.now(), 100);
}

// ============================================================================
// Re-arming
// ============================================================================

#[test]
fn test_zero_delay_rearm_same_pass() {
    let mut queue = Queue::new();
    let mut log = Log::new();

    queue
        .schedule(1, Phase::Tick, |log: &mut Log, q: &mut Queue| {
            log.push((q.now(), Phase::Tick, "first"));
            q.schedule(0, Phase::Tick, |log: &mut Log, q: &mut Queue| {
                log.push((q.now(), Phase::Tick, "rearmed"));
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();
    push(&mut queue, 1, Phase::Tick, "sibling");
    push(&mut queue, 2, Phase::PortUpdate, "next-tick");

    queue.run_until(&mut log, 1).unwrap();
    // The re-armed event joins the back of the current slot.
    assert_eq!(labels(&log), vec!["first", "sibling", "rearmed"]);
    assert!(log.iter().all(|(t, _, _)| *t == 1));
}

#[test]
fn test_zero_delay_into_later_phase() {
    let mut queue = Queue::new();
    let mut log = Log::new();

    queue
        .schedule(4, Phase::PortUpdate, |log: &mut Log, q: &mut Queue| {
            log.push((q.now(), Phase::PortUpdate, "deliver"));
            q.schedule(0, Phase::Tick, |log: &mut Log, q: &mut Queue| {
                log.push((q.now(), Phase::Tick, "react"));
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();

    queue.run_until(&mut log, 4).unwrap();
    assert_eq!(
        log,
        vec![(4, Phase::PortUpdate, "deliver"), (4, Phase::Tick, "react")]
    );
}

#[test]
fn test_zero_delay_into_elapsed_phase_is_rejected() {
    let mut queue = Queue::new();
    let mut log = Log::new();

    queue
        .schedule(2, Phase::Tick, |_: &mut Log, q: &mut Queue| {
            q.schedule(0, Phase::PortUpdate, |_: &mut Log, _: &mut Queue| Ok(()))?;
            Ok(())
        })
        .unwrap();

    let err = queue.run_until(&mut log, 10).unwrap_err();
    assert!(matches!(err, SimError::Scheduling { tick: 2, .. }));
}

#[test]
fn test_schedule_at_past_is_rejected() {
    let mut queue = Queue::new();
    let mut log = Log::new();
    queue.run_until(&mut log, 10).unwrap();

    let result = queue.schedule_at(9, Phase::Tick, |_: &mut Log, _: &mut Queue| Ok(()));
    assert!(result.unwrap_err().is_scheduling());
}

// ============================================================================
// Errors and cancellation
// ============================================================================

#[test]
fn test_callback_error_halts_run() {
    let mut queue = Queue::new();
    let mut log = Log::new();

    push(&mut queue, 1, Phase::Tick, "before");
    queue
        .schedule(2, Phase::Tick, |_: &mut Log, q: &mut Queue| {
            Err(SimError::internal(q.now(), "boom"))
        })
        .unwrap();
    push(&mut queue, 3, Phase::Tick, "after");

    let err = queue.run_until(&mut log, 10).unwrap_err();
    assert!(err.to_string().contains("boom"));
    assert_eq!(labels(&log), vec!["before"]);
    assert_eq!(queue.now(), 2);
    assert_eq!(queue.len(), 1);
}

#[test]
fn test_cancel_preserves_remaining_order() {
    let mut queue = Queue::new();
    let mut log = Log::new();

    push(&mut queue, 1, Phase::Tick, "a");
    let b = push(&mut queue, 1, Phase::Tick, "b");
    push(&mut queue, 1, Phase::Tick, "c");

    assert!(queue.cancel(b));
    assert!(!queue.cancel(b));

    queue.run_until(&mut log, 1).unwrap();
    assert_eq!(labels(&log), vec!["a", "c"]);
}

#[test]
fn test_step_and_run_to_completion() {
    let mut queue = Queue::new();
    let mut log = Log::new();

    push(&mut queue, 7, Phase::Tick, "x");
    push(&mut queue, 30, Phase::PortUpdate, "y");

    let key = queue.step(&mut log).unwrap().unwrap();
    assert_eq!(key.due_time, 7);

    assert_eq!(queue.run_to_completion(&mut log).unwrap(), 1);
    assert_eq!(queue.now(), 30);
    assert_eq!(queue.events_fired(), 2);
    assert!(queue.step(&mut log).unwrap().is_none());
}
