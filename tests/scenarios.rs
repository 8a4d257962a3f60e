//! End-to-end pipeline scenarios.
//!
//! Each test drives a full source → buffer → sink pipeline through the
//! public `Simulation` API and checks the recorded trace.

use stagesim::observer::{Recorder, TraceEvent};
use stagesim::{
    EventQueue, Phase, ProduceOutcome, ProducePolicy, SimError, Simulation, Tick, Topology,
    TopologyBuilder,
};

type Sim = Simulation<u32, Recorder<u32>>;
type Pipeline = Topology<u32, Recorder<u32>>;

fn pipeline(delay: Tick, policy: ProducePolicy) -> Sim {
    let topology = TopologyBuilder::new(Recorder::new())
        .with_forward_delay(delay)
        .with_policy(policy)
        .wire_default()
        .unwrap()
        .finish()
        .unwrap();
    Simulation::with_topology(topology)
}

fn slots(sim: &Sim, name: &str) -> Vec<(Tick, Phase)> {
    sim.observer()
        .named(name)
        .into_iter()
        .map(|e: &TraceEvent<u32>| (e.tick, e.phase))
        .collect()
}

// ============================================================================
// Scenario A: one value, default latency
// ============================================================================

#[test]
fn test_scenario_a_single_value_latency() {
    let mut sim = pipeline(5, ProducePolicy::Reject);
    sim.schedule_produce(0, 42).unwrap();

    sim.run_until(10).unwrap();

    assert_eq!(slots(&sim, "received"), vec![(0, Phase::PortUpdate)]);
    assert_eq!(slots(&sim, "forwarded"), vec![(5, Phase::Tick)]);
    assert_eq!(slots(&sim, "consumed"), vec![(5, Phase::Tick)]);
    assert_eq!(slots(&sim, "grant_issued"), vec![(5, Phase::Tick)]);
    assert_eq!(slots(&sim, "grant_received"), vec![(5, Phase::Tick)]);

    let consumed = sim.observer().named("consumed");
    assert_eq!(consumed[0].kind.value(), Some(&42));
}

#[test]
fn test_scenario_a_source_waits_for_grant() {
    let mut sim = pipeline(5, ProducePolicy::Reject);
    assert_eq!(sim.produce(42).unwrap(), ProduceOutcome::Sent);

    sim.run_until(4).unwrap();
    assert_eq!(sim.produce(43).unwrap(), ProduceOutcome::Rejected);

    sim.run_until(5).unwrap();
    assert_eq!(sim.produce(44).unwrap(), ProduceOutcome::Sent);

    sim.run_to_completion().unwrap();
    let values: Vec<u32> = sim
        .observer()
        .named("consumed")
        .iter()
        .filter_map(|e| e.kind.value().copied())
        .collect();
    assert_eq!(values, vec![42, 44]);
    assert_eq!(sim.observer().ticks_of("consumed"), vec![5, 10]);
}

// ============================================================================
// Scenario B: two produces before any grant
// ============================================================================

#[test]
fn test_scenario_b_second_produce_rejected() {
    let mut sim = pipeline(5, ProducePolicy::Reject);

    assert_eq!(sim.produce(1).unwrap(), ProduceOutcome::Sent);
    assert_eq!(sim.produce(2).unwrap(), ProduceOutcome::Rejected);
    assert!(!sim.topology().source().can_send());

    sim.run_to_completion().unwrap();

    assert_eq!(sim.topology().buffer().received_count(), 1);
    assert_eq!(sim.sink_processed_count(), 1);
    let stats = sim.stats();
    assert_eq!(stats.rejected, 1);
    assert!(stats.is_conserved());
}

#[test]
fn test_scenario_b_queue_policy_defers_second_value() {
    let mut sim = pipeline(5, ProducePolicy::Queue);

    assert_eq!(sim.produce(1).unwrap(), ProduceOutcome::Sent);
    assert_eq!(sim.produce(2).unwrap(), ProduceOutcome::Queued);
    // Only the first value has reached the buffer.
    assert_eq!(sim.topology().buffer().received_count(), 1);

    sim.run_to_completion().unwrap();

    assert_eq!(sim.observer().ticks_of("received"), vec![0, 5]);
    assert_eq!(sim.observer().ticks_of("consumed"), vec![5, 10]);
    assert_eq!(sim.stats().queued, 1);
    assert!(sim.is_drained());
}

// ============================================================================
// Scenario C: capacity violation by direct injection
// ============================================================================

#[test]
fn test_scenario_c_injection_into_holding_buffer() {
    let mut sim = pipeline(5, ProducePolicy::Reject);
    sim.produce(1).unwrap();

    let err = sim.inject(2).unwrap_err();
    match err {
        SimError::CapacityViolation { tick, held, incoming } => {
            assert_eq!(tick, 0);
            assert_eq!(held, "1");
            assert_eq!(incoming, "2");
        }
        other => panic!("expected capacity violation, got {other}"),
    }
    // Held value is not overwritten.
    assert_eq!(sim.topology().buffer().held(), Some(&1));
}

#[test]
fn test_scenario_c_violation_halts_run() {
    let mut sim = pipeline(5, ProducePolicy::Reject);
    sim.schedule_produce(0, 1).unwrap();
    sim.schedule_inject(2, 2).unwrap();

    let err = sim.run_until(20).unwrap_err();
    assert!(err.is_capacity_violation());
    assert_eq!(sim.now(), 2);
    // The pending forward never ran.
    assert_eq!(sim.sink_processed_count(), 0);
}

#[test]
fn test_injection_into_empty_buffer_is_allowed() {
    let mut sim = pipeline(3, ProducePolicy::Reject);
    sim.inject(7).unwrap();
    sim.run_to_completion().unwrap();

    assert_eq!(sim.sink_processed_count(), 1);
    assert_eq!(sim.produced_count(), 0);
    // The grant still reaches the source, which was already primed.
    assert!(sim.topology().source().can_send());
}

// ============================================================================
// Driver scheduling between runs
// ============================================================================

#[test]
fn test_schedule_produce_at_now_after_tick_work_is_refused() {
    let mut sim = pipeline(5, ProducePolicy::Reject);
    sim.produce(42).unwrap();

    // The forward, consume and grant all run in tick 5's Tick phase.
    sim.run_until(5).unwrap();

    let err = sim.schedule_produce(5, 43).unwrap_err();
    assert!(matches!(err, SimError::Scheduling { tick: 5, .. }));
    assert!(!err.is_internal());
    assert_eq!(sim.pending_events(), 0);

    // The credit is back, so the value can go now or at the next tick.
    sim.schedule_produce(6, 43).unwrap();
    sim.run_until(20).unwrap();
    assert_eq!(slots(&sim, "received"), vec![(0, Phase::PortUpdate), (6, Phase::PortUpdate)]);
    assert_eq!(sim.observer().ticks_of("consumed"), vec![5, 11]);
}

#[test]
fn test_schedule_produce_at_now_after_idle_run_is_accepted() {
    let mut sim = pipeline(5, ProducePolicy::Reject);

    // Nothing fires at tick 5, so its PortUpdate phase is still open.
    sim.run_until(5).unwrap();
    sim.schedule_produce(5, 43).unwrap();
    sim.run_until(10).unwrap();

    assert_eq!(slots(&sim, "received"), vec![(5, Phase::PortUpdate)]);
    assert_eq!(sim.observer().ticks_of("consumed"), vec![10]);
}

#[test]
fn test_driver_error_halts_run_until() {
    let mut sim = pipeline(5, ProducePolicy::Reject);
    sim.schedule_produce(0, 1).unwrap();
    sim.schedule(3, Phase::Tick, |_: &mut Pipeline, q: &mut EventQueue<Pipeline>| {
        Err(SimError::internal(q.now(), "driver check failed"))
    })
    .unwrap();

    let err = sim.run_until(20).unwrap_err();
    assert!(matches!(err, SimError::InternalConsistency { tick: 3, .. }));
    assert_eq!(sim.now(), 3);
    // The forward armed at tick 0 is still pending and never ran.
    assert_eq!(sim.pending_events(), 1);
    assert_eq!(sim.sink_processed_count(), 0);
}

// ============================================================================
// Scenario D: zero forward delay
// ============================================================================

#[test]
fn test_scenario_d_zero_delay_forwards_in_tick_phase() {
    let mut sim = pipeline(0, ProducePolicy::Reject);
    sim.schedule_produce(3, 7).unwrap();

    sim.run_until(3).unwrap();

    assert_eq!(slots(&sim, "received"), vec![(3, Phase::PortUpdate)]);
    assert_eq!(slots(&sim, "forwarded"), vec![(3, Phase::Tick)]);
    assert_eq!(slots(&sim, "consumed"), vec![(3, Phase::Tick)]);
    assert!(sim.is_drained());
}

#[test]
fn test_scenario_d_zero_delay_queue_drains_in_one_tick() {
    let mut sim = pipeline(0, ProducePolicy::Queue);
    for v in 0..4 {
        sim.schedule_produce(1, v).unwrap();
    }

    sim.run_until(1).unwrap();

    assert_eq!(sim.sink_processed_count(), 4);
    assert_eq!(sim.observer().ticks_of("consumed"), vec![1, 1, 1, 1]);
    // Values released by grants are received during the Tick phase.
    let received = slots(&sim, "received");
    assert_eq!(received[0], (1, Phase::PortUpdate));
    assert!(received[1..].iter().all(|slot| *slot == (1, Phase::Tick)));
}
