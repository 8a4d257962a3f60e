//! The run driver: a topology plus the event queue that advances it.
//!
//! # Example
//!
//! ```rust
//! use stagesim::Simulation;
//!
//! // Default wiring, forward delay 5.
//! let mut sim: Simulation<u32> = Simulation::new(5).unwrap();
//!
//! sim.produce(42).unwrap();
//! sim.run_until(10).unwrap();
//!
//! assert_eq!(sim.sink_processed_count(), 1);
//! assert!(sim.is_drained());
//! assert!(sim.stats().is_conserved());
//! ```

use std::fmt::Debug;

use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::event::{EventId, EventKey, Phase};
use crate::link::LinkDesc;
use crate::observer::{Observer, TracingObserver};
use crate::queue::EventQueue;
use crate::stages::ProduceOutcome;
use crate::stats::RunStats;
use crate::topology::{Topology, TopologyBuilder};
use crate::types::Tick;

/// A pipeline and its scheduler.
///
/// External stimuli (`produce`, `inject`) either act at the current tick or
/// are scheduled in the `PortUpdate` phase of a later one, so they always
/// land before the `Tick`-phase work of that tick.
#[derive(Debug)]
pub struct Simulation<T, O = TracingObserver> {
    topology: Topology<T, O>,
    queue: EventQueue<Topology<T, O>>,
}

impl<T> Simulation<T, TracingObserver>
where
    T: Clone + Debug + 'static,
{
    /// Creates the default pipeline, rendering observations via `tracing`.
    pub fn new(forward_delay: Tick) -> SimResult<Self> {
        Ok(Self::with_topology(Topology::wire_default(
            forward_delay,
            TracingObserver,
        )?))
    }
}

impl Simulation<u32, TracingObserver> {
    /// Builds a `u32` pipeline from configuration and schedules its stimulus.
    pub fn from_config(config: &SimConfig) -> SimResult<Self> {
        Self::from_config_with(config, TracingObserver)
    }
}

impl<O> Simulation<u32, O>
where
    O: Observer<u32> + 'static,
{
    /// Like [`Simulation::from_config`], with a caller-supplied observer.
    ///
    /// Each configured value is scheduled as a produce in the `PortUpdate`
    /// phase of its tick; values sharing a tick are produced in list order.
    pub fn from_config_with(config: &SimConfig, observer: O) -> SimResult<Self> {
        config.validate()?;

        let topology = TopologyBuilder::new(observer)
            .with_forward_delay(config.buffer.forward_delay)
            .with_policy(config.source.policy)
            .wire_default()?
            .finish()?;
        let mut sim = Self::with_topology(topology);

        for (index, value) in config.source.values.iter().copied().enumerate() {
            let at = config.source.produce_tick(index).ok_or_else(|| {
                SimError::configuration(format!("produce tick of value #{} overflows", index))
            })?;
            sim.schedule_produce(at, value)?;
        }

        tracing::info!(
            forward_delay = config.buffer.forward_delay,
            policy = ?config.source.policy,
            values = config.source.values.len(),
            "simulation configured"
        );
        Ok(sim)
    }
}

impl<T, O> Simulation<T, O>
where
    T: Clone + Debug + 'static,
    O: Observer<T> + 'static,
{
    /// Wraps an assembled topology with a fresh queue at tick 0.
    pub fn with_topology(topology: Topology<T, O>) -> Self {
        Self {
            topology,
            queue: EventQueue::new(),
        }
    }

    /// Offers a value to the source now.
    pub fn produce(&mut self, value: T) -> SimResult<ProduceOutcome> {
        self.topology.produce(&mut self.queue, value)
    }

    /// Schedules a produce at tick `at`, `PortUpdate` phase.
    ///
    /// # Errors
    /// `Scheduling` if `at` is in the past, or if `at == now` and the
    /// `PortUpdate` pass at `now` has already run (the last run fired
    /// `Tick`-phase work at `now`). Use `now + 1` or call [`Simulation::produce`].
    pub fn schedule_produce(&mut self, at: Tick, value: T) -> SimResult<EventId> {
        self.queue.schedule_at(
            at,
            Phase::PortUpdate,
            move |topology: &mut Topology<T, O>, queue: &mut EventQueue<Topology<T, O>>| {
                topology.produce(queue, value).map(|_| ())
            },
        )
    }

    /// Pushes a value straight into the buffer now, bypassing the handshake.
    pub fn inject(&mut self, value: T) -> SimResult<()> {
        self.topology.inject(&mut self.queue, value)
    }

    /// Schedules an injection at tick `at`, `PortUpdate` phase.
    ///
    /// # Errors
    /// Same rule as [`Simulation::schedule_produce`].
    pub fn schedule_inject(&mut self, at: Tick, value: T) -> SimResult<EventId> {
        self.queue.schedule_at(
            at,
            Phase::PortUpdate,
            move |topology: &mut Topology<T, O>, queue: &mut EventQueue<Topology<T, O>>| {
                topology.inject(queue, value)
            },
        )
    }

    /// Schedules arbitrary driver work on the simulation's queue.
    pub fn schedule<F>(&mut self, delay: Tick, phase: Phase, callback: F) -> SimResult<EventId>
    where
        F: FnOnce(&mut Topology<T, O>, &mut EventQueue<Topology<T, O>>) -> SimResult<()> + 'static,
    {
        self.queue.schedule(delay, phase, callback)
    }

    /// Cancels a pending event.
    pub fn cancel(&mut self, id: EventId) -> bool {
        self.queue.cancel(id)
    }

    /// Fires every event due at or before `end_time`.
    ///
    /// # Errors
    /// The first stage or scheduler error halts the run and is returned.
    pub fn run_until(&mut self, end_time: Tick) -> SimResult<u64> {
        let start = self.queue.now();
        match self.queue.run_until(&mut self.topology, end_time) {
            Ok(fired) => {
                tracing::info!(from = start, to = self.queue.now(), fired, "run complete");
                Ok(fired)
            }
            Err(e) => {
                tracing::error!(tick = self.queue.now(), error = %e, "run halted");
                Err(e)
            }
        }
    }

    /// Runs for `ticks` more ticks.
    pub fn advance(&mut self, ticks: Tick) -> SimResult<u64> {
        let end = self.queue.now().checked_add(ticks).ok_or_else(|| {
            SimError::scheduling(self.queue.now(), format!("advancing by {} overflows", ticks))
        })?;
        self.run_until(end)
    }

    /// Fires events until none remain.
    pub fn run_to_completion(&mut self) -> SimResult<u64> {
        let start = self.queue.now();
        match self.queue.run_to_completion(&mut self.topology) {
            Ok(fired) => {
                tracing::info!(from = start, to = self.queue.now(), fired, "run drained");
                Ok(fired)
            }
            Err(e) => {
                tracing::error!(tick = self.queue.now(), error = %e, "run halted");
                Err(e)
            }
        }
    }

    /// Fires the next pending event only.
    pub fn step(&mut self) -> SimResult<Option<EventKey>> {
        self.queue.step(&mut self.topology)
    }

    /// Resets stages and clock; bindings and observer are kept.
    pub fn reset(&mut self) {
        self.topology.reset();
        self.queue = EventQueue::new();
    }

    /// Current simulated time.
    pub fn now(&self) -> Tick {
        self.queue.now()
    }

    /// Number of pending events.
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Key of the next event to fire.
    pub fn next_due(&self) -> Option<EventKey> {
        self.queue.next_due()
    }

    /// Values the source has sent.
    pub fn produced_count(&self) -> u64 {
        self.topology.source().produced_count()
    }

    /// Values the buffer has forwarded.
    pub fn buffer_processed_count(&self) -> u64 {
        self.topology.buffer().processed_count()
    }

    /// Values the sink has consumed.
    pub fn sink_processed_count(&self) -> u64 {
        self.topology.sink().processed_count()
    }

    /// Returns the topology.
    pub fn topology(&self) -> &Topology<T, O> {
        &self.topology
    }

    /// Returns the observer.
    pub fn observer(&self) -> &O {
        self.topology.observer()
    }

    /// Returns the observer mutably.
    pub fn observer_mut(&mut self) -> &mut O {
        self.topology.observer_mut()
    }

    /// Returns true when nothing is pending and no value is in flight.
    pub fn is_drained(&self) -> bool {
        self.queue.is_empty()
            && !self.topology.buffer().is_valid()
            && self.topology.source().backlog_len() == 0
    }

    /// Describes every link.
    pub fn links(&self) -> Vec<LinkDesc> {
        self.topology.links()
    }

    /// Snapshot of every counter.
    pub fn stats(&self) -> RunStats {
        let source = self.topology.source();
        let buffer = self.topology.buffer();
        let sink = self.topology.sink();

        RunStats {
            final_tick: self.queue.now(),
            events_fired: self.queue.events_fired(),
            events_pending: self.queue.len(),
            peak_pending: self.queue.peak_len(),
            produced: source.produced_count(),
            queued: source.queued_count(),
            rejected: source.rejected_count(),
            backlog: source.backlog_len(),
            buffer_received: buffer.received_count(),
            buffer_processed: buffer.processed_count(),
            sink_processed: sink.processed_count(),
            grants_issued: sink.grants_issued(),
            grants_relayed: buffer.grants_relayed(),
            grants_received: source.grants_received(),
            in_flight: u64::from(buffer.is_valid()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfigBuilder;
    use crate::observer::Recorder;
    use crate::stages::ProducePolicy;

    fn recorded(delay: Tick, policy: ProducePolicy) -> Simulation<u32, Recorder<u32>> {
        let topology = TopologyBuilder::new(Recorder::new())
            .with_forward_delay(delay)
            .with_policy(policy)
            .wire_default()
            .unwrap()
            .finish()
            .unwrap();
        Simulation::with_topology(topology)
    }

    #[test]
    fn test_single_value_round_trip() {
        let mut sim = recorded(5, ProducePolicy::Reject);
        assert_eq!(sim.produce(42).unwrap(), ProduceOutcome::Sent);

        sim.run_until(4).unwrap();
        assert_eq!(sim.sink_processed_count(), 0);

        sim.run_until(5).unwrap();
        assert_eq!(sim.sink_processed_count(), 1);
        assert_eq!(sim.observer().ticks_of("consumed"), vec![5]);
        assert!(sim.is_drained());
    }

    #[test]
    fn test_advance_moves_clock() {
        let mut sim = recorded(5, ProducePolicy::Reject);
        sim.advance(3).unwrap();
        sim.advance(4).unwrap();
        assert_eq!(sim.now(), 7);
    }

    #[test]
    fn test_step_fires_one_event() {
        let mut sim = recorded(2, ProducePolicy::Reject);
        sim.schedule_produce(1, 9).unwrap();

        let key = sim.step().unwrap().unwrap();
        assert_eq!((key.due_time, key.phase), (1, Phase::PortUpdate));
        assert_eq!(sim.pending_events(), 1);

        let key = sim.step().unwrap().unwrap();
        assert_eq!((key.due_time, key.phase), (3, Phase::Tick));
        assert!(sim.step().unwrap().is_none());
    }

    #[test]
    fn test_cancelled_produce_never_happens() {
        let mut sim = recorded(5, ProducePolicy::Reject);
        let id = sim.schedule_produce(2, 1).unwrap();
        assert!(sim.cancel(id));
        sim.run_to_completion().unwrap();
        assert_eq!(sim.produced_count(), 0);
    }

    #[test]
    fn test_stats_snapshot() {
        let mut sim = recorded(5, ProducePolicy::Queue);
        sim.produce(1).unwrap();
        sim.produce(2).unwrap();

        let stats = sim.stats();
        assert_eq!(stats.produced, 1);
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.in_flight, 1);
        assert!(!sim.is_drained());

        sim.run_to_completion().unwrap();
        let stats = sim.stats();
        assert_eq!(stats.final_tick, 10);
        assert_eq!(stats.sink_processed, 2);
        assert!(stats.is_conserved());
    }

    #[test]
    fn test_reset() {
        let mut sim = recorded(5, ProducePolicy::Reject);
        sim.produce(1).unwrap();
        sim.run_until(20).unwrap();

        sim.reset();
        assert_eq!(sim.now(), 0);
        assert_eq!(sim.produced_count(), 0);
        assert_eq!(sim.links().len(), 4);
        assert_eq!(sim.produce(2).unwrap(), ProduceOutcome::Sent);
    }

    #[test]
    fn test_forward_on_emptied_buffer_halts_run() {
        type Topo = Topology<u32, Recorder<u32>>;

        let mut sim = recorded(5, ProducePolicy::Reject);
        sim.produce(1).unwrap();
        // Wiping the stages leaves the forward armed at tick 5 with nothing held.
        sim.schedule(2, Phase::Tick, |topology: &mut Topo, _: &mut EventQueue<Topo>| {
            topology.reset();
            Ok(())
        })
        .unwrap();
        sim.schedule_produce(8, 2).unwrap();

        let err = sim.run_until(20).unwrap_err();
        assert!(matches!(err, SimError::InternalConsistency { tick: 5, .. }));
        assert_eq!(sim.now(), 5);
        // The produce at tick 8 never ran.
        assert_eq!(sim.pending_events(), 1);
        assert_eq!(sim.sink_processed_count(), 0);
        assert!(sim.observer().named("forwarded").is_empty());
    }

    #[test]
    fn test_from_config_schedules_values() {
        let config = SimConfigBuilder::new()
            .forward_delay(3)
            .policy(ProducePolicy::Queue)
            .values([7, 8, 9])
            .schedule(2, 0)
            .build()
            .unwrap();

        let mut sim = Simulation::from_config_with(&config, Recorder::<u32>::new()).unwrap();
        assert_eq!(sim.pending_events(), 3);

        sim.run_to_completion().unwrap();
        assert_eq!(sim.sink_processed_count(), 3);
        assert_eq!(sim.observer().ticks_of("consumed"), vec![5, 8, 11]);
    }
}
