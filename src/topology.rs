//! Topology construction and synchronous dispatch.
//!
//! A topology is built in three steps, mirroring the classic
//! build → configure → bind lifecycle:
//!
//! 1. **Build**: [`TopologyBuilder::new`] creates the three stages and their
//!    four outbound links, all unbound.
//! 2. **Configure**: `with_forward_delay`, `with_policy` and `with_consumer`
//!    set stage parameters.
//! 3. **Bind**: [`TopologyBuilder::bind_data`] / [`TopologyBuilder::bind_signal`]
//!    attach each link to its receiving port (or [`TopologyBuilder::wire_default`]
//!    does the standard four bindings), and [`TopologyBuilder::finish`]
//!    validates the wiring and returns an assembled [`Topology`].
//!
//! ```text
//!   Source --data(0)--> Buffer --data(1)--> Sink
//!   Source <-grant(3)-- Buffer <-grant(2)-- Sink
//! ```
//!
//! At runtime the topology is the context of the event queue. Every entry
//! point (a driver stimulus or a stage timer) runs one handler, then drains
//! the handler's outbox in FIFO order, calling receiving handlers in the same
//! tick and phase. Timers requested along the way are scheduled on the queue
//! once the outbox is empty.

use std::collections::HashSet;
use std::fmt::Debug;

use crate::error::{SimError, SimResult};
use crate::event::Phase;
use crate::link::{DataLink, DataPort, Delivery, LinkDesc, SignalLink, SignalPort};
use crate::observer::Observer;
use crate::queue::EventQueue;
use crate::stage::{Stage, StageAction, StageContext};
use crate::stages::{BufferStage, Consumer, ProduceOutcome, ProducePolicy, Sink, Source};
use crate::types::{LinkId, Tick};

/// Link carrying values from the source to the buffer.
pub const SOURCE_DATA_OUT: LinkId = 0;
/// Link carrying values from the buffer to the sink.
pub const BUFFER_DATA_OUT: LinkId = 1;
/// Link carrying grants from the sink to the buffer.
pub const SINK_GRANT_OUT: LinkId = 2;
/// Link carrying grants from the buffer to the source.
pub const BUFFER_GRANT_OUT: LinkId = 3;

/// Default buffer latency in ticks.
pub const DEFAULT_FORWARD_DELAY: Tick = 5;

/// The three stages of the pipeline.
#[derive(Debug)]
pub struct Stages<T> {
    /// Upstream end
    pub source: Source<T>,
    /// One-slot elastic buffer
    pub buffer: BufferStage<T>,
    /// Downstream end
    pub sink: Sink<T>,
}

impl<T: Clone + Debug> Stages<T> {
    /// Routes a delivery to the handler registered for its port.
    fn deliver(&mut self, ctx: &mut StageContext<'_, T>, delivery: Delivery<T>) -> SimResult<()> {
        match delivery {
            Delivery::Data {
                port: DataPort::BufferIn,
                value,
                ..
            } => self.buffer.receive(ctx, value),
            Delivery::Data {
                port: DataPort::SinkIn,
                value,
                ..
            } => self.sink.on_receive(ctx, value),
            Delivery::Signal {
                port: SignalPort::BufferGrantIn,
                ..
            } => self.buffer.on_downstream_grant(ctx),
            Delivery::Signal {
                port: SignalPort::SourceGrantIn,
                ..
            } => self.source.on_grant(ctx),
        }
    }

    /// Runs a timer action.
    fn perform(&mut self, ctx: &mut StageContext<'_, T>, action: StageAction) -> SimResult<()> {
        match action {
            StageAction::Forward => self.buffer.forward(ctx),
        }
    }

    fn all(&self) -> [&dyn Stage; 3] {
        [&self.source, &self.buffer, &self.sink]
    }
}

/// An assembled, validated pipeline plus its observer.
///
/// Bindings are fixed once the topology exists; only stage state changes
/// while the simulation runs.
#[derive(Debug)]
pub struct Topology<T, O> {
    stages: Stages<T>,
    observer: O,
}

impl<T, O> Topology<T, O>
where
    T: Clone + Debug + 'static,
    O: Observer<T> + 'static,
{
    /// Builds the standard pipeline with the default wiring.
    pub fn wire_default(forward_delay: Tick, observer: O) -> SimResult<Self> {
        TopologyBuilder::new(observer)
            .with_forward_delay(forward_delay)
            .wire_default()?
            .finish()
    }

    /// Returns the source stage.
    pub fn source(&self) -> &Source<T> {
        &self.stages.source
    }

    /// Returns the buffer stage.
    pub fn buffer(&self) -> &BufferStage<T> {
        &self.stages.buffer
    }

    /// Returns the sink stage.
    pub fn sink(&self) -> &Sink<T> {
        &self.stages.sink
    }

    /// Returns the observer.
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Returns the observer mutably.
    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Describes every link in id order.
    pub fn links(&self) -> Vec<LinkDesc> {
        let mut links: Vec<LinkDesc> = self.stages.all().iter().flat_map(|s| s.links()).collect();
        links.sort_by_key(|l| l.id);
        links
    }

    /// Exports per-stage counters keyed by stage name.
    pub fn stage_stats(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .stages
            .all()
            .iter()
            .map(|s| (s.name().to_string(), s.stats()))
            .collect();
        serde_json::Value::Object(map)
    }

    /// Resets every stage to its initial state. Bindings are kept.
    ///
    /// Pending queue events are not touched, so this is only sound together
    /// with a fresh queue, as [`Simulation::reset`](crate::Simulation::reset) does.
    pub(crate) fn reset(&mut self) {
        self.stages.source.init();
        self.stages.buffer.init();
        self.stages.sink.init();
    }

    /// Offers a value to the source at the queue's current tick.
    pub fn produce(
        &mut self,
        queue: &mut EventQueue<Self>,
        value: T,
    ) -> SimResult<ProduceOutcome> {
        self.dispatch(queue, |stages, ctx| stages.source.produce(ctx, value))
    }

    /// Pushes a value straight into the buffer, skipping the handshake.
    pub fn inject(&mut self, queue: &mut EventQueue<Self>, value: T) -> SimResult<()> {
        self.dispatch(queue, |stages, ctx| stages.buffer.receive(ctx, value))
    }

    fn perform(&mut self, queue: &mut EventQueue<Self>, action: StageAction) -> SimResult<()> {
        self.dispatch(queue, |stages, ctx| stages.perform(ctx, action))
    }

    /// Runs `handler`, then every delivery it caused, then schedules the
    /// timers they requested.
    fn dispatch<R, F>(&mut self, queue: &mut EventQueue<Self>, handler: F) -> SimResult<R>
    where
        F: FnOnce(&mut Stages<T>, &mut StageContext<'_, T>) -> SimResult<R>,
    {
        let now = queue.now();
        let phase = queue.current_phase().unwrap_or_else(Phase::first);
        let mut ctx = StageContext::new(now, phase, &mut self.observer);

        let result = handler(&mut self.stages, &mut ctx)?;

        while let Some(delivery) = ctx.next_delivery() {
            tracing::debug!(tick = now, %phase, link = delivery.link(), "delivery");
            self.stages.deliver(&mut ctx, delivery)?;
        }

        for timer in ctx.take_timers() {
            let action = timer.action;
            queue.schedule(
                timer.delay,
                timer.phase,
                move |topology: &mut Self, queue: &mut EventQueue<Self>| {
                    topology.perform(queue, action)
                },
            )?;
        }

        Ok(result)
    }
}

/// Three-step constructor for a [`Topology`].
pub struct TopologyBuilder<T, O> {
    forward_delay: Tick,
    policy: ProducePolicy,
    consumer: Option<Consumer<T>>,
    observer: O,
    source_data_out: DataLink,
    buffer_data_out: DataLink,
    sink_grant_out: SignalLink,
    buffer_grant_out: SignalLink,
}

impl<T, O: Debug> Debug for TopologyBuilder<T, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopologyBuilder")
            .field("forward_delay", &self.forward_delay)
            .field("policy", &self.policy)
            .field("has_consumer", &self.consumer.is_some())
            .field("observer", &self.observer)
            .field("source_data_out", &self.source_data_out)
            .field("buffer_data_out", &self.buffer_data_out)
            .field("sink_grant_out", &self.sink_grant_out)
            .field("buffer_grant_out", &self.buffer_grant_out)
            .finish()
    }
}

impl<T, O> TopologyBuilder<T, O>
where
    T: Clone + Debug + 'static,
    O: Observer<T> + 'static,
{
    /// Creates the stages' links, all unbound, with default parameters.
    pub fn new(observer: O) -> Self {
        Self {
            forward_delay: DEFAULT_FORWARD_DELAY,
            policy: ProducePolicy::default(),
            consumer: None,
            observer,
            source_data_out: DataLink::new(SOURCE_DATA_OUT, "source.data_out"),
            buffer_data_out: DataLink::new(BUFFER_DATA_OUT, "buffer.data_out"),
            sink_grant_out: SignalLink::new(SINK_GRANT_OUT, "sink.grant_out"),
            buffer_grant_out: SignalLink::new(BUFFER_GRANT_OUT, "buffer.grant_out"),
        }
    }

    /// Sets the buffer latency.
    pub fn with_forward_delay(mut self, delay: Tick) -> Self {
        self.forward_delay = delay;
        self
    }

    /// Sets the source's produce policy.
    pub fn with_policy(mut self, policy: ProducePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the sink's consumption effect.
    pub fn with_consumer<F>(mut self, consumer: F) -> Self
    where
        F: FnMut(Tick, &T) + 'static,
    {
        self.consumer = Some(Box::new(consumer));
        self
    }

    /// Binds data link `link` to `port`.
    pub fn bind_data(mut self, link: LinkId, port: DataPort) -> SimResult<Self> {
        match link {
            SOURCE_DATA_OUT => self.source_data_out.bind(port)?,
            BUFFER_DATA_OUT => self.buffer_data_out.bind(port)?,
            other => {
                return Err(SimError::configuration(format!(
                    "link {} is not a data link",
                    other
                )))
            }
        }
        Ok(self)
    }

    /// Binds signal link `link` to `port`.
    pub fn bind_signal(mut self, link: LinkId, port: SignalPort) -> SimResult<Self> {
        match link {
            SINK_GRANT_OUT => self.sink_grant_out.bind(port)?,
            BUFFER_GRANT_OUT => self.buffer_grant_out.bind(port)?,
            other => {
                return Err(SimError::configuration(format!(
                    "link {} is not a signal link",
                    other
                )))
            }
        }
        Ok(self)
    }

    /// Performs the four standard bindings.
    pub fn wire_default(self) -> SimResult<Self> {
        self.bind_data(SOURCE_DATA_OUT, DataPort::BufferIn)?
            .bind_data(BUFFER_DATA_OUT, DataPort::SinkIn)?
            .bind_signal(SINK_GRANT_OUT, SignalPort::BufferGrantIn)?
            .bind_signal(BUFFER_GRANT_OUT, SignalPort::SourceGrantIn)
    }

    /// Validates the wiring and assembles the topology.
    ///
    /// # Errors
    /// `Configuration` if a link is unbound, a port has two senders, or a
    /// stage is wired to itself.
    pub fn finish(self) -> SimResult<Topology<T, O>> {
        self.validate()?;

        let source = Source::new(self.source_data_out).with_policy(self.policy);
        let buffer =
            BufferStage::new(self.buffer_data_out, self.buffer_grant_out, self.forward_delay);
        let mut sink = Sink::new(self.sink_grant_out);
        if let Some(consumer) = self.consumer {
            sink.set_consumer(consumer);
        }

        tracing::debug!(
            forward_delay = self.forward_delay,
            policy = ?self.policy,
            "topology assembled"
        );

        Ok(Topology {
            stages: Stages {
                source,
                buffer,
                sink,
            },
            observer: self.observer,
        })
    }

    fn validate(&self) -> SimResult<()> {
        let data = [&self.source_data_out, &self.buffer_data_out];
        let signal = [&self.sink_grant_out, &self.buffer_grant_out];

        let unbound = data
            .iter()
            .filter(|l| !l.is_bound())
            .map(|l| l.name())
            .chain(signal.iter().filter(|l| !l.is_bound()).map(|l| l.name()))
            .next();
        if let Some(name) = unbound {
            return Err(SimError::configuration(format!("link '{}' is unbound", name)));
        }

        let mut data_ports = HashSet::new();
        for link in data {
            if let Some(port) = link.receiver() {
                if !data_ports.insert(port) {
                    return Err(SimError::configuration(format!("port {} has two senders", port)));
                }
            }
        }
        let mut signal_ports = HashSet::new();
        for link in signal {
            if let Some(port) = link.receiver() {
                if !signal_ports.insert(port) {
                    return Err(SimError::configuration(format!("port {} has two senders", port)));
                }
            }
        }

        if self.buffer_data_out.receiver() == Some(DataPort::BufferIn)
            || self.buffer_grant_out.receiver() == Some(SignalPort::BufferGrantIn)
        {
            return Err(SimError::configuration("buffer is wired to itself"));
        }

        Ok(())
    }
}
