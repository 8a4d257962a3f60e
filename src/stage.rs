//! The `Stage` trait and the context handed to stage handlers.
//!
//! Stages are local state machines. A handler never touches another stage
//! or the event queue directly: it records sends, pulses, timers and
//! observations on its [`StageContext`], and the topology carries them out
//! before any other queued event is considered.

use std::collections::VecDeque;

use crate::error::SimResult;
use crate::event::Phase;
use crate::link::{DataLink, Delivery, LinkDesc, SignalLink};
use crate::observer::{Observer, TraceEvent, TraceKind};
use crate::types::Tick;

/// Deferred work a stage can ask the scheduler to run later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageAction {
    /// Buffer forwards its held value downstream
    Forward,
}

/// A request to run a [`StageAction`] after `delay` ticks in `phase`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerRequest {
    /// Ticks from now
    pub delay: Tick,
    /// Phase to fire in
    pub phase: Phase,
    /// What to run
    pub action: StageAction,
}

/// Everything a stage handler may do besides mutating its own state.
pub struct StageContext<'a, T> {
    now: Tick,
    phase: Phase,
    outbox: VecDeque<Delivery<T>>,
    timers: Vec<TimerRequest>,
    observer: &'a mut dyn Observer<T>,
}

impl<'a, T> StageContext<'a, T> {
    /// Creates a context for handlers running at `now` in `phase`.
    pub fn new(now: Tick, phase: Phase, observer: &'a mut dyn Observer<T>) -> Self {
        Self {
            now,
            phase,
            outbox: VecDeque::new(),
            timers: Vec::new(),
            observer,
        }
    }

    /// Current simulated time.
    pub fn now(&self) -> Tick {
        self.now
    }

    /// Phase the handler is running in.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Sends `value` on a data link.
    pub fn send(&mut self, link: &DataLink, value: T) -> SimResult<()> {
        let delivery = link.deliver(value)?;
        self.outbox.push_back(delivery);
        Ok(())
    }

    /// Pulses a signal link.
    pub fn pulse(&mut self, link: &SignalLink) -> SimResult<()> {
        let delivery = link.deliver()?;
        self.outbox.push_back(delivery);
        Ok(())
    }

    /// Asks for `action` to run `delay` ticks from now in `phase`.
    pub fn schedule(&mut self, delay: Tick, phase: Phase, action: StageAction) {
        self.timers.push(TimerRequest {
            delay,
            phase,
            action,
        });
    }

    /// Reports an observation stamped with the current tick and phase.
    pub fn observe(&mut self, kind: TraceKind<T>) {
        self.observer.record(TraceEvent {
            tick: self.now,
            phase: self.phase,
            kind,
        });
    }

    /// Takes the oldest undelivered send, if any.
    pub(crate) fn next_delivery(&mut self) -> Option<Delivery<T>> {
        self.outbox.pop_front()
    }

    /// Takes every timer requested so far, in request order.
    pub(crate) fn take_timers(&mut self) -> Vec<TimerRequest> {
        std::mem::take(&mut self.timers)
    }
}

/// Common surface of the pipeline stages.
pub trait Stage {
    /// Stage name used in logs and statistics.
    fn name(&self) -> &'static str;

    /// Resets counters and state to their initial values.
    ///
    /// Link bindings are kept.
    fn init(&mut self);

    /// Returns the outbound links owned by this stage.
    fn links(&self) -> Vec<LinkDesc>;

    /// Exports the stage's counters.
    fn stats(&self) -> serde_json::Value;
}
