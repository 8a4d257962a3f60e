//! Event definitions for the stage simulator.
//!
//! An event is a callback due at a `(tick, phase)` position on the
//! simulated timeline. Events are totally ordered by
//! `(due_time, phase, sequence)`; that order is the single source of
//! determinism for a run.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SimResult;
use crate::queue::EventQueue;
use crate::types::{Sequence, Tick};

/// An ordered sub-step within a single tick.
///
/// All `PortUpdate` events at a tick fire before any `Tick` event at that
/// tick. Deliveries and external stimuli land in `PortUpdate`, the work they
/// trigger runs in `Tick`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Values and signals become visible to their receivers.
    PortUpdate,
    /// Stages react to what became visible.
    Tick,
}

impl Phase {
    /// All phases in firing order.
    pub const ALL: [Phase; 2] = [Phase::PortUpdate, Phase::Tick];

    /// The earliest phase of a tick.
    pub fn first() -> Self {
        Phase::PortUpdate
    }

    /// Short lowercase name, used in logs and CSV output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::PortUpdate => "port_update",
            Phase::Tick => "tick",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of an event on the timeline.
///
/// The derived ordering compares `due_time`, then `phase`, then `sequence`,
/// which is exactly the firing order. A key is also the handle returned by
/// [`EventQueue::schedule`] and accepted by [`EventQueue::cancel`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventKey {
    /// Tick at which the event fires
    pub due_time: Tick,
    /// Phase within that tick
    pub phase: Phase,
    /// FIFO tie-breaker within the same `(due_time, phase)`
    pub sequence: Sequence,
}

impl EventKey {
    /// Creates a new event key.
    pub fn new(due_time: Tick, phase: Phase, sequence: Sequence) -> Self {
        Self {
            due_time,
            phase,
            sequence,
        }
    }

    /// Compares only the `(due_time, phase)` slot, ignoring the sequence.
    pub fn cmp_slot(&self, tick: Tick, phase: Phase) -> Ordering {
        (self.due_time, self.phase).cmp(&(tick, phase))
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}#{}", self.due_time, self.phase, self.sequence)
    }
}

/// Handle to a scheduled event.
pub type EventId = EventKey;

/// The work an event performs when it fires.
///
/// The callback gets the simulation context and the queue itself, so it can
/// schedule follow-up work (including re-arming at delay 0).
pub type Callback<C> = Box<dyn FnOnce(&mut C, &mut EventQueue<C>) -> SimResult<()>>;

/// A scheduled event: a key and the callback to run.
///
/// Never mutated after creation; consumed when fired.
pub struct Event<C> {
    /// Where the event sits on the timeline
    pub key: EventKey,
    /// What the event does
    pub callback: Callback<C>,
}

impl<C> Event<C> {
    /// Creates a new event.
    pub fn new(key: EventKey, callback: Callback<C>) -> Self {
        Self { key, callback }
    }

    /// Runs the event's callback, consuming the event.
    pub fn fire(self, ctx: &mut C, queue: &mut EventQueue<C>) -> SimResult<()> {
        (self.callback)(ctx, queue)
    }
}

impl<C> fmt::Debug for Event<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event").field("key", &self.key).finish()
    }
}
