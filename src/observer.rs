//! Observation of stage activity.
//!
//! Stages report everything they do to an [`Observer`] unconditionally; the
//! observer decides what to do with it. [`TracingObserver`] renders records
//! through `tracing`, [`Recorder`] keeps them in memory, and
//! [`NullObserver`] drops them.

use std::fmt::Debug;

use serde::Serialize;

use crate::event::Phase;
use crate::types::Tick;

/// What happened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum TraceKind<T> {
    /// Source sent a value downstream
    Produced(T),
    /// Source was not ready and queued the value
    Queued(T),
    /// Source was not ready and dropped the value
    Rejected(T),
    /// Source received a grant
    GrantReceived,
    /// Buffer accepted a value and armed its forward
    Received(T),
    /// Buffer forwarded its held value downstream
    Forwarded(T),
    /// Buffer relayed a downstream grant upstream
    GrantRelayed,
    /// Sink consumed a value
    Consumed(T),
    /// Sink issued a grant upstream
    GrantIssued,
}

impl<T> TraceKind<T> {
    /// Short snake_case name of the kind.
    pub fn name(&self) -> &'static str {
        match self {
            TraceKind::Produced(_) => "produced",
            TraceKind::Queued(_) => "queued",
            TraceKind::Rejected(_) => "rejected",
            TraceKind::GrantReceived => "grant_received",
            TraceKind::Received(_) => "received",
            TraceKind::Forwarded(_) => "forwarded",
            TraceKind::GrantRelayed => "grant_relayed",
            TraceKind::Consumed(_) => "consumed",
            TraceKind::GrantIssued => "grant_issued",
        }
    }

    /// Returns the carried value, if the kind has one.
    pub fn value(&self) -> Option<&T> {
        match self {
            TraceKind::Produced(v)
            | TraceKind::Queued(v)
            | TraceKind::Rejected(v)
            | TraceKind::Received(v)
            | TraceKind::Forwarded(v)
            | TraceKind::Consumed(v) => Some(v),
            TraceKind::GrantReceived | TraceKind::GrantRelayed | TraceKind::GrantIssued => None,
        }
    }
}

/// A timestamped observation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TraceEvent<T> {
    /// Tick at which it happened
    pub tick: Tick,
    /// Phase in which it happened
    pub phase: Phase,
    /// What happened
    pub kind: TraceKind<T>,
}

/// Receives every observation a stage makes.
pub trait Observer<T> {
    /// Called once per observation, in firing order.
    fn record(&mut self, event: TraceEvent<T>);
}

/// Renders observations as `tracing` events.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl<T: Debug> Observer<T> for TracingObserver {
    fn record(&mut self, event: TraceEvent<T>) {
        let TraceEvent { tick, phase, kind } = event;
        match &kind {
            TraceKind::Rejected(v) => {
                tracing::debug!(tick, %phase, value = ?v, "source not ready, value rejected");
            }
            _ => match kind.value() {
                Some(v) => tracing::debug!(tick, %phase, value = ?v, "{}", kind.name()),
                None => tracing::debug!(tick, %phase, "{}", kind.name()),
            },
        }
    }
}

/// Discards every observation.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl<T> Observer<T> for NullObserver {
    fn record(&mut self, _event: TraceEvent<T>) {}
}

/// Keeps every observation in memory, in order.
#[derive(Clone, Debug)]
pub struct Recorder<T> {
    events: Vec<TraceEvent<T>>,
}

impl<T> Recorder<T> {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Returns all recorded observations.
    pub fn events(&self) -> &[TraceEvent<T>] {
        &self.events
    }

    /// Returns the observations whose kind has the given name.
    pub fn named(&self, name: &str) -> Vec<&TraceEvent<T>> {
        self.events.iter().filter(|e| e.kind.name() == name).collect()
    }

    /// Returns the ticks at which observations of the given kind happened.
    pub fn ticks_of(&self, name: &str) -> Vec<Tick> {
        self.named(name).into_iter().map(|e| e.tick).collect()
    }

    /// Returns the kind names in recording order.
    pub fn sequence(&self) -> Vec<&'static str> {
        self.events.iter().map(|e| e.kind.name()).collect()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Observer<T> for Recorder<T> {
    fn record(&mut self, event: TraceEvent<T>) {
        self.events.push(event);
    }
}
