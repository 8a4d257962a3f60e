//! The event queue: a time- and phase-ordered ready list of callbacks.
//!
//! `EventQueue<C>` is generic over the context its callbacks mutate. The
//! queue and the context are separate values, so a callback can borrow the
//! context mutably while still scheduling follow-up work on the queue.
//!
//! # Ordering
//!
//! Events fire in `(due_time, phase, sequence)` order. Scheduling at delay 0
//! into the phase currently being executed is legal and the new event fires
//! in the same pass, after everything already scheduled for that slot.
//!
//! # Example
//!
//! ```
//! use stagesim::event::Phase;
//! use stagesim::queue::EventQueue;
//!
//! let mut queue: EventQueue<Vec<u64>> = EventQueue::new();
//! let mut log = Vec::new();
//!
//! queue.schedule(5, Phase::Tick, |log: &mut Vec<u64>, q: &mut EventQueue<Vec<u64>>| {
//!     log.push(q.now());
//!     Ok(())
//! }).unwrap();
//!
//! let fired = queue.run_until(&mut log, 10).unwrap();
//! assert_eq!(fired, 1);
//! assert_eq!(log, vec![5]);
//! assert_eq!(queue.now(), 10);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{SimError, SimResult};
use crate::event::{Callback, Event, EventId, EventKey, Phase};
use crate::types::{Sequence, Tick};

/// Ordered queue of pending events plus the simulated clock.
pub struct EventQueue<C> {
    /// Pending events in firing order
    events: BTreeMap<EventKey, Callback<C>>,
    /// Current simulated time
    now: Tick,
    /// Phase of the most recently fired event at `now`, if any fired at `now`
    cursor: Option<Phase>,
    /// Next sequence number to hand out
    next_sequence: Sequence,
    /// Total events fired over the queue's lifetime
    fired: u64,
    /// Largest number of pending events observed
    peak_len: usize,
}

impl<C> EventQueue<C> {
    /// Creates an empty queue at tick 0.
    pub fn new() -> Self {
        Self {
            events: BTreeMap::new(),
            now: 0,
            cursor: None,
            next_sequence: 0,
            fired: 0,
            peak_len: 0,
        }
    }

    /// Returns the current simulated time.
    pub fn now(&self) -> Tick {
        self.now
    }

    /// Returns the phase currently executing (or last executed) at `now`.
    ///
    /// `None` means no event has fired yet at the current tick.
    pub fn current_phase(&self) -> Option<Phase> {
        self.cursor
    }

    /// Returns the number of pending events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if no events are pending.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the key of the next event to fire.
    pub fn next_due(&self) -> Option<EventKey> {
        self.events.keys().next().copied()
    }

    /// Returns the total number of events fired so far.
    pub fn events_fired(&self) -> u64 {
        self.fired
    }

    /// Returns the largest number of events that were ever pending at once.
    pub fn peak_len(&self) -> usize {
        self.peak_len
    }

    /// Schedules `callback` at `now + delay` in `phase`.
    ///
    /// # Errors
    /// `Scheduling` if `delay` is zero and `phase` already ran at the current
    /// tick (the event could not fire in phase order), or if the due time
    /// overflows. Between runs this depends on what fired at `now`: after
    /// `run_until(t)` fired `Tick`-phase work at `t`, a zero-delay
    /// `PortUpdate` event is refused, while a tick at which nothing fired
    /// accepts either phase.
    pub fn schedule<F>(&mut self, delay: Tick, phase: Phase, callback: F) -> SimResult<EventId>
    where
        F: FnOnce(&mut C, &mut EventQueue<C>) -> SimResult<()> + 'static,
    {
        let due_time = self.now.checked_add(delay).ok_or_else(|| {
            SimError::scheduling(self.now, format!("delay {} overflows the timeline", delay))
        })?;

        if delay == 0 {
            if let Some(current) = self.cursor {
                if phase < current {
                    return Err(SimError::scheduling(
                        self.now,
                        format!(
                            "cannot schedule into elapsed phase {} while in {}",
                            phase, current
                        ),
                    ));
                }
            }
        }

        let key = EventKey::new(due_time, phase, self.next_sequence);
        self.next_sequence += 1;
        self.events.insert(key, Box::new(callback));
        self.peak_len = self.peak_len.max(self.events.len());

        tracing::trace!(%key, "scheduled event");
        Ok(key)
    }

    /// Schedules `callback` at absolute tick `at` in `phase`.
    ///
    /// # Errors
    /// `Scheduling` if `at` is in the past. `at == now` follows the
    /// elapsed-phase rule of [`EventQueue::schedule`].
    pub fn schedule_at<F>(&mut self, at: Tick, phase: Phase, callback: F) -> SimResult<EventId>
    where
        F: FnOnce(&mut C, &mut EventQueue<C>) -> SimResult<()> + 'static,
    {
        if at < self.now {
            return Err(SimError::scheduling(
                self.now,
                format!("cannot schedule at past tick {}", at),
            ));
        }
        self.schedule(at - self.now, phase, callback)
    }

    /// Cancels a pending event. Returns false if it already fired or was
    /// never scheduled.
    pub fn cancel(&mut self, id: EventId) -> bool {
        self.events.remove(&id).is_some()
    }

    /// Removes and returns the earliest event due at or before `end_time`.
    fn pop_due(&mut self, end_time: Tick) -> Option<Event<C>> {
        let key = *self.events.keys().next()?;
        if key.due_time > end_time {
            return None;
        }
        self.events
            .remove(&key)
            .map(|callback| Event::new(key, callback))
    }

    /// Advances the clock to the event's slot and runs it.
    fn fire(&mut self, ctx: &mut C, event: Event<C>) -> SimResult<()> {
        self.now = event.key.due_time;
        self.cursor = Some(event.key.phase);
        self.fired += 1;
        event.fire(ctx, self)
    }

    /// Fires every event due at or before `end_time`, in order.
    ///
    /// Afterwards the clock reads `max(now, end_time)`. The first callback
    /// error stops the run and is returned; the clock stays at the failing
    /// event's tick.
    ///
    /// # Returns
    /// The number of events fired by this call
    pub fn run_until(&mut self, ctx: &mut C, end_time: Tick) -> SimResult<u64> {
        let start = self.fired;

        while let Some(event) = self.pop_due(end_time) {
            self.fire(ctx, event)?;
        }

        if end_time > self.now {
            self.now = end_time;
            self.cursor = None;
        }

        Ok(self.fired - start)
    }

    /// Fires events until none remain. The clock stops at the last event.
    pub fn run_to_completion(&mut self, ctx: &mut C) -> SimResult<u64> {
        let start = self.fired;
        while let Some(event) = self.pop_due(Tick::MAX) {
            self.fire(ctx, event)?;
        }
        Ok(self.fired - start)
    }

    /// Fires exactly the next pending event, whatever its due time.
    ///
    /// # Returns
    /// The key of the event fired, or `None` if the queue was empty
    pub fn step(&mut self, ctx: &mut C) -> SimResult<Option<EventKey>> {
        match self.pop_due(Tick::MAX) {
            Some(event) => {
                let key = event.key;
                self.fire(ctx, event)?;
                Ok(Some(key))
            }
            None => Ok(None),
        }
    }
}

impl<C> Default for EventQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for EventQueue<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("now", &self.now)
            .field("cursor", &self.cursor)
            .field("pending", &self.events.keys().collect::<Vec<_>>())
            .field("fired", &self.fired)
            .finish()
    }
}
