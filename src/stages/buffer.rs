//! One-slot elastic buffer stage.
//!
//! The buffer holds at most one value. Receiving a value arms a forward
//! `forward_delay` ticks later in the `Tick` phase; the forward sends the
//! value downstream and empties the slot. Grant pulses from downstream are
//! relayed upstream immediately, without any delay.
//!
//! # Example
//!
//! ```rust
//! use stagesim::event::Phase;
//! use stagesim::link::{DataLink, DataPort, SignalLink, SignalPort};
//! use stagesim::observer::NullObserver;
//! use stagesim::stage::StageContext;
//! use stagesim::stages::{BufferStage, BufferState};
//!
//! let mut data_out = DataLink::new(1, "buffer.data_out");
//! data_out.bind(DataPort::SinkIn).unwrap();
//! let mut grant_out = SignalLink::new(3, "buffer.grant_out");
//! grant_out.bind(SignalPort::SourceGrantIn).unwrap();
//!
//! let mut buffer: BufferStage<u32> = BufferStage::new(data_out, grant_out, 5);
//! let mut observer = NullObserver;
//! let mut ctx: StageContext<'_, u32> = StageContext::new(0, Phase::PortUpdate, &mut observer);
//!
//! buffer.receive(&mut ctx, 42).unwrap();
//! assert_eq!(buffer.state(), BufferState::Holding);
//! assert!(buffer.receive(&mut ctx, 43).unwrap_err().is_capacity_violation());
//! ```

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::event::Phase;
use crate::link::{DataLink, LinkDesc, SignalLink};
use crate::observer::TraceKind;
use crate::stage::{Stage, StageAction, StageContext};
use crate::types::Tick;

/// Occupancy of the buffer slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferState {
    /// No value held
    Empty,
    /// A value is held and its forward is armed
    Holding,
}

/// The intermediate stage between source and sink.
#[derive(Debug)]
pub struct BufferStage<T> {
    /// Outbound data link (towards the sink)
    pub data_out: DataLink,
    /// Outbound grant link (towards the source)
    pub grant_out: SignalLink,
    forward_delay: Tick,
    held: Option<T>,
    received_count: u64,
    processed_count: u64,
    grants_relayed: u64,
}

impl<T: Clone + Debug> BufferStage<T> {
    /// Creates an empty buffer with latency `forward_delay`.
    pub fn new(data_out: DataLink, grant_out: SignalLink, forward_delay: Tick) -> Self {
        Self {
            data_out,
            grant_out,
            forward_delay,
            held: None,
            received_count: 0,
            processed_count: 0,
            grants_relayed: 0,
        }
    }

    /// Returns the data latency of the stage.
    pub fn forward_delay(&self) -> Tick {
        self.forward_delay
    }

    /// Returns the slot occupancy.
    pub fn state(&self) -> BufferState {
        if self.held.is_some() {
            BufferState::Holding
        } else {
            BufferState::Empty
        }
    }

    /// Returns true while a value awaits its forward.
    pub fn is_valid(&self) -> bool {
        self.held.is_some()
    }

    /// Returns the held value, if any.
    pub fn held(&self) -> Option<&T> {
        self.held.as_ref()
    }

    /// Number of values accepted.
    pub fn received_count(&self) -> u64 {
        self.received_count
    }

    /// Number of values forwarded downstream.
    pub fn processed_count(&self) -> u64 {
        self.processed_count
    }

    /// Number of grant pulses relayed upstream.
    pub fn grants_relayed(&self) -> u64 {
        self.grants_relayed
    }

    /// Accepts a value from upstream and arms its forward.
    ///
    /// # Errors
    /// `CapacityViolation` if a value is already held. The held value is
    /// left untouched.
    pub fn receive(&mut self, ctx: &mut StageContext<'_, T>, value: T) -> SimResult<()> {
        if let Some(held) = &self.held {
            return Err(SimError::CapacityViolation {
                tick: ctx.now(),
                held: format!("{:?}", held),
                incoming: format!("{:?}", value),
            });
        }

        ctx.observe(TraceKind::Received(value.clone()));
        self.held = Some(value);
        self.received_count += 1;
        ctx.schedule(self.forward_delay, Phase::Tick, StageAction::Forward);
        Ok(())
    }

    /// Sends the held value downstream and empties the slot.
    ///
    /// The slot is cleared before the send so a grant coming back through
    /// the same dispatch finds the buffer empty.
    ///
    /// # Errors
    /// `InternalConsistency` if the slot is empty.
    pub fn forward(&mut self, ctx: &mut StageContext<'_, T>) -> SimResult<()> {
        let value = self
            .held
            .take()
            .ok_or_else(|| SimError::internal(ctx.now(), "forward fired on an empty buffer"))?;

        ctx.observe(TraceKind::Forwarded(value.clone()));
        self.processed_count += 1;
        ctx.send(&self.data_out, value)
    }

    /// Relays a downstream grant upstream in the same tick and phase.
    pub fn on_downstream_grant(&mut self, ctx: &mut StageContext<'_, T>) -> SimResult<()> {
        self.grants_relayed += 1;
        ctx.observe(TraceKind::GrantRelayed);
        ctx.pulse(&self.grant_out)
    }
}

impl<T: Clone + Debug> Stage for BufferStage<T> {
    fn name(&self) -> &'static str {
        "buffer"
    }

    fn init(&mut self) {
        self.held = None;
        self.received_count = 0;
        self.processed_count = 0;
        self.grants_relayed = 0;
    }

    fn links(&self) -> Vec<LinkDesc> {
        vec![self.data_out.desc(), self.grant_out.desc()]
    }

    fn stats(&self) -> serde_json::Value {
        serde_json::json!({
            "forward_delay": self.forward_delay,
            "state": self.state(),
            "received": self.received_count,
            "processed": self.processed_count,
            "grants_relayed": self.grants_relayed,
        })
    }
}
