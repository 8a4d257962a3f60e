//! Sink stage.
//!
//! The sink consumes each value it receives and then, within the same
//! dispatch, pulses a grant upstream to ask for the next one. Consuming
//! before granting is what keeps a second value from ever being in flight
//! towards a sink that is still busy.

use std::fmt;
use std::fmt::Debug;

use crate::error::SimResult;
use crate::link::{LinkDesc, SignalLink};
use crate::observer::TraceKind;
use crate::stage::{Stage, StageContext};
use crate::types::Tick;

/// Consumption effect invoked for every value the sink receives.
pub type Consumer<T> = Box<dyn FnMut(Tick, &T)>;

/// The downstream end of the pipeline.
pub struct Sink<T> {
    /// Outbound grant link
    pub grant_out: SignalLink,
    consumer: Option<Consumer<T>>,
    processed_count: u64,
    grants_issued: u64,
}

impl<T: Clone + Debug> Sink<T> {
    /// Creates a sink whose consumption has no external effect.
    pub fn new(grant_out: SignalLink) -> Self {
        Self {
            grant_out,
            consumer: None,
            processed_count: 0,
            grants_issued: 0,
        }
    }

    /// Sets the consumption effect.
    pub fn with_consumer<F>(mut self, consumer: F) -> Self
    where
        F: FnMut(Tick, &T) + 'static,
    {
        self.consumer = Some(Box::new(consumer));
        self
    }

    /// Replaces the consumption effect on an existing sink.
    pub fn set_consumer(&mut self, consumer: Consumer<T>) {
        self.consumer = Some(consumer);
    }

    /// Number of values consumed.
    pub fn processed_count(&self) -> u64 {
        self.processed_count
    }

    /// Number of grant pulses sent upstream.
    pub fn grants_issued(&self) -> u64 {
        self.grants_issued
    }

    /// Consumes `value`, then grants upstream.
    pub fn on_receive(&mut self, ctx: &mut StageContext<'_, T>, value: T) -> SimResult<()> {
        if let Some(consumer) = self.consumer.as_mut() {
            consumer(ctx.now(), &value);
        }
        ctx.observe(TraceKind::Consumed(value));
        self.processed_count += 1;

        ctx.observe(TraceKind::GrantIssued);
        self.grants_issued += 1;
        ctx.pulse(&self.grant_out)
    }
}

impl<T> fmt::Debug for Sink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("grant_out", &self.grant_out)
            .field("has_consumer", &self.consumer.is_some())
            .field("processed_count", &self.processed_count)
            .field("grants_issued", &self.grants_issued)
            .finish()
    }
}

impl<T: Clone + Debug> Stage for Sink<T> {
    fn name(&self) -> &'static str {
        "sink"
    }

    fn init(&mut self) {
        self.processed_count = 0;
        self.grants_issued = 0;
    }

    fn links(&self) -> Vec<LinkDesc> {
        vec![self.grant_out.desc()]
    }

    fn stats(&self) -> serde_json::Value {
        serde_json::json!({
            "processed": self.processed_count,
            "grants_issued": self.grants_issued,
        })
    }
}
