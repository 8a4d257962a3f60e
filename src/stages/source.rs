//! Source stage.
//!
//! The source sends values downstream one at a time. It starts with one
//! credit (`can_send == true`) and spends it on every send; only a grant
//! pulse returns it. What happens to a value produced without a credit is
//! set by [`ProducePolicy`].

use std::collections::VecDeque;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::SimResult;
use crate::link::{DataLink, LinkDesc};
use crate::observer::TraceKind;
use crate::stage::{Stage, StageContext};

/// What the source does with a value produced while it has no credit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProducePolicy {
    /// Drop the value and report it as rejected.
    #[default]
    Reject,
    /// Keep the value in a FIFO backlog; each grant releases one.
    Queue,
}

/// Result of a [`Source::produce`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProduceOutcome {
    /// Sent downstream immediately
    Sent,
    /// Held in the backlog until a grant arrives
    Queued,
    /// Dropped; the source was not ready
    Rejected,
}

/// The upstream end of the pipeline.
#[derive(Debug)]
pub struct Source<T> {
    /// Outbound data link
    pub data_out: DataLink,
    policy: ProducePolicy,
    can_send: bool,
    backlog: VecDeque<T>,
    produced_count: u64,
    queued_count: u64,
    rejected_count: u64,
    grants_received: u64,
}

impl<T: Clone + Debug> Source<T> {
    /// Creates a primed source with the default [`ProducePolicy::Reject`].
    pub fn new(data_out: DataLink) -> Self {
        Self {
            data_out,
            policy: ProducePolicy::default(),
            can_send: true,
            backlog: VecDeque::new(),
            produced_count: 0,
            queued_count: 0,
            rejected_count: 0,
            grants_received: 0,
        }
    }

    /// Sets the produce policy.
    pub fn with_policy(mut self, policy: ProducePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the produce policy.
    pub fn policy(&self) -> ProducePolicy {
        self.policy
    }

    /// Returns true if the source holds a credit.
    pub fn can_send(&self) -> bool {
        self.can_send
    }

    /// Number of values waiting for a grant.
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Number of values sent downstream.
    pub fn produced_count(&self) -> u64 {
        self.produced_count
    }

    /// Number of values that had to wait in the backlog.
    pub fn queued_count(&self) -> u64 {
        self.queued_count
    }

    /// Number of values dropped for lack of a credit.
    pub fn rejected_count(&self) -> u64 {
        self.rejected_count
    }

    /// Number of grant pulses received.
    pub fn grants_received(&self) -> u64 {
        self.grants_received
    }

    /// Offers a value to the pipeline.
    ///
    /// With a credit the value is sent right away and the credit is spent.
    /// Without one, the policy decides between queueing and rejecting.
    pub fn produce(
        &mut self,
        ctx: &mut StageContext<'_, T>,
        value: T,
    ) -> SimResult<ProduceOutcome> {
        if self.can_send {
            self.send(ctx, value)?;
            return Ok(ProduceOutcome::Sent);
        }

        match self.policy {
            ProducePolicy::Queue => {
                ctx.observe(TraceKind::Queued(value.clone()));
                self.backlog.push_back(value);
                self.queued_count += 1;
                Ok(ProduceOutcome::Queued)
            }
            ProducePolicy::Reject => {
                ctx.observe(TraceKind::Rejected(value));
                self.rejected_count += 1;
                Ok(ProduceOutcome::Rejected)
            }
        }
    }

    /// Handles a grant pulse: regain the credit and, if a value is waiting,
    /// spend it on that value straight away.
    pub fn on_grant(&mut self, ctx: &mut StageContext<'_, T>) -> SimResult<()> {
        self.grants_received += 1;
        self.can_send = true;
        ctx.observe(TraceKind::GrantReceived);

        if let Some(value) = self.backlog.pop_front() {
            self.send(ctx, value)?;
        }
        Ok(())
    }

    fn send(&mut self, ctx: &mut StageContext<'_, T>, value: T) -> SimResult<()> {
        ctx.observe(TraceKind::Produced(value.clone()));
        ctx.send(&self.data_out, value)?;
        self.can_send = false;
        self.produced_count += 1;
        Ok(())
    }
}

impl<T: Clone + Debug> Stage for Source<T> {
    fn name(&self) -> &'static str {
        "source"
    }

    fn init(&mut self) {
        self.can_send = true;
        self.backlog.clear();
        self.produced_count = 0;
        self.queued_count = 0;
        self.rejected_count = 0;
        self.grants_received = 0;
    }

    fn links(&self) -> Vec<LinkDesc> {
        vec![self.data_out.desc()]
    }

    fn stats(&self) -> serde_json::Value {
        serde_json::json!({
            "policy": self.policy,
            "can_send": self.can_send,
            "backlog": self.backlog.len(),
            "produced": self.produced_count,
            "queued": self.queued_count,
            "rejected": self.rejected_count,
            "grants_received": self.grants_received,
        })
    }
}
