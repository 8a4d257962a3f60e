//! Error types for the stage simulator.
//!
//! Every [`SimError`] describes a structural or programming problem: a
//! miswired topology, a broken handshake, an event that cannot be placed in
//! order, or a scheduler bug. None of them
//! are retried. They propagate out of the scheduler and halt the run.

use thiserror::Error;

use crate::config::ConfigError;
use crate::types::Tick;

/// Fatal simulation errors.
#[derive(Error, Debug)]
pub enum SimError {
    /// A link is unbound, bound twice, or a receiver has two senders.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The buffer received a value while already holding one.
    #[error("Capacity violation at tick {tick}: buffer holding {held} received {incoming}")]
    CapacityViolation {
        /// Tick at which the second value arrived
        tick: Tick,
        /// Debug rendering of the value already held
        held: String,
        /// Debug rendering of the rejected value
        incoming: String,
    },

    /// A scheduler or stage invariant was found broken at runtime.
    #[error("Internal consistency error at tick {tick}: {reason}")]
    InternalConsistency {
        /// Tick at which the violation was detected
        tick: Tick,
        /// What went wrong
        reason: String,
    },

    /// An event could not be placed on the timeline in order: a past tick,
    /// a phase already run at the current tick, or an overflowing delay.
    #[error("Scheduling error at tick {tick}: {reason}")]
    Scheduling {
        /// Clock reading when the request was made
        tick: Tick,
        /// Why the event was refused
        reason: String,
    },

    /// The configuration file could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SimError {
    /// Creates a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        SimError::Configuration(msg.into())
    }

    /// Creates an internal-consistency error.
    pub fn internal(tick: Tick, reason: impl Into<String>) -> Self {
        SimError::InternalConsistency {
            tick,
            reason: reason.into(),
        }
    }

    /// Creates a scheduling error.
    pub fn scheduling(tick: Tick, reason: impl Into<String>) -> Self {
        SimError::Scheduling {
            tick,
            reason: reason.into(),
        }
    }

    /// Returns true for capacity violations.
    pub fn is_capacity_violation(&self) -> bool {
        matches!(self, SimError::CapacityViolation { .. })
    }

    /// Returns true for configuration errors (including config file errors).
    pub fn is_configuration(&self) -> bool {
        matches!(self, SimError::Configuration(_) | SimError::Config(_))
    }

    /// Returns true for internal-consistency errors.
    pub fn is_internal(&self) -> bool {
        matches!(self, SimError::InternalConsistency { .. })
    }

    /// Returns true for scheduling errors.
    pub fn is_scheduling(&self) -> bool {
        matches!(self, SimError::Scheduling { .. })
    }
}

/// Result type for simulation operations.
pub type SimResult<T> = Result<T, SimError>;
