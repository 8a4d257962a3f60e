//! The three pipeline stages.
//!
//! # Available Stages
//!
//! - [`Source`] - Sends values downstream, one per grant
//! - [`BufferStage`] - One-slot elastic buffer with a fixed data latency
//! - [`Sink`] - Consumes values and grants the next one
//!
//! Each stage owns its outbound links and nothing else; inbound traffic
//! reaches it through the topology's dispatcher.

pub mod buffer;
pub mod sink;
pub mod source;

pub use buffer::{BufferStage, BufferState};
pub use sink::{Consumer, Sink};
pub use source::{ProduceOutcome, ProducePolicy, Source};
