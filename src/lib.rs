//! # Stagesim
//!
//! A deterministic discrete-event simulator for a three-stage pipeline: a
//! source, a one-slot elastic buffer and a sink, connected by data links
//! and grant (credit) links.
//!
//! ## Design Principles
//!
//! - **Total order**: every event is keyed by `(tick, phase, sequence)`;
//!   that order alone decides what happens first, so a run is reproducible
//!   bit-for-bit for the same stimulus.
//! - **Phases**: within a tick, `PortUpdate` work (deliveries, external
//!   stimuli) fires before `Tick` work (stage reactions such as the buffer's
//!   forward).
//! - **Synchronous links**: sending on a link runs the receiver's handler in
//!   the same call; only stage processing time goes through the queue.
//! - **Back-pressure by grants**: the sink grants after it consumes, the
//!   buffer relays grants immediately, and the source sends only with a
//!   credit. At most one value is ever in the buffer.
//!
//! ## Quick Start
//!
//! ```rust
//! use stagesim::observer::Recorder;
//! use stagesim::{Simulation, TopologyBuilder};
//!
//! let topology = TopologyBuilder::new(Recorder::<u32>::new())
//!     .with_forward_delay(5)
//!     .wire_default()
//!     .unwrap()
//!     .finish()
//!     .unwrap();
//! let mut sim = Simulation::with_topology(topology);
//!
//! sim.produce(42).unwrap();
//! sim.run_until(10).unwrap();
//!
//! assert_eq!(sim.observer().ticks_of("consumed"), vec![5]);
//! assert_eq!(sim.produced_count(), sim.sink_processed_count());
//! ```
//!
//! ## Configuration-Driven Setup
//!
//! ```rust,ignore
//! use stagesim::{SimConfig, Simulation};
//!
//! let config = SimConfig::from_file("configs/stage_sim.yaml")?;
//! let mut sim = Simulation::from_config(&config)?;
//! sim.run_to_completion()?;
//! println!("{}", sim.stats().summary());
//! ```

pub mod types;
pub mod error;
pub mod event;
pub mod queue;
pub mod link;
pub mod observer;
pub mod stage;
pub mod stages;
pub mod topology;
pub mod simulation;
pub mod config;
pub mod stats;

// Re-export commonly used types
pub use types::{LinkId, Sequence, Tick};
pub use error::{SimError, SimResult};
pub use event::{Event, EventId, EventKey, Phase};
pub use queue::EventQueue;
pub use link::{DataLink, DataPort, LinkDesc, LinkKind, SignalLink, SignalPort};
pub use observer::{NullObserver, Observer, Recorder, TraceEvent, TraceKind, TracingObserver};
pub use stage::{Stage, StageContext};
pub use stages::{BufferStage, BufferState, ProduceOutcome, ProducePolicy, Sink, Source};
pub use topology::{Topology, TopologyBuilder};
pub use simulation::Simulation;
pub use config::{ConfigError, SimConfig, SimConfigBuilder};
pub use stats::{RunStats, Timer};

/// Initialize the tracing subscriber for logging.
///
/// Call this at the start of your program to enable logging. `RUST_LOG`
/// takes precedence over `level` when set.
///
/// # Example
///
/// ```rust,ignore
/// stagesim::init_logging("debug");
/// ```
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
