//! Lock-Step Driver Example
//!
//! Drives the pipeline the way a grant-aware producer would: one value is
//! produced, then the driver waits (by stepping the scheduler) until the
//! grant for it comes back, then produces the next. With the `Reject`
//! policy nothing is ever dropped.

use stagesim::observer::{Observer, TraceEvent, TraceKind, TracingObserver};
use stagesim::{init_logging, ProducePolicy, SimResult, Simulation, Tick, TopologyBuilder};

const FORWARD_DELAY: Tick = 5;
const ITEMS: u32 = 6;

/// Counts grants reaching the source and forwards everything to `tracing`.
#[derive(Debug, Default)]
struct GrantWatcher {
    inner: TracingObserver,
    grants: u64,
    consumed: Vec<(Tick, u32)>,
}

impl Observer<u32> for GrantWatcher {
    fn record(&mut self, event: TraceEvent<u32>) {
        match &event.kind {
            TraceKind::GrantReceived => self.grants += 1,
            TraceKind::Consumed(v) => self.consumed.push((event.tick, *v)),
            _ => {}
        }
        self.inner.record(event);
    }
}

fn main() {
    init_logging("info");

    if let Err(e) = run() {
        eprintln!("lockstep: {}", e);
        std::process::exit(1);
    }
}

fn run() -> SimResult<()> {
    let topology = TopologyBuilder::new(GrantWatcher::default())
        .with_forward_delay(FORWARD_DELAY)
        .with_policy(ProducePolicy::Reject)
        .wire_default()?
        .finish()?;
    let mut sim = Simulation::with_topology(topology);

    for link in sim.links() {
        println!(
            "link {} {:<18} -> {}",
            link.id,
            link.name,
            link.receiver.as_deref().unwrap_or("<unbound>")
        );
    }
    println!();

    for value in 100..100 + ITEMS {
        let outcome = sim.produce(value)?;
        println!("tick {:>3}: produce {} -> {:?}", sim.now(), value, outcome);

        // Wait for the credit to come back.
        let grants = sim.observer().grants;
        while sim.observer().grants == grants {
            if sim.step()?.is_none() {
                break;
            }
        }
    }

    println!();
    for (tick, value) in &sim.observer().consumed {
        println!("tick {:>3}: sink consumed {}", tick, value);
    }

    let stats = sim.stats();
    println!();
    println!("{}", stats.summary());
    if stats.rejected > 0 {
        eprintln!("lockstep: {} values were rejected", stats.rejected);
    }
    Ok(())
}
