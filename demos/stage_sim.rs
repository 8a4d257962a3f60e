//! Stage Simulation Driver
//!
//! Runs the source → buffer → sink pipeline from a YAML or JSON
//! configuration file and prints the run statistics.
//!
//! Usage: `cargo run --example stage_sim [config-path]`
//! (defaults to `configs/stage_sim.yaml`)

use std::error::Error;
use std::path::{Path, PathBuf};

use stagesim::{init_logging, SimConfig, Simulation, Timer};

const DEFAULT_CONFIG: &str = "configs/stage_sim.yaml";

fn main() {
    if let Err(e) = run() {
        eprintln!("stage_sim: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let path: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CONFIG));

    let config = SimConfig::from_file(&path)?;
    init_logging(&config.simulation.log_level);

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║              Stage Simulation Example                    ║");
    println!("╚══════════════════════════════════════════════════════════╝");
    println!("Config:        {}", path.display());
    println!("Forward delay: {} ticks", config.buffer.forward_delay);
    println!("Policy:        {:?}", config.source.policy);
    println!(
        "Stimulus:      {} values from tick {} every {} ticks",
        config.source.values.len(),
        config.source.start_tick,
        config.source.interval
    );
    match config.simulation.end_tick {
        Some(end) => println!("Run until:     tick {}", end),
        None => println!("Run until:     drained"),
    }
    println!();

    let mut sim = Simulation::from_config(&config)?;

    let timer = Timer::start();
    match config.simulation.end_tick {
        Some(end) => sim.run_until(end)?,
        None => sim.run_to_completion()?,
    };

    let mut stats = sim.stats();
    stats.compute_timing(timer.elapsed_ms());
    println!("{}", stats.summary());

    if let Some(dir) = &config.simulation.output_dir {
        write_outputs(Path::new(dir), &stats)?;
        println!("Statistics written to {}", dir);
    }

    Ok(())
}

fn write_outputs(dir: &Path, stats: &stagesim::RunStats) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    stats.to_json_file(dir.join("stats.json"))?;
    stats.to_csv_file(dir.join("stats.csv"))
}
