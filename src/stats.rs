//! Run statistics and their export formats.
//!
//! [`RunStats`] is a snapshot of every counter the pipeline keeps, taken
//! after (or during) a run. It can be exported as JSON, as a `metric,value`
//! CSV, or as a human-readable summary.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use crate::types::Tick;

/// Counters of a simulation run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Simulated time when the snapshot was taken
    pub final_tick: Tick,
    /// Events fired by the scheduler
    pub events_fired: u64,
    /// Events still pending
    pub events_pending: usize,
    /// Largest number of events ever pending at once
    pub peak_pending: usize,

    /// Values the source sent downstream
    pub produced: u64,
    /// Values the source had to queue
    pub queued: u64,
    /// Values the source rejected
    pub rejected: u64,
    /// Values still waiting in the source backlog
    pub backlog: usize,

    /// Values the buffer accepted
    pub buffer_received: u64,
    /// Values the buffer forwarded
    pub buffer_processed: u64,
    /// Values the sink consumed
    pub sink_processed: u64,

    /// Grants issued by the sink
    pub grants_issued: u64,
    /// Grants relayed by the buffer
    pub grants_relayed: u64,
    /// Grants received by the source
    pub grants_received: u64,

    /// Values sent but not yet consumed
    pub in_flight: u64,

    /// Wall-clock time spent running, in milliseconds
    #[serde(default)]
    pub wall_time_ms: f64,
    /// Events fired per wall-clock second
    #[serde(default)]
    pub events_per_second: f64,
}

impl RunStats {
    /// Returns true if every produced value has been consumed.
    pub fn is_conserved(&self) -> bool {
        self.in_flight == 0 && self.produced == self.sink_processed
    }

    /// Records the wall-clock duration of the run and derives throughput.
    pub fn compute_timing(&mut self, wall_time_ms: f64) {
        self.wall_time_ms = wall_time_ms;
        if wall_time_ms > 0.0 {
            self.events_per_second = self.events_fired as f64 / (wall_time_ms / 1000.0);
        }
    }

    /// Exports statistics to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Exports statistics to JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Exports statistics to CSV.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str("metric,value\n");

        csv.push_str(&format!("final_tick,{}\n", self.final_tick));
        csv.push_str(&format!("events_fired,{}\n", self.events_fired));
        csv.push_str(&format!("events_pending,{}\n", self.events_pending));
        csv.push_str(&format!("peak_pending,{}\n", self.peak_pending));

        csv.push_str(&format!("produced,{}\n", self.produced));
        csv.push_str(&format!("queued,{}\n", self.queued));
        csv.push_str(&format!("rejected,{}\n", self.rejected));
        csv.push_str(&format!("backlog,{}\n", self.backlog));
        csv.push_str(&format!("buffer_received,{}\n", self.buffer_received));
        csv.push_str(&format!("buffer_processed,{}\n", self.buffer_processed));
        csv.push_str(&format!("sink_processed,{}\n", self.sink_processed));

        csv.push_str(&format!("grants_issued,{}\n", self.grants_issued));
        csv.push_str(&format!("grants_relayed,{}\n", self.grants_relayed));
        csv.push_str(&format!("grants_received,{}\n", self.grants_received));
        csv.push_str(&format!("in_flight,{}\n", self.in_flight));

        csv.push_str(&format!("wall_time_ms,{:.2}\n", self.wall_time_ms));
        csv.push_str(&format!("events_per_second,{:.2}\n", self.events_per_second));

        csv
    }

    /// Exports statistics to CSV file.
    pub fn to_csv_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        std::fs::write(path, self.to_csv())
    }

    /// Writes a human-readable summary to a writer.
    pub fn write_summary<W: Write>(&self, mut w: W) -> std::io::Result<()> {
        writeln!(w, "=== Stage Simulation Statistics ===")?;
        writeln!(w)?;

        writeln!(w, "--- Scheduler ---")?;
        writeln!(w, "Final tick: {}", self.final_tick)?;
        writeln!(w, "Events fired: {}", self.events_fired)?;
        writeln!(w, "Events pending: {} (peak {})", self.events_pending, self.peak_pending)?;
        writeln!(w)?;

        writeln!(w, "--- Source ---")?;
        writeln!(w, "Produced: {}", self.produced)?;
        writeln!(
            w,
            "Queued: {}, Rejected: {}, Backlog: {}",
            self.queued, self.rejected, self.backlog
        )?;
        writeln!(w, "Grants received: {}", self.grants_received)?;
        writeln!(w)?;

        writeln!(w, "--- Buffer ---")?;
        writeln!(w, "Received: {}, Forwarded: {}", self.buffer_received, self.buffer_processed)?;
        writeln!(w, "Grants relayed: {}", self.grants_relayed)?;
        writeln!(w)?;

        writeln!(w, "--- Sink ---")?;
        writeln!(w, "Consumed: {}", self.sink_processed)?;
        writeln!(w, "Grants issued: {}", self.grants_issued)?;
        writeln!(w)?;

        writeln!(
            w,
            "In flight: {} ({})",
            self.in_flight,
            if self.is_conserved() { "conserved" } else { "not drained" }
        )?;
        if self.wall_time_ms > 0.0 {
            writeln!(
                w,
                "Wall time: {:.2} ms ({:.0} events/s)",
                self.wall_time_ms, self.events_per_second
            )?;
        }

        Ok(())
    }

    /// Returns a summary string.
    pub fn summary(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_summary(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// A simple timer for measuring wall-clock time.
#[derive(Debug)]
pub struct Timer {
    start: std::time::Instant,
}

impl Timer {
    /// Starts a new timer.
    pub fn start() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }

    /// Returns elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::start()
    }
}
