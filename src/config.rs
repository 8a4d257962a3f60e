//! Configuration for stage simulation runs.
//!
//! A run is described declaratively in YAML or JSON.
//!
//! # Configuration File Structure
//!
//! ```yaml
//! simulation:
//!   end_tick: 100
//!   log_level: info
//!   output_dir: results
//!
//! buffer:
//!   forward_delay: 5
//!
//! source:
//!   policy: queue
//!   start_tick: 0
//!   interval: 0
//!   values: [42, 43, 44]
//! ```
//!
//! Every section and field is optional; missing ones take their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::stages::ProducePolicy;
use crate::topology::DEFAULT_FORWARD_DELAY;
use crate::types::Tick;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown file format: {0}")]
    UnknownFormat(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Run-level parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Tick to run until; `None` runs until no events remain
    #[serde(default)]
    pub end_tick: Option<Tick>,

    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory to write run statistics to
    #[serde(default)]
    pub output_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            end_tick: None,
            log_level: default_log_level(),
            output_dir: None,
        }
    }
}

/// Buffer stage parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferParams {
    /// Ticks a value spends in the buffer
    #[serde(default = "default_forward_delay")]
    pub forward_delay: Tick,
}

fn default_forward_delay() -> Tick {
    DEFAULT_FORWARD_DELAY
}

impl Default for BufferParams {
    fn default() -> Self {
        Self {
            forward_delay: default_forward_delay(),
        }
    }
}

/// Source stimulus parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceParams {
    /// What to do with values produced without a grant
    #[serde(default)]
    pub policy: ProducePolicy,

    /// Values to produce, in order
    #[serde(default)]
    pub values: Vec<u32>,

    /// Tick of the first produce
    #[serde(default)]
    pub start_tick: Tick,

    /// Ticks between consecutive produces (0 = all at `start_tick`)
    #[serde(default)]
    pub interval: Tick,
}

impl SourceParams {
    /// Returns the tick at which the `index`-th value is produced.
    pub fn produce_tick(&self, index: usize) -> Option<Tick> {
        let offset = self.interval.checked_mul(index as Tick)?;
        self.start_tick.checked_add(offset)
    }
}

/// Complete run configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Run-level parameters
    #[serde(default)]
    pub simulation: SimulationParams,

    /// Buffer stage parameters
    #[serde(default)]
    pub buffer: BufferParams,

    /// Source stimulus
    #[serde(default)]
    pub source: SourceParams,
}

impl SimConfig {
    /// Creates a configuration with every default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let config: SimConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Loads configuration from a JSON string.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file, auto-detecting format.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Self::from_yaml_file(path),
            "json" => Self::from_json_file(path),
            _ => Err(ConfigError::UnknownFormat(ext.to_string())),
        }
    }

    /// Validates the configuration.
    ///
    /// Suspicious but runnable settings only produce a warning.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.simulation.log_level.trim().is_empty() {
            return Err(ConfigError::Validation("log_level must not be empty".to_string()));
        }

        let count = self.source.values.len();
        if count > 0 && self.source.produce_tick(count - 1).is_none() {
            return Err(ConfigError::Validation(format!(
                "produce schedule overflows: start_tick {} + {} x interval {}",
                self.source.start_tick,
                count - 1,
                self.source.interval
            )));
        }

        if let Some(end) = self.simulation.end_tick {
            if end < self.source.start_tick {
                return Err(ConfigError::Validation(format!(
                    "end_tick {} is before source start_tick {}",
                    end, self.source.start_tick
                )));
            }
        }

        if self.buffer.forward_delay == 0 {
            tracing::warn!("buffer forward_delay is 0; data crosses the buffer within one tick");
        }

        if self.source.policy == ProducePolicy::Reject
            && count > 1
            && self.source.interval <= self.buffer.forward_delay
        {
            tracing::warn!(
                interval = self.source.interval,
                forward_delay = self.buffer.forward_delay,
                "source produces faster than grants can return; values will be rejected"
            );
        }

        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Saves configuration to a JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Converts to YAML string.
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Converts to JSON string.
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Builder for creating SimConfig programmatically.
#[derive(Default)]
pub struct SimConfigBuilder {
    config: SimConfig,
}

impl SimConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tick to run until.
    pub fn end_tick(mut self, tick: Tick) -> Self {
        self.config.simulation.end_tick = Some(tick);
        self
    }

    /// Sets the log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.simulation.log_level = level.into();
        self
    }

    /// Sets the statistics output directory.
    pub fn output_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.simulation.output_dir = Some(dir.into());
        self
    }

    /// Sets the buffer latency.
    pub fn forward_delay(mut self, delay: Tick) -> Self {
        self.config.buffer.forward_delay = delay;
        self
    }

    /// Sets the source policy.
    pub fn policy(mut self, policy: ProducePolicy) -> Self {
        self.config.source.policy = policy;
        self
    }

    /// Sets the values to produce.
    pub fn values(mut self, values: impl IntoIterator<Item = u32>) -> Self {
        self.config.source.values = values.into_iter().collect();
        self
    }

    /// Sets when the source starts and how far apart its produces are.
    pub fn schedule(mut self, start_tick: Tick, interval: Tick) -> Self {
        self.config.source.start_tick = start_tick;
        self.config.source.interval = interval;
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> ConfigResult<SimConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
