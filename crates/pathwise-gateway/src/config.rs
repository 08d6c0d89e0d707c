//! Gateway configuration.
//!
//! Every field has a default, so an empty TOML document is valid:
//!
//! ```toml
//! worker_count = 4            # omitted: half the cores, clamped to [1, 8]
//! queue_capacity = 64
//! event_buffer = 256
//! max_grid_cells = 1000000
//! max_controls = 4096
//! max_steps = 100000
//! default_frame_times = [0.0, 0.25, 0.5, 0.75, 1.0]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for one [`Gateway`](crate::Gateway).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Solver threads; `None` picks from available parallelism.
    pub worker_count: Option<usize>,
    /// Jobs that may wait for a worker before submissions fail.
    pub queue_capacity: usize,
    /// Job snapshots buffered per subscriber before it lags.
    pub event_buffer: usize,
    /// Largest grid (or coupling matrix) a single job may allocate.
    pub max_grid_cells: usize,
    /// Largest control lattice an HJB job may enumerate.
    pub max_controls: usize,
    /// Most time steps a diffusion run or rollout may request.
    pub max_steps: usize,
    /// Interpolation times used when a frames request names none.
    pub default_frame_times: Vec<f64>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            queue_capacity: 64,
            event_buffer: 256,
            max_grid_cells: 1_000_000,
            max_controls: 4096,
            max_steps: 100_000,
            default_frame_times: vec![0.0, 0.25, 0.5, 0.75, 1.0],
        }
    }
}

impl GatewayConfig {
    /// Check ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == Some(0) {
            return Err(ConfigError::Invalid("worker_count must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be at least 1".into()));
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::Invalid("event_buffer must be at least 1".into()));
        }
        if self.max_grid_cells == 0 {
            return Err(ConfigError::Invalid("max_grid_cells must be at least 1".into()));
        }
        if self.max_controls == 0 {
            return Err(ConfigError::Invalid("max_controls must be at least 1".into()));
        }
        if self.max_steps == 0 {
            return Err(ConfigError::Invalid("max_steps must be at least 1".into()));
        }
        if self.default_frame_times.is_empty() {
            return Err(ConfigError::Invalid("default_frame_times must not be empty".into()));
        }
        if let Some(t) = self
            .default_frame_times
            .iter()
            .find(|t| !(0.0..=1.0).contains(*t))
        {
            return Err(ConfigError::Invalid(format!(
                "default_frame_times entry {t} lies outside [0, 1]"
            )));
        }
        Ok(())
    }

    /// Worker threads to start.
    pub fn resolved_worker_count(&self) -> usize {
        self.worker_count.unwrap_or_else(|| {
            let cores = std::thread::available_parallelism().map_or(2, |n| n.get());
            (cores / 2).clamp(1, 8)
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}
