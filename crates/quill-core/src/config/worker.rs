//! Background worker configuration.

use serde::{Deserialize, Serialize};

/// Stale upload sweeper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the sweeper runs alongside the server.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Interval in seconds between sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    3600
}
