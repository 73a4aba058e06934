use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    /// Pause between successive classifications inside one cycle.
    #[serde(default = "default_pacing_secs")]
    pub pacing_secs: u64,
    #[serde(default = "default_first_run_delay_secs")]
    pub first_run_delay_secs: u64,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_delivery_timeout_secs")]
    pub delivery_timeout_secs: u64,
    /// Stretch the pause after consecutive rate-limited results.
    #[serde(default = "default_true")]
    pub rate_limit_backoff: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            pacing_secs: default_pacing_secs(),
            first_run_delay_secs: default_first_run_delay_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            delivery_timeout_secs: default_delivery_timeout_secs(),
            rate_limit_backoff: default_true(),
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_secs(self.pacing_secs)
    }

    pub fn first_run_delay(&self) -> Duration {
        Duration::from_secs(self.first_run_delay_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_minutes == 0 {
            bail!("monitor.interval_minutes must be positive");
        }
        if self.probe_timeout_secs == 0 {
            bail!("monitor.probe_timeout_secs must be positive");
        }
        if self.delivery_timeout_secs == 0 {
            bail!("monitor.delivery_timeout_secs must be positive");
        }
        Ok(())
    }
}

fn default_interval_minutes() -> u64 {
    15
}

fn default_pacing_secs() -> u64 {
    8
}

fn default_first_run_delay_secs() -> u64 {
    10
}

fn default_probe_timeout_secs() -> u64 {
    20
}

fn default_delivery_timeout_secs() -> u64 {
    15
}

fn default_true() -> bool {
    true
}
