//! Service configuration.
//!
//! Layered loading: compiled defaults, then an optional YAML file,
//! then `VENUSSRV_` prefixed environment variables. Out-of-range
//! values are clamped where a safe bound exists and rejected where
//! it does not.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tracing::warn;

use venus_model::{CatalogVersion, Tier};

use crate::error::{Result, VenusError};

/// Tier polling intervals in seconds. Clamped to 1-3600 on load and
/// on runtime updates.
pub const TIER_INTERVAL_MIN_SECS: u64 = 1;
pub const TIER_INTERVAL_MAX_SECS: u64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Connection and transaction parameters for one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,
    /// Catalog version tag: `venus-e` or `jupiter-c` (legacy `v1`
    /// and `v2` are accepted).
    #[serde(default = "default_catalog_version")]
    pub catalog_version: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Settle time after TCP connect before the first request.
    #[serde(default = "default_stabilize_delay_ms")]
    pub stabilize_delay_ms: u64,
    /// Quiet period between consecutive transactions.
    #[serde(default = "default_message_wait_ms")]
    pub message_wait_ms: u64,
    #[serde(default = "default_read_retries")]
    pub read_retries: u32,
    #[serde(default = "default_read_retry_delay_ms")]
    pub read_retry_delay_ms: u64,
    #[serde(default = "default_write_retry_delay_ms")]
    pub write_retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default)]
    pub tiers: TierIntervals,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// All-failed cycles tolerated before the device is suspended.
    #[serde(default = "default_max_failure_streak")]
    pub max_failure_streak: u32,
    /// Suspension cooldown in seconds.
    #[serde(default = "default_suspend_secs")]
    pub suspend_secs: u64,
}

/// Polling intervals per tier, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierIntervals {
    #[serde(default = "default_fast_secs")]
    pub fast: u64,
    #[serde(default = "default_medium_secs")]
    pub medium: u64,
    #[serde(default = "default_slow_secs")]
    pub slow: u64,
    #[serde(default = "default_very_slow_secs")]
    pub very_slow: u64,
}

impl Default for TierIntervals {
    fn default() -> Self {
        Self {
            fast: default_fast_secs(),
            medium: default_medium_secs(),
            slow: default_slow_secs(),
            very_slow: default_very_slow_secs(),
        }
    }
}

impl TierIntervals {
    pub fn interval(&self, tier: Tier) -> Duration {
        let secs = match tier {
            Tier::Fast => self.fast,
            Tier::Medium => self.medium,
            Tier::Slow => self.slow,
            Tier::VerySlow => self.very_slow,
        };
        Duration::from_secs(secs)
    }

    /// The scheduler tick: the shortest configured interval.
    pub fn min_interval(&self) -> Duration {
        let secs = self
            .fast
            .min(self.medium)
            .min(self.slow)
            .min(self.very_slow);
        Duration::from_secs(secs)
    }

    /// Clamp every interval into the supported range, logging the
    /// adjustments.
    pub fn clamped(mut self) -> Self {
        for (name, secs) in [
            ("fast", &mut self.fast),
            ("medium", &mut self.medium),
            ("slow", &mut self.slow),
            ("very_slow", &mut self.very_slow),
        ] {
            let clamped = (*secs).clamp(TIER_INTERVAL_MIN_SECS, TIER_INTERVAL_MAX_SECS);
            if clamped != *secs {
                warn!(
                    tier = name,
                    configured = *secs,
                    clamped,
                    "tier interval out of range, clamped"
                );
                *secs = clamped;
            }
        }
        self
    }

    /// Apply a partial runtime update; unknown-free by construction
    /// since keys are [`Tier`] values.
    pub fn updated(mut self, changes: &HashMap<Tier, u64>) -> Self {
        for (tier, secs) in changes {
            match tier {
                Tier::Fast => self.fast = *secs,
                Tier::Medium => self.medium = *secs,
                Tier::Slow => self.slow = *secs,
                Tier::VerySlow => self.very_slow = *secs,
            }
        }
        self.clamped()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            polling: PollingConfig::default(),
            health: HealthConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            unit_id: default_unit_id(),
            catalog_version: default_catalog_version(),
            connect_timeout_ms: default_connect_timeout_ms(),
            call_timeout_ms: default_call_timeout_ms(),
            stabilize_delay_ms: default_stabilize_delay_ms(),
            message_wait_ms: default_message_wait_ms(),
            read_retries: default_read_retries(),
            read_retry_delay_ms: default_read_retry_delay_ms(),
            write_retry_delay_ms: default_write_retry_delay_ms(),
        }
    }
}

#[allow(clippy::derivable_impls)]
impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            tiers: TierIntervals::default(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            max_failure_streak: default_max_failure_streak(),
            suspend_secs: default_suspend_secs(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration: defaults, then the YAML file if present,
    /// then `VENUSSRV_` environment variables (nested keys separated
    /// by `__`, e.g. `VENUSSRV_DEVICE__HOST`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(ServiceConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let mut config: ServiceConfig = figment
            .merge(Env::prefixed("VENUSSRV_").split("__"))
            .extract()
            .map_err(|e| VenusError::config(format!("failed to load configuration: {e}")))?;
        config.polling.tiers = config.polling.tiers.clamped();
        config.validate()?;
        Ok(config)
    }

    /// Reject values that have no safe clamp.
    pub fn validate(&self) -> Result<()> {
        if self.device.host.is_empty() {
            return Err(VenusError::config("device.host must not be empty"));
        }
        if self.device.unit_id == 0 {
            return Err(VenusError::config("device.unit_id must be in 1-255"));
        }
        // Fails loudly on unknown tags
        self.catalog_version()?;
        Ok(())
    }

    pub fn catalog_version(&self) -> Result<CatalogVersion> {
        CatalogVersion::resolve(&self.device.catalog_version).map_err(VenusError::from)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    502
}

fn default_unit_id() -> u8 {
    1
}

fn default_catalog_version() -> String {
    "jupiter-c".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_call_timeout_ms() -> u64 {
    10_000
}

fn default_stabilize_delay_ms() -> u64 {
    200
}

fn default_message_wait_ms() -> u64 {
    80
}

fn default_read_retries() -> u32 {
    3
}

fn default_read_retry_delay_ms() -> u64 {
    100
}

fn default_write_retry_delay_ms() -> u64 {
    1000
}

fn default_max_failure_streak() -> u32 {
    5
}

fn default_suspend_secs() -> u64 {
    300
}

fn default_fast_secs() -> u64 {
    10
}

fn default_medium_secs() -> u64 {
    30
}

fn default_slow_secs() -> u64 {
    60
}

fn default_very_slow_secs() -> u64 {
    180
}
