use crate::error::{PromoError, PromoResult};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine tuning. Loaded from a JSON file; every field has a default so a
/// partial file is fine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PromoConfig {
    /// IANA zone whose midnight starts a new day for per-day limits.
    pub daily_limit_timezone: String,
    /// How many times an attempt is replayed after a store conflict.
    pub max_conflict_retries: u32,
    /// Applied to every connection opened by `SqliteStore::open_configured`.
    pub busy_timeout_ms: u64,
}

impl Default for PromoConfig {
    fn default() -> Self {
        Self {
            daily_limit_timezone: "UTC".to_string(),
            max_conflict_retries: 3,
            busy_timeout_ms:      5_000,
        }
    }
}

impl PromoConfig {
    /// Load from a JSON file.
    /// In tests, use PromoConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: PromoConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.daily_zone()?;
        Ok(config)
    }

    /// Config with hardcoded defaults for use in tests.
    pub fn default_test() -> Self {
        Self {
            daily_limit_timezone: "UTC".to_string(),
            max_conflict_retries: 3,
            busy_timeout_ms:      1_000,
        }
    }

    pub fn with_timezone(mut self, zone: &str) -> Self {
        self.daily_limit_timezone = zone.to_string();
        self
    }

    pub fn daily_zone(&self) -> PromoResult<Tz> {
        self.daily_limit_timezone.parse::<Tz>().map_err(|_| {
            PromoError::InvalidConfig(format!(
                "unknown daily_limit_timezone '{}'",
                self.daily_limit_timezone
            ))
        })
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
