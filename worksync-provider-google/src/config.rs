//! Provider configuration.
//!
//! Deployment-level settings stored at `<config_dir>/worksync/config.toml`:
//!
//! ```toml
//! client_id = "..."
//! client_secret = "..."
//! timezone = "Europe/Stockholm"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use worksync_core::{SyncError, SyncResult};

/// Google OAuth client credentials for this deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub credentials: Credentials,
    /// IANA timezone used for all-day detection and event timestamps.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Delay between create retries.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_retry_delay_ms() -> u64 {
    500
}

pub fn base_dir() -> SyncResult<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| SyncError::Config("could not determine config directory".to_string()))?
        .join("worksync"))
}

impl Config {
    pub fn load() -> SyncResult<Self> {
        Self::from_path(&base_dir()?.join("config.toml"))
    }

    pub fn from_path(path: &Path) -> SyncResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|err| SyncError::Config(format!("failed to read {}: {err}", path.display())))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|err| SyncError::Config(format!("failed to parse {}: {err}", path.display())))?;

        // Reject unknown timezones at load time, not mid-pass.
        config.tz()?;

        Ok(config)
    }

    pub fn tz(&self) -> SyncResult<Tz> {
        self.timezone
            .parse()
            .map_err(|_| SyncError::Config(format!("unknown timezone '{}'", self.timezone)))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
