// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading and saving application settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "agribot";

/// Storage key of the persisted log unless configured otherwise.
pub const DEFAULT_LOG_KEY: &str = "agribot_logs";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for the persisted log.
    #[serde(skip)]
    pub data_dir: PathBuf,

    /// Bluetooth settings.
    pub bluetooth: BluetoothConfig,

    /// Log storage settings.
    pub storage: StorageConfig,
}

/// Which link layer drives the robot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// No radio; fixed devices and synthetic telemetry.
    #[default]
    Simulated,
    /// BlueZ RFCOMM (needs the `bluez` feature).
    Rfcomm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    pub transport: TransportKind,

    /// Simulated link setup time.
    pub connect_delay_ms: u64,

    /// Simulated link teardown time.
    pub disconnect_delay_ms: u64,

    /// Period of the telemetry feed.
    pub telemetry_interval_ms: u64,

    /// Upper bound on link setup. 0 disables the limit.
    pub connect_timeout_ms: u64,

    /// Upper bound on a single command write. 0 disables the limit.
    pub command_timeout_ms: u64,

    /// Extra attempts after a transient command failure.
    pub command_retries: u32,

    pub command_retry_delay_ms: u64,

    /// Refuse connections to devices that are not trusted.
    pub trusted_only: bool,

    /// Device address to connect to on startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_connect: Option<String>,

    /// RFCOMM channel of the robot's serial service.
    pub rfcomm_channel: u8,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Simulated,
            connect_delay_ms: 1500,
            disconnect_delay_ms: 800,
            telemetry_interval_ms: 5000,
            connect_timeout_ms: 10_000,
            command_timeout_ms: 2_000,
            command_retries: 2,
            command_retry_delay_ms: 250,
            trusted_only: false,
            auto_connect: None,
            rfcomm_channel: 1,
        }
    }
}

fn optional_limit(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl BluetoothConfig {
    pub fn connect_delay(&self) -> Duration {
        Duration::from_millis(self.connect_delay_ms)
    }

    pub fn disconnect_delay(&self) -> Duration {
        Duration::from_millis(self.disconnect_delay_ms)
    }

    /// Never zero; a zero period would spin.
    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry_interval_ms.max(1))
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        optional_limit(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        optional_limit(self.command_timeout_ms)
    }

    pub fn command_retry_delay(&self) -> Duration {
        Duration::from_millis(self.command_retry_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Key the log is stored under.
    pub log_key: String,

    /// Record every telemetry sample, not only commands.
    pub record_telemetry: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_key: DEFAULT_LOG_KEY.to_string(),
            record_telemetry: true,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            bluetooth: BluetoothConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Location of the user's config file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Load configuration from the default location and prepare the data
    /// directory.
    pub fn load() -> Result<Self> {
        let config = Self::load_from(&Self::default_path())?;
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", config.data_dir))?;
        Ok(config)
    }

    /// Load configuration from `path`, writing defaults there if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {:?}", path))?;
            toml::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))?
        } else {
            let config = Self::default();
            config.save_to(path)?;
            config
        };

        config.data_dir = default_data_dir();
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_writes_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path)?;
        assert!(path.exists());
        assert_eq!(config.bluetooth.connect_delay_ms, 1500);
        assert_eq!(config.storage.log_key, DEFAULT_LOG_KEY);

        let reloaded = Config::load_from(&path)?;
        assert_eq!(reloaded.bluetooth.telemetry_interval_ms, 5000);
        assert_eq!(reloaded.bluetooth.transport, TransportKind::Simulated);
        Ok(())
    }

    #[test]
    fn test_partial_file_uses_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[bluetooth]\ntrusted_only = true\nauto_connect = \"33:44:55:66:77:88\"\n",
        )?;

        let config = Config::load_from(&path)?;
        assert!(config.bluetooth.trusted_only);
        assert_eq!(
            config.bluetooth.auto_connect.as_deref(),
            Some("33:44:55:66:77:88")
        );
        assert_eq!(config.bluetooth.command_retries, 2);
        assert!(config.storage.record_telemetry);
        Ok(())
    }

    #[test]
    fn test_round_trip_through_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.bluetooth.transport = TransportKind::Rfcomm;
        config.bluetooth.rfcomm_channel = 3;
        config.storage.log_key = "field_a".to_string();
        config.save_to(&path)?;

        let loaded = Config::load_from(&path)?;
        assert_eq!(loaded.bluetooth.transport, TransportKind::Rfcomm);
        assert_eq!(loaded.bluetooth.rfcomm_channel, 3);
        assert_eq!(loaded.storage.log_key, "field_a");
        Ok(())
    }

    #[test]
    fn test_duration_helpers() {
        let mut bt = BluetoothConfig::default();
        assert_eq!(bt.connect_timeout(), Some(Duration::from_secs(10)));

        bt.connect_timeout_ms = 0;
        bt.command_timeout_ms = 0;
        bt.telemetry_interval_ms = 0;
        assert_eq!(bt.connect_timeout(), None);
        assert_eq!(bt.command_timeout(), None);
        assert_eq!(bt.telemetry_interval(), Duration::from_millis(1));
    }
}
