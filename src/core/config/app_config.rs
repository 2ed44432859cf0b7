// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Application Configuration
//!
//! Settings are resolved in three layers, lowest priority first:
//!
//! 1. **Defaults** - `AppConfig::default()`
//! 2. **TOML file** - `--config <path>`
//! 3. **Command line** - individual flags, applied through [`ConfigOverrides`]
//!
//! ## Example
//!
//! ```toml
//! [connection]
//! host = "192.168.1.100"
//! driver = "simulated"
//!
//! [reader]
//! antennas = [1, 2]
//! report_every_n_tags = 1
//!
//! [[reader.tx_power]]
//! antenna = 2
//! power_index = 61
//!
//! [pipeline]
//! buffer_capacity = 100
//! poll_interval_ms = 200
//! timestamp_source = "reader"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use super::reader_config::ReaderConfig;
use crate::core::dedup::DEFAULT_BUFFER_CAPACITY;
use crate::core::driver::DEFAULT_READER_PORT;
use crate::core::error::{InventoryError, InventoryResult};
use crate::core::event::TimestampSource;
use crate::core::ingestion::IngestionSettings;

/// Where to find the reader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionSettings {
    /// Prompted for interactively when absent
    pub host: Option<String>,
    pub port: u16,
    /// Name of a registered reader driver
    pub driver: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_READER_PORT,
            driver: "simulated".to_string(),
        }
    }
}

/// Ingestion and dedup settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSettings {
    pub buffer_capacity: usize,
    pub poll_interval_ms: u64,
    pub timestamp_source: TimestampSource,
    pub epc_filter: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            poll_interval_ms: 200,
            timestamp_source: TimestampSource::Reader,
            epc_filter: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub connection: ConnectionSettings,
    pub reader: ReaderConfig,
    pub pipeline: PipelineSettings,
}

/// Command-line layer. `None` leaves the lower layer untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub driver: Option<String>,
    pub antennas: Option<Vec<u16>>,
    pub report_every_n_tags: Option<u32>,
    pub buffer_capacity: Option<usize>,
    pub poll_interval_ms: Option<u64>,
    pub epc_filter: Option<String>,
    pub local_timestamps: bool,
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> InventoryResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> InventoryResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            InventoryError::configuration(format!(
                "cannot read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_toml_str(&content)?;
        log::info!("[Config] Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Defaults, or the given file on top of them
    pub fn load(path: Option<&Path>) -> InventoryResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(host) = &overrides.host {
            self.connection.host = Some(host.clone());
        }
        if let Some(port) = overrides.port {
            self.connection.port = port;
        }
        if let Some(driver) = &overrides.driver {
            self.connection.driver = driver.clone();
        }
        if let Some(antennas) = &overrides.antennas {
            self.reader.antennas = antennas.iter().copied().collect();
        }
        if let Some(n) = overrides.report_every_n_tags {
            self.reader.report_every_n_tags = n;
        }
        if let Some(capacity) = overrides.buffer_capacity {
            self.pipeline.buffer_capacity = capacity;
        }
        if let Some(ms) = overrides.poll_interval_ms {
            self.pipeline.poll_interval_ms = ms;
        }
        if let Some(epc) = &overrides.epc_filter {
            self.pipeline.epc_filter = Some(epc.clone());
        }
        if overrides.local_timestamps {
            self.pipeline.timestamp_source = TimestampSource::Local;
        }
    }

    pub fn validate(&self) -> InventoryResult<()> {
        if self.connection.port == 0 {
            return Err(InventoryError::configuration_with_key(
                "port must be non-zero",
                "connection.port",
            ));
        }
        if self.connection.driver.trim().is_empty() {
            return Err(InventoryError::configuration_with_key(
                "driver name must not be empty",
                "connection.driver",
            ));
        }
        if self.pipeline.buffer_capacity == 0 {
            return Err(InventoryError::configuration_with_key(
                "buffer_capacity must be at least 1",
                "pipeline.buffer_capacity",
            ));
        }
        if self.pipeline.poll_interval_ms == 0 {
            return Err(InventoryError::configuration_with_key(
                "poll_interval_ms must be at least 1",
                "pipeline.poll_interval_ms",
            ));
        }
        if matches!(&self.pipeline.epc_filter, Some(epc) if epc.trim().is_empty()) {
            return Err(InventoryError::configuration_with_key(
                "epc_filter must not be blank",
                "pipeline.epc_filter",
            ));
        }
        self.reader.validate()
    }

    pub fn ingestion_settings(&self) -> IngestionSettings {
        IngestionSettings {
            poll_interval: Duration::from_millis(self.pipeline.poll_interval_ms),
            timestamps: self.pipeline.timestamp_source,
            epc_filter: self
                .pipeline
                .epc_filter
                .as_ref()
                .map(|epc| epc.trim().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.connection.port, 5084);
        assert_eq!(config.connection.driver, "simulated");
        assert_eq!(config.pipeline.buffer_capacity, 100);
        assert_eq!(
            config.ingestion_settings().poll_interval,
            Duration::from_millis(200)
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [connection]
            host = "10.0.0.5"

            [reader]
            antennas = [1, 2, 3, 4]

            [[reader.tx_power]]
            antenna = 3
            power_index = 40

            [reader.tag_content_selector]
            EnableChannelIndex = true

            [pipeline]
            timestamp_source = "local"
            "#,
        )
        .unwrap();

        assert_eq!(config.connection.host.as_deref(), Some("10.0.0.5"));
        assert_eq!(config.connection.port, 5084);
        assert_eq!(config.reader.antennas.len(), 4);
        assert_eq!(config.reader.power_override(3), Some(40));
        assert!(config.reader.tag_content_selector.is_enabled("EnableChannelIndex"));
        assert_eq!(config.pipeline.timestamp_source, TimestampSource::Local);
        assert_eq!(config.pipeline.buffer_capacity, 100);
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = AppConfig::from_toml_str("[pipeline]\nbufer_capacity = 3\n");
        assert!(matches!(result, Err(InventoryError::TomlParse(_))));
    }

    #[test]
    fn test_unknown_reader_key_rejected() {
        let misspelled = AppConfig::from_toml_str("[reader]\nantenas = [3]\n");
        assert!(matches!(misspelled, Err(InventoryError::TomlParse(_))));

        let power = "[reader]\nantennas = [1]\n[[reader.tx_power]]\nantenna = 1\npower_index = 40\ngain = 2\n";
        assert!(matches!(
            AppConfig::from_toml_str(power),
            Err(InventoryError::TomlParse(_))
        ));

        let config = AppConfig::from_toml_str("[reader]\nantennas = [3]\n").unwrap();
        assert_eq!(config.reader.antennas.iter().copied().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_overrides_win_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[connection]\nhost = \"file-host\"\nport = 6000").unwrap();
        writeln!(file, "[pipeline]\nbuffer_capacity = 10").unwrap();

        let mut config = AppConfig::load(Some(file.path())).unwrap();
        config.apply_overrides(&ConfigOverrides {
            host: Some("cli-host".to_string()),
            antennas: Some(vec![3]),
            local_timestamps: true,
            ..ConfigOverrides::default()
        });

        assert_eq!(config.connection.host.as_deref(), Some("cli-host"));
        assert_eq!(config.connection.port, 6000);
        assert_eq!(config.pipeline.buffer_capacity, 10);
        assert_eq!(config.reader.antennas.iter().copied().collect::<Vec<_>>(), vec![3]);
        assert_eq!(config.pipeline.timestamp_source, TimestampSource::Local);
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/rfid.toml")));
        assert!(matches!(result, Err(InventoryError::Configuration { .. })));
    }

    #[test]
    fn test_validation_rejects_zero_capacity_and_poll() {
        let mut config = AppConfig::default();
        config.pipeline.buffer_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.pipeline.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.pipeline.epc_filter = Some("  ".to_string());
        assert!(config.validate().is_err());
    }
}
