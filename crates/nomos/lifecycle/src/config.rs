//! Configuration for Nomos services

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use nomos_types::{duration_from_secs, TypesError, DEFAULT_COMMITMENT_DURATION_SECS};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NomosConfig {
    /// Commitment defaults
    #[serde(default)]
    pub commitment: CommitmentConfig,

    /// Deadline monitor configuration
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Anonymous event reporting
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Commitment defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitmentConfig {
    /// Duration applied when the caller gives none, in seconds
    #[serde(default = "default_duration")]
    pub default_duration_secs: i64,
}

impl Default for CommitmentConfig {
    fn default() -> Self {
        Self {
            default_duration_secs: default_duration(),
        }
    }
}

/// Deadline monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Expiry poll interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Capacity of the verdict-required broadcast channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl MonitorConfig {
    /// Poll interval, at least one second.
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (for development/testing)
    Memory,

    /// Keys, stakes and metadata under one directory
    Filesystem {
        /// Data directory
        #[serde(default = "default_data_root")]
        root: PathBuf,
    },

    /// Keys in the OS keyring; stakes and metadata on disk
    Keyring {
        /// Data directory for stakes and metadata
        #[serde(default = "default_data_root")]
        root: PathBuf,

        /// Keyring service name
        #[serde(default = "default_keyring_service")]
        service: String,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Filesystem {
            root: default_data_root(),
        }
    }
}

/// Anonymous event reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log lifecycle events
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Timezone reported alongside events
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timezone: default_timezone(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_duration() -> i64 {
    DEFAULT_COMMITMENT_DURATION_SECS
}

fn default_poll_interval() -> u64 {
    60
}

fn default_channel_capacity() -> usize {
    64
}

fn default_data_root() -> PathBuf {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".nomos"))
        .unwrap_or_else(|| PathBuf::from(".nomos"))
}

fn default_keyring_service() -> String {
    "nomos.stake-keys".to_string()
}

fn default_timezone() -> String {
    std::env::var("TZ")
        .ok()
        .filter(|tz| !tz.is_empty())
        .unwrap_or_else(|| "UTC".to_string())
}

fn default_log_level() -> String {
    "info".to_string()
}

impl NomosConfig {
    /// Load configuration: defaults, then the optional file, then `NOMOS_*`
    /// environment variables (`NOMOS_MONITOR__POLL_INTERVAL_SECS=30`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&NomosConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("NOMOS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// In-memory configuration for tests and demos
    pub fn ephemeral() -> Self {
        Self {
            storage: StorageConfig::Memory,
            ..Default::default()
        }
    }

    /// The configured default duration, rejected if it is not positive or
    /// does not fit the calendar.
    pub fn default_duration(&self) -> Result<chrono::Duration, TypesError> {
        duration_from_secs(self.commitment.default_duration_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NomosConfig::default();
        assert_eq!(config.commitment.default_duration_secs, 24 * 60 * 60);
        assert_eq!(config.monitor.poll_interval_secs, 60);
        assert!(matches!(config.storage, StorageConfig::Filesystem { .. }));
        assert!(config.telemetry.enabled);
    }

    #[test]
    fn test_default_duration_is_range_checked() {
        let mut config = NomosConfig::default();
        assert_eq!(config.default_duration(), Ok(chrono::Duration::hours(24)));

        config.commitment.default_duration_secs = i64::MAX;
        assert_eq!(config.default_duration(), Err(TypesError::DurationOutOfRange));

        config.commitment.default_duration_secs = 0;
        assert_eq!(config.default_duration(), Err(TypesError::NonPositiveDuration));
    }

    #[test]
    fn test_poll_interval_has_a_floor() {
        let monitor = MonitorConfig {
            poll_interval_secs: 0,
            channel_capacity: 1,
        };
        assert_eq!(monitor.poll_interval(), std::time::Duration::from_secs(1));
    }

    #[test]
    fn test_ephemeral_uses_memory() {
        assert!(matches!(
            NomosConfig::ephemeral().storage,
            StorageConfig::Memory
        ));
    }

    #[test]
    fn test_storage_config_is_tagged() {
        let parsed: StorageConfig =
            parse_json(r#"{"type":"filesystem","root":"/var/lib/nomos"}"#);
        match parsed {
            StorageConfig::Filesystem { root } => assert_eq!(root, PathBuf::from("/var/lib/nomos")),
            other => panic!("unexpected storage config: {other:?}"),
        }
    }

    #[test]
    fn test_load_reads_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nomos.toml");
        std::fs::write(
            &path,
            "[monitor]\npoll_interval_secs = 5\n\n[storage]\ntype = \"memory\"\n",
        )
        .unwrap();

        let config = NomosConfig::load(path.to_str()).unwrap();
        assert_eq!(config.monitor.poll_interval_secs, 5);
        assert!(matches!(config.storage, StorageConfig::Memory));
        assert_eq!(config.commitment.default_duration_secs, 24 * 60 * 60);
    }

    fn parse_json(raw: &str) -> StorageConfig {
        config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Json))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }
}
