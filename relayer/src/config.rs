use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use ethereum_common::network::{Network, Spec};
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "beacon-relay.json";

const DEFAULT_MAX_WATCHED_EXTRINSICS: usize = 8;
const DEFAULT_INCLUSION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_SUBMISSION_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY_MILLIS: u64 = 500;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Relayer configuration, loaded once at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub source: SourceConfig,
    pub sink: SinkConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    pub beacon: BeaconConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeaconConfig {
    /// Overrides the preset of the selected network.
    #[serde(default)]
    pub spec: Option<Spec>,
    #[serde(rename = "datastore")]
    pub data_store: DataStoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataStoreConfig {
    pub location: PathBuf,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkConfig {
    pub parachain: ParachainConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParachainConfig {
    pub header_redundancy: u64,
    #[serde(default = "default_max_watched_extrinsics")]
    pub max_watched_extrinsics: usize,
    #[serde(default = "default_inclusion_timeout_secs")]
    pub inclusion_timeout_secs: u64,
    #[serde(default = "default_submission_retries")]
    pub submission_retries: u32,
    #[serde(default = "default_retry_delay_millis")]
    pub retry_delay_millis: u64,
}

fn default_max_watched_extrinsics() -> usize {
    DEFAULT_MAX_WATCHED_EXTRINSICS
}

fn default_inclusion_timeout_secs() -> u64 {
    DEFAULT_INCLUSION_TIMEOUT_SECS
}

fn default_submission_retries() -> u32 {
    DEFAULT_SUBMISSION_RETRIES
}

fn default_retry_delay_millis() -> u64 {
    DEFAULT_RETRY_DELAY_MILLIS
}

impl ParachainConfig {
    pub fn inclusion_timeout(&self) -> Duration {
        Duration::from_secs(self.inclusion_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_millis)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_slice(&contents)
    }

    pub fn from_slice(contents: &[u8]) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_slice(contents)?;
        config.validate()?;

        Ok(config)
    }

    /// Beacon spec in effect: the configured one or the network preset.
    pub fn spec(&self, network: Network) -> Spec {
        self.source.beacon.spec.unwrap_or_else(|| network.spec())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(spec) = &self.source.beacon.spec {
            if spec.slots_per_historical_root < 2
                || !spec.slots_per_historical_root.is_power_of_two()
            {
                return Err(ConfigError::Invalid(format!(
                    "slotsPerHistoricalRoot must be a power of two greater than 1, got {}",
                    spec.slots_per_historical_root
                )));
            }

            if spec.slots_in_epoch == 0 {
                return Err(ConfigError::Invalid("slotsInEpoch must be positive".into()));
            }
        }

        if self.source.beacon.data_store.max_entries == 0 {
            return Err(ConfigError::Invalid(
                "datastore.maxEntries must be positive".into(),
            ));
        }

        if self.sink.parachain.max_watched_extrinsics == 0 {
            return Err(ConfigError::Invalid(
                "maxWatchedExtrinsics must be positive".into(),
            ));
        }

        Ok(())
    }
}
