use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::ConfigError;

/// Size of the OS serial buffer on the sensor board host
const OS_BUFFER_SIZE: usize = 4095;
/// How many OS buffers worth of data we read per run
const READ_MULTIPLIER: usize = 3;

/// The delimiters of the sensor board wire protocol.
///
/// A record looks like `!!Mag:12|1|2|3||`: records are separated by the primary delimiter,
/// fields by the secondary delimiter, and a structurally complete record ends with the terminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub primary_delimiter: String,
    pub secondary_delimiter: String,
    pub terminator: String,
    pub max_record_len: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            primary_delimiter: String::from("!!"),
            secondary_delimiter: String::from("|"),
            terminator: String::from("||"),
            max_record_len: 70,
        }
    }
}

/// A single sensor channel. Records containing `keyword` are routed to the channel named `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    pub keyword: String,
}

impl ChannelConfig {
    pub fn new(name: &str, keyword: &str) -> Self {
        Self {
            name: name.to_string(),
            keyword: keyword.to_string(),
        }
    }

    /// Name of the per-channel text file in the run directory
    pub fn file_name(&self) -> String {
        format!("{}.txt", self.name)
    }
}

/// Structure representing the application configuration. Contains transport, protocol and archive information
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub archive_path: PathBuf,
    pub port: Option<String>,
    pub port_hint: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    pub settle_ms: u64,
    pub start_command: Option<String>,
    pub byte_budget: usize,
    pub capture_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub raw_capture_name: String,
    pub unified_table_name: String,
    pub protocol: ProtocolConfig,
    pub placeholder_column: String,
    pub time_columns: Vec<String>,
    pub channels: Vec<ChannelConfig>,
}

impl Default for Config {
    /// Generate a new Config object matching the stock sensor board firmware
    fn default() -> Self {
        Self {
            archive_path: PathBuf::from("arh"),
            port: None,
            port_hint: String::from("CH340"),
            baud_rate: 9600,
            read_timeout_ms: 15_000,
            settle_ms: 2000,
            start_command: Some(String::from("sbrosdannih\n")),
            byte_budget: OS_BUFFER_SIZE * READ_MULTIPLIER,
            capture_timeout_secs: 120,
            poll_interval_ms: 50,
            raw_capture_name: String::from("stringTest.txt"),
            unified_table_name: String::from("unified_raw_data.csv"),
            protocol: ProtocolConfig::default(),
            placeholder_column: String::from("placeholder"),
            time_columns: vec![
                String::from("day"),
                String::from("hour"),
                String::from("min"),
            ],
            channels: vec![
                ChannelConfig::new("MagTest", "Mag"),
                ChannelConfig::new("txt_Atm_tem_h", "Atm_tem_h"),
                ChannelConfig::new("SGP30_aht20", "SGP30_aht20"),
            ],
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        let config = serde_yaml::from_str::<Self>(&yaml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the structural sanity of the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let protocol = &self.protocol;
        if protocol.primary_delimiter.is_empty()
            || protocol.secondary_delimiter.is_empty()
            || protocol.terminator.is_empty()
        {
            return Err(ConfigError::Invalid(String::from(
                "protocol delimiters and terminator must not be empty",
            )));
        }
        if protocol.max_record_len == 0 {
            return Err(ConfigError::Invalid(String::from(
                "max_record_len must be at least 1",
            )));
        }
        if self.time_columns.is_empty() {
            return Err(ConfigError::Invalid(String::from(
                "at least one time column is required",
            )));
        }
        if self.channels.is_empty() {
            return Err(ConfigError::Invalid(String::from(
                "at least one sensor channel is required",
            )));
        }
        for (idx, channel) in self.channels.iter().enumerate() {
            if channel.name.is_empty() || channel.keyword.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "channel #{idx} has an empty name or keyword"
                )));
            }
            if self.channels[..idx].iter().any(|c| c.name == channel.name) {
                return Err(ConfigError::Invalid(format!(
                    "channel name {} is used more than once",
                    channel.name
                )));
            }
        }
        if self.byte_budget == 0 {
            return Err(ConfigError::Invalid(String::from(
                "byte_budget must be at least 1",
            )));
        }
        Ok(())
    }

    /// Column names every sensor table starts with: the placeholder followed by the time key
    pub fn base_columns(&self) -> Vec<String> {
        let mut columns = Vec::with_capacity(self.time_columns.len() + 1);
        columns.push(self.placeholder_column.clone());
        columns.extend(self.time_columns.iter().cloned());
        columns
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn settle_time(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.byte_budget, 12285);
        assert_eq!(
            config.base_columns(),
            vec!["placeholder", "day", "hour", "min"]
        );
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = Config::default();
        let yaml_str = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml_str).unwrap();
        assert_eq!(parsed.channels, config.channels);
        assert_eq!(parsed.protocol, config.protocol);
        assert_eq!(parsed.start_command.as_deref(), Some("sbrosdannih\n"));
    }

    #[test]
    fn test_duplicate_channel_rejected() {
        let mut config = Config::default();
        config.channels.push(ChannelConfig::new("MagTest", "Other"));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_empty_delimiter_rejected() {
        let mut config = Config::default();
        config.protocol.secondary_delimiter.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = Config::read_config_file(Path::new("./definitely/not/here.yaml"));
        assert!(matches!(result, Err(ConfigError::BadFilePath(_))));
    }
}
