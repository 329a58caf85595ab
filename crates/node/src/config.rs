//! TOML-backed node configuration.

use crate::chain::Network;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration for one node instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    /// Network name: `mainnet`, `testnet`, `local`, or a custom name.
    pub network: String,
    /// Path of the block-store database file.
    pub data_path: PathBuf,
    /// Bound of the message inbox.
    pub inbox_capacity: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            network: "local".to_string(),
            data_path: PathBuf::from("data/blocks.redb"),
            inbox_capacity: 1024,
        }
    }
}

/// Failures loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl NodeConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Loads a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// The configured network.
    pub fn network(&self) -> Network {
        Network::from_name(&self.network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.network(), Network::Local);
        assert_eq!(config.inbox_capacity, 1024);
    }

    #[test]
    fn test_parse_overrides() {
        let config = NodeConfig::from_toml_str(
            r#"
                network = "mainnet"
                data_path = "/var/lib/factom/blocks.redb"
                inbox_capacity = 64
            "#,
        )
        .unwrap();
        assert_eq!(config.network(), Network::Mainnet);
        assert_eq!(config.inbox_capacity, 64);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(NodeConfig::from_toml_str("p2p_port = 8108").is_err());
    }

    #[test]
    fn test_custom_network_name_round_trip() {
        let config = NodeConfig::from_toml_str(r#"network = "devnet-7""#).unwrap();
        assert_eq!(
            config.network(),
            Network::Custom("devnet-7".to_string())
        );
    }
}
