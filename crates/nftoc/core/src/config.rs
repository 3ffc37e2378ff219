//! Project configuration read from `nftoc.toml`.
//!
//! The file names the networks a contract can be deployed to and the block
//! explorer used for source verification. Secrets never live in the file: a
//! network names the environment variable holding its deployer key, and the
//! explorer names the variable holding its API key.

use crate::{
    BSC_TESTNET_CHAIN_ID,
    DEFAULT_EXPLORER_API_URL,
    error::ConfigError,
};
use alloy::signers::local::PrivateKeySigner;
use clap::Parser;
use colored::Colorize;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::json;
use std::{
    collections::BTreeMap,
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};
use tracing::debug;
use url::Url;

pub const LOCALHOST_NETWORK: &str = "localhost";
pub const BSC_TESTNET_NETWORK: &str = "bscTestnet";

/// A single deployment target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint
    pub url: String,
    /// Expected chain id. When unset the node's chain id is used as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Environment variable holding the deployer's private key. When unset the
    /// node's first unlocked account sends the transactions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_env: Option<String>,
    /// Seconds between head checks while waiting for confirmations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_poll_secs: Option<u64>,
}

impl NetworkConfig {
    pub fn rpc_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.url).map_err(|source| {
            ConfigError::InvalidUrl {
                url: self.url.clone(),
                source,
            }
        })
    }

    pub fn confirmation_poll_interval(&self) -> Option<Duration> {
        self.confirmation_poll_secs.map(Duration::from_secs)
    }

    /// Loads the deployer key, if the network names one.
    pub fn signer(&self) -> Result<Option<PrivateKeySigner>, ConfigError> {
        let Some(var) = &self.private_key_env else {
            return Ok(None);
        };
        let key = std::env::var(var).map_err(|_| ConfigError::MissingEnv(var.clone()))?;
        key.trim()
            .parse::<PrivateKeySigner>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidPrivateKey(var.clone()))
    }
}

/// Etherscan-compatible explorer used for verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    pub api_url: String,
    pub api_key_env: String,
    pub poll_interval_secs: u64,
    pub max_status_checks: u32,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_EXPLORER_API_URL.to_string(),
            api_key_env: "ETHERSCAN_API_KEY".to_string(),
            poll_interval_secs: 5,
            max_status_checks: 20,
        }
    }
}

impl ExplorerConfig {
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub default_network: String,
    pub artifacts: PathBuf,
    pub networks: BTreeMap<String, NetworkConfig>,
    pub explorer: ExplorerConfig,
}

impl Default for Config {
    fn default() -> Self {
        let mut networks = BTreeMap::new();
        networks.insert(
            LOCALHOST_NETWORK.to_string(),
            NetworkConfig {
                url: "http://127.0.0.1:8545".to_string(),
                chain_id: None,
                private_key_env: None,
                confirmation_poll_secs: None,
            },
        );
        networks.insert(
            BSC_TESTNET_NETWORK.to_string(),
            NetworkConfig {
                url: "https://data-seed-prebsc-1-s1.bnbchain.org:8545".to_string(),
                chain_id: Some(BSC_TESTNET_CHAIN_ID),
                private_key_env: Some("PRIVATE_KEY".to_string()),
                confirmation_poll_secs: None,
            },
        );

        Self {
            default_network: LOCALHOST_NETWORK.to_string(),
            artifacts: PathBuf::from("artifacts"),
            networks,
            explorer: ExplorerConfig::default(),
        }
    }
}

/// A network picked by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedNetwork {
    pub name: String,
    #[serde(flatten)]
    pub config: NetworkConfig,
}

impl Config {
    /// Reads the config at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        Self::parse(&contents).map_err(|source| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                source: Box::new(source),
            }
        })
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Resolves `name`, or the default network when no name is given.
    pub fn network(&self, name: Option<&str>) -> Result<ResolvedNetwork, ConfigError> {
        let name = name.unwrap_or(&self.default_network);
        self.networks
            .get(name)
            .map(|config| {
                ResolvedNetwork {
                    name: name.to_string(),
                    config: config.clone(),
                }
            })
            .ok_or_else(|| {
                ConfigError::UnknownNetwork {
                    name: name.to_string(),
                    known: self.networks.keys().cloned().collect(),
                }
            })
    }
}

/// Lists the configured networks.
#[derive(Debug, Parser)]
#[clap(name = "networks", about = "List the networks defined in the project config")]
pub struct NetworksArgs {}

impl NetworksArgs {
    pub fn run(&self, config: &Config, json_output: bool) {
        if json_output {
            let networks = config
                .networks
                .iter()
                .map(|(name, network)| {
                    json!({
                        "name": name,
                        "url": network.url,
                        "chain_id": network.chain_id,
                        "default": *name == config.default_network,
                    })
                })
                .collect::<Vec<_>>();
            println!("{}", json!({ "networks": networks }));
            return;
        }

        println!("{}", "Networks".bold().green());
        for (name, network) in &config.networks {
            let chain_id = network
                .chain_id
                .map_or_else(|| "from node".to_string(), |id| id.to_string());
            let marker = if *name == config.default_network {
                " (default)".dimmed().to_string()
            } else {
                String::new()
            };
            println!(
                "  {}{marker}  {}  chain id {chain_id}",
                name.cyan().bold(),
                network.url
            );
        }
    }
}
