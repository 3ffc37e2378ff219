//! Error types for configuration, artifacts, chain access, verification and deployment.

use alloy::primitives::B256;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },

    #[error("Unknown network '{name}'. Known networks: {}", known.join(", "))]
    UnknownNetwork { name: String, known: Vec<String> },

    #[error("Environment variable {0} is not set")]
    MissingEnv(String),

    #[error("Private key in {0} is invalid")]
    InvalidPrivateKey(String),

    #[error("Invalid RPC url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No artifact for contract {contract} under {root}")]
    NotFound { contract: String, root: PathBuf },

    #[error("Multiple artifacts for contract {contract}: {}", format_paths(candidates))]
    Ambiguous {
        contract: String,
        candidates: Vec<PathBuf>,
    },

    #[error("Contract {0} has no bytecode and cannot be deployed")]
    NotDeployable(String),

    #[error("Invalid bytecode in {path}: {source}")]
    InvalidBytecode {
        path: PathBuf,
        #[source]
        source: alloy::hex::FromHexError,
    },

    #[error("No build info found for contract {0}. Rebuild with Hardhat to verify it")]
    MissingBuildInfo(String),
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("RPC error: {0}")]
    Transport(#[from] alloy::transports::TransportError),

    #[error("Pending transaction error: {0}")]
    PendingTransaction(#[from] alloy::providers::PendingTransactionError),

    #[error("Contract call failed: {0}")]
    Contract(#[from] alloy::contract::Error),

    #[error("Node manages no accounts and no private key was configured")]
    NoAccounts,

    #[error("Transaction {0} reverted")]
    Reverted(B256),

    #[error("Receipt of {0} carries no contract address")]
    MissingContractAddress(B256),

    #[error("Receipt of {0} carries no block number")]
    MissingBlockNumber(B256),
}

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("No explorer API key set. Export {0} to enable verification")]
    MissingApiKey(String),

    #[error("Invalid explorer API url: {0}")]
    InvalidApiUrl(#[from] url::ParseError),

    #[error("Explorer request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Explorer returned HTTP {0}")]
    Http(u16),

    #[error("Invalid explorer response: {0}")]
    InvalidResponse(String),

    #[error("Verification request rejected: {0}")]
    Rejected(String),

    #[error("Verification failed: {0}")]
    Failed(String),

    #[error("Verification still pending after {0} status checks")]
    Timeout(u32),
}

#[derive(Error, Debug)]
pub enum DeployError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("Network declares chain id {configured} but the node reports {actual}")]
    ChainIdMismatch { configured: u64, actual: u64 },

    #[error("Contract deployed at {address} but verification failed: {message}")]
    VerificationFailed {
        address: alloy::primitives::Address,
        message: String,
    },

    #[error(transparent)]
    Verify(#[from] VerifyError),
}
