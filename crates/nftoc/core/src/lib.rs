#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod artifact;
pub mod bindings;
pub mod chain;
pub mod config;
pub mod deploy;
pub mod error;
pub mod verify;

/// Contract deployed when `--contract` is not given.
pub const DEFAULT_CONTRACT: &str = "NFTOC";

/// BNB Smart Chain testnet. Deployments here are confirmed and verified.
pub const BSC_TESTNET_CHAIN_ID: u64 = 97;

/// Confirmations awaited before submitting for verification.
pub const DEFAULT_CONFIRMATIONS: u64 = 6;

/// Etherscan v2 multichain endpoint. The chain is selected per request.
pub const DEFAULT_EXPLORER_API_URL: &str = "https://api.etherscan.io/v2/api";
