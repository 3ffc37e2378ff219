//! Chain access used by the deploy routine.

use crate::error::ChainError;
use alloy::{
    network::{
        EthereumWallet,
        TransactionBuilder,
    },
    primitives::{
        Address,
        B256,
        Bytes,
    },
    providers::{
        DynProvider,
        Provider,
        ProviderBuilder,
    },
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{
    debug,
    info,
};
use url::Url;

/// Interval between head checks while waiting for confirmations.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(4);

/// A contract-creation transaction that has been included in a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Deployment {
    pub address: Address,
    pub tx_hash: B256,
    pub block_number: u64,
}

/// Deploys contracts and tracks their inclusion.
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Chain id reported by the node.
    async fn chain_id(&self) -> Result<u64, ChainError>;

    /// Sends a contract-creation transaction and waits until it is included.
    async fn deploy(&self, init_code: Bytes) -> Result<Deployment, ChainError>;

    /// Waits until `deployment` has `confirmations` confirmations, its own
    /// block being the first.
    async fn wait_for_confirmations(
        &self,
        deployment: &Deployment,
        confirmations: u64,
    ) -> Result<(), ChainError>;
}

/// Block the head must reach for `deployment` to have `confirmations`.
pub const fn confirmation_target(deployment: &Deployment, confirmations: u64) -> u64 {
    deployment.block_number + confirmations.saturating_sub(1)
}

/// Asks the node at `rpc_url` for its chain id without setting up a signer.
pub async fn node_chain_id(rpc_url: Url) -> Result<u64, ChainError> {
    let provider = ProviderBuilder::new().connect_http(rpc_url);
    Ok(provider.get_chain_id().await?)
}

/// [`Deployer`] over an alloy HTTP provider.
#[derive(Clone)]
pub struct AlloyDeployer {
    provider: DynProvider,
    /// Set when the node signs with its own unlocked accounts.
    from: Option<Address>,
    poll_interval: Duration,
}

impl AlloyDeployer {
    /// Connects to `rpc_url`. Without a signer the node's first unlocked
    /// account sends the transactions.
    pub async fn connect(
        rpc_url: Url,
        signer: Option<PrivateKeySigner>,
    ) -> Result<Self, ChainError> {
        let (provider, from) = match signer {
            Some(signer) => {
                let address = signer.address();
                debug!(%address, "Using configured deployer key");
                let provider = ProviderBuilder::new()
                    .wallet(EthereumWallet::from(signer))
                    .connect_http(rpc_url)
                    .erased();
                (provider, None)
            }
            None => {
                let provider = ProviderBuilder::new().connect_http(rpc_url).erased();
                let accounts = provider.get_accounts().await?;
                let from = *accounts.first().ok_or(ChainError::NoAccounts)?;
                debug!(address = %from, "Using node-managed deployer account");
                (provider, Some(from))
            }
        };

        Ok(Self {
            provider,
            from,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub const fn provider(&self) -> &DynProvider {
        &self.provider
    }
}

#[async_trait]
impl Deployer for AlloyDeployer {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn deploy(&self, init_code: Bytes) -> Result<Deployment, ChainError> {
        let mut tx = TransactionRequest::default().with_deploy_code(init_code);
        if let Some(from) = self.from {
            tx = tx.with_from(from);
        }

        let pending = self.provider.send_transaction(tx).await?;
        let tx_hash = *pending.tx_hash();
        info!(%tx_hash, "Deployment transaction sent");

        let receipt = pending.get_receipt().await?;
        if !receipt.status() {
            return Err(ChainError::Reverted(tx_hash));
        }
        let address = receipt
            .contract_address
            .ok_or(ChainError::MissingContractAddress(tx_hash))?;
        let block_number = receipt
            .block_number
            .ok_or(ChainError::MissingBlockNumber(tx_hash))?;

        Ok(Deployment {
            address,
            tx_hash,
            block_number,
        })
    }

    async fn wait_for_confirmations(
        &self,
        deployment: &Deployment,
        confirmations: u64,
    ) -> Result<(), ChainError> {
        let target = confirmation_target(deployment, confirmations);
        loop {
            let head = self.provider.get_block_number().await?;
            if head >= target {
                debug!(head, target, "Deployment confirmed");
                return Ok(());
            }
            debug!(head, target, "Waiting for confirmations");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
