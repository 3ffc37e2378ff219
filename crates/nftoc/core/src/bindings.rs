//! Typed access to a deployed NFTOC contract.

use crate::error::ChainError;
use alloy::{
    primitives::{
        Address,
        B256,
        U256,
    },
    providers::Provider,
    sol,
};

sol! {
    #[sol(rpc)]
    interface NFTOC {
        function setSaleStatus(bool status) external;
        function saleIsActive() external view returns (bool);
        function mint() external payable;
        function tokenURI(uint256 tokenId) external view returns (string memory);
    }
}

/// Handle on a deployed NFTOC instance. Sending calls return once the
/// transaction has a receipt.
pub struct NftocContract<P> {
    inner: NFTOC::NFTOCInstance<P>,
}

impl<P: Provider> NftocContract<P> {
    pub fn new(address: Address, provider: P) -> Self {
        Self {
            inner: NFTOC::new(address, provider),
        }
    }

    pub async fn set_sale_status(&self, active: bool) -> Result<B256, ChainError> {
        let receipt = self
            .inner
            .setSaleStatus(active)
            .send()
            .await?
            .get_receipt()
            .await?;
        if !receipt.status() {
            return Err(ChainError::Reverted(receipt.transaction_hash));
        }
        Ok(receipt.transaction_hash)
    }

    pub async fn sale_is_active(&self) -> Result<bool, ChainError> {
        Ok(self.inner.saleIsActive().call().await?)
    }

    pub async fn mint(&self) -> Result<B256, ChainError> {
        let receipt = self.inner.mint().send().await?.get_receipt().await?;
        if !receipt.status() {
            return Err(ChainError::Reverted(receipt.transaction_hash));
        }
        Ok(receipt.transaction_hash)
    }

    pub async fn token_uri(&self, token_id: u64) -> Result<String, ChainError> {
        Ok(self.inner.tokenURI(U256::from(token_id)).call().await?)
    }
}
