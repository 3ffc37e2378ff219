//! Recording fakes for the deployer and verifier seams.

#![allow(dead_code)]

use alloy::primitives::{
    Address,
    B256,
    Bytes,
};
use async_trait::async_trait;
use nftoc_core::{
    chain::{
        Deployer,
        Deployment,
    },
    config::{
        NetworkConfig,
        ResolvedNetwork,
    },
    error::{
        ChainError,
        VerifyError,
    },
    verify::{
        VerificationOutcome,
        VerificationService,
        VerifyRequest,
    },
};
use serde_json::json;
use std::{
    fs,
    path::Path,
    sync::{
        Arc,
        Mutex,
    },
};

/// One observed call on a fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ChainId,
    Deploy(Bytes),
    WaitForConfirmations { block_number: u64, confirmations: u64 },
    Verify { address: Address, chain_id: u64 },
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub const DEPLOYED_ADDRESS: Address = Address::new([0xab; 20]);

pub struct RecordingDeployer {
    pub chain_id: u64,
    pub calls: CallLog,
}

#[async_trait]
impl Deployer for RecordingDeployer {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        self.calls.lock().unwrap().push(Call::ChainId);
        Ok(self.chain_id)
    }

    async fn deploy(&self, init_code: Bytes) -> Result<Deployment, ChainError> {
        self.calls.lock().unwrap().push(Call::Deploy(init_code));
        Ok(Deployment {
            address: DEPLOYED_ADDRESS,
            tx_hash: B256::repeat_byte(0x01),
            block_number: 42,
        })
    }

    async fn wait_for_confirmations(
        &self,
        deployment: &Deployment,
        confirmations: u64,
    ) -> Result<(), ChainError> {
        self.calls.lock().unwrap().push(Call::WaitForConfirmations {
            block_number: deployment.block_number,
            confirmations,
        });
        Ok(())
    }
}

/// Answers every verification with the same scripted result.
pub struct ScriptedVerifier {
    pub answer: fn() -> Result<VerificationOutcome, VerifyError>,
    pub calls: CallLog,
}

#[async_trait]
impl VerificationService for ScriptedVerifier {
    async fn verify(&self, request: &VerifyRequest) -> Result<VerificationOutcome, VerifyError> {
        self.calls.lock().unwrap().push(Call::Verify {
            address: request.address,
            chain_id: request.chain_id,
        });
        (self.answer)()
    }
}

pub fn network(name: &str, chain_id: Option<u64>) -> ResolvedNetwork {
    ResolvedNetwork {
        name: name.to_string(),
        config: NetworkConfig {
            url: "http://127.0.0.1:8545".to_string(),
            chain_id,
            private_key_env: None,
            confirmation_poll_secs: None,
        },
    }
}

fn write(path: &Path, value: &serde_json::Value) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

/// Writes a Hardhat artifacts tree holding an NFTOC artifact and its build info.
pub fn hardhat_artifacts(root: &Path) {
    write(
        &root.join("contracts/NFTOC.sol/NFTOC.json"),
        &json!({
            "_format": "hh-sol-artifact-1",
            "contractName": "NFTOC",
            "sourceName": "contracts/NFTOC.sol",
            "abi": [],
            "bytecode": "0x60806040",
            "deployedBytecode": "0x6080",
        }),
    );
    write(
        &root.join("contracts/NFTOC.sol/NFTOC.dbg.json"),
        &json!({ "_format": "hh-sol-dbg-1", "buildInfo": "../../build-info/f00d.json" }),
    );
    write(
        &root.join("build-info/f00d.json"),
        &json!({
            "solcVersion": "0.8.20",
            "solcLongVersion": "0.8.20+commit.a1b79de6",
            "input": { "language": "Solidity", "sources": {}, "settings": {} },
        }),
    );
}
