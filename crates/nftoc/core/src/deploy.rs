//! Contract deployment with explorer verification on the verification chain.
//!
//! The routine deploys the contract with no constructor arguments and prints
//! its address. Only when the effective chain id matches
//! [`DeployPlan::verify_chain_id`] does it wait for confirmations and submit
//! the source for verification. The verification result is part of the
//! returned [`DeployReport`] and never aborts the routine. A failed
//! verification only fails the command under `--strict-verify`.

use crate::{
    BSC_TESTNET_CHAIN_ID,
    DEFAULT_CONFIRMATIONS,
    DEFAULT_CONTRACT,
    artifact::ContractFactory,
    chain::{
        AlloyDeployer,
        Deployer,
    },
    config::{
        Config,
        ResolvedNetwork,
    },
    error::DeployError,
    verify::{
        EtherscanVerifier,
        VerificationOutcome,
        VerificationService,
        VerifyRequest,
        is_already_verified,
    },
};
use alloy::primitives::{
    Address,
    B256,
    Bytes,
};
use clap::{
    Parser,
    ValueHint,
};
use colored::Colorize;
use indicatif::{
    ProgressBar,
    ProgressStyle,
};
use serde::Serialize;
use serde_json::json;
use std::{
    fmt,
    path::PathBuf,
    time::Duration,
};
use tracing::{
    error,
    info,
};

/// Parameters of one deployment run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployPlan {
    /// Chain on which deployments are confirmed and verified
    pub verify_chain_id: u64,
    /// Confirmations awaited before verification
    pub confirmations: u64,
}

impl Default for DeployPlan {
    fn default() -> Self {
        Self {
            verify_chain_id: BSC_TESTNET_CHAIN_ID,
            confirmations: DEFAULT_CONFIRMATIONS,
        }
    }
}

/// What happened to the verification step of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum VerificationStatus {
    /// The chain is not the verification chain
    Skipped,
    Verified,
    AlreadyVerified,
    Failed(String),
}

impl VerificationStatus {
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped => write!(f, "skipped"),
            Self::Verified => write!(f, "verified"),
            Self::AlreadyVerified => write!(f, "already verified"),
            Self::Failed(message) => write!(f, "failed: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployReport {
    pub contract: String,
    pub network: String,
    pub chain_id: u64,
    pub address: Address,
    pub tx_hash: B256,
    pub block_number: u64,
    pub verification: VerificationStatus,
}

/// Deploys `factory` through `deployer` and, on the verification chain,
/// confirms and verifies it through `verifier`.
///
/// # Errors
/// * `DeployError::ChainIdMismatch` if the network config and the node disagree
/// * `DeployError::Chain` if deployment or confirmation waiting fails
///
/// Verification failures are reported in [`DeployReport::verification`].
pub async fn deploy_and_verify<D, V>(
    deployer: &D,
    verifier: &V,
    factory: &ContractFactory,
    network: &ResolvedNetwork,
    plan: &DeployPlan,
    progress: &ProgressBar,
) -> Result<DeployReport, DeployError>
where
    D: Deployer + ?Sized,
    V: VerificationService + ?Sized,
{
    let node_chain_id = deployer.chain_id().await?;
    let chain_id = match network.config.chain_id {
        Some(configured) if configured != node_chain_id => {
            return Err(DeployError::ChainIdMismatch {
                configured,
                actual: node_chain_id,
            });
        }
        Some(configured) => configured,
        None => node_chain_id,
    };

    progress.set_message(format!(
        "Deploying {} to {}...",
        factory.contract_name(),
        network.name
    ));
    let deployment = deployer.deploy(factory.deploy_code(&[])).await?;
    info!(
        contract = %factory.contract_name(),
        address = %deployment.address,
        tx_hash = %deployment.tx_hash,
        block = deployment.block_number,
        "Contract deployed"
    );
    progress.println(format!("Contract address {}", deployment.address));

    let network_dump = serde_json::to_string_pretty(network).unwrap_or_default();
    info!(network = %network.name, chain_id, "Network config");
    progress.println(network_dump);

    let verification = if chain_id == plan.verify_chain_id {
        progress.set_message(format!(
            "Waiting for {} confirmations...",
            plan.confirmations
        ));
        deployer
            .wait_for_confirmations(&deployment, plan.confirmations)
            .await?;

        progress.set_message("Verifying contract source...");
        verify_deployment(verifier, factory, deployment.address, chain_id).await
    } else {
        VerificationStatus::Skipped
    };

    Ok(DeployReport {
        contract: factory.contract_name().to_string(),
        network: network.name.clone(),
        chain_id,
        address: deployment.address,
        tx_hash: deployment.tx_hash,
        block_number: deployment.block_number,
        verification,
    })
}

async fn verify_deployment<V: VerificationService + ?Sized>(
    verifier: &V,
    factory: &ContractFactory,
    address: Address,
    chain_id: u64,
) -> VerificationStatus {
    let source = match factory.verification_source() {
        Ok(source) => source,
        Err(err) => {
            error!(%address, error = %err, "Cannot build verification request");
            return VerificationStatus::Failed(err.to_string());
        }
    };

    let request = VerifyRequest {
        address,
        chain_id,
        constructor_args: Bytes::new(),
        source,
    };
    match verifier.verify(&request).await {
        Ok(VerificationOutcome::AlreadyVerified) => {
            info!(%address, "The contract already verified");
            VerificationStatus::AlreadyVerified
        }
        Ok(VerificationOutcome::Verified) => {
            info!(%address, "Contract verified");
            VerificationStatus::Verified
        }
        Err(err) if is_already_verified(&err.to_string()) => {
            info!(%address, "The contract already verified");
            VerificationStatus::AlreadyVerified
        }
        Err(err) => {
            error!(%address, error = %err, "Contract verification failed");
            VerificationStatus::Failed(err.to_string())
        }
    }
}

/// Command-line arguments for deploying the contract.
#[derive(Debug, Parser)]
#[clap(
    name = "deploy",
    about = "Deploy the contract, then confirm and verify it on the verification chain"
)]
pub struct DeployArgs {
    /// Network to deploy to (defaults to the config's `default_network`)
    #[clap(long, short = 'n', env = "NFTOC_NETWORK")]
    pub network: Option<String>,

    /// Contract name to look up in the artifacts
    #[clap(long, short = 'c', default_value = DEFAULT_CONTRACT)]
    pub contract: String,

    /// Artifacts directory (defaults to the config's `artifacts`)
    #[clap(long, value_hint = ValueHint::DirPath)]
    pub artifacts: Option<PathBuf>,

    /// Confirmations awaited before verification
    #[clap(long, default_value_t = DEFAULT_CONFIRMATIONS)]
    pub confirmations: u64,

    /// Chain on which the deployment is confirmed and verified
    #[clap(long, default_value_t = BSC_TESTNET_CHAIN_ID)]
    pub verify_chain_id: u64,

    /// Fail the command when verification fails instead of only reporting it
    #[clap(long)]
    pub strict_verify: bool,
}

impl DeployArgs {
    fn create_spinner() -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                .template("{spinner} {msg}")
                .expect("Failed to set spinner style"),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        spinner
    }

    pub const fn plan(&self) -> DeployPlan {
        DeployPlan {
            verify_chain_id: self.verify_chain_id,
            confirmations: self.confirmations,
        }
    }

    /// Deploys against the network from `config`.
    ///
    /// # Errors
    /// * Config, artifact and chain errors from setting up or running the deployment
    /// * `DeployError::VerificationFailed` when verification failed and
    ///   `--strict-verify` is set
    pub async fn run(&self, config: &Config, json_output: bool) -> Result<DeployReport, DeployError> {
        let network = config.network(self.network.as_deref())?;
        let artifacts = self.artifacts.as_ref().unwrap_or(&config.artifacts);
        let factory = ContractFactory::load(artifacts, &self.contract)?;

        let mut deployer =
            AlloyDeployer::connect(network.config.rpc_url()?, network.config.signer()?).await?;
        if let Some(poll_interval) = network.config.confirmation_poll_interval() {
            deployer = deployer.with_poll_interval(poll_interval);
        }
        let verifier = EtherscanVerifier::from_config(&config.explorer)?;

        self.execute(&deployer, &verifier, &factory, &network, json_output)
            .await
    }

    /// Runs the deployment with the given seams and reports the outcome.
    pub async fn execute<D, V>(
        &self,
        deployer: &D,
        verifier: &V,
        factory: &ContractFactory,
        network: &ResolvedNetwork,
        json_output: bool,
    ) -> Result<DeployReport, DeployError>
    where
        D: Deployer + ?Sized,
        V: VerificationService + ?Sized,
    {
        let spinner = if json_output {
            ProgressBar::hidden()
        } else {
            Self::create_spinner()
        };

        let report =
            match deploy_and_verify(deployer, verifier, factory, network, &self.plan(), &spinner)
                .await
            {
                Ok(report) => report,
                Err(err) => {
                    spinner.finish_with_message(format!("❌ Deployment failed: {err}"));
                    return Err(err);
                }
            };

        if json_output {
            spinner.finish_and_clear();
        } else if report.verification.is_failure() {
            spinner.finish_with_message("⚠️  Contract deployed, verification failed");
        } else {
            spinner.finish_with_message("✅ Contract deployed");
        }
        Self::display_report(&report, json_output);

        if let (true, VerificationStatus::Failed(message)) =
            (self.strict_verify, &report.verification)
        {
            return Err(DeployError::VerificationFailed {
                address: report.address,
                message: message.clone(),
            });
        }

        Ok(report)
    }

    fn display_report(report: &DeployReport, json_output: bool) {
        if json_output {
            let output = json!({
                "status": "success",
                "deployment": report,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&output).unwrap_or_else(|_| output.to_string())
            );
            return;
        }

        println!("\n{}", "Deployment".bold().green());
        println!("{}", "==========".green());
        println!("Contract:     {}", report.contract.bold());
        println!("Network:      {} (chain id {})", report.network, report.chain_id);
        println!("Address:      {}", report.address.to_string().cyan().bold());
        println!("Transaction:  {}", report.tx_hash);
        println!("Block:        {}", report.block_number);
        let verification = match &report.verification {
            VerificationStatus::Failed(_) => report.verification.to_string().red().to_string(),
            VerificationStatus::Skipped => report.verification.to_string().dimmed().to_string(),
            _ => report.verification.to_string().green().to_string(),
        };
        println!("Verification: {verification}");
    }
}
