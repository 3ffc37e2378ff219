//! Source verification on Etherscan-compatible block explorers.
//!
//! A verification either succeeds, finds the contract already verified, or
//! fails with a [`VerifyError`]. "Already verified" answers are recognised by
//! message, in any case, wherever the explorer reports them: in the pre-check,
//! in the submission response, or in a status check.

use crate::{
    DEFAULT_CONTRACT,
    artifact::{
        ContractFactory,
        VerificationSource,
    },
    chain::node_chain_id,
    config::{
        Config,
        ExplorerConfig,
    },
    error::{
        DeployError,
        VerifyError,
    },
};
use alloy::primitives::{
    Address,
    Bytes,
};
use async_trait::async_trait;
use clap::{
    Parser,
    ValueHint,
};
use colored::Colorize;
use reqwest::Client;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::json;
use std::{
    path::PathBuf,
    time::Duration,
};
use tracing::{
    debug,
    info,
};
use url::Url;

const ALREADY_VERIFIED: &str = "already verified";

/// Returns true when an explorer message reports the contract as already verified.
pub fn is_already_verified(message: &str) -> bool {
    message.to_lowercase().contains(ALREADY_VERIFIED)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    Verified,
    AlreadyVerified,
}

#[derive(Debug, Clone)]
pub struct VerifyRequest {
    pub address: Address,
    pub chain_id: u64,
    /// ABI-encoded constructor arguments
    pub constructor_args: Bytes,
    pub source: VerificationSource,
}

#[async_trait]
pub trait VerificationService: Send + Sync {
    async fn verify(&self, request: &VerifyRequest) -> Result<VerificationOutcome, VerifyError>;
}

/// Envelope shared by every Etherscan API answer.
#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: serde_json::Value,
}

impl ExplorerResponse {
    fn is_ok(&self) -> bool {
        self.status == "1"
    }

    fn result_text(&self) -> String {
        match &self.result {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SourceCodeEntry {
    #[serde(default)]
    source_code: String,
}

/// Answer to a source submission.
#[derive(Debug, PartialEq, Eq)]
enum Submission {
    /// Accepted for processing under the given job id
    Queued(String),
    AlreadyVerified,
}

/// Client for the Etherscan contract verification API.
#[derive(Debug, Clone)]
pub struct EtherscanVerifier {
    client: Client,
    api_url: Url,
    api_key: Option<String>,
    api_key_env: String,
    poll_interval: Duration,
    max_status_checks: u32,
}

impl EtherscanVerifier {
    pub fn new(api_url: &str, api_key: Option<String>) -> Result<Self, VerifyError> {
        let api_url = Url::parse(api_url)?;
        let client = Client::builder().use_rustls_tls().build()?;
        let defaults = ExplorerConfig::default();

        Ok(Self {
            client,
            api_url,
            api_key,
            poll_interval: defaults.poll_interval(),
            max_status_checks: defaults.max_status_checks,
            api_key_env: defaults.api_key_env,
        })
    }

    pub fn from_config(config: &ExplorerConfig) -> Result<Self, VerifyError> {
        let verifier = Self::new(&config.api_url, config.api_key())?;
        Ok(Self {
            api_key_env: config.api_key_env.clone(),
            poll_interval: config.poll_interval(),
            max_status_checks: config.max_status_checks,
            ..verifier
        })
    }

    #[must_use]
    pub const fn with_polling(mut self, poll_interval: Duration, max_status_checks: u32) -> Self {
        self.poll_interval = poll_interval;
        self.max_status_checks = max_status_checks;
        self
    }

    async fn read_response(response: reqwest::Response) -> Result<ExplorerResponse, VerifyError> {
        let status = response.status();
        if !status.is_success() {
            return Err(VerifyError::Http(status.as_u16()));
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| VerifyError::InvalidResponse(e.to_string()))
    }

    /// Checks whether the explorer already holds source code for `address`.
    async fn has_source(
        &self,
        api_key: &str,
        chain_id: u64,
        address: Address,
    ) -> Result<bool, VerifyError> {
        let chain_id = chain_id.to_string();
        let address = address.to_string();
        let response = self
            .client
            .get(self.api_url.clone())
            .query(&[
                ("chainid", chain_id.as_str()),
                ("module", "contract"),
                ("action", "getsourcecode"),
                ("address", address.as_str()),
                ("apikey", api_key),
            ])
            .send()
            .await?;
        let response = Self::read_response(response).await?;
        if !response.is_ok() {
            debug!(message = %response.result_text(), "Source lookup returned no result");
            return Ok(false);
        }

        let entries: Vec<SourceCodeEntry> = serde_json::from_value(response.result)
            .map_err(|e| VerifyError::InvalidResponse(e.to_string()))?;
        Ok(entries
            .iter()
            .any(|entry| !entry.source_code.trim().is_empty()))
    }

    async fn submit(
        &self,
        api_key: &str,
        request: &VerifyRequest,
    ) -> Result<Submission, VerifyError> {
        let source_code = serde_json::to_string(&request.source.standard_json_input)
            .map_err(|e| VerifyError::InvalidResponse(e.to_string()))?;
        let compiler_version = format!("v{}", request.source.compiler_version);
        let chain_id = request.chain_id.to_string();
        let address = request.address.to_string();
        let constructor_args = alloy::hex::encode(&request.constructor_args);

        let response = self
            .client
            .post(self.api_url.clone())
            .query(&[
                ("chainid", chain_id.as_str()),
                ("module", "contract"),
                ("action", "verifysourcecode"),
            ])
            .form(&[
                ("apikey", api_key),
                ("contractaddress", address.as_str()),
                ("sourceCode", source_code.as_str()),
                ("codeformat", "solidity-standard-json-input"),
                ("contractname", request.source.fully_qualified_name.as_str()),
                ("compilerversion", compiler_version.as_str()),
                ("constructorArguements", constructor_args.as_str()),
            ])
            .send()
            .await?;
        let response = Self::read_response(response).await?;
        let text = response.result_text();

        if response.is_ok() {
            return Ok(Submission::Queued(text));
        }
        if is_already_verified(&text) || is_already_verified(&response.message) {
            return Ok(Submission::AlreadyVerified);
        }
        Err(VerifyError::Rejected(text))
    }

    async fn check_status(
        &self,
        api_key: &str,
        chain_id: u64,
        guid: &str,
    ) -> Result<Option<VerificationOutcome>, VerifyError> {
        let chain_id = chain_id.to_string();
        let response = self
            .client
            .get(self.api_url.clone())
            .query(&[
                ("chainid", chain_id.as_str()),
                ("module", "contract"),
                ("action", "checkverifystatus"),
                ("guid", guid),
                ("apikey", api_key),
            ])
            .send()
            .await?;
        let response = Self::read_response(response).await?;
        let text = response.result_text();

        if is_already_verified(&text) {
            return Ok(Some(VerificationOutcome::AlreadyVerified));
        }
        if text.starts_with("Pending") {
            return Ok(None);
        }
        if response.is_ok() || text.starts_with("Pass") {
            return Ok(Some(VerificationOutcome::Verified));
        }
        Err(VerifyError::Failed(text))
    }
}

#[async_trait]
impl VerificationService for EtherscanVerifier {
    async fn verify(&self, request: &VerifyRequest) -> Result<VerificationOutcome, VerifyError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| VerifyError::MissingApiKey(self.api_key_env.clone()))?;

        if self
            .has_source(api_key, request.chain_id, request.address)
            .await?
        {
            return Ok(VerificationOutcome::AlreadyVerified);
        }

        let guid = match self.submit(api_key, request).await? {
            Submission::Queued(guid) => guid,
            Submission::AlreadyVerified => return Ok(VerificationOutcome::AlreadyVerified),
        };
        info!(address = %request.address, %guid, "Verification submitted");

        for attempt in 1..=self.max_status_checks {
            if let Some(outcome) = self
                .check_status(api_key, request.chain_id, &guid)
                .await?
            {
                return Ok(outcome);
            }
            debug!(attempt, %guid, "Verification pending");
            if attempt < self.max_status_checks {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        Err(VerifyError::Timeout(self.max_status_checks))
    }
}

/// Verifies an already deployed contract.
#[derive(Debug, Parser)]
#[clap(
    name = "verify",
    about = "Verify a deployed contract's source on the network's block explorer"
)]
pub struct VerifyArgs {
    /// Address of the deployed contract
    #[clap(value_name = "ADDRESS")]
    pub address: Address,

    /// Network the contract lives on
    #[clap(long, short = 'n', env = "NFTOC_NETWORK")]
    pub network: Option<String>,

    /// Contract name to look up in the artifacts
    #[clap(long, short = 'c', default_value = DEFAULT_CONTRACT)]
    pub contract: String,

    /// Artifacts directory (defaults to the config's `artifacts`)
    #[clap(long, value_hint = ValueHint::DirPath)]
    pub artifacts: Option<PathBuf>,
}

impl VerifyArgs {
    pub async fn run(&self, config: &Config, json_output: bool) -> Result<(), DeployError> {
        let network = config.network(self.network.as_deref())?;
        let artifacts = self.artifacts.as_ref().unwrap_or(&config.artifacts);
        let factory = ContractFactory::load(artifacts, &self.contract)?;
        let source = factory.verification_source()?;

        let chain_id = match network.config.chain_id {
            Some(chain_id) => chain_id,
            None => node_chain_id(network.config.rpc_url()?).await?,
        };

        let verifier = EtherscanVerifier::from_config(&config.explorer)?;
        let request = VerifyRequest {
            address: self.address,
            chain_id,
            constructor_args: Bytes::new(),
            source,
        };
        let outcome = match verifier.verify(&request).await {
            Ok(outcome) => outcome,
            Err(err) if is_already_verified(&err.to_string()) => {
                VerificationOutcome::AlreadyVerified
            }
            Err(err) => return Err(err.into()),
        };

        if json_output {
            println!(
                "{}",
                json!({
                    "status": "success",
                    "address": self.address,
                    "chain_id": chain_id,
                    "verification": outcome,
                })
            );
        } else {
            match outcome {
                VerificationOutcome::Verified => {
                    println!("✅ {} verified at {}", self.contract.bold(), self.address);
                }
                VerificationOutcome::AlreadyVerified => {
                    println!("The contract already verified");
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{
        Matcher,
        Server,
    };

    fn request() -> VerifyRequest {
        VerifyRequest {
            address: Address::repeat_byte(0x11),
            chain_id: 97,
            constructor_args: Bytes::new(),
            source: VerificationSource {
                fully_qualified_name: "contracts/NFTOC.sol:NFTOC".to_string(),
                compiler_version: "0.8.20+commit.a1b79de6".to_string(),
                standard_json_input: json!({ "language": "Solidity", "sources": {} }),
            },
        }
    }

    fn verifier(server: &Server) -> EtherscanVerifier {
        EtherscanVerifier::new(&format!("{}/api", server.url()), Some("key".to_string()))
            .unwrap()
            .with_polling(Duration::from_millis(1), 3)
    }

    fn action(name: &str) -> Matcher {
        Matcher::UrlEncoded("action".to_string(), name.to_string())
    }

    async fn mock_unverified(server: &mut Server) -> mockito::Mock {
        server
            .mock("GET", "/api")
            .match_query(action("getsourcecode"))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"1","message":"OK","result":[{"SourceCode":""}]}"#)
            .create_async()
            .await
    }

    #[test]
    fn already_verified_match_ignores_case() {
        assert!(is_already_verified("Already Verified"));
        assert!(is_already_verified("Contract source code already verified"));
        assert!(is_already_verified("ALREADY VERIFIED"));
        assert!(!is_already_verified("Fail - Unable to verify"));
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_request() {
        let verifier = EtherscanVerifier::new("http://127.0.0.1:9/api", None).unwrap();
        let err = verifier.verify(&request()).await.unwrap_err();
        assert!(matches!(err, VerifyError::MissingApiKey(var) if var == "ETHERSCAN_API_KEY"));
    }

    #[tokio::test]
    async fn existing_source_is_already_verified() {
        let mut server = Server::new_async().await;
        let lookup = server
            .mock("GET", "/api")
            .match_query(Matcher::AllOf(vec![
                action("getsourcecode"),
                Matcher::UrlEncoded("chainid".to_string(), "97".to_string()),
            ]))
            .with_status(200)
            .with_body(r#"{"status":"1","message":"OK","result":[{"SourceCode":"pragma solidity"}]}"#)
            .create_async()
            .await;
        let submit = server
            .mock("POST", "/api")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let outcome = verifier(&server).verify(&request()).await.unwrap();
        assert_eq!(outcome, VerificationOutcome::AlreadyVerified);
        lookup.assert_async().await;
        submit.assert_async().await;
    }

    #[tokio::test]
    async fn submission_then_pass_is_verified() {
        let mut server = Server::new_async().await;
        let lookup = mock_unverified(&mut server).await;
        let submit = server
            .mock("POST", "/api")
            .match_query(action("verifysourcecode"))
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("contractname".to_string(), "contracts/NFTOC.sol:NFTOC".to_string()),
                Matcher::UrlEncoded(
                    "compilerversion".to_string(),
                    "v0.8.20+commit.a1b79de6".to_string(),
                ),
            ]))
            .with_status(200)
            .with_body(r#"{"status":"1","message":"OK","result":"guid-123"}"#)
            .create_async()
            .await;
        let status = server
            .mock("GET", "/api")
            .match_query(Matcher::AllOf(vec![
                action("checkverifystatus"),
                Matcher::UrlEncoded("guid".to_string(), "guid-123".to_string()),
            ]))
            .with_status(200)
            .with_body(r#"{"status":"1","message":"OK","result":"Pass - Verified"}"#)
            .create_async()
            .await;

        let outcome = verifier(&server).verify(&request()).await.unwrap();
        assert_eq!(outcome, VerificationOutcome::Verified);
        lookup.assert_async().await;
        submit.assert_async().await;
        status.assert_async().await;
    }

    #[tokio::test]
    async fn already_verified_submission_is_success() {
        let mut server = Server::new_async().await;
        let _lookup = mock_unverified(&mut server).await;
        let _submit = server
            .mock("POST", "/api")
            .match_query(action("verifysourcecode"))
            .with_status(200)
            .with_body(r#"{"status":"0","message":"NOTOK","result":"Contract source code already verified"}"#)
            .create_async()
            .await;

        let outcome = verifier(&server).verify(&request()).await.unwrap();
        assert_eq!(outcome, VerificationOutcome::AlreadyVerified);
    }

    #[tokio::test]
    async fn rejected_submission_is_an_error() {
        let mut server = Server::new_async().await;
        let _lookup = mock_unverified(&mut server).await;
        let _submit = server
            .mock("POST", "/api")
            .match_query(action("verifysourcecode"))
            .with_status(200)
            .with_body(r#"{"status":"0","message":"NOTOK","result":"Invalid API Key"}"#)
            .create_async()
            .await;

        let err = verifier(&server).verify(&request()).await.unwrap_err();
        assert!(matches!(err, VerifyError::Rejected(message) if message == "Invalid API Key"));
    }

    #[tokio::test]
    async fn failed_status_is_an_error() {
        let mut server = Server::new_async().await;
        let _lookup = mock_unverified(&mut server).await;
        let _submit = server
            .mock("POST", "/api")
            .match_query(action("verifysourcecode"))
            .with_status(200)
            .with_body(r#"{"status":"1","message":"OK","result":"guid-1"}"#)
            .create_async()
            .await;
        let _status = server
            .mock("GET", "/api")
            .match_query(action("checkverifystatus"))
            .with_status(200)
            .with_body(r#"{"status":"0","message":"NOTOK","result":"Fail - Unable to verify"}"#)
            .create_async()
            .await;

        let err = verifier(&server).verify(&request()).await.unwrap_err();
        assert!(matches!(err, VerifyError::Failed(message) if message == "Fail - Unable to verify"));
    }

    #[tokio::test]
    async fn pending_status_times_out() {
        let mut server = Server::new_async().await;
        let _lookup = mock_unverified(&mut server).await;
        let _submit = server
            .mock("POST", "/api")
            .match_query(action("verifysourcecode"))
            .with_status(200)
            .with_body(r#"{"status":"1","message":"OK","result":"guid-1"}"#)
            .create_async()
            .await;
        let status = server
            .mock("GET", "/api")
            .match_query(action("checkverifystatus"))
            .with_status(200)
            .with_body(r#"{"status":"0","message":"NOTOK","result":"Pending in queue"}"#)
            .expect(3)
            .create_async()
            .await;

        let err = verifier(&server).verify(&request()).await.unwrap_err();
        assert!(matches!(err, VerifyError::Timeout(3)));
        status.assert_async().await;
    }

    #[tokio::test]
    async fn timeout_returns_without_sleeping_after_last_check() {
        let mut server = Server::new_async().await;
        let _lookup = mock_unverified(&mut server).await;
        let _submit = server
            .mock("POST", "/api")
            .match_query(action("verifysourcecode"))
            .with_status(200)
            .with_body(r#"{"status":"1","message":"OK","result":"guid-1"}"#)
            .create_async()
            .await;
        let _status = server
            .mock("GET", "/api")
            .match_query(action("checkverifystatus"))
            .with_status(200)
            .with_body(r#"{"status":"0","message":"NOTOK","result":"Pending in queue"}"#)
            .expect(1)
            .create_async()
            .await;

        let verifier = verifier(&server).with_polling(Duration::from_secs(300), 1);
        let result = tokio::time::timeout(Duration::from_secs(30), verifier.verify(&request()))
            .await
            .expect("verification should not wait after the last status check");
        assert!(matches!(result, Err(VerifyError::Timeout(1))));
    }

    #[tokio::test]
    async fn http_error_is_reported() {
        let mut server = Server::new_async().await;
        let _lookup = server
            .mock("GET", "/api")
            .match_query(Matcher::Any)
            .with_status(502)
            .create_async()
            .await;

        let err = verifier(&server).verify(&request()).await.unwrap_err();
        assert!(matches!(err, VerifyError::Http(502)));
    }

    #[tokio::test]
    async fn malformed_body_is_reported() {
        let mut server = Server::new_async().await;
        let _lookup = server
            .mock("GET", "/api")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("invalid json")
            .create_async()
            .await;

        let err = verifier(&server).verify(&request()).await.unwrap_err();
        assert!(matches!(err, VerifyError::InvalidResponse(_)));
    }
}
