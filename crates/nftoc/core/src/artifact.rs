//! Contract factory backed by compiler artifacts.
//!
//! Hardhat writes `artifacts/contracts/<Name>.sol/<Name>.json` and Foundry
//! writes `out/<Name>.sol/<Name>.json`, so both resolve by walking the
//! artifacts root for a `<Name>.sol/<Name>.json` file.

use crate::error::ArtifactError;
use alloy::primitives::Bytes;
use serde::Deserialize;
use std::path::{
    Path,
    PathBuf,
};
use tracing::debug;

const BUILD_INFO_DIR: &str = "build-info";

/// Bytecode as emitted by Hardhat (a plain string) or Foundry (an object).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ArtifactBytecode {
    Hex(String),
    Object { object: String },
}

impl ArtifactBytecode {
    fn as_hex(&self) -> &str {
        match self {
            Self::Hex(hex) | Self::Object { object: hex } => hex,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Artifact {
    contract_name: Option<String>,
    source_name: Option<String>,
    bytecode: ArtifactBytecode,
}

/// Hardhat's `<Name>.dbg.json`, pointing at the build that produced the artifact.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugFile {
    build_info: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildInfo {
    solc_long_version: String,
    input: serde_json::Value,
}

/// Everything an explorer needs to rebuild the contract.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationSource {
    /// `<source path>:<contract name>`
    pub fully_qualified_name: String,
    /// Full solc version, e.g. `0.8.20+commit.a1b79de6`
    pub compiler_version: String,
    pub standard_json_input: serde_json::Value,
}

/// A deployable contract type.
#[derive(Debug, Clone)]
pub struct ContractFactory {
    contract_name: String,
    source_name: Option<String>,
    bytecode: Bytes,
    artifact_path: PathBuf,
}

impl ContractFactory {
    /// Finds and loads the artifact for `contract_name` under `artifacts_dir`.
    pub fn load(artifacts_dir: &Path, contract_name: &str) -> Result<Self, ArtifactError> {
        let mut candidates = Vec::new();
        find_artifacts(artifacts_dir, contract_name, &mut candidates)?;
        candidates.sort();

        let artifact_path = match candidates.len() {
            0 => {
                return Err(ArtifactError::NotFound {
                    contract: contract_name.to_string(),
                    root: artifacts_dir.to_path_buf(),
                });
            }
            1 => candidates.remove(0),
            _ => {
                return Err(ArtifactError::Ambiguous {
                    contract: contract_name.to_string(),
                    candidates,
                });
            }
        };

        Self::from_file(&artifact_path, contract_name)
    }

    /// Loads a specific artifact file.
    pub fn from_file(path: &Path, contract_name: &str) -> Result<Self, ArtifactError> {
        let artifact: Artifact = read_json(path)?;
        let hex = artifact.bytecode.as_hex();
        let bytecode = alloy::hex::decode(hex).map_err(|source| {
            ArtifactError::InvalidBytecode {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let contract_name = artifact
            .contract_name
            .unwrap_or_else(|| contract_name.to_string());
        if bytecode.is_empty() {
            return Err(ArtifactError::NotDeployable(contract_name));
        }

        debug!(
            contract = %contract_name,
            artifact = %path.display(),
            bytecode_len = bytecode.len(),
            "Loaded contract artifact"
        );

        Ok(Self {
            contract_name,
            source_name: artifact.source_name,
            bytecode: bytecode.into(),
            artifact_path: path.to_path_buf(),
        })
    }

    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    pub const fn bytecode(&self) -> &Bytes {
        &self.bytecode
    }

    /// Init code followed by the ABI-encoded constructor arguments.
    pub fn deploy_code(&self, constructor_args: &[u8]) -> Bytes {
        let mut code = Vec::with_capacity(self.bytecode.len() + constructor_args.len());
        code.extend_from_slice(&self.bytecode);
        code.extend_from_slice(constructor_args);
        code.into()
    }

    /// Resolves the compiler input that produced this artifact.
    pub fn verification_source(&self) -> Result<VerificationSource, ArtifactError> {
        let missing = || ArtifactError::MissingBuildInfo(self.contract_name.clone());

        let source_name = self.source_name.as_ref().ok_or_else(missing)?;
        let dbg_path = self.artifact_path.with_extension("dbg.json");
        if !dbg_path.is_file() {
            return Err(missing());
        }
        let debug_file: DebugFile = read_json(&dbg_path)?;

        let build_info_path = dbg_path
            .parent()
            .map_or_else(|| debug_file.build_info.clone(), |dir| dir.join(&debug_file.build_info));
        if !build_info_path.is_file() {
            return Err(missing());
        }
        let build_info: BuildInfo = read_json(&build_info_path)?;

        Ok(VerificationSource {
            fully_qualified_name: format!("{source_name}:{}", self.contract_name),
            compiler_version: build_info.solc_long_version,
            standard_json_input: build_info.input,
        })
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ArtifactError> {
    let contents = std::fs::read_to_string(path).map_err(|source| {
        ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        }
    })?;
    serde_json::from_str(&contents).map_err(|source| {
        ArtifactError::Json {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn find_artifacts(
    dir: &Path,
    contract_name: &str,
    found: &mut Vec<PathBuf>,
) -> Result<(), ArtifactError> {
    let entries = std::fs::read_dir(dir).map_err(|source| {
        ArtifactError::Io {
            path: dir.to_path_buf(),
            source,
        }
    })?;
    let file_name = format!("{contract_name}.json");
    let source_dir = format!("{contract_name}.sol");

    for entry in entries {
        let entry = entry.map_err(|source| {
            ArtifactError::Io {
                path: dir.to_path_buf(),
                source,
            }
        })?;
        let file_type = entry.file_type().map_err(|source| {
            ArtifactError::Io {
                path: entry.path(),
                source,
            }
        })?;
        let path = entry.path();
        if file_type.is_dir() {
            if path.file_name().is_some_and(|name| name == BUILD_INFO_DIR) {
                continue;
            }
            find_artifacts(&path, contract_name, found)?;
        } else if path.file_name().is_some_and(|name| name == file_name.as_str())
            && dir.file_name().is_some_and(|name| name == source_dir.as_str())
        {
            found.push(path);
        }
    }

    Ok(())
}
