use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::address::Address;

#[derive(Debug, thiserror::Error)]
pub enum DeploymentError {
    #[error("failed to read deployments file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to write deployments file {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid deployments file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One recorded board deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentEntry {
    pub address: Address,
    pub chain_id: u64,
    pub chain_name: String,
}

/// Board addresses keyed by chain id, as written by `deploy`.
///
/// On disk this is a JSON object whose keys are decimal chain ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Deployments {
    pub entries: BTreeMap<String, DeploymentEntry>,
}

/// Where the board lives on a given chain, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardInfo {
    pub address: Option<Address>,
    pub chain_id: Option<u64>,
    pub chain_name: Option<String>,
}

impl BoardInfo {
    /// A board at a known address, bypassing the registry.
    pub fn at(address: Address, chain_id: u64) -> Self {
        Self {
            address: Some(address),
            chain_id: Some(chain_id),
            chain_name: None,
        }
    }

    pub fn is_deployed(&self) -> bool {
        self.address.is_some_and(|a| !a.is_zero())
    }
}

impl Deployments {
    pub fn load(path: &Path) -> Result<Self, DeploymentError> {
        let text = std::fs::read_to_string(path).map_err(|source| DeploymentError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Load `path`, treating a missing file as an empty registry.
    pub fn load_or_default(path: &Path) -> Result<Self, DeploymentError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), DeploymentError> {
        let write_err = |source| DeploymentError::Write {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(write_err)
    }

    pub fn record(&mut self, entry: DeploymentEntry) {
        self.entries.insert(entry.chain_id.to_string(), entry);
    }

    /// Resolve the board for `chain_id`. A zero address counts as not deployed,
    /// and an unknown chain id yields no address at all.
    pub fn board_for_chain(&self, chain_id: Option<u64>) -> BoardInfo {
        let Some(chain_id) = chain_id else {
            return BoardInfo {
                address: None,
                chain_id: None,
                chain_name: None,
            };
        };
        match self.entries.get(&chain_id.to_string()) {
            Some(entry) if !entry.address.is_zero() => BoardInfo {
                address: Some(entry.address),
                chain_id: Some(entry.chain_id),
                chain_name: Some(entry.chain_name.clone()),
            },
            _ => BoardInfo {
                address: None,
                chain_id: Some(chain_id),
                chain_name: None,
            },
        }
    }
}
