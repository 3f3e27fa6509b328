use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use gwpe_core::{GwError, RunProvenance, SchemaVersion};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::RunConfig;

/// Structured manifest describing a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    /// Configuration used for the run.
    pub config: RunConfig,
    /// Provenance block; its seed replays an entropy-seeded run.
    pub provenance: RunProvenance,
    /// Final inverse temperatures.
    pub betas: Vec<f64>,
    /// Thinning stride applied to the thinned table.
    pub thinning_stride: usize,
    /// Raw sample table, relative to the run directory.
    pub raw_samples: Option<PathBuf>,
    /// Thinned sample table, relative to the run directory.
    pub thinned_samples: Option<PathBuf>,
    /// Checkpoints written during the run, oldest first.
    pub checkpoints: Vec<PathBuf>,
}

impl RunManifest {
    /// Writes the manifest to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), GwError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| GwError::io("manifest-mkdir", err, parent))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|err| GwError::io("manifest-serialize", err, path))?;
        fs::write(path, json).map_err(|err| GwError::io("manifest-write", err, path))
    }

    /// Loads a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, GwError> {
        let contents =
            fs::read_to_string(path).map_err(|err| GwError::io("manifest-read", err, path))?;
        serde_json::from_str(&contents).map_err(|err| GwError::io("manifest-parse", err, path))
    }
}

/// Hex SHA-256 of the canonical JSON form of `config`.
pub fn config_hash(config: &RunConfig) -> Result<String, GwError> {
    let bytes = serde_json::to_vec(config).map_err(|err| {
        GwError::Serde(gwpe_core::ErrorInfo::new("config-hash", err.to_string()))
    })?;
    let digest = Sha256::digest(&bytes);
    Ok(digest.iter().map(|byte| format!("{byte:02x}")).collect())
}

/// Provenance for a run started now with `seed`.
pub fn provenance(config: &RunConfig, seed: u64) -> Result<RunProvenance, GwError> {
    let mut tool_versions = BTreeMap::new();
    tool_versions.insert(
        env!("CARGO_PKG_NAME").to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    Ok(RunProvenance {
        schema_version: SchemaVersion::default(),
        config_hash: config_hash(config)?,
        seed,
        created_at: chrono::Utc::now().to_rfc3339(),
        tool_versions,
    })
}
