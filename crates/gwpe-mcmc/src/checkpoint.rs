use std::fs;
use std::path::{Path, PathBuf};

use gwpe_core::errors::ErrorInfo;
use gwpe_core::GwError;
use serde::{Deserialize, Serialize};

use crate::chain::ChainStore;
use crate::config::RunConfig;
use crate::ensemble::Walker;
use crate::metrics::MoveStats;
use crate::tempering::TemperatureLadder;

/// Everything needed to continue a run exactly where it stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointPayload {
    /// Next iteration to execute.
    pub iteration: usize,
    /// Configuration snapshot of the run.
    pub config: RunConfig,
    /// Resolved master seed.
    pub master_seed: u64,
    /// Ladder state including swap statistics.
    pub ladder: TemperatureLadder,
    /// Walker states per level, coldest first.
    pub levels: Vec<Vec<Walker>>,
    /// Move acceptance counters.
    pub stats: MoveStats,
    /// Samples recorded so far.
    pub chain: ChainStore,
}

impl CheckpointPayload {
    /// Restores the payload from disk and checks it against its own config.
    pub fn load(path: &Path) -> Result<Self, GwError> {
        let contents =
            fs::read_to_string(path).map_err(|err| GwError::io("checkpoint-read", err, path))?;
        let payload: Self = serde_json::from_str(&contents)
            .map_err(|err| GwError::io("checkpoint-parse", err, path))?;
        payload.check_shape().map_err(|info| {
            GwError::Sampler(info.with_context("path", path.display().to_string()))
        })?;
        Ok(payload)
    }

    /// Writes the payload to disk.
    pub fn store(&self, path: &Path) -> Result<(), GwError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| GwError::io("checkpoint-mkdir", err, parent))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|err| GwError::io("checkpoint-serialize", err, path))?;
        fs::write(path, json).map_err(|err| GwError::io("checkpoint-write", err, path))
    }

    fn check_shape(&self) -> Result<(), ErrorInfo> {
        let sampler = &self.config.sampler;
        let shape_ok = self.levels.len() == sampler.n_temps
            && self.ladder.len() == sampler.n_temps
            && self.levels.iter().all(|level| level.len() == sampler.n_walkers);
        if !shape_ok {
            return Err(ErrorInfo::new(
                "checkpoint-shape",
                "walker layout does not match the stored configuration",
            )
            .with_context("n_temps", sampler.n_temps.to_string())
            .with_context("n_walkers", sampler.n_walkers.to_string()));
        }
        if self.iteration > sampler.n_iter {
            return Err(ErrorInfo::new(
                "checkpoint-iteration",
                "checkpoint lies beyond the configured number of iterations",
            )
            .with_context("iteration", self.iteration.to_string())
            .with_context("n_iter", sampler.n_iter.to_string()));
        }
        Ok(())
    }
}

/// Checkpoint file for the state reached after `iteration` iterations.
pub fn checkpoint_path(root: &Path, iteration: usize) -> PathBuf {
    root.join(format!("ckpt_{iteration:05}.json"))
}

/// Deletes the oldest checkpoints beyond `max_to_keep`.
pub fn enforce_retention(paths: &mut Vec<PathBuf>, max_to_keep: usize) -> Result<(), GwError> {
    while paths.len() > max_to_keep.max(1) {
        let oldest = paths.remove(0);
        fs::remove_file(&oldest).map_err(|err| GwError::io("checkpoint-remove", err, &oldest))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_zero_padded() {
        let path = checkpoint_path(Path::new("run/checkpoints"), 42);
        assert_eq!(path, PathBuf::from("run/checkpoints/ckpt_00042.json"));
    }

    #[test]
    fn retention_removes_oldest_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for iteration in 1..=3 {
            let path = checkpoint_path(dir.path(), iteration);
            fs::write(&path, "{}").unwrap();
            paths.push(path);
        }
        enforce_retention(&mut paths, 2).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(!dir.path().join("ckpt_00001.json").exists());
        assert!(dir.path().join("ckpt_00003.json").exists());
    }
}
