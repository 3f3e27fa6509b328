#![deny(missing_docs)]
#![doc = include_str!("../docs/sampler-api.md")]

//! Parallel-tempered affine-invariant ensemble sampler for binary-source
//! parameter estimation.

/// Sample records, the append-only chain store and CSV tables.
pub mod chain;
/// Checkpoint payload and file helpers.
pub mod checkpoint;
/// Serde adapters for non-finite floats.
pub mod codec;
/// YAML configuration schema and defaults.
pub mod config;
/// Autocorrelation-time estimation and thinning-stride selection.
pub mod convergence;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Walkers, the two-half split and posterior evaluation.
pub mod ensemble;
/// Curvature-based and prior-based walker seeding.
pub mod init;
/// Core sampling kernel and public `run`/`resume` entry points.
pub mod kernel;
/// Run manifest serialization helpers.
pub mod manifest;
/// Move acceptance statistics.
pub mod metrics;
/// Multimodal reflection patterns.
pub mod modes;
/// Mode-jump proposals.
pub mod moves_jump;
/// Affine-invariant stretch proposals.
pub mod moves_stretch;
/// Per-dimension priors and the periodic wrap transform.
pub mod prior;
/// Temperature ladder construction, swap acceptance and adaptation.
pub mod tempering;

pub use chain::{ChainStore, SampleRecord};
pub use config::{
    AdaptiveLadderConfig, CheckpointConfig, InitMethod, OutputConfig, PriorConfig, RunConfig,
    SamplerConfig, ThinningConfig,
};
pub use convergence::{AutocorrMethod, ConvergenceEstimate};
pub use ensemble::Walker;
pub use kernel::{resume, run, RunSummary};
pub use modes::{ModeDimensions, ModeMap, ModePattern};
pub use prior::{DimensionSpec, PriorKind, PriorSpace};
pub use tempering::TemperatureLadder;
