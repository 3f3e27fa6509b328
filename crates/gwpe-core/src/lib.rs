#![deny(missing_docs)]
#![doc = "Core types for the GW parameter-estimation sampler: errors, deterministic RNG and the likelihood collaborator contract."]

use std::collections::BTreeMap;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

pub mod errors;
pub mod provenance;
pub mod rng;

pub use errors::{ErrorInfo, GwError};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, resolve_master_seed, RngHandle};

/// Waveform and instrument-response parameters.
///
/// The sampler never interprets these values; they are read from the
/// `waveform` group of the configuration document and forwarded verbatim to
/// the [`LikelihoodModel`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaveformParams(pub BTreeMap<String, serde_yaml::Value>);

impl WaveformParams {
    /// Returns the raw value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&serde_yaml::Value> {
        self.0.get(key)
    }

    /// Returns the value under `key` interpreted as a float.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(serde_yaml::Value::as_f64)
    }
}

/// External collaborator evaluating the data model.
///
/// Implementations wrap waveform generation, detector response and noise
/// weighting. The sampler treats them as opaque: `log_likelihood` must be
/// total and free of side effects, and is called concurrently from the rayon
/// pool. A non-finite return value rejects the proposal; an `Err` aborts the
/// whole run.
pub trait LikelihoodModel: Send + Sync {
    /// Log-likelihood of `point` (ordered as the inferred dimensions).
    fn log_likelihood(&self, point: &[f64], waveform: &WaveformParams) -> Result<f64, GwError>;

    /// Local curvature (Fisher information) matrix at `point`.
    ///
    /// Only needed for Fisher-based initialization.
    fn local_curvature(
        &self,
        point: &[f64],
        waveform: &WaveformParams,
    ) -> Result<DMatrix<f64>, GwError> {
        let _ = (point, waveform);
        Err(GwError::Likelihood(
            ErrorInfo::new(
                "curvature-unsupported",
                "likelihood model does not provide a local curvature matrix",
            )
            .with_hint("use init_method: prior or implement local_curvature"),
        ))
    }
}

impl<T: LikelihoodModel + ?Sized> LikelihoodModel for &T {
    fn log_likelihood(&self, point: &[f64], waveform: &WaveformParams) -> Result<f64, GwError> {
        (**self).log_likelihood(point, waveform)
    }

    fn local_curvature(
        &self,
        point: &[f64],
        waveform: &WaveformParams,
    ) -> Result<DMatrix<f64>, GwError> {
        (**self).local_curvature(point, waveform)
    }
}
