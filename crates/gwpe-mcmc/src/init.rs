use gwpe_core::errors::ErrorInfo;
use gwpe_core::{GwError, LikelihoodModel, RngHandle};
use nalgebra::{DMatrix, DVector};
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{InitMethod, RunConfig};
use crate::determinism;
use crate::modes::ModeMap;
use crate::prior::PriorSpace;

/// Seeded position and mode id of one walker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialWalker {
    /// Wrapped position with finite prior density.
    pub position: Vec<f64>,
    /// Mode the walker was seeded around.
    pub mode: usize,
}

/// Proposal covariance `scale · F⁻¹` from a local curvature matrix `F`.
pub fn fisher_covariance(fisher: &DMatrix<f64>, scale: f64) -> Result<DMatrix<f64>, GwError> {
    if !fisher.is_square() {
        return Err(GwError::Init(
            ErrorInfo::new("fisher-not-square", "curvature matrix must be square")
                .with_context("shape", format!("{}x{}", fisher.nrows(), fisher.ncols())),
        ));
    }
    if fisher.iter().any(|value| !value.is_finite()) {
        return Err(GwError::Init(ErrorInfo::new(
            "fisher-non-finite",
            "curvature matrix contains non-finite entries",
        )));
    }
    let inverse = fisher.clone().try_inverse().ok_or_else(|| {
        GwError::Init(
            ErrorInfo::new("fisher-singular", "curvature matrix is not invertible")
                .with_context("dimension", fisher.nrows().to_string())
                .with_hint("check for unconstrained parameters or use init_method: prior"),
        )
    })?;
    if inverse.iter().any(|value| !value.is_finite()) {
        return Err(GwError::Init(ErrorInfo::new(
            "fisher-singular",
            "curvature matrix inverse is not finite",
        )));
    }
    Ok(inverse * scale)
}

/// Zero-mean multivariate normal sampled through a Cholesky factor.
#[derive(Debug, Clone)]
pub struct CorrelatedNormal {
    factor: DMatrix<f64>,
}

impl CorrelatedNormal {
    /// Factors `covariance`, which must be symmetric positive definite.
    pub fn new(covariance: &DMatrix<f64>) -> Result<Self, GwError> {
        let symmetric = (covariance + covariance.transpose()) * 0.5;
        let cholesky = symmetric.cholesky().ok_or_else(|| {
            GwError::Init(
                ErrorInfo::new(
                    "covariance-not-positive-definite",
                    "proposal covariance has no Cholesky factor",
                )
                .with_context("dimension", covariance.nrows().to_string()),
            )
        })?;
        Ok(Self {
            factor: cholesky.l(),
        })
    }

    /// Draws `center + L·ξ` with `ξ` standard normal.
    pub fn sample_around(&self, center: &[f64], rng: &mut RngHandle) -> Vec<f64> {
        let n = self.factor.nrows();
        let xi = DVector::<f64>::from_iterator(n, (0..n).map(|_| StandardNormal.sample(&mut *rng)));
        let offset = &self.factor * xi;
        center.iter().zip(offset.iter()).map(|(c, d)| c + d).collect()
    }
}

/// Number of walkers seeded around each mode: `n_walkers / n_modes`, with the
/// remainder going one each to the first modes.
pub fn walkers_per_mode(n_walkers: usize, n_modes: usize) -> Vec<usize> {
    let n_modes = n_modes.max(1);
    let base = n_walkers / n_modes;
    let extra = n_walkers % n_modes;
    (0..n_modes)
        .map(|mode| base + usize::from(mode < extra))
        .collect()
}

/// Mode assigned to `walker`. Modes are interleaved so both halves of the
/// ensemble hold every mode.
pub fn mode_of(walker: usize, n_modes: usize) -> usize {
    walker % n_modes.max(1)
}

/// Seeds every `(level, walker)` pair, coldest level first.
pub fn initialize<L: LikelihoodModel + ?Sized>(
    config: &RunConfig,
    space: &PriorSpace,
    modes: &ModeMap,
    likelihood: &L,
    master_seed: u64,
) -> Result<Vec<Vec<InitialWalker>>, GwError> {
    let sampler = &config.sampler;
    let n_modes = modes.n_modes();
    let draw: Box<dyn Fn(usize, &mut RngHandle) -> Vec<f64> + '_> = match sampler.init_method {
        InitMethod::Prior => Box::new(|_: usize, rng: &mut RngHandle| space.sample(rng)),
        InitMethod::Fisher => {
            let nominal = config.nominal_point(space)?;
            let fisher = likelihood.local_curvature(&nominal, &config.waveform)?;
            if fisher.nrows() != space.len() {
                return Err(GwError::Init(
                    ErrorInfo::new(
                        "fisher-dimension-mismatch",
                        "curvature matrix size differs from the number of inferred parameters",
                    )
                    .with_context("expected", space.len().to_string())
                    .with_context("actual", fisher.nrows().to_string()),
                ));
            }
            let covariance = fisher_covariance(&fisher, sampler.init_scale_cov)?;
            let normal = CorrelatedNormal::new(&covariance)?;
            let centers = modes.centers(&nominal, space);
            debug!(n_modes, ?centers, "seeding walkers around mode centers");
            Box::new(move |mode: usize, rng: &mut RngHandle| {
                normal.sample_around(&centers[mode], rng)
            })
        }
    };

    let mut levels = Vec::with_capacity(sampler.n_temps);
    for level in 0..sampler.n_temps {
        let mut walkers = Vec::with_capacity(sampler.n_walkers);
        for walker in 0..sampler.n_walkers {
            let mode = mode_of(walker, n_modes);
            let mut rng =
                RngHandle::from_seed(determinism::init_seed(master_seed, level, walker));
            let position = seed_one(space, sampler.init_max_retries, &mut rng, |rng| {
                draw(mode, rng)
            })
            .ok_or_else(|| {
                GwError::Init(
                    ErrorInfo::new(
                        "init-retries-exhausted",
                        "no draw with non-zero prior density within the retry budget",
                    )
                    .with_context("level", level.to_string())
                    .with_context("walker", walker.to_string())
                    .with_context("mode", mode.to_string())
                    .with_context("retries", sampler.init_max_retries.to_string())
                    .with_hint("lower init_scale_cov or widen the prior ranges"),
                )
            })?;
            walkers.push(InitialWalker { position, mode });
        }
        levels.push(walkers);
    }
    Ok(levels)
}

fn seed_one(
    space: &PriorSpace,
    max_retries: usize,
    rng: &mut RngHandle,
    mut draw: impl FnMut(&mut RngHandle) -> Vec<f64>,
) -> Option<Vec<f64>> {
    (0..max_retries).find_map(|_| {
        let position = space.wrap(&draw(rng));
        space.log_density(&position).is_finite().then_some(position)
    })
}
