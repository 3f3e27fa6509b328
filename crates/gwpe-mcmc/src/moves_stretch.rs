use gwpe_core::{GwError, LikelihoodModel, RngHandle};

use crate::ensemble::{tempered_delta, Target, Walker};

/// Draws a stretch factor from `g(z) ∝ 1/√z` on `[1/a, a]`.
pub fn sample_stretch_factor(scale: f64, rng: &mut RngHandle) -> f64 {
    let u = rng.uniform();
    let root = (scale - 1.0) * u + 1.0;
    root * root / scale
}

/// `y = c + z·(x − c)`.
pub fn stretch_position(current: &[f64], anchor: &[f64], z: f64) -> Vec<f64> {
    current
        .iter()
        .zip(anchor)
        .map(|(x, c)| c + z * (x - c))
        .collect()
}

/// Log acceptance ratio of moving `current` to `candidate` with stretch
/// factor `z` at inverse temperature `beta`.
pub fn log_acceptance(ndim: usize, z: f64, beta: f64, current: &Walker, candidate: &Walker) -> f64 {
    if candidate.log_prior == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    (ndim as f64 - 1.0) * z.ln()
        + tempered_delta(beta, candidate.log_likelihood, current.log_likelihood)
        + (candidate.log_prior - current.log_prior)
}

/// Result of one walker's proposal.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    /// Proposed walker state (position and caches).
    pub candidate: Walker,
    /// Log acceptance ratio; compare against `ln u`.
    pub log_alpha: f64,
}

/// Proposes a stretch move of `walker` against a uniformly drawn anchor in
/// `complementary`.
pub fn propose<L: LikelihoodModel + ?Sized>(
    target: &Target<'_, L>,
    beta: f64,
    scale: f64,
    walker: &Walker,
    complementary: &[Walker],
    rng: &mut RngHandle,
) -> Result<Proposal, GwError> {
    let anchor = &complementary[rng.index(complementary.len())];
    let z = sample_stretch_factor(scale, rng);
    let position = stretch_position(&walker.position, &anchor.position, z);
    let candidate = target.walker(position, walker.mode)?;
    let log_alpha = log_acceptance(walker.position.len(), z, beta, walker, &candidate);
    Ok(Proposal {
        candidate,
        log_alpha,
    })
}
