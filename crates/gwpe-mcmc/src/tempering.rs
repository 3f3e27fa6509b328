use gwpe_core::errors::ErrorInfo;
use gwpe_core::GwError;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::AdaptiveLadderConfig;

/// Geometric temperature step giving roughly 25% swap acceptance for a
/// Gaussian target in `d = index + 1` dimensions.
const TEMPERATURE_STEPS: [f64; 100] = [
    25.2741, 7.0, 4.47502, 3.5236, 3.0232, 2.71225, 2.49879, 2.34226, 2.22198, 2.12628,
    2.04807, 1.98276, 1.92728, 1.87946, 1.83774, 1.80096, 1.76826, 1.73895, 1.7125, 1.68849,
    1.66657, 1.64647, 1.62795, 1.61083, 1.59494, 1.58014, 1.56632, 1.55338, 1.54123, 1.5298,
    1.51901, 1.50881, 1.49916, 1.49, 1.4813, 1.47302, 1.46512, 1.45759, 1.45039, 1.4435,
    1.4369, 1.43056, 1.42448, 1.41864, 1.41302, 1.40761, 1.40239, 1.39736, 1.3925, 1.38781,
    1.38327, 1.37888, 1.37463, 1.37051, 1.36652, 1.36265, 1.35889, 1.35524, 1.3517, 1.34825,
    1.3449, 1.34164, 1.33847, 1.33538, 1.33236, 1.32943, 1.32656, 1.32377, 1.32104, 1.31838,
    1.31578, 1.31325, 1.31076, 1.30834, 1.30596, 1.30364, 1.30137, 1.29915, 1.29697, 1.29484,
    1.29275, 1.29071, 1.2887, 1.28673, 1.2848, 1.28291, 1.28106, 1.27923, 1.27745, 1.27569,
    1.27397, 1.27227, 1.27061, 1.26898, 1.26737, 1.26579, 1.26424, 1.26271, 1.26121, 1.25973,
];

/// Tabulated temperature step for a `ndim`-dimensional target.
pub fn temperature_step(ndim: usize) -> f64 {
    match ndim {
        0 => TEMPERATURE_STEPS[0],
        d if d <= TEMPERATURE_STEPS.len() => TEMPERATURE_STEPS[d - 1],
        d => 1.25 + 2.5 / (d as f64).sqrt(),
    }
}

/// Builds `n_temps` strictly decreasing inverse temperatures starting at 1.
///
/// `max_temperature` of `None` uses the tabulated step; a finite cap spaces the
/// ladder geometrically up to it; an infinite cap puts the hottest level at
/// `β = 0` and spaces the rest with the tabulated step.
pub fn build_betas(
    n_temps: usize,
    ndim: usize,
    max_temperature: Option<f64>,
) -> Result<Vec<f64>, GwError> {
    if n_temps == 0 {
        return Err(GwError::config("ladder-empty", "n_temps must be at least 1"));
    }
    if n_temps == 1 {
        return Ok(vec![1.0]);
    }
    let geometric = |step: f64, count: usize| -> Vec<f64> {
        (0..count).map(|i| step.powi(-(i as i32))).collect()
    };
    let betas = match max_temperature {
        None => geometric(temperature_step(ndim), n_temps),
        Some(cap) if cap.is_infinite() && cap > 0.0 => {
            let mut betas = geometric(temperature_step(ndim), n_temps - 1);
            betas.push(0.0);
            betas
        }
        Some(cap) if cap > 1.0 => {
            let step = cap.powf(1.0 / (n_temps - 1) as f64);
            let mut betas = geometric(step, n_temps);
            betas[n_temps - 1] = 1.0 / cap;
            betas
        }
        Some(cap) => {
            return Err(GwError::Config(
                ErrorInfo::new("ladder-cap-invalid", "max_temperature must exceed 1")
                    .with_context("max_temperature", cap.to_string()),
            ))
        }
    };
    Ok(betas)
}

/// Metropolis probability of exchanging states between two levels.
///
/// Equals `min(1, exp((β_i − β_j)(logL_j − logL_i)))`; identical inverse
/// temperatures always swap and undefined ratios never do.
pub fn swap_acceptance(beta_i: f64, beta_j: f64, log_like_i: f64, log_like_j: f64) -> f64 {
    if beta_i == beta_j {
        return 1.0;
    }
    let log_ratio = (beta_i - beta_j) * (log_like_j - log_like_i);
    if log_ratio.is_nan() {
        return 0.0;
    }
    log_ratio.exp().min(1.0)
}

/// Swap bookkeeping for one adjacent pair of levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PairStats {
    /// Swap proposals attempted between the two levels.
    pub attempted: u64,
    /// Swap proposals accepted.
    pub accepted: u64,
}

impl PairStats {
    /// Running acceptance rate; zero before any attempt.
    pub fn rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.accepted as f64 / self.attempted as f64
        }
    }
}

/// Ordered inverse-temperature schedule with swap statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureLadder {
    betas: Vec<f64>,
    pairs: Vec<PairStats>,
    adaptation: AdaptiveLadderConfig,
}

impl TemperatureLadder {
    /// Builds the initial ladder.
    pub fn new(
        n_temps: usize,
        ndim: usize,
        max_temperature: Option<f64>,
        adaptation: AdaptiveLadderConfig,
    ) -> Result<Self, GwError> {
        let betas = build_betas(n_temps, ndim, max_temperature)?;
        Self::from_betas(betas, adaptation)
    }

    /// Wraps an explicit schedule, checking `β₀ = 1` and strict decrease.
    pub fn from_betas(betas: Vec<f64>, adaptation: AdaptiveLadderConfig) -> Result<Self, GwError> {
        if betas.first() != Some(&1.0) || !is_strictly_decreasing(&betas) {
            return Err(GwError::Sampler(
                ErrorInfo::new(
                    "ladder-not-decreasing",
                    "inverse temperatures must start at 1 and strictly decrease",
                )
                .with_context("betas", format!("{betas:?}")),
            ));
        }
        if betas.iter().any(|beta| *beta < 0.0) {
            return Err(GwError::Sampler(
                ErrorInfo::new("ladder-negative", "inverse temperatures must be non-negative")
                    .with_context("betas", format!("{betas:?}")),
            ));
        }
        let pairs = vec![PairStats::default(); betas.len().saturating_sub(1)];
        Ok(Self {
            betas,
            pairs,
            adaptation,
        })
    }

    /// Number of levels.
    pub fn len(&self) -> usize {
        self.betas.len()
    }

    /// Always false for a constructed ladder.
    pub fn is_empty(&self) -> bool {
        self.betas.is_empty()
    }

    /// Inverse temperatures, coldest first.
    pub fn betas(&self) -> &[f64] {
        &self.betas
    }

    /// Inverse temperature of `level`.
    pub fn beta(&self, level: usize) -> f64 {
        self.betas[level]
    }

    /// Temperatures (`1/β`), infinite for a `β = 0` level.
    pub fn temperatures(&self) -> Vec<f64> {
        self.betas.iter().map(|beta| 1.0 / beta).collect()
    }

    /// Records the outcome of the swap proposals between `pair` and `pair + 1`.
    pub fn record_pair(&mut self, pair: usize, attempted: u64, accepted: u64) {
        if let Some(stats) = self.pairs.get_mut(pair) {
            stats.attempted += attempted;
            stats.accepted += accepted;
        }
    }

    /// Swap statistics per adjacent pair.
    pub fn pair_stats(&self) -> &[PairStats] {
        &self.pairs
    }

    /// Running swap acceptance rate per adjacent pair.
    pub fn acceptance_rates(&self) -> Vec<f64> {
        self.pairs.iter().map(PairStats::rate).collect()
    }

    /// Nudges the interior temperatures so adjacent swap rates equalize.
    ///
    /// Returns whether the ladder changed. The coldest and hottest levels are
    /// fixed; an update that would break strict decrease is discarded.
    pub fn adapt(&mut self, iteration: usize) -> bool {
        let n = self.betas.len();
        if !self.adaptation.enabled || n < 3 {
            return false;
        }
        if self.pairs.iter().any(|pair| pair.attempted == 0) {
            return false;
        }
        let rates = self.acceptance_rates();
        let lag = self.adaptation.lag;
        let decay = lag / (iteration as f64 + lag);
        let kappa = decay / self.adaptation.time;

        let temps: Vec<f64> = self.betas[..n - 1].iter().map(|beta| 1.0 / beta).collect();
        let mut proposed = self.betas.clone();
        let mut current = temps[0];
        for i in 0..n - 2 {
            let scale = (kappa * (rates[i] - rates[i + 1])).exp();
            let gap = ((temps[i + 1] - temps[i]) * scale).max(self.adaptation.min_spacing * current);
            current += gap;
            proposed[i + 1] = 1.0 / current;
        }

        if !is_strictly_decreasing(&proposed) || proposed.iter().any(|beta| !beta.is_finite()) {
            warn!(
                iteration,
                betas = ?proposed,
                "discarding ladder update that breaks strict ordering"
            );
            return false;
        }
        let changed = proposed != self.betas;
        self.betas = proposed;
        changed
    }
}

fn is_strictly_decreasing(betas: &[f64]) -> bool {
    betas.windows(2).all(|pair| pair[0] > pair[1])
}
