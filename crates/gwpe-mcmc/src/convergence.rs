use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use crate::chain::ChainStore;

/// Estimator for the integrated autocorrelation time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AutocorrMethod {
    /// Sokal's adaptive window: smallest `M` with `M ≥ c·τ(M)`.
    Windowed {
        /// Window multiplier.
        #[serde(default = "default_window_factor")]
        c: f64,
    },
    /// Sum of the initial positive autocorrelations.
    PositiveSum,
}

fn default_window_factor() -> f64 {
    5.0
}

impl Default for AutocorrMethod {
    fn default() -> Self {
        AutocorrMethod::Windowed {
            c: default_window_factor(),
        }
    }
}

/// Autocorrelation times of the cold chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceEstimate {
    /// τ per parameter, in dimension order.
    pub tau: IndexMap<String, f64>,
    /// Largest τ over all parameters.
    pub max_tau: f64,
    /// Samples per walker the estimate was computed from.
    pub samples_per_walker: usize,
    /// False when some windowed estimate ran out of lags before `M ≥ c·τ`.
    pub converged: bool,
}

/// Ensemble-averaged normalized autocorrelation of per-walker series.
///
/// A walker with zero variance contributes `ρ(k) = 1` at every lag.
struct EnsembleAcf<'a> {
    series: &'a [Vec<f64>],
    means: Vec<f64>,
    variances: Vec<f64>,
    len: usize,
}

impl<'a> EnsembleAcf<'a> {
    fn new(series: &'a [Vec<f64>]) -> Self {
        let len = series.iter().map(Vec::len).min().unwrap_or(0);
        let means: Vec<f64> = series
            .iter()
            .map(|s| s[..len].iter().sum::<f64>() / len.max(1) as f64)
            .collect();
        let variances = series
            .iter()
            .zip(&means)
            .map(|(s, mean)| s[..len].iter().map(|x| (x - mean).powi(2)).sum::<f64>() / len.max(1) as f64)
            .collect();
        Self {
            series,
            means,
            variances,
            len,
        }
    }

    fn rho(&self, lag: usize) -> f64 {
        if self.series.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .series
            .iter()
            .zip(self.means.iter().zip(&self.variances))
            .map(|(s, (mean, variance))| {
                if *variance <= 0.0 {
                    return 1.0;
                }
                let cov = (0..self.len - lag)
                    .map(|t| (s[t] - mean) * (s[t + lag] - mean))
                    .sum::<f64>()
                    / self.len as f64;
                cov / variance
            })
            .sum();
        total / self.series.len() as f64
    }
}

/// Normalized autocorrelation `ρ(0..=max_lag)` of a single series.
pub fn autocorrelation(series: &[f64], max_lag: usize) -> Vec<f64> {
    let walkers = [series.to_vec()];
    let acf = EnsembleAcf::new(&walkers);
    let max_lag = max_lag.min(acf.len.saturating_sub(1));
    (0..=max_lag).map(|lag| acf.rho(lag)).collect()
}

/// Integrated autocorrelation time of an ensemble of equal-length series.
///
/// Returns `None` for fewer than two samples per walker.
pub fn integrated_time(series: &[Vec<f64>], method: AutocorrMethod) -> Option<f64> {
    integrate(series, method).map(|(tau, _)| tau)
}

/// τ together with whether the windowed estimator found a self-consistent window.
fn integrate(series: &[Vec<f64>], method: AutocorrMethod) -> Option<(f64, bool)> {
    let acf = EnsembleAcf::new(series);
    if acf.len < 2 || series.is_empty() {
        return None;
    }
    let max_lag = (acf.len / 2).max(1);
    match method {
        AutocorrMethod::Windowed { c } => {
            let mut tau = 1.0;
            for window in 1..=max_lag {
                tau += 2.0 * acf.rho(window);
                if window as f64 >= c * tau {
                    return Some((tau, true));
                }
            }
            Some((tau, false))
        }
        AutocorrMethod::PositiveSum => {
            let mut tau = 1.0;
            for lag in 1..=max_lag {
                let rho = acf.rho(lag);
                if rho <= 0.0 {
                    break;
                }
                tau += 2.0 * rho;
            }
            Some((tau, true))
        }
    }
}

/// τ per dimension of the cold level's recorded history.
pub fn estimate(store: &ChainStore, method: AutocorrMethod) -> Option<ConvergenceEstimate> {
    let samples_per_walker = store.samples_per_walker(0);
    if samples_per_walker < 2 {
        return None;
    }
    let mut tau = IndexMap::new();
    let mut converged = true;
    for (dim, name) in store.names().iter().enumerate() {
        let series = store.walker_series(0, dim);
        let (value, window_found) = integrate(&series, method)?;
        converged &= window_found;
        tau.insert(name.clone(), value);
    }
    let max_tau = tau.values().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(ConvergenceEstimate {
        tau,
        max_tau,
        samples_per_walker,
        converged,
    })
}

/// Thinning stride: the configured value if any, else `⌊τ_max⌋`, at least 1.
pub fn thinning_stride(fixed: Option<usize>, estimate: Option<&ConvergenceEstimate>) -> usize {
    if let Some(stride) = fixed {
        return stride.max(1);
    }
    estimate
        .map(|est| est.max_tau.floor())
        .filter(|tau| tau.is_finite() && *tau >= 1.0)
        .map_or(1, |tau| tau as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gwpe_core::RngHandle;
    use rand_distr::{Distribution, StandardNormal};

    fn ar1(phi: f64, len: usize, seed: u64) -> Vec<f64> {
        let mut rng = RngHandle::from_seed(seed);
        let mut x = 0.0;
        (0..len)
            .map(|_| {
                let eps: f64 = StandardNormal.sample(&mut rng);
                x = phi * x + eps;
                x
            })
            .collect()
    }

    #[test]
    fn white_noise_has_unit_time() {
        let walkers: Vec<Vec<f64>> = (0..16).map(|s| ar1(0.0, 2000, s)).collect();
        for method in [AutocorrMethod::default(), AutocorrMethod::PositiveSum] {
            let tau = integrated_time(&walkers, method).unwrap();
            assert!((tau - 1.0).abs() < 0.3, "{method:?}: {tau}");
        }
    }

    #[test]
    fn ar1_matches_closed_form() {
        // τ = (1 + φ) / (1 − φ) = 9 for φ = 0.8.
        let walkers: Vec<Vec<f64>> = (0..32).map(|s| ar1(0.8, 4000, 100 + s)).collect();
        let tau = integrated_time(&walkers, AutocorrMethod::default()).unwrap();
        assert!((tau - 9.0).abs() < 1.5, "tau {tau}");
    }

    #[test]
    fn correlated_walkers_flag_an_unconverged_window() {
        // ρ(k) = 1 at every lag, so no window satisfies M ≥ c·τ.
        let stuck = vec![vec![0.5; 40]; 4];
        let (tau, converged) = integrate(&stuck, AutocorrMethod::default()).unwrap();
        assert!(!converged);
        assert_eq!(tau, 41.0);
        assert_eq!(integrated_time(&stuck, AutocorrMethod::default()), Some(tau));
        assert!(integrate(&stuck, AutocorrMethod::PositiveSum).unwrap().1);

        let noise: Vec<Vec<f64>> = (0..8).map(|s| ar1(0.0, 2000, 400 + s)).collect();
        assert!(integrate(&noise, AutocorrMethod::default()).unwrap().1);
    }

    #[test]
    fn lag_zero_is_one() {
        let rho = autocorrelation(&ar1(0.5, 500, 9), 10);
        assert_eq!(rho.len(), 11);
        assert!((rho[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn constant_walkers_are_fully_correlated() {
        let walkers = vec![vec![2.0; 50], vec![2.0; 50]];
        let tau = integrated_time(&walkers, AutocorrMethod::PositiveSum).unwrap();
        assert_eq!(tau, 51.0);
        assert!(integrated_time(&[vec![1.0]], AutocorrMethod::PositiveSum).is_none());
    }

    #[test]
    fn stride_prefers_fixed_value() {
        let est = ConvergenceEstimate {
            tau: IndexMap::from([("x".to_string(), 7.9)]),
            max_tau: 7.9,
            samples_per_walker: 100,
            converged: true,
        };
        assert_eq!(thinning_stride(Some(3), Some(&est)), 3);
        assert_eq!(thinning_stride(None, Some(&est)), 7);
        assert_eq!(thinning_stride(None, None), 1);
    }
}
