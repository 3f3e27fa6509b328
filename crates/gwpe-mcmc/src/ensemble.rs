use std::ops::Range;

use gwpe_core::{GwError, LikelihoodModel, WaveformParams};
use serde::{Deserialize, Serialize};

use crate::prior::PriorSpace;

/// One member of a temperature level's ensemble.
///
/// The level is implied by the ensemble that owns the walker; swaps move
/// whole walkers between ensembles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Walker {
    /// Current position, ordered like the inferred dimensions.
    pub position: Vec<f64>,
    /// Cached log-likelihood at `position`.
    #[serde(with = "crate::codec::extended_f64")]
    pub log_likelihood: f64,
    /// Cached log-prior at `position`.
    #[serde(with = "crate::codec::extended_f64")]
    pub log_prior: f64,
    /// Seeded mode this walker belongs to.
    pub mode: usize,
}

/// Contiguous two-half partition of an ensemble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HalfSplit {
    /// Walkers updated in this sub-step.
    pub active: Range<usize>,
    /// Walkers frozen and used as proposal anchors.
    pub complementary: Range<usize>,
}

impl HalfSplit {
    /// Partition used by `sub_step`; consecutive sub-steps swap the halves.
    pub fn for_sub_step(n_walkers: usize, sub_step: usize) -> Self {
        let half = n_walkers / 2;
        if sub_step % 2 == 0 {
            Self {
                active: 0..half,
                complementary: half..n_walkers,
            }
        } else {
            Self {
                active: half..n_walkers,
                complementary: 0..half,
            }
        }
    }
}

/// Log-posterior components evaluated at one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Log prior density; `-inf` outside the support.
    pub log_prior: f64,
    /// Log-likelihood; `-inf` when skipped or non-finite.
    pub log_likelihood: f64,
}

/// Prior plus external likelihood, shared read-only by all workers.
pub struct Target<'a, L: ?Sized> {
    prior: &'a PriorSpace,
    likelihood: &'a L,
    waveform: &'a WaveformParams,
    zero_likelihood: bool,
}

impl<'a, L: LikelihoodModel + ?Sized> Target<'a, L> {
    /// Bundles the collaborators used to score proposals.
    pub fn new(
        prior: &'a PriorSpace,
        likelihood: &'a L,
        waveform: &'a WaveformParams,
        zero_likelihood: bool,
    ) -> Self {
        Self {
            prior,
            likelihood,
            waveform,
            zero_likelihood,
        }
    }

    /// Prior space of the run.
    pub fn prior(&self) -> &PriorSpace {
        self.prior
    }

    /// Scores `point`. The likelihood is skipped when the prior vanishes and
    /// always sees the wrapped point.
    pub fn evaluate(&self, point: &[f64]) -> Result<Evaluation, GwError> {
        let log_prior = self.prior.log_density(point);
        if log_prior == f64::NEG_INFINITY {
            return Ok(Evaluation {
                log_prior,
                log_likelihood: f64::NEG_INFINITY,
            });
        }
        if self.zero_likelihood {
            return Ok(Evaluation {
                log_prior,
                log_likelihood: 0.0,
            });
        }
        let wrapped = self.prior.wrap(point);
        let raw = self.likelihood.log_likelihood(&wrapped, self.waveform)?;
        let log_likelihood = if raw.is_finite() {
            raw
        } else {
            f64::NEG_INFINITY
        };
        Ok(Evaluation {
            log_prior,
            log_likelihood,
        })
    }

    /// Builds a walker at `position` with freshly evaluated caches.
    pub fn walker(&self, position: Vec<f64>, mode: usize) -> Result<Walker, GwError> {
        let eval = self.evaluate(&position)?;
        Ok(Walker {
            position,
            log_likelihood: eval.log_likelihood,
            log_prior: eval.log_prior,
            mode,
        })
    }
}

/// `β · (new − old)`. A rejected likelihood gives `-inf` at every level,
/// including `β = 0`; otherwise `β = 0` gives zero so infinite differences
/// never produce NaN.
pub fn tempered_delta(beta: f64, new: f64, old: f64) -> f64 {
    if new == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if beta == 0.0 {
        return 0.0;
    }
    beta * (new - old)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prior::{DimensionSpec, PriorKind};

    struct Quadratic;

    impl LikelihoodModel for Quadratic {
        fn log_likelihood(&self, point: &[f64], _: &WaveformParams) -> Result<f64, GwError> {
            Ok(-0.5 * point.iter().map(|x| x * x).sum::<f64>())
        }
    }

    struct Broken;

    impl LikelihoodModel for Broken {
        fn log_likelihood(&self, _: &[f64], _: &WaveformParams) -> Result<f64, GwError> {
            Ok(f64::NAN)
        }
    }

    fn space() -> PriorSpace {
        PriorSpace::new(vec![
            DimensionSpec::new("x", -5.0, 5.0, PriorKind::Uniform, false).unwrap(),
            DimensionSpec::new("phi", -1.0, 1.0, PriorKind::Uniform, true).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn halves_alternate_and_cover_the_ensemble() {
        let even = HalfSplit::for_sub_step(8, 0);
        let odd = HalfSplit::for_sub_step(8, 1);
        assert_eq!(even.active, 0..4);
        assert_eq!(even.complementary, odd.active);
        assert_eq!(odd.complementary, 0..4);
    }

    #[test]
    fn likelihood_sees_wrapped_point() {
        let space = space();
        let waveform = WaveformParams::default();
        let target = Target::new(&space, &Quadratic, &waveform, false);
        let eval = target.evaluate(&[1.0, 1.5]).unwrap();
        assert!((eval.log_likelihood + 0.5 * (1.0 + 0.25)).abs() < 1e-12);
    }

    #[test]
    fn outside_support_skips_likelihood() {
        let space = space();
        let waveform = WaveformParams::default();
        let target = Target::new(&space, &Broken, &waveform, false);
        let eval = target.evaluate(&[6.0, 0.0]).unwrap();
        assert_eq!(eval.log_prior, f64::NEG_INFINITY);
        let eval = target.evaluate(&[0.0, 0.0]).unwrap();
        assert_eq!(eval.log_likelihood, f64::NEG_INFINITY);
    }

    #[test]
    fn zero_likelihood_override() {
        let space = space();
        let waveform = WaveformParams::default();
        let target = Target::new(&space, &Broken, &waveform, true);
        assert_eq!(target.evaluate(&[0.0, 0.0]).unwrap().log_likelihood, 0.0);
    }

    #[test]
    fn tempered_delta_handles_infinities() {
        assert_eq!(tempered_delta(0.0, f64::NEG_INFINITY, 3.0), f64::NEG_INFINITY);
        assert_eq!(tempered_delta(0.0, -7.0, 3.0), 0.0);
        assert_eq!(tempered_delta(0.0, -7.0, f64::NEG_INFINITY), 0.0);
        assert_eq!(tempered_delta(0.5, f64::NEG_INFINITY, f64::NEG_INFINITY), f64::NEG_INFINITY);
        assert_eq!(tempered_delta(0.5, 1.0, f64::NEG_INFINITY), f64::INFINITY);
        assert_eq!(tempered_delta(0.5, 3.0, 1.0), 1.0);
    }
}
