use std::f64::consts::{FRAC_PI_2, PI};

use gwpe_core::errors::ErrorInfo;
use gwpe_core::GwError;
use serde::{Deserialize, Serialize};

use crate::prior::PriorSpace;

/// Set of response-model degeneracies used to seed walkers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ModePattern {
    /// Nominal point only.
    Single,
    /// Nominal point and its latitude/inclination/polarization reflection.
    Reflection,
    /// Four sky-longitude shifts by multiples of π/2.
    Longitude,
    /// Four longitude shifts, each with and without the reflection.
    #[default]
    Eight,
}

impl ModePattern {
    /// Number of modes enumerated by the pattern.
    pub fn n_modes(&self) -> usize {
        match self {
            ModePattern::Single => 1,
            ModePattern::Reflection => 2,
            ModePattern::Longitude => 4,
            ModePattern::Eight => 8,
        }
    }

    fn uses_longitude(&self) -> bool {
        matches!(self, ModePattern::Longitude | ModePattern::Eight)
    }

    fn uses_reflection(&self) -> bool {
        matches!(self, ModePattern::Reflection | ModePattern::Eight)
    }
}

/// Names of the dimensions the reflections act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeDimensions {
    /// Sky longitude, shifted by `kπ/2`.
    #[serde(default = "default_longitude")]
    pub longitude: String,
    /// Sky latitude, negated by the reflection.
    #[serde(default = "default_latitude")]
    pub latitude: String,
    /// Inclination, complemented to `π - inc` by the reflection.
    #[serde(default = "default_inclination")]
    pub inclination: String,
    /// Polarization, shifted with the longitude and complemented by the reflection.
    #[serde(default = "default_polarization")]
    pub polarization: String,
}

fn default_longitude() -> String {
    "lambda".to_string()
}

fn default_latitude() -> String {
    "beta".to_string()
}

fn default_inclination() -> String {
    "inc".to_string()
}

fn default_polarization() -> String {
    "psi".to_string()
}

impl Default for ModeDimensions {
    fn default() -> Self {
        Self {
            longitude: default_longitude(),
            latitude: default_latitude(),
            inclination: default_inclination(),
            polarization: default_polarization(),
        }
    }
}

/// Resolved reflection map over a concrete prior space.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeMap {
    pattern: ModePattern,
    longitude: Option<usize>,
    latitude: Option<usize>,
    inclination: Option<usize>,
    polarization: Option<usize>,
}

impl ModeMap {
    /// Resolves dimension indices, failing if the pattern needs a missing one.
    pub fn new(
        pattern: ModePattern,
        names: &ModeDimensions,
        space: &PriorSpace,
    ) -> Result<Self, GwError> {
        let lookup = |name: &str, needed: bool| -> Result<Option<usize>, GwError> {
            match space.index_of(name) {
                Some(index) => Ok(Some(index)),
                None if needed => Err(GwError::Config(
                    ErrorInfo::new(
                        "mode-dimension-missing",
                        "multimodal pattern refers to a parameter that is not inferred",
                    )
                    .with_context("dimension", name)
                    .with_context("pattern", format!("{pattern:?}"))
                    .with_hint("set sampler.mode_dimensions or use multimodal_pattern: single"),
                )),
                None => Ok(None),
            }
        };
        Ok(Self {
            pattern,
            longitude: lookup(&names.longitude, pattern.uses_longitude())?,
            latitude: lookup(&names.latitude, pattern.uses_reflection())?,
            inclination: lookup(&names.inclination, pattern.uses_reflection())?,
            polarization: lookup(
                &names.polarization,
                pattern.uses_longitude() || pattern.uses_reflection(),
            )?,
        })
    }

    /// Pattern this map enumerates.
    pub fn pattern(&self) -> ModePattern {
        self.pattern
    }

    /// Number of modes.
    pub fn n_modes(&self) -> usize {
        self.pattern.n_modes()
    }

    /// Image of `point` under the symmetry labelled `mode`, wrapped into range.
    ///
    /// Mode 0 is always the identity. For the eight-mode pattern, bits 0-1 of
    /// the label select the longitude shift and bit 2 the reflection.
    pub fn reflect(&self, point: &[f64], mode: usize, space: &PriorSpace) -> Vec<f64> {
        let mut out = point.to_vec();
        let (shift, reflect) = match self.pattern {
            ModePattern::Single => (0, false),
            ModePattern::Reflection => (0, mode % 2 == 1),
            ModePattern::Longitude => (mode % 4, false),
            ModePattern::Eight => (mode % 4, (mode / 4) % 2 == 1),
        };
        if reflect {
            if let Some(idx) = self.latitude {
                out[idx] = -out[idx];
            }
            if let Some(idx) = self.inclination {
                out[idx] = PI - out[idx];
            }
            if let Some(idx) = self.polarization {
                out[idx] = PI - out[idx];
            }
        }
        if shift > 0 {
            let offset = shift as f64 * FRAC_PI_2;
            if let Some(idx) = self.longitude {
                out[idx] += offset;
            }
            if let Some(idx) = self.polarization {
                out[idx] += offset;
            }
        }
        space.wrap_in_place(&mut out);
        out
    }

    /// All mode centers generated from the nominal point, indexed by mode id.
    pub fn centers(&self, nominal: &[f64], space: &PriorSpace) -> Vec<Vec<f64>> {
        (0..self.n_modes())
            .map(|mode| self.reflect(nominal, mode, space))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prior::{DimensionSpec, PriorKind};

    fn sky_space() -> PriorSpace {
        PriorSpace::new(vec![
            DimensionSpec::new("inc", 0.0, PI, PriorKind::Sin, false).unwrap(),
            DimensionSpec::new("lambda", 0.0, 2.0 * PI, PriorKind::Uniform, true).unwrap(),
            DimensionSpec::new("beta", -FRAC_PI_2, FRAC_PI_2, PriorKind::Cos, false).unwrap(),
            DimensionSpec::new("psi", 0.0, PI, PriorKind::Uniform, true).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn eight_centers_are_distinct_and_in_support() {
        let space = sky_space();
        let map = ModeMap::new(ModePattern::Eight, &ModeDimensions::default(), &space).unwrap();
        let nominal = [0.9, 1.2, 0.4, 0.7];
        let centers = map.centers(&nominal, &space);
        assert_eq!(centers.len(), 8);
        assert_eq!(centers[0], nominal.to_vec());
        for (i, a) in centers.iter().enumerate() {
            assert!(space.log_density(a).is_finite());
            for b in &centers[i + 1..] {
                let dist: f64 = a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum();
                assert!(dist > 1e-6);
            }
        }
    }

    #[test]
    fn reflection_is_an_involution() {
        let space = sky_space();
        let map =
            ModeMap::new(ModePattern::Reflection, &ModeDimensions::default(), &space).unwrap();
        let nominal = [0.9, 1.2, 0.4, 0.7];
        let once = map.reflect(&nominal, 1, &space);
        assert!((once[0] - (PI - 0.9)).abs() < 1e-12);
        assert!((once[2] + 0.4).abs() < 1e-12);
        let twice = map.reflect(&once, 1, &space);
        for (x, y) in twice.iter().zip(nominal.iter()) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn longitude_shift_wraps_polarization() {
        let space = sky_space();
        let map = ModeMap::new(ModePattern::Longitude, &ModeDimensions::default(), &space).unwrap();
        let shifted = map.reflect(&[0.9, 6.0, 0.4, 3.0], 1, &space);
        assert!((shifted[1] - (6.0 + FRAC_PI_2 - 2.0 * PI)).abs() < 1e-12);
        assert!((shifted[3] - (3.0 + FRAC_PI_2 - PI)).abs() < 1e-12);
    }

    #[test]
    fn missing_dimension_is_a_config_error() {
        let space = PriorSpace::new(vec![
            DimensionSpec::new("x", -1.0, 1.0, PriorKind::Uniform, false).unwrap(),
        ])
        .unwrap();
        let err = ModeMap::new(ModePattern::Eight, &ModeDimensions::default(), &space).unwrap_err();
        assert_eq!(err.info().code, "mode-dimension-missing");
        assert!(ModeMap::new(ModePattern::Single, &ModeDimensions::default(), &space).is_ok());
    }
}
