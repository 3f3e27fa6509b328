use std::f64::consts::{FRAC_PI_2, PI};
use std::str::FromStr;

use gwpe_core::errors::ErrorInfo;
use gwpe_core::{GwError, RngHandle};
use serde::{Deserialize, Serialize};

/// Closed set of one-dimensional prior shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorKind {
    /// Flat density on `[lo, hi]`.
    Uniform,
    /// Density proportional to `sin(x)`, for colatitude-like angles in `[0, π]`.
    Sin,
    /// Density proportional to `cos(x)`, for latitude-like angles in `[-π/2, π/2]`.
    Cos,
}

impl FromStr for PriorKind {
    type Err = GwError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "uniform" => Ok(PriorKind::Uniform),
            "sin" => Ok(PriorKind::Sin),
            "cos" => Ok(PriorKind::Cos),
            other => Err(GwError::Config(
                ErrorInfo::new("invalid-prior-kind", "unknown prior kind")
                    .with_context("kind", other)
                    .with_hint("supported kinds are uniform, sin and cos"),
            )),
        }
    }
}

impl PriorKind {
    /// Normalization constant of the unnormalized shape over `[lo, hi]`.
    fn normalization(&self, lo: f64, hi: f64) -> f64 {
        match self {
            PriorKind::Uniform => hi - lo,
            PriorKind::Sin => lo.cos() - hi.cos(),
            PriorKind::Cos => hi.sin() - lo.sin(),
        }
    }

    /// Normalized density at `x`; zero outside `[lo, hi]`.
    pub fn density(&self, x: f64, lo: f64, hi: f64) -> f64 {
        let log = self.log_density(x, lo, hi);
        if log == f64::NEG_INFINITY {
            0.0
        } else {
            log.exp()
        }
    }

    /// Normalized log-density at `x`; negative infinity outside `[lo, hi]`.
    pub fn log_density(&self, x: f64, lo: f64, hi: f64) -> f64 {
        if !(lo..=hi).contains(&x) {
            return f64::NEG_INFINITY;
        }
        let shape = match self {
            PriorKind::Uniform => return -(hi - lo).ln(),
            PriorKind::Sin => x.sin(),
            PriorKind::Cos => x.cos(),
        };
        if shape <= 0.0 {
            return f64::NEG_INFINITY;
        }
        shape.ln() - self.normalization(lo, hi).ln()
    }

    /// Draws a value by inverting the cumulative distribution.
    pub fn sample(&self, lo: f64, hi: f64, rng: &mut RngHandle) -> f64 {
        let u = rng.uniform();
        let value = match self {
            PriorKind::Uniform => lo + u * (hi - lo),
            PriorKind::Sin => {
                let arg = lo.cos() - u * self.normalization(lo, hi);
                arg.clamp(-1.0, 1.0).acos()
            }
            PriorKind::Cos => {
                let arg = lo.sin() + u * self.normalization(lo, hi);
                arg.clamp(-1.0, 1.0).asin()
            }
        };
        value.clamp(lo, hi)
    }

    fn check_range(&self, name: &str, lo: f64, hi: f64) -> Result<(), GwError> {
        let (min, max) = match self {
            PriorKind::Uniform => return Ok(()),
            PriorKind::Sin => (0.0, PI),
            PriorKind::Cos => (-FRAC_PI_2, FRAC_PI_2),
        };
        // Tolerate ranges written with a rounded value of π.
        let slack = 1e-3;
        if lo < min - slack || hi > max + slack {
            return Err(GwError::Config(
                ErrorInfo::new(
                    "prior-range-unsupported",
                    "range exceeds the support of the prior shape",
                )
                .with_context("dimension", name)
                .with_context("range", format!("[{lo}, {hi}]"))
                .with_context("support", format!("[{min}, {max}]")),
            ));
        }
        Ok(())
    }
}

/// Prior descriptor for one inferred dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionSpec {
    /// Parameter name as used in the configuration document.
    pub name: String,
    /// Lower bound of the range.
    pub lo: f64,
    /// Upper bound of the range.
    pub hi: f64,
    /// Prior shape.
    pub kind: PriorKind,
    /// Whether the parameter is periodic over `[lo, hi)`.
    pub wrap: bool,
}

impl DimensionSpec {
    /// Creates a validated dimension descriptor.
    pub fn new(
        name: impl Into<String>,
        lo: f64,
        hi: f64,
        kind: PriorKind,
        wrap: bool,
    ) -> Result<Self, GwError> {
        let name = name.into();
        if !lo.is_finite() || !hi.is_finite() || hi <= lo {
            return Err(GwError::Config(
                ErrorInfo::new("prior-range-invalid", "range must be finite with hi > lo")
                    .with_context("dimension", name)
                    .with_context("range", format!("[{lo}, {hi}]")),
            ));
        }
        kind.check_range(&name, lo, hi)?;
        Ok(Self {
            name,
            lo,
            hi,
            kind,
            wrap,
        })
    }

    /// Width of the declared range.
    pub fn width(&self) -> f64 {
        self.hi - self.lo
    }

    /// Folds `x` into `[lo, hi)` when the dimension is periodic.
    pub fn wrap_value(&self, x: f64) -> f64 {
        if !self.wrap || !x.is_finite() || (x >= self.lo && x < self.hi) {
            return x;
        }
        let width = self.width();
        let mut offset = (x - self.lo).rem_euclid(width);
        if offset >= width {
            offset = 0.0;
        }
        let wrapped = self.lo + offset;
        if wrapped >= self.hi {
            self.lo
        } else {
            wrapped
        }
    }

    /// Log prior density of `x`, evaluated after wrapping.
    pub fn log_density(&self, x: f64) -> f64 {
        self.kind.log_density(self.wrap_value(x), self.lo, self.hi)
    }
}

/// Product prior over all inferred dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorSpace {
    dims: Vec<DimensionSpec>,
}

impl PriorSpace {
    /// Builds a prior space from validated dimension specs.
    pub fn new(dims: Vec<DimensionSpec>) -> Result<Self, GwError> {
        if dims.is_empty() {
            return Err(GwError::config(
                "prior-empty",
                "at least one inferred parameter is required",
            ));
        }
        for (idx, dim) in dims.iter().enumerate() {
            if dims[..idx].iter().any(|other| other.name == dim.name) {
                return Err(GwError::Config(
                    ErrorInfo::new("prior-duplicate-name", "parameter listed twice")
                        .with_context("dimension", dim.name.clone()),
                ));
            }
        }
        Ok(Self { dims })
    }

    /// Builds a prior space from the four aligned descriptor collections.
    pub fn from_descriptors(
        names: &[String],
        ranges: &[[f64; 2]],
        kinds: &[String],
        wraps: &[bool],
    ) -> Result<Self, GwError> {
        let n = names.len();
        if ranges.len() != n || kinds.len() != n || wraps.len() != n {
            return Err(GwError::Config(
                ErrorInfo::new(
                    "prior-length-mismatch",
                    "prior descriptor collections must have identical lengths",
                )
                .with_context("infer_params", n.to_string())
                .with_context("params_range", ranges.len().to_string())
                .with_context("prior_type", kinds.len().to_string())
                .with_context("wrap", wraps.len().to_string()),
            ));
        }
        let mut dims = Vec::with_capacity(n);
        for idx in 0..n {
            let kind = kinds[idx].parse::<PriorKind>().map_err(|err| match err {
                GwError::Config(info) => {
                    GwError::Config(info.with_context("dimension", names[idx].clone()))
                }
                other => other,
            })?;
            let [lo, hi] = ranges[idx];
            dims.push(DimensionSpec::new(
                names[idx].clone(),
                lo,
                hi,
                kind,
                wraps[idx],
            )?);
        }
        Self::new(dims)
    }

    /// Number of inferred dimensions.
    pub fn len(&self) -> usize {
        self.dims.len()
    }

    /// Always false for a constructed space.
    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    /// Dimension descriptors in parameter order.
    pub fn dims(&self) -> &[DimensionSpec] {
        &self.dims
    }

    /// Parameter names in order.
    pub fn names(&self) -> Vec<String> {
        self.dims.iter().map(|dim| dim.name.clone()).collect()
    }

    /// Index of the named dimension.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.dims.iter().position(|dim| dim.name == name)
    }

    /// Sum of per-dimension log densities.
    ///
    /// Negative infinity if any non-periodic component lies outside its range
    /// or if the vector has the wrong length.
    pub fn log_density(&self, point: &[f64]) -> f64 {
        if point.len() != self.dims.len() {
            return f64::NEG_INFINITY;
        }
        let mut total = 0.0;
        for (dim, &x) in self.dims.iter().zip(point) {
            let log = dim.log_density(x);
            if log == f64::NEG_INFINITY || log.is_nan() {
                return f64::NEG_INFINITY;
            }
            total += log;
        }
        total
    }

    /// Prior density (not logged).
    pub fn density(&self, point: &[f64]) -> f64 {
        let log = self.log_density(point);
        if log == f64::NEG_INFINITY {
            0.0
        } else {
            log.exp()
        }
    }

    /// Returns a copy of `point` with periodic components folded into range.
    pub fn wrap(&self, point: &[f64]) -> Vec<f64> {
        let mut out = point.to_vec();
        self.wrap_in_place(&mut out);
        out
    }

    /// Folds periodic components of `point` in place.
    pub fn wrap_in_place(&self, point: &mut [f64]) {
        for (dim, x) in self.dims.iter().zip(point.iter_mut()) {
            *x = dim.wrap_value(*x);
        }
    }

    /// Draws one vector from the prior.
    pub fn sample(&self, rng: &mut RngHandle) -> Vec<f64> {
        self.dims
            .iter()
            .map(|dim| dim.kind.sample(dim.lo, dim.hi, rng))
            .collect()
    }
}
