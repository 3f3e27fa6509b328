use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use gwpe_core::errors::ErrorInfo;
use gwpe_core::{GwError, WaveformParams};
use serde::{Deserialize, Serialize};

use crate::convergence::AutocorrMethod;
use crate::modes::{ModeDimensions, ModeMap, ModePattern};
use crate::prior::PriorSpace;

/// Configuration document consumed wholesale at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RunConfig {
    /// Sampler hyperparameters and output toggles.
    #[serde(default)]
    pub sampler: SamplerConfig,
    /// Nominal source parameters keyed by name, used for seeding.
    #[serde(default)]
    pub source: BTreeMap<String, f64>,
    /// Opaque waveform/response parameters forwarded to the likelihood.
    #[serde(default)]
    pub waveform: WaveformParams,
    /// Per-dimension prior descriptors.
    #[serde(default)]
    pub prior: PriorConfig,
}

impl RunConfig {
    /// Parses a YAML document without validating it.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, GwError> {
        serde_yaml::from_str(yaml).map_err(|err| {
            GwError::Config(
                ErrorInfo::new("config-parse", err.to_string())
                    .with_hint("check the sampler/source/waveform/prior groups"),
            )
        })
    }

    /// Loads and validates a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, GwError> {
        let contents =
            fs::read_to_string(path).map_err(|err| GwError::io("config-read", err, path))?;
        let config = Self::from_yaml_str(&contents).map_err(|err| match err {
            GwError::Config(info) => {
                GwError::Config(info.with_context("path", path.display().to_string()))
            }
            other => other,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Builds the prior space described by the `prior` group.
    pub fn prior_space(&self) -> Result<PriorSpace, GwError> {
        PriorSpace::from_descriptors(
            &self.prior.infer_params,
            &self.prior.params_range,
            &self.prior.prior_type,
            &self.prior.wrap,
        )
    }

    /// Resolves the multimodal reflection map against `space`.
    pub fn mode_map(&self, space: &PriorSpace) -> Result<ModeMap, GwError> {
        ModeMap::new(
            self.sampler.multimodal_pattern,
            &self.sampler.mode_dimensions,
            space,
        )
    }

    /// Nominal point ordered like the inferred dimensions.
    pub fn nominal_point(&self, space: &PriorSpace) -> Result<Vec<f64>, GwError> {
        space
            .dims()
            .iter()
            .map(|dim| {
                self.source.get(&dim.name).copied().ok_or_else(|| {
                    GwError::Config(
                        ErrorInfo::new(
                            "source-missing-parameter",
                            "nominal value required for Fisher initialization",
                        )
                        .with_context("dimension", dim.name.clone()),
                    )
                })
            })
            .collect()
    }

    /// Checks every startup invariant; nothing is sampled before this passes.
    pub fn validate(&self) -> Result<(), GwError> {
        let space = self.prior_space()?;
        self.mode_map(&space)?;
        let s = &self.sampler;
        let ndim = space.len();
        if s.n_walkers < 4 || s.n_walkers % 2 != 0 {
            return Err(invalid("n_walkers", s.n_walkers, "must be even and at least 4"));
        }
        if s.n_walkers < 2 * ndim {
            return Err(invalid(
                "n_walkers",
                s.n_walkers,
                "must be at least twice the number of inferred parameters",
            ));
        }
        if s.n_temps == 0 {
            return Err(invalid("n_temps", s.n_temps, "must be at least 1"));
        }
        if s.n_iter == 0 {
            return Err(invalid("n_iter", s.n_iter, "must be positive"));
        }
        if s.burn_in >= s.n_iter {
            return Err(invalid("burn_in", s.burn_in, "must be smaller than n_iter"));
        }
        if !(0.0..=1.0).contains(&s.p_jump) {
            return Err(invalid("p_jump", s.p_jump, "must lie in [0, 1]"));
        }
        if !(s.stretch_scale > 1.0) {
            return Err(invalid("stretch_scale", s.stretch_scale, "must exceed 1"));
        }
        if let Some(cap) = s.max_temperature {
            if !(cap > 1.0) {
                return Err(invalid("max_temperature", cap, "must exceed 1 (or be .inf)"));
            }
        }
        if !(s.init_scale_cov > 0.0) || !s.init_scale_cov.is_finite() {
            return Err(invalid("init_scale_cov", s.init_scale_cov, "must be positive"));
        }
        if s.init_max_retries == 0 {
            return Err(invalid("init_max_retries", 0, "must be positive"));
        }
        if s.upsample == 0 {
            return Err(invalid("upsample", 0, "must be at least 1"));
        }
        if s.thinning.stride == Some(0) {
            return Err(invalid("thinning.stride", 0, "must be at least 1"));
        }
        if let AutocorrMethod::Windowed { c } = s.autocorr_method {
            if !(c > 0.0) {
                return Err(invalid("autocorr_method.c", c, "must be positive"));
            }
        }
        let adapt = &s.adaptive_temperatures;
        if adapt.enabled && (!(adapt.lag > 0.0) || !(adapt.time > 0.0) || adapt.min_spacing < 0.0)
        {
            return Err(invalid(
                "adaptive_temperatures",
                format!("lag={}, time={}, min_spacing={}", adapt.lag, adapt.time, adapt.min_spacing),
                "lag and time must be positive and min_spacing non-negative",
            ));
        }
        if s.init_method == InitMethod::Fisher {
            self.nominal_point(&space)?;
        }
        Ok(())
    }
}

fn invalid(field: &str, value: impl ToString, rule: &str) -> GwError {
    GwError::Config(
        ErrorInfo::new("sampler-invalid-setting", rule)
            .with_context("field", field)
            .with_context("value", value.to_string()),
    )
}

/// Per-dimension prior descriptors; all four collections are index-aligned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PriorConfig {
    /// Names of the inferred parameters.
    #[serde(default)]
    pub infer_params: Vec<String>,
    /// `[lo, hi]` range per parameter.
    #[serde(default)]
    pub params_range: Vec<[f64; 2]>,
    /// Prior kind per parameter (`uniform`, `sin` or `cos`).
    #[serde(default)]
    pub prior_type: Vec<String>,
    /// Periodic wrap flag per parameter.
    #[serde(default)]
    pub wrap: Vec<bool>,
}

/// Walker seeding strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum InitMethod {
    /// Multivariate normal around each mode center using the inverse Fisher matrix.
    #[default]
    Fisher,
    /// Independent draws from the prior.
    Prior,
}

/// Sampler hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Walkers per temperature level.
    #[serde(default = "default_n_walkers")]
    pub n_walkers: usize,
    /// Number of temperature levels.
    #[serde(default = "default_n_temps")]
    pub n_temps: usize,
    /// Temperature of the hottest level; `None` uses the tabulated geometric step.
    #[serde(default, with = "crate::codec::option_extended_f64")]
    pub max_temperature: Option<f64>,
    /// Total iterations, burn-in included.
    #[serde(default = "default_n_iter")]
    pub n_iter: usize,
    /// Leading iterations excluded from stored output.
    #[serde(default)]
    pub burn_in: usize,
    /// Interval between progress log lines (0 disables them).
    #[serde(default = "default_n_iter_info")]
    pub n_iter_info: usize,
    /// Probability that a walker attempts a mode jump instead of a stretch move.
    #[serde(default = "default_p_jump")]
    pub p_jump: f64,
    /// Stretch-move scale `a`.
    #[serde(default = "default_stretch_scale")]
    pub stretch_scale: f64,
    /// Ladder adaptation settings.
    #[serde(default)]
    pub adaptive_temperatures: AdaptiveLadderConfig,
    /// Walker seeding strategy.
    #[serde(default)]
    pub init_method: InitMethod,
    /// Multiplier applied to the inverse Fisher matrix.
    #[serde(default = "default_init_scale_cov")]
    pub init_scale_cov: f64,
    /// Redraw budget per walker before initialization fails.
    #[serde(default = "default_init_max_retries")]
    pub init_max_retries: usize,
    /// Reflection pattern used to place seed modes.
    #[serde(default)]
    pub multimodal_pattern: ModePattern,
    /// Dimension names the reflections act on.
    #[serde(default)]
    pub mode_dimensions: ModeDimensions,
    /// Autocorrelation-time estimator.
    #[serde(default)]
    pub autocorr_method: AutocorrMethod,
    /// Thinned-output settings.
    #[serde(default)]
    pub thinning: ThinningConfig,
    /// Upsampling factor applied to the thinned output.
    #[serde(default = "default_upsample")]
    pub upsample: usize,
    /// Write every post-burn-in sample.
    #[serde(default = "default_true")]
    pub output_raw: bool,
    /// Write the thinned samples.
    #[serde(default = "default_true")]
    pub output_thinned: bool,
    /// Record every temperature level instead of the cold level only.
    #[serde(default)]
    pub output_all_temps: bool,
    /// Debug override forcing the log-likelihood to zero (prior recovery only).
    #[serde(default)]
    pub zero_likelihood: bool,
    /// Master seed; unset draws one from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Size of the worker pool (0 uses the rayon default).
    #[serde(default)]
    pub threads: usize,
    /// Checkpointing behaviour.
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// Output directory configuration.
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_n_walkers() -> usize {
    64
}

fn default_n_temps() -> usize {
    10
}

fn default_n_iter() -> usize {
    1000
}

fn default_n_iter_info() -> usize {
    100
}

fn default_p_jump() -> f64 {
    0.5
}

fn default_stretch_scale() -> f64 {
    2.0
}

fn default_init_scale_cov() -> f64 {
    1.0
}

fn default_init_max_retries() -> usize {
    1000
}

fn default_upsample() -> usize {
    1
}

fn default_true() -> bool {
    true
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            n_walkers: default_n_walkers(),
            n_temps: default_n_temps(),
            max_temperature: None,
            n_iter: default_n_iter(),
            burn_in: 0,
            n_iter_info: default_n_iter_info(),
            p_jump: default_p_jump(),
            stretch_scale: default_stretch_scale(),
            adaptive_temperatures: AdaptiveLadderConfig::default(),
            init_method: InitMethod::default(),
            init_scale_cov: default_init_scale_cov(),
            init_max_retries: default_init_max_retries(),
            multimodal_pattern: ModePattern::default(),
            mode_dimensions: ModeDimensions::default(),
            autocorr_method: AutocorrMethod::default(),
            thinning: ThinningConfig::default(),
            upsample: default_upsample(),
            output_raw: true,
            output_thinned: true,
            output_all_temps: false,
            zero_likelihood: false,
            seed: None,
            threads: 0,
            checkpoint: CheckpointConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Self-adapting ladder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveLadderConfig {
    /// Enables ladder adaptation after each swap step.
    #[serde(default)]
    pub enabled: bool,
    /// Iteration scale over which adaptation decays.
    #[serde(default = "default_adaptation_lag")]
    pub lag: f64,
    /// Inverse adaptation gain.
    #[serde(default = "default_adaptation_time")]
    pub time: f64,
    /// Smallest allowed temperature gap relative to the colder level.
    #[serde(default = "default_min_spacing")]
    pub min_spacing: f64,
}

fn default_adaptation_lag() -> f64 {
    10_000.0
}

fn default_adaptation_time() -> f64 {
    100.0
}

fn default_min_spacing() -> f64 {
    1e-2
}

impl Default for AdaptiveLadderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            lag: default_adaptation_lag(),
            time: default_adaptation_time(),
            min_spacing: default_min_spacing(),
        }
    }
}

/// Thinned-output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinningConfig {
    /// Produce a thinned sample set.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Fixed stride; unset uses the floor of the estimated autocorrelation time.
    #[serde(default)]
    pub stride: Option<usize>,
}

impl Default for ThinningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stride: None,
        }
    }
}

/// Checkpointing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Interval in iterations between checkpoint writes (0 disables checkpoints).
    #[serde(default)]
    pub interval: usize,
    /// Maximum number of checkpoints to retain.
    #[serde(default = "default_checkpoint_retention")]
    pub max_to_keep: usize,
}

fn default_checkpoint_retention() -> usize {
    4
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval: 0,
            max_to_keep: default_checkpoint_retention(),
        }
    }
}

/// Output directory layout configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for run artefacts. Created if it does not exist.
    #[serde(default)]
    pub run_directory: Option<PathBuf>,
    /// Raw sample table relative to `run_directory`.
    #[serde(default = "default_raw_filename")]
    pub raw_file: PathBuf,
    /// Thinned sample table relative to `run_directory`.
    #[serde(default = "default_thinned_filename")]
    pub thinned_file: PathBuf,
    /// Manifest filename relative to `run_directory`.
    #[serde(default = "default_manifest_filename")]
    pub manifest_file: PathBuf,
    /// Subdirectory used for checkpoint files.
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,
}

fn default_raw_filename() -> PathBuf {
    PathBuf::from("raw_samples.csv")
}

fn default_thinned_filename() -> PathBuf {
    PathBuf::from("thinned_samples.csv")
}

fn default_manifest_filename() -> PathBuf {
    PathBuf::from("manifest.json")
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("checkpoints")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            run_directory: None,
            raw_file: default_raw_filename(),
            thinned_file: default_thinned_filename(),
            manifest_file: default_manifest_filename(),
            checkpoint_dir: default_checkpoint_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE: &str = r#"
sampler:
  n_walkers: 64
  n_temps: 10
  n_iter: 400
  burn_in: 100
  p_jump: 0.5
  adaptive_temperatures:
    enabled: true
  init_method: fisher
  init_scale_cov: 1.0
  multimodal_pattern: eight
  autocorr_method:
    type: windowed
    c: 5.0
  thinning:
    enabled: true
  upsample: 1
  seed: 42
source:
  chi1: 0.5
  chi2: 0.3
  dist: 40000.0
  inc: 1.0471975511965976
  phi: 1.0
  lambda: 1.2
  beta: 0.4
  psi: 0.6
waveform:
  approximant: IMRPhenomHM
  minf: 1.0e-5
  LISAconst: Proposal
prior:
  infer_params: [chi1, chi2, dist, inc, phi, lambda, beta, psi]
  params_range:
    - [-1.0, 1.0]
    - [-1.0, 1.0]
    - [5000.0, 200000.0]
    - [0.0, 3.141592653589793]
    - [-3.141592653589793, 3.141592653589793]
    - [-3.141592653589793, 3.141592653589793]
    - [-1.5707963267948966, 1.5707963267948966]
    - [0.0, 3.141592653589793]
  prior_type: [uniform, uniform, uniform, sin, uniform, uniform, cos, uniform]
  wrap: [false, false, false, false, true, true, false, true]
"#;

    #[test]
    fn reference_document_validates() {
        let config = RunConfig::from_yaml_str(REFERENCE).unwrap();
        config.validate().unwrap();
        let space = config.prior_space().unwrap();
        assert_eq!(space.len(), 8);
        assert_eq!(config.sampler.seed, Some(42));
        assert!(config.sampler.adaptive_temperatures.enabled);
        assert_eq!(config.sampler.multimodal_pattern, ModePattern::Eight);
        let nominal = config.nominal_point(&space).unwrap();
        assert_eq!(nominal[2], 40000.0);
        assert_eq!(
            config.waveform.get("approximant").and_then(|v| v.as_str()),
            Some("IMRPhenomHM")
        );
    }

    #[test]
    fn mismatched_prior_lengths_fail_at_startup() {
        let mut config = RunConfig::from_yaml_str(REFERENCE).unwrap();
        config.prior.wrap.pop();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, GwError::Config(_)));
        assert_eq!(err.info().code, "prior-length-mismatch");
    }

    #[test]
    fn invalid_prior_kind_fails_at_startup() {
        let mut config = RunConfig::from_yaml_str(REFERENCE).unwrap();
        config.prior.prior_type[0] = "gaussian".into();
        let err = config.validate().unwrap_err();
        assert_eq!(err.info().code, "invalid-prior-kind");
        assert_eq!(err.info().context.get("dimension").map(String::as_str), Some("chi1"));
    }

    #[test]
    fn burn_in_must_leave_iterations() {
        let mut config = RunConfig::from_yaml_str(REFERENCE).unwrap();
        config.sampler.burn_in = config.sampler.n_iter;
        let err = config.validate().unwrap_err();
        assert_eq!(err.info().context.get("field").map(String::as_str), Some("burn_in"));
    }

    #[test]
    fn infinite_temperature_cap_parses() {
        let yaml = REFERENCE.replace("n_temps: 10", "n_temps: 10\n  max_temperature: .inf");
        let config = RunConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.sampler.max_temperature, Some(f64::INFINITY));
        config.validate().unwrap();
    }

    #[test]
    fn fisher_init_requires_nominal_values() {
        let mut config = RunConfig::from_yaml_str(REFERENCE).unwrap();
        config.source.remove("psi");
        let err = config.validate().unwrap_err();
        assert_eq!(err.info().code, "source-missing-parameter");
        config.sampler.init_method = InitMethod::Prior;
        config.validate().unwrap();
    }

    #[test]
    fn defaults_fill_missing_groups() {
        let config = RunConfig::from_yaml_str("prior:\n  infer_params: [x]\n").unwrap();
        assert_eq!(config.sampler.n_walkers, 64);
        assert_eq!(config.sampler.upsample, 1);
        assert!(config.sampler.thinning.enabled);
        assert!(config.validate().is_err());
    }
}
