use std::fs;

use gwpe_core::{ErrorInfo, GwError, LikelihoodModel, WaveformParams};
use gwpe_mcmc::{run, InitMethod, ModePattern, RunConfig};
use nalgebra::DMatrix;
use tempfile::tempdir;

const DOCUMENT: &str = r#"
sampler:
  n_walkers: 8
  n_temps: 2
  n_iter: 60
  burn_in: 10
  n_iter_info: 0
  init_method: prior
  multimodal_pattern: single
  seed: 3
source:
  m: 0.2
  q: 0.5
waveform:
  approximant: TaylorF2
  fmin: 1.0e-4
prior:
  infer_params: [m, q]
  params_range: [[0.0, 1.0], [0.1, 1.0]]
  prior_type: [uniform, uniform]
  wrap: [false, false]
"#;

struct Recording;

impl LikelihoodModel for Recording {
    fn log_likelihood(&self, point: &[f64], waveform: &WaveformParams) -> Result<f64, GwError> {
        let fmin = waveform.get_f64("fmin").ok_or_else(|| {
            GwError::Likelihood(ErrorInfo::new("waveform-missing", "fmin not forwarded"))
        })?;
        Ok(-(point[0] - 0.5).powi(2) / fmin.sqrt())
    }
}

struct Failing;

impl LikelihoodModel for Failing {
    fn log_likelihood(&self, _: &[f64], _: &WaveformParams) -> Result<f64, GwError> {
        Err(GwError::Likelihood(ErrorInfo::new(
            "response-failed",
            "detector response could not be evaluated",
        )))
    }
}

struct Degenerate;

impl LikelihoodModel for Degenerate {
    fn log_likelihood(&self, _: &[f64], _: &WaveformParams) -> Result<f64, GwError> {
        Ok(0.0)
    }

    fn local_curvature(&self, _: &[f64], _: &WaveformParams) -> Result<DMatrix<f64>, GwError> {
        Ok(DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]))
    }
}

#[test]
fn document_loads_from_disk_and_runs() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.yaml");
    fs::write(&path, DOCUMENT).unwrap();
    let config = RunConfig::load(&path).unwrap();
    assert_eq!(config.sampler.init_method, InitMethod::Prior);
    let summary = run(&config, &Recording).unwrap();
    assert_eq!(summary.raw_samples, 50 * 8);
}

#[test]
fn malformed_document_reports_the_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.yaml");
    fs::write(&path, "sampler: [unterminated").unwrap();
    let err = RunConfig::load(&path).unwrap_err();
    assert_eq!(err.info().code, "config-parse");
    assert!(err.info().context.contains_key("path"));
}

type Mutation = Box<dyn Fn(&mut RunConfig)>;

fn case(field: &'static str, mutate: impl Fn(&mut RunConfig) + 'static) -> (&'static str, Mutation) {
    (field, Box::new(mutate))
}

#[test]
fn invalid_settings_are_rejected_before_sampling() {
    let base = RunConfig::from_yaml_str(DOCUMENT).unwrap();
    let cases = vec![
        case("n_walkers", |c| c.sampler.n_walkers = 7),
        case("n_walkers", |c| c.sampler.n_walkers = 2),
        case("n_temps", |c| c.sampler.n_temps = 0),
        case("burn_in", |c| c.sampler.burn_in = 60),
        case("p_jump", |c| c.sampler.p_jump = 1.5),
        case("stretch_scale", |c| c.sampler.stretch_scale = 1.0),
        case("upsample", |c| c.sampler.upsample = 0),
        case("thinning.stride", |c| c.sampler.thinning.stride = Some(0)),
        case("max_temperature", |c| c.sampler.max_temperature = Some(0.5)),
    ];
    for (field, mutate) in cases {
        let mut config = base.clone();
        mutate(&mut config);
        let err = run(&config, &Recording).unwrap_err();
        assert!(matches!(err, GwError::Config(_)), "{field}: {err}");
        assert_eq!(
            err.info().context.get("field").map(String::as_str),
            Some(field)
        );
    }
}

#[test]
fn prior_descriptor_mismatch_is_fatal() {
    let mut config = RunConfig::from_yaml_str(DOCUMENT).unwrap();
    config.prior.prior_type.push("uniform".into());
    let err = run(&config, &Recording).unwrap_err();
    assert_eq!(err.info().code, "prior-length-mismatch");
}

#[test]
fn missing_mode_dimensions_are_fatal() {
    let mut config = RunConfig::from_yaml_str(DOCUMENT).unwrap();
    config.sampler.multimodal_pattern = ModePattern::Eight;
    let err = run(&config, &Recording).unwrap_err();
    assert_eq!(err.info().code, "mode-dimension-missing");
}

#[test]
fn singular_curvature_aborts_initialization() {
    let mut config = RunConfig::from_yaml_str(DOCUMENT).unwrap();
    config.sampler.init_method = InitMethod::Fisher;
    let err = run(&config, &Degenerate).unwrap_err();
    assert!(matches!(err, GwError::Init(_)));
    assert_eq!(err.info().code, "fisher-singular");
}

#[test]
fn missing_curvature_support_is_reported() {
    let mut config = RunConfig::from_yaml_str(DOCUMENT).unwrap();
    config.sampler.init_method = InitMethod::Fisher;
    let err = run(&config, &Recording).unwrap_err();
    assert_eq!(err.info().code, "curvature-unsupported");
}

#[test]
fn evaluator_errors_abort_the_run() {
    let config = RunConfig::from_yaml_str(DOCUMENT).unwrap();
    let err = run(&config, &Failing).unwrap_err();
    assert!(matches!(err, GwError::Likelihood(_)));
    assert_eq!(err.info().code, "response-failed");
}

#[test]
fn zero_likelihood_samples_the_prior() {
    let mut config = RunConfig::from_yaml_str(DOCUMENT).unwrap();
    config.sampler.zero_likelihood = true;
    config.sampler.n_walkers = 32;
    config.sampler.n_iter = 600;
    config.sampler.burn_in = 100;
    let summary = run(&config, &Failing).unwrap();
    let records = summary.chain.records();
    assert!(records.iter().all(|r| r.log_likelihood == 0.0));
    let mean = records.iter().map(|r| r.position[0]).sum::<f64>() / records.len() as f64;
    assert!((mean - 0.5).abs() < 0.05, "mean {mean}");
}
