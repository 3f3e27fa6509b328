use criterion::{criterion_group, criterion_main, Criterion};
use gwpe_core::{GwError, LikelihoodModel, WaveformParams};

use gwpe_mcmc::{run, InitMethod, ModePattern, RunConfig};

struct Rosenbrock;

impl LikelihoodModel for Rosenbrock {
    fn log_likelihood(&self, point: &[f64], _: &WaveformParams) -> Result<f64, GwError> {
        Ok(-point
            .windows(2)
            .map(|pair| 100.0 * (pair[1] - pair[0] * pair[0]).powi(2) + (1.0 - pair[0]).powi(2))
            .sum::<f64>()
            / 20.0)
    }
}

fn bench_config() -> RunConfig {
    let mut config = RunConfig::default();
    config.prior.infer_params = (0..4).map(|i| format!("x{i}")).collect();
    config.prior.params_range = vec![[-5.0, 5.0]; 4];
    config.prior.prior_type = vec!["uniform".into(); 4];
    config.prior.wrap = vec![false; 4];
    config.sampler.n_walkers = 16;
    config.sampler.n_temps = 4;
    config.sampler.n_iter = 50;
    config.sampler.burn_in = 10;
    config.sampler.n_iter_info = 0;
    config.sampler.init_method = InitMethod::Prior;
    config.sampler.multimodal_pattern = ModePattern::Single;
    config.sampler.seed = Some(42);
    config.sampler.output.run_directory = None;
    config.sampler.checkpoint.interval = 0;
    config
}

fn bench_iterations(c: &mut Criterion) {
    let config = bench_config();
    c.bench_function("pt_ensemble_iterations", |b| {
        b.iter(|| {
            let _ = run(&config, &Rosenbrock).unwrap();
        })
    });

    let mut single = bench_config();
    single.sampler.threads = 1;
    c.bench_function("pt_ensemble_iterations_single_thread", |b| {
        b.iter(|| {
            let _ = run(&single, &Rosenbrock).unwrap();
        })
    });
}

criterion_group!(benches, bench_iterations);
criterion_main!(benches);
