use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use gwpe_core::errors::ErrorInfo;
use gwpe_core::{resolve_master_seed, GwError, LikelihoodModel, RngHandle};
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::chain::{self, ChainStore, SampleRecord};
use crate::checkpoint::{self, CheckpointPayload};
use crate::config::{OutputConfig, RunConfig};
use crate::convergence::{self, ConvergenceEstimate};
use crate::determinism;
use crate::ensemble::{HalfSplit, Target, Walker};
use crate::init;
use crate::manifest::{self, RunManifest};
use crate::metrics::{LevelTally, MoveKind, MoveStats};
use crate::moves_jump;
use crate::moves_stretch;
use crate::prior::PriorSpace;
use crate::tempering::{self, TemperatureLadder};

/// Summary returned to callers after a run completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// Resolved master seed.
    pub master_seed: u64,
    /// Iterations executed in total, burn-in included.
    pub iterations: usize,
    /// Acceptance rate per move kind, pooled over levels.
    pub acceptance_rates: BTreeMap<String, f64>,
    /// Acceptance rate per level, coldest first.
    pub level_acceptance: Vec<f64>,
    /// Swap acceptance per adjacent pair of levels.
    pub swap_acceptance: Vec<f64>,
    /// Final inverse temperatures.
    pub betas: Vec<f64>,
    /// Autocorrelation estimate of the cold chain, if enough samples exist.
    pub convergence: Option<ConvergenceEstimate>,
    /// Thinning stride applied to the thinned samples.
    pub thinning_stride: usize,
    /// Number of raw records stored.
    pub raw_samples: usize,
    /// Number of thinned records produced.
    pub thinned_samples: usize,
    /// Final walker states per level.
    pub final_walkers: Vec<Vec<Walker>>,
    /// Every recorded sample.
    pub chain: ChainStore,
    /// Raw sample table, if written.
    pub raw_path: Option<PathBuf>,
    /// Thinned sample table, if written.
    pub thinned_path: Option<PathBuf>,
    /// Manifest path, if emitted.
    pub manifest_path: Option<PathBuf>,
    /// Checkpoint files retained at the end of the run.
    pub checkpoints: Vec<PathBuf>,
}

/// Mutable state carried from one iteration to the next.
struct SamplerState {
    iteration: usize,
    master_seed: u64,
    ladder: TemperatureLadder,
    levels: Vec<Vec<Walker>>,
    stats: MoveStats,
    chain: ChainStore,
}

/// Runs the sampler from scratch.
///
/// The configuration is validated first; an unset seed is drawn from OS
/// entropy and reported in the summary and manifest.
pub fn run<L: LikelihoodModel + ?Sized>(
    config: &RunConfig,
    likelihood: &L,
) -> Result<RunSummary, GwError> {
    config.validate()?;
    let space = config.prior_space()?;
    let modes = config.mode_map(&space)?;
    let master_seed = resolve_master_seed(config.sampler.seed);
    let sampler = &config.sampler;
    info!(
        seed = master_seed,
        n_walkers = sampler.n_walkers,
        n_temps = sampler.n_temps,
        n_dim = space.len(),
        n_iter = sampler.n_iter,
        "starting ensemble sampler"
    );
    if sampler.zero_likelihood {
        warn!("zero_likelihood is set: the log-likelihood is forced to 0 and the run samples the prior");
    }

    let ladder = TemperatureLadder::new(
        sampler.n_temps,
        space.len(),
        sampler.max_temperature,
        sampler.adaptive_temperatures.clone(),
    )?;
    debug!(betas = ?ladder.betas(), "initial temperature ladder");

    with_pool(sampler.threads, || {
        let seeds = init::initialize(config, &space, &modes, likelihood, master_seed)?;
        let target = Target::new(&space, likelihood, &config.waveform, sampler.zero_likelihood);
        let levels = seeds
            .into_par_iter()
            .map(|level| {
                level
                    .into_par_iter()
                    .map(|seed| target.walker(seed.position, seed.mode))
                    .collect::<Result<Vec<_>, GwError>>()
            })
            .collect::<Result<Vec<_>, GwError>>()?;
        let state = SamplerState {
            iteration: 0,
            master_seed,
            ladder,
            levels,
            stats: MoveStats::new(sampler.n_temps),
            chain: ChainStore::new(space.names(), sampler.n_walkers),
        };
        run_with_state(config, &space, likelihood, state)
    })
}

/// Resumes a run from a checkpoint file written by [`run`].
pub fn resume<L: LikelihoodModel + ?Sized>(
    path: &Path,
    likelihood: &L,
) -> Result<RunSummary, GwError> {
    let payload = CheckpointPayload::load(path)?;
    let config = payload.config;
    config.validate()?;
    let space = config.prior_space()?;
    info!(
        path = %path.display(),
        iteration = payload.iteration,
        seed = payload.master_seed,
        "resuming ensemble sampler"
    );
    let state = SamplerState {
        iteration: payload.iteration,
        master_seed: payload.master_seed,
        ladder: payload.ladder,
        levels: payload.levels,
        stats: payload.stats,
        chain: payload.chain,
    };
    with_pool(config.sampler.threads, || {
        run_with_state(&config, &space, likelihood, state)
    })
}

fn with_pool<T: Send>(
    threads: usize,
    job: impl FnOnce() -> Result<T, GwError> + Send,
) -> Result<T, GwError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|err| {
            GwError::Sampler(
                ErrorInfo::new("thread-pool", err.to_string())
                    .with_context("threads", threads.to_string()),
            )
        })?;
    pool.install(job)
}

fn run_with_state<L: LikelihoodModel + ?Sized>(
    config: &RunConfig,
    space: &PriorSpace,
    likelihood: &L,
    mut state: SamplerState,
) -> Result<RunSummary, GwError> {
    let sampler = &config.sampler;
    let target = Target::new(space, likelihood, &config.waveform, sampler.zero_likelihood);
    let layout = resolve_output_paths(&sampler.output);
    let mut checkpoints = Vec::new();

    while state.iteration < sampler.n_iter {
        let iteration = state.iteration;
        advance_levels(config, &target, &mut state)?;
        swap_step(state.master_seed, iteration, &mut state.levels, &mut state.ladder);
        if state.ladder.adapt(iteration) {
            debug!(iteration, betas = ?state.ladder.betas(), "ladder adapted");
        }
        for level in &mut state.levels {
            for walker in level.iter_mut() {
                space.wrap_in_place(&mut walker.position);
            }
        }
        if iteration >= sampler.burn_in {
            record(&mut state, iteration, sampler.output_all_temps);
        }
        state.iteration += 1;

        if sampler.n_iter_info > 0 && state.iteration % sampler.n_iter_info == 0 {
            log_progress(config, &state);
        }
        if let Some(dir) = &layout.checkpoint_dir {
            if sampler.checkpoint.interval > 0
                && state.iteration % sampler.checkpoint.interval == 0
                && state.iteration < sampler.n_iter
            {
                let path = checkpoint::checkpoint_path(dir, state.iteration);
                checkpoint_payload(config, &state).store(&path)?;
                debug!(path = %path.display(), "checkpoint written");
                checkpoints.push(path);
                checkpoint::enforce_retention(&mut checkpoints, sampler.checkpoint.max_to_keep)?;
            }
        }
    }

    finish(config, state, &layout, checkpoints)
}

/// Stretch and mode-jump updates of every level, levels in parallel.
fn advance_levels<L: LikelihoodModel + ?Sized>(
    config: &RunConfig,
    target: &Target<'_, L>,
    state: &mut SamplerState,
) -> Result<(), GwError> {
    let iteration = state.iteration;
    let seed = state.master_seed;
    let betas = state.ladder.betas().to_vec();
    let tallies = state
        .levels
        .par_iter_mut()
        .enumerate()
        .map(|(level, walkers)| {
            advance_level(config, target, seed, level, betas[level], iteration, walkers)
        })
        .collect::<Result<Vec<_>, GwError>>()?;
    for (level, tally) in tallies.iter().enumerate() {
        state.stats.merge(level, tally);
    }
    Ok(())
}

fn advance_level<L: LikelihoodModel + ?Sized>(
    config: &RunConfig,
    target: &Target<'_, L>,
    seed: u64,
    level: usize,
    beta: f64,
    iteration: usize,
    walkers: &mut [Walker],
) -> Result<LevelTally, GwError> {
    let sampler = &config.sampler;
    let mut tally = LevelTally::default();
    for sub_step in 0..2 {
        let split = HalfSplit::for_sub_step(walkers.len(), sub_step);
        let frozen = walkers[split.complementary.clone()].to_vec();
        let start = split.active.start;
        let outcomes = walkers[split.active.clone()]
            .par_iter()
            .enumerate()
            .map(|(offset, walker)| -> Result<_, GwError> {
                let mut rng = RngHandle::from_seed(determinism::move_seed(
                    seed,
                    level,
                    iteration,
                    sub_step,
                    start + offset,
                ));
                let jump = if sampler.p_jump > 0.0 && rng.uniform() < sampler.p_jump {
                    moves_jump::propose(target, beta, walker, &frozen, &mut rng)?
                } else {
                    None
                };
                let (kind, proposal) = match jump {
                    Some(proposal) => (MoveKind::ModeJump, proposal),
                    None => (
                        MoveKind::Stretch,
                        moves_stretch::propose(
                            target,
                            beta,
                            sampler.stretch_scale,
                            walker,
                            &frozen,
                            &mut rng,
                        )?,
                    ),
                };
                let accepted = rng.uniform().ln() < proposal.log_alpha;
                Ok((kind, accepted.then_some(proposal.candidate)))
            })
            .collect::<Result<Vec<_>, GwError>>()?;
        for (offset, (kind, candidate)) in outcomes.into_iter().enumerate() {
            tally.record(kind, candidate.is_some());
            if let Some(candidate) = candidate {
                walkers[start + offset] = candidate;
            }
        }
    }
    Ok(tally)
}

/// Exchanges walkers between adjacent levels. A random parity selects
/// disjoint pairs `(i, i+1)`, and walkers are paired by a random permutation.
fn swap_step(
    seed: u64,
    iteration: usize,
    levels: &mut [Vec<Walker>],
    ladder: &mut TemperatureLadder,
) {
    let n_levels = levels.len();
    if n_levels < 2 {
        return;
    }
    let mut rng = RngHandle::from_seed(determinism::swap_seed(seed, iteration));
    let parity = rng.index(2);
    for pair in (parity..n_levels - 1).step_by(2) {
        let (beta_cold, beta_hot) = (ladder.beta(pair), ladder.beta(pair + 1));
        let (lower, upper) = levels.split_at_mut(pair + 1);
        let cold = &mut lower[pair];
        let hot = &mut upper[0];
        let mut partners: Vec<usize> = (0..hot.len()).collect();
        partners.shuffle(rng.inner_mut());
        let mut accepted = 0u64;
        for (i, &j) in partners.iter().enumerate().take(cold.len()) {
            let alpha = tempering::swap_acceptance(
                beta_cold,
                beta_hot,
                cold[i].log_likelihood,
                hot[j].log_likelihood,
            );
            if rng.uniform() < alpha {
                std::mem::swap(&mut cold[i], &mut hot[j]);
                accepted += 1;
            }
        }
        ladder.record_pair(pair, cold.len() as u64, accepted);
    }
}

fn record(state: &mut SamplerState, iteration: usize, all_levels: bool) {
    let recorded = if all_levels { state.levels.len() } else { 1 };
    for (level, walkers) in state.levels.iter().take(recorded).enumerate() {
        for (index, walker) in walkers.iter().enumerate() {
            state.chain.push(SampleRecord {
                iteration,
                walker: index,
                temperature: level,
                position: walker.position.clone(),
                log_likelihood: walker.log_likelihood,
                log_prior: walker.log_prior,
            });
        }
    }
}

fn log_progress(config: &RunConfig, state: &SamplerState) {
    let cold_acceptance = state.stats.level_acceptance().first().copied().unwrap_or(0.0);
    let estimate = convergence::estimate(&state.chain, config.sampler.autocorr_method);
    if let Some(est) = estimate.as_ref().filter(|est| !est.converged) {
        debug!(
            samples = est.samples_per_walker,
            max_tau = est.max_tau,
            "autocorrelation window not yet converged"
        );
    }
    let max_tau = estimate.map(|est| est.max_tau);
    let best = state.levels[0]
        .iter()
        .map(|walker| walker.log_likelihood)
        .fold(f64::NEG_INFINITY, f64::max);
    info!(
        iteration = state.iteration,
        n_iter = config.sampler.n_iter,
        cold_acceptance,
        swap_acceptance = ?state.ladder.acceptance_rates(),
        max_log_likelihood = best,
        max_tau = ?max_tau,
        "sampler progress"
    );
}

fn checkpoint_payload(config: &RunConfig, state: &SamplerState) -> CheckpointPayload {
    CheckpointPayload {
        iteration: state.iteration,
        config: config.clone(),
        master_seed: state.master_seed,
        ladder: state.ladder.clone(),
        levels: state.levels.clone(),
        stats: state.stats.clone(),
        chain: state.chain.clone(),
    }
}

fn finish(
    config: &RunConfig,
    state: SamplerState,
    layout: &ResolvedOutput,
    checkpoints: Vec<PathBuf>,
) -> Result<RunSummary, GwError> {
    let sampler = &config.sampler;
    let estimate = convergence::estimate(&state.chain, sampler.autocorr_method);
    let stride = convergence::thinning_stride(sampler.thinning.stride, estimate.as_ref());
    let thinned = if sampler.thinning.enabled {
        state.chain.thinned(stride, sampler.upsample)
    } else {
        Vec::new()
    };
    match &estimate {
        Some(est) if !est.converged => warn!(
            samples = est.samples_per_walker,
            max_tau = est.max_tau,
            stride,
            "autocorrelation window did not converge; chain is shorter than c·τ"
        ),
        Some(est) => info!(max_tau = est.max_tau, stride, "autocorrelation estimate"),
        None => warn!("too few samples to estimate the autocorrelation time"),
    }

    let mut raw_path = None;
    let mut thinned_path = None;
    let mut manifest_path = None;
    if let Some(run_dir) = &layout.run_directory {
        if sampler.output_raw {
            let path = run_dir.join(&sampler.output.raw_file);
            state.chain.write_table(&path)?;
            raw_path = Some(path);
        }
        if sampler.output_thinned && sampler.thinning.enabled {
            let path = run_dir.join(&sampler.output.thinned_file);
            chain::write_records(&path, state.chain.names(), &thinned)?;
            thinned_path = Some(path);
        }
        let relative = |path: &Option<PathBuf>| {
            path.as_ref()
                .and_then(|p| p.strip_prefix(run_dir).ok())
                .map(Path::to_path_buf)
        };
        let manifest = RunManifest {
            config: config.clone(),
            provenance: manifest::provenance(config, state.master_seed)?,
            betas: state.ladder.betas().to_vec(),
            thinning_stride: stride,
            raw_samples: relative(&raw_path),
            thinned_samples: relative(&thinned_path),
            checkpoints: checkpoints
                .iter()
                .filter_map(|path| path.strip_prefix(run_dir).ok().map(Path::to_path_buf))
                .collect(),
        };
        let path = run_dir.join(&sampler.output.manifest_file);
        manifest.write(&path)?;
        manifest_path = Some(path);
    }

    info!(
        iterations = state.iteration,
        raw_samples = state.chain.len(),
        thinned_samples = thinned.len(),
        "sampler finished"
    );
    Ok(RunSummary {
        master_seed: state.master_seed,
        iterations: state.iteration,
        acceptance_rates: state.stats.acceptance_by_kind(),
        level_acceptance: state.stats.level_acceptance(),
        swap_acceptance: state.ladder.acceptance_rates(),
        betas: state.ladder.betas().to_vec(),
        convergence: estimate,
        thinning_stride: stride,
        raw_samples: state.chain.len(),
        thinned_samples: thinned.len(),
        final_walkers: state.levels,
        chain: state.chain,
        raw_path,
        thinned_path,
        manifest_path,
        checkpoints,
    })
}

#[derive(Default)]
struct ResolvedOutput {
    run_directory: Option<PathBuf>,
    checkpoint_dir: Option<PathBuf>,
}

fn resolve_output_paths(config: &OutputConfig) -> ResolvedOutput {
    match &config.run_directory {
        None => ResolvedOutput::default(),
        Some(run_dir) => ResolvedOutput {
            run_directory: Some(run_dir.clone()),
            checkpoint_dir: Some(run_dir.join(&config.checkpoint_dir)),
        },
    }
}
