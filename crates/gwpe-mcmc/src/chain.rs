use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use gwpe_core::GwError;
use serde::{Deserialize, Serialize};

/// One recorded walker state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// Iteration index (burn-in included in the count).
    pub iteration: usize,
    /// Walker index within its level.
    pub walker: usize,
    /// Temperature level, 0 being the cold chain.
    pub temperature: usize,
    /// Wrapped position.
    pub position: Vec<f64>,
    /// Log-likelihood at `position`.
    #[serde(with = "crate::codec::extended_f64")]
    pub log_likelihood: f64,
    /// Log-prior at `position`.
    #[serde(with = "crate::codec::extended_f64")]
    pub log_prior: f64,
}

/// Append-only store of post-burn-in samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainStore {
    names: Vec<String>,
    n_walkers: usize,
    records: Vec<SampleRecord>,
}

impl ChainStore {
    /// Empty store for the given parameter names and ensemble size.
    pub fn new(names: Vec<String>, n_walkers: usize) -> Self {
        Self {
            names,
            n_walkers,
            records: Vec::new(),
        }
    }

    /// Appends one record.
    pub fn push(&mut self, record: SampleRecord) {
        self.records.push(record);
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Parameter names, in column order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Records in append order.
    pub fn records(&self) -> &[SampleRecord] {
        &self.records
    }

    /// Number of samples stored per walker at `level`.
    pub fn samples_per_walker(&self, level: usize) -> usize {
        self.records
            .iter()
            .filter(|record| record.temperature == level && record.walker == 0)
            .count()
    }

    /// Per-walker time series of dimension `dim` at `level`.
    pub fn walker_series(&self, level: usize, dim: usize) -> Vec<Vec<f64>> {
        let mut series = vec![Vec::new(); self.n_walkers];
        for record in self.records.iter().filter(|r| r.temperature == level) {
            if let (Some(line), Some(value)) =
                (series.get_mut(record.walker), record.position.get(dim))
            {
                line.push(*value);
            }
        }
        series
    }

    /// Thinned view: every `⌊stride/upsample⌋`-th sample (at least every
    /// sample) of each walker's sequence, keeping indices `k−1, 2k−1, …`.
    pub fn thinned(&self, stride: usize, upsample: usize) -> Vec<SampleRecord> {
        let step = effective_stride(stride, upsample);
        let mut seen: BTreeMap<(usize, usize), usize> = BTreeMap::new();
        let mut kept = Vec::new();
        for record in &self.records {
            let count = seen.entry((record.temperature, record.walker)).or_insert(0);
            *count += 1;
            if *count % step == 0 {
                kept.push(record.clone());
            }
        }
        kept
    }

    /// Writes every stored record as a CSV table.
    pub fn write_table(&self, path: &Path) -> Result<(), GwError> {
        write_records(path, &self.names, &self.records)
    }
}

/// Stride actually applied to the raw draws once upsampling is accounted for.
pub fn effective_stride(stride: usize, upsample: usize) -> usize {
    (stride / upsample.max(1)).max(1)
}

/// Writes `records` with header
/// `iteration,walker,temperature,<names…>,log_likelihood,log_prior`.
pub fn write_records(path: &Path, names: &[String], records: &[SampleRecord]) -> Result<(), GwError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| GwError::io("samples-mkdir", err, parent))?;
    }
    let mut wtr =
        csv::Writer::from_path(path).map_err(|err| GwError::io("samples-create", err, path))?;
    let header = ["iteration", "walker", "temperature"]
        .into_iter()
        .map(str::to_string)
        .chain(names.iter().cloned())
        .chain(["log_likelihood".to_string(), "log_prior".to_string()]);
    wtr.write_record(header)
        .map_err(|err| GwError::io("samples-write", err, path))?;
    for record in records {
        let row = [
            record.iteration.to_string(),
            record.walker.to_string(),
            record.temperature.to_string(),
        ]
        .into_iter()
        .chain(record.position.iter().map(f64::to_string))
        .chain([record.log_likelihood.to_string(), record.log_prior.to_string()]);
        wtr.write_record(row)
            .map_err(|err| GwError::io("samples-write", err, path))?;
    }
    wtr.flush()
        .map_err(|err| GwError::io("samples-write", err, path))
}
