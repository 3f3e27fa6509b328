use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Kind of in-level move performed by the sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MoveKind {
    /// Affine-invariant stretch move.
    Stretch,
    /// Teleport onto a walker of another mode.
    ModeJump,
}

impl MoveKind {
    /// Stable label used in summaries and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveKind::Stretch => "stretch",
            MoveKind::ModeJump => "mode-jump",
        }
    }
}

/// Proposed/accepted counters for one move kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCounter {
    /// Proposals made.
    pub proposed: u64,
    /// Proposals accepted.
    pub accepted: u64,
}

impl MoveCounter {
    fn rate(&self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            self.accepted as f64 / self.proposed as f64
        }
    }

    fn absorb(&mut self, other: &MoveCounter) {
        self.proposed += other.proposed;
        self.accepted += other.accepted;
    }
}

/// Move counters for one temperature level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelTally {
    /// Stretch-move counters.
    pub stretch: MoveCounter,
    /// Mode-jump counters.
    pub mode_jump: MoveCounter,
}

impl LevelTally {
    /// Counts one resolved proposal.
    pub fn record(&mut self, kind: MoveKind, accepted: bool) {
        let counter = match kind {
            MoveKind::Stretch => &mut self.stretch,
            MoveKind::ModeJump => &mut self.mode_jump,
        };
        counter.proposed += 1;
        if accepted {
            counter.accepted += 1;
        }
    }

    /// Acceptance over both move kinds.
    pub fn acceptance(&self) -> f64 {
        let mut total = self.stretch;
        total.absorb(&self.mode_jump);
        total.rate()
    }
}

/// Acceptance statistics across all levels of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveStats {
    levels: Vec<LevelTally>,
}

impl MoveStats {
    /// Empty counters for `n_levels` levels.
    pub fn new(n_levels: usize) -> Self {
        Self {
            levels: vec![LevelTally::default(); n_levels],
        }
    }

    /// Adds one iteration's tally for `level`.
    pub fn merge(&mut self, level: usize, tally: &LevelTally) {
        if let Some(entry) = self.levels.get_mut(level) {
            entry.stretch.absorb(&tally.stretch);
            entry.mode_jump.absorb(&tally.mode_jump);
        }
    }

    /// Raw per-level counters.
    pub fn levels(&self) -> &[LevelTally] {
        &self.levels
    }

    /// Acceptance rate per level, coldest first.
    pub fn level_acceptance(&self) -> Vec<f64> {
        self.levels.iter().map(LevelTally::acceptance).collect()
    }

    /// Acceptance rate per move kind, pooled over levels.
    pub fn acceptance_by_kind(&self) -> BTreeMap<String, f64> {
        let mut stretch = MoveCounter::default();
        let mut jump = MoveCounter::default();
        for level in &self.levels {
            stretch.absorb(&level.stretch);
            jump.absorb(&level.mode_jump);
        }
        let mut rates = BTreeMap::new();
        rates.insert(MoveKind::Stretch.as_str().to_string(), stretch.rate());
        rates.insert(MoveKind::ModeJump.as_str().to_string(), jump.rate());
        rates
    }
}
