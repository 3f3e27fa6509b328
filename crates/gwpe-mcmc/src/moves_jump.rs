use std::collections::BTreeMap;

use gwpe_core::{GwError, LikelihoodModel, RngHandle};

use crate::ensemble::{tempered_delta, Target, Walker};
use crate::moves_stretch::Proposal;

/// Chosen teleport destination in the complementary half.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JumpTarget {
    /// Index of the destination walker within the complementary slice.
    pub index: usize,
    /// Mode id of the destination walker.
    pub mode: usize,
    /// `ln q(y→x) − ln q(x→y)`; `-inf` when the reverse jump is impossible.
    pub log_proposal_ratio: f64,
}

/// Picks a walker with a different mode id to jump onto.
///
/// The target mode is uniform over the distinct foreign modes present in
/// `complementary`, then the walker is uniform within that mode. Returns
/// `None` when every complementary walker shares `mode`.
pub fn choose_target(
    mode: usize,
    complementary: &[Walker],
    rng: &mut RngHandle,
) -> Option<JumpTarget> {
    let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (index, walker) in complementary.iter().enumerate() {
        members.entry(walker.mode).or_default().push(index);
    }
    let foreign: Vec<usize> = members.keys().copied().filter(|m| *m != mode).collect();
    if foreign.is_empty() {
        return None;
    }
    let target_mode = foreign[rng.index(foreign.len())];
    let candidates = &members[&target_mode];
    let index = candidates[rng.index(candidates.len())];

    let n_target = candidates.len() as f64;
    let n_origin = members.get(&mode).map_or(0, Vec::len);
    let log_proposal_ratio = if n_origin == 0 {
        f64::NEG_INFINITY
    } else {
        // Reverse jumps choose among the same number of foreign modes.
        let forward_modes = foreign.len() as f64;
        let reverse_modes = members.keys().filter(|m| **m != target_mode).count() as f64;
        forward_modes.ln() + n_target.ln() - reverse_modes.ln() - (n_origin as f64).ln()
    };
    Some(JumpTarget {
        index,
        mode: target_mode,
        log_proposal_ratio,
    })
}

/// Proposes teleporting `walker` onto a complementary walker of another mode.
///
/// `Ok(None)` signals that no foreign mode is present and a stretch move
/// should be made instead. An accepted candidate carries the new mode id.
pub fn propose<L: LikelihoodModel + ?Sized>(
    target: &Target<'_, L>,
    beta: f64,
    walker: &Walker,
    complementary: &[Walker],
    rng: &mut RngHandle,
) -> Result<Option<Proposal>, GwError> {
    let Some(jump) = choose_target(walker.mode, complementary, rng) else {
        return Ok(None);
    };
    let destination = &complementary[jump.index];
    let candidate = target.walker(destination.position.clone(), jump.mode)?;
    let log_alpha = if candidate.log_prior == f64::NEG_INFINITY {
        f64::NEG_INFINITY
    } else {
        tempered_delta(beta, candidate.log_likelihood, walker.log_likelihood)
            + (candidate.log_prior - walker.log_prior)
            + jump.log_proposal_ratio
    };
    Ok(Some(Proposal {
        candidate,
        log_alpha,
    }))
}
