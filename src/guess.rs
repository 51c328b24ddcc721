//! The probabilistic fallback: when no cell is logically certain, estimate
//! per-cell mine likelihood from the live regions, then break near-ties with
//! a bounded lookahead that measures how much new certainty each candidate
//! reveal would create.
use std::collections::HashSet;

use itertools::Itertools;
use log::trace;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::board::{Board, CellValue};
use crate::engine::propagate;
use crate::index::RegionIndex;
use crate::internal_util::{choose, choose_f};
use crate::region::{Contradiction, Region};
use crate::Coord;

/// How many random subtraction orders to sample when approximating the
/// bound on cells not covered by any known region.
const APPROX_SAMPLES: usize = 6;

/// Probability estimates within this distance of the minimum count as tied.
const PROBABILITY_EPSILON: f64 = 1e-6;

/// The lookahead is a tie-breaker, not a search: past this many tied
/// candidates it says nothing useful and the choice falls to the RNG.
const MAX_PAYOUT_CANDIDATES: usize = 8;

/// Flagging a mine is worth a little less than revealing a safe cell when
/// scoring lookahead outcomes.
const FLAG_PAYOUT_WEIGHT: f64 = 1.0 / 1.5;

/// What to do with the chosen cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GuessAction {
    Open,
    /// The lookahead proved every non-mine hypothesis impossible.
    Flag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Guess {
    pub at: Coord,
    pub action: GuessAction,
}

/// Choose the hidden cell a guess should act on, or `None` when nothing is
/// left to guess at.
pub(crate) fn pick(
    board: &Board,
    index: &RegionIndex,
    rng: &mut SmallRng,
) -> Result<Option<Guess>, Contradiction> {
    let hidden: Vec<Coord> = board.hidden_cells().sorted().collect();
    if hidden.is_empty() {
        return Ok(None);
    }
    let remaining = board
        .remaining_mines()
        .ok_or(Contradiction("more flags than mines on the board"))?;
    let flat = remaining as f64 / hidden.len() as f64;
    let uncharted = approx_remaining(index, &hidden, remaining, rng)?;

    let estimates: Vec<(Coord, f64)> = hidden
        .iter()
        .map(|&at| (at, cell_estimate(index, at, &uncharted, flat)))
        .collect();
    let best = estimates
        .iter()
        .map(|&(_, estimate)| estimate)
        .fold(f64::INFINITY, f64::min);
    let candidates: Vec<Coord> = estimates
        .iter()
        .filter(|&&(_, estimate)| estimate <= best + PROBABILITY_EPSILON)
        .map(|&(at, _)| at)
        .collect();

    if candidates.len() > MAX_PAYOUT_CANDIDATES {
        trace!(
            "{} candidates tied at p={best:.3}; skipping lookahead",
            candidates.len(),
        );
        let at = candidates[rng.random_range(0..candidates.len())];
        return Ok(Some(Guess {
            at,
            action: GuessAction::Open,
        }));
    }

    let mut scored = Vec::with_capacity(candidates.len());
    for &at in &candidates {
        match expected_payout(board, index, at, remaining) {
            Some(payout) => scored.push((at, payout)),
            None => {
                // Only "is a mine" survived the hypothesis sweep.
                return Ok(Some(Guess {
                    at,
                    action: GuessAction::Flag,
                }));
            },
        }
    }
    let best_payout = scored
        .iter()
        .map(|&(_, payout)| payout)
        .fold(f64::NEG_INFINITY, f64::max);
    let winners: Vec<Coord> = scored
        .iter()
        .filter(|&&(_, payout)| payout >= best_payout - PROBABILITY_EPSILON)
        .map(|&(at, _)| at)
        .collect();
    let at = winners[rng.random_range(0..winners.len())];
    trace!("guessing {at} at p={best:.3}, payout {best_payout:.2}");
    Ok(Some(Guess {
        at,
        action: GuessAction::Open,
    }))
}

/// Approximate the bound on cells not covered by any known region.
///
/// Folding `subtract` over the live regions in different orders yields the
/// same leftover cell set but different (all sound) bounds; a handful of
/// random permutations merged together approximates the tight bound without
/// the exponential cost of exact enumeration.
fn approx_remaining(
    index: &RegionIndex,
    hidden: &[Coord],
    remaining: usize,
    rng: &mut SmallRng,
) -> Result<Region, Contradiction> {
    let global = Region::exact(hidden.iter().copied(), remaining)?;
    let mut live: Vec<Region> = index.regions().collect();
    if live.is_empty() {
        return Ok(global);
    }
    let mut folded: Option<Region> = None;
    for _ in 0..APPROX_SAMPLES {
        live.shuffle(rng);
        let mut acc = global.clone();
        for region in &live {
            if acc.overlap(region) == 0 {
                continue;
            }
            acc = acc.subtract(region)?;
        }
        folded = Some(match folded {
            None => acc,
            Some(previous) => previous.merge(&acc)?,
        });
    }
    Ok(folded.expect("at least one sample was taken"))
}

/// Worst-case mine likelihood for one hidden cell: the average bound implied
/// by the smallest (most informative) regions covering it, falling back to
/// the uncharted approximation, then to the flat remaining/hidden ratio.
fn cell_estimate(index: &RegionIndex, at: Coord, uncharted: &Region, flat: f64) -> f64 {
    let covering = index.regions_at(at);
    if covering.is_empty() {
        return if uncharted.contains(at) {
            bound_estimate(uncharted)
        } else {
            flat
        };
    }
    let smallest = covering
        .iter()
        .map(Region::len)
        .min()
        .expect("covering is non-empty");
    let (total, count) = covering
        .iter()
        .filter(|region| region.len() == smallest)
        .fold((0.0, 0usize), |(total, count), region| {
            (total + bound_estimate(region), count + 1)
        });
    total / count as f64
}

fn bound_estimate(region: &Region) -> f64 {
    (region.min() + region.max()) as f64 / (2.0 * region.len() as f64)
}

/// Expected information gain of opening `at`, or `None` when every clue
/// hypothesis contradicts the known regions (which proves `at` is a mine).
///
/// For each clue value the cell could show, a deep copy of the index learns
/// "`at` is safe" plus "exactly `n` of its unknown neighbors are mines", is
/// run to its fixed point, and is scored by how many cells became certain.
/// Each hypothesis is weighted by the number of mine placements consistent
/// with it: `C(k, n)` arrangements among the `k` unknown neighbors times
/// `C(H − k, M − n)` arrangements of the remaining mines elsewhere.
fn expected_payout(
    board: &Board,
    index: &RegionIndex,
    at: Coord,
    remaining: usize,
) -> Option<f64> {
    let neighbors: Vec<Coord> = board
        .neighbors(at)
        .filter(|&nb| {
            matches!(
                board.get(nb),
                Some(CellValue::Hidden | CellValue::Questioned),
            )
        })
        .collect();
    let k = neighbors.len();
    let elsewhere = board.hidden_cells().count() - 1 - k;

    let mut total_weight = 0.0;
    let mut weighted_payout = 0.0;
    for n in 0..=k {
        let Some(mines_elsewhere) = remaining.checked_sub(n) else {
            break;
        };
        let weight = choose(k, n) as f64 * choose_f(elsewhere, mines_elsewhere);
        if weight <= 0.0 {
            continue;
        }
        let Ok(resolved) = hypothesize(index, at, &neighbors, n) else {
            continue;
        };
        total_weight += weight;
        weighted_payout += weight * resolved;
    }
    (total_weight > 0.0).then(|| weighted_payout / total_weight)
}

/// Score one hypothetical reveal on a deep copy of the index: the count of
/// cells that would become certainly safe, plus certain mines at
/// [`FLAG_PAYOUT_WEIGHT`].
fn hypothesize(
    index: &RegionIndex,
    at: Coord,
    neighbors: &[Coord],
    n: usize,
) -> Result<f64, Contradiction> {
    let mut speculative = index.clone();
    speculative.remove_safe(at)?;
    speculative.add(Region::exact(neighbors.iter().copied(), n)?)?;
    propagate(&mut speculative, false)?;
    let mut safe = HashSet::new();
    let mut mines = HashSet::new();
    for region in speculative.regions() {
        if region.all_safe() {
            safe.extend(region.cells());
        } else if region.all_mines() {
            mines.extend(region.cells());
        }
    }
    Ok(safe.len() as f64 + mines.len() as f64 * FLAG_PAYOUT_WEIGHT)
}
