//! The [`Region`] value type: a set of board coordinates plus an inclusive
//! `[min, max]` bound on how many of them are mines, and the closed-form
//! algebra that combines two regions into new ones.
use std::fmt;
use std::rc::Rc;

use frozenset::FrozenSet;

use crate::Coord;

/// A combination of known facts that is mathematically impossible.
///
/// Raised whenever a region computation would produce `min > max` or
/// `max > |cells|`. In a running game this signals either an unsound prior
/// deduction or, far more commonly, a manually forced move that was wrong.
/// It is never clamped away; callers decide whether to heal or to fail.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct Contradiction(pub &'static str);
impl fmt::Display for Contradiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "contradiction: {}", self.0)
    }
}
impl std::error::Error for Contradiction {
}

/// Shared, immutable coordinate set of a region.
///
/// Set equality/hashing of the frozen set is the "same area" identity used
/// for deduplication; the `Rc` makes areas cheap to hand around as opaque
/// handles inside [`crate::RegionIndex`].
pub(crate) type Area = Rc<FrozenSet<Coord>>;

/// Outcome of removing a single resolved cell from a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    NotPresent,
}

/// A set of cells together with an inclusive bound on the number of mines
/// among them.
///
/// Invariant: `0 <= min <= max <= |cells|`. Constructors and every algebra
/// operation enforce it, reporting a [`Contradiction`] instead of ever
/// producing an unreasonable region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    cells: Area,
    min: usize,
    max: usize,
}

// Construction and accessors.
impl Region {
    /// Build a region from a bound and an iterable of cells (duplicates
    /// collapse in the set).
    pub fn new(
        cells: impl IntoIterator<Item = Coord>,
        min: usize,
        max: usize,
    ) -> Result<Self, Contradiction> {
        Self::from_area(Rc::new(cells.into_iter().collect()), min, max)
    }

    /// Build a region with an exact mine count, the shape every clue-derived
    /// base region takes.
    pub fn exact(
        cells: impl IntoIterator<Item = Coord>,
        count: usize,
    ) -> Result<Self, Contradiction> {
        Self::new(cells, count, count)
    }

    pub(crate) fn from_area(
        cells: Area,
        min: usize,
        max: usize,
    ) -> Result<Self, Contradiction> {
        if min > max {
            return Err(Contradiction("region lower bound exceeds upper bound"));
        }
        if max > cells.len() {
            return Err(Contradiction("region requires more mines than it has cells"));
        }
        Ok(Self { cells, min, max })
    }

    pub(crate) fn area(&self) -> &Area {
        &self.cells
    }

    pub(crate) fn into_parts(self) -> (Area, usize, usize) {
        (self.cells, self.min, self.max)
    }

    pub fn cells(&self) -> impl Iterator<Item = Coord> + '_ {
        self.cells.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[must_use]
    pub fn min(&self) -> usize {
        self.min
    }

    #[must_use]
    pub fn max(&self) -> usize {
        self.max
    }

    #[must_use]
    pub fn contains(&self, cell: Coord) -> bool {
        self.cells.contains(&cell)
    }

    /// Two regions cover the same area when their coordinate sets are equal;
    /// bounds play no part in identity.
    #[must_use]
    pub fn same_area(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cells, &other.cells) || self.cells == other.cells
    }

    /// Number of cells shared with `other`.
    #[must_use]
    pub fn overlap(&self, other: &Self) -> usize {
        // Probe the smaller set against the larger one.
        let (probe, against) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        probe
            .cells
            .iter()
            .copied()
            .filter(|cell| against.cells.contains(cell))
            .count()
    }

    /// A region is helpful while its bounds say more than its cardinality
    /// alone would: `[0, |cells|]` constrains nothing and is pruned.
    #[must_use]
    pub fn is_helpful(&self) -> bool {
        !(self.min == 0 && self.max == self.cells.len())
    }

    /// Every cell is a mine.
    #[must_use]
    pub fn all_mines(&self) -> bool {
        !self.is_empty() && self.min == self.cells.len()
    }

    /// No cell is a mine.
    #[must_use]
    pub fn all_safe(&self) -> bool {
        !self.is_empty() && self.max == 0
    }
}

// The algebra. Operands are assumed reasonable; each operation derives the
// tightest bound it can justify from the operands' own bounds and reports a
// `Contradiction` when the result would be unreasonable.
impl Region {
    /// Cells in both regions.
    ///
    /// With `s = |A∩B|`, the intersection can hold at most
    /// `min(A.max, B.max, s)` mines. At most `|A| - s` of A's required mines
    /// fit outside the intersection, so at least `A.min - (|A| - s)` must lie
    /// inside it; the lower bound takes the tighter of that derivation and
    /// B's symmetric one.
    pub fn intersect(&self, other: &Self) -> Result<Self, Contradiction> {
        let common: FrozenSet<Coord> = self
            .cells
            .iter()
            .copied()
            .filter(|cell| other.cells.contains(cell))
            .collect();
        let s = common.len();
        let max = self.max.min(other.max).min(s);
        let min = self
            .min
            .saturating_sub(self.len() - s)
            .max(other.min.saturating_sub(other.len() - s));
        Self::from_area(Rc::new(common), min, max)
    }

    /// Cells in either region.
    ///
    /// Mines are additive minus whatever the overlap double-counts: the
    /// overlap's contribution is bounded above by the mines each operand can
    /// force into it and below by how many the overlap can structurally
    /// absorb from both.
    pub fn unite(&self, other: &Self) -> Result<Self, Contradiction> {
        let cells: FrozenSet<Coord> = self
            .cells
            .iter()
            .chain(other.cells.iter())
            .copied()
            .collect();
        let common = self.len() + other.len() - cells.len();
        let forced_by_self = self.max.saturating_sub(self.len() - common);
        let forced_by_other = other.max.saturating_sub(other.len() - common);
        let max = (self.max + other.max - forced_by_self)
            .min(self.max + other.max - forced_by_other)
            .min(cells.len());
        let min = self.min + other.min - self.min.min(other.min).min(common);
        Self::from_area(Rc::new(cells), min, max)
    }

    /// Cells in `self` but not in `other`.
    ///
    /// The overlap's mine count is bracketed using `other`'s bounds alone
    /// (assuming nothing about `other`'s exclusive cells) and subtracted from
    /// `self`'s. This is the most failure-prone operation: an unreasonable
    /// result here is the usual way a wrong flag first surfaces.
    pub fn subtract(&self, other: &Self) -> Result<Self, Contradiction> {
        let cells: FrozenSet<Coord> = self
            .cells
            .iter()
            .copied()
            .filter(|cell| !other.cells.contains(cell))
            .collect();
        let s = self.len() - cells.len();
        let overlap_at_least = other.min.saturating_sub(other.len() - s);
        let overlap_at_most = other.max.min(s);
        let max = self
            .max
            .checked_sub(overlap_at_least)
            .ok_or(Contradiction("subtrahend requires more mines than the region holds"))?
            .min(cells.len());
        let min = self.min.saturating_sub(overlap_at_most);
        Self::from_area(Rc::new(cells), min, max)
    }

    /// Fold two same-area regions into one that keeps the narrower bound in
    /// each direction. Only defined for regions covering the same area.
    pub fn merge(&self, other: &Self) -> Result<Self, Contradiction> {
        debug_assert!(self.same_area(other), "merge requires same-area regions");
        Self::from_area(
            Rc::clone(&self.cells),
            self.min.max(other.min),
            self.max.min(other.max),
        )
    }

    /// Remove a cell the board has revealed to be a mine.
    ///
    /// Both bounds drop by one. Removing a mine from a region whose `max` is
    /// zero is a [`Contradiction`]; the region is left untouched.
    pub fn remove_bomb(&mut self, bomb: Coord) -> Result<Removal, Contradiction> {
        if !self.cells.contains(&bomb) {
            return Ok(Removal::NotPresent);
        }
        if self.max == 0 {
            return Err(Contradiction("mine found in a region that can hold none"));
        }
        self.cells = Rc::new(self.cells.iter().copied().filter(|&c| c != bomb).collect());
        self.max -= 1;
        self.min = self.min.saturating_sub(1);
        Ok(Removal::Removed)
    }

    /// Remove a cell the board has revealed to be safe.
    ///
    /// Removing a safe cell from a region whose `min` equals its size (every
    /// cell a mine) is a [`Contradiction`]; the region is left untouched.
    pub fn remove_safe(&mut self, safe: Coord) -> Result<Removal, Contradiction> {
        if !self.cells.contains(&safe) {
            return Ok(Removal::NotPresent);
        }
        if self.min == self.cells.len() {
            return Err(Contradiction("safe cell found in a region of all mines"));
        }
        self.cells = Rc::new(self.cells.iter().copied().filter(|&c| c != safe).collect());
        self.max = self.max.min(self.cells.len());
        Ok(Removal::Removed)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}] over {} cells", self.min, self.max, self.len())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn coords(cells: &[(usize, usize)]) -> Vec<Coord> {
        cells.iter().map(|&(r, c)| Coord::new(r, c)).collect()
    }

    fn region(cells: &[(usize, usize)], min: usize, max: usize) -> Region {
        Region::new(coords(cells), min, max).unwrap()
    }

    #[test]
    fn construction_rejects_unreasonable_bounds() {
        assert!(Region::new(coords(&[(0, 0), (0, 1)]), 2, 1).is_err());
        assert!(Region::new(coords(&[(0, 0)]), 0, 2).is_err());
        assert!(Region::exact(coords(&[(0, 0)]), 2).is_err());
    }

    #[test]
    fn same_area_ignores_bounds() {
        let a = region(&[(0, 0), (1, 1)], 0, 1);
        let b = region(&[(1, 1), (0, 0)], 1, 2);
        assert!(a.same_area(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn intersect_is_commutative() {
        let a = region(&[(0, 0), (0, 1), (0, 2)], 1, 2);
        let b = region(&[(0, 1), (0, 2), (0, 3)], 1, 1);
        assert_eq!(a.intersect(&b).unwrap(), b.intersect(&a).unwrap());
    }

    #[test]
    fn intersect_tightens_bounds() {
        // A needs 2 mines in 3 cells, only one of which is outside B: at
        // least one mine sits in the overlap.
        let a = region(&[(0, 0), (0, 1), (0, 2)], 2, 2);
        let b = region(&[(0, 1), (0, 2), (0, 3)], 1, 1);
        let i = a.intersect(&b).unwrap();
        assert_eq!(i.len(), 2);
        assert_eq!((i.min(), i.max()), (1, 1));
    }

    #[test]
    fn intersect_of_incompatible_same_area_contradicts() {
        let a = region(&[(0, 0), (0, 1)], 2, 2);
        let b = region(&[(0, 0), (0, 1)], 0, 0);
        assert!(a.intersect(&b).is_err());
    }

    #[test]
    fn subtract_self_is_empty() {
        let a = region(&[(0, 0), (0, 1), (0, 2)], 1, 2);
        let d = a.subtract(&a).unwrap();
        assert_eq!(d.len(), 0);
        assert_eq!((d.min(), d.max()), (0, 0));
    }

    #[test]
    fn subtract_of_subregion() {
        // The 1-2-1 step: the 2-clue minus a flanking 1-clue pins the far
        // cell as a mine.
        let b = region(&[(0, 0), (0, 1), (0, 2)], 2, 2);
        let a = region(&[(0, 0), (0, 1)], 1, 1);
        let d = b.subtract(&a).unwrap();
        assert_eq!(d.len(), 1);
        assert!(d.all_mines());
    }

    #[test]
    fn subtract_detects_contradiction() {
        // B forces two mines into the overlap, but A can hold at most one
        // mine in total.
        let a = region(&[(0, 0), (0, 1)], 0, 1);
        let b = region(&[(0, 0), (0, 1)], 2, 2);
        assert!(a.subtract(&b).is_err());
    }

    #[test]
    fn unite_with_self_is_identity() {
        let a = region(&[(0, 0), (0, 1), (0, 2)], 1, 2);
        assert_eq!(a.unite(&a).unwrap(), a);
    }

    #[test]
    fn unite_of_disjoint_regions_adds_bounds() {
        let a = region(&[(0, 0)], 1, 1);
        let b = region(&[(5, 5)], 1, 1);
        let u = a.unite(&b).unwrap();
        assert_eq!(u.len(), 2);
        assert_eq!((u.min(), u.max()), (2, 2));
    }

    #[test]
    fn merge_never_widens() {
        let a = region(&[(0, 0), (0, 1), (0, 2)], 0, 2);
        let b = region(&[(0, 0), (0, 1), (0, 2)], 1, 3);
        let m = a.merge(&b).unwrap();
        assert_eq!((m.min(), m.max()), (1, 2));
    }

    #[test]
    fn merge_of_disjoint_bounds_contradicts() {
        let a = region(&[(0, 0), (0, 1), (0, 2)], 0, 1);
        let b = region(&[(0, 0), (0, 1), (0, 2)], 2, 3);
        assert!(a.merge(&b).is_err());
    }

    #[test]
    fn remove_bomb_decrements_bounds() {
        let mut r = region(&[(0, 0), (0, 1), (0, 2)], 1, 2);
        assert_eq!(r.remove_bomb(Coord::new(0, 1)).unwrap(), Removal::Removed);
        assert_eq!(r.len(), 2);
        assert_eq!((r.min(), r.max()), (0, 1));
        assert_eq!(r.remove_bomb(Coord::new(9, 9)).unwrap(), Removal::NotPresent);
    }

    #[test]
    fn remove_bomb_from_safe_region_contradicts() {
        let mut r = region(&[(0, 0), (0, 1)], 0, 0);
        assert!(r.remove_bomb(Coord::new(0, 0)).is_err());
    }

    #[test]
    fn remove_safe_from_all_mine_region_contradicts() {
        let mut r = region(&[(0, 0), (0, 1)], 2, 2);
        assert!(r.remove_safe(Coord::new(0, 0)).is_err());
        // The failed removal must not have mutated the region.
        assert_eq!(r.len(), 2);
        assert_eq!((r.min(), r.max()), (2, 2));
    }

    #[test]
    fn remove_safe_clamps_max_to_new_size() {
        let mut r = region(&[(0, 0), (0, 1)], 1, 2);
        assert_eq!(r.remove_safe(Coord::new(0, 1)).unwrap(), Removal::Removed);
        assert_eq!((r.min(), r.max()), (1, 1));
        assert!(r.all_mines());
    }

    #[test]
    fn helpfulness() {
        assert!(!region(&[(0, 0), (0, 1)], 0, 2).is_helpful());
        assert!(region(&[(0, 0), (0, 1)], 1, 2).is_helpful());
        assert!(region(&[(0, 0), (0, 1)], 0, 1).is_helpful());
        assert!(!Region::exact(std::iter::empty(), 0).unwrap().is_helpful());
    }

    /// Random regions through random operation sequences never produce an
    /// unreasonable bound: either the operation reports a contradiction or
    /// its result satisfies `min <= max <= size`.
    #[test]
    fn soundness_under_random_algebra() {
        let mut rng = SmallRng::seed_from_u64(0x5EED);
        let random_region = |rng: &mut SmallRng| {
            let size = rng.random_range(1..=6);
            let cells: Vec<Coord> = (0..size)
                .map(|_| Coord::new(rng.random_range(0..4), rng.random_range(0..4)))
                .collect();
            let n = cells.iter().collect::<std::collections::HashSet<_>>().len();
            let max = rng.random_range(0..=n);
            let min = rng.random_range(0..=max);
            Region::new(cells, min, max).unwrap()
        };
        for round in 0..2000 {
            let a = random_region(&mut rng);
            let b = random_region(&mut rng);
            let results = [
                a.intersect(&b),
                b.intersect(&a),
                a.subtract(&b),
                b.subtract(&a),
                a.unite(&b),
                b.unite(&a),
            ];
            for r in results.into_iter().flatten() {
                assert!(
                    r.min() <= r.max() && r.max() <= r.len(),
                    "unsound region {r} in round {round} from {a} and {b}",
                );
            }
            if a.same_area(&b) {
                if let Ok(m) = a.merge(&b) {
                    assert!(m.min() >= a.min().max(b.min()));
                    assert!(m.max() <= a.max().min(b.max()));
                }
            }
        }
    }
}
