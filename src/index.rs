//! [`RegionIndex`]: the deduplicated collection of live regions, keyed by
//! their coordinate-set identity, with a per-cell reverse index and a dirty
//! set of regions changed since the last drain.
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::region::{Area, Contradiction, Region};
use crate::Coord;

/// Mutable bounds of a stored region; the immutable coordinate set lives in
/// the map key, so tightening a bound never disturbs region identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bounds {
    min: usize,
    max: usize,
}

/// What [`RegionIndex::add`] did with the offered region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Added {
    /// The region said nothing beyond its cardinality and was discarded.
    Unhelpful,
    /// A same-area region already existed; bounds were narrowed (or not).
    Merged { tightened: bool },
    /// No same-area region existed; the region is now live.
    Inserted,
}

/// A deduplicated set of live [`Region`]s.
///
/// `contents` owns every region (area key, mutable bounds value);
/// `cell_index` maps each coordinate to the areas covering it, holding
/// lookup-only handle clones, never ownership; `dirty` is the subset changed
/// since the last [`RegionIndex::take_dirty`] and is the fixed-point loop's
/// sole signal of what to re-examine.
#[derive(Debug, Clone, Default)]
pub struct RegionIndex {
    contents: HashMap<Area, Bounds>,
    cell_index: HashMap<Coord, HashSet<Area>>,
    dirty: HashSet<Area>,
}

impl RegionIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.contents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Add a region, deduplicating by area.
    ///
    /// Unhelpful regions are discarded. A same-area region already present
    /// absorbs the new bounds via merge and is marked dirty only if a bound
    /// actually tightened; otherwise the region is inserted, registered in
    /// the cell index, and marked dirty. Merging same-area regions with
    /// incompatible bounds is a [`Contradiction`].
    pub fn add(&mut self, region: Region) -> Result<Added, Contradiction> {
        if !region.is_helpful() {
            return Ok(Added::Unhelpful);
        }
        let (area, min, max) = region.into_parts();
        if let Some(bounds) = self.contents.get_mut(&area) {
            let merged = Bounds {
                min: bounds.min.max(min),
                max: bounds.max.min(max),
            };
            if merged.min > merged.max {
                return Err(Contradiction("same-area regions with incompatible bounds"));
            }
            let tightened = merged != *bounds;
            if tightened {
                *bounds = merged;
                self.dirty.insert(area);
            }
            return Ok(Added::Merged { tightened });
        }
        for &cell in area.iter() {
            self.cell_index
                .entry(cell)
                .or_default()
                .insert(Rc::clone(&area));
        }
        self.contents.insert(Rc::clone(&area), Bounds { min, max });
        self.dirty.insert(area);
        Ok(Added::Inserted)
    }

    /// Remove a region by its area handle, deregistering it from every cell
    /// index entry. Returns the removed region, if it was live.
    pub fn remove(&mut self, area: &Area) -> Option<Region> {
        let bounds = self.contents.remove(area)?;
        for cell in area.iter() {
            if let Some(covering) = self.cell_index.get_mut(cell) {
                covering.remove(area);
                if covering.is_empty() {
                    self.cell_index.remove(cell);
                }
            }
        }
        self.dirty.remove(area);
        Some(self.materialize(Rc::clone(area), bounds))
    }

    /// Snapshot of the live region stored under `area`.
    #[must_use]
    pub(crate) fn get(&self, area: &Area) -> Option<Region> {
        let bounds = self.contents.get(area)?;
        Some(self.materialize(Rc::clone(area), *bounds))
    }

    /// Snapshots of every live region.
    pub fn regions(&self) -> impl Iterator<Item = Region> + '_ {
        self.contents
            .iter()
            .map(|(area, &bounds)| self.materialize(Rc::clone(area), bounds))
    }

    /// Snapshots of every live region covering `cell`.
    #[must_use]
    pub fn regions_at(&self, cell: Coord) -> Vec<Region> {
        self.cell_index
            .get(&cell)
            .into_iter()
            .flatten()
            .filter_map(|area| self.get(area))
            .collect()
    }

    /// Candidate set for pairwise algebra: every live region sharing at
    /// least one cell with `region`, excluding its own area. Collected from
    /// the cell index rather than a scan of all live regions; this is what
    /// keeps the fixed-point loop tractable as the region count grows.
    #[must_use]
    pub fn regions_intersecting(&self, region: &Region) -> Vec<Region> {
        let mut areas: HashSet<&Area> = HashSet::new();
        for cell in region.cells() {
            if let Some(covering) = self.cell_index.get(&cell) {
                areas.extend(covering.iter().filter(|area| *area != region.area()));
            }
        }
        areas
            .into_iter()
            .filter_map(|area| self.get(area))
            .collect()
    }

    /// The board has revealed `cell` to be safe: update every region
    /// covering it. Each is removed, shrunk, and re-added, which naturally
    /// re-merges, re-deduplicates, and re-marks dirty.
    pub fn remove_safe(&mut self, cell: Coord) -> Result<(), Contradiction> {
        self.remove_resolved(cell, |region| region.remove_safe(cell).map(|_| ()))
    }

    /// The board has confirmed `cell` to be a mine: update every region
    /// covering it.
    pub fn remove_bomb(&mut self, cell: Coord) -> Result<(), Contradiction> {
        self.remove_resolved(cell, |region| region.remove_bomb(cell).map(|_| ()))
    }

    fn remove_resolved(
        &mut self,
        cell: Coord,
        mut shrink: impl FnMut(&mut Region) -> Result<(), Contradiction>,
    ) -> Result<(), Contradiction> {
        let touching: Vec<Area> = self
            .cell_index
            .get(&cell)
            .map(|covering| covering.iter().cloned().collect())
            .unwrap_or_default();
        for area in touching {
            // A prior re-add in this loop may have merged the area away.
            let Some(mut region) = self.remove(&area) else {
                continue;
            };
            shrink(&mut region)?;
            self.add(region)?;
        }
        Ok(())
    }

    /// Drain the dirty set, materializing the regions still live. The
    /// fixed-point loop must not rescan unchanged regions; this is its only
    /// view of what changed.
    pub fn take_dirty(&mut self) -> Vec<Region> {
        let drained: Vec<Area> = self.dirty.drain().collect();
        drained
            .into_iter()
            .filter_map(|area| self.get(&area))
            .collect()
    }

    #[must_use]
    pub fn has_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Discard every region and every index entry. Used when a contradiction
    /// makes the whole incremental state untrustworthy.
    pub fn clear(&mut self) {
        self.contents.clear();
        self.cell_index.clear();
        self.dirty.clear();
    }

    fn materialize(&self, area: Area, bounds: Bounds) -> Region {
        Region::from_area(area, bounds.min, bounds.max)
            .expect("stored bounds are validated on entry")
    }

    /// Structural invariant, checked by tests: every region is registered in
    /// the cell index for exactly its own cells.
    #[cfg(test)]
    fn check_invariants(&self) {
        for (area, _) in &self.contents {
            for cell in area.iter() {
                assert!(
                    self.cell_index[cell].contains(area),
                    "region missing from cell index at {cell}",
                );
            }
        }
        for (cell, covering) in &self.cell_index {
            assert!(!covering.is_empty());
            for area in covering {
                assert!(
                    self.contents.contains_key(area),
                    "cell index at {cell} references a dead region",
                );
            }
        }
        for area in &self.dirty {
            assert!(self.contents.contains_key(area), "dirty set references a dead region");
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn coords(cells: &[(usize, usize)]) -> Vec<Coord> {
        cells.iter().map(|&(r, c)| Coord::new(r, c)).collect()
    }

    fn region(cells: &[(usize, usize)], min: usize, max: usize) -> Region {
        Region::new(coords(cells), min, max).unwrap()
    }

    #[test]
    fn add_deduplicates_same_area() {
        let mut index = RegionIndex::new();
        assert_eq!(
            index.add(region(&[(0, 0), (0, 1)], 0, 1)).unwrap(),
            Added::Inserted,
        );
        assert_eq!(
            index.add(region(&[(0, 1), (0, 0)], 1, 2)).unwrap(),
            Added::Merged { tightened: true },
        );
        assert_eq!(index.len(), 1);
        let merged = index.regions().next().unwrap();
        assert_eq!((merged.min(), merged.max()), (1, 1));
        index.check_invariants();
    }

    #[test]
    fn add_without_new_information_is_not_dirtying() {
        let mut index = RegionIndex::new();
        index.add(region(&[(0, 0), (0, 1)], 1, 1)).unwrap();
        index.take_dirty();
        assert_eq!(
            index.add(region(&[(0, 0), (0, 1)], 0, 1)).unwrap(),
            Added::Merged { tightened: false },
        );
        assert!(!index.has_dirty());
    }

    #[test]
    fn add_discards_unhelpful_regions() {
        let mut index = RegionIndex::new();
        assert_eq!(
            index.add(region(&[(0, 0), (0, 1)], 0, 2)).unwrap(),
            Added::Unhelpful,
        );
        assert!(index.is_empty());
    }

    #[test]
    fn merging_incompatible_bounds_contradicts() {
        let mut index = RegionIndex::new();
        index.add(region(&[(0, 0), (0, 1), (0, 2)], 0, 1)).unwrap();
        assert!(index.add(region(&[(0, 0), (0, 1), (0, 2)], 2, 3)).is_err());
    }

    #[test]
    fn cell_index_tracks_membership() {
        let mut index = RegionIndex::new();
        index.add(region(&[(0, 0), (0, 1)], 1, 1)).unwrap();
        index.add(region(&[(0, 1), (0, 2)], 0, 1)).unwrap();
        assert_eq!(index.regions_at(Coord::new(0, 1)).len(), 2);
        assert_eq!(index.regions_at(Coord::new(0, 0)).len(), 1);
        assert_eq!(index.regions_at(Coord::new(9, 9)).len(), 0);
        index.check_invariants();
    }

    #[test]
    fn regions_intersecting_uses_the_cell_index() {
        let mut index = RegionIndex::new();
        index.add(region(&[(0, 0), (0, 1)], 1, 1)).unwrap();
        index.add(region(&[(0, 1), (0, 2)], 0, 1)).unwrap();
        index.add(region(&[(5, 5), (5, 6)], 1, 1)).unwrap();
        let probe = region(&[(0, 1)], 0, 0);
        let hits = index.regions_intersecting(&probe);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|r| r.contains(Coord::new(0, 1))));
    }

    #[test]
    fn remove_deregisters_everywhere() {
        let mut index = RegionIndex::new();
        index.add(region(&[(0, 0), (0, 1)], 1, 1)).unwrap();
        let area = Rc::clone(index.regions().next().unwrap().area());
        let removed = index.remove(&area).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(index.is_empty());
        assert!(index.regions_at(Coord::new(0, 0)).is_empty());
        assert!(!index.has_dirty());
        index.check_invariants();
    }

    #[test]
    fn remove_safe_shrinks_and_requeues() {
        let mut index = RegionIndex::new();
        index.add(region(&[(0, 0), (0, 1)], 1, 1)).unwrap();
        index.take_dirty();
        index.remove_safe(Coord::new(0, 0)).unwrap();
        let survivor = index.regions().next().unwrap();
        assert_eq!(survivor.len(), 1);
        assert!(survivor.all_mines());
        assert!(index.has_dirty());
        index.check_invariants();
    }

    #[test]
    fn remove_safe_from_all_mine_region_contradicts() {
        let mut index = RegionIndex::new();
        index.add(region(&[(0, 0)], 1, 1)).unwrap();
        assert!(index.remove_safe(Coord::new(0, 0)).is_err());
    }

    #[test]
    fn remove_bomb_resolves_counterpart_regions() {
        let mut index = RegionIndex::new();
        index.add(region(&[(0, 0), (0, 1), (0, 2)], 1, 1)).unwrap();
        index.remove_bomb(Coord::new(0, 1)).unwrap();
        let survivor = index.regions().next().unwrap();
        assert_eq!(survivor.len(), 2);
        assert!(survivor.all_safe());
        index.check_invariants();
    }

    #[test]
    fn removal_destroys_regions_that_become_uninformative() {
        let mut index = RegionIndex::new();
        index.add(region(&[(0, 0), (0, 1)], 1, 1)).unwrap();
        // Confirming the mine leaves [0,0] over one cell: still helpful.
        index.remove_bomb(Coord::new(0, 0)).unwrap();
        assert_eq!(index.len(), 1);
        // Opening the last safe cell leaves an empty region: destroyed.
        index.remove_safe(Coord::new(0, 1)).unwrap();
        assert!(index.is_empty());
        index.check_invariants();
    }

    #[test]
    fn take_dirty_drains() {
        let mut index = RegionIndex::new();
        index.add(region(&[(0, 0), (0, 1)], 1, 1)).unwrap();
        index.add(region(&[(3, 3), (3, 4)], 0, 1)).unwrap();
        assert_eq!(index.take_dirty().len(), 2);
        assert!(index.take_dirty().is_empty());
        index.add(region(&[(7, 7)], 1, 1)).unwrap();
        let dirty = index.take_dirty();
        assert_eq!(dirty.len(), 1);
        assert!(dirty[0].contains(Coord::new(7, 7)));
    }
}
