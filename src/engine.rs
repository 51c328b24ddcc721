//! The inference engine: seeds base regions from the board's visible clues,
//! combines overlapping regions to a fixed point, queues the cells that
//! became certain, and applies them to the board. Falls through to the
//! probabilistic guesser only when no certainty exists.
use std::collections::{HashSet, VecDeque};
use std::fmt;

use log::{debug, trace};
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::board::{Board, BoardError, CellValue, FlagState, GameState};
use crate::guess::{self, GuessAction};
use crate::index::RegionIndex;
use crate::region::{Contradiction, Region};
use crate::Coord;

/// Above this many hidden cells, the global "remaining mines over everything
/// hidden" region is withheld: it rarely tightens anything early on and its
/// overlap with every clue region makes the fixed point disproportionately
/// expensive.
const ENDGAME_REGION_LIMIT: usize = 32;

/// Anything the solver can fail with: an internal contradiction or a board
/// operation the grid itself rejected (the latter is propagated unchanged).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    Contradiction(Contradiction),
    Board(BoardError),
}
impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contradiction(c) => c.fmt(f),
            Self::Board(e) => e.fmt(f),
        }
    }
}
impl std::error::Error for EngineError {
}
impl From<Contradiction> for EngineError {
    fn from(c: Contradiction) -> Self {
        Self::Contradiction(c)
    }
}
impl From<BoardError> for EngineError {
    fn from(e: BoardError) -> Self {
        Self::Board(e)
    }
}

/// Run the pairwise-combination fixed point over the index's dirty set.
///
/// Each drained dirty region is paired with every region sharing a cell with
/// it; the intersection and both subtractions are offered back to the index,
/// which deduplicates, merges, and re-marks dirty. In lazy mode the loop
/// stops as soon as any region has become degenerate (all mines or all
/// safe): correctness only needs one actionable cell, not the full closure.
///
/// Terminates because every add that changes the index either introduces a
/// new area, strictly shrinks a coordinate set, or strictly tightens a
/// bound, and all of those are bounded below by the unhelpfulness exit.
pub(crate) fn propagate(index: &mut RegionIndex, lazy: bool) -> Result<(), Contradiction> {
    loop {
        let dirty = index.take_dirty();
        if dirty.is_empty() {
            return Ok(());
        }
        trace!("fixed point pass over {} dirty regions", dirty.len());
        for stale in &dirty {
            // The drained snapshot may have been merged or tightened by an
            // earlier pairing in this same pass; work with the live bounds.
            let Some(region) = index.get(stale.area()) else {
                continue;
            };
            for other in index.regions_intersecting(&region) {
                index.add(region.intersect(&other)?)?;
                index.add(region.subtract(&other)?)?;
                index.add(other.subtract(&region)?)?;
            }
        }
        if lazy
            && index
                .regions()
                .any(|region| region.all_mines() || region.all_safe())
        {
            return Ok(());
        }
    }
}

/// A solving session over one board.
///
/// The solver exclusively owns its board: the region index's back-references
/// assume nothing else mutates the cells they cover.
#[derive(Debug, Clone)]
pub struct Solver {
    board: Board,
    index: RegionIndex,
    safe_queue: VecDeque<Coord>,
    mine_queue: VecDeque<Coord>,
    rng: SmallRng,
}

// Construction and read access.
impl Solver {
    /// A solver over a freshly generated board.
    #[must_use]
    pub fn new(height: usize, width: usize, bombs: usize) -> Self {
        Self::from_board(Board::new(height, width, bombs))
    }

    /// A fully reproducible session: board layout, sampling, and guess
    /// tie-breaking all derive from `seed`.
    #[must_use]
    pub fn with_seed(height: usize, width: usize, bombs: usize, seed: u64) -> Self {
        Self::from_board_seeded(Board::with_seed(height, width, bombs, seed), seed)
    }

    /// Adopt an existing board (for example one built by
    /// [`crate::util::parse_board`]).
    #[must_use]
    pub fn from_board(board: Board) -> Self {
        Self::from_board_seeded(board, rand::random())
    }

    #[must_use]
    pub fn from_board_seeded(board: Board, seed: u64) -> Self {
        Self {
            board,
            index: RegionIndex::new(),
            safe_queue: VecDeque::new(),
            mine_queue: VecDeque::new(),
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[must_use]
    pub fn gamestate(&self) -> GameState {
        self.board.gamestate()
    }

    /// The observer's view of the board, for the rendering layer.
    #[must_use]
    pub fn view_grid(&self) -> Vec<Vec<CellValue>> {
        self.board.view_grid()
    }

    /// Ground truth, for the rendering layer's post-game reveal.
    #[must_use]
    pub fn get_grid(&self) -> Vec<Vec<CellValue>> {
        self.board.get_grid()
    }
}

// Region derivation.
impl Solver {
    /// Derive the exact region a revealed clue implies: its still-unknown
    /// neighbors hold precisely `clue - adjacent flags` mines. More adjacent
    /// flags than the clue allows is a contradiction.
    pub(crate) fn clue_region(board: &Board, at: Coord, clue: u8) -> Result<Region, Contradiction> {
        let mut flagged = 0usize;
        let mut unknown = Vec::new();
        for nb in board.neighbors(at) {
            match board.get(nb) {
                Some(CellValue::Hidden | CellValue::Questioned) => unknown.push(nb),
                Some(CellValue::Flagged) => flagged += 1,
                _ => {},
            }
        }
        let count = (clue as usize)
            .checked_sub(flagged)
            .ok_or(Contradiction("more flags around a clue than its count"))?;
        Region::exact(unknown, count)
    }

    /// Seed the index with a region per visible clue, plus the global
    /// remaining-mines region once few enough cells are left for it to pull
    /// its weight.
    fn find_base_regions(&mut self) -> Result<(), Contradiction> {
        for at in self.board.all_cells().collect::<Vec<_>>() {
            if let Some(CellValue::Clue(clue)) = self.board.get(at) {
                let region = Self::clue_region(&self.board, at, clue)?;
                self.index.add(region)?;
            }
        }
        let hidden: Vec<Coord> = self.board.hidden_cells().collect();
        if !hidden.is_empty() && hidden.len() <= ENDGAME_REGION_LIMIT {
            let remaining = self
                .board
                .remaining_mines()
                .ok_or(Contradiction("more flags than mines on the board"))?;
            self.index.add(Region::exact(hidden, remaining)?)?;
        }
        Ok(())
    }

    /// Scan the live regions for degenerate bounds and queue their cells:
    /// `min == size` means every cell is a mine, `max == 0` means every cell
    /// is safe. Queues deduplicate on insert.
    fn fill_queues(&mut self) {
        for region in self.index.regions().collect::<Vec<_>>() {
            if region.all_mines() {
                for cell in region.cells() {
                    push_unique(&mut self.mine_queue, cell);
                }
            } else if region.all_safe() {
                for cell in region.cells() {
                    push_unique(&mut self.safe_queue, cell);
                }
            }
        }
    }

    /// Rebuild and combine regions until an actionable cell appears (lazy)
    /// or the fixed point is exhausted.
    pub(crate) fn find_regions(&mut self, lazy: bool) -> Result<(), Contradiction> {
        self.find_base_regions()?;
        propagate(&mut self.index, lazy)?;
        self.fill_queues();
        Ok(())
    }

    fn has_queued(&self) -> bool {
        !self.safe_queue.is_empty() || !self.mine_queue.is_empty()
    }

    /// Drop queue entries the board has since resolved.
    fn purge_queues(&mut self) {
        let board = &self.board;
        let still_unknown = |at: &Coord| {
            matches!(
                board.get(*at),
                Some(CellValue::Hidden | CellValue::Questioned),
            )
        };
        self.safe_queue.retain(still_unknown);
        self.mine_queue.retain(still_unknown);
    }

    /// Discard every derived fact. The board itself is untouched.
    fn reset_deductions(&mut self) {
        self.index.clear();
        self.safe_queue.clear();
        self.mine_queue.clear();
    }

    /// Open a cell and re-index everything the cascade revealed.
    fn open_and_reindex(&mut self, at: Coord) -> Result<HashSet<Coord>, EngineError> {
        let opened = self.board.open(at)?;
        if self.board.gamestate() != GameState::Lost {
            for &cell in &opened {
                self.index.remove_safe(cell)?;
            }
        }
        self.purge_queues();
        Ok(opened)
    }

    fn flag_and_reindex(&mut self, at: Coord) -> Result<(), EngineError> {
        self.board.set_flag(at, FlagState::Flagged)?;
        self.index.remove_bomb(at)?;
        self.purge_queues();
        Ok(())
    }
}

// The solving surface.
impl Solver {
    /// Perform exactly one logically certain action, or report `None` when
    /// no certainty exists.
    ///
    /// A [`Contradiction`] is caught once per call: all flags are cleared,
    /// the index is discarded, and the derivation is retried from scratch —
    /// in practice the contradiction came from a wrong manual flag, and this
    /// self-heal recovers the session. A second contradiction within the
    /// same call is re-raised.
    pub fn step_certain(&mut self) -> Result<Option<Coord>, EngineError> {
        match self.try_certain() {
            Err(EngineError::Contradiction(c)) => {
                debug!("self-healing after {c}: clearing flags and rebuilding");
                self.reset_deductions();
                self.board.clear_flags();
                self.try_certain()
            },
            outcome => outcome,
        }
    }

    fn try_certain(&mut self) -> Result<Option<Coord>, EngineError> {
        if self.board.gamestate() != GameState::Running {
            return Ok(None);
        }
        if !self.has_queued() {
            self.find_regions(true)?;
        }
        if let Some(at) = self.safe_queue.pop_front() {
            self.open_and_reindex(at)?;
            if self.board.gamestate() == GameState::Lost {
                return Err(Contradiction("a cell queued as safe was a mine").into());
            }
            return Ok(Some(at));
        }
        if let Some(at) = self.mine_queue.pop_front() {
            self.flag_and_reindex(at)?;
            return Ok(Some(at));
        }
        Ok(None)
    }

    /// Drain every certain action, returning how many were applied.
    pub fn solve_certain(&mut self) -> Result<usize, EngineError> {
        let mut applied = 0;
        while self.step_certain()?.is_some() {
            applied += 1;
        }
        Ok(applied)
    }

    /// One action: a certain one if any exists, otherwise a probabilistic
    /// guess. `None` once the game is over.
    pub fn step(&mut self) -> Result<Option<Coord>, EngineError> {
        if let Some(at) = self.step_certain()? {
            return Ok(Some(at));
        }
        if !matches!(self.board.gamestate(), GameState::Running | GameState::New) {
            return Ok(None);
        }
        let Some(decision) = guess::pick(&self.board, &self.index, &mut self.rng)? else {
            return Ok(None);
        };
        match decision.action {
            GuessAction::Open => {
                trace!("guessing open at {}", decision.at);
                self.open_and_reindex(decision.at)?;
            },
            GuessAction::Flag => {
                trace!("guess proved {} is a mine; flagging", decision.at);
                self.flag_and_reindex(decision.at)?;
            },
        }
        Ok(Some(decision.at))
    }

    /// Run to completion (won, lost, or out of moves), returning the number
    /// of actions taken.
    pub fn solve(&mut self) -> Result<usize, EngineError> {
        let mut applied = 0;
        while matches!(self.board.gamestate(), GameState::Running | GameState::New) {
            match self.step()? {
                Some(_) => applied += 1,
                None => break,
            }
        }
        Ok(applied)
    }
}

// User-forced moves.
impl Solver {
    /// Open a cell on the user's behalf, returning how many cells the
    /// cascade revealed. If the reveal contradicts a prior deduction the
    /// derived state is discarded rather than partially repaired.
    pub fn manual_open(&mut self, at: Coord) -> Result<usize, EngineError> {
        let opened = self.board.open(at)?;
        if self.board.gamestate() != GameState::Lost {
            for &cell in &opened {
                if self.index.remove_safe(cell).is_err() {
                    self.reset_deductions();
                    break;
                }
            }
        }
        self.purge_queues();
        Ok(opened.len())
    }

    /// Flag a cell on the user's behalf. A flag that contradicts a prior
    /// deduction discards the derived state.
    pub fn manual_flag(&mut self, at: Coord) -> Result<(), EngineError> {
        self.board.set_flag(at, FlagState::Flagged)?;
        if self.index.remove_bomb(at).is_err() {
            self.reset_deductions();
        }
        self.purge_queues();
        Ok(())
    }

    /// Remove a flag. Regions already consumed the flag as a confirmed
    /// mine, so the incremental state is invalidated wholesale; the next
    /// pass rebuilds from the board.
    pub fn manual_unflag(&mut self, at: Coord) -> Result<(), EngineError> {
        self.board.set_flag(at, FlagState::Cleared)?;
        self.reset_deductions();
        Ok(())
    }
}

fn push_unique(queue: &mut VecDeque<Coord>, at: Coord) {
    if !queue.contains(&at) {
        queue.push_back(at);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::util::parse_board;

    fn at(row: usize, col: usize) -> Coord {
        Coord::new(row, col)
    }

    fn solver(encoded: &str) -> Solver {
        Solver::from_board_seeded(parse_board(encoded).unwrap(), 7)
    }

    #[test]
    fn fully_determined_clue_yields_no_uncertainty() {
        // Mine flagged, clue satisfied: the clue's region must come out as
        // an exact zero over no cells, not as false uncertainty.
        let s = solver("F1x");
        let region = Solver::clue_region(s.board(), at(0, 1), 1).unwrap();
        assert_eq!(region.len(), 1);
        assert_eq!((region.min(), region.max()), (0, 0));
    }

    #[test]
    fn ambiguous_clue_queues_nothing() {
        // 1×3 board, mine on the left, centre open showing 1: the two
        // hidden cells are equally likely, so neither queue may fill.
        let mut s = solver("*1x");
        assert_eq!(s.step_certain().unwrap(), None);
        assert!(s.safe_queue.is_empty() && s.mine_queue.is_empty());
    }

    #[test]
    fn step_certain_without_moves_is_idempotent() {
        let mut s = solver("*1x");
        let before = s.view_grid();
        assert_eq!(s.step_certain().unwrap(), None);
        assert_eq!(s.step_certain().unwrap(), None);
        assert_eq!(s.view_grid(), before);
    }

    #[test]
    fn corner_clue_with_one_unknown_neighbor_is_forced() {
        // The 1-clue's only unknown neighbor must be the mine; the far
        // hidden cell then falls to the remaining-mines region.
        let mut s = solver(".1*x");
        s.find_regions(true).unwrap();
        assert!(s.mine_queue.contains(&at(0, 2)));
        assert!(s.safe_queue.contains(&at(0, 3)));
        // Reveals are applied ahead of flags, and the reveal already wins.
        assert_eq!(s.step_certain().unwrap(), Some(at(0, 3)));
        assert_eq!(s.gamestate(), GameState::Won);
    }

    #[test]
    fn one_two_one_pattern_is_deduced() {
        let mut s = solver(
            "*x*
             121",
        );
        s.find_regions(false).unwrap();
        assert!(s.mine_queue.contains(&at(0, 0)));
        assert!(s.mine_queue.contains(&at(0, 2)));
        assert!(s.safe_queue.contains(&at(0, 1)));
        let applied = s.solve_certain().unwrap();
        assert!(applied >= 1);
        assert_eq!(s.gamestate(), GameState::Won);
        assert_eq!(s.board().get(at(0, 1)), Some(CellValue::Clue(2)));
    }

    #[test]
    fn fully_flagged_board_drains_to_won() {
        let mut s = solver(
            "xxx
             xFx
             xxx",
        );
        let applied = s.solve_certain().unwrap();
        assert_eq!(applied, 8);
        assert_eq!(s.gamestate(), GameState::Won);
    }

    #[test]
    fn queued_certainties_are_correct_on_seeded_boards() {
        for seed in 0..10 {
            let mut s = Solver::with_seed(9, 9, 10, seed);
            s.manual_open(at(4, 4)).unwrap();
            s.solve_certain().unwrap();
            let truth = s.get_grid();
            for (r, row) in s.view_grid().into_iter().enumerate() {
                for (c, cell) in row.into_iter().enumerate() {
                    match cell {
                        // Every certain flag is a real mine.
                        CellValue::Flagged => assert_eq!(truth[r][c], CellValue::Mine),
                        // Every certain open was safe.
                        CellValue::Mine => panic!("opened a mine at ({r},{c})"),
                        _ => {},
                    }
                }
            }
        }
    }

    #[test]
    fn wrong_flags_self_heal() {
        // Two bogus flags around the 1-clue make its region impossible; the
        // engine must clear the flags and retry rather than fail.
        let mut s = solver(
            "*xx
             x1x
             xxx",
        );
        s.manual_flag(at(2, 0)).unwrap();
        s.manual_flag(at(2, 2)).unwrap();
        assert_eq!(s.step_certain().unwrap(), None);
        assert_eq!(s.board().get(at(2, 0)), Some(CellValue::Hidden));
        assert_eq!(s.board().get(at(2, 2)), Some(CellValue::Hidden));
    }

    #[test]
    fn manual_unflag_forces_a_rebuild() {
        // Wide board: too many hidden cells for the endgame region, so the
        // forced flag is the only certain action and the game keeps running.
        let encoded = format!(".1*{}", "x".repeat(37));
        let mut s = solver(&encoded);
        assert_eq!(s.step_certain().unwrap(), Some(at(0, 2)));
        assert_eq!(s.board().get(at(0, 2)), Some(CellValue::Flagged));
        s.manual_unflag(at(0, 2)).unwrap();
        assert!(s.index.is_empty());
        // The rebuilt state re-derives the same mine.
        assert_eq!(s.step_certain().unwrap(), Some(at(0, 2)));
    }

    #[test]
    fn solve_runs_to_completion() {
        for seed in [3, 11, 42] {
            let mut s = Solver::with_seed(9, 9, 10, seed);
            s.solve().unwrap();
            assert!(matches!(s.gamestate(), GameState::Won | GameState::Lost));
            // Guesses may lose, but flags are only ever placed on proof.
            let truth = s.get_grid();
            for (r, row) in s.view_grid().into_iter().enumerate() {
                for (c, cell) in row.into_iter().enumerate() {
                    if cell == CellValue::Flagged {
                        assert_eq!(truth[r][c], CellValue::Mine);
                    }
                }
            }
        }
    }
}
