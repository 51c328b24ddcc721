//! The game board: ground-truth mine layout, the player-visible overlay, and
//! the open/flag primitives the solver drives.
//!
//! The board knows nothing about regions or inference; it owns cell state,
//! neighbor geometry, cascade opening, and win/loss detection, and reports
//! exactly which cells each `open` call revealed so the solver can re-index
//! them.
use std::collections::HashSet;
use std::fmt;

use itertools::Itertools;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::Coord;

/// Lifecycle of one game.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GameState {
    /// Created but not yet opened; mines are placed on the first open so the
    /// first-clicked cell is never a mine.
    New,
    Running,
    Won,
    Lost,
}

/// What an observer may know about one cell.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellValue {
    /// Revealed, with the number of adjacent mines.
    Clue(u8),
    /// A revealed mine; seeing one means the game is lost.
    Mine,
    Hidden,
    Flagged,
    Questioned,
}

/// Target state for [`Board::set_flag`].
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FlagState {
    Flagged,
    Questioned,
    Cleared,
}

/// A board operation the grid itself rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardError {
    OutOfBounds(Coord),
    /// The game is over (or, for flagging, not yet started).
    NotRunning,
}
impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds(at) => write!(f, "coordinate {at} is outside the board"),
            Self::NotRunning => write!(f, "the game is not running"),
        }
    }
}
impl std::error::Error for BoardError {
}

/// Ground truth for one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tile {
    Mine,
    Clue(u8),
}

/// Player-visible state for one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Vis {
    Hidden,
    Flagged,
    Questioned,
    Revealed,
}

#[derive(Debug, Clone)]
pub struct Board {
    height: usize,
    width: usize,
    bombs: usize,
    /// Row-major; meaningless until mines are placed.
    truth: Vec<Tile>,
    vis: Vec<Vis>,
    state: GameState,
    rng: SmallRng,
}

// Construction.
impl Board {
    /// A board with mines placed lazily from OS entropy. Dimensions are
    /// clamped to at least 1×1 and `bombs` to the number of cells that can
    /// hold a mine once the first-opened cell is excluded.
    #[must_use]
    pub fn new(height: usize, width: usize, bombs: usize) -> Self {
        Self::with_rng(height, width, bombs, SmallRng::from_os_rng())
    }

    /// A reproducible board: the same seed always yields the same mine
    /// layout for the same first open.
    #[must_use]
    pub fn with_seed(height: usize, width: usize, bombs: usize, seed: u64) -> Self {
        Self::with_rng(height, width, bombs, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(height: usize, width: usize, bombs: usize, rng: SmallRng) -> Self {
        let height = height.max(1);
        let width = width.max(1);
        let cells = height * width;
        Self {
            height,
            width,
            bombs: bombs.min(cells.saturating_sub(1)),
            truth: vec![Tile::Clue(0); cells],
            vis: vec![Vis::Hidden; cells],
            state: GameState::New,
            rng,
        }
    }

    /// A board with a fixed mine layout, already running (no first-open
    /// placement, so no first-click safety). Used by fixtures and tests.
    pub fn with_mines(
        height: usize,
        width: usize,
        mines: &[Coord],
    ) -> Result<Self, BoardError> {
        let mut board = Self::with_rng(height, width, 0, SmallRng::seed_from_u64(0));
        let mines: HashSet<Coord> = mines.iter().copied().collect();
        for &mine in &mines {
            if !board.contains(mine) {
                return Err(BoardError::OutOfBounds(mine));
            }
            let i = board.idx(mine);
            board.truth[i] = Tile::Mine;
        }
        board.bombs = mines.len();
        board.recount_clues();
        board.state = GameState::Running;
        Ok(board)
    }
}

// Geometry and probing.
impl Board {
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Total number of mines on (or destined for) the board.
    #[must_use]
    pub fn bombs(&self) -> usize {
        self.bombs
    }

    #[must_use]
    pub fn gamestate(&self) -> GameState {
        self.state
    }

    #[must_use]
    pub fn contains(&self, at: Coord) -> bool {
        at.row < self.height && at.col < self.width
    }

    fn idx(&self, at: Coord) -> usize {
        at.row * self.width + at.col
    }

    /// The up-to-eight cells adjacent to `of`. `of` must be in bounds.
    pub fn neighbors(&self, of: Coord) -> impl Iterator<Item = Coord> + '_ {
        let rows = of.row.saturating_sub(1)..=(of.row + 1).min(self.height - 1);
        let cols = of.col.saturating_sub(1)..=(of.col + 1).min(self.width - 1);
        rows.cartesian_product(cols)
            .map(Coord::from)
            .filter(move |&at| at != of)
    }

    /// Every coordinate on the board, in reading order.
    pub fn all_cells(&self) -> impl Iterator<Item = Coord> + '_ {
        (0..self.height)
            .cartesian_product(0..self.width)
            .map(Coord::from)
    }

    /// Every coordinate the observer still knows nothing about (hidden or
    /// question-marked; flags count as presumed known).
    pub fn hidden_cells(&self) -> impl Iterator<Item = Coord> + '_ {
        self.all_cells()
            .filter(|&at| matches!(self.vis[self.idx(at)], Vis::Hidden | Vis::Questioned))
    }

    /// The observer's view of one cell; `None` out of bounds.
    #[must_use]
    pub fn get(&self, at: Coord) -> Option<CellValue> {
        if !self.contains(at) {
            return None;
        }
        let i = self.idx(at);
        Some(match self.vis[i] {
            Vis::Hidden => CellValue::Hidden,
            Vis::Flagged => CellValue::Flagged,
            Vis::Questioned => CellValue::Questioned,
            Vis::Revealed => match self.truth[i] {
                Tile::Mine => CellValue::Mine,
                Tile::Clue(n) => CellValue::Clue(n),
            },
        })
    }

    /// Mines not yet accounted for by flags, or `None` when the board is
    /// over-flagged.
    #[must_use]
    pub fn remaining_mines(&self) -> Option<usize> {
        let flags = self.vis.iter().filter(|&&v| v == Vis::Flagged).count();
        self.bombs.checked_sub(flags)
    }

    /// The observer's view of the whole board.
    #[must_use]
    pub fn view_grid(&self) -> Vec<Vec<CellValue>> {
        (0..self.height)
            .map(|row| {
                (0..self.width)
                    .map(|col| {
                        self.get(Coord::new(row, col))
                            .expect("row and col iterate in bounds")
                    })
                    .collect()
            })
            .collect()
    }

    /// Ground truth for the whole board, overlay ignored. On a [`GameState::New`]
    /// board mines are not yet placed and every cell reads `Clue(0)`.
    #[must_use]
    pub fn get_grid(&self) -> Vec<Vec<CellValue>> {
        (0..self.height)
            .map(|row| {
                (0..self.width)
                    .map(|col| match self.truth[row * self.width + col] {
                        Tile::Mine => CellValue::Mine,
                        Tile::Clue(n) => CellValue::Clue(n),
                    })
                    .collect()
            })
            .collect()
    }
}

// Mutation.
impl Board {
    /// Open a cell, returning every coordinate revealed by this call.
    ///
    /// Opening a hidden zero-clue cell cascades through its neighborhood;
    /// opening an already-revealed clue whose adjacent flag count matches it
    /// chord-opens the remaining unflagged neighbors (which loses the game
    /// if a flag was wrong). Opening a flagged cell reveals nothing. The
    /// first open of a [`GameState::New`] board places the mines, avoiding
    /// the opened cell.
    pub fn open(&mut self, at: Coord) -> Result<HashSet<Coord>, BoardError> {
        if !self.contains(at) {
            return Err(BoardError::OutOfBounds(at));
        }
        match self.state {
            GameState::New => {
                self.place_mines(at);
                self.state = GameState::Running;
            },
            GameState::Running => {},
            GameState::Won | GameState::Lost => return Err(BoardError::NotRunning),
        }
        let mut opened = HashSet::new();
        let i = self.idx(at);
        match self.vis[i] {
            Vis::Flagged => {},
            Vis::Revealed => {
                if let Tile::Clue(n @ 1..=8) = self.truth[i] {
                    let neighbors: Vec<Coord> = self.neighbors(at).collect();
                    let flags = neighbors
                        .iter()
                        .filter(|&&nb| self.vis[self.idx(nb)] == Vis::Flagged)
                        .count();
                    if flags == n as usize {
                        for nb in neighbors {
                            self.reveal(nb, &mut opened);
                        }
                    }
                }
            },
            Vis::Hidden | Vis::Questioned => self.reveal(at, &mut opened),
        }
        self.update_gamestate();
        Ok(opened)
    }

    /// Reveal `from` and flood through zero-clue cells.
    fn reveal(&mut self, from: Coord, opened: &mut HashSet<Coord>) {
        let mut pending = vec![from];
        while let Some(at) = pending.pop() {
            let i = self.idx(at);
            if matches!(self.vis[i], Vis::Revealed | Vis::Flagged) {
                continue;
            }
            self.vis[i] = Vis::Revealed;
            opened.insert(at);
            if self.truth[i] == Tile::Clue(0) {
                pending.extend(self.neighbors(at));
            }
        }
    }

    /// Put a cell's overlay into the requested flag state. Revealed cells
    /// are silently unaffected.
    pub fn set_flag(&mut self, at: Coord, flag: FlagState) -> Result<(), BoardError> {
        if !self.contains(at) {
            return Err(BoardError::OutOfBounds(at));
        }
        if self.state != GameState::Running {
            return Err(BoardError::NotRunning);
        }
        let i = self.idx(at);
        if self.vis[i] != Vis::Revealed {
            self.vis[i] = match flag {
                FlagState::Flagged => Vis::Flagged,
                FlagState::Questioned => Vis::Questioned,
                FlagState::Cleared => Vis::Hidden,
            };
        }
        Ok(())
    }

    /// The classic flag cycle: hidden → flagged → question-marked → hidden.
    pub fn toggle_flag(&mut self, at: Coord) -> Result<(), BoardError> {
        if !self.contains(at) {
            return Err(BoardError::OutOfBounds(at));
        }
        if self.state != GameState::Running {
            return Err(BoardError::NotRunning);
        }
        let i = self.idx(at);
        self.vis[i] = match self.vis[i] {
            Vis::Hidden => Vis::Flagged,
            Vis::Flagged => Vis::Questioned,
            Vis::Questioned => Vis::Hidden,
            Vis::Revealed => Vis::Revealed,
        };
        Ok(())
    }

    /// Drop every flag and question mark back to hidden.
    pub fn clear_flags(&mut self) {
        for v in &mut self.vis {
            if matches!(v, Vis::Flagged | Vis::Questioned) {
                *v = Vis::Hidden;
            }
        }
    }

    fn place_mines(&mut self, avoid: Coord) {
        let mut pool: Vec<Coord> = self.all_cells().filter(|&at| at != avoid).collect();
        self.bombs = self.bombs.min(pool.len());
        for _ in 0..self.bombs {
            let pick = self.rng.random_range(0..pool.len());
            let mine = pool.swap_remove(pick);
            let i = self.idx(mine);
            self.truth[i] = Tile::Mine;
        }
        self.recount_clues();
    }

    fn recount_clues(&mut self) {
        for at in self.all_cells().collect::<Vec<_>>() {
            let i = self.idx(at);
            if self.truth[i] == Tile::Mine {
                continue;
            }
            let nearby = self
                .neighbors(at)
                .filter(|&nb| self.truth[self.idx(nb)] == Tile::Mine)
                .count();
            self.truth[i] = Tile::Clue(nearby as u8);
        }
    }

    fn update_gamestate(&mut self) {
        if self.state != GameState::Running {
            return;
        }
        let mut all_clear = true;
        for i in 0..self.truth.len() {
            match (self.truth[i], self.vis[i]) {
                (Tile::Mine, Vis::Revealed) => {
                    self.state = GameState::Lost;
                    return;
                },
                (Tile::Clue(_), vis) if vis != Vis::Revealed => all_clear = false,
                _ => {},
            }
        }
        if all_clear {
            self.state = GameState::Won;
        }
    }
}
