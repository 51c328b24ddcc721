//! Minesweeper solver built on an algebra of bounded mine-count regions.
//!
//! Every numeric clue on a board is an axiom of the form "between `min` and
//! `max` of these cells are mines". [`Region`] captures one such axiom as a
//! set of coordinates plus an inclusive bound, and provides the set algebra
//! (intersect, subtract, unite, merge) that combines two overlapping axioms
//! into new, tighter ones. [`RegionIndex`] keeps the live regions
//! deduplicated by coordinate set and maintains a per-cell reverse index so
//! that only regions actually touching a changed region are re-examined.
//! [`Solver`] drives the whole thing: it seeds base regions from the visible
//! clues, combines them to a fixed point, queues the cells that became
//! certain, applies them to the [`Board`], and falls back to a probabilistic
//! guess when no certainty remains.
//!
//! ```
//! use regionsweep::Solver;
//!
//! let mut solver = Solver::with_seed(9, 9, 10, 0xCAFE);
//! let moves = solver.solve().unwrap();
//! assert!(moves > 0);
//! ```
use std::fmt;

pub mod board;
pub mod engine;
mod guess;
pub mod index;
mod internal_util;
pub mod region;
pub mod util;

pub use board::{Board, BoardError, CellValue, FlagState, GameState};
pub use engine::{EngineError, Solver};
pub use index::RegionIndex;
pub use region::{Contradiction, Region};

/// The row and column of a cell on the board.
///
/// Rows grow downward and columns grow rightward; the ordering treats the row
/// as the high-order component, which gives scans and tie-breaking a stable,
/// reading-order traversal.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}
impl Coord {
    #[must_use]
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}
impl From<(usize, usize)> for Coord {
    fn from((row, col): (usize, usize)) -> Self {
        Self { row, col }
    }
}
impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}
