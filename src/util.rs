//! Convenience helpers for building boards from ASCII art, used by tests,
//! fixtures, and the demo binary.
use crate::board::{Board, CellValue, FlagState};
use crate::Coord;

/// Create a game board from an ASCII-encoded description, where:
/// - `*` is a hidden mine
/// - `x` is a hidden safe cell
/// - `0`-`8` is a revealed safe cell with that many adjacent mines
///   (validated against the layout), and `.` can be used in place of `0`
/// - `F` is a flagged mine and `f` a flagged safe cell (a wrong flag)
/// - Leading and trailing whitespace around each line is ignored
///
/// Revealing a zero cell cascades exactly as it would in play, so cells
/// marked hidden may end up revealed when they border a revealed `0`/`.`.
///
/// # Errors
///
/// If the description is empty or not rectangular, contains an invalid
/// character, or claims a clue value the mine layout disagrees with, an
/// error is returned.
pub fn parse_board(encoded: &str) -> Result<Board, String> {
    let lines = encoded.trim().lines().map(str::trim).collect::<Vec<_>>();
    let height = lines.len();
    if height == 0 {
        return Err("board must have at least one row".to_string());
    }
    let width = lines[0].len();
    if width == 0 {
        return Err("board must have at least one column".to_string());
    }
    if let Some(line) = lines.iter().find(|line| line.len() != width) {
        return Err(format!(
            "board must be rectangular (found line with length {}, expected length {width})",
            line.len(),
        ));
    }

    let mut mines = Vec::new();
    let mut flags = Vec::new();
    let mut reveals = Vec::new();
    for (row, line) in lines.into_iter().enumerate() {
        for (col, c) in line.chars().enumerate() {
            let at = Coord::new(row, col);
            match c {
                '*' => mines.push(at),
                'x' => {},
                '.' => reveals.push((at, 0)),
                n @ '0'..='8' => {
                    let clue = n.to_digit(10).expect("n is a decimal digit") as u8;
                    reveals.push((at, clue));
                },
                'F' => {
                    mines.push(at);
                    flags.push(at);
                },
                'f' => flags.push(at),
                _ => return Err(format!("invalid character '{c}' at ({row}, {col})")),
            }
        }
    }

    let mut board = Board::with_mines(height, width, &mines).map_err(|e| e.to_string())?;
    for &at in &flags {
        board
            .set_flag(at, FlagState::Flagged)
            .map_err(|e| e.to_string())?;
    }
    for &(at, clue) in &reveals {
        board.open(at).map_err(|e| e.to_string())?;
        match board.get(at) {
            Some(CellValue::Clue(actual)) if actual == clue => {},
            Some(CellValue::Clue(actual)) => {
                return Err(format!(
                    "cell {at} claims clue {clue} but the layout gives it {actual}",
                ));
            },
            other => return Err(format!("cell {at} did not open cleanly: {other:?}")),
        }
    }
    Ok(board)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::board::GameState;

    #[test]
    fn parses_a_mixed_board() {
        let board = parse_board(
            "*2x
             F2x
             xxx",
        )
        .unwrap();
        assert_eq!(board.bombs(), 2);
        assert_eq!(board.gamestate(), GameState::Running);
        assert_eq!(board.get(Coord::new(0, 0)), Some(CellValue::Hidden));
        assert_eq!(board.get(Coord::new(0, 1)), Some(CellValue::Clue(2)));
        assert_eq!(board.get(Coord::new(1, 0)), Some(CellValue::Flagged));
        assert_eq!(board.get(Coord::new(1, 1)), Some(CellValue::Clue(2)));
        assert_eq!(board.remaining_mines(), Some(1));
    }

    #[test]
    fn zero_cells_cascade_on_parse() {
        let board = parse_board(
            ".xx
             xxx
             xx*",
        )
        .unwrap();
        // The corner zero floods everything the mine does not fence off.
        assert_eq!(board.get(Coord::new(1, 1)), Some(CellValue::Clue(1)));
    }

    #[test]
    fn rejects_malformed_boards() {
        assert!(parse_board("").is_err());
        assert!(parse_board("xx\nxxx").is_err());
        assert!(parse_board("xq").is_err());
    }

    #[test]
    fn rejects_inconsistent_clues() {
        // The claimed 2 disagrees with the single adjacent mine.
        assert!(parse_board("*2x").is_err());
    }
}
