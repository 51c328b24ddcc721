use regionsweep::{CellValue, Solver};

fn cell_to_char(cell: CellValue) -> char {
    match cell {
        CellValue::Clue(0) => '.',
        CellValue::Clue(n) => (b'0' + n) as char,
        CellValue::Mine => '*',
        CellValue::Hidden => ' ',
        CellValue::Flagged => 'F',
        CellValue::Questioned => '?',
    }
}

fn main() {
    let mut solver = Solver::with_seed(9, 9, 10, 0xCAFE);
    match solver.solve() {
        Ok(moves) => println!("{moves} moves, finished {:?}", solver.gamestate()),
        Err(e) => {
            eprintln!("solver failed: {e}");
            return;
        },
    }
    for row in solver.view_grid() {
        println!("{}", row.into_iter().map(cell_to_char).collect::<String>());
    }
}
