// Simple ASCII visualization helpers for player boards.
//
// `render_own_board` shows a participant's fleet with the opponent's shots
// on it. `render_target_board` shows what a shooter knows about the
// opponent: their own shots, plus ships once sunk. Unsunk opponent ships
// are never drawn.
//
//   S ship   X hit   # sunk   o miss   . water

use std::fmt::Write;

use battleship_core::{all_coordinates, Coordinate, Participant};

fn header(out: &mut String, grid_size: u8) {
    out.push_str("   ");
    for col in 0..grid_size {
        let _ = write!(out, " {} ", Coordinate::new(col, 1).column_letter());
    }
    out.push('\n');
}

fn render(grid_size: u8, cell: impl Fn(Coordinate) -> char) -> String {
    let mut out = String::new();
    header(&mut out, grid_size);
    for coord in all_coordinates(grid_size) {
        if coord.col == 0 {
            let _ = write!(out, "{:2} ", coord.row);
        }
        let _ = write!(out, " {} ", cell(coord));
        if coord.col + 1 == grid_size {
            out.push('\n');
        }
    }
    out
}

/// `own` as its owner sees it. Misses come from `opponent`'s shot list.
pub fn render_own_board(own: &Participant, opponent: Option<&Participant>, grid_size: u8) -> String {
    render(grid_size, |coord| match own.ship_at(coord) {
        Some(ship) if ship.is_sunk() => '#',
        Some(ship) if ship.cells.iter().any(|c| c.coordinate == coord && c.was_hit) => 'X',
        Some(_) => 'S',
        None if opponent.is_some_and(|o| o.has_fired_at(coord)) => 'o',
        None => '.',
    })
}

/// `target` as `shooter` sees it.
pub fn render_target_board(shooter: &Participant, target: &Participant, grid_size: u8) -> String {
    render(grid_size, |coord| match target.ship_at(coord) {
        Some(ship) if ship.is_sunk() => '#',
        Some(_) if shooter.has_fired_at(coord) => 'X',
        None if shooter.has_fired_at(coord) => 'o',
        _ => '.',
    })
}

/// Two rendered boards next to each other.
pub fn side_by_side(left: &str, right: &str) -> String {
    let width = left.lines().map(str::len).max().unwrap_or(0);
    let mut out = String::new();
    let mut right_lines = right.lines();
    for line in left.lines() {
        let _ = writeln!(out, "{line:width$}    {}", right_lines.next().unwrap_or(""));
    }
    for line in right_lines {
        let _ = writeln!(out, "{:width$}    {line}", "");
    }
    out
}
