// Placement engine: cell generation, overlap checks and fleet validation.
//
// Every edit follows the same shape: compute the candidate cells, validate
// them against bounds and the rest of the fleet, then either return the
// updated ship or the original one untouched.

use std::collections::HashSet;

#[cfg(feature = "rand")]
use rand::{seq::SliceRandom, Rng};

use crate::error::{FleetError, PlacementError};
use crate::grid::{Coordinate, Orientation};
use crate::rules::FleetRules;
use crate::ship::{Cell, Ship, ShipType};

/// Generate `length` consecutive cells from `start`, advancing the column
/// for horizontal ships and the row for vertical ones. Placement that
/// would leave the board is rejected outright; it never clamps or wraps.
pub fn place_ship(
    start: Coordinate,
    length: u8,
    orientation: Orientation,
    grid_size: u8,
) -> Result<Vec<Cell>, PlacementError> {
    if length == 0 {
        return Err(PlacementError::Empty);
    }
    let out_of_bounds = PlacementError::OutOfBounds { start, length, orientation, grid_size };
    (0..length)
        .map(|offset| {
            start
                .step(orientation, offset)
                .filter(|coord| coord.within_bounds(grid_size))
                .map(Cell::new)
                .ok_or_else(|| out_of_bounds.clone())
        })
        .collect()
}

/// True if any candidate cell lands on a ship in `existing` other than
/// `excluding`. The exclusion is by identity (the same element of the
/// slice), not by value, so a ship being moved is never compared against
/// itself even if another ship momentarily has equal cells.
pub fn is_overlapping(candidate: &[Cell], existing: &[Ship], excluding: Option<&Ship>) -> bool {
    existing
        .iter()
        .filter(|ship| !excluding.is_some_and(|skip| std::ptr::eq(*ship, skip)))
        .any(|ship| candidate.iter().any(|cell| ship.occupies(cell.coordinate)))
}

/// Flip the ship's orientation around its first cell. Returns the rotated
/// ship if it stays on the board and clear of the rest of `ships`,
/// otherwise the original. `ship` should be an element of `ships`.
pub fn rotate_ship(ship: &Ship, ships: &[Ship], grid_size: u8) -> Ship {
    let Some(anchor) = ship.anchor() else {
        return ship.clone();
    };
    reposition(ship, ships, anchor, ship.orientation.opposite(), grid_size)
}

/// Move the ship so that its first cell lands on `to`, keeping its
/// orientation. Same commit-if-valid behaviour as `rotate_ship`.
pub fn move_ship(ship: &Ship, ships: &[Ship], to: Coordinate, grid_size: u8) -> Ship {
    reposition(ship, ships, to, ship.orientation, grid_size)
}

fn reposition(ship: &Ship, ships: &[Ship], start: Coordinate, orientation: Orientation, grid_size: u8) -> Ship {
    let Ok(length) = u8::try_from(ship.len()) else {
        return ship.clone();
    };
    match place_ship(start, length, orientation, grid_size) {
        Ok(cells) if !is_overlapping(&cells, ships, Some(ship)) => Ship::new(ship.kind, cells, orientation),
        _ => ship.clone(),
    }
}

/// Cells a ship would cover if anchored at `anchor`, skipping any that fall
/// off the board. Preview only.
pub fn potential_cells(ship: &Ship, anchor: Coordinate, grid_size: u8) -> Vec<Coordinate> {
    (0..ship.len())
        .filter_map(|offset| u8::try_from(offset).ok())
        .filter_map(|offset| anchor.step(ship.orientation, offset))
        .filter(|coord| coord.within_bounds(grid_size))
        .collect()
}

/// Where the ship's first cell ends up when the ship is grabbed at
/// `grabbed` and dragged by a cell delta. The drop point is clamped to the
/// board, so the result is always a valid coordinate even if the ship itself
/// would not fit there.
pub fn drag_anchor(ship: &Ship, grabbed: Coordinate, d_col: i32, d_row: i32, grid_size: u8) -> Coordinate {
    let dropped = grabbed.offset_by(d_col, d_row, grid_size);
    let Some(anchor) = ship.anchor() else {
        return dropped;
    };
    match ship.orientation {
        Orientation::Horizontal => dropped.offset_by(anchor.col as i32 - grabbed.col as i32, 0, grid_size),
        Orientation::Vertical => dropped.offset_by(0, anchor.row as i32 - grabbed.row as i32, grid_size),
    }
}

/// Full layout check for a fleet about to be committed: composition matches
/// the rules, every ship has its configured length, lies on the board in a
/// straight consecutive run, carries no hits yet, and no two ships share a
/// cell.
pub fn validate_fleet(ships: &[Ship], rules: &FleetRules, grid_size: u8) -> Result<(), FleetError> {
    rules.check(grid_size)?;

    let expected = rules.sorted_composition();
    let mut actual: Vec<ShipType> = ships.iter().map(|ship| ship.kind).collect();
    actual.sort();
    if actual != expected {
        return Err(FleetError::WrongComposition { expected, actual });
    }

    let mut occupied = HashSet::new();
    for ship in ships {
        let length = rules.length_of(ship.kind).ok_or(FleetError::UnknownShipType(ship.kind))?;
        if ship.len() != length as usize {
            return Err(FleetError::WrongLength { kind: ship.kind, expected: length, actual: ship.len() });
        }
        if let Some(cell) = ship.cells.iter().find(|cell| !cell.coordinate.within_bounds(grid_size)) {
            return Err(FleetError::OutOfBounds { kind: ship.kind, at: cell.coordinate });
        }
        let anchor = ship.anchor().ok_or(FleetError::NotContiguous(ship.kind))?;
        let straight = ship
            .cells
            .iter()
            .zip(0u8..)
            .all(|(cell, offset)| anchor.step(ship.orientation, offset) == Some(cell.coordinate));
        if !straight {
            return Err(FleetError::NotContiguous(ship.kind));
        }
        if ship.cells.iter().any(|cell| cell.was_hit) {
            return Err(FleetError::AlreadyHit(ship.kind));
        }
        for coord in ship.coordinates() {
            if !occupied.insert(coord) {
                return Err(FleetError::Overlap(coord));
            }
        }
    }
    Ok(())
}

/// Deterministic starting layout: one horizontal ship per row, all starting
/// in column A, in composition order.
pub fn default_fleet(rules: &FleetRules, grid_size: u8) -> Result<Vec<Ship>, FleetError> {
    rules.check(grid_size)?;
    rules
        .composition
        .iter()
        .zip(1u8..)
        .map(|(&kind, row)| {
            let length = rules.length_of(kind).ok_or(FleetError::UnknownShipType(kind))?;
            place_ship(Coordinate::new(0, row), length, Orientation::Horizontal, grid_size)
                .map(|cells| Ship::new(kind, cells, Orientation::Horizontal))
                .map_err(|_| FleetError::DoesNotFit { kind, length, grid_size })
        })
        .collect()
}

/// Random valid layout. Tries every cell in shuffled order for each ship,
/// both orientations, and gives up with `NoRoom` if a ship cannot be placed.
#[cfg(feature = "rand")]
pub fn random_fleet<R: Rng + ?Sized>(rules: &FleetRules, grid_size: u8, rng: &mut R) -> Result<Vec<Ship>, FleetError> {
    rules.check(grid_size)?;
    let mut positions: Vec<Coordinate> = crate::grid::all_coordinates(grid_size).collect();
    let mut fleet: Vec<Ship> = Vec::with_capacity(rules.composition.len());

    for &kind in &rules.composition {
        let length = rules.length_of(kind).ok_or(FleetError::UnknownShipType(kind))?;
        positions.shuffle(rng);
        let mut orientations = [Orientation::Horizontal, Orientation::Vertical];
        orientations.shuffle(rng);

        let placed = positions.iter().find_map(|&pos| {
            orientations.iter().find_map(|&orientation| {
                place_ship(pos, length, orientation, grid_size)
                    .ok()
                    .filter(|cells| !is_overlapping(cells, &fleet, None))
                    .map(|cells| Ship::new(kind, cells, orientation))
            })
        });
        match placed {
            Some(ship) => fleet.push(ship),
            None => return Err(FleetError::NoRoom(kind)),
        }
    }
    Ok(fleet)
}
