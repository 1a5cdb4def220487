// Ship model: a typed run of cells with per-cell hit tracking.
//
// Ships are plain values. Every mutation builds a new ship from the old one
// (`with_hit`, placement helpers) so a rejected edit never leaves a
// half-updated fleet behind.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::grid::{Coordinate, Orientation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipType {
    Carrier,
    Battleship,
    Cruiser,
    Destroyer,
    Submarine,
    PatrolBoat,
}

impl ShipType {
    pub const ALL: [ShipType; 6] = [
        ShipType::Carrier,
        ShipType::Battleship,
        ShipType::Cruiser,
        ShipType::Destroyer,
        ShipType::Submarine,
        ShipType::PatrolBoat,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ShipType::Carrier => "Carrier",
            ShipType::Battleship => "Battleship",
            ShipType::Cruiser => "Cruiser",
            ShipType::Destroyer => "Destroyer",
            ShipType::Submarine => "Submarine",
            ShipType::PatrolBoat => "Patrol Boat",
        }
    }
}

impl fmt::Display for ShipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub coordinate: Coordinate,
    pub was_hit: bool,
}

impl Cell {
    pub fn new(coordinate: Coordinate) -> Self {
        Self { coordinate, was_hit: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ship {
    pub kind: ShipType,
    pub cells: Vec<Cell>,
    pub orientation: Orientation,
}

impl Ship {
    pub fn new(kind: ShipType, cells: Vec<Cell>, orientation: Orientation) -> Self {
        Self { kind, cells, orientation }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// True once every cell has been hit.
    pub fn is_sunk(&self) -> bool {
        self.cells.iter().all(|cell| cell.was_hit)
    }

    /// First cell; rotation pivots around it.
    pub fn anchor(&self) -> Option<Coordinate> {
        self.cells.first().map(|cell| cell.coordinate)
    }

    pub fn occupies(&self, coord: Coordinate) -> bool {
        self.cells.iter().any(|cell| cell.coordinate == coord)
    }

    pub fn coordinates(&self) -> impl Iterator<Item = Coordinate> + '_ {
        self.cells.iter().map(|cell| cell.coordinate)
    }

    /// Same kind, orientation and cells, ignoring hit state.
    pub fn same_layout(&self, other: &Ship) -> bool {
        self.kind == other.kind && self.orientation == other.orientation && self.coordinates().eq(other.coordinates())
    }

    pub fn hit_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.was_hit).count()
    }

    /// Returns a copy of this ship with the cell at `target` marked as hit,
    /// or `None` if the ship does not cover `target`.
    pub fn with_hit(&self, target: Coordinate) -> Option<Ship> {
        if !self.occupies(target) {
            return None;
        }
        let cells = self
            .cells
            .iter()
            .map(|cell| if cell.coordinate == target { Cell { was_hit: true, ..*cell } } else { *cell })
            .collect();
        Some(Ship { cells, ..self.clone() })
    }
}
