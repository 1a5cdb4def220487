// Fleet rules: which ships each side gets and how long each type is.
//
// Revisions of the game disagreed on the length-2 ship ("Battleship" vs
// "Patrol Boat"), so the table lives here as data instead of being baked
// into `ShipType`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::FleetError;
use crate::grid::MAX_GRID_SIZE;
use crate::ship::ShipType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetRules {
    /// Length of every known ship type.
    pub lengths: BTreeMap<ShipType, u8>,
    /// Ships each participant must field, in default layout order.
    pub composition: Vec<ShipType>,
}

impl Default for FleetRules {
    fn default() -> Self {
        let lengths = BTreeMap::from([
            (ShipType::Carrier, 4),
            (ShipType::Cruiser, 3),
            (ShipType::Battleship, 2),
            (ShipType::PatrolBoat, 2),
            (ShipType::Submarine, 1),
            (ShipType::Destroyer, 1),
        ]);
        let composition = vec![
            ShipType::Carrier,
            ShipType::Cruiser,
            ShipType::Battleship,
            ShipType::Battleship,
            ShipType::Submarine,
            ShipType::Destroyer,
        ];
        Self { lengths, composition }
    }
}

impl FleetRules {
    pub fn length_of(&self, kind: ShipType) -> Option<u8> {
        self.lengths.get(&kind).copied()
    }

    /// Number of cells a complete fleet covers.
    pub fn total_cells(&self) -> usize {
        self.composition
            .iter()
            .filter_map(|kind| self.length_of(*kind))
            .map(usize::from)
            .sum()
    }

    /// Check the rules are usable on a `grid_size` board: a supported size,
    /// non-empty composition, every ship has a length between 1 and the
    /// board size, and the default one-ship-per-row layout fits.
    pub fn check(&self, grid_size: u8) -> Result<(), FleetError> {
        if grid_size == 0 || grid_size > MAX_GRID_SIZE {
            return Err(FleetError::GridSize(grid_size));
        }
        if self.composition.is_empty() {
            return Err(FleetError::EmptyComposition);
        }
        for &kind in &self.composition {
            let length = self.length_of(kind).ok_or(FleetError::UnknownShipType(kind))?;
            if length == 0 || length > grid_size {
                return Err(FleetError::DoesNotFit { kind, length, grid_size });
            }
        }
        if self.composition.len() > grid_size as usize {
            return Err(FleetError::TooManyShips { count: self.composition.len(), grid_size });
        }
        Ok(())
    }

    /// Composition sorted by type, for order-insensitive comparison.
    pub(crate) fn sorted_composition(&self) -> Vec<ShipType> {
        let mut kinds = self.composition.clone();
        kinds.sort();
        kinds
    }
}
