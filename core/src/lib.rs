// core: Battleship rules engine.
//
// Pure, synchronous game logic shared by every front end: the grid and
// coordinates, ship placement, fleet validation, shot resolution and the
// match lifecycle. Nothing here touches storage or the network; operations
// take the current value and return the next one, so the coordinator can
// persist only states that passed every rule.

pub mod error;
pub mod grid;
pub mod identity;
pub mod lifecycle;
pub mod placement;
pub mod rules;
pub mod ship;
pub mod shot;

pub use error::{FleetError, PlacementError, RuleViolation};
pub use grid::{all_coordinates, Coordinate, Orientation, ParseCoordinateError, GRID_SIZE, MAX_GRID_SIZE};
pub use identity::{MatchId, PlayerId, PlayerIdentity};
pub use lifecycle::{FirstTurn, LeaveOutcome, Match, MatchState, Participant};
#[cfg(feature = "rand")]
pub use placement::random_fleet;
pub use placement::{
    default_fleet, drag_anchor, is_overlapping, move_ship, place_ship, potential_cells, rotate_ship, validate_fleet,
};
pub use rules::FleetRules;
pub use ship::{Cell, Ship, ShipType};
pub use shot::{resolve_shot, HitType, MatchUpdate};
