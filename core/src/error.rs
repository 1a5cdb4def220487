// Rule violations raised by the engine. All of them are recoverable: the
// caller keeps the previous state and reports the reason.

use thiserror::Error;

use crate::grid::{Coordinate, Orientation};
use crate::identity::PlayerId;
use crate::lifecycle::MatchState;
use crate::ship::ShipType;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlacementError {
    #[error("{length}-cell ship at {start} ({orientation:?}) does not fit on a {grid_size}x{grid_size} board")]
    OutOfBounds { start: Coordinate, length: u8, orientation: Orientation, grid_size: u8 },
    #[error("a ship must cover at least one cell")]
    Empty,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FleetError {
    #[error("grid size {0} is outside 1..=26")]
    GridSize(u8),
    #[error("fleet composition is empty")]
    EmptyComposition,
    #[error("no length configured for {0}")]
    UnknownShipType(ShipType),
    #[error("{kind} of length {length} cannot be placed on a {grid_size}x{grid_size} board")]
    DoesNotFit { kind: ShipType, length: u8, grid_size: u8 },
    #[error("{count} ships do not fit one per row on a {grid_size}x{grid_size} board")]
    TooManyShips { count: usize, grid_size: u8 },
    #[error("fleet is {actual:?}, expected {expected:?}")]
    WrongComposition { expected: Vec<ShipType>, actual: Vec<ShipType> },
    #[error("{kind} covers {actual} cells, expected {expected}")]
    WrongLength { kind: ShipType, expected: u8, actual: usize },
    #[error("{kind} has a cell off the board at {at}")]
    OutOfBounds { kind: ShipType, at: Coordinate },
    #[error("{0} cells are not consecutive along its orientation")]
    NotContiguous(ShipType),
    #[error("{0} already has hit cells")]
    AlreadyHit(ShipType),
    #[error("ships overlap at {0}")]
    Overlap(Coordinate),
    #[error("no room left on the board for {0}")]
    NoRoom(ShipType),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleViolation {
    #[error("cannot {action} while the match is {actual}")]
    WrongState { action: &'static str, actual: MatchState },
    #[error("the match is already over")]
    GameOver,
    #[error("player {0} is not part of this match")]
    NotAParticipant(PlayerId),
    #[error("it is not {0}'s turn")]
    OutOfTurn(PlayerId),
    #[error("{0} has already been fired at")]
    AlreadyFired(Coordinate),
    #[error("{0} is off the board")]
    OutOfBounds(Coordinate),
    #[error("player name must not be blank")]
    BlankName,
    #[error("a player cannot challenge themselves")]
    SelfChallenge,
    #[error("only the invited player can accept, not {0}")]
    NotInvitee(PlayerId),
    #[error("player {0} is already ready with a different layout")]
    AlreadyReady(PlayerId),
    #[error("invalid fleet: {0}")]
    InvalidFleet(#[from] FleetError),
}
