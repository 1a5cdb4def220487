// Error taxonomy for the host side.
//
// `GameError` is what every coordinator operation returns: a rule the
// engine refused, a record that does not exist, or a transport failure
// from the document store. None of them is fatal; callers decide whether
// to retry, report or go back to the lobby.

use std::time::Duration;

use battleship_core::{FleetError, RuleViolation};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("document store did not answer within {0:?}")]
    Timeout(Duration),
    #[error("corrupt document {collection}/{id}: {reason}")]
    Corrupt { collection: String, id: String, reason: String },
}

impl StoreError {
    /// Unavailable and timed out requests may succeed on a second attempt;
    /// a corrupt document will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error(transparent)]
    Validation(#[from] RuleViolation),
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error(transparent)]
    Transport(#[from] StoreError),
}

impl From<FleetError> for GameError {
    fn from(err: FleetError) -> Self {
        GameError::Validation(RuleViolation::InvalidFleet(err))
    }
}

impl GameError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        GameError::NotFound { kind, id: id.to_string() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GameError::NotFound { .. })
    }
}
