// Shot resolution.
//
// A shot is checked against the match in a fixed order (game over, state,
// membership, turn, bounds, repeat) and then applied to a copy of the
// match. A hit keeps the turn with the shooter; a miss passes it. Sinking
// the last ship ends the match with the shooter as winner.

use serde::{Deserialize, Serialize};

use crate::error::RuleViolation;
use crate::grid::Coordinate;
use crate::identity::PlayerId;
use crate::lifecycle::{Match, MatchState};
use crate::ship::ShipType;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HitType {
    Miss,
    Hit(ShipType),
    Sunk(ShipType),
    /// The shot sank the opponent's last ship.
    Victory(ShipType),
}

impl HitType {
    pub fn is_hit(self) -> bool {
        !matches!(self, HitType::Miss)
    }
}

/// A resolved shot: the match to commit and what the shooter learned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchUpdate {
    pub next: Match,
    pub target: Coordinate,
    pub outcome: HitType,
}

pub fn resolve_shot(
    current: &Match,
    shooter: &PlayerId,
    target: Coordinate,
    grid_size: u8,
) -> Result<MatchUpdate, RuleViolation> {
    match current.state {
        MatchState::Finished => return Err(RuleViolation::GameOver),
        MatchState::GameInProgress => {}
        actual => return Err(RuleViolation::WrongState { action: "fire", actual }),
    }
    let shooter_idx = current.index_of(shooter)?;
    if current.current_player_id.as_ref() != Some(shooter) {
        return Err(RuleViolation::OutOfTurn(shooter.clone()));
    }
    if !target.within_bounds(grid_size) {
        return Err(RuleViolation::OutOfBounds(target));
    }
    if current.participants[shooter_idx].has_fired_at(target) {
        return Err(RuleViolation::AlreadyFired(target));
    }
    let target_idx = current
        .participants
        .iter()
        .position(|p| p.id() != shooter)
        .ok_or(RuleViolation::WrongState { action: "fire", actual: current.state })?;

    let mut next = current.clone();
    next.participants[shooter_idx].shots_fired.push(target);

    let struck = next.participants[target_idx]
        .fleet
        .iter()
        .enumerate()
        .find_map(|(i, ship)| ship.with_hit(target).map(|hit| (i, hit)));

    let outcome = match struck {
        None => {
            next.current_player_id = Some(next.participants[target_idx].id().clone());
            HitType::Miss
        }
        Some((ship_idx, ship)) => {
            let kind = ship.kind;
            let sunk = ship.is_sunk();
            next.participants[target_idx].fleet[ship_idx] = ship;
            next.participants[shooter_idx].hits.push(target);

            if next.participants[target_idx].is_defeated() {
                next.state = MatchState::Finished;
                next.winner_id = Some(shooter.clone());
                HitType::Victory(kind)
            } else if sunk {
                HitType::Sunk(kind)
            } else {
                HitType::Hit(kind)
            }
        }
    };

    Ok(MatchUpdate { next, target, outcome })
}
