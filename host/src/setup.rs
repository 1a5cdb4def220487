// Board setup session.
//
// While a match is in SETTING_SHIPS each player edits a private copy of
// their fleet. Nothing is written until `commit`, which hands the layout
// to the coordinator as a setReady intent.

use battleship_core::{
    default_fleet, move_ship, potential_cells, random_fleet, rotate_ship, Coordinate, FleetError, FleetRules, Match,
    MatchId, MatchState, PlayerId, RuleViolation, Ship,
};
use rand::Rng;

use crate::error::GameError;
use crate::game_coordinator::MatchCoordinator;
use crate::store::DocumentStore;

#[derive(Debug, Clone)]
pub struct SetupSession {
    match_id: MatchId,
    player: PlayerId,
    rules: FleetRules,
    grid_size: u8,
    fleet: Vec<Ship>,
}

impl SetupSession {
    /// Start editing `player`'s fleet, beginning from the layout stored in
    /// the match.
    pub async fn begin<S: DocumentStore>(
        coordinator: &MatchCoordinator<S>,
        match_id: MatchId,
        player: &PlayerId,
    ) -> Result<Self, GameError> {
        let current = coordinator.get_match(match_id).await?;
        if current.state != MatchState::SettingShips {
            return Err(RuleViolation::WrongState { action: "set up ships", actual: current.state }.into());
        }
        let participant =
            current.participant(player).ok_or_else(|| RuleViolation::NotAParticipant(player.clone()))?;
        let config = coordinator.config();
        Ok(Self {
            match_id,
            player: player.clone(),
            rules: config.fleet.clone(),
            grid_size: config.grid_size,
            fleet: participant.fleet.clone(),
        })
    }

    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    pub fn ships(&self) -> &[Ship] {
        &self.fleet
    }

    /// Rotate ship `index` in place if the rotated ship fits. Returns
    /// whether the layout changed.
    pub fn rotate(&mut self, index: usize) -> bool {
        let Some(ship) = self.fleet.get(index) else {
            return false;
        };
        let rotated = rotate_ship(ship, &self.fleet, self.grid_size);
        self.replace(index, rotated)
    }

    /// Move ship `index` so it starts at `to`, if it fits there.
    pub fn move_to(&mut self, index: usize, to: Coordinate) -> bool {
        let Some(ship) = self.fleet.get(index) else {
            return false;
        };
        let moved = move_ship(ship, &self.fleet, to, self.grid_size);
        self.replace(index, moved)
    }

    /// Cells ship `index` would cover if dropped at `anchor`.
    pub fn preview(&self, index: usize, anchor: Coordinate) -> Vec<Coordinate> {
        self.fleet.get(index).map(|ship| potential_cells(ship, anchor, self.grid_size)).unwrap_or_default()
    }

    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), FleetError> {
        self.fleet = random_fleet(&self.rules, self.grid_size, rng)?;
        Ok(())
    }

    pub fn reset(&mut self) -> Result<(), FleetError> {
        self.fleet = default_fleet(&self.rules, self.grid_size)?;
        Ok(())
    }

    /// Submit the edited layout and mark the player ready.
    pub async fn commit<S: DocumentStore>(self, coordinator: &MatchCoordinator<S>) -> Result<Match, GameError> {
        coordinator.set_ready(self.match_id, &self.player, self.fleet).await
    }

    fn replace(&mut self, index: usize, ship: Ship) -> bool {
        if self.fleet[index] == ship {
            return false;
        }
        self.fleet[index] = ship;
        true
    }
}
