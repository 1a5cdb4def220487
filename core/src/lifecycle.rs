// Match lifecycle state machine.
//
//   INVITE -> SETTING_SHIPS -> GAME_IN_PROGRESS -> FINISHED
//                   \________________\__________-> CANCELED
//
// `Match` is the aggregate root: two participants, whose turn it is, the
// lifecycle state and the winner. Transitions take `&self` and return the
// next `Match` (or a `RuleViolation`), so the caller only ever commits a
// fully validated value. Removal (decline, last player out) is reported as
// an outcome; deleting the record is the caller's job.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::RuleViolation;
use crate::grid::Coordinate;
use crate::identity::{MatchId, PlayerId, PlayerIdentity};
use crate::placement::{default_fleet, validate_fleet};
use crate::rules::FleetRules;
use crate::ship::Ship;
use crate::shot::{resolve_shot, MatchUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchState {
    Invite,
    SettingShips,
    GameInProgress,
    Finished,
    Canceled,
}

impl MatchState {
    pub fn is_terminal(self) -> bool {
        matches!(self, MatchState::Finished | MatchState::Canceled)
    }
}

impl fmt::Display for MatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchState::Invite => "INVITE",
            MatchState::SettingShips => "SETTING_SHIPS",
            MatchState::GameInProgress => "GAME_IN_PROGRESS",
            MatchState::Finished => "FINISHED",
            MatchState::Canceled => "CANCELED",
        };
        f.write_str(name)
    }
}

/// Who shoots first once the invite is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirstTurn {
    #[default]
    Challenger,
    Accepter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub player: PlayerIdentity,
    pub fleet: Vec<Ship>,
    pub is_ready: bool,
    /// Every coordinate this participant has fired at, in order.
    pub shots_fired: Vec<Coordinate>,
    /// The subset of `shots_fired` that hit a ship.
    pub hits: Vec<Coordinate>,
}

impl Participant {
    pub fn new(player: PlayerIdentity, fleet: Vec<Ship>) -> Self {
        Self { player, fleet, is_ready: false, shots_fired: Vec::new(), hits: Vec::new() }
    }

    pub fn id(&self) -> &PlayerId {
        &self.player.id
    }

    pub fn has_fired_at(&self, coord: Coordinate) -> bool {
        self.shots_fired.contains(&coord)
    }

    pub fn ship_at(&self, coord: Coordinate) -> Option<&Ship> {
        self.fleet.iter().find(|ship| ship.occupies(coord))
    }

    /// All ships sunk. A participant with no fleet is never defeated.
    pub fn is_defeated(&self) -> bool {
        !self.fleet.is_empty() && self.fleet.iter().all(Ship::is_sunk)
    }

    pub fn ships_remaining(&self) -> usize {
        self.fleet.iter().filter(|ship| !ship.is_sunk()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    /// Challenger first, invitee second. Shrinks as players leave.
    pub participants: Vec<Participant>,
    pub current_player_id: Option<PlayerId>,
    pub state: MatchState,
    pub winner_id: Option<PlayerId>,
    /// Bumped by whoever persists the match, once per committed change.
    #[serde(default)]
    pub revision: u64,
}

/// Result of a leave: either the record should go away or be replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    Removed,
    Updated(Match),
}

impl Match {
    /// Create a match in INVITE with the default fleet for both sides.
    pub fn invite(
        id: MatchId,
        challenger: PlayerIdentity,
        challenged: PlayerIdentity,
        rules: &FleetRules,
        grid_size: u8,
    ) -> Result<Self, RuleViolation> {
        if challenger.id == challenged.id {
            return Err(RuleViolation::SelfChallenge);
        }
        let fleet = default_fleet(rules, grid_size)?;
        Ok(Self {
            id,
            participants: vec![Participant::new(challenger, fleet.clone()), Participant::new(challenged, fleet)],
            current_player_id: None,
            state: MatchState::Invite,
            winner_id: None,
            revision: 0,
        })
    }

    pub fn challenger(&self) -> Option<&Participant> {
        self.participants.first()
    }

    pub fn invitee(&self) -> Option<&Participant> {
        self.participants.get(1)
    }

    pub fn participant(&self, player: &PlayerId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id() == player)
    }

    pub fn opponent_of(&self, player: &PlayerId) -> Option<&Participant> {
        self.participant(player)?;
        self.participants.iter().find(|p| p.id() != player)
    }

    pub fn is_participant(&self, player: &PlayerId) -> bool {
        self.participant(player).is_some()
    }

    pub(crate) fn index_of(&self, player: &PlayerId) -> Result<usize, RuleViolation> {
        self.participants
            .iter()
            .position(|p| p.id() == player)
            .ok_or_else(|| RuleViolation::NotAParticipant(player.clone()))
    }

    fn require_state(&self, expected: MatchState, action: &'static str) -> Result<(), RuleViolation> {
        if self.state == expected {
            Ok(())
        } else {
            Err(RuleViolation::WrongState { action, actual: self.state })
        }
    }

    /// INVITE -> SETTING_SHIPS. Only the invited player may accept.
    pub fn accept(&self, accepter: &PlayerId, first_turn: FirstTurn) -> Result<Self, RuleViolation> {
        self.require_state(MatchState::Invite, "accept an invite")?;
        self.index_of(accepter)?;
        let (challenger, invitee) = match (self.challenger(), self.invitee()) {
            (Some(c), Some(i)) => (c.id().clone(), i.id().clone()),
            _ => return Err(RuleViolation::WrongState { action: "accept an invite", actual: self.state }),
        };
        if &invitee != accepter {
            return Err(RuleViolation::NotInvitee(accepter.clone()));
        }

        let mut next = self.clone();
        next.state = MatchState::SettingShips;
        next.current_player_id = Some(match first_turn {
            FirstTurn::Challenger => challenger,
            FirstTurn::Accepter => invitee,
        });
        for participant in &mut next.participants {
            participant.is_ready = false;
        }
        Ok(next)
    }

    /// Declining is only possible before the match starts; the record is
    /// then deleted rather than canceled.
    pub fn decline(&self) -> Result<(), RuleViolation> {
        self.require_state(MatchState::Invite, "decline an invite")
    }

    /// Commit `fleet` for `player` and mark them ready. When both sides are
    /// ready the match moves to GAME_IN_PROGRESS. Re-sending the layout
    /// already committed is accepted without change.
    pub fn set_ready(
        &self,
        player: &PlayerId,
        fleet: Vec<Ship>,
        rules: &FleetRules,
        grid_size: u8,
    ) -> Result<Self, RuleViolation> {
        let index = self.index_of(player)?;
        let current = &self.participants[index];
        if current.is_ready && matches!(self.state, MatchState::SettingShips | MatchState::GameInProgress) {
            let unchanged = current.fleet.len() == fleet.len()
                && current.fleet.iter().zip(&fleet).all(|(committed, sent)| committed.same_layout(sent));
            return if unchanged {
                Ok(self.clone())
            } else {
                Err(RuleViolation::AlreadyReady(player.clone()))
            };
        }
        self.require_state(MatchState::SettingShips, "set up ships")?;
        validate_fleet(&fleet, rules, grid_size)?;

        let mut next = self.clone();
        next.participants[index].fleet = fleet;
        next.participants[index].is_ready = true;
        if next.participants.len() == 2 && next.participants.iter().all(|p| p.is_ready) {
            next.state = MatchState::GameInProgress;
            if next.current_player_id.is_none() {
                next.current_player_id = next.challenger().map(|p| p.id().clone());
            }
        }
        Ok(next)
    }

    /// Fire at the opponent. See `shot::resolve_shot`.
    pub fn fire(&self, player: &PlayerId, target: Coordinate, grid_size: u8) -> Result<MatchUpdate, RuleViolation> {
        resolve_shot(self, player, target, grid_size)
    }

    /// Remove `player` from the match.
    ///
    /// - INVITE: the match never started, so it is removed.
    /// - SETTING_SHIPS / GAME_IN_PROGRESS: CANCELED with the remaining
    ///   participant, or removed if nobody is left.
    /// - FINISHED / CANCELED: the participant is dropped; the last one out
    ///   removes the record.
    pub fn leave(&self, player: &PlayerId) -> Result<LeaveOutcome, RuleViolation> {
        let index = self.index_of(player)?;
        if self.state == MatchState::Invite {
            return Ok(LeaveOutcome::Removed);
        }

        let mut next = self.clone();
        next.participants.remove(index);
        if next.participants.is_empty() {
            return Ok(LeaveOutcome::Removed);
        }
        if matches!(self.state, MatchState::SettingShips | MatchState::GameInProgress) {
            next.state = MatchState::Canceled;
            next.current_player_id = None;
        } else if next.current_player_id.as_ref() == Some(player) {
            next.current_player_id = None;
        }
        Ok(LeaveOutcome::Updated(next))
    }

    pub fn is_over(&self) -> bool {
        self.state.is_terminal()
    }

    /// Consistency check for a match read back from storage:
    /// - at most two participants, exactly two unless terminal
    /// - `current_player_id` and `winner_id` name participants
    /// - FINISHED iff a winner is set
    /// - no duplicate shots, hits are a subset of shots
    /// - no participant's ships overlap
    pub fn check(&self) -> bool {
        let count = self.participants.len();
        if count > 2 || (count != 2 && !self.is_over()) {
            return false;
        }
        if let Some(current) = &self.current_player_id {
            if !self.is_participant(current) {
                return false;
            }
        }
        match (&self.winner_id, self.state) {
            (Some(winner), MatchState::Finished) => {
                // The loser may already have left a finished match.
                if !self.is_participant(winner) && count == 2 {
                    return false;
                }
            }
            (None, MatchState::Finished) | (Some(_), _) => return false,
            (None, _) => {}
        }
        self.participants.iter().all(|p| {
            let unique: HashSet<_> = p.shots_fired.iter().collect();
            let mut occupied = HashSet::new();
            unique.len() == p.shots_fired.len()
                && p.hits.iter().all(|hit| unique.contains(hit))
                && p.fleet.iter().flat_map(Ship::coordinates).all(|c| occupied.insert(c))
        })
    }

    /// Hex SHA-256 of the bincode encoding. Equal matches give equal
    /// fingerprints, so observers can skip notifications that change
    /// nothing.
    pub fn fingerprint(&self) -> Result<String, bincode::Error> {
        let bytes = bincode::serialize(self)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Orientation, GRID_SIZE};
    use crate::placement::place_ship;
    use crate::ship::ShipType;
    use uuid::Uuid;

    fn alice() -> PlayerIdentity {
        PlayerIdentity::new("alice", "Alice")
    }

    fn bob() -> PlayerIdentity {
        PlayerIdentity::new("bob", "Bob")
    }

    fn invited() -> Match {
        Match::invite(MatchId::from(Uuid::nil()), alice(), bob(), &FleetRules::default(), GRID_SIZE).unwrap()
    }

    fn both_ready() -> Match {
        let rules = FleetRules::default();
        let fleet = default_fleet(&rules, GRID_SIZE).unwrap();
        invited()
            .accept(&"bob".into(), FirstTurn::Challenger)
            .and_then(|m| m.set_ready(&"alice".into(), fleet.clone(), &rules, GRID_SIZE))
            .and_then(|m| m.set_ready(&"bob".into(), fleet, &rules, GRID_SIZE))
            .unwrap()
    }

    #[test]
    fn test_invite_defaults() {
        let m = invited();
        assert_eq!(m.state, MatchState::Invite);
        assert_eq!(m.participants.len(), 2);
        assert!(m.participants.iter().all(|p| !p.is_ready && p.fleet.len() == 6));
        assert!(m.current_player_id.is_none());
        assert!(m.check());
    }

    #[test]
    fn test_self_challenge_rejected() {
        let res = Match::invite(MatchId::from(Uuid::nil()), alice(), alice(), &FleetRules::default(), GRID_SIZE);
        assert_eq!(res, Err(RuleViolation::SelfChallenge));
    }

    #[test]
    fn test_accept_only_by_invitee() {
        let m = invited();
        assert_eq!(m.accept(&"alice".into(), FirstTurn::Challenger), Err(RuleViolation::NotInvitee("alice".into())));
        assert_eq!(
            m.accept(&"carol".into(), FirstTurn::Challenger),
            Err(RuleViolation::NotAParticipant("carol".into()))
        );

        let accepted = m.accept(&"bob".into(), FirstTurn::Challenger).unwrap();
        assert_eq!(accepted.state, MatchState::SettingShips);
        assert_eq!(accepted.current_player_id, Some("alice".into()));
        // original untouched
        assert_eq!(m.state, MatchState::Invite);

        let accepter_first = m.accept(&"bob".into(), FirstTurn::Accepter).unwrap();
        assert_eq!(accepter_first.current_player_id, Some("bob".into()));

        assert!(matches!(accepted.accept(&"bob".into(), FirstTurn::Challenger), Err(RuleViolation::WrongState { .. })));
    }

    #[test]
    fn test_decline_only_during_invite() {
        assert!(invited().decline().is_ok());
        let accepted = invited().accept(&"bob".into(), FirstTurn::Challenger).unwrap();
        assert!(accepted.decline().is_err());
    }

    #[test]
    fn test_ready_transitions_when_both_ready() {
        let rules = FleetRules::default();
        let fleet = default_fleet(&rules, GRID_SIZE).unwrap();
        let m = invited().accept(&"bob".into(), FirstTurn::Challenger).unwrap();

        let one = m.set_ready(&"alice".into(), fleet.clone(), &rules, GRID_SIZE).unwrap();
        assert_eq!(one.state, MatchState::SettingShips);
        assert!(one.participant(&"alice".into()).unwrap().is_ready);

        let two = one.set_ready(&"bob".into(), fleet, &rules, GRID_SIZE).unwrap();
        assert_eq!(two.state, MatchState::GameInProgress);
        assert_eq!(two.current_player_id, Some("alice".into()));
        assert!(two.check());
    }

    #[test]
    fn test_ready_validates_layout() {
        let rules = FleetRules::default();
        let m = invited().accept(&"bob".into(), FirstTurn::Challenger).unwrap();
        let mut fleet = default_fleet(&rules, GRID_SIZE).unwrap();
        fleet[5] = Ship::new(
            ShipType::Destroyer,
            place_ship(Coordinate::new(0, 1), 1, Orientation::Horizontal, GRID_SIZE).unwrap(),
            Orientation::Horizontal,
        );
        let res = m.set_ready(&"alice".into(), fleet, &rules, GRID_SIZE);
        assert!(matches!(res, Err(RuleViolation::InvalidFleet(_))));
    }

    #[test]
    fn test_ready_before_accept_rejected() {
        let rules = FleetRules::default();
        let fleet = default_fleet(&rules, GRID_SIZE).unwrap();
        let res = invited().set_ready(&"alice".into(), fleet, &rules, GRID_SIZE);
        assert!(matches!(res, Err(RuleViolation::WrongState { actual: MatchState::Invite, .. })));
    }

    #[test]
    fn test_ready_is_idempotent_for_same_layout() {
        let rules = FleetRules::default();
        let fleet = default_fleet(&rules, GRID_SIZE).unwrap();
        let m = invited()
            .accept(&"bob".into(), FirstTurn::Challenger)
            .and_then(|m| m.set_ready(&"alice".into(), fleet.clone(), &rules, GRID_SIZE))
            .unwrap();
        assert_eq!(m.set_ready(&"alice".into(), fleet.clone(), &rules, GRID_SIZE).unwrap(), m);

        let mut other = fleet;
        other[4] = Ship::new(
            ShipType::Submarine,
            place_ship(Coordinate::new(9, 9), 1, Orientation::Horizontal, GRID_SIZE).unwrap(),
            Orientation::Horizontal,
        );
        assert_eq!(
            m.set_ready(&"alice".into(), other, &rules, GRID_SIZE),
            Err(RuleViolation::AlreadyReady("alice".into()))
        );
    }

    #[test]
    fn test_ready_resent_after_hits_is_accepted() {
        let rules = FleetRules::default();
        let fleet = default_fleet(&rules, GRID_SIZE).unwrap();
        let hit = both_ready().fire(&"alice".into(), Coordinate::new(0, 1), GRID_SIZE).unwrap().next;
        assert_eq!(hit.participant(&"bob".into()).unwrap().fleet[0].hit_count(), 1);

        // the original payload carries no hits but is the same layout
        assert_eq!(hit.set_ready(&"bob".into(), fleet, &rules, GRID_SIZE), Ok(hit.clone()));
    }

    #[test]
    fn test_leave_rules() {
        assert_eq!(invited().leave(&"bob".into()), Ok(LeaveOutcome::Removed));

        let setting = invited().accept(&"bob".into(), FirstTurn::Challenger).unwrap();
        match setting.leave(&"alice".into()).unwrap() {
            LeaveOutcome::Updated(m) => {
                assert_eq!(m.state, MatchState::Canceled);
                assert_eq!(m.participants.len(), 1);
                assert_eq!(m.participants[0].id(), &PlayerId::from("bob"));
                assert!(m.check());
                assert_eq!(m.leave(&"bob".into()), Ok(LeaveOutcome::Removed));
            }
            LeaveOutcome::Removed => panic!("expected cancel"),
        }

        let playing = both_ready();
        match playing.leave(&"bob".into()).unwrap() {
            LeaveOutcome::Updated(m) => assert_eq!(m.state, MatchState::Canceled),
            LeaveOutcome::Removed => panic!("expected cancel"),
        }

        assert_eq!(playing.leave(&"carol".into()), Err(RuleViolation::NotAParticipant("carol".into())));
    }

    #[test]
    fn test_fingerprint_tracks_changes() {
        let m = invited();
        let same = m.clone();
        assert_eq!(m.fingerprint().unwrap(), same.fingerprint().unwrap());
        let accepted = m.accept(&"bob".into(), FirstTurn::Challenger).unwrap();
        assert_ne!(m.fingerprint().unwrap(), accepted.fingerprint().unwrap());
        assert_eq!(m.fingerprint().unwrap().len(), 64);
    }

    #[test]
    fn test_check_rejects_inconsistent_state() {
        let mut m = both_ready();
        m.current_player_id = Some("carol".into());
        assert!(!m.check());

        let mut m = both_ready();
        m.state = MatchState::Finished;
        assert!(!m.check());

        let mut m = both_ready();
        m.participants[0].shots_fired = vec![Coordinate::new(0, 1), Coordinate::new(0, 1)];
        assert!(!m.check());
    }

    #[test]
    fn test_json_document_shape() {
        let m = invited();
        let doc = serde_json::to_value(&m).unwrap();
        assert_eq!(doc["state"], "INVITE");
        assert_eq!(doc["participants"][0]["player"]["id"], "alice");
        assert_eq!(doc["participants"][0]["fleet"][0]["kind"], "CARRIER");
        let back: Match = serde_json::from_value(doc).unwrap();
        assert_eq!(back, m);
    }
}
