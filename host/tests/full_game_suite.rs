use std::sync::Arc;
use std::time::Duration;

use battleship_core::{
    all_coordinates, default_fleet, place_ship, Coordinate, HitType, MatchState, Orientation, PlayerIdentity,
    RuleViolation, Ship, ShipType, GRID_SIZE,
};
use battleship_host::visualize::render_target_board;
use battleship_host::{CoordinatorConfig, GameError, MatchCoordinator, MemoryStore, SetupSession};
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};

// End-to-end flows through the coordinator: lifecycle, shots, feeds and
// seeded random games.

struct Table {
    coordinator: MatchCoordinator<MemoryStore>,
    alice: PlayerIdentity,
    bob: PlayerIdentity,
}

async fn table() -> Table {
    let config = CoordinatorConfig::default().with_retry_backoff(Duration::from_millis(1));
    let coordinator = MatchCoordinator::new(Arc::new(MemoryStore::new()), config).unwrap();
    let registry = coordinator.registry();
    let alice = registry.register("Alice").await.unwrap();
    let bob = registry.register("Bob").await.unwrap();
    Table { coordinator, alice, bob }
}

fn ship(kind: ShipType, at: &str, len: u8, orientation: Orientation) -> Ship {
    let start: Coordinate = at.parse().unwrap();
    Ship::new(kind, place_ship(start, len, orientation, GRID_SIZE).unwrap(), orientation)
}

// Default fleet with the destroyer moved to A7.
fn fleet_with_destroyer_at_a7() -> Vec<Ship> {
    let mut fleet = default_fleet(&Default::default(), GRID_SIZE).unwrap();
    fleet[5] = ship(ShipType::Destroyer, "A7", 1, Orientation::Horizontal);
    fleet
}

#[tokio::test]
async fn test_invite_accept_ready_starts_game() {
    let t = table().await;
    let id = t.coordinator.create_match(&t.alice.id, &t.bob.id).await.unwrap();
    let m = t.coordinator.get_match(id).await.unwrap();
    assert_eq!(m.state, MatchState::Invite);
    assert_eq!(m.participants[0].player, t.alice);
    assert_eq!(m.participants[1].player, t.bob);

    let err = t.coordinator.accept_invite(id, &t.alice.id).await.unwrap_err();
    assert_eq!(err, GameError::Validation(RuleViolation::NotInvitee(t.alice.id.clone())));

    let m = t.coordinator.accept_invite(id, &t.bob.id).await.unwrap();
    assert_eq!(m.state, MatchState::SettingShips);
    assert_eq!(m.current_player_id.as_ref(), Some(&t.alice.id));

    let fleet = default_fleet(&Default::default(), GRID_SIZE).unwrap();
    let m = t.coordinator.set_ready(id, &t.alice.id, fleet.clone()).await.unwrap();
    assert_eq!(m.state, MatchState::SettingShips);
    let m = t.coordinator.set_ready(id, &t.bob.id, fleet).await.unwrap();
    assert_eq!(m.state, MatchState::GameInProgress);
    assert!(m.check());
}

#[tokio::test]
async fn test_invalid_layout_rejected_and_state_unchanged() {
    let t = table().await;
    let id = t.coordinator.create_match(&t.alice.id, &t.bob.id).await.unwrap();
    t.coordinator.accept_invite(id, &t.bob.id).await.unwrap();
    let before = t.coordinator.get_match(id).await.unwrap();

    let mut overlapping = default_fleet(&Default::default(), GRID_SIZE).unwrap();
    overlapping[4] = ship(ShipType::Submarine, "B1", 1, Orientation::Horizontal);
    let err = t.coordinator.set_ready(id, &t.alice.id, overlapping).await.unwrap_err();
    assert!(matches!(err, GameError::Validation(RuleViolation::InvalidFleet(_))));

    let mut missing = default_fleet(&Default::default(), GRID_SIZE).unwrap();
    missing.pop();
    assert!(t.coordinator.set_ready(id, &t.alice.id, missing).await.is_err());

    assert_eq!(t.coordinator.get_match(id).await.unwrap(), before);
}

#[tokio::test]
async fn test_destroyer_at_a7_sinks_on_first_hit() {
    let t = table().await;
    let id = t.coordinator.create_match(&t.alice.id, &t.bob.id).await.unwrap();
    t.coordinator.accept_invite(id, &t.bob.id).await.unwrap();
    t.coordinator.set_ready(id, &t.alice.id, default_fleet(&Default::default(), GRID_SIZE).unwrap()).await.unwrap();
    t.coordinator.set_ready(id, &t.bob.id, fleet_with_destroyer_at_a7()).await.unwrap();

    let update = t.coordinator.fire_shot(id, &t.alice.id, "A7".parse().unwrap()).await.unwrap();
    assert_eq!(update.outcome, HitType::Sunk(ShipType::Destroyer));
    let bob_side = update.next.participant(&t.bob.id).unwrap();
    assert!(bob_side.fleet.iter().find(|s| s.kind == ShipType::Destroyer).unwrap().is_sunk());
    // a hit keeps the turn
    assert_eq!(update.next.current_player_id.as_ref(), Some(&t.alice.id));
}

#[tokio::test]
async fn test_carrier_sinks_on_d1_and_turns_alternate() {
    let t = table().await;
    let id = t.coordinator.create_match(&t.alice.id, &t.bob.id).await.unwrap();
    t.coordinator.accept_invite(id, &t.bob.id).await.unwrap();
    let fleet = default_fleet(&Default::default(), GRID_SIZE).unwrap();
    t.coordinator.set_ready(id, &t.alice.id, fleet.clone()).await.unwrap();
    t.coordinator.set_ready(id, &t.bob.id, fleet).await.unwrap();

    for cell in ["A1", "B1", "C1"] {
        let update = t.coordinator.fire_shot(id, &t.alice.id, cell.parse().unwrap()).await.unwrap();
        assert_eq!(update.outcome, HitType::Hit(ShipType::Carrier));
    }
    let carrier = t.coordinator.get_match(id).await.unwrap().participant(&t.bob.id).unwrap().fleet[0].clone();
    assert!(!carrier.is_sunk());

    let update = t.coordinator.fire_shot(id, &t.alice.id, "D1".parse().unwrap()).await.unwrap();
    assert_eq!(update.outcome, HitType::Sunk(ShipType::Carrier));

    // miss passes the turn, bob answers
    let update = t.coordinator.fire_shot(id, &t.alice.id, "J10".parse().unwrap()).await.unwrap();
    assert_eq!(update.outcome, HitType::Miss);
    assert_eq!(update.next.current_player_id.as_ref(), Some(&t.bob.id));
    let err = t.coordinator.fire_shot(id, &t.alice.id, "J9".parse().unwrap()).await.unwrap_err();
    assert_eq!(err, GameError::Validation(RuleViolation::OutOfTurn(t.alice.id.clone())));

    let shooter = update.next.participant(&t.alice.id).unwrap();
    let target = update.next.participant(&t.bob.id).unwrap();
    let view = render_target_board(shooter, target, GRID_SIZE);
    assert!(view.lines().nth(1).unwrap().starts_with(" 1  #  #  #  #"));
}

#[tokio::test]
async fn test_decline_removes_match() {
    let t = table().await;
    let id = t.coordinator.create_match(&t.alice.id, &t.bob.id).await.unwrap();
    t.coordinator.decline_invite(id).await.unwrap();
    assert!(t.coordinator.get_match(id).await.unwrap_err().is_not_found());
    assert!(t.coordinator.accept_invite(id, &t.bob.id).await.unwrap_err().is_not_found());
    assert!(t.coordinator.decline_invite(id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_leave_rules() {
    let t = table().await;

    // during the invite the match simply disappears
    let invite = t.coordinator.create_match(&t.alice.id, &t.bob.id).await.unwrap();
    assert_eq!(t.coordinator.leave_match(invite, &t.alice.id).await.unwrap(), None);
    assert!(t.coordinator.get_match(invite).await.unwrap_err().is_not_found());

    // while setting ships the other side is left with a canceled match
    let setting = t.coordinator.create_match(&t.alice.id, &t.bob.id).await.unwrap();
    t.coordinator.accept_invite(setting, &t.bob.id).await.unwrap();
    let remaining = t.coordinator.leave_match(setting, &t.alice.id).await.unwrap().unwrap();
    assert_eq!(remaining.state, MatchState::Canceled);
    assert_eq!(remaining.participants.len(), 1);

    // nothing can be done on a canceled match
    let fleet = default_fleet(&Default::default(), GRID_SIZE).unwrap();
    let err = t.coordinator.set_ready(setting, &t.bob.id, fleet).await.unwrap_err();
    assert!(matches!(err, GameError::Validation(RuleViolation::WrongState { actual: MatchState::Canceled, .. })));

    // last one out removes the record
    assert_eq!(t.coordinator.leave_match(setting, &t.bob.id).await.unwrap(), None);
    assert!(t.coordinator.get_match(setting).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_watcher_follows_one_match() {
    let t = table().await;
    let id = t.coordinator.create_match(&t.alice.id, &t.bob.id).await.unwrap();
    let mut watcher = t.coordinator.watch(id);
    let first = watcher.changed().await.unwrap();
    assert_eq!(first.state, MatchState::Invite);

    // another match changing does not wake the watcher with a duplicate
    let other = t.coordinator.create_match(&t.bob.id, &t.alice.id).await.unwrap();
    t.coordinator.accept_invite(id, &t.bob.id).await.unwrap();
    let second = watcher.changed().await.unwrap();
    assert_eq!(second.state, MatchState::SettingShips);
    assert_eq!(second.revision, first.revision + 1);

    let mut feed = t.coordinator.subscribe();
    let all = feed.current();
    assert_eq!(all.len(), 2);
    assert!(all.contains_key(&other));

    t.coordinator.leave_match(id, &t.alice.id).await.unwrap();
    t.coordinator.leave_match(id, &t.bob.id).await.unwrap();
    let mut gone = None;
    for _ in 0..3 {
        match watcher.changed().await {
            Some(m) => assert_eq!(m.state, MatchState::Canceled),
            None => {
                gone = Some(());
                break;
            }
        }
    }
    assert!(gone.is_some(), "watcher should report removal");
}

#[tokio::test]
async fn test_setup_session_commits_edited_layout() {
    let t = table().await;
    let id = t.coordinator.create_match(&t.alice.id, &t.bob.id).await.unwrap();

    let err = SetupSession::begin(&t.coordinator, id, &t.alice.id).await.unwrap_err();
    assert!(matches!(err, GameError::Validation(RuleViolation::WrongState { .. })));

    t.coordinator.accept_invite(id, &t.bob.id).await.unwrap();
    let mut session = SetupSession::begin(&t.coordinator, id, &t.alice.id).await.unwrap();
    assert!(session.move_to(0, "F7".parse().unwrap()));
    assert!(session.rotate(0));
    let edited = session.ships().to_vec();
    let m = session.commit(&t.coordinator).await.unwrap();

    let alice_side = m.participant(&t.alice.id).unwrap();
    assert!(alice_side.is_ready);
    assert_eq!(alice_side.fleet, edited);
    assert_eq!(alice_side.fleet[0].orientation, Orientation::Vertical);
}

#[tokio::test]
async fn test_randomized_full_game_simulations() {
    // Run several seeded games to increase confidence
    for seed in 0_u64..8_u64 {
        let t = table().await;
        let mut rng = StdRng::seed_from_u64(seed);
        let id = t.coordinator.create_match(&t.alice.id, &t.bob.id).await.unwrap();
        t.coordinator.accept_invite(id, &t.bob.id).await.unwrap();
        for player in [&t.alice, &t.bob] {
            let mut session = SetupSession::begin(&t.coordinator, id, &player.id).await.unwrap();
            session.randomize(&mut rng).unwrap();
            session.commit(&t.coordinator).await.unwrap();
        }

        let mut alice_targets: Vec<Coordinate> = all_coordinates(GRID_SIZE).collect();
        let mut bob_targets = alice_targets.clone();
        alice_targets.shuffle(&mut rng);
        bob_targets.shuffle(&mut rng);

        let mut m = t.coordinator.get_match(id).await.unwrap();
        let mut shots = 0;
        while m.state == MatchState::GameInProgress {
            let shooter = m.current_player_id.clone().unwrap();
            let target = if shooter == t.alice.id { alice_targets.pop() } else { bob_targets.pop() }.unwrap();
            m = t.coordinator.fire_shot(id, &shooter, target).await.unwrap().next;
            shots += 1;
            assert!(shots <= 200, "game did not finish (seed {seed})");
        }

        assert_eq!(m.state, MatchState::Finished);
        assert!(m.check(), "inconsistent final state (seed {seed})");
        let winner = m.winner_id.clone().unwrap();
        let loser = m.opponent_of(&winner).unwrap();
        assert!(loser.is_defeated(), "loser still afloat (seed {seed})");
        assert!(!m.participant(&winner).unwrap().is_defeated());

        let err = t.coordinator.fire_shot(id, &winner, Coordinate::new(0, 1)).await.unwrap_err();
        assert_eq!(err, GameError::Validation(RuleViolation::GameOver));
    }
}
