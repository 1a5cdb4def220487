// simulate: play one complete match between two random players through the
// coordinator and an in-memory store, then print both boards.
//
// usage: simulate [--seed N] [--config PATH]

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use battleship_core::{all_coordinates, Coordinate, MatchState, PlayerId};
use battleship_host::visualize::{render_own_board, side_by_side};
use battleship_host::{telemetry, CoordinatorConfig, MatchCoordinator, MemoryStore, SetupSession};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

struct Args {
    seed: u64,
    config: Option<String>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut parsed = Args { seed: 0, config: None };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--seed" => {
                    let value = args.next().context("--seed needs a value")?;
                    parsed.seed = value.parse().with_context(|| format!("bad seed {value:?}"))?;
                }
                "--config" => parsed.config = Some(args.next().context("--config needs a path")?),
                other => bail!("unknown argument {other:?} (usage: simulate [--seed N] [--config PATH])"),
            }
        }
        Ok(parsed)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();
    let args = Args::parse(std::env::args().skip(1))?;
    let config = match &args.config {
        Some(path) => CoordinatorConfig::from_json_file(path)?,
        None => CoordinatorConfig::from_env()?,
    };
    let grid_size = config.grid_size;
    let mut rng = StdRng::seed_from_u64(args.seed);

    let coordinator = MatchCoordinator::new(Arc::new(MemoryStore::new()), config)?;
    let registry = coordinator.registry();
    let alice = registry.register("Alice").await?;
    let bob = registry.register("Bob").await?;

    let match_id = coordinator.create_match(&alice.id, &bob.id).await?;
    coordinator.accept_invite(match_id, &bob.id).await?;
    for player in [&alice, &bob] {
        let mut session = SetupSession::begin(&coordinator, match_id, &player.id).await?;
        session.randomize(&mut rng)?;
        session.commit(&coordinator).await?;
    }

    // Each side fires at the board in its own random order.
    let mut targets: HashMap<PlayerId, Vec<Coordinate>> = HashMap::new();
    for player in [&alice, &bob] {
        let mut order: Vec<Coordinate> = all_coordinates(grid_size).collect();
        order.shuffle(&mut rng);
        targets.insert(player.id.clone(), order);
    }

    let mut current = coordinator.get_match(match_id).await?;
    let mut shots = 0usize;
    while current.state == MatchState::GameInProgress {
        let shooter = current.current_player_id.clone().context("match in progress without a current player")?;
        let target = targets.get_mut(&shooter).and_then(Vec::pop).context("shooter ran out of targets")?;
        let update = coordinator.fire_shot(match_id, &shooter, target).await?;
        shots += 1;
        current = update.next;
    }

    let winner = current
        .winner_id
        .as_ref()
        .and_then(|id| current.participant(id))
        .map(|p| p.player.name.clone())
        .context("match ended without a winner")?;
    info!(%match_id, shots, %winner, "simulation finished");

    let (Some(a), Some(b)) = (current.participant(&alice.id), current.participant(&bob.id)) else {
        bail!("participants missing from finished match");
    };
    println!("{:<width$}    {}", alice.name, bob.name, width = usize::from(grid_size) * 3 + 3);
    println!(
        "{}",
        side_by_side(&render_own_board(a, Some(b), grid_size), &render_own_board(b, Some(a), grid_size))
    );
    println!("{winner} wins after {shots} shots (seed {})", args.seed);
    Ok(())
}
