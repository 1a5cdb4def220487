// Player registry: the `players` collection.
//
// Players are created once per device and remembered in the local
// key-value store, so restarting the app keeps the same identity.

use std::collections::BTreeMap;
use std::sync::Arc;

use battleship_core::{PlayerId, PlayerIdentity, RuleViolation};
use tokio::sync::watch;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::documents::{self, PLAYERS};
use crate::error::GameError;
use crate::kv::{KeyValueStore, PLAYER_ID_KEY};
use crate::store::{DocumentStore, RetryPolicy, Snapshot};

pub struct PlayerRegistry<S> {
    store: Arc<S>,
    policy: RetryPolicy,
}

impl<S: DocumentStore> PlayerRegistry<S> {
    pub fn new(store: Arc<S>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Create a new player with a fresh id.
    #[instrument(skip(self))]
    pub async fn register(&self, name: &str) -> Result<PlayerIdentity, GameError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RuleViolation::BlankName.into());
        }
        let player = PlayerIdentity::new(Uuid::new_v4().to_string(), name);
        self.save(&player).await?;
        info!(player = %player.id, "registered player");
        Ok(player)
    }

    pub async fn lookup(&self, id: &PlayerId) -> Result<PlayerIdentity, GameError> {
        let doc = self
            .policy
            .run("get player", || self.store.get(PLAYERS, id.as_str()))
            .await?
            .ok_or_else(|| GameError::not_found("player", id))?;
        Ok(documents::decode(PLAYERS, id.as_str(), &doc)?)
    }

    /// The identity of whoever uses this device. The first call registers
    /// `name` and remembers the id under `playerId`; later calls return the
    /// stored player. If the stored player has vanished from the store it
    /// is registered again under the same id.
    #[instrument(skip(self, kv))]
    pub async fn local_identity(&self, kv: &impl KeyValueStore, name: &str) -> Result<PlayerIdentity, GameError> {
        let Some(stored) = kv.get(PLAYER_ID_KEY)? else {
            let player = self.register(name).await?;
            kv.put(PLAYER_ID_KEY, player.id.as_str())?;
            return Ok(player);
        };

        let id = PlayerId::new(stored);
        match self.lookup(&id).await {
            Ok(player) => Ok(player),
            Err(GameError::NotFound { .. }) => {
                warn!(player = %id, "stored player is gone, registering again");
                let name = name.trim();
                if name.is_empty() {
                    return Err(RuleViolation::BlankName.into());
                }
                let player = PlayerIdentity::new(id, name);
                self.save(&player).await?;
                Ok(player)
            }
            Err(err) => Err(err),
        }
    }

    /// Live view of all registered players.
    pub fn roster(&self) -> PlayerRoster {
        PlayerRoster { rx: self.store.subscribe(PLAYERS) }
    }

    async fn save(&self, player: &PlayerIdentity) -> Result<(), GameError> {
        let doc = documents::encode(PLAYERS, player.id.as_str(), player)?;
        self.policy.run("put player", || self.store.put(PLAYERS, player.id.as_str(), doc.clone())).await?;
        Ok(())
    }
}

pub struct PlayerRoster {
    rx: watch::Receiver<Snapshot>,
}

impl PlayerRoster {
    pub fn current(&mut self) -> BTreeMap<PlayerId, PlayerIdentity> {
        let snapshot = self.rx.borrow_and_update().clone();
        decode_players(&snapshot)
    }

    /// Wait for the next change. `None` once the store is gone.
    pub async fn next(&mut self) -> Option<BTreeMap<PlayerId, PlayerIdentity>> {
        self.rx.changed().await.ok()?;
        Some(self.current())
    }
}

fn decode_players(snapshot: &Snapshot) -> BTreeMap<PlayerId, PlayerIdentity> {
    snapshot
        .iter()
        .filter_map(|(id, doc)| match documents::decode::<PlayerIdentity>(PLAYERS, id, doc) {
            Ok(player) => Some((player.id.clone(), player)),
            Err(err) => {
                warn!(error = %err, "skipping undecodable player");
                None
            }
        })
        .collect()
}
