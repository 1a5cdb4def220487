// Match coordinator: the only writer of match documents.
//
// Every operation is a read-validate-commit cycle on one match, run while
// holding that match's lock, so intents on the same match are applied one
// at a time in arrival order while different matches proceed in parallel.
// The engine decides; the coordinator only loads, persists and logs.
//
// Store writes are retried on transport failures. Before each retry the
// match is read back: if the revision we tried to write is already there
// the earlier request landed and is not repeated, which keeps a shot from
// being counted twice.
//
// The locks live in this process only. One coordinator is the single
// authority over a store; `revision` is not used as a conditional-write
// guard, so a second coordinator writing the same matches would lose
// updates.

use std::sync::Arc;

use battleship_core::{
    Coordinate, LeaveOutcome, Match, MatchId, MatchState, MatchUpdate, PlayerId, RuleViolation, Ship,
};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn, Span};
use uuid::Uuid;

use crate::config::CoordinatorConfig;
use crate::documents::{self, MATCHES};
use crate::error::{GameError, StoreError};
use crate::feed::{decode_matches, MatchFeed, MatchWatcher};
use crate::registry::PlayerRegistry;
use crate::store::{DocumentStore, RetryPolicy};

// What to do with the match after an intent was validated.
enum Commit {
    Put(Match),
    Remove,
    Keep,
}

pub struct MatchCoordinator<S> {
    store: Arc<S>,
    config: CoordinatorConfig,
    policy: RetryPolicy,
    locks: DashMap<MatchId, Arc<Mutex<()>>>,
}

impl<S: DocumentStore> MatchCoordinator<S> {
    pub fn new(store: Arc<S>, config: CoordinatorConfig) -> Result<Self, GameError> {
        config.validate()?;
        let policy = config.retry_policy();
        Ok(Self { store, config, policy, locks: DashMap::new() })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Registry sharing this coordinator's store and retry policy.
    pub fn registry(&self) -> PlayerRegistry<S> {
        PlayerRegistry::new(self.store.clone(), self.policy)
    }

    /// Challenge `challenged`. Both players must be registered. The match
    /// starts in INVITE with the default fleet on both sides.
    #[instrument(skip_all, fields(match_id = tracing::field::Empty, player = %challenger, opponent = %challenged))]
    pub async fn create_match(&self, challenger: &PlayerId, challenged: &PlayerId) -> Result<MatchId, GameError> {
        if challenger == challenged {
            return Err(RuleViolation::SelfChallenge.into());
        }
        let registry = self.registry();
        let challenger = registry.lookup(challenger).await?;
        let challenged = registry.lookup(challenged).await?;

        let id = MatchId::from(Uuid::new_v4());
        Span::current().record("match_id", tracing::field::display(id));
        let mut created = Match::invite(id, challenger, challenged, &self.config.fleet, self.config.grid_size)?;
        created.revision = 1;

        let lock = self.lock_for(id);
        let written = {
            let _guard = lock.lock().await;
            self.write(&created).await
        };
        self.release(id, lock);
        written?;
        info!("match created");
        Ok(id)
    }

    #[instrument(skip_all, fields(match_id = %match_id, player = %accepter))]
    pub async fn accept_invite(&self, match_id: MatchId, accepter: &PlayerId) -> Result<Match, GameError> {
        let first_turn = self.config.first_turn;
        let (committed, ()) = self
            .transact(match_id, |current| Ok((Commit::Put(current.accept(accepter, first_turn)?), ())))
            .await?;
        let accepted = still_present(committed, match_id)?;
        info!(first = ?accepted.current_player_id, "invite accepted");
        Ok(accepted)
    }

    /// Declining deletes the match; it never started.
    #[instrument(skip_all, fields(match_id = %match_id))]
    pub async fn decline_invite(&self, match_id: MatchId) -> Result<(), GameError> {
        self.transact(match_id, |current| {
            current.decline()?;
            Ok((Commit::Remove, ()))
        })
        .await?;
        info!("invite declined");
        Ok(())
    }

    /// Commit `fleet` for `player` and mark them ready. Safe to repeat with
    /// the same layout.
    #[instrument(skip_all, fields(match_id = %match_id, player = %player))]
    pub async fn set_ready(&self, match_id: MatchId, player: &PlayerId, fleet: Vec<Ship>) -> Result<Match, GameError> {
        let rules = &self.config.fleet;
        let grid_size = self.config.grid_size;
        let (committed, started) = self
            .transact(match_id, |current| {
                let next = current.set_ready(player, fleet, rules, grid_size)?;
                if next == *current {
                    return Ok((Commit::Keep, false));
                }
                let started = next.state == MatchState::GameInProgress;
                Ok((Commit::Put(next), started))
            })
            .await?;
        let ready = still_present(committed, match_id)?;
        if started {
            info!(first = ?ready.current_player_id, "both fleets ready, match started");
        } else {
            info!("fleet committed");
        }
        Ok(ready)
    }

    #[instrument(skip_all, fields(match_id = %match_id, player = %shooter, target = %target))]
    pub async fn fire_shot(
        &self,
        match_id: MatchId,
        shooter: &PlayerId,
        target: Coordinate,
    ) -> Result<MatchUpdate, GameError> {
        let grid_size = self.config.grid_size;
        let (committed, outcome) = self
            .transact(match_id, |current| {
                let update = current.fire(shooter, target, grid_size)?;
                Ok((Commit::Put(update.next), update.outcome))
            })
            .await?;
        let next = still_present(committed, match_id)?;
        info!(?outcome, revision = next.revision, "shot resolved");
        if next.state == MatchState::Finished {
            info!(winner = ?next.winner_id, "match finished");
        }
        Ok(MatchUpdate { next, target, outcome })
    }

    /// Leave a match. Returns the remaining match, or `None` when the
    /// record was removed.
    #[instrument(skip_all, fields(match_id = %match_id, player = %player))]
    pub async fn leave_match(&self, match_id: MatchId, player: &PlayerId) -> Result<Option<Match>, GameError> {
        let (committed, ()) = self
            .transact(match_id, |current| {
                let commit = match current.leave(player)? {
                    LeaveOutcome::Removed => Commit::Remove,
                    LeaveOutcome::Updated(next) => Commit::Put(next),
                };
                Ok((commit, ()))
            })
            .await?;
        match &committed {
            Some(remaining) => info!(state = %remaining.state, "player left"),
            None => info!("player left, match removed"),
        }
        Ok(committed)
    }

    pub async fn get_match(&self, match_id: MatchId) -> Result<Match, GameError> {
        self.load(match_id).await
    }

    /// Every match `player` takes part in, as of the latest snapshot.
    pub fn matches_for(&self, player: &PlayerId) -> Vec<Match> {
        self.subscribe().current().into_values().filter(|m| m.is_participant(player)).collect()
    }

    /// Invites waiting for `player` to answer.
    pub fn pending_invites_for(&self, player: &PlayerId) -> Vec<Match> {
        self.matches_for(player)
            .into_iter()
            .filter(|m| m.state == MatchState::Invite && m.invitee().is_some_and(|p| p.id() == player))
            .collect()
    }

    pub fn subscribe(&self) -> MatchFeed {
        MatchFeed::new(self.store.subscribe(MATCHES))
    }

    pub fn watch(&self, match_id: MatchId) -> MatchWatcher {
        MatchWatcher::new(match_id, self.store.subscribe(MATCHES))
    }

    /// Number of matches currently in the store.
    pub fn match_count(&self) -> usize {
        let snapshot = self.store.subscribe(MATCHES).borrow().clone();
        decode_matches(&snapshot).len()
    }

    fn lock_for(&self, match_id: MatchId) -> Arc<Mutex<()>> {
        self.locks.entry(match_id).or_default().clone()
    }

    // Drops the lock entry once no other intent holds or waits on it.
    // `lock_for` clones under the same shard lock, so the count is exact.
    fn release(&self, match_id: MatchId, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.locks.remove_if(&match_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn transact<T>(
        &self,
        match_id: MatchId,
        action: impl FnOnce(&Match) -> Result<(Commit, T), RuleViolation>,
    ) -> Result<(Option<Match>, T), GameError> {
        let lock = self.lock_for(match_id);
        let result = {
            let _guard = lock.lock().await;
            self.apply(match_id, action).await
        };
        self.release(match_id, lock);
        result
    }

    async fn apply<T>(
        &self,
        match_id: MatchId,
        action: impl FnOnce(&Match) -> Result<(Commit, T), RuleViolation>,
    ) -> Result<(Option<Match>, T), GameError> {
        let current = self.load(match_id).await?;
        let (commit, value) = action(&current).map_err(|err| {
            debug!(error = %err, state = %current.state, "intent rejected");
            err
        })?;
        let committed = match commit {
            Commit::Keep => Some(current),
            Commit::Put(mut next) => {
                next.revision = current.revision + 1;
                self.write(&next).await?;
                Some(next)
            }
            Commit::Remove => {
                self.remove(match_id).await?;
                None
            }
        };
        Ok((committed, value))
    }

    async fn load(&self, match_id: MatchId) -> Result<Match, GameError> {
        let key = match_id.to_string();
        let doc = self.policy.run("get match", || self.store.get(MATCHES, &key)).await?;
        let doc = doc.ok_or_else(|| GameError::not_found("match", match_id))?;
        Ok(documents::decode(MATCHES, &key, &doc)?)
    }

    async fn read_once(&self, match_id: MatchId) -> Result<Option<Match>, StoreError> {
        let key = match_id.to_string();
        let doc = self.policy.once(self.store.get(MATCHES, &key)).await?;
        doc.map(|doc| documents::decode(MATCHES, &key, &doc)).transpose()
    }

    async fn write(&self, next: &Match) -> Result<(), GameError> {
        let key = next.id.to_string();
        let doc = documents::encode(MATCHES, &key, next)?;
        let mut attempt = 0;
        loop {
            let err = match self.policy.once(self.store.put(MATCHES, &key, doc.clone())).await {
                Ok(()) => {
                    debug!(revision = next.revision, "match written");
                    return Ok(());
                }
                Err(err) => err,
            };
            if !err.is_retryable() || attempt >= self.policy.max_retries {
                warn!(revision = next.revision, error = %err, "giving up on match write");
                return Err(err.into());
            }
            attempt += 1;
            warn!(revision = next.revision, attempt, error = %err, "match write failed");
            self.policy.pause(attempt).await;

            // A write that reported failure may still have landed.
            if let Ok(Some(stored)) = self.read_once(next.id).await {
                if stored == *next {
                    debug!(revision = next.revision, "earlier write landed, not repeating it");
                    return Ok(());
                }
            }
        }
    }

    async fn remove(&self, match_id: MatchId) -> Result<(), GameError> {
        let key = match_id.to_string();
        self.policy.run("delete match", || self.store.delete(MATCHES, &key)).await?;
        Ok(())
    }
}

fn still_present(committed: Option<Match>, match_id: MatchId) -> Result<Match, GameError> {
    committed.ok_or_else(|| GameError::not_found("match", match_id))
}
