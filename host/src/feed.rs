// Live views over the `matches` collection.
//
// `MatchFeed` decodes whole snapshots for lobby style screens. A
// `MatchWatcher` follows a single match and only wakes its owner when
// that match actually changed, using the match fingerprint to drop
// notifications caused by other matches.

use std::collections::BTreeMap;

use battleship_core::{Match, MatchId};
use tokio::sync::watch;
use tracing::warn;

use crate::documents::{self, MATCHES};
use crate::store::Snapshot;

pub struct MatchFeed {
    rx: watch::Receiver<Snapshot>,
}

impl MatchFeed {
    pub(crate) fn new(rx: watch::Receiver<Snapshot>) -> Self {
        Self { rx }
    }

    pub fn current(&mut self) -> BTreeMap<MatchId, Match> {
        let snapshot = self.rx.borrow_and_update().clone();
        decode_matches(&snapshot)
    }

    /// Wait for the next snapshot. `None` once the store is gone.
    pub async fn next(&mut self) -> Option<BTreeMap<MatchId, Match>> {
        self.rx.changed().await.ok()?;
        Some(self.current())
    }
}

pub struct MatchWatcher {
    id: MatchId,
    key: String,
    rx: watch::Receiver<Snapshot>,
    last: Option<String>,
}

impl MatchWatcher {
    pub(crate) fn new(id: MatchId, rx: watch::Receiver<Snapshot>) -> Self {
        Self { id, key: id.to_string(), rx, last: None }
    }

    pub fn match_id(&self) -> MatchId {
        self.id
    }

    /// The match as of its next change. The first call returns the current
    /// value right away. `None` means the match no longer exists.
    pub async fn changed(&mut self) -> Option<Match> {
        loop {
            let doc = self.rx.borrow_and_update().get(&self.key).cloned();
            let doc = doc?;
            match documents::decode::<Match>(MATCHES, &self.key, &doc) {
                Ok(current) => {
                    let fingerprint = current.fingerprint().ok();
                    if fingerprint.is_none() || fingerprint != self.last {
                        self.last = fingerprint;
                        return Some(current);
                    }
                }
                Err(err) => warn!(match_id = %self.id, error = %err, "skipping undecodable match"),
            }
            self.rx.changed().await.ok()?;
        }
    }
}

pub(crate) fn decode_matches(snapshot: &Snapshot) -> BTreeMap<MatchId, Match> {
    snapshot
        .iter()
        .filter_map(|(key, doc)| {
            let decoded = key.parse::<MatchId>().map_err(|err| err.to_string()).and_then(|id| {
                documents::decode::<Match>(MATCHES, key, doc).map(|m| (id, m)).map_err(|err| err.to_string())
            });
            match decoded {
                Ok(entry) => Some(entry),
                Err(error) => {
                    warn!(key = %key, %error, "skipping undecodable match");
                    None
                }
            }
        })
        .collect()
}
