// Library entry for the host crate: everything around the rules engine.
// The coordinator owns match documents, the registry owns player
// documents, and both talk to a `DocumentStore`. Integration tests and the
// `simulate` binary depend on this crate as a library.

pub mod config;
pub mod documents;
pub mod error;
pub mod feed;
pub mod game_coordinator;
pub mod kv;
pub mod registry;
pub mod setup;
pub mod store;
pub mod telemetry;
pub mod visualize;

pub use config::CoordinatorConfig;
pub use error::{GameError, StoreError};
pub use feed::{MatchFeed, MatchWatcher};
pub use game_coordinator::MatchCoordinator;
pub use kv::{JsonFileStore, KeyValueStore, MemoryKeyValueStore};
pub use registry::{PlayerRegistry, PlayerRoster};
pub use setup::SetupSession;
pub use store::{DocumentStore, MemoryStore, RetryPolicy};
