// Coordinator configuration.
//
// Defaults describe the standard game: a 10x10 board, the canonical fleet,
// the challenger shooting first. A JSON file can override any subset of
// the fields; durations are given in milliseconds.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use battleship_core::{FirstTurn, FleetError, FleetRules, GRID_SIZE};
use serde::{Deserialize, Serialize};

use crate::store::RetryPolicy;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "BATTLESHIP_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub grid_size: u8,
    pub first_turn: FirstTurn,
    pub fleet: FleetRules,
    #[serde(with = "millis", rename = "request_timeout_ms")]
    pub request_timeout: Duration,
    pub max_retries: u32,
    #[serde(with = "millis", rename = "retry_backoff_ms")]
    pub retry_backoff: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            grid_size: GRID_SIZE,
            first_turn: FirstTurn::Challenger,
            fleet: FleetRules::default(),
            request_timeout: Duration::from_secs(5),
            max_retries: 3,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

impl CoordinatorConfig {
    pub fn with_grid_size(mut self, grid_size: u8) -> Self {
        self.grid_size = grid_size;
        self
    }

    pub fn with_first_turn(mut self, first_turn: FirstTurn) -> Self {
        self.first_turn = first_turn;
        self
    }

    pub fn with_fleet(mut self, fleet: FleetRules) -> Self {
        self.fleet = fleet;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy { timeout: self.request_timeout, max_retries: self.max_retries, backoff: self.retry_backoff }
    }

    /// The fleet rules must be playable on the configured board.
    pub fn validate(&self) -> Result<(), FleetError> {
        self.fleet.check(self.grid_size)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        let config: Self =
            serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
        config.validate().with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Load the file named by `BATTLESHIP_CONFIG`, or the defaults when the
    /// variable is unset.
    pub fn from_env() -> anyhow::Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_json_file(path),
            None => Ok(Self::default()),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
