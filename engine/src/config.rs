//! Engine configuration.

use serde::{Deserialize, Serialize};
use shared::{DISCUSSION_TIME_SECONDS, MAX_PLAYERS, RECENT_GUESS_LIMIT};
use std::time::Duration;

pub const SESSION_STORAGE_KEY: &str = "undercover_game_session";

/// Encoding used for saved session snapshots.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    #[default]
    Json,
    Bincode,
}

impl std::str::FromStr for SnapshotFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(SnapshotFormat::Json),
            "bincode" => Ok(SnapshotFormat::Bincode),
            other => Err(format!("unknown snapshot format: {}", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// How long a round is discussed before voting opens.
    pub discussion_duration: Duration,
    /// Capacity used by `create_game`.
    pub room_capacity: usize,
    pub recent_guess_limit: usize,
    pub snapshot_format: SnapshotFormat,
    pub storage_key: String,
    /// Seeds role dealing and coin flips; entropy when unset.
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            discussion_duration: Duration::from_secs(DISCUSSION_TIME_SECONDS),
            room_capacity: MAX_PLAYERS,
            recent_guess_limit: RECENT_GUESS_LIMIT,
            snapshot_format: SnapshotFormat::default(),
            storage_key: SESSION_STORAGE_KEY.to_string(),
            rng_seed: None,
        }
    }
}

impl EngineConfig {
    pub fn with_discussion_duration(mut self, duration: Duration) -> Self {
        self.discussion_duration = duration;
        self
    }

    pub fn with_snapshot_format(mut self, format: SnapshotFormat) -> Self {
        self.snapshot_format = format;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }
}
