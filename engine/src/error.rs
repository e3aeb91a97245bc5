//! Error types reported by the session engine and its collaborators.

use thiserror::Error;

/// Outcomes an engine operation reports instead of panicking.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("game {game_id} not found")]
    NotFound { game_id: String },

    #[error("game is full ({max_players} players)")]
    Full { max_players: usize },

    #[error("nickname must not be empty")]
    InvalidNickname,

    #[error("max players {requested} is below the minimum of {minimum}")]
    InvalidMaxPlayers { requested: usize, minimum: usize },

    #[error("player {player_id} is not in this game")]
    UnknownPlayer { player_id: String },

    #[error("game has already finished")]
    GameFinished,

    #[error("need at least {required} players, have {actual}")]
    NotEnoughPlayers { required: usize, actual: usize },

    #[error("invalid role assignment: {0}")]
    InvalidRoles(String),

    #[error("word source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl EngineError {
    pub fn not_found(game_id: &str) -> Self {
        EngineError::NotFound {
            game_id: game_id.to_string(),
        }
    }
}

/// Failures of a [`crate::persistence::SessionStore`] medium.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Failures of a [`crate::words::WordPairSource`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WordSourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("unknown category {0}")]
    UnknownCategory(String),

    #[error("category {0} has no word pairs")]
    EmptyCategory(String),
}

impl From<WordSourceError> for EngineError {
    fn from(err: WordSourceError) -> Self {
        EngineError::SourceUnavailable(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
