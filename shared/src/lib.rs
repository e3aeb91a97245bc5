use serde::{Deserialize, Serialize};
use std::fmt;

pub mod session;
pub mod words;

pub use session::{GameStatus, Session};
pub use words::{SecretPair, WordPair, WordPairCategory};

pub const MIN_PLAYERS: usize = 3;
pub const MAX_PLAYERS: usize = 10;
pub const DEFAULT_MAX_PLAYERS: usize = 8;
pub const DISCUSSION_TIME_SECONDS: u64 = 300;
pub const VOTING_TIME_SECONDS: u64 = 60;
pub const RESULTS_TIME_SECONDS: u64 = 15;
pub const ROOM_CODE_LENGTH: usize = 6;
pub const RECENT_GUESS_LIMIT: usize = 20;

/// Secret role handed to a player when roles are dealt.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    #[default]
    Civilian,
    Undercover,
    MrWhite,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Civilian => "Civilian",
            Role::Undercover => "Undercover",
            Role::MrWhite => "MrWhite",
        };
        f.write_str(name)
    }
}

/// Public view of a player, visible to everyone in the room.
///
/// Never carries the role or the secret word; those only travel inside
/// [`PrivatePlayerInfo`].
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: String,
    pub nickname: String,
    pub is_alive: bool,
    pub is_host: bool,
}

impl Player {
    pub fn new(id: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nickname: nickname.into(),
            is_alive: true,
            is_host: false,
        }
    }

    pub fn host(id: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            is_host: true,
            ..Self::new(id, nickname)
        }
    }
}

/// Role and word assigned to one player. Held apart from the public roster.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct PlayerSecret {
    pub role: Role,
    pub word: String,
}

impl PlayerSecret {
    pub fn new(role: Role, word: impl Into<String>) -> Self {
        Self {
            role,
            word: word.into(),
        }
    }
}

/// A player's own view of themselves: the public record plus their secret.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PrivatePlayerInfo {
    pub player: Player,
    pub role: Role,
    pub secret_word: String,
}

impl PrivatePlayerInfo {
    pub fn new(player: Player, secret: &PlayerSecret) -> Self {
        Self {
            player,
            role: secret.role,
            secret_word: secret.word.clone(),
        }
    }

    pub fn id(&self) -> &str {
        &self.player.id
    }
}

/// One entry of the room's activity feed.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Guess {
    pub player_id: String,
    pub target_player_id: String,
    pub guessed_word: String,
    pub is_correct: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub player_name: String,
    pub target_player_name: String,
}

/// Case- and whitespace-insensitive comparison used to judge guesses.
pub fn words_match(guess: &str, secret: &str) -> bool {
    let secret = secret.trim();
    !secret.is_empty() && guess.trim().eq_ignore_ascii_case(secret)
}
