//! The room aggregate: identity, roster, round counter and phase.

use crate::{Guess, Player};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// Phase of a session.
///
/// Allowed transitions:
///
/// | from              | to                                |
/// |-------------------|-----------------------------------|
/// | WaitingForPlayers | Discussing, Finished              |
/// | Discussing        | Discussing, Voting, Finished      |
/// | Voting            | Discussing, Finished              |
/// | Finished          | (none)                            |
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GameStatus {
    #[default]
    WaitingForPlayers,
    Discussing,
    Voting,
    Finished,
}

impl GameStatus {
    pub fn can_transition_to(self, next: GameStatus) -> bool {
        use GameStatus::*;
        matches!(
            (self, next),
            (WaitingForPlayers, Discussing)
                | (WaitingForPlayers, Finished)
                | (Discussing, Discussing)
                | (Discussing, Voting)
                | (Discussing, Finished)
                | (Voting, Discussing)
                | (Voting, Finished)
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub host_player_id: String,
    pub status: GameStatus,
    pub players: Vec<Player>,
    pub current_round: u32,
    pub max_players: usize,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub round_start_time: DateTime<Utc>,
    pub recent_guesses: VecDeque<Guess>,
}

impl Session {
    /// Builds a fresh room with `host` as its only player.
    pub fn new(id: impl Into<String>, host: Player, max_players: usize, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            host_player_id: host.id.clone(),
            status: GameStatus::WaitingForPlayers,
            players: vec![host],
            current_round: 0,
            max_players,
            created_at: now,
            started_at: None,
            round_start_time: now,
            recent_guesses: VecDeque::new(),
        }
    }

    pub fn voting_phase(&self) -> bool {
        self.status == GameStatus::Voting
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    pub fn host(&self) -> Option<&Player> {
        self.player(&self.host_player_id)
    }

    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_alive).count()
    }

    /// Moves to `next` if the transition table allows it.
    pub fn transition(&mut self, next: GameStatus) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }

    /// Appends to the activity feed, dropping the oldest entries beyond `limit`.
    pub fn push_guess(&mut self, guess: Guess, limit: usize) {
        self.recent_guesses.push_back(guess);
        while self.recent_guesses.len() > limit {
            self.recent_guesses.pop_front();
        }
    }

    /// Checks the structural invariants a restored session must satisfy.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("session id is empty".to_string());
        }
        if self.max_players < crate::MIN_PLAYERS {
            return Err(format!("max_players {} below minimum", self.max_players));
        }
        if self.players.len() > self.max_players {
            return Err(format!("{} players exceed capacity {}", self.players.len(), self.max_players));
        }

        let mut seen = HashSet::new();
        for player in &self.players {
            if !seen.insert(player.id.as_str()) {
                return Err(format!("duplicate player id {}", player.id));
            }
            if player.nickname.trim().is_empty() {
                return Err(format!("player {} has an empty nickname", player.id));
            }
        }

        let hosts: Vec<&Player> = self.players.iter().filter(|p| p.is_host).collect();
        match hosts.as_slice() {
            [host] if host.id == self.host_player_id => Ok(()),
            [_] => Err("host flag does not match host_player_id".to_string()),
            _ => Err(format!("expected exactly one host, found {}", hosts.len())),
        }
    }
}
