//! Caller-facing surface: the calls a UI or transport layer makes.
//!
//! These wrap the lower-level engine operations and flatten their results
//! into the shapes a client expects (`Option` for "nothing to show").

use crate::engine::SessionEngine;
use crate::error::{EngineError, EngineResult};
use crate::roles::RolePolicy;
use crate::words::{FallbackWordSource, WordPairSource};
use log::info;
use shared::{SecretPair, Session};

impl SessionEngine {
    /// Creates a game sized to the configured room capacity.
    pub async fn create_game(&self, host_nickname: &str) -> EngineResult<Session> {
        self.start_game(host_nickname, self.config().room_capacity).await
    }

    /// Joins `game_id`, returning the updated public state, or `None` if the
    /// game does not exist, is full, or the nickname is empty.
    pub async fn join_game(&self, game_id: &str, nickname: &str) -> Option<Session> {
        match self.add_player(game_id, nickname).await {
            Ok(join) => Some(join.session),
            Err(e) => {
                info!("Join of {:?} to game {} refused: {}", nickname, game_id, e);
                None
            }
        }
    }

    pub async fn get_game_state(&self, game_id: &str) -> Option<Session> {
        self.get_session(game_id).await
    }

    pub async fn list_available_games(&self) -> Vec<Session> {
        self.list_sessions().await
    }

    /// The engine is purely local, so it is always healthy.
    pub fn check_health(&self) -> bool {
        true
    }

    /// Picks a pair from `category`, deals roles with `policy` and starts the
    /// next round, all under one lock.
    pub async fn start_round<S: WordPairSource>(
        &self,
        game_id: &str,
        words: &FallbackWordSource<S>,
        category: &str,
        policy: &dyn RolePolicy,
    ) -> EngineResult<SecretPair> {
        let weak = self.weak_state();
        let mut guard = self.state().write().await;
        let state = &mut *guard;

        let pair = words.secret_pair_for(category, &mut state.rng);
        state.deal_roles(game_id, &pair, policy)?;
        if !state.advance_round(weak, game_id, self.config().discussion_duration) {
            return Err(EngineError::GameFinished);
        }
        Ok(pair)
    }
}
