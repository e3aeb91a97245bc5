//! The session state machine.
//!
//! A [`SessionEngine`] owns at most one live [`Session`]. All reads and writes,
//! including the round timer's switch to voting, go through one
//! `tokio::sync::RwLock`, and the timer holds only a weak reference to it.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::persistence::{self, SessionSnapshot, SessionStore};
use crate::roles::{self, RolePolicy};
use crate::timer::RoundTimer;
use crate::utils::{generate_player_id, generate_room_code, now, remaining_after};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    words_match, GameStatus, Guess, Player, PlayerSecret, PrivatePlayerInfo, SecretPair, Session,
    MIN_PLAYERS,
};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;

/// Result of a successful join: the private view for the joining player and
/// the public session for everyone else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerJoin {
    pub player: PrivatePlayerInfo,
    pub session: Session,
}

/// Everything behind the engine lock.
pub(crate) struct EngineState {
    session: Option<Session>,
    secrets: HashMap<String, PlayerSecret>,
    timer: RoundTimer,
    pub(crate) rng: StdRng,
}

pub(crate) type SharedState = Arc<RwLock<EngineState>>;

impl EngineState {
    fn new(rng: StdRng) -> Self {
        Self {
            session: None,
            secrets: HashMap::new(),
            timer: RoundTimer::new(),
            rng,
        }
    }

    fn session_mut(&mut self, game_id: &str) -> EngineResult<&mut Session> {
        self.session
            .as_mut()
            .filter(|s| s.id == game_id)
            .ok_or_else(|| EngineError::not_found(game_id))
    }

    fn session(&self, game_id: &str) -> Option<&Session> {
        self.session.as_ref().filter(|s| s.id == game_id)
    }

    fn install(&mut self, session: Session, secrets: HashMap<String, PlayerSecret>) {
        self.timer.cancel();
        if let Some(old) = self.session.take() {
            info!("Replacing game {} with {}", old.id, session.id);
        }
        self.session = Some(session);
        self.secrets = secrets;
    }

    fn clear(&mut self) {
        self.timer.cancel();
        self.session = None;
        self.secrets.clear();
    }

    pub(crate) fn add_player(&mut self, game_id: &str, nickname: &str) -> EngineResult<PlayerJoin> {
        let session = self
            .session
            .as_mut()
            .filter(|s| s.id == game_id)
            .ok_or_else(|| EngineError::not_found(game_id))?;

        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(EngineError::InvalidNickname);
        }
        if session.is_full() {
            info!("Rejected {} from game {}: full", nickname, game_id);
            return Err(EngineError::Full {
                max_players: session.max_players,
            });
        }

        let mut player_id = generate_player_id();
        while session.player(&player_id).is_some() {
            player_id = generate_player_id();
        }

        let player = Player::new(player_id, nickname);
        let secret = PlayerSecret::default();
        session.players.push(player.clone());
        info!(
            "Player {} joined game {} ({}/{})",
            player.nickname,
            game_id,
            session.players.len(),
            session.max_players
        );

        let join = PlayerJoin {
            player: PrivatePlayerInfo::new(player, &secret),
            session: session.clone(),
        };
        self.secrets.insert(join.player.id().to_string(), secret);
        Ok(join)
    }

    pub(crate) fn advance_round(&mut self, state: Weak<RwLock<EngineState>>, game_id: &str, discussion: Duration) -> bool {
        let Ok(session) = self.session_mut(game_id) else {
            debug!("advance_round: no game {}", game_id);
            return false;
        };
        if !session.transition(GameStatus::Discussing) {
            warn!("advance_round: game {} is {:?}", game_id, session.status);
            return false;
        }

        let started = now();
        session.current_round += 1;
        session.round_start_time = started;
        session.started_at.get_or_insert(started);
        let round = session.current_round;

        arm_voting_timer(&mut self.timer, state, game_id.to_string(), discussion);
        info!("Game {} round {} started, voting opens in {:?}", game_id, round, discussion);
        true
    }

    /// Runs on the timer task. Only the arm identified by `epoch` may open voting.
    fn open_voting(&mut self, game_id: &str, epoch: u64) -> bool {
        if !self.timer.complete(epoch) {
            debug!("Ignoring stale round timer (epoch {})", epoch);
            return false;
        }
        let Ok(session) = self.session_mut(game_id) else {
            return false;
        };
        if session.transition(GameStatus::Voting) {
            info!("Game {} round {}: voting opened", game_id, session.current_round);
            true
        } else {
            false
        }
    }

    pub(crate) fn deal_roles(&mut self, game_id: &str, pair: &SecretPair, policy: &dyn RolePolicy) -> EngineResult<()> {
        let session = self.session_mut(game_id)?;
        if session.status == GameStatus::Finished {
            return Err(EngineError::GameFinished);
        }
        if session.players.len() < MIN_PLAYERS {
            return Err(EngineError::NotEnoughPlayers {
                required: MIN_PLAYERS,
                actual: session.players.len(),
            });
        }

        let ids: Vec<String> = session.players.iter().map(|p| p.id.clone()).collect();
        self.secrets = roles::deal(&ids, pair, policy, &mut self.rng)?;
        info!("Dealt roles for game {} ({} players)", game_id, ids.len());
        Ok(())
    }

    fn record_guess(
        &mut self,
        game_id: &str,
        player_id: &str,
        target_player_id: &str,
        word: &str,
        limit: usize,
    ) -> EngineResult<Guess> {
        let target_word = self.secrets.get(target_player_id).map(|s| s.word.clone()).unwrap_or_default();
        let session = self.session_mut(game_id)?;
        if session.status == GameStatus::Finished {
            return Err(EngineError::GameFinished);
        }
        let unknown = |id: &str| EngineError::UnknownPlayer {
            player_id: id.to_string(),
        };
        let player_name = session.player(player_id).ok_or_else(|| unknown(player_id))?.nickname.clone();
        let target_name = session
            .player(target_player_id)
            .ok_or_else(|| unknown(target_player_id))?
            .nickname
            .clone();

        let guess = Guess {
            player_id: player_id.to_string(),
            target_player_id: target_player_id.to_string(),
            guessed_word: word.trim().to_string(),
            is_correct: words_match(word, &target_word),
            timestamp: now(),
            player_name,
            target_player_name: target_name,
        };
        session.push_guess(guess.clone(), limit);
        debug!(
            "Game {}: {} guessed {:?} for {} ({})",
            game_id, guess.player_name, guess.guessed_word, guess.target_player_name, guess.is_correct
        );
        Ok(guess)
    }

    fn restore(&mut self, state: Weak<RwLock<EngineState>>, snapshot: SessionSnapshot, discussion: Duration) {
        let SessionSnapshot { session, secrets, .. } = snapshot;
        let game_id = session.id.clone();
        self.install(session, secrets);

        let Ok(session) = self.session_mut(&game_id) else {
            return;
        };
        if session.status != GameStatus::Discussing {
            return;
        }
        match remaining_after(session.round_start_time, discussion, now()) {
            Some(left) => {
                arm_voting_timer(&mut self.timer, state, game_id.clone(), left);
                info!("Resumed discussion in game {}, voting opens in {:?}", game_id, left);
            }
            None => {
                session.transition(GameStatus::Voting);
                info!("Discussion in game {} ran out while saved, voting opened", game_id);
            }
        }
    }
}

fn arm_voting_timer(timer: &mut RoundTimer, state: Weak<RwLock<EngineState>>, game_id: String, delay: Duration) {
    timer.arm(delay, move |epoch| async move {
        let Some(state) = state.upgrade() else {
            return;
        };
        let mut guard = state.write().await;
        guard.open_voting(&game_id, epoch);
    });
}

/// Cloneable handle to one engine instance.
#[derive(Clone)]
pub struct SessionEngine {
    state: SharedState,
    config: Arc<EngineConfig>,
}

impl Default for SessionEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl SessionEngine {
    pub fn new(config: EngineConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            state: Arc::new(RwLock::new(EngineState::new(rng))),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn state(&self) -> &SharedState {
        &self.state
    }

    pub(crate) fn weak_state(&self) -> Weak<RwLock<EngineState>> {
        Arc::downgrade(&self.state)
    }

    /// Creates a new game with `host_nickname` as its only player, replacing
    /// any current game and cancelling its timer.
    pub async fn start_game(&self, host_nickname: &str, max_players: usize) -> EngineResult<Session> {
        let nickname = host_nickname.trim();
        if nickname.is_empty() {
            return Err(EngineError::InvalidNickname);
        }
        if max_players < MIN_PLAYERS {
            return Err(EngineError::InvalidMaxPlayers {
                requested: max_players,
                minimum: MIN_PLAYERS,
            });
        }

        let host = Player::host(generate_player_id(), nickname);
        let mut secrets = HashMap::new();
        secrets.insert(host.id.clone(), PlayerSecret::default());
        let session = Session::new(generate_room_code(), host, max_players, now());

        let mut state = self.state.write().await;
        state.install(session.clone(), secrets);
        info!("Game {} created by {} (max {} players)", session.id, nickname, max_players);
        Ok(session)
    }

    /// Adds a player. Fails with `NotFound` for a stale game id, then
    /// `InvalidNickname` for a blank name and `Full` once `max_players` is reached.
    pub async fn add_player(&self, game_id: &str, nickname: &str) -> EngineResult<PlayerJoin> {
        let mut state = self.state.write().await;
        state.add_player(game_id, nickname)
    }

    /// Starts the next round and re-arms the discussion timer. Returns false
    /// when `game_id` is not the current game or the game has finished.
    pub async fn advance_round(&self, game_id: &str) -> bool {
        let weak = self.weak_state();
        let mut state = self.state.write().await;
        state.advance_round(weak, game_id, self.config.discussion_duration)
    }

    /// Drops the current game if it is `game_id`, cancelling its timer.
    pub async fn reset(&self, game_id: &str) {
        let mut state = self.state.write().await;
        if state.session(game_id).is_some() {
            state.clear();
            info!("Game {} reset", game_id);
        }
    }

    /// Ends the game for good. Returns false if there is nothing to finish.
    pub async fn finish_game(&self, game_id: &str) -> bool {
        let mut state = self.state.write().await;
        let finished = match state.session_mut(game_id) {
            Ok(session) => session.transition(GameStatus::Finished),
            Err(_) => false,
        };
        if finished {
            state.timer.cancel();
            info!("Game {} finished", game_id);
        }
        finished
    }

    pub async fn get_session(&self, game_id: &str) -> Option<Session> {
        self.state.read().await.session(game_id).cloned()
    }

    pub async fn list_sessions(&self) -> Vec<Session> {
        self.state.read().await.session.iter().cloned().collect()
    }

    /// Private view of one player: their public record plus role and word.
    pub async fn player_info(&self, game_id: &str, player_id: &str) -> Option<PrivatePlayerInfo> {
        let state = self.state.read().await;
        let player = state.session(game_id)?.player(player_id)?.clone();
        let secret = state.secrets.get(player_id).cloned().unwrap_or_default();
        Some(PrivatePlayerInfo::new(player, &secret))
    }

    /// Hands out roles according to `policy` and words from `pair`.
    pub async fn deal_roles(&self, game_id: &str, pair: &SecretPair, policy: &dyn RolePolicy) -> EngineResult<()> {
        let mut state = self.state.write().await;
        state.deal_roles(game_id, pair, policy)
    }

    /// Records a guess of `target_player_id`'s word in the activity feed.
    pub async fn record_guess(
        &self,
        game_id: &str,
        player_id: &str,
        target_player_id: &str,
        word: &str,
    ) -> EngineResult<Guess> {
        let mut state = self.state.write().await;
        state.record_guess(game_id, player_id, target_player_id, word, self.config.recent_guess_limit)
    }

    pub async fn eliminate_player(&self, game_id: &str, player_id: &str) -> EngineResult<()> {
        let mut state = self.state.write().await;
        let session = state.session_mut(game_id)?;
        let player = session.player_mut(player_id).ok_or_else(|| EngineError::UnknownPlayer {
            player_id: player_id.to_string(),
        })?;
        player.is_alive = false;
        info!("Player {} eliminated from game {}", player.nickname, game_id);
        Ok(())
    }

    /// Encodes the current game, or `None` when there is no game.
    pub async fn save(&self) -> EngineResult<Option<Vec<u8>>> {
        let state = self.state.read().await;
        let Some(session) = state.session.clone() else {
            return Ok(None);
        };
        let snapshot = SessionSnapshot::new(session, state.secrets.clone());
        persistence::encode(&snapshot, self.config.snapshot_format).map(Some)
    }

    /// Replaces the current game with the one in `blob`. Leaves state
    /// untouched and reports `MalformedSnapshot` if `blob` does not decode.
    pub async fn restore(&self, blob: &[u8]) -> EngineResult<()> {
        let snapshot = persistence::decode(blob, self.config.snapshot_format)?;
        let weak = self.weak_state();
        let mut state = self.state.write().await;
        info!("Restoring game {} (round {})", snapshot.session.id, snapshot.session.current_round);
        state.restore(weak, snapshot, self.config.discussion_duration);
        Ok(())
    }

    /// Best-effort [`restore`](Self::restore): a bad blob is logged and ignored.
    pub async fn load(&self, blob: &[u8]) {
        if let Err(e) = self.restore(blob).await {
            warn!("Ignoring saved session: {}", e);
        }
    }

    /// Writes the current game to `store` under the configured key.
    pub async fn save_to(&self, store: &dyn SessionStore) -> EngineResult<()> {
        if let Some(blob) = self.save().await? {
            store.put(&self.config.storage_key, &blob)?;
            debug!("Saved session snapshot ({} bytes)", blob.len());
        }
        Ok(())
    }

    /// Loads the game saved in `store`, if any. Never fails.
    pub async fn load_from(&self, store: &dyn SessionStore) {
        match store.get(&self.config.storage_key) {
            Ok(Some(blob)) => self.load(&blob).await,
            Ok(None) => debug!("No saved session under {}", self.config.storage_key),
            Err(e) => warn!("Could not read saved session: {}", e),
        }
    }

    #[cfg(test)]
    pub(crate) async fn timer_armed(&self) -> bool {
        self.state.read().await.timer.is_armed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SnapshotFormat;
    use crate::persistence::MemoryStore;
    use crate::roles::{ExplicitRoles, FixedCounts};
    use shared::Role;
    use tokio::time::sleep;

    const DISCUSSION: Duration = Duration::from_secs(300);

    fn test_engine() -> SessionEngine {
        SessionEngine::new(EngineConfig::default().with_rng_seed(7))
    }

    async fn game_with_players(engine: &SessionEngine, names: &[&str]) -> Session {
        let session = engine.start_game("Alice", 8).await.unwrap();
        for name in names {
            engine.add_player(&session.id, name).await.unwrap();
        }
        engine.get_session(&session.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_start_game() {
        let engine = test_engine();
        let session = engine.start_game("Alice", 3).await.unwrap();

        assert_eq!(session.id.len(), 6);
        assert_eq!(session.players.len(), 1);
        assert!(session.players[0].is_host);
        assert!(session.players[0].is_alive);
        assert_eq!(session.host_player_id, session.players[0].id);
        assert_eq!(session.status, GameStatus::WaitingForPlayers);
        assert_eq!(session.current_round, 0);
        assert_eq!(session.max_players, 3);
    }

    #[tokio::test]
    async fn test_start_game_validates_input() {
        let engine = test_engine();
        assert!(matches!(engine.start_game("   ", 8).await, Err(EngineError::InvalidNickname)));
        assert!(matches!(
            engine.start_game("Alice", 2).await,
            Err(EngineError::InvalidMaxPlayers { requested: 2, minimum: 3 })
        ));
        assert!(engine.list_sessions().await.is_empty());
    }

    #[tokio::test]
    async fn test_start_game_replaces_previous() {
        let engine = test_engine();
        let first = engine.start_game("Alice", 4).await.unwrap();
        let second = engine.start_game("Zed", 4).await.unwrap();

        assert!(engine.get_session(&first.id).await.is_none());
        let sessions = engine.list_sessions().await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, second.id);
    }

    #[tokio::test]
    async fn test_add_player() {
        let engine = test_engine();
        let session = engine.start_game("Alice", 4).await.unwrap();

        let join = engine.add_player(&session.id, "Bob").await.unwrap();
        assert_eq!(join.session.players.len(), 2);
        assert!(!join.player.player.is_host);
        assert_eq!(join.player.role, Role::Civilian);
        assert_eq!(join.player.secret_word, "");
        assert_eq!(join.session.players[1].id, join.player.player.id);
    }

    #[tokio::test]
    async fn test_add_player_unknown_game() {
        let engine = test_engine();
        assert!(matches!(
            engine.add_player("nope", "Bob").await,
            Err(EngineError::NotFound { .. })
        ));

        engine.start_game("Alice", 4).await.unwrap();
        assert!(matches!(
            engine.add_player("nope", "Bob").await,
            Err(EngineError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_add_player_rejects_empty_nickname() {
        let engine = test_engine();
        let session = engine.start_game("Alice", 4).await.unwrap();
        assert!(matches!(engine.add_player(&session.id, "").await, Err(EngineError::InvalidNickname)));
        assert!(matches!(engine.add_player(&session.id, "  ").await, Err(EngineError::InvalidNickname)));
        assert_eq!(engine.get_session(&session.id).await.unwrap().players.len(), 1);
    }

    #[tokio::test]
    async fn test_add_player_checks_game_before_nickname() {
        let engine = test_engine();
        assert!(matches!(engine.add_player("nope", "").await, Err(EngineError::NotFound { .. })));

        engine.start_game("Alice", 4).await.unwrap();
        assert!(matches!(engine.add_player("nope", " ").await, Err(EngineError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_capacity_scenario() {
        let engine = test_engine();
        let session = engine.start_game("Alice", 3).await.unwrap();

        let bob = engine.add_player(&session.id, "Bob").await.unwrap();
        assert_eq!(bob.session.players.len(), 2);
        let cara = engine.add_player(&session.id, "Cara").await.unwrap();
        assert_eq!(cara.session.players.len(), 3);

        assert!(matches!(
            engine.add_player(&session.id, "Dan").await,
            Err(EngineError::Full { max_players: 3 })
        ));
        assert_eq!(engine.get_session(&session.id).await.unwrap().players.len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_respect_capacity() {
        let engine = test_engine();
        let session = engine.start_game("Alice", 8).await.unwrap();

        let handles: Vec<_> = (0..20)
            .map(|n| {
                let engine = engine.clone();
                let id = session.id.clone();
                tokio::spawn(async move { engine.add_player(&id, &format!("P{}", n)).await.is_ok() })
            })
            .collect();

        let mut joined = 0;
        for handle in handles {
            if handle.await.unwrap() {
                joined += 1;
            }
        }

        assert_eq!(joined, 7);
        let session = engine.get_session(&session.id).await.unwrap();
        assert_eq!(session.players.len(), 8);
        assert!(session.validate().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_advance_round_opens_voting_after_discussion() {
        let engine = test_engine();
        let session = engine.start_game("Alice", 4).await.unwrap();

        assert!(engine.advance_round(&session.id).await);
        let current = engine.get_session(&session.id).await.unwrap();
        assert_eq!(current.current_round, 1);
        assert_eq!(current.status, GameStatus::Discussing);
        assert!(!current.voting_phase());
        let started_at = current.started_at;
        assert!(started_at.is_some());

        sleep(DISCUSSION - Duration::from_secs(1)).await;
        assert!(!engine.get_session(&session.id).await.unwrap().voting_phase());

        sleep(Duration::from_secs(2)).await;
        let current = engine.get_session(&session.id).await.unwrap();
        assert!(current.voting_phase());
        assert_eq!(current.status, GameStatus::Voting);
        assert!(!engine.timer_armed().await);

        assert!(engine.advance_round(&session.id).await);
        let current = engine.get_session(&session.id).await.unwrap();
        assert_eq!(current.current_round, 2);
        assert_eq!(current.started_at, started_at);
        assert!(current.round_start_time >= started_at.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_advance_flips_once() {
        let engine = test_engine();
        let session = engine.start_game("Alice", 4).await.unwrap();

        assert!(engine.advance_round(&session.id).await);
        sleep(Duration::from_secs(200)).await;
        assert!(engine.advance_round(&session.id).await);
        assert_eq!(engine.get_session(&session.id).await.unwrap().current_round, 2);

        // The first arm would have fired at 300s.
        sleep(Duration::from_secs(150)).await;
        assert!(!engine.get_session(&session.id).await.unwrap().voting_phase());

        sleep(Duration::from_secs(151)).await;
        assert!(engine.get_session(&session.id).await.unwrap().voting_phase());
    }

    #[tokio::test(start_paused = true)]
    async fn test_advance_from_voting_closes_voting() {
        let engine = test_engine();
        let session = engine.start_game("Alice", 4).await.unwrap();
        engine.advance_round(&session.id).await;
        sleep(DISCUSSION + Duration::from_secs(1)).await;
        assert!(engine.get_session(&session.id).await.unwrap().voting_phase());

        assert!(engine.advance_round(&session.id).await);
        let current = engine.get_session(&session.id).await.unwrap();
        assert_eq!(current.current_round, 2);
        assert!(!current.voting_phase());
    }

    #[tokio::test]
    async fn test_advance_round_unknown_game() {
        let engine = test_engine();
        assert!(!engine.advance_round("nope").await);
        let session = engine.start_game("Alice", 4).await.unwrap();
        assert!(!engine.advance_round("nope").await);
        assert_eq!(engine.get_session(&session.id).await.unwrap().current_round, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_and_cancels() {
        let engine = test_engine();
        let session = engine.start_game("Alice", 4).await.unwrap();
        engine.advance_round(&session.id).await;

        engine.reset("other").await;
        assert!(engine.get_session(&session.id).await.is_some());
        assert!(engine.timer_armed().await);

        engine.reset(&session.id).await;
        assert!(engine.get_session(&session.id).await.is_none());
        assert!(engine.list_sessions().await.is_empty());
        assert!(!engine.timer_armed().await);

        sleep(DISCUSSION * 2).await;
        assert!(engine.list_sessions().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacing_game_cancels_old_timer() {
        let engine = test_engine();
        let first = engine.start_game("Alice", 4).await.unwrap();
        engine.advance_round(&first.id).await;

        let second = engine.start_game("Zed", 4).await.unwrap();
        assert!(!engine.timer_armed().await);

        sleep(DISCUSSION * 2).await;
        let current = engine.get_session(&second.id).await.unwrap();
        assert_eq!(current.status, GameStatus::WaitingForPlayers);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_game() {
        let engine = test_engine();
        let session = engine.start_game("Alice", 4).await.unwrap();
        engine.advance_round(&session.id).await;

        assert!(engine.finish_game(&session.id).await);
        assert!(!engine.finish_game(&session.id).await);
        assert!(!engine.advance_round(&session.id).await);

        sleep(DISCUSSION * 2).await;
        assert_eq!(engine.get_session(&session.id).await.unwrap().status, GameStatus::Finished);
    }

    #[tokio::test]
    async fn test_deal_roles_and_private_info() {
        let engine = test_engine();
        let session = game_with_players(&engine, &["Bob", "Cara"]).await;
        let bob = session.players[1].id.clone();
        let cara = session.players[2].id.clone();

        let policy = ExplicitRoles::default().with(bob.clone(), Role::Undercover).with(cara.clone(), Role::MrWhite);
        engine
            .deal_roles(&session.id, &SecretPair::new("Coffee", "Tea"), &policy)
            .await
            .unwrap();

        let host = engine.player_info(&session.id, &session.host_player_id).await.unwrap();
        assert_eq!((host.role, host.secret_word.as_str()), (Role::Civilian, "Coffee"));
        let bob_info = engine.player_info(&session.id, &bob).await.unwrap();
        assert_eq!((bob_info.role, bob_info.secret_word.as_str()), (Role::Undercover, "Tea"));
        let cara_info = engine.player_info(&session.id, &cara).await.unwrap();
        assert_eq!((cara_info.role, cara_info.secret_word.as_str()), (Role::MrWhite, ""));

        assert!(engine.player_info(&session.id, "nobody").await.is_none());
        assert!(engine.player_info("nope", &bob).await.is_none());
    }

    #[tokio::test]
    async fn test_deal_roles_needs_quorum() {
        let engine = test_engine();
        let session = game_with_players(&engine, &["Bob"]).await;
        let result = engine
            .deal_roles(&session.id, &SecretPair::new("Dog", "Cat"), &FixedCounts::new(1, 0))
            .await;
        assert!(matches!(result, Err(EngineError::NotEnoughPlayers { required: 3, actual: 2 })));
    }

    #[tokio::test]
    async fn test_record_guess() {
        let engine = test_engine();
        let session = game_with_players(&engine, &["Bob", "Cara"]).await;
        let host = session.host_player_id.clone();
        let bob = session.players[1].id.clone();

        let policy = ExplicitRoles::default().with(bob.clone(), Role::Undercover);
        engine
            .deal_roles(&session.id, &SecretPair::new("Coffee", "Tea"), &policy)
            .await
            .unwrap();

        let wrong = engine.record_guess(&session.id, &host, &bob, "coffee").await.unwrap();
        assert!(!wrong.is_correct);
        let right = engine.record_guess(&session.id, &host, &bob, " TEA ").await.unwrap();
        assert!(right.is_correct);
        assert_eq!(right.player_name, "Alice");
        assert_eq!(right.target_player_name, "Bob");

        let feed = engine.get_session(&session.id).await.unwrap().recent_guesses;
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[1].guessed_word, "TEA");

        assert!(matches!(
            engine.record_guess(&session.id, &host, "ghost", "x").await,
            Err(EngineError::UnknownPlayer { .. })
        ));
    }

    #[tokio::test]
    async fn test_recent_guesses_are_capped() {
        let mut config = EngineConfig::default().with_rng_seed(1);
        config.recent_guess_limit = 5;
        let engine = SessionEngine::new(config);
        let session = game_with_players(&engine, &["Bob", "Cara"]).await;
        let host = session.host_player_id.clone();
        let bob = session.players[1].id.clone();

        for n in 0..12 {
            engine.record_guess(&session.id, &host, &bob, &format!("w{}", n)).await.unwrap();
        }
        let feed = engine.get_session(&session.id).await.unwrap().recent_guesses;
        assert_eq!(feed.len(), 5);
        assert_eq!(feed[0].guessed_word, "w7");
    }

    #[tokio::test]
    async fn test_eliminate_player() {
        let engine = test_engine();
        let session = game_with_players(&engine, &["Bob", "Cara"]).await;
        let bob = session.players[1].id.clone();

        engine.eliminate_player(&session.id, &bob).await.unwrap();
        let current = engine.get_session(&session.id).await.unwrap();
        assert!(!current.players[1].is_alive);
        assert_eq!(current.alive_count(), 2);

        assert!(matches!(
            engine.eliminate_player(&session.id, "ghost").await,
            Err(EngineError::UnknownPlayer { .. })
        ));
    }

    #[tokio::test]
    async fn test_save_without_game_is_noop() {
        let engine = test_engine();
        assert!(engine.save().await.unwrap().is_none());

        let store = MemoryStore::new();
        engine.save_to(&store).await.unwrap();
        assert!(store.get(&engine.config().storage_key).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        for format in [SnapshotFormat::Json, SnapshotFormat::Bincode] {
            let config = EngineConfig::default().with_snapshot_format(format);
            let engine = SessionEngine::new(config.clone());
            let session = game_with_players(&engine, &["Bob", "Cara"]).await;
            let bob = session.players[1].id.clone();
            engine
                .deal_roles(&session.id, &SecretPair::new("Dog", "Cat"), &ExplicitRoles::default().with(bob.clone(), Role::Undercover))
                .await
                .unwrap();
            let original = engine.get_session(&session.id).await.unwrap();
            let blob = engine.save().await.unwrap().unwrap();

            let fresh = SessionEngine::new(config);
            fresh.load(&blob).await;
            assert_eq!(fresh.get_session(&session.id).await.unwrap(), original);
            let info = fresh.player_info(&session.id, &bob).await.unwrap();
            assert_eq!(info.secret_word, "Cat");
        }
    }

    #[tokio::test]
    async fn test_load_ignores_malformed_blob() {
        let engine = test_engine();
        let session = engine.start_game("Alice", 4).await.unwrap();

        engine.load(b"").await;
        engine.load(b"{\"version\":1}").await;
        engine.load(b"definitely not json").await;

        assert_eq!(engine.get_session(&session.id).await.unwrap(), session);
        assert!(matches!(engine.restore(b"").await, Err(EngineError::MalformedSnapshot(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_resumes_discussion_timer() {
        let engine = test_engine();
        let session = engine.start_game("Alice", 4).await.unwrap();
        engine.advance_round(&session.id).await;
        let blob = engine.save().await.unwrap().unwrap();

        let fresh = test_engine();
        fresh.load(&blob).await;
        assert!(fresh.timer_armed().await);
        assert_eq!(fresh.get_session(&session.id).await.unwrap().status, GameStatus::Discussing);

        sleep(DISCUSSION + Duration::from_secs(1)).await;
        assert!(fresh.get_session(&session.id).await.unwrap().voting_phase());
    }

    #[tokio::test]
    async fn test_restore_opens_voting_when_discussion_expired() {
        let engine = test_engine();
        let session = engine.start_game("Alice", 4).await.unwrap();
        engine.advance_round(&session.id).await;

        let mut snapshot = persistence::decode(&engine.save().await.unwrap().unwrap(), SnapshotFormat::Json).unwrap();
        snapshot.session.round_start_time = now() - chrono::Duration::seconds(600);
        let blob = persistence::encode(&snapshot, SnapshotFormat::Json).unwrap();

        let fresh = test_engine();
        fresh.load(&blob).await;
        assert!(fresh.get_session(&session.id).await.unwrap().voting_phase());
        assert!(!fresh.timer_armed().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_cancels_timer_of_replaced_game() {
        let waiting = test_engine();
        let lobby = waiting.start_game("Zed", 4).await.unwrap();
        let blob = waiting.save().await.unwrap().unwrap();

        let engine = test_engine();
        let running = engine.start_game("Alice", 4).await.unwrap();
        engine.advance_round(&running.id).await;
        assert!(engine.timer_armed().await);

        engine.load(&blob).await;
        assert!(!engine.timer_armed().await);
        assert!(engine.get_session(&running.id).await.is_none());

        sleep(DISCUSSION + Duration::from_secs(100)).await;
        let current = engine.get_session(&lobby.id).await.unwrap();
        assert_eq!(current.status, GameStatus::WaitingForPlayers);
        assert_eq!(current, lobby);
    }

    #[tokio::test]
    async fn test_load_rejects_overfull_snapshot() {
        let source = test_engine();
        let session = source.start_game("Alice", 3).await.unwrap();
        source.add_player(&session.id, "Bob").await.unwrap();
        source.add_player(&session.id, "Cara").await.unwrap();

        let blob = source.save().await.unwrap().unwrap();
        let mut snapshot = persistence::decode(&blob, SnapshotFormat::Json).unwrap();
        snapshot.session.players.push(Player::new("d", "Dan"));
        snapshot.session.players.push(Player::new("e", "Eve"));
        let overfull = persistence::encode(&snapshot, SnapshotFormat::Json).unwrap();

        let engine = test_engine();
        assert!(matches!(engine.restore(&overfull).await, Err(EngineError::MalformedSnapshot(_))));
        engine.load(&overfull).await;
        assert!(engine.list_sessions().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_to_and_load_from_store() {
        let store = MemoryStore::new();
        let engine = test_engine();
        let session = game_with_players(&engine, &["Bob"]).await;
        engine.save_to(&store).await.unwrap();

        let fresh = test_engine();
        fresh.load_from(&store).await;
        assert_eq!(fresh.get_session(&session.id).await.unwrap(), session);

        let empty = test_engine();
        empty.load_from(&MemoryStore::new()).await;
        assert!(empty.list_sessions().await.is_empty());
    }

    #[tokio::test]
    async fn test_dropping_engine_with_armed_timer() {
        let engine = test_engine();
        let session = engine.start_game("Alice", 4).await.unwrap();
        engine.advance_round(&session.id).await;
        let weak = engine.weak_state();
        drop(engine);
        assert!(weak.upgrade().is_none());
    }
}
