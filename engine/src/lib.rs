//! # Undercover Session Engine
//!
//! This library runs the state of a single "Undercover" party-game room: who
//! is in it, what round it is on, whether the table is still discussing or
//! already voting, and who secretly holds which word. It keeps no network or
//! disk handles of its own; word lists and snapshot storage are plugged in by
//! the caller.
//!
//! ## Core Responsibilities
//!
//! ### Session Lifecycle
//! - Creating a room with a host, admitting players up to capacity
//! - Advancing rounds and finishing or resetting the room
//! - Dealing roles and words through a caller-chosen policy
//!
//! ### Round Timing
//! Each round opens with a discussion period. When it elapses the room
//! switches to voting on its own. Starting another round, resetting, or
//! replacing the room cancels the pending switch.
//!
//! ### Reload Survival
//! The room can be saved to a snapshot and restored later. Restoring a room
//! that was mid-discussion resumes the remaining discussion time.
//!
//! ## Architecture Design
//!
//! ### One Lock, One Room
//! All room state lives behind a single `tokio::sync::RwLock`. Engine calls
//! and the round timer's callback take the same lock, and the timer checks
//! that it is still the current arm before it changes anything.
//!
//! ### Reported Outcomes
//! Missing rooms, full rooms and bad snapshots are returned as values
//! ([`EngineError`], `Option`, `bool`), never raised as panics.
//!
//! ## Module Organization
//!
//! - `engine`: [`SessionEngine`] and the locked state it guards
//! - `api`: flattened calls for UI and transport layers
//! - `timer`: [`RoundTimer`], the cancellable single-shot timer
//! - `roles`: [`RolePolicy`] and the bundled policies
//! - `words`: word-pair sources with a built-in fallback
//! - `persistence`: snapshot codec and [`SessionStore`] media
//! - `config`, `error`, `utils`
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use engine::{EngineConfig, FixedCounts, FallbackWordSource, SessionEngine, StaticWordPairSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = SessionEngine::new(EngineConfig::default());
//!     let game = engine.start_game("Alice", 4).await?;
//!     engine.add_player(&game.id, "Bob").await?;
//!     engine.add_player(&game.id, "Cara").await?;
//!
//!     let words = FallbackWordSource::new(StaticWordPairSource::default());
//!     engine
//!         .start_round(&game.id, &words, "Everyday Words", &FixedCounts::new(1, 0))
//!         .await?;
//!
//!     let snapshot = engine.save().await?;
//!     println!("{} bytes saved", snapshot.map_or(0, |s| s.len()));
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod roles;
pub mod timer;
pub mod utils;
pub mod words;

pub use config::{EngineConfig, SnapshotFormat, SESSION_STORAGE_KEY};
pub use engine::{PlayerJoin, SessionEngine};
pub use error::{EngineError, EngineResult, StoreError, WordSourceError};
pub use persistence::{FileStore, MemoryStore, SessionSnapshot, SessionStore};
pub use roles::{ExplicitRoles, FixedCounts, RolePolicy};
pub use timer::RoundTimer;
pub use words::{FallbackWordSource, StaticWordPairSource, WordPairSource};
