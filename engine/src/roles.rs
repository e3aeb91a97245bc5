//! Pluggable role distribution.
//!
//! The engine has no built-in opinion on how many Undercover or MrWhite
//! players a game has; callers pick a [`RolePolicy`] and pass it to
//! `deal_roles`.

use crate::error::{EngineError, EngineResult};
use rand::seq::SliceRandom;
use rand::RngCore;
use shared::{PlayerSecret, Role, SecretPair};
use std::collections::HashMap;

pub trait RolePolicy: Send + Sync {
    /// Returns one role per entry of `player_ids`, in the same order.
    fn assign(&self, player_ids: &[String], rng: &mut dyn RngCore) -> EngineResult<Vec<Role>>;
}

/// Exactly `undercover` Undercover and `mr_white` MrWhite players, picked at
/// random; everyone else is a Civilian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedCounts {
    pub undercover: usize,
    pub mr_white: usize,
}

impl FixedCounts {
    pub fn new(undercover: usize, mr_white: usize) -> Self {
        Self { undercover, mr_white }
    }
}

impl RolePolicy for FixedCounts {
    fn assign(&self, player_ids: &[String], rng: &mut dyn RngCore) -> EngineResult<Vec<Role>> {
        let specials = self.undercover + self.mr_white;
        if specials >= player_ids.len() {
            return Err(EngineError::InvalidRoles(format!(
                "{} special roles leave no civilian among {} players",
                specials,
                player_ids.len()
            )));
        }

        let mut order: Vec<usize> = (0..player_ids.len()).collect();
        order.shuffle(rng);

        let mut roles = vec![Role::Civilian; player_ids.len()];
        for (n, &idx) in order.iter().take(specials).enumerate() {
            roles[idx] = if n < self.undercover {
                Role::Undercover
            } else {
                Role::MrWhite
            };
        }
        Ok(roles)
    }
}

/// Roles chosen by the caller per player id; unlisted players are Civilians.
#[derive(Debug, Clone, Default)]
pub struct ExplicitRoles {
    roles: HashMap<String, Role>,
}

impl ExplicitRoles {
    pub fn new(roles: HashMap<String, Role>) -> Self {
        Self { roles }
    }

    pub fn with(mut self, player_id: impl Into<String>, role: Role) -> Self {
        self.roles.insert(player_id.into(), role);
        self
    }
}

impl RolePolicy for ExplicitRoles {
    fn assign(&self, player_ids: &[String], _rng: &mut dyn RngCore) -> EngineResult<Vec<Role>> {
        if let Some(stray) = self.roles.keys().find(|id| !player_ids.contains(*id)) {
            return Err(EngineError::UnknownPlayer {
                player_id: stray.clone(),
            });
        }
        Ok(player_ids
            .iter()
            .map(|id| self.roles.get(id).copied().unwrap_or_default())
            .collect())
    }
}

/// The word each role receives from a pair.
pub fn word_for(role: Role, pair: &SecretPair) -> &str {
    match role {
        Role::Civilian => &pair.secret_word,
        Role::Undercover => &pair.decoy_word,
        Role::MrWhite => "",
    }
}

/// Runs `policy` over `player_ids` and pairs every player with their secret.
pub fn deal(
    player_ids: &[String],
    pair: &SecretPair,
    policy: &dyn RolePolicy,
    rng: &mut dyn RngCore,
) -> EngineResult<HashMap<String, PlayerSecret>> {
    let roles = policy.assign(player_ids, rng)?;
    if roles.len() != player_ids.len() {
        return Err(EngineError::InvalidRoles(format!(
            "policy returned {} roles for {} players",
            roles.len(),
            player_ids.len()
        )));
    }

    Ok(player_ids
        .iter()
        .zip(roles)
        .map(|(id, role)| (id.clone(), PlayerSecret::new(role, word_for(role, pair))))
        .collect())
}
