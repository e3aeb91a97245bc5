use chrono::{DateTime, Utc};
use shared::ROOM_CODE_LENGTH;
use std::time::Duration;
use uuid::Uuid;

/// Human-shareable room code: the first hex characters of a fresh v4 uuid.
pub fn generate_room_code() -> String {
    let mut code = Uuid::new_v4().simple().to_string();
    code.truncate(ROOM_CODE_LENGTH);
    code
}

/// Opaque 32-character hex id for a player.
pub fn generate_player_id() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Time left until `started + total`, or `None` once that point has passed.
pub fn remaining_after(started: DateTime<Utc>, total: Duration, at: DateTime<Utc>) -> Option<Duration> {
    let elapsed = (at - started).to_std().unwrap_or(Duration::ZERO);
    total.checked_sub(elapsed).filter(|left| !left.is_zero())
}
