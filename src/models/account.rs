//! Account model: a public profile plus lifetime battle counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, EntityId, RoomId};

/// Avatar used until the player sets their own.
pub const DEFAULT_AVATAR_URL: &str = "https://api.dicebear.com/7.x/pixel-art/svg";

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 32;

/// A registered player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,

    /// Lowercase, unique
    pub username: String,

    /// Lowercase, unique
    pub email: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default = "default_avatar_url")]
    pub avatar_url: String,

    #[serde(default)]
    pub twitter_handle: String,

    #[serde(default)]
    pub total_battles: u64,

    #[serde(default)]
    pub total_wins: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_avatar_url() -> String {
    DEFAULT_AVATAR_URL.to_string()
}

/// Fields accepted when registering a new account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub twitter_handle: Option<String>,
}

/// Partial profile update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub twitter_handle: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.avatar_url.is_none() && self.twitter_handle.is_none()
    }
}

/// Outcome of a completed battle, applied to both players' counters at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleResult {
    /// Room the result came from; a room is only ever settled once
    pub room_id: RoomId,
    pub winner: AccountId,
    pub loser: AccountId,
    pub settled_at: DateTime<Utc>,
}

impl BattleResult {
    pub fn new(room_id: RoomId, winner: AccountId, loser: AccountId) -> Self {
        Self {
            room_id,
            winner,
            loser,
            settled_at: Utc::now(),
        }
    }
}

impl Account {
    /// Validate and normalize registration input into a fresh account.
    pub fn from_registration(input: NewAccount) -> Result<Self, String> {
        let username = input.username.trim().to_lowercase();
        let email = input.email.trim().to_lowercase();

        if username.len() < USERNAME_MIN_LEN || username.len() > USERNAME_MAX_LEN {
            return Err(format!(
                "username must be {}-{} characters",
                USERNAME_MIN_LEN, USERNAME_MAX_LEN
            ));
        }
        if !username
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err("username may only contain a-z, 0-9 and _".to_string());
        }
        if !is_plausible_email(&email) {
            return Err("email address is invalid".to_string());
        }

        let now = Utc::now();
        Ok(Self {
            id: EntityId::random(),
            username,
            email,
            display_name: input
                .display_name
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            avatar_url: input
                .avatar_url
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(default_avatar_url),
            twitter_handle: input
                .twitter_handle
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            total_battles: 0,
            total_wins: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a profile update in place.
    pub fn apply_update(&mut self, update: &ProfileUpdate) {
        if let Some(ref name) = update.display_name {
            self.display_name = name.trim().to_string();
        }
        if let Some(ref url) = update.avatar_url {
            let url = url.trim();
            self.avatar_url = if url.is_empty() {
                default_avatar_url()
            } else {
                url.to_string()
            };
        }
        if let Some(ref handle) = update.twitter_handle {
            self.twitter_handle = handle.trim().to_string();
        }
        self.updated_at = Utc::now();
    }

    /// Losses are derived rather than stored.
    pub fn total_losses(&self) -> u64 {
        self.total_battles.saturating_sub(self.total_wins)
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    }
}
