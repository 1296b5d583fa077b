//! Storage collaborators.
//!
//! The battle state machine only talks to these traits:
//! - `RoomStore`: battle rooms, with compare-and-swap on the room version
//! - `AccountStore`: profiles and lifetime battle counters
//! - `FollowStore`: the follow graph
//!
//! The in-memory implementations optionally journal every committed write to
//! JSONL files under the data directory and replay them on startup.

mod accounts;
mod follows;
mod jsonl;
mod rooms;

pub use accounts::MemoryAccountStore;
pub use follows::MemoryFollowStore;
pub use jsonl::{Journal, JsonlReader, JsonlWriter};
pub use rooms::MemoryRoomStore;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    Account, AccountId, BattleResult, BattleRoom, FollowCounts, ProfileUpdate, RoomId, RoomStatus,
};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unique constraint violated: {0}")]
    UniqueConstraintViolation(String),

    #[error("Version conflict on {id}: expected {expected}, found {actual}")]
    VersionConflict {
        id: String,
        expected: u64,
        actual: u64,
    },

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Storage operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Configuration for storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn rooms_path(&self) -> PathBuf {
        self.data_dir.join("rooms.jsonl")
    }

    pub fn accounts_path(&self) -> PathBuf {
        self.data_dir.join("accounts.jsonl")
    }

    pub fn settlements_path(&self) -> PathBuf {
        self.data_dir.join("settlements.jsonl")
    }

    pub fn follows_path(&self) -> PathBuf {
        self.data_dir.join("follows.jsonl")
    }
}

/// Battle room persistence.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Insert a new room. Fails with `UniqueConstraintViolation` if the
    /// invite code is already taken.
    async fn create(&self, room: BattleRoom) -> Result<BattleRoom, StorageError>;

    async fn find_by_id(&self, id: &RoomId) -> Result<Option<BattleRoom>, StorageError>;

    async fn find_by_invite_code(&self, code: &str) -> Result<Option<BattleRoom>, StorageError>;

    /// Replace a room's state if its version still equals `expected_version`.
    /// The stored copy gets `expected_version + 1` and is returned.
    async fn compare_and_swap(
        &self,
        id: &RoomId,
        expected_version: u64,
        new_state: BattleRoom,
    ) -> Result<BattleRoom, StorageError>;

    /// Rooms the player created or joined, newest first.
    async fn list_for_player(&self, player: &AccountId) -> Result<Vec<BattleRoom>, StorageError>;

    async fn list_by_status(&self, status: RoomStatus) -> Result<Vec<BattleRoom>, StorageError>;
}

/// Account persistence.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account. Fails with `UniqueConstraintViolation` on a
    /// duplicate username or email.
    async fn create(&self, account: Account) -> Result<Account, StorageError>;

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, StorageError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StorageError>;

    async fn update_profile(
        &self,
        id: &AccountId,
        update: &ProfileUpdate,
    ) -> Result<Account, StorageError>;

    /// Increment both players' battle counters and the winner's win counter
    /// as one unit. Returns `false` if this room was already settled.
    async fn apply_battle_result(&self, result: &BattleResult) -> Result<bool, StorageError>;

    /// Accounts ordered by wins, then battles, then username.
    async fn top_by_wins(&self, limit: usize) -> Result<Vec<Account>, StorageError>;
}

/// Follow graph persistence.
#[async_trait]
pub trait FollowStore: Send + Sync {
    /// Returns `false` if the edge already existed.
    async fn follow(
        &self,
        follower: &AccountId,
        following: &AccountId,
    ) -> Result<bool, StorageError>;

    /// Returns `false` if there was nothing to remove.
    async fn unfollow(
        &self,
        follower: &AccountId,
        following: &AccountId,
    ) -> Result<bool, StorageError>;

    async fn is_following(
        &self,
        follower: &AccountId,
        following: &AccountId,
    ) -> Result<bool, StorageError>;

    async fn followers(&self, account: &AccountId) -> Result<Vec<AccountId>, StorageError>;

    async fn following(&self, account: &AccountId) -> Result<Vec<AccountId>, StorageError>;

    async fn counts(&self, account: &AccountId) -> Result<FollowCounts, StorageError>;
}
