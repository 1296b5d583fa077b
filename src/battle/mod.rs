//! Battle session state machine.
//!
//! - **machine**: pure room transitions (join, move, abandon)
//! - **scoring**: deterministic points for an insult
//! - **service**: runs transitions against the stores with compare-and-swap

pub mod machine;
pub mod scoring;
pub mod service;

pub use service::BattleService;

use std::time::Duration;

use thiserror::Error;

use crate::storage::StorageError;

/// Errors from battle operations.
#[derive(Debug, Error)]
pub enum BattleError {
    /// Unknown room, unknown invite code, or a room that can no longer be
    /// joined. Deliberately indistinguishable for joins.
    #[error("Room not found")]
    RoomNotFound,

    #[error("You cannot join your own room")]
    SelfJoinRejected,

    #[error("It is not your turn")]
    NotYourTurn,

    #[error("Room is not active")]
    RoomNotActive,

    #[error("You are not a player in this room")]
    PlayerNotInRoom,

    #[error("Insult is longer than {0} characters")]
    InsultTooLong(usize),

    #[error("Room was modified concurrently; re-fetch it and retry")]
    Conflict,

    #[error("Could not allocate a unique invite code after {0} attempts")]
    CodeGenerationExhausted(u32),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PreconditionFailed,
    NotFound,
    /// Safe to re-fetch the room and retry the whole operation
    ConflictRetryable,
    StorageError,
}

impl BattleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BattleError::SelfJoinRejected
            | BattleError::NotYourTurn
            | BattleError::RoomNotActive
            | BattleError::PlayerNotInRoom
            | BattleError::InsultTooLong(_) => ErrorKind::PreconditionFailed,
            BattleError::RoomNotFound => ErrorKind::NotFound,
            BattleError::Conflict => ErrorKind::ConflictRetryable,
            BattleError::CodeGenerationExhausted(_) | BattleError::Storage(_) => {
                ErrorKind::StorageError
            }
        }
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            BattleError::RoomNotFound => "ROOM_NOT_FOUND",
            BattleError::SelfJoinRejected => "SELF_JOIN_REJECTED",
            BattleError::NotYourTurn => "NOT_YOUR_TURN",
            BattleError::RoomNotActive => "ROOM_NOT_ACTIVE",
            BattleError::PlayerNotInRoom => "PLAYER_NOT_IN_ROOM",
            BattleError::InsultTooLong(_) => "INSULT_TOO_LONG",
            BattleError::Conflict => "CONFLICT_RETRYABLE",
            BattleError::CodeGenerationExhausted(_) => "CODE_GENERATION_EXHAUSTED",
            BattleError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

/// Tunable battle policy.
#[derive(Debug, Clone)]
pub struct BattleRules {
    /// Cap on points a single attack can score
    pub max_points_per_turn: u32,
    pub max_insult_chars: usize,
    /// Invite code allocations tried before giving up
    pub invite_code_attempts: u32,
    /// Bound on every store call
    pub storage_timeout: Duration,
}

impl Default for BattleRules {
    fn default() -> Self {
        Self {
            max_points_per_turn: 30,
            max_insult_chars: 280,
            invite_code_attempts: 5,
            storage_timeout: Duration::from_secs(5),
        }
    }
}
