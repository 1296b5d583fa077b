//! Battle room model: two players, an invite code, and an append-only turn log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, EntityId, RoomId};

/// Health every player starts a battle with. Also the ceiling.
pub const STARTING_HEALTH: u32 = 100;

/// Number of random bytes behind an invite code (hex-encoded, so 6 chars).
const INVITE_CODE_BYTES: usize = 3;

/// Lifecycle of a battle room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoomStatus {
    Waiting,
    Active,
    Completed,
    Abandoned,
}

impl RoomStatus {
    /// Completed and abandoned rooms never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RoomStatus::Completed | RoomStatus::Abandoned)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Waiting => "WAITING",
            RoomStatus::Active => "ACTIVE",
            RoomStatus::Completed => "COMPLETED",
            RoomStatus::Abandoned => "ABANDONED",
        }
    }
}

/// What a player did on their turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MoveType {
    Attack,
    Skip,
    Surrender,
}

/// One accepted move. Never modified after it is appended to a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub player: AccountId,
    pub move_type: MoveType,
    #[serde(default)]
    pub insult_text: String,
    #[serde(default)]
    pub points_scored: u32,
    pub timestamp: DateTime<Utc>,
}

/// A two-player battle room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleRoom {
    /// Unique identifier
    pub id: RoomId,

    /// Creator of the room; always moves first
    pub player_one: AccountId,

    /// Set once someone joins with the invite code
    pub player_two: Option<AccountId>,

    /// Code the second player joins with, kept after joining for audit
    pub invite_code: String,

    pub status: RoomStatus,

    /// Who may submit the next move (only while active)
    pub turn_player: Option<AccountId>,

    /// Set if and only if the room is completed
    pub winner: Option<AccountId>,

    pub player_one_health: u32,
    pub player_two_health: u32,

    /// Accepted turns in chronological order
    pub rounds: Vec<Turn>,

    /// Optimistic concurrency token, bumped by the store on every committed write
    pub version: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BattleRoom {
    /// Create a waiting room owned by `player_one`.
    pub fn new(player_one: AccountId, invite_code: String) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::random(),
            player_one,
            player_two: None,
            invite_code,
            status: RoomStatus::Waiting,
            turn_player: None,
            winner: None,
            player_one_health: STARTING_HEALTH,
            player_two_health: STARTING_HEALTH,
            rounds: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_player(&self, player: &AccountId) -> bool {
        &self.player_one == player || self.player_two.as_ref() == Some(player)
    }

    /// The other participant, if `player` is in the room and it is full.
    pub fn opponent_of(&self, player: &AccountId) -> Option<&AccountId> {
        if &self.player_one == player {
            self.player_two.as_ref()
        } else if self.player_two.as_ref() == Some(player) {
            Some(&self.player_one)
        } else {
            None
        }
    }

    pub fn health_of(&self, player: &AccountId) -> Option<u32> {
        if &self.player_one == player {
            Some(self.player_one_health)
        } else if self.player_two.as_ref() == Some(player) {
            Some(self.player_two_health)
        } else {
            None
        }
    }

    /// Mutable access to a participant's health pool.
    pub(crate) fn health_mut(&mut self, player: &AccountId) -> Option<&mut u32> {
        if &self.player_one == player {
            Some(&mut self.player_one_health)
        } else if self.player_two.as_ref() == Some(player) {
            Some(&mut self.player_two_health)
        } else {
            None
        }
    }

    /// The losing participant of a completed room.
    pub fn loser(&self) -> Option<&AccountId> {
        self.winner.as_ref().and_then(|w| self.opponent_of(w))
    }
}

/// Generate a short invite code: three random bytes as uppercase hex.
pub fn generate_invite_code() -> String {
    let uuid = Uuid::new_v4();
    hex::encode_upper(&uuid.as_bytes()[..INVITE_CODE_BYTES])
}

/// Canonical form used for storage and lookup.
pub fn normalize_invite_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_room_is_waiting() {
        let room = BattleRoom::new(AccountId::from("alice"), "ABC123".to_string());

        assert_eq!(room.status, RoomStatus::Waiting);
        assert!(room.player_two.is_none());
        assert!(room.turn_player.is_none());
        assert!(room.winner.is_none());
        assert_eq!(room.player_one_health, STARTING_HEALTH);
        assert_eq!(room.player_two_health, STARTING_HEALTH);
        assert!(room.rounds.is_empty());
        assert_eq!(room.version, 0);
    }

    #[test]
    fn test_opponent_and_health_lookup() {
        let mut room = BattleRoom::new(AccountId::from("alice"), "ABC123".to_string());
        let alice = AccountId::from("alice");
        let bob = AccountId::from("bob");

        assert_eq!(room.opponent_of(&alice), None);
        room.player_two = Some(bob.clone());
        room.player_two_health = 70;

        assert_eq!(room.opponent_of(&alice), Some(&bob));
        assert_eq!(room.opponent_of(&bob), Some(&alice));
        assert_eq!(room.opponent_of(&AccountId::from("carol")), None);
        assert_eq!(room.health_of(&bob), Some(70));
        assert!(room.has_player(&bob));
        assert!(!room.has_player(&AccountId::from("carol")));
    }

    #[test]
    fn test_loser_is_opponent_of_winner() {
        let mut room = BattleRoom::new(AccountId::from("alice"), "ABC123".to_string());
        room.player_two = Some(AccountId::from("bob"));
        assert_eq!(room.loser(), None);

        room.winner = Some(AccountId::from("bob"));
        assert_eq!(room.loser(), Some(&AccountId::from("alice")));
    }

    #[test]
    fn test_invite_code_format() {
        let code = generate_invite_code();
        assert_eq!(code.len(), INVITE_CODE_BYTES * 2);
        assert!(code
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn test_normalize_invite_code() {
        assert_eq!(normalize_invite_code("  ab12cd \n"), "AB12CD");
    }

    #[test]
    fn test_status_serialization() {
        let variants = [
            (RoomStatus::Waiting, "\"WAITING\""),
            (RoomStatus::Active, "\"ACTIVE\""),
            (RoomStatus::Completed, "\"COMPLETED\""),
            (RoomStatus::Abandoned, "\"ABANDONED\""),
        ];
        for (status, expected) in &variants {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(&json, expected);
            assert_eq!(status.as_str(), expected.trim_matches('"'));
        }
    }

    #[test]
    fn test_move_type_deserializes_uppercase() {
        let mv: MoveType = serde_json::from_str("\"SURRENDER\"").unwrap();
        assert_eq!(mv, MoveType::Surrender);
        assert!(serde_json::from_str::<MoveType>("\"surrender\"").is_err());
    }
}
