//! Battle operations against the room and account stores.
//!
//! Every mutating operation is one read plus one compare-and-swap. A lost
//! race surfaces as an error, never as a silent retry.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::machine::{self, MoveOutcome};
use super::{BattleError, BattleRules};
use crate::models::{
    generate_invite_code, AccountId, BattleResult, BattleRoom, MoveType, RoomId, RoomStatus,
};
use crate::storage::{AccountStore, RoomStore, StorageError};

pub struct BattleService {
    rooms: Arc<dyn RoomStore>,
    accounts: Arc<dyn AccountStore>,
    rules: BattleRules,
}

impl BattleService {
    pub fn new(
        rooms: Arc<dyn RoomStore>,
        accounts: Arc<dyn AccountStore>,
        rules: BattleRules,
    ) -> Self {
        Self {
            rooms,
            accounts,
            rules,
        }
    }

    /// Run a store call under the configured timeout.
    async fn bounded<T, F>(&self, fut: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        match tokio::time::timeout(self.rules.storage_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(self.rules.storage_timeout)),
        }
    }

    /// Open a waiting room for `creator` with a fresh invite code.
    pub async fn create_room(&self, creator: &AccountId) -> Result<BattleRoom, BattleError> {
        let attempts = self.rules.invite_code_attempts;
        for attempt in 1..=attempts {
            let room = BattleRoom::new(creator.clone(), generate_invite_code());
            match self.bounded(self.rooms.create(room)).await {
                Ok(room) => {
                    info!(
                        room_id = %room.id,
                        player = %creator,
                        "Created battle room {}",
                        room.invite_code
                    );
                    return Ok(room);
                }
                Err(StorageError::UniqueConstraintViolation(what)) => {
                    warn!(attempt, "Invite code collision on {}, retrying", what);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(BattleError::CodeGenerationExhausted(attempts))
    }

    /// Join a waiting room by invite code.
    pub async fn join_room(
        &self,
        joiner: &AccountId,
        invite_code: &str,
    ) -> Result<BattleRoom, BattleError> {
        let room = self
            .bounded(self.rooms.find_by_invite_code(invite_code))
            .await?
            .ok_or(BattleError::RoomNotFound)?;

        let next = machine::join(&room, joiner)?;
        match self
            .bounded(self.rooms.compare_and_swap(&room.id, room.version, next))
            .await
        {
            Ok(room) => {
                info!(room_id = %room.id, player = %joiner, "Player joined, battle is active");
                Ok(room)
            }
            // Someone else joined or the creator walked away first
            Err(StorageError::VersionConflict { .. }) | Err(StorageError::NotFound(_)) => {
                debug!(room_id = %room.id, player = %joiner, "Lost join race");
                Err(BattleError::RoomNotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Submit a move for `player`. Completing the battle settles both
    /// players' counters.
    pub async fn submit_move(
        &self,
        player: &AccountId,
        room_id: &RoomId,
        move_type: MoveType,
        insult_text: &str,
    ) -> Result<BattleRoom, BattleError> {
        let room = self.load(room_id).await?;
        let MoveOutcome { room: next, turn, result } =
            machine::apply_move(&room, player, move_type, insult_text, &self.rules)?;

        let stored = self.commit(&room, next).await?;
        debug!(
            room_id = %stored.id,
            player = %player,
            move_type = ?turn.move_type,
            points = turn.points_scored,
            "Move accepted"
        );

        if let Some(result) = result {
            info!(
                room_id = %stored.id,
                winner = %result.winner,
                "Battle completed after {} rounds",
                stored.rounds.len()
            );
            self.settle(&result).await;
        }
        Ok(stored)
    }

    /// Mark a waiting or active room as abandoned.
    pub async fn abandon(
        &self,
        player: &AccountId,
        room_id: &RoomId,
    ) -> Result<BattleRoom, BattleError> {
        let room = self.load(room_id).await?;
        let next = machine::abandon(&room, player)?;
        let stored = self.commit(&room, next).await?;
        info!(room_id = %stored.id, player = %player, "Battle abandoned");
        Ok(stored)
    }

    pub async fn get_room(&self, room_id: &RoomId) -> Result<BattleRoom, BattleError> {
        self.load(room_id).await
    }

    /// Rooms the player took part in, newest first.
    pub async fn history(&self, player: &AccountId) -> Result<Vec<BattleRoom>, BattleError> {
        Ok(self.bounded(self.rooms.list_for_player(player)).await?)
    }

    /// Re-apply the result of every completed room. Settlement is idempotent
    /// per room, so this only fills in results that were never recorded.
    /// A room that fails to settle is logged and skipped; only listing the
    /// rooms can fail the sweep.
    pub async fn settle_completed(&self) -> Result<usize, BattleError> {
        let completed = self
            .bounded(self.rooms.list_by_status(RoomStatus::Completed))
            .await?;

        let mut settled = 0;
        let mut failed = 0;
        for room in &completed {
            let Some(result) = result_of(room) else {
                warn!(room_id = %room.id, "Completed room has no winner/loser pair");
                failed += 1;
                continue;
            };
            match self.bounded(self.accounts.apply_battle_result(&result)).await {
                Ok(true) => settled += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(room_id = %room.id, "Failed to settle battle: {}", e);
                    failed += 1;
                }
            }
        }
        if settled > 0 {
            info!("Settled {} previously unrecorded battles", settled);
        }
        if failed > 0 {
            warn!("{} completed battles could not be settled", failed);
        }
        Ok(settled)
    }

    async fn load(&self, room_id: &RoomId) -> Result<BattleRoom, BattleError> {
        self.bounded(self.rooms.find_by_id(room_id))
            .await?
            .ok_or(BattleError::RoomNotFound)
    }

    async fn commit(&self, current: &BattleRoom, next: BattleRoom) -> Result<BattleRoom, BattleError> {
        match self
            .bounded(self.rooms.compare_and_swap(&current.id, current.version, next))
            .await
        {
            Ok(room) => Ok(room),
            Err(StorageError::VersionConflict { .. }) => {
                warn!(room_id = %current.id, "Concurrent update, rejecting stale write");
                Err(BattleError::Conflict)
            }
            Err(StorageError::NotFound(_)) => Err(BattleError::RoomNotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Record a finished battle. The room is already committed as completed,
    /// so a failure here is left for `settle_completed` to pick up.
    async fn settle(&self, result: &BattleResult) {
        match self.bounded(self.accounts.apply_battle_result(result)).await {
            Ok(true) => debug!(room_id = %result.room_id, "Battle counters updated"),
            Ok(false) => debug!(room_id = %result.room_id, "Battle already settled"),
            Err(e) => error!(
                room_id = %result.room_id,
                "Failed to record battle result, will retry on next settlement pass: {}",
                e
            ),
        }
    }
}

fn result_of(room: &BattleRoom) -> Option<BattleResult> {
    let winner = room.winner.clone()?;
    let loser = room.loser()?.clone();
    Some(BattleResult::new(room.id.clone(), winner, loser))
}
