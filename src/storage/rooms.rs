//! In-memory room store with per-room locking.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::{Journal, RoomStore, StorageError};
use crate::models::{normalize_invite_code, AccountId, BattleRoom, RoomId, RoomStatus};

/// Rooms live in their own mutex slot so writes to different rooms never
/// contend. The outer map is only write-locked when a room is created.
pub struct MemoryRoomStore {
    rooms: RwLock<HashMap<RoomId, Arc<Mutex<BattleRoom>>>>,
    invite_index: RwLock<HashMap<String, RoomId>>,
    journal: Journal<BattleRoom>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::with_journal(Journal::disabled())
    }

    /// Build a store from a journal, replaying the latest state of every room.
    pub fn open(journal: Journal<BattleRoom>) -> Result<Self, StorageError> {
        let rooms = journal.replay_latest(|r| r.id.clone())?;
        let mut slots = HashMap::with_capacity(rooms.len());
        let mut index = HashMap::with_capacity(rooms.len());
        for room in rooms {
            index.insert(normalize_invite_code(&room.invite_code), room.id.clone());
            slots.insert(room.id.clone(), Arc::new(Mutex::new(room)));
        }
        if journal.is_enabled() {
            info!("Loaded {} battle rooms from journal", slots.len());
        }
        Ok(Self {
            rooms: RwLock::new(slots),
            invite_index: RwLock::new(index),
            journal,
        })
    }

    fn with_journal(journal: Journal<BattleRoom>) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            invite_index: RwLock::new(HashMap::new()),
            journal,
        }
    }

    async fn slot(&self, id: &RoomId) -> Option<Arc<Mutex<BattleRoom>>> {
        self.rooms.read().await.get(id).cloned()
    }

    async fn snapshot_all(&self) -> Vec<BattleRoom> {
        let slots: Vec<_> = self.rooms.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(slots.len());
        for slot in slots {
            out.push(slot.lock().await.clone());
        }
        out
    }
}

impl Default for MemoryRoomStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn create(&self, mut room: BattleRoom) -> Result<BattleRoom, StorageError> {
        room.invite_code = normalize_invite_code(&room.invite_code);

        // Lock order: invite index, then rooms.
        let mut index = self.invite_index.write().await;
        if index.contains_key(&room.invite_code) {
            return Err(StorageError::UniqueConstraintViolation(format!(
                "invite_code {}",
                room.invite_code
            )));
        }
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&room.id) {
            return Err(StorageError::UniqueConstraintViolation(format!(
                "room id {}",
                room.id
            )));
        }

        self.journal.append(&room)?;
        index.insert(room.invite_code.clone(), room.id.clone());
        rooms.insert(room.id.clone(), Arc::new(Mutex::new(room.clone())));

        debug!("Created room {} ({})", room.id, room.invite_code);
        Ok(room)
    }

    async fn find_by_id(&self, id: &RoomId) -> Result<Option<BattleRoom>, StorageError> {
        match self.slot(id).await {
            Some(slot) => Ok(Some(slot.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn find_by_invite_code(&self, code: &str) -> Result<Option<BattleRoom>, StorageError> {
        let id = {
            let index = self.invite_index.read().await;
            index.get(&normalize_invite_code(code)).cloned()
        };
        match id {
            Some(id) => self.find_by_id(&id).await,
            None => Ok(None),
        }
    }

    async fn compare_and_swap(
        &self,
        id: &RoomId,
        expected_version: u64,
        mut new_state: BattleRoom,
    ) -> Result<BattleRoom, StorageError> {
        let slot = self
            .slot(id)
            .await
            .ok_or_else(|| StorageError::NotFound(format!("room {}", id)))?;

        let mut current = slot.lock().await;
        if current.version != expected_version {
            return Err(StorageError::VersionConflict {
                id: id.to_string(),
                expected: expected_version,
                actual: current.version,
            });
        }

        // Identity fields are owned by the store.
        new_state.id = current.id.clone();
        new_state.invite_code = current.invite_code.clone();
        new_state.version = expected_version + 1;
        new_state.updated_at = Utc::now();

        self.journal.append(&new_state)?;
        *current = new_state.clone();

        debug!(
            "Room {} now at version {} ({})",
            id,
            new_state.version,
            new_state.status.as_str()
        );
        Ok(new_state)
    }

    async fn list_for_player(&self, player: &AccountId) -> Result<Vec<BattleRoom>, StorageError> {
        let mut rooms: Vec<BattleRoom> = self
            .snapshot_all()
            .await
            .into_iter()
            .filter(|r| r.has_player(player))
            .collect();
        rooms.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(rooms)
    }

    async fn list_by_status(&self, status: RoomStatus) -> Result<Vec<BattleRoom>, StorageError> {
        let mut rooms: Vec<BattleRoom> = self
            .snapshot_all()
            .await
            .into_iter()
            .filter(|r| r.status == status)
            .collect();
        rooms.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rooms)
    }
}
