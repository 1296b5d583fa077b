//! In-memory account store.
//!
//! Profiles are journaled as full snapshots. Battle counters are derived from
//! the settlement journal instead: each settled battle is a single line, so a
//! result is either fully applied or not applied at all.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{AccountStore, Journal, StorageError};
use crate::models::{Account, AccountId, BattleResult, ProfileUpdate, RoomId};

#[derive(Default)]
struct AccountTable {
    accounts: HashMap<AccountId, Account>,
    by_username: HashMap<String, AccountId>,
    by_email: HashMap<String, AccountId>,
    settled: HashSet<RoomId>,
}

impl AccountTable {
    fn insert(&mut self, account: Account) {
        self.by_username
            .insert(account.username.clone(), account.id.clone());
        self.by_email.insert(account.email.clone(), account.id.clone());
        self.accounts.insert(account.id.clone(), account);
    }

    /// Counters for a result, or `None` if a player is unknown.
    fn tally(&mut self, result: &BattleResult) -> Option<()> {
        if !self.accounts.contains_key(&result.winner) || !self.accounts.contains_key(&result.loser)
        {
            return None;
        }
        let winner = self.accounts.get_mut(&result.winner)?;
        winner.total_battles += 1;
        winner.total_wins += 1;
        let loser = self.accounts.get_mut(&result.loser)?;
        loser.total_battles += 1;
        self.settled.insert(result.room_id.clone());
        Some(())
    }
}

pub struct MemoryAccountStore {
    table: RwLock<AccountTable>,
    profiles: Journal<Account>,
    settlements: Journal<BattleResult>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(AccountTable::default()),
            profiles: Journal::disabled(),
            settlements: Journal::disabled(),
        }
    }

    /// Replay profiles, then rebuild counters from settled battles.
    pub fn open(
        profiles: Journal<Account>,
        settlements: Journal<BattleResult>,
    ) -> Result<Self, StorageError> {
        let mut table = AccountTable::default();
        for mut account in profiles.replay_latest(|a| a.id.clone())? {
            account.total_battles = 0;
            account.total_wins = 0;
            table.insert(account);
        }

        let results = settlements.replay_latest(|r| r.room_id.clone())?;
        let mut skipped = 0usize;
        for result in &results {
            if table.tally(result).is_none() {
                skipped += 1;
            }
        }
        if skipped > 0 {
            warn!("Skipped {} settlements for unknown accounts", skipped);
        }
        if profiles.is_enabled() {
            info!(
                "Loaded {} accounts and {} settled battles from journal",
                table.accounts.len(),
                table.settled.len()
            );
        }

        Ok(Self {
            table: RwLock::new(table),
            profiles,
            settlements,
        })
    }
}

impl Default for MemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn create(&self, account: Account) -> Result<Account, StorageError> {
        let mut table = self.table.write().await;
        if table.by_username.contains_key(&account.username) {
            return Err(StorageError::UniqueConstraintViolation(format!(
                "username {}",
                account.username
            )));
        }
        if table.by_email.contains_key(&account.email) {
            return Err(StorageError::UniqueConstraintViolation(format!(
                "email {}",
                account.email
            )));
        }
        if table.accounts.contains_key(&account.id) {
            return Err(StorageError::UniqueConstraintViolation(format!(
                "account id {}",
                account.id
            )));
        }

        self.profiles.append(&account)?;
        table.insert(account.clone());
        debug!("Registered account {} ({})", account.id, account.username);
        Ok(account)
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, StorageError> {
        Ok(self.table.read().await.accounts.get(id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StorageError> {
        let table = self.table.read().await;
        let username = username.trim().to_lowercase();
        Ok(table
            .by_username
            .get(&username)
            .and_then(|id| table.accounts.get(id))
            .cloned())
    }

    async fn update_profile(
        &self,
        id: &AccountId,
        update: &ProfileUpdate,
    ) -> Result<Account, StorageError> {
        let mut table = self.table.write().await;
        let mut account = table
            .accounts
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("account {}", id)))?;

        account.apply_update(update);
        self.profiles.append(&account)?;
        table.accounts.insert(id.clone(), account.clone());
        Ok(account)
    }

    async fn apply_battle_result(&self, result: &BattleResult) -> Result<bool, StorageError> {
        let mut table = self.table.write().await;
        if table.settled.contains(&result.room_id) {
            debug!("Room {} already settled", result.room_id);
            return Ok(false);
        }
        for player in [&result.winner, &result.loser] {
            if !table.accounts.contains_key(player) {
                return Err(StorageError::NotFound(format!("account {}", player)));
            }
        }

        self.settlements.append(result)?;
        table.tally(result);
        debug!(
            "Settled room {}: {} beat {}",
            result.room_id, result.winner, result.loser
        );
        Ok(true)
    }

    async fn top_by_wins(&self, limit: usize) -> Result<Vec<Account>, StorageError> {
        let table = self.table.read().await;
        let mut accounts: Vec<Account> = table.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| {
            b.total_wins
                .cmp(&a.total_wins)
                .then_with(|| b.total_battles.cmp(&a.total_battles))
                .then_with(|| a.username.cmp(&b.username))
        });
        accounts.truncate(limit);
        Ok(accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewAccount;
    use tempfile::TempDir;

    fn account(username: &str) -> Account {
        Account::from_registration(NewAccount {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            ..NewAccount::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates() {
        let store = MemoryAccountStore::new();
        store.create(account("alice")).await.unwrap();

        let err = store.create(account("alice")).await.unwrap_err();
        assert!(matches!(err, StorageError::UniqueConstraintViolation(_)));

        let mut same_email = account("alice2");
        same_email.email = "alice@example.com".to_string();
        let err = store.create(same_email).await.unwrap_err();
        assert!(matches!(err, StorageError::UniqueConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_find_by_username_is_case_insensitive() {
        let store = MemoryAccountStore::new();
        let alice = store.create(account("alice")).await.unwrap();

        let found = store.find_by_username(" ALICE ").await.unwrap().unwrap();
        assert_eq!(found.id, alice.id);
    }

    #[tokio::test]
    async fn test_apply_battle_result_is_idempotent() {
        let store = MemoryAccountStore::new();
        let alice = store.create(account("alice")).await.unwrap();
        let bob = store.create(account("bob")).await.unwrap();
        let result = BattleResult::new(RoomId::from("room-1"), alice.id.clone(), bob.id.clone());

        assert!(store.apply_battle_result(&result).await.unwrap());
        assert!(!store.apply_battle_result(&result).await.unwrap());

        let alice = store.find_by_id(&alice.id).await.unwrap().unwrap();
        let bob = store.find_by_id(&bob.id).await.unwrap().unwrap();
        assert_eq!((alice.total_battles, alice.total_wins), (1, 1));
        assert_eq!((bob.total_battles, bob.total_wins), (1, 0));
    }

    #[tokio::test]
    async fn test_apply_battle_result_unknown_player() {
        let store = MemoryAccountStore::new();
        let alice = store.create(account("alice")).await.unwrap();
        let result = BattleResult::new(RoomId::from("room-1"), alice.id.clone(), "ghost".into());

        let err = store.apply_battle_result(&result).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        let alice = store.find_by_id(&alice.id).await.unwrap().unwrap();
        assert_eq!(alice.total_battles, 0);
    }

    #[tokio::test]
    async fn test_update_profile() {
        let store = MemoryAccountStore::new();
        let alice = store.create(account("alice")).await.unwrap();

        let updated = store
            .update_profile(
                &alice.id,
                &ProfileUpdate {
                    twitter_handle: Some("@alice".to_string()),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.twitter_handle, "@alice");

        let err = store
            .update_profile(&"ghost".into(), &ProfileUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_top_by_wins_ordering() {
        let store = MemoryAccountStore::new();
        let alice = store.create(account("alice")).await.unwrap();
        let bob = store.create(account("bob")).await.unwrap();
        let carol = store.create(account("carol")).await.unwrap();

        for (room, winner, loser) in [
            ("r1", &bob, &alice),
            ("r2", &bob, &carol),
            ("r3", &carol, &alice),
        ] {
            store
                .apply_battle_result(&BattleResult::new(
                    room.into(),
                    winner.id.clone(),
                    loser.id.clone(),
                ))
                .await
                .unwrap();
        }

        let top = store.top_by_wins(2).await.unwrap();
        let names: Vec<&str> = top.iter().map(|a| a.username.as_str()).collect();
        assert_eq!(names, vec!["bob", "carol"]);
    }

    #[tokio::test]
    async fn test_counters_rebuilt_from_settlements() {
        let dir = TempDir::new().unwrap();
        let profiles = dir.path().join("accounts.jsonl");
        let settlements = dir.path().join("settlements.jsonl");

        let (alice_id, bob_id) = {
            let store =
                MemoryAccountStore::open(Journal::at(&profiles), Journal::at(&settlements))
                    .unwrap();
            let alice = store.create(account("alice")).await.unwrap();
            let bob = store.create(account("bob")).await.unwrap();
            store
                .apply_battle_result(&BattleResult::new(
                    "r1".into(),
                    alice.id.clone(),
                    bob.id.clone(),
                ))
                .await
                .unwrap();
            (alice.id, bob.id)
        };

        let store =
            MemoryAccountStore::open(Journal::at(&profiles), Journal::at(&settlements)).unwrap();
        let alice = store.find_by_id(&alice_id).await.unwrap().unwrap();
        let bob = store.find_by_id(&bob_id).await.unwrap().unwrap();
        assert_eq!((alice.total_battles, alice.total_wins), (1, 1));
        assert_eq!((bob.total_battles, bob.total_wins), (1, 0));

        let replayed = BattleResult::new("r1".into(), alice_id, bob_id);
        assert!(!store.apply_battle_result(&replayed).await.unwrap());
    }
}
