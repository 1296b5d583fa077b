//! In-memory follow graph.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{FollowStore, Journal, StorageError};
use crate::models::{AccountId, FollowCounts, FollowEdge, FollowId};

pub struct MemoryFollowStore {
    edges: RwLock<HashMap<FollowId, FollowEdge>>,
    journal: Journal<FollowEdge>,
}

impl MemoryFollowStore {
    pub fn new() -> Self {
        Self {
            edges: RwLock::new(HashMap::new()),
            journal: Journal::disabled(),
        }
    }

    pub fn open(journal: Journal<FollowEdge>) -> Result<Self, StorageError> {
        let edges = journal
            .replay_latest(|e| e.id.clone())?
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect();
        Ok(Self {
            edges: RwLock::new(edges),
            journal,
        })
    }

    async fn select_edges<F>(&self, select: F) -> Vec<AccountId>
    where
        F: Fn(&FollowEdge) -> Option<AccountId>,
    {
        let edges = self.edges.read().await;
        let mut active: Vec<&FollowEdge> = edges.values().filter(|e| e.active).collect();
        active.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        active.into_iter().filter_map(|e| select(e)).collect()
    }
}

impl Default for MemoryFollowStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FollowStore for MemoryFollowStore {
    async fn follow(
        &self,
        follower: &AccountId,
        following: &AccountId,
    ) -> Result<bool, StorageError> {
        let mut edges = self.edges.write().await;
        let id = FollowEdge::id_for(follower, following);
        if edges.get(&id).is_some_and(|e| e.active) {
            return Ok(false);
        }
        let edge = FollowEdge::new(follower.clone(), following.clone());
        self.journal.append(&edge)?;
        edges.insert(id, edge);
        Ok(true)
    }

    async fn unfollow(
        &self,
        follower: &AccountId,
        following: &AccountId,
    ) -> Result<bool, StorageError> {
        let mut edges = self.edges.write().await;
        let id = FollowEdge::id_for(follower, following);
        let Some(existing) = edges.get(&id).filter(|e| e.active) else {
            return Ok(false);
        };
        let mut edge = existing.clone();
        edge.active = false;
        edge.updated_at = Utc::now();
        self.journal.append(&edge)?;
        edges.insert(id, edge);
        Ok(true)
    }

    async fn is_following(
        &self,
        follower: &AccountId,
        following: &AccountId,
    ) -> Result<bool, StorageError> {
        let edges = self.edges.read().await;
        Ok(edges
            .get(&FollowEdge::id_for(follower, following))
            .is_some_and(|e| e.active))
    }

    async fn followers(&self, account: &AccountId) -> Result<Vec<AccountId>, StorageError> {
        Ok(self
            .select_edges(|e| (&e.following == account).then(|| e.follower.clone()))
            .await)
    }

    async fn following(&self, account: &AccountId) -> Result<Vec<AccountId>, StorageError> {
        Ok(self
            .select_edges(|e| (&e.follower == account).then(|| e.following.clone()))
            .await)
    }

    async fn counts(&self, account: &AccountId) -> Result<FollowCounts, StorageError> {
        let edges = self.edges.read().await;
        let mut counts = FollowCounts::default();
        for edge in edges.values().filter(|e| e.active) {
            if &edge.following == account {
                counts.followers += 1;
            }
            if &edge.follower == account {
                counts.following += 1;
            }
        }
        Ok(counts)
    }
}
