//! Follow edge model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, EntityId, FollowId};

/// A directed follow relationship.
///
/// Edges are journaled with an `active` flag; unfollowing writes the same
/// edge again with `active = false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowEdge {
    /// Derived from (follower, following), so re-following reuses the ID
    pub id: FollowId,
    pub follower: AccountId,
    pub following: AccountId,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

impl FollowEdge {
    pub fn new(follower: AccountId, following: AccountId) -> Self {
        Self {
            id: Self::id_for(&follower, &following),
            follower,
            following,
            active: true,
            updated_at: Utc::now(),
        }
    }

    pub fn id_for(follower: &AccountId, following: &AccountId) -> FollowId {
        EntityId::generate(&["follow", follower.as_str(), following.as_str()])
    }
}

/// Follower/following totals for a profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowCounts {
    pub followers: u32,
    pub following: u32,
}
