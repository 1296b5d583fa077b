use std::sync::Arc;

use crate::battle::BattleService;
use crate::storage::{AccountStore, FollowStore};

#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountStore>,
    pub follows: Arc<dyn FollowStore>,
    pub battles: Arc<BattleService>,
}
