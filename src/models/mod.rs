//! Core data models for roast battles.

mod account;
mod battle;
mod follow;
mod ids;

pub use account::*;
pub use battle::*;
pub use follow::*;
pub use ids::*;
