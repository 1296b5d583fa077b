//! # Roast Arena
//!
//! A backend for turn-based roast battles between two players.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (rooms, turns, accounts, follow edges)
//! - **battle**: The battle session state machine and its service
//! - **storage**: Store traits plus in-memory implementations journaled to JSONL
//! - **api**: REST API endpoints
//! - **config**: Configuration loading and validation

pub mod api;
pub mod battle;
pub mod config;
pub mod models;
pub mod storage;

pub use models::*;

use std::time::Duration;

/// Parse a duration such as "5s", "2m" or "1h". A bare number is seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    if digits.is_empty() {
        return None;
    }

    let secs_per_unit = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => return None,
    };
    let n: u64 = digits.parse().ok()?;
    n.checked_mul(secs_per_unit).map(Duration::from_secs)
}
