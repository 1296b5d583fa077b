//! Caller identity.
//!
//! Authentication happens upstream; the gateway forwards the caller's
//! account id in the `x-player-id` header.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::state::AppState;
use super::ApiError;
use crate::models::Account;

pub const PLAYER_HEADER: &str = "x-player-id";

/// The authenticated account making the request.
#[derive(Debug, Clone)]
pub struct CurrentPlayer(pub Account);

#[async_trait]
impl FromRequestParts<AppState> for CurrentPlayer {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(PLAYER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Player identity is required".to_string()))?;

        let account = state
            .accounts
            .find_by_id(&id.into())
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Unknown player".to_string()))?;

        Ok(CurrentPlayer(account))
    }
}
