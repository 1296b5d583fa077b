use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::auth::CurrentPlayer;
use crate::api::state::AppState;
use crate::api::{ApiError, Pagination, PaginationMeta};
use crate::models::{Account, AccountId, NewAccount, ProfileUpdate};

const DEFAULT_LEADERBOARD_SIZE: usize = 10;
const MAX_LEADERBOARD_SIZE: usize = 100;

/// Profile fields anyone may see.
#[derive(Debug, Serialize)]
pub struct PublicAccount {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: String,
    pub twitter_handle: String,
    pub total_battles: u64,
    pub total_wins: u64,
    pub total_losses: u64,
}

impl From<&Account> for PublicAccount {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.to_string(),
            username: account.username.clone(),
            display_name: account.display_name.clone(),
            avatar_url: account.avatar_url.clone(),
            twitter_handle: account.twitter_handle.clone(),
            total_battles: account.total_battles,
            total_wins: account.total_wins,
            total_losses: account.total_losses(),
        }
    }
}

/// The caller's own account, including private fields.
#[derive(Debug, Serialize)]
pub struct PrivateAccount {
    #[serde(flatten)]
    pub profile: PublicAccount,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Account> for PrivateAccount {
    fn from(account: &Account) -> Self {
        Self {
            profile: PublicAccount::from(account),
            email: account.email.clone(),
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub account: PrivateAccount,
    pub message: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<NewAccount>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let account = Account::from_registration(input).map_err(ApiError::BadRequest)?;
    let account = state.accounts.create(account).await?;
    tracing::info!("Registered account {} ({})", account.username, account.id);

    Ok((
        StatusCode::CREATED,
        Json(AccountResponse {
            account: PrivateAccount::from(&account),
            message: "Account registered successfully".to_string(),
        }),
    ))
}

pub async fn current_account(CurrentPlayer(account): CurrentPlayer) -> Json<PrivateAccount> {
    Json(PrivateAccount::from(&account))
}

pub async fn update_account(
    State(state): State<AppState>,
    CurrentPlayer(account): CurrentPlayer,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<AccountResponse>, ApiError> {
    if update.is_empty() {
        return Err(ApiError::BadRequest(
            "Provide at least one of display_name, avatar_url, twitter_handle".to_string(),
        ));
    }
    let account = state.accounts.update_profile(&account.id, &update).await?;

    Ok(Json(AccountResponse {
        account: PrivateAccount::from(&account),
        message: "Account details updated successfully".to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub account: PublicAccount,
    pub followers: u32,
    pub following: u32,
    /// Whether the caller follows this account
    pub is_following: bool,
}

pub async fn get_profile(
    State(state): State<AppState>,
    CurrentPlayer(viewer): CurrentPlayer,
    Path(id_or_username): Path<String>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let account = match state
        .accounts
        .find_by_id(&AccountId::from(id_or_username.as_str()))
        .await?
    {
        Some(account) => account,
        None => state
            .accounts
            .find_by_username(&id_or_username)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Account {}", id_or_username)))?,
    };
    let counts = state.follows.counts(&account.id).await?;
    let is_following = state.follows.is_following(&viewer.id, &account.id).await?;

    Ok(Json(ProfileResponse {
        account: PublicAccount::from(&account),
        followers: counts.followers,
        following: counts.following,
        is_following,
    }))
}

#[derive(Debug, Serialize)]
pub struct FollowResponse {
    pub following: bool,
    /// False when the call was a no-op
    pub changed: bool,
}

pub async fn follow(
    State(state): State<AppState>,
    CurrentPlayer(viewer): CurrentPlayer,
    Path(id): Path<String>,
) -> Result<Json<FollowResponse>, ApiError> {
    let target = find_account(&state, &id.into()).await?;
    if target.id == viewer.id {
        return Err(ApiError::BadRequest("You cannot follow yourself".to_string()));
    }
    let changed = state.follows.follow(&viewer.id, &target.id).await?;
    Ok(Json(FollowResponse {
        following: true,
        changed,
    }))
}

pub async fn unfollow(
    State(state): State<AppState>,
    CurrentPlayer(viewer): CurrentPlayer,
    Path(id): Path<String>,
) -> Result<Json<FollowResponse>, ApiError> {
    let target = find_account(&state, &id.into()).await?;
    let changed = state.follows.unfollow(&viewer.id, &target.id).await?;
    Ok(Json(FollowResponse {
        following: false,
        changed,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct AccountListResponse {
    pub accounts: Vec<PublicAccount>,
    pub pagination: PaginationMeta,
}

pub async fn followers(
    State(state): State<AppState>,
    _viewer: CurrentPlayer,
    Path(id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<AccountListResponse>, ApiError> {
    let account = find_account(&state, &id.into()).await?;
    let ids = state.follows.followers(&account.id).await?;
    account_page(&state, ids, &params).await
}

pub async fn following(
    State(state): State<AppState>,
    _viewer: CurrentPlayer,
    Path(id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<AccountListResponse>, ApiError> {
    let account = find_account(&state, &id.into()).await?;
    let ids = state.follows.following(&account.id).await?;
    account_page(&state, ids, &params).await
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    #[serde(flatten)]
    pub account: PublicAccount,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub leaderboard: Vec<LeaderboardEntry>,
}

pub async fn leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_SIZE)
        .clamp(1, MAX_LEADERBOARD_SIZE);
    let top = state.accounts.top_by_wins(limit).await?;

    let leaderboard = top
        .iter()
        .enumerate()
        .map(|(idx, account)| LeaderboardEntry {
            rank: idx + 1,
            account: PublicAccount::from(account),
        })
        .collect();

    Ok(Json(LeaderboardResponse { leaderboard }))
}

async fn find_account(state: &AppState, id: &AccountId) -> Result<Account, ApiError> {
    state
        .accounts
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Account {}", id)))
}

async fn account_page(
    state: &AppState,
    ids: Vec<AccountId>,
    params: &PageParams,
) -> Result<Json<AccountListResponse>, ApiError> {
    let pagination = Pagination::new(params.page, params.page_size);
    let (page_ids, meta) = pagination.apply(ids);

    let mut accounts = Vec::with_capacity(page_ids.len());
    for id in &page_ids {
        if let Some(account) = state.accounts.find_by_id(id).await? {
            accounts.push(PublicAccount::from(&account));
        }
    }

    Ok(Json(AccountListResponse {
        accounts,
        pagination: meta,
    }))
}
