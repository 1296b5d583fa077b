use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::auth::CurrentPlayer;
use crate::api::routes::accounts::PageParams;
use crate::api::state::AppState;
use crate::api::{ApiError, Pagination, PaginationMeta};
use crate::models::{AccountId, BattleRoom, MoveType, RoomStatus, Turn};

/// A room as seen by one viewer. Only the creator sees the invite code.
#[derive(Debug, Serialize)]
pub struct RoomView {
    pub id: String,
    pub player_one: String,
    pub player_two: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_code: Option<String>,
    pub status: RoomStatus,
    pub turn_player: Option<String>,
    pub winner: Option<String>,
    pub player_one_health: u32,
    pub player_two_health: u32,
    pub rounds: Vec<Turn>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoomView {
    pub fn for_viewer(room: BattleRoom, viewer: &AccountId) -> Self {
        let invite_code = (&room.player_one == viewer).then_some(room.invite_code);
        Self {
            id: room.id.to_string(),
            player_one: room.player_one.to_string(),
            player_two: room.player_two.map(|p| p.to_string()),
            invite_code,
            status: room.status,
            turn_player: room.turn_player.map(|p| p.to_string()),
            winner: room.winner.map(|p| p.to_string()),
            player_one_health: room.player_one_health,
            player_two_health: room.player_two_health,
            rounds: room.rounds,
            version: room.version,
            created_at: room.created_at,
            updated_at: room.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub room: RoomView,
    pub message: String,
}

fn respond(room: BattleRoom, viewer: &AccountId, message: impl Into<String>) -> Json<RoomResponse> {
    Json(RoomResponse {
        room: RoomView::for_viewer(room, viewer),
        message: message.into(),
    })
}

pub async fn create_room(
    State(state): State<AppState>,
    CurrentPlayer(player): CurrentPlayer,
) -> Result<(StatusCode, Json<RoomResponse>), ApiError> {
    let room = state.battles.create_room(&player.id).await?;
    Ok((
        StatusCode::CREATED,
        respond(
            room,
            &player.id,
            "Room successfully created. Share the invite code!",
        ),
    ))
}

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub invite_code: String,
}

pub async fn join_room(
    State(state): State<AppState>,
    CurrentPlayer(player): CurrentPlayer,
    Json(req): Json<JoinRequest>,
) -> Result<Json<RoomResponse>, ApiError> {
    let room = state.battles.join_room(&player.id, &req.invite_code).await?;
    Ok(respond(room, &player.id, "Successfully joined the room"))
}

pub async fn get_room(
    State(state): State<AppState>,
    CurrentPlayer(player): CurrentPlayer,
    Path(id): Path<String>,
) -> Result<Json<RoomView>, ApiError> {
    let room = state.battles.get_room(&id.into()).await?;
    Ok(Json(RoomView::for_viewer(room, &player.id)))
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub move_type: MoveType,
    #[serde(default)]
    pub insult_text: String,
}

pub async fn submit_move(
    State(state): State<AppState>,
    CurrentPlayer(player): CurrentPlayer,
    Path(id): Path<String>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<RoomResponse>, ApiError> {
    let room = state
        .battles
        .submit_move(&player.id, &id.into(), req.move_type, &req.insult_text)
        .await?;

    let message = match (&room.status, &room.winner) {
        (RoomStatus::Completed, Some(winner)) if winner == &player.id => "You won the battle",
        (RoomStatus::Completed, _) => "Battle over",
        _ => "Move accepted",
    };
    Ok(respond(room, &player.id, message))
}

pub async fn abandon(
    State(state): State<AppState>,
    CurrentPlayer(player): CurrentPlayer,
    Path(id): Path<String>,
) -> Result<Json<RoomResponse>, ApiError> {
    let room = state.battles.abandon(&player.id, &id.into()).await?;
    Ok(respond(room, &player.id, "Battle abandoned"))
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BattleOutcome {
    Win,
    Loss,
}

#[derive(Debug, Serialize)]
pub struct BattleSummary {
    pub id: String,
    pub opponent: Option<String>,
    pub status: RoomStatus,
    pub outcome: Option<BattleOutcome>,
    pub rounds: usize,
    pub created_at: DateTime<Utc>,
}

impl BattleSummary {
    fn for_player(room: &BattleRoom, player: &AccountId) -> Self {
        let outcome = room.winner.as_ref().map(|w| {
            if w == player {
                BattleOutcome::Win
            } else {
                BattleOutcome::Loss
            }
        });
        Self {
            id: room.id.to_string(),
            opponent: room.opponent_of(player).map(|p| p.to_string()),
            status: room.status,
            outcome,
            rounds: room.rounds.len(),
            created_at: room.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub battles: Vec<BattleSummary>,
    pub pagination: PaginationMeta,
}

pub async fn history(
    State(state): State<AppState>,
    _viewer: CurrentPlayer,
    Path(id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let player = AccountId::from(id);
    if state.accounts.find_by_id(&player).await?.is_none() {
        return Err(ApiError::NotFound(format!("Account {}", player)));
    }

    let rooms = state.battles.history(&player).await?;
    let pagination = Pagination::new(params.page, params.page_size);
    let (page, meta) = pagination.apply(rooms);

    Ok(Json(HistoryResponse {
        battles: page
            .iter()
            .map(|room| BattleSummary::for_player(room, &player))
            .collect(),
        pagination: meta,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    use crate::api::build_router;
    use crate::api::test_support::*;

    const INSULT: &str = "your code compiles on the first try only by accident";

    async fn start_battle(app: axum::Router) -> (String, String, String) {
        let alice = register(app.clone(), "alice").await;
        let bob = register(app.clone(), "bob").await;

        let (status, created) = send(app.clone(), "POST", "/api/battles", Some(&alice), None).await;
        assert_eq!(status, StatusCode::CREATED);
        let code = created["room"]["invite_code"].as_str().unwrap().to_string();

        let (status, joined) = send(
            app,
            "POST",
            "/api/battles/join",
            Some(&bob),
            Some(json!({ "invite_code": code })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let room_id = joined["room"]["id"].as_str().unwrap().to_string();
        (alice, bob, room_id)
    }

    async fn play(
        app: axum::Router,
        player: &str,
        room_id: &str,
        body: Value,
    ) -> (StatusCode, Value) {
        send(
            app,
            "POST",
            &format!("/api/battles/{}/moves", room_id),
            Some(player),
            Some(body),
        )
        .await
    }

    #[tokio::test]
    async fn test_create_room_reveals_code_to_creator_only() {
        let app = build_router(test_state());
        let alice = register(app.clone(), "alice").await;
        let bob = register(app.clone(), "bob").await;

        let (status, json) = send(app.clone(), "POST", "/api/battles", Some(&alice), None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["room"]["status"], "WAITING");
        assert_eq!(json["room"]["invite_code"].as_str().unwrap().len(), 6);
        assert_eq!(json["room"]["player_one_health"], 100);

        let room_id = json["room"]["id"].as_str().unwrap();
        let (status, json) = send(
            app,
            "GET",
            &format!("/api/battles/{}", room_id),
            Some(&bob),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json.get("invite_code").is_none());
    }

    #[tokio::test]
    async fn test_full_battle_over_http() {
        let app = build_router(test_state());
        let (alice, bob, room_id) = start_battle(app.clone()).await;

        let (status, json) = play(
            app.clone(),
            &alice,
            &room_id,
            json!({"move_type": "ATTACK", "insult_text": INSULT}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["room"]["turn_player"], bob.as_str());
        assert!(json["room"]["player_two_health"].as_u64().unwrap() < 100);
        assert_eq!(json["message"], "Move accepted");

        let (status, json) = play(
            app.clone(),
            &bob,
            &room_id,
            json!({"move_type": "SURRENDER"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["room"]["status"], "COMPLETED");
        assert_eq!(json["room"]["winner"], alice.as_str());
        assert_eq!(json["message"], "Battle over");

        let (_, me) = send(app.clone(), "GET", "/api/accounts/me", Some(&alice), None).await;
        assert_eq!(me["total_battles"], 1);
        assert_eq!(me["total_wins"], 1);

        let (status, history) = send(
            app,
            "GET",
            &format!("/api/accounts/{}/battles", bob),
            Some(&bob),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history["battles"][0]["outcome"], "loss");
        assert_eq!(history["battles"][0]["opponent"], alice.as_str());
        assert_eq!(history["battles"][0]["rounds"], 2);
    }

    #[tokio::test]
    async fn test_out_of_turn_move_rejected() {
        let app = build_router(test_state());
        let (_, bob, room_id) = start_battle(app.clone()).await;

        let (status, json) = play(
            app,
            &bob,
            &room_id,
            json!({"move_type": "ATTACK", "insult_text": INSULT}),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["code"], "NOT_YOUR_TURN");
    }

    #[tokio::test]
    async fn test_second_join_reports_not_found() {
        let app = build_router(test_state());
        let alice = register(app.clone(), "alice").await;
        let bob = register(app.clone(), "bob").await;
        let carol = register(app.clone(), "carol").await;

        let (_, created) = send(app.clone(), "POST", "/api/battles", Some(&alice), None).await;
        let code = created["room"]["invite_code"].as_str().unwrap().to_string();

        let (status, _) = send(
            app.clone(),
            "POST",
            "/api/battles/join",
            Some(&bob),
            Some(json!({ "invite_code": code.to_lowercase() })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, late) = send(
            app.clone(),
            "POST",
            "/api/battles/join",
            Some(&carol),
            Some(json!({ "invite_code": code })),
        )
        .await;
        let (_, bogus) = send(
            app,
            "POST",
            "/api/battles/join",
            Some(&carol),
            Some(json!({ "invite_code": "NOPE00" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        // Full and unknown rooms are indistinguishable
        assert_eq!(late, bogus);
    }

    #[tokio::test]
    async fn test_self_join_rejected() {
        let app = build_router(test_state());
        let alice = register(app.clone(), "alice").await;
        let (_, created) = send(app.clone(), "POST", "/api/battles", Some(&alice), None).await;
        let code = created["room"]["invite_code"].as_str().unwrap().to_string();

        let (status, json) = send(
            app,
            "POST",
            "/api/battles/join",
            Some(&alice),
            Some(json!({ "invite_code": code })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["code"], "SELF_JOIN_REJECTED");
    }

    #[tokio::test]
    async fn test_abandon_then_move_rejected() {
        let app = build_router(test_state());
        let (alice, bob, room_id) = start_battle(app.clone()).await;

        let (status, json) = send(
            app.clone(),
            "POST",
            &format!("/api/battles/{}/abandon", room_id),
            Some(&bob),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["room"]["status"], "ABANDONED");
        assert!(json["room"]["winner"].is_null());

        let (status, json) = play(app, &alice, &room_id, json!({"move_type": "SKIP"})).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["code"], "ROOM_NOT_ACTIVE");
    }

    #[tokio::test]
    async fn test_unknown_room_is_not_found() {
        let app = build_router(test_state());
        let alice = register(app.clone(), "alice").await;

        let (status, json) = send(app, "GET", "/api/battles/missing", Some(&alice), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "ROOM_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_overlong_insult_is_bad_request() {
        let app = build_router(test_state());
        let (alice, _, room_id) = start_battle(app.clone()).await;

        let (status, json) = play(
            app,
            &alice,
            &room_id,
            json!({"move_type": "ATTACK", "insult_text": "x".repeat(281)}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "INSULT_TOO_LONG");
    }
}
