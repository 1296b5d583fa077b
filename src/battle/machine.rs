//! Pure room transitions.
//!
//! Each function takes the current room and returns the next state without
//! touching storage; the service commits it with compare-and-swap.

use chrono::Utc;

use super::scoring::score_insult;
use super::{BattleError, BattleRules};
use crate::models::{AccountId, BattleResult, BattleRoom, MoveType, RoomStatus, Turn};

/// The state after an accepted move.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub room: BattleRoom,
    pub turn: Turn,
    /// Present when this move ended the battle
    pub result: Option<BattleResult>,
}

/// Seat `joiner` as player two. The creator moves first.
pub fn join(room: &BattleRoom, joiner: &AccountId) -> Result<BattleRoom, BattleError> {
    if room.status != RoomStatus::Waiting || room.player_two.is_some() {
        return Err(BattleError::RoomNotFound);
    }
    if &room.player_one == joiner {
        return Err(BattleError::SelfJoinRejected);
    }

    let mut next = room.clone();
    next.player_two = Some(joiner.clone());
    next.status = RoomStatus::Active;
    next.turn_player = Some(room.player_one.clone());
    Ok(next)
}

/// Resolve one move by `player`.
pub fn apply_move(
    room: &BattleRoom,
    player: &AccountId,
    move_type: MoveType,
    insult_text: &str,
    rules: &BattleRules,
) -> Result<MoveOutcome, BattleError> {
    if !room.has_player(player) {
        return Err(BattleError::PlayerNotInRoom);
    }
    if room.status != RoomStatus::Active {
        return Err(BattleError::RoomNotActive);
    }
    if room.turn_player.as_ref() != Some(player) {
        return Err(BattleError::NotYourTurn);
    }
    let opponent = room
        .opponent_of(player)
        .cloned()
        .ok_or(BattleError::RoomNotActive)?;

    let insult_text = insult_text.trim();
    if insult_text.chars().count() > rules.max_insult_chars {
        return Err(BattleError::InsultTooLong(rules.max_insult_chars));
    }

    let points_scored = match move_type {
        MoveType::Attack => score_insult(insult_text, rules.max_points_per_turn),
        MoveType::Skip | MoveType::Surrender => 0,
    };

    let mut next = room.clone();
    if points_scored > 0 {
        if let Some(health) = next.health_mut(&opponent) {
            *health = health.saturating_sub(points_scored);
        }
    }

    let turn = Turn {
        player: player.clone(),
        move_type,
        insult_text: insult_text.to_string(),
        points_scored,
        timestamp: Utc::now(),
    };
    next.rounds.push(turn.clone());

    let winner = match move_type {
        MoveType::Surrender => Some(opponent.clone()),
        _ if next.health_of(&opponent) == Some(0) => Some(player.clone()),
        _ => None,
    };

    let result = match winner {
        Some(winner) => {
            let loser = if winner == opponent {
                player.clone()
            } else {
                opponent
            };
            next.status = RoomStatus::Completed;
            next.turn_player = None;
            next.winner = Some(winner.clone());
            Some(BattleResult::new(room.id.clone(), winner, loser))
        }
        None => {
            next.turn_player = Some(opponent);
            None
        }
    };

    Ok(MoveOutcome {
        room: next,
        turn,
        result,
    })
}

/// Walk away from a waiting or active room. No winner, no counters.
pub fn abandon(room: &BattleRoom, player: &AccountId) -> Result<BattleRoom, BattleError> {
    if !room.has_player(player) {
        return Err(BattleError::PlayerNotInRoom);
    }
    if room.status.is_terminal() {
        return Err(BattleError::RoomNotActive);
    }

    let mut next = room.clone();
    next.status = RoomStatus::Abandoned;
    next.turn_player = None;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::STARTING_HEALTH;
    use pretty_assertions::assert_eq;

    const INSULT: &str = "your code compiles on the first try only by accident";

    fn alice() -> AccountId {
        AccountId::from("alice")
    }

    fn bob() -> AccountId {
        AccountId::from("bob")
    }

    fn active_room() -> BattleRoom {
        let room = BattleRoom::new(alice(), "ABC123".to_string());
        join(&room, &bob()).unwrap()
    }

    fn play(
        room: &BattleRoom,
        player: &AccountId,
        move_type: MoveType,
        text: &str,
    ) -> Result<MoveOutcome, BattleError> {
        apply_move(room, player, move_type, text, &BattleRules::default())
    }

    #[test]
    fn test_join_activates_room_with_creator_first() {
        let room = active_room();

        assert_eq!(room.status, RoomStatus::Active);
        assert_eq!(room.player_two, Some(bob()));
        assert_eq!(room.turn_player, Some(alice()));
        assert_eq!(room.invite_code, "ABC123");
    }

    #[test]
    fn test_join_rejects_self() {
        let room = BattleRoom::new(alice(), "ABC123".to_string());
        assert!(matches!(
            join(&room, &alice()),
            Err(BattleError::SelfJoinRejected)
        ));
    }

    #[test]
    fn test_join_full_room_looks_like_missing_room() {
        let room = active_room();
        assert!(matches!(
            join(&room, &AccountId::from("carol")),
            Err(BattleError::RoomNotFound)
        ));
        // Even the creator probing a full room learns nothing more
        assert!(matches!(
            join(&room, &alice()),
            Err(BattleError::RoomNotFound)
        ));
    }

    #[test]
    fn test_attack_damages_opponent_and_passes_turn() {
        let room = active_room();
        let outcome = play(&room, &alice(), MoveType::Attack, INSULT).unwrap();

        let points = outcome.turn.points_scored;
        assert!(points > 0);
        assert!(points <= BattleRules::default().max_points_per_turn);
        assert_eq!(outcome.room.player_two_health, STARTING_HEALTH - points);
        assert_eq!(outcome.room.player_one_health, STARTING_HEALTH);
        assert_eq!(outcome.room.turn_player, Some(bob()));
        assert_eq!(outcome.room.rounds.len(), 1);
        assert!(outcome.result.is_none());
    }

    #[test]
    fn test_skip_changes_nothing_but_turn() {
        let room = active_room();
        let outcome = play(&room, &alice(), MoveType::Skip, "").unwrap();

        assert_eq!(outcome.turn.points_scored, 0);
        assert_eq!(outcome.room.player_one_health, STARTING_HEALTH);
        assert_eq!(outcome.room.player_two_health, STARTING_HEALTH);
        assert_eq!(outcome.room.turn_player, Some(bob()));
    }

    #[test]
    fn test_surrender_awards_opponent() {
        let room = active_room();
        let after_attack = play(&room, &alice(), MoveType::Attack, INSULT).unwrap().room;
        let outcome = play(&after_attack, &bob(), MoveType::Surrender, "").unwrap();

        assert_eq!(outcome.room.status, RoomStatus::Completed);
        assert_eq!(outcome.room.winner, Some(alice()));
        assert_eq!(outcome.room.turn_player, None);
        assert_eq!(outcome.room.rounds.len(), 2);
        let result = outcome.result.unwrap();
        assert_eq!(result.winner, alice());
        assert_eq!(result.loser, bob());
    }

    #[test]
    fn test_out_of_turn_rejected() {
        let room = active_room();
        assert!(matches!(
            play(&room, &bob(), MoveType::Attack, INSULT),
            Err(BattleError::NotYourTurn)
        ));
    }

    #[test]
    fn test_outsider_rejected_before_status_check() {
        let room = BattleRoom::new(alice(), "ABC123".to_string());
        assert!(matches!(
            play(&room, &AccountId::from("carol"), MoveType::Skip, ""),
            Err(BattleError::PlayerNotInRoom)
        ));
        assert!(matches!(
            play(&room, &alice(), MoveType::Skip, ""),
            Err(BattleError::RoomNotActive)
        ));
    }

    #[test]
    fn test_overlong_insult_rejected() {
        let room = active_room();
        let rules = BattleRules {
            max_insult_chars: 10,
            ..BattleRules::default()
        };
        assert!(matches!(
            apply_move(&room, &alice(), MoveType::Attack, "eleven chars", &rules),
            Err(BattleError::InsultTooLong(10))
        ));
    }

    #[test]
    fn test_knockout_completes_battle_and_locks_room() {
        let mut room = active_room();
        let mut knockout = None;

        for _ in 0..100 {
            let player = room.turn_player.clone().unwrap();
            let outcome = play(&room, &player, MoveType::Attack, INSULT).unwrap();
            room = outcome.room;
            if outcome.result.is_some() {
                knockout = outcome.result;
                break;
            }
        }

        // Alice moves first with equal damage, so she lands the last hit
        let result = knockout.expect("battle should end");
        assert_eq!(result.winner, alice());
        assert_eq!(room.status, RoomStatus::Completed);
        assert_eq!(room.player_two_health, 0);
        assert!(room.player_one_health > 0);
        assert_eq!(room.winner, Some(alice()));

        assert!(matches!(
            play(&room, &bob(), MoveType::Attack, INSULT),
            Err(BattleError::RoomNotActive)
        ));
    }

    #[test]
    fn test_turns_strictly_alternate() {
        let mut room = active_room();
        let moves = [MoveType::Skip, MoveType::Attack, MoveType::Skip, MoveType::Attack];
        for mv in moves {
            let player = room.turn_player.clone().unwrap();
            room = play(&room, &player, mv, "dim bulb").unwrap().room;
        }

        let players: Vec<&AccountId> = room.rounds.iter().map(|t| &t.player).collect();
        assert_eq!(players, vec![&alice(), &bob(), &alice(), &bob()]);
    }

    #[test]
    fn test_health_never_leaves_bounds() {
        let rules = BattleRules {
            max_points_per_turn: 100,
            ..BattleRules::default()
        };
        let room = active_room();
        let huge = "a b c d e f g h i j k l m n o p q r s t u v w x y z aa bb cc dd ee ff gg";
        let outcome = apply_move(&room, &alice(), MoveType::Attack, huge, &rules).unwrap();

        assert_eq!(outcome.room.player_two_health, 0);
        assert_eq!(outcome.room.status, RoomStatus::Completed);
        assert!(outcome.room.player_one_health <= STARTING_HEALTH);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let script = [
            (MoveType::Attack, "you type with your elbows"),
            (MoveType::Attack, "at least my elbows ship features"),
            (MoveType::Skip, ""),
            (MoveType::Attack, "your features ship bugs"),
        ];
        let run = || {
            let mut room = active_room();
            for (mv, text) in script {
                let player = room.turn_player.clone().unwrap();
                room = play(&room, &player, mv, text).unwrap().room;
            }
            room
        };

        let first = run();
        let second = run();
        assert_eq!(first.player_one_health, second.player_one_health);
        assert_eq!(first.player_two_health, second.player_two_health);
        assert_eq!(first.winner, second.winner);
        assert_eq!(first.status, second.status);
    }

    #[test]
    fn test_abandon() {
        let waiting = BattleRoom::new(alice(), "ABC123".to_string());
        let abandoned = abandon(&waiting, &alice()).unwrap();
        assert_eq!(abandoned.status, RoomStatus::Abandoned);
        assert_eq!(abandoned.winner, None);

        let active = active_room();
        let abandoned = abandon(&active, &bob()).unwrap();
        assert_eq!(abandoned.status, RoomStatus::Abandoned);
        assert_eq!(abandoned.turn_player, None);

        assert!(matches!(
            abandon(&abandoned, &bob()),
            Err(BattleError::RoomNotActive)
        ));
        assert!(matches!(
            abandon(&active, &AccountId::from("carol")),
            Err(BattleError::PlayerNotInRoom)
        ));
    }
}
