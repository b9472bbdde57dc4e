use serde::{Deserialize, Serialize};

use crate::game::{ChannelId, Colour, GameSession, PlayerId, PromptId, Standing, UserHandle, VoteSlot};

// --- DTOs (Data Transfer Objects) ---
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateGameRequest {
    pub channel_id: ChannelId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateGameResponse {
    pub channel_id: ChannelId,
    pub join_prompt_id: PromptId,
    pub colours: Vec<Colour>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinGameRequest {
    pub prompt_id: PromptId,
    pub player_id: PlayerId,
    pub display_name: String,
    pub user_handle: Option<UserHandle>,
    /// Colour name or emoji
    pub colour: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteRequest {
    pub prompt_id: PromptId,
    pub player_id: PlayerId,
    /// Absent for the lock control
    pub colour: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictRequest {
    pub prompt_id: PromptId,
    pub player_id: PlayerId,
    pub prediction: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SkipRequest {
    pub player_id: PlayerId,
}

// --- Views ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub player_id: PlayerId,
    pub display_name: String,
    pub colour: Colour,
    pub points: u32,
    pub vote_locked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameView {
    pub channel_id: ChannelId,
    pub started: bool,
    pub round: usize,
    pub current_question: Option<String>,
    pub join_prompt_id: PromptId,
    pub prediction_prompt_id: Option<PromptId>,
    pub players: Vec<PlayerView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResultEntry {
    pub player_id: PlayerId,
    pub display_name: String,
    pub colour: Colour,
    pub votes_received: u32,
    pub round_result: Standing,
    pub prediction: Standing,
    pub points_awarded: u32,
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub player_id: PlayerId,
    pub display_name: String,
    pub colour: Colour,
    pub points: u32,
}

pub fn player_views(session: &GameSession) -> Vec<PlayerView> {
    session
        .get_players()
        .map(|(id, player)| PlayerView {
            player_id: id.clone(),
            display_name: player.display_name.clone(),
            colour: player.colour,
            points: player.points,
            vote_locked: player.vote_locked,
        })
        .collect()
}

pub fn game_view(session: &GameSession, started: bool) -> GameView {
    GameView {
        channel_id: session.get_channel_id().clone(),
        started,
        round: session.get_asked_questions().len(),
        current_question: session.get_current_question().map(str::to_string),
        join_prompt_id: session.get_join_prompt_id(),
        prediction_prompt_id: session.get_prediction_prompt_id(),
        players: player_views(session),
    }
}

pub fn scoreboard(session: &GameSession) -> Vec<ScoreEntry> {
    session
        .get_players()
        .map(|(id, player)| ScoreEntry {
            player_id: id.clone(),
            display_name: player.display_name.clone(),
            colour: player.colour,
            points: player.points,
        })
        .collect()
}

// --- Wire messages ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    PlayerJoined {
        player_id: PlayerId,
        display_name: String,
        colour: Colour,
        mention: UserHandle,
    },
    GameStarted {
        rounds: u32,
        players: Vec<PlayerView>,
    },
    RoundStarted {
        round: u32,
        total: u32,
        question: String,
        prediction_prompt_id: PromptId,
        players: Vec<PlayerView>,
    },
    /// Sent privately to each player at the start of a round.
    VotePrompt {
        round: u32,
        total: u32,
        question: String,
        lock_prompt_id: PromptId,
        first_prompt_id: PromptId,
        second_prompt_id: PromptId,
        choices: Vec<Colour>,
    },
    VoteRecorded {
        slot: VoteSlot,
        colour: Colour,
    },
    VoteLocked {
        player_id: PlayerId,
    },
    PredictionRecorded {
        player_id: PlayerId,
    },
    SkipRequested {
        player_id: PlayerId,
        skippers: usize,
        needed: usize,
    },
    Rejected {
        message: String,
    },
    RoundSkipped {
        round: u32,
    },
    RoundResults {
        round: u32,
        total: u32,
        results: Vec<RoundResultEntry>,
    },
    GameOver {
        scoreboard: Vec<ScoreEntry>,
        winners: Vec<PlayerId>,
        winning_score: u32,
    },
    GameAbandoned,
    GameState(GameView),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    Vote { prompt_id: PromptId, colour: Option<String> },
    Predict { prompt_id: PromptId, prediction: String },
    Skip,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_wire_format() {
        let raw = r#"{"type":"PREDICT","payload":{"prompt_id":"6f9b0c1e-8d2a-4a53-9a51-2f0e4cfa4a11","prediction":"most"}}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(msg, ClientMessage::Predict { ref prediction, .. } if prediction == "most"));

        let skip: ClientMessage = serde_json::from_str(r#"{"type":"SKIP"}"#).unwrap();
        assert!(matches!(skip, ClientMessage::Skip));
    }

    #[test]
    fn test_round_result_serialises_standing_names() {
        let msg = ServerMessage::RoundResults {
            round: 1,
            total: 10,
            results: vec![RoundResultEntry {
                player_id: PlayerId::new("p1"),
                display_name: "Alice".into(),
                colour: Colour::Red,
                votes_received: 0,
                round_result: Standing::NoVotes,
                prediction: Standing::Most,
                points_awarded: 0,
                points: 3,
            }],
        };
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "ROUND_RESULTS");
        assert_eq!(json["payload"]["results"][0]["round_result"], "none");
        assert_eq!(json["payload"]["results"][0]["colour"], "red");
    }
}
