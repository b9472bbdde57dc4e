use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use crate::game::{types::ParseTokenError, ChannelId, Colour, GameError, PlayerId, PromptId};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("No game is running in channel {0}")]
    GameNotFound(ChannelId),

    #[error("A game is already running in channel {0}")]
    GameInProgress(ChannelId),

    #[error("The game in channel {0} has not started yet")]
    GameNotStarted(ChannelId),

    #[error("{0} is already in the game")]
    AlreadyJoined(PlayerId),

    #[error("{0} has already been picked")]
    ColourTaken(Colour),

    #[error("Nobody in this game is {0}")]
    ColourNotInGame(Colour),

    #[error("You cannot vote for yourself")]
    SelfVote,

    #[error("Prompt {0} does not belong to this round")]
    UnknownPrompt(PromptId),

    #[error("Need at least {needed} players, have {have}")]
    NotEnoughPlayers { needed: usize, have: usize },

    #[error("Need at least {needed} questions, have {have}")]
    NotEnoughQuestions { needed: usize, have: usize },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid input: {0}")]
    InvalidToken(#[from] ParseTokenError),

    #[error("Game logic violation: {0}")]
    Game(#[from] GameError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::GameNotFound(_) => StatusCode::NOT_FOUND,
            AppError::GameInProgress(_)
            | AppError::GameNotStarted(_)
            | AppError::AlreadyJoined(_)
            | AppError::ColourTaken(_) => {
                StatusCode::CONFLICT
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::ColourNotInGame(_)
            | AppError::SelfVote
            | AppError::UnknownPrompt(_)
            | AppError::NotEnoughPlayers { .. }
            | AppError::NotEnoughQuestions { .. }
            | AppError::InvalidToken(_) => StatusCode::BAD_REQUEST,
            AppError::Game(GameError::UnknownPlayer(_)) => StatusCode::FORBIDDEN,
            AppError::Game(GameError::VoteLocked | GameError::AlreadyLocked | GameError::AlreadySkipped) => {
                StatusCode::CONFLICT
            }
            AppError::Game(GameError::QuestionBankExhausted) => {
                tracing::error!("Question bank ran dry mid-game");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Game(GameError::NotABallot) => StatusCode::BAD_REQUEST,
        };

        if let AppError::Game(e) = &self {
            tracing::warn!("Game rule rejection: {}", e);
        }

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
