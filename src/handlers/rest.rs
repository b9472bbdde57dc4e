use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::instrument;

use crate::{
    data::{
        game_view, CreateGameRequest, CreateGameResponse, GameView, JoinGameRequest, PredictRequest, ServerMessage,
        SkipRequest, VoteRequest,
    },
    error::AppError,
    game::ChannelId,
    handlers::actions,
    state::SharedState,
};

// ==============================================================================
// === REST API Handlers
// =============================================================================

#[instrument(skip(state))]
pub async fn create_game_handler(
    State(state): State<SharedState>,
    Json(payload): Json<CreateGameRequest>,
) -> Result<(StatusCode, Json<CreateGameResponse>), AppError> {
    tracing::info!(channel_id = %payload.channel_id, "Attempting to create game");
    let response = actions::create_game(&state, payload.channel_id).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[instrument(skip(state))]
pub async fn get_game_handler(
    State(state): State<SharedState>,
    Path(channel_id): Path<ChannelId>,
) -> Result<Json<GameView>, AppError> {
    let game = state.session_manager.get(&channel_id).await?;
    let session = game.session.lock().await;
    Ok(Json(game_view(&session, game.is_started())))
}

#[instrument(skip(state))]
pub async fn abandon_game_handler(
    State(state): State<SharedState>,
    Path(channel_id): Path<ChannelId>,
) -> Result<StatusCode, AppError> {
    actions::abandon_game(&state, &channel_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn join_game_handler(
    State(state): State<SharedState>,
    Path(channel_id): Path<ChannelId>,
    Json(payload): Json<JoinGameRequest>,
) -> Result<Json<ServerMessage>, AppError> {
    let joined = actions::join_game(&state, &channel_id, payload).await?;
    Ok(Json(joined))
}

#[instrument(skip(state))]
pub async fn start_game_handler(
    State(state): State<SharedState>,
    Path(channel_id): Path<ChannelId>,
) -> Result<Json<GameView>, AppError> {
    let view = actions::start_game(&state, &channel_id).await?;
    Ok(Json(view))
}

#[instrument(skip(state))]
pub async fn vote_handler(
    State(state): State<SharedState>,
    Path(channel_id): Path<ChannelId>,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<ServerMessage>, AppError> {
    let game = state.session_manager.get(&channel_id).await?;
    let confirmation =
        actions::submit_vote(&game, &payload.player_id, payload.prompt_id, payload.colour.as_deref()).await?;
    Ok(Json(confirmation))
}

#[instrument(skip(state))]
pub async fn predict_handler(
    State(state): State<SharedState>,
    Path(channel_id): Path<ChannelId>,
    Json(payload): Json<PredictRequest>,
) -> Result<Json<ServerMessage>, AppError> {
    let game = state.session_manager.get(&channel_id).await?;
    let recorded =
        actions::submit_prediction(&game, &payload.player_id, payload.prompt_id, &payload.prediction).await?;
    Ok(Json(recorded))
}

#[instrument(skip(state))]
pub async fn skip_handler(
    State(state): State<SharedState>,
    Path(channel_id): Path<ChannelId>,
    Json(payload): Json<SkipRequest>,
) -> Result<Json<ServerMessage>, AppError> {
    let game = state.session_manager.get(&channel_id).await?;
    let requested = actions::request_skip(&game, &payload.player_id).await?;
    Ok(Json(requested))
}
