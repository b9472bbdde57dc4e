//! Interaction logic shared by the REST and WebSocket adapters.
//!
//! This is where platform-level rules live: colour tokens are parsed, joins
//! are checked for duplicates, self-votes are refused and prompt ids are
//! matched to the player they were sent to. The session itself trusts its
//! callers on all of these.

use std::sync::Arc;

use tracing::instrument;

use crate::{
    data::{game_view, CreateGameResponse, GameView, JoinGameRequest, ServerMessage},
    error::AppError,
    game::{ChannelId, Colour, GameError, GameSession, PlayerId, PromptId, Standing, UserHandle, VoteSlot},
    round,
    state::{ChannelGame, SharedState},
};

/// Opens a game in the channel. A channel whose game has not started yet is
/// reset for a fresh lobby instead.
#[instrument(skip(state))]
pub async fn create_game(state: &SharedState, channel_id: ChannelId) -> Result<CreateGameResponse, AppError> {
    let join_prompt_id = PromptId::new();
    let mut sessions = state.session_manager.sessions.write().await;

    if let Some(existing) = sessions.get(&channel_id).cloned() {
        let mut session = existing.session.lock().await;
        if existing.is_started() {
            return Err(AppError::GameInProgress(channel_id));
        }
        session.start_game();
        session.set_join_prompt(join_prompt_id);
        tracing::info!(channel_id = %channel_id, "Lobby reset for a new game");
    } else {
        let mut session = GameSession::new(channel_id.clone(), join_prompt_id, state.questions.as_ref().clone());
        session.start_game();
        sessions.insert(channel_id.clone(), Arc::new(ChannelGame::new(session)));
        tracing::info!(channel_id = %channel_id, "Game created");
    }

    Ok(CreateGameResponse {
        channel_id,
        join_prompt_id,
        colours: Colour::ALL.to_vec(),
    })
}

#[instrument(skip(state, request), fields(player_id = %request.player_id))]
pub async fn join_game(
    state: &SharedState,
    channel_id: &ChannelId,
    request: JoinGameRequest,
) -> Result<ServerMessage, AppError> {
    let game = state.session_manager.get(channel_id).await?;
    let colour: Colour = request.colour.parse()?;

    let joined = {
        let mut session = game.session.lock().await;
        if game.is_started() {
            return Err(AppError::GameInProgress(channel_id.clone()));
        }
        if request.prompt_id != session.get_join_prompt_id() {
            return Err(AppError::UnknownPrompt(request.prompt_id));
        }
        if session.has_player(&request.player_id) {
            return Err(AppError::AlreadyJoined(request.player_id));
        }
        if session.is_colour_taken(colour) {
            return Err(AppError::ColourTaken(colour));
        }

        let mention = request
            .user_handle
            .unwrap_or_else(|| UserHandle::new(request.display_name.clone()));
        session.add_player(request.player_id.clone(), request.display_name.clone(), colour, mention.clone());

        ServerMessage::PlayerJoined {
            player_id: request.player_id,
            display_name: request.display_name,
            colour,
            mention,
        }
    };

    tracing::info!(channel_id = %channel_id, colour = %colour.name(), "Player joined");
    game.broadcast(&joined).await;
    Ok(joined)
}

/// Validates the lobby and spawns the round coordinator.
#[instrument(skip(state))]
pub async fn start_game(state: &SharedState, channel_id: &ChannelId) -> Result<GameView, AppError> {
    let game = state.session_manager.get(channel_id).await?;
    let rounds = state.config.game.rounds as usize;
    let min_players = state.config.game.min_players;

    let view = {
        let session = game.session.lock().await;
        if game.is_started() {
            return Err(AppError::GameInProgress(channel_id.clone()));
        }
        let have = session.player_count();
        if have < min_players {
            return Err(AppError::NotEnoughPlayers { needed: min_players, have });
        }
        let have = session.get_remaining_questions().len();
        if have < rounds {
            return Err(AppError::NotEnoughQuestions { needed: rounds, have });
        }
        if !game.mark_started() {
            return Err(AppError::GameInProgress(channel_id.clone()));
        }
        game_view(&session, true)
    };

    let coordinator = round::run_game(state.clone(), channel_id.clone(), game.clone());
    if !game.spawn_round_task(coordinator).await {
        tracing::warn!(channel_id = %channel_id, "Game abandoned before its rounds began");
        return Err(AppError::GameNotFound(channel_id.clone()));
    }

    tracing::info!(channel_id = %channel_id, players = view.players.len(), "Game started");
    Ok(view)
}

#[instrument(skip(state))]
pub async fn abandon_game(state: &SharedState, channel_id: &ChannelId) -> Result<(), AppError> {
    let game = state
        .session_manager
        .remove(channel_id)
        .await
        .ok_or_else(|| AppError::GameNotFound(channel_id.clone()))?;

    game.abort().await;
    game.broadcast(&ServerMessage::GameAbandoned).await;
    tracing::info!(channel_id = %channel_id, "Game abandoned");
    Ok(())
}

/// Handles a click on one of the player's vote prompts: the lock control or
/// one of the two ballot slots.
#[instrument(skip(game))]
pub async fn submit_vote(
    game: &ChannelGame,
    player_id: &PlayerId,
    prompt_id: PromptId,
    colour: Option<&str>,
) -> Result<ServerMessage, AppError> {
    let confirmation = {
        let mut session = game.session.lock().await;
        let (slot, owner) = session
            .get_vote_correlation()
            .get(&prompt_id)
            .cloned()
            .ok_or(AppError::UnknownPrompt(prompt_id))?;

        if owner != *player_id {
            tracing::warn!(owner = %owner, "Vote on a prompt sent to someone else");
            return Err(AppError::Forbidden("That prompt was sent to another player".to_string()));
        }

        match slot {
            VoteSlot::Lock => {
                session.lock_vote(player_id)?;
                ServerMessage::VoteLocked { player_id: player_id.clone() }
            }
            VoteSlot::First | VoteSlot::Second => {
                let colour: Colour = colour.unwrap_or_default().parse()?;
                let own_colour = session
                    .get_player(player_id)
                    .map(|p| p.colour)
                    .ok_or_else(|| GameError::UnknownPlayer(player_id.clone()))?;

                if colour == own_colour {
                    return Err(AppError::SelfVote);
                }
                if !session.is_colour_taken(colour) {
                    return Err(AppError::ColourNotInGame(colour));
                }

                session.add_vote(player_id, slot, colour)?;
                ServerMessage::VoteRecorded { slot, colour }
            }
        }
    };

    match &confirmation {
        ServerMessage::VoteLocked { .. } => game.broadcast(&confirmation).await,
        _ => game.send_to(player_id, &confirmation).await,
    }
    Ok(confirmation)
}

#[instrument(skip(game))]
pub async fn submit_prediction(
    game: &ChannelGame,
    player_id: &PlayerId,
    prompt_id: PromptId,
    prediction: &str,
) -> Result<ServerMessage, AppError> {
    let prediction: Standing = prediction.parse()?;

    {
        let mut session = game.session.lock().await;
        if session.get_prediction_prompt_id() != Some(prompt_id) {
            return Err(AppError::UnknownPrompt(prompt_id));
        }
        session.add_prediction(player_id, prediction)?;
    }

    let announcement = ServerMessage::PredictionRecorded { player_id: player_id.clone() };
    game.broadcast(&announcement).await;
    Ok(announcement)
}

#[instrument(skip(game))]
pub async fn request_skip(game: &ChannelGame, player_id: &PlayerId) -> Result<ServerMessage, AppError> {
    let announcement = {
        let mut session = game.session.lock().await;
        if !game.is_started() {
            return Err(AppError::GameNotStarted(session.get_channel_id().clone()));
        }
        session.add_skipper(player_id)?;
        ServerMessage::SkipRequested {
            player_id: player_id.clone(),
            skippers: session.skipper_count(),
            needed: session.player_count(),
        }
    };

    game.broadcast(&announcement).await;
    Ok(announcement)
}
