use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::instrument;

use crate::{
    data::{game_view, ClientMessage, ServerMessage},
    error::AppError,
    game::{ChannelId, PlayerId},
    handlers::actions,
    state::{ChannelGame, GameMessage, SharedState},
};

// ==============================================================================
// === Websocket Handlers
// =============================================================================
#[derive(Deserialize, Debug)]
pub struct WebSocketParams {
    pub player_id: PlayerId,
}

#[instrument(skip(ws, state))]
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(channel_id): Path<ChannelId>,
    Query(params): Query<WebSocketParams>,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    tracing::info!(channel_id = %channel_id, player_id = %params.player_id, "WebSocket upgrade requested.");
    ws.on_upgrade(move |socket| handle_socket(socket, channel_id, params.player_id, state))
}

/// Orchestrates the WebSocket lifecycle: Connect -> Register -> Loop -> Disconnect
async fn handle_socket(mut socket: WebSocket, channel_id: ChannelId, player_id: PlayerId, state: SharedState) {
    tracing::info!(channel_id = %channel_id, player_id = %player_id, "WebSocket connected.");

    // Anyone in the channel may watch, so only the game's existence is checked
    let Ok(game) = state.session_manager.get(&channel_id).await else {
        tracing::warn!(channel_id = %channel_id, player_id = %player_id, "Connection rejected: no game in channel.");
        let _ = socket.close().await;
        return;
    };

    let (sender_tx, mut sender_rx) = tokio::sync::mpsc::unbounded_channel::<GameMessage>();
    game.connections.write().await.insert(player_id.clone(), sender_tx.clone());

    // Send initial state
    let snapshot = {
        let session = game.session.lock().await;
        ServerMessage::GameState(game_view(&session, game.is_started()))
    };
    game.send_to(&player_id, &snapshot).await;

    // Split Socket
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Spawn Write Task (Server -> Client)
    let send_task = tokio::spawn(async move {
        while let Some(msg) = sender_rx.recv().await {
            let json_str = serde_json::to_string(&msg.payload).unwrap_or_default();
            if ws_sender.send(Message::Text(json_str.into())).await.is_err() {
                break;
            }
        }
    });

    // Read Loop (Client -> Server)
    while let Some(Ok(msg)) = ws_receiver.next().await {
        if let Message::Text(text) = msg {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => process_client_message(client_msg, &game, &player_id).await,
                Err(e) => tracing::debug!(player_id = %player_id, error = %e, "Ignoring malformed client message"),
            }
        }
    }

    // Cleanup on Disconnect
    tracing::info!(channel_id = %channel_id, player_id = %player_id, "WebSocket disconnected.");
    if !game.disconnect(&player_id, &sender_tx).await {
        tracing::debug!(player_id = %player_id, "Connection already replaced by a newer socket");
    }
    send_task.abort();
}

/// Route incoming messages to the same interaction logic the REST routes use
async fn process_client_message(msg: ClientMessage, game: &ChannelGame, player_id: &PlayerId) {
    tracing::debug!(player_id = %player_id, "Received message: {:#?}", msg);
    let result = match msg {
        ClientMessage::Vote { prompt_id, colour } => {
            actions::submit_vote(game, player_id, prompt_id, colour.as_deref()).await
        }
        ClientMessage::Predict { prompt_id, prediction } => {
            actions::submit_prediction(game, player_id, prompt_id, &prediction).await
        }
        ClientMessage::Skip => actions::request_skip(game, player_id).await,
    };

    if let Err(e) = result {
        send_rejection(game, player_id, &e).await;
    }
}

/// Tell the player their action was refused
async fn send_rejection(game: &ChannelGame, player_id: &PlayerId, error: &AppError) {
    tracing::info!(player_id = %player_id, reason = %error, "Interaction rejected");
    game.send_to(player_id, &ServerMessage::Rejected { message: error.to_string() }).await;
}

#[cfg(test)]
mod ws_logic_tests {
    use super::*;
    use crate::game::{Colour, GameSession, PromptId, UserHandle, VoteSlot};
    use tokio::sync::mpsc;

    async fn setup_game() -> (ChannelGame, mpsc::UnboundedReceiver<GameMessage>, PromptId) {
        let mut session = GameSession::new(ChannelId::new("channel"), PromptId::new(), vec!["Who?".into()]);
        session.add_player(PlayerId::new("p1"), "Alice".into(), Colour::Red, UserHandle::new("<@p1>"));
        session.add_player(PlayerId::new("p2"), "Bob".into(), Colour::Blue, UserHandle::new("<@p2>"));
        session.reset_round();
        let first = PromptId::new();
        session.register_vote_prompt(first, VoteSlot::First, PlayerId::new("p1"));

        let game = ChannelGame::new(session);
        game.mark_started();
        let (tx, rx) = mpsc::unbounded_channel();
        game.connections.write().await.insert(PlayerId::new("p1"), tx);
        (game, rx, first)
    }

    #[tokio::test]
    async fn test_vote_message_is_confirmed_privately() {
        let (game, mut rx, first) = setup_game().await;

        let msg = ClientMessage::Vote { prompt_id: first, colour: Some("🔵".into()) };
        process_client_message(msg, &game, &PlayerId::new("p1")).await;

        let reply = rx.recv().await.expect("player missed confirmation");
        assert_eq!(reply.r#type, "DIRECT");
        let reply: ServerMessage = serde_json::from_value(reply.payload).unwrap();
        assert_eq!(reply, ServerMessage::VoteRecorded { slot: VoteSlot::First, colour: Colour::Blue });
    }

    #[tokio::test]
    async fn test_self_vote_is_rejected_with_error_message() {
        let (game, mut rx, first) = setup_game().await;

        let msg = ClientMessage::Vote { prompt_id: first, colour: Some("red".into()) };
        process_client_message(msg, &game, &PlayerId::new("p1")).await;

        let reply = rx.recv().await.expect("player missed rejection");
        assert_eq!(reply.r#type, "ERROR");
        let reply: ServerMessage = serde_json::from_value(reply.payload).unwrap();
        assert!(matches!(reply, ServerMessage::Rejected { .. }));

        let session = game.session.lock().await;
        assert_eq!(session.get_player(&PlayerId::new("p1")).unwrap().vote1, None);
    }

    #[tokio::test]
    async fn test_skip_message_is_broadcast() {
        let (game, mut rx, _) = setup_game().await;

        process_client_message(ClientMessage::Skip, &game, &PlayerId::new("p2")).await;

        let reply = rx.recv().await.expect("watcher missed broadcast");
        assert_eq!(reply.r#type, "SERVER_PUSH");
        let reply: ServerMessage = serde_json::from_value(reply.payload).unwrap();
        assert!(matches!(reply, ServerMessage::SkipRequested { skippers: 1, needed: 2, .. }));
    }

    #[tokio::test]
    async fn test_skip_rejected_before_game_starts() {
        let session = GameSession::new(ChannelId::new("channel"), PromptId::new(), vec!["Who?".into()]);
        let game = ChannelGame::new(session);
        game.session
            .lock()
            .await
            .add_player(PlayerId::new("p1"), "Alice".into(), Colour::Red, UserHandle::new("<@p1>"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        game.connections.write().await.insert(PlayerId::new("p1"), tx);

        process_client_message(ClientMessage::Skip, &game, &PlayerId::new("p1")).await;

        let reply = rx.recv().await.expect("player missed rejection");
        assert_eq!(reply.r#type, "ERROR");
        let session = game.session.lock().await;
        assert_eq!(session.skipper_count(), 0);
        assert_eq!(session.round_completion(), None);
    }

    #[tokio::test]
    async fn test_stale_socket_cleanup_keeps_reconnected_sender() {
        let (game, _old_rx, _) = setup_game().await;
        let old_tx = game.connections.read().await.get(&PlayerId::new("p1")).cloned().unwrap();

        // Reconnect registers a new sender before the old socket closes
        let (new_tx, mut new_rx) = mpsc::unbounded_channel();
        game.connections.write().await.insert(PlayerId::new("p1"), new_tx.clone());

        assert!(!game.disconnect(&PlayerId::new("p1"), &old_tx).await);
        game.send_to(&PlayerId::new("p1"), &ServerMessage::GameAbandoned).await;
        let delivered = new_rx.recv().await.expect("reconnected player lost their connection");
        assert_eq!(delivered.r#type, "DIRECT");

        assert!(game.disconnect(&PlayerId::new("p1"), &new_tx).await);
        assert!(game.connections.read().await.is_empty());
    }
}
