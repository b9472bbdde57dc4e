use serde_json::Value;
use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::{
    sync::{mpsc, Mutex, RwLock},
    task::JoinHandle,
};

use crate::config::Config;
use crate::data::ServerMessage;
use crate::error::AppError;
use crate::game::{ChannelId, GameSession, PlayerId};

#[derive(Debug, Clone)]
pub struct GameMessage {
    pub r#type: String, // Use r#type because 'type' is a reserved keyword
    pub payload: Value,
}

pub type PlayerSender = mpsc::UnboundedSender<GameMessage>;

/// Everything attached to one channel's game: the session itself, the
/// connected clients, and the task running its rounds.
#[derive(Debug)]
pub struct ChannelGame {
    pub session: Mutex<GameSession>,
    // Maps PlayerId to their WebSocket sender channel
    pub connections: RwLock<HashMap<PlayerId, PlayerSender>>,
    started: AtomicBool,
    abandoned: AtomicBool,
    round_task: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelGame {
    pub fn new(session: GameSession) -> Self {
        Self {
            session: Mutex::new(session),
            connections: RwLock::new(HashMap::new()),
            started: AtomicBool::new(false),
            abandoned: AtomicBool::new(false),
            round_task: Mutex::new(None),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Returns false if the game had already been started.
    pub fn mark_started(&self) -> bool {
        self.started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Spawns the round coordinator while holding the task slot, so `abort`
    /// either sees the handle or prevents the spawn. Returns false if the game
    /// was already abandoned.
    pub async fn spawn_round_task<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.round_task.lock().await;
        if self.abandoned.load(Ordering::SeqCst) {
            return false;
        }
        *slot = Some(tokio::spawn(task));
        true
    }

    /// Stops the round coordinator, if one is running. No coordinator can be
    /// spawned afterwards.
    pub async fn abort(&self) {
        let mut slot = self.round_task.lock().await;
        self.abandoned.store(true, Ordering::SeqCst);
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }

    /// Drops the player's connection, unless it has already been replaced by
    /// a newer socket.
    pub async fn disconnect(&self, player_id: &PlayerId, sender: &PlayerSender) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get(player_id) {
            Some(current) if current.same_channel(sender) => {
                connections.remove(player_id);
                true
            }
            _ => false,
        }
    }

    pub async fn broadcast(&self, message: &ServerMessage) {
        let Some(internal_msg) = wrap("SERVER_PUSH", message) else {
            return;
        };
        let connections = self.connections.read().await;
        for (pid, sender) in connections.iter() {
            let _ = sender.send(internal_msg.clone());
            tracing::debug!(to_player = %pid, "Broadcasted message");
        }
    }

    /// Private message to one player, like a DM on the chat platform.
    pub async fn send_to(&self, player_id: &PlayerId, message: &ServerMessage) {
        let kind = match message {
            ServerMessage::Rejected { .. } => "ERROR",
            _ => "DIRECT",
        };
        let Some(internal_msg) = wrap(kind, message) else {
            return;
        };
        if let Some(sender) = self.connections.read().await.get(player_id) {
            let _ = sender.send(internal_msg);
        } else {
            tracing::debug!(player_id = %player_id, "No connection for direct message");
        }
    }
}

fn wrap(kind: &str, message: &ServerMessage) -> Option<GameMessage> {
    match serde_json::to_value(message) {
        Ok(payload) => Some(GameMessage { r#type: kind.to_string(), payload }),
        Err(e) => {
            tracing::error!("Failed to serialise message: {}", e);
            None
        }
    }
}

#[derive(Debug, Default)]
pub struct GameSessionManager {
    // Maps ChannelId to the game running there. One game per channel.
    pub sessions: RwLock<HashMap<ChannelId, Arc<ChannelGame>>>,
}

impl GameSessionManager {
    pub async fn get(&self, channel_id: &ChannelId) -> Result<Arc<ChannelGame>, AppError> {
        self.sessions
            .read()
            .await
            .get(channel_id)
            .cloned()
            .ok_or_else(|| AppError::GameNotFound(channel_id.clone()))
    }

    pub async fn remove(&self, channel_id: &ChannelId) -> Option<Arc<ChannelGame>> {
        self.sessions.write().await.remove(channel_id)
    }

    /// Removes the channel's game only if it is still `game`. A newer lobby
    /// opened in the same channel is left alone.
    pub async fn remove_if(&self, channel_id: &ChannelId, game: &Arc<ChannelGame>) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(channel_id) {
            Some(current) if Arc::ptr_eq(current, game) => {
                sessions.remove(channel_id);
                true
            }
            _ => false,
        }
    }
}

pub struct AppState {
    /// Loaded once at startup; every session gets its own copy.
    pub questions: Arc<Vec<String>>,
    pub session_manager: GameSessionManager,
    pub config: Arc<Config>,
}

pub type SharedState = Arc<AppState>;
