pub mod config;
pub mod data;
pub mod error;
pub mod game;
pub mod handlers;
pub mod questions;
pub mod round;
pub mod state;

use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use config::Config;
use handlers::{rest, ws};
use state::{AppState, GameSessionManager};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, TraceLayer},
};

pub fn create_app(config: Config, questions: Vec<String>) -> Router {
    let state = Arc::new(AppState {
        questions: Arc::new(questions),
        session_manager: GameSessionManager::default(),
        config: Arc::new(config),
    });

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/game", post(rest::create_game_handler))
        .route(
            "/game/{channel_id}",
            get(rest::get_game_handler).delete(rest::abandon_game_handler),
        )
        .route("/game/{channel_id}/join", post(rest::join_game_handler))
        .route("/game/{channel_id}/start", post(rest::start_game_handler))
        .route("/game/{channel_id}/vote", post(rest::vote_handler))
        .route("/game/{channel_id}/predict", post(rest::predict_handler))
        .route("/game/{channel_id}/skip", post(rest::skip_handler))
        .route("/ws/game/{channel_id}", get(ws::websocket_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default().include_headers(true)))
        .layer(cors)
}
