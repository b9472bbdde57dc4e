pub mod actions;
pub mod rest;
pub mod ws;

pub use rest::{
    abandon_game_handler, create_game_handler, get_game_handler, join_game_handler, predict_handler, skip_handler,
    start_game_handler, vote_handler,
};
pub use ws::websocket_handler;
