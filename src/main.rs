use std::{env, path::Path};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use true_colours::{config::Config, create_app, questions::load_question_bank};

#[tokio::main]
async fn main() {
    let env: String = env::var("RUN_ENV").unwrap_or_else(|_| "default".into());
    let config: Config = Config::load().expect("Failed to load config.");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.logging.level.clone().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    tracing::info!(run_env = %env, "Starting True Colours server...");

    let questions = match load_question_bank(Path::new(&config.game.questions_path)) {
        Ok(questions) => questions,
        Err(e) => {
            tracing::error!(path = %config.game.questions_path, "Failed to load question bank: {}", e);
            return;
        }
    };
    if questions.len() < config.game.rounds as usize {
        tracing::warn!(
            questions = questions.len(),
            rounds = config.game.rounds,
            "Question bank is smaller than a full game; games will not start"
        );
    }

    let app = create_app(config.clone(), questions);
    tracing::info!("Listening on {}", &config.server.addr);

    let listener = match tokio::net::TcpListener::bind(&config.server.addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", &config.server.addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {}", e);
    }
}
