//! Round coordinator: drives one channel's game from the first question to
//! the final scoreboard.

use std::{sync::Arc, time::Duration};

use tracing::instrument;

use crate::{
    data::{player_views, scoreboard, RoundResultEntry, ServerMessage},
    game::{
        picker::ThreadRngPicker, ChannelId, Colour, GameError, PlayerId, PromptId, RoundCompletion, VoteSlot,
    },
    state::{ChannelGame, SharedState},
};

#[derive(Debug, Clone, PartialEq)]
pub enum RoundOutcome {
    Scored(Vec<RoundResultEntry>),
    Skipped,
}

/// Plays every configured round, publishes the scoreboard and drops the
/// session from the manager.
#[instrument(skip(state, game))]
pub async fn run_game(state: SharedState, channel_id: ChannelId, game: Arc<ChannelGame>) {
    let total = state.config.game.rounds;
    let timeout = Duration::from_secs(state.config.game.round_timeout_secs);

    let players = player_views(&*game.session.lock().await);
    game.broadcast(&ServerMessage::GameStarted { rounds: total, players }).await;

    for round in 1..=total {
        match run_round(&game, round, total, timeout).await {
            Ok(RoundOutcome::Scored(_)) => {}
            Ok(RoundOutcome::Skipped) => tracing::info!(channel_id = %channel_id, round, "Round skipped"),
            Err(e) => {
                tracing::error!(channel_id = %channel_id, round, error = %e, "Round could not start, ending game");
                break;
            }
        }
    }

    let game_over = {
        let session = game.session.lock().await;
        let (winners, winning_score) = session.get_winner();
        ServerMessage::GameOver {
            scoreboard: scoreboard(&session),
            winners,
            winning_score,
        }
    };
    game.broadcast(&game_over).await;

    if !state.session_manager.remove_if(&channel_id, &game).await {
        tracing::debug!(channel_id = %channel_id, "Channel already holds a newer game");
    }
    tracing::info!(channel_id = %channel_id, "Game finished");
}

/// One question-vote-predict-score cycle.
///
/// Waits until every player has locked, every player has asked to skip, or
/// `timeout` elapses. On timeout the round is scored with whatever was cast.
#[instrument(skip(game))]
pub async fn run_round(game: &ChannelGame, round: u32, total: u32, timeout: Duration) -> Result<RoundOutcome, GameError> {
    let (announcement, prompts, mut waiter) = {
        let mut session = game.session.lock().await;
        session.reset_round();
        let question = session.pick_question(&mut ThreadRngPicker::new())?.to_string();

        let prediction_prompt_id = PromptId::new();
        session.set_prediction_prompt(prediction_prompt_id);

        let roster: Vec<(PlayerId, Colour)> = session.get_players().map(|(id, p)| (id.clone(), p.colour)).collect();
        let mut prompts = Vec::with_capacity(roster.len());
        for (player_id, own_colour) in &roster {
            let lock_prompt_id = PromptId::new();
            let first_prompt_id = PromptId::new();
            let second_prompt_id = PromptId::new();
            session.register_vote_prompt(lock_prompt_id, VoteSlot::Lock, player_id.clone());
            session.register_vote_prompt(first_prompt_id, VoteSlot::First, player_id.clone());
            session.register_vote_prompt(second_prompt_id, VoteSlot::Second, player_id.clone());

            let choices = roster
                .iter()
                .map(|(_, colour)| *colour)
                .filter(|colour| colour != own_colour)
                .collect();
            let prompt = ServerMessage::VotePrompt {
                round,
                total,
                question: question.clone(),
                lock_prompt_id,
                first_prompt_id,
                second_prompt_id,
                choices,
            };
            prompts.push((player_id.clone(), prompt));
        }

        let announcement = ServerMessage::RoundStarted {
            round,
            total,
            question,
            prediction_prompt_id,
            players: player_views(&session),
        };
        (announcement, prompts, session.round_waiter())
    };

    game.broadcast(&announcement).await;
    for (player_id, prompt) in &prompts {
        game.send_to(player_id, prompt).await;
    }

    let completion = match tokio::time::timeout(timeout, waiter.wait()).await {
        Ok(completion) => completion,
        Err(_) => {
            tracing::info!(round, "Round timed out, scoring locked votes only");
            game.session.lock().await.discard_unlocked_votes();
            None
        }
    };

    if completion == Some(RoundCompletion::Skipped) {
        game.broadcast(&ServerMessage::RoundSkipped { round }).await;
        return Ok(RoundOutcome::Skipped);
    }

    let results = {
        let mut session = game.session.lock().await;
        session.tally_votes();
        session.determine_round_result();
        let awarded = session.assign_points();

        awarded
            .into_iter()
            .filter_map(|(player_id, points_awarded)| {
                let player = session.get_player(&player_id)?;
                Some(RoundResultEntry {
                    display_name: player.display_name.clone(),
                    colour: player.colour,
                    votes_received: player.votes_received,
                    round_result: player.round_result,
                    prediction: player.prediction,
                    points_awarded,
                    points: player.points,
                    player_id,
                })
            })
            .collect::<Vec<_>>()
    };

    game.broadcast(&ServerMessage::RoundResults {
        round,
        total,
        results: results.clone(),
    })
    .await;
    Ok(RoundOutcome::Scored(results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        game::{GameSession, Standing, UserHandle},
        handlers::actions::{request_skip, submit_prediction, submit_vote},
        state::GameMessage,
    };
    use tokio::sync::mpsc;

    fn bank(size: usize) -> Vec<String> {
        (1..=size).map(|i| format!("Question {i}")).collect()
    }

    async fn setup_game() -> (Arc<ChannelGame>, Vec<(PlayerId, mpsc::UnboundedReceiver<GameMessage>)>) {
        let mut session = GameSession::new(ChannelId::new("channel"), PromptId::new(), bank(5));
        let roster = [("a", "Alice", Colour::Red), ("b", "Bob", Colour::Blue), ("c", "Cat", Colour::Green)];
        for (id, name, colour) in roster {
            session.add_player(PlayerId::new(id), name.into(), colour, UserHandle::new(name));
        }

        let game = Arc::new(ChannelGame::new(session));
        game.mark_started();
        let mut receivers = Vec::new();
        for (id, _, _) in roster {
            let (tx, rx) = mpsc::unbounded_channel();
            game.connections.write().await.insert(PlayerId::new(id), tx);
            receivers.push((PlayerId::new(id), rx));
        }
        (game, receivers)
    }

    async fn next_message(rx: &mut mpsc::UnboundedReceiver<GameMessage>) -> ServerMessage {
        let msg = rx.recv().await.expect("channel closed");
        serde_json::from_value(msg.payload).expect("not a server message")
    }

    /// Reads messages until the player's vote prompt arrives.
    async fn vote_prompt(rx: &mut mpsc::UnboundedReceiver<GameMessage>) -> (PromptId, PromptId, PromptId, PromptId) {
        let mut prediction = None;
        loop {
            match next_message(rx).await {
                ServerMessage::RoundStarted { prediction_prompt_id, .. } => prediction = Some(prediction_prompt_id),
                ServerMessage::VotePrompt {
                    lock_prompt_id,
                    first_prompt_id,
                    second_prompt_id,
                    choices,
                    ..
                } => {
                    assert_eq!(choices.len(), 2);
                    return (
                        prediction.expect("round announced before vote prompt"),
                        lock_prompt_id,
                        first_prompt_id,
                        second_prompt_id,
                    );
                }
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn test_round_scores_once_everyone_locks() {
        let (game, mut receivers) = setup_game().await;
        let round = tokio::spawn({
            let game = game.clone();
            async move { run_round(&game, 1, 10, Duration::from_secs(30)).await }
        });

        // A -> blue, blue; B -> green, green; C -> red, blue
        let ballots = [
            ("blue", "blue", "most"),
            ("green", "green", "most"),
            ("red", "blue", "some"),
        ];
        for ((player_id, rx), (first, second, prediction)) in receivers.iter_mut().zip(ballots) {
            let (prediction_prompt, lock, first_prompt, second_prompt) = vote_prompt(rx).await;
            submit_vote(&game, player_id, first_prompt, Some(first)).await.unwrap();
            submit_vote(&game, player_id, second_prompt, Some(second)).await.unwrap();
            submit_prediction(&game, player_id, prediction_prompt, prediction).await.unwrap();
            submit_vote(&game, player_id, lock, None).await.unwrap();
        }

        let outcome = round.await.unwrap().unwrap();
        let RoundOutcome::Scored(results) = outcome else {
            panic!("round should have been scored");
        };

        let summary: Vec<_> = results
            .iter()
            .map(|r| (r.display_name.as_str(), r.votes_received, r.round_result, r.points_awarded))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Alice", 1, Standing::Some, 0),
                ("Bob", 3, Standing::Most, 3),
                ("Cat", 2, Standing::Some, 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_round_timeout_ignores_unlocked_votes() {
        let (game, mut receivers) = setup_game().await;
        let round = tokio::spawn({
            let game = game.clone();
            async move { run_round(&game, 1, 10, Duration::from_millis(200)).await }
        });

        let (player_id, rx) = &mut receivers[0];
        let (prediction_prompt, _, first_prompt, _) = vote_prompt(rx).await;
        submit_vote(&game, player_id, first_prompt, Some("blue")).await.unwrap();
        submit_prediction(&game, player_id, prediction_prompt, "none").await.unwrap();

        let RoundOutcome::Scored(results) = round.await.unwrap().unwrap() else {
            panic!("timed out round should still be scored");
        };
        let bob = results.iter().find(|r| r.display_name == "Bob").unwrap();
        assert_eq!(bob.votes_received, 0);
        assert_eq!(bob.round_result, Standing::NoVotes);

        // Alice's prediction still stands even though she never locked
        let alice = results.iter().find(|r| r.display_name == "Alice").unwrap();
        assert_eq!(alice.round_result, Standing::NoVotes);
        assert_eq!(alice.points_awarded, 3);
    }

    #[tokio::test]
    async fn test_round_timeout_keeps_locked_votes() {
        let (game, mut receivers) = setup_game().await;
        let round = tokio::spawn({
            let game = game.clone();
            async move { run_round(&game, 1, 10, Duration::from_millis(200)).await }
        });

        // Alice locks her vote for Bob; Cat votes for Bob but never locks
        let (alice, rx) = &mut receivers[0];
        let (_, lock, first_prompt, _) = vote_prompt(rx).await;
        submit_vote(&game, alice, first_prompt, Some("blue")).await.unwrap();
        submit_vote(&game, alice, lock, None).await.unwrap();

        let (cat, rx) = &mut receivers[2];
        let (_, _, first_prompt, second_prompt) = vote_prompt(rx).await;
        submit_vote(&game, cat, first_prompt, Some("blue")).await.unwrap();
        submit_vote(&game, cat, second_prompt, Some("red")).await.unwrap();

        let RoundOutcome::Scored(results) = round.await.unwrap().unwrap() else {
            panic!("timed out round should still be scored");
        };
        let votes: Vec<_> = results.iter().map(|r| (r.display_name.as_str(), r.votes_received)).collect();
        assert_eq!(votes, vec![("Alice", 0), ("Bob", 1), ("Cat", 0)]);
    }

    #[tokio::test]
    async fn test_skip_quorum_abandons_round() {
        let (game, mut receivers) = setup_game().await;
        let round = tokio::spawn({
            let game = game.clone();
            async move { run_round(&game, 1, 10, Duration::from_secs(30)).await }
        });

        for (player_id, rx) in receivers.iter_mut() {
            vote_prompt(rx).await;
            request_skip(&game, player_id).await.unwrap();
        }

        assert_eq!(round.await.unwrap().unwrap(), RoundOutcome::Skipped);
        let session = game.session.lock().await;
        assert!(session.get_players().all(|(_, p)| p.points == 0));
    }

    #[tokio::test]
    async fn test_round_fails_when_bank_exhausted() {
        let session = GameSession::new(ChannelId::new("channel"), PromptId::new(), Vec::new());
        let game = ChannelGame::new(session);

        let result = run_round(&game, 1, 10, Duration::from_millis(10)).await;
        assert_eq!(result, Err(GameError::QuestionBankExhausted));
    }

    fn shared_state() -> SharedState {
        use crate::config::{Config, GameConfig, LoggingConfig, ServerConfig};
        use crate::state::{AppState, GameSessionManager};

        let config = Config {
            server: ServerConfig { addr: "0.0.0.0:0".to_string() },
            logging: LoggingConfig { level: "debug".to_string() },
            game: GameConfig {
                rounds: 1,
                round_timeout_secs: 1,
                min_players: 2,
                questions_path: "questions.json".to_string(),
            },
        };
        Arc::new(AppState {
            questions: Arc::new(Vec::new()),
            session_manager: GameSessionManager::default(),
            config: Arc::new(config),
        })
    }

    fn empty_game() -> Arc<ChannelGame> {
        Arc::new(ChannelGame::new(GameSession::new(ChannelId::new("c"), PromptId::new(), Vec::new())))
    }

    #[tokio::test]
    async fn test_finished_game_leaves_newer_lobby_in_place() {
        let state = shared_state();
        let fresh = empty_game();
        state.session_manager.sessions.write().await.insert(ChannelId::new("c"), fresh.clone());

        // An abandoned coordinator still running for the channel's previous game
        run_game(state.clone(), ChannelId::new("c"), empty_game()).await;

        let current = state.session_manager.get(&ChannelId::new("c")).await.expect("lobby was removed");
        assert!(Arc::ptr_eq(&current, &fresh));
    }

    #[tokio::test]
    async fn test_finished_game_removes_itself() {
        let state = shared_state();
        let game = empty_game();
        state.session_manager.sessions.write().await.insert(ChannelId::new("c"), game.clone());

        run_game(state.clone(), ChannelId::new("c"), game).await;

        assert!(state.session_manager.get(&ChannelId::new("c")).await.is_err());
    }
}
