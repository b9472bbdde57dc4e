use futures::{SinkExt, StreamExt};
use rand::seq::IndexedRandom;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use true_colours::{
    data::{ClientMessage, CreateGameRequest, CreateGameResponse, JoinGameRequest, ServerMessage},
    game::{ChannelId, Colour, PlayerId, PromptId},
};

const BASE_URL: &str = "http://127.0.0.1:3000";
const WS_BASE: &str = "ws://127.0.0.1:3000/ws/game";

/// Connects one bot player. It answers every vote prompt with random picks and
/// locks straight away, so a full game plays out without any input.
async fn spawn_game_connection(
    channel_id: ChannelId,
    player_id: PlayerId,
    name: String,
) -> Result<tokio::task::JoinHandle<()>, Box<dyn std::error::Error>> {
    let url_str = format!("{}/{}?player_id={}", WS_BASE, channel_id, player_id);
    let (ws_stream, _) = connect_async(url_str).await?;
    println!("....[{name}] Connected!");

    let handle = tokio::spawn(async move {
        let (mut write, mut read) = ws_stream.split();
        let mut prediction_prompt: Option<PromptId> = None;

        while let Some(Ok(msg)) = read.next().await {
            let Ok(text) = msg.to_text() else { continue };
            let Ok(server_msg) = serde_json::from_str::<ServerMessage>(text) else {
                continue;
            };

            let replies = match server_msg {
                ServerMessage::RoundStarted {
                    round,
                    question,
                    prediction_prompt_id,
                    ..
                } => {
                    println!("....[{name}] Round {round}: {question}");
                    prediction_prompt = Some(prediction_prompt_id);
                    Vec::new()
                }
                ServerMessage::VotePrompt {
                    lock_prompt_id,
                    first_prompt_id,
                    second_prompt_id,
                    choices,
                    ..
                } => ballot(&name, &choices, prediction_prompt, lock_prompt_id, first_prompt_id, second_prompt_id),
                ServerMessage::RoundResults { round, results, .. } => {
                    for r in results {
                        println!(
                            "....[{name}] R{round} {} {} votes={} result={} guess={} +{} total={}",
                            r.colour, r.display_name, r.votes_received, r.round_result, r.prediction, r.points_awarded, r.points
                        );
                    }
                    Vec::new()
                }
                ServerMessage::GameOver { winners, winning_score, .. } => {
                    println!("....[{name}] Game over! Winners: {:?} with {winning_score}", winners);
                    break;
                }
                other => {
                    println!("....[{name} RX] {:?}", other);
                    Vec::new()
                }
            };

            for reply in replies {
                let Ok(json) = serde_json::to_string(&reply) else { continue };
                if write.send(Message::Text(json.into())).await.is_err() {
                    return;
                }
            }
        }
    });

    Ok(handle)
}

fn ballot(
    name: &str,
    choices: &[Colour],
    prediction_prompt: Option<PromptId>,
    lock_prompt_id: PromptId,
    first_prompt_id: PromptId,
    second_prompt_id: PromptId,
) -> Vec<ClientMessage> {
    let mut rng = rand::rng();
    let mut replies = Vec::new();

    for prompt_id in [first_prompt_id, second_prompt_id] {
        if let Some(colour) = choices.choose(&mut rng) {
            replies.push(ClientMessage::Vote { prompt_id, colour: Some(colour.name().to_string()) });
        }
    }
    if let (Some(prompt_id), Some(guess)) = (prediction_prompt, ["most", "some", "none"].choose(&mut rng)) {
        println!("....[{name}] Predicting {guess}");
        replies.push(ClientMessage::Predict { prompt_id, prediction: guess.to_string() });
    }
    replies.push(ClientMessage::Vote { prompt_id: lock_prompt_id, colour: None });
    replies
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    let channel_id = ChannelId::new("test-channel");
    let roster = [("u1", "Alice", Colour::Red), ("u2", "Bob", Colour::Blue), ("u3", "Cat", Colour::Green)];

    println!("--- 🌈 TRUE COLOURS TEST CLIENT ---");

    println!("\n[1] Creating Game...");
    let resp = client
        .post(format!("{}/game", BASE_URL))
        .json(&CreateGameRequest { channel_id: channel_id.clone() })
        .send()
        .await?
        .error_for_status()?
        .json::<CreateGameResponse>()
        .await?;
    println!("Success! Join prompt: {}", resp.join_prompt_id);

    println!("\n[2] Players Joining...");
    for (id, name, colour) in roster {
        client
            .post(format!("{}/game/{}/join", BASE_URL, channel_id))
            .json(&JoinGameRequest {
                prompt_id: resp.join_prompt_id,
                player_id: PlayerId::new(id),
                display_name: name.to_string(),
                user_handle: None,
                colour: colour.name().to_string(),
            })
            .send()
            .await?
            .error_for_status()?;
        println!("Success! {name} joined as {colour}.");
    }

    println!("\n[3] Connecting WebSockets...");
    let mut handles = Vec::new();
    for (id, name, _) in roster {
        handles.push(spawn_game_connection(channel_id.clone(), PlayerId::new(id), name.to_string()).await?);
    }

    println!("\n[4] Starting Game...");
    client
        .post(format!("{}/game/{}/start", BASE_URL, channel_id))
        .send()
        .await?
        .error_for_status()?;

    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}
