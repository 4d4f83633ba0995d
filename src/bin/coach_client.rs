//! Console client for the coach server: prints the exercise catalog and rep
//! updates, and sends commands typed on stdin.

use std::collections::HashMap;

use anyhow::{Context, Result};
use futures::StreamExt as _;
use log::{info, warn};

use talava_coach::config::Config;
use talava_coach::exercise::Position;
use talava_coach::protocol::{self, ClientMessage, ServerMessage, TickUpdate};
use talava_coach::render::status_line;

const CONFIG_PATH: &str = "coach.toml";

fn print_help() {
    println!("Commands:");
    println!("  e <id>     select exercise");
    println!("  r          reset counter");
    println!("  c          start camera");
    println!("  f <path>   load video file");
    println!("  s          stop source");
    println!("  p          replay file");
    println!("  l          list exercises");
    println!("  q          quit");
}

fn parse_command(line: &str) -> Option<ClientMessage> {
    let mut parts = line.split_whitespace();
    let cmd = parts.next()?;
    let arg = parts.collect::<Vec<_>>().join(" ");
    match (cmd, arg.is_empty()) {
        ("e", false) => Some(ClientMessage::SelectExercise { id: arg }),
        ("r", true) => Some(ClientMessage::Reset),
        ("c", true) => Some(ClientMessage::StartCamera),
        ("f", false) => Some(ClientMessage::LoadFile { path: arg }),
        ("s", true) => Some(ClientMessage::StopSource),
        ("p", true) => Some(ClientMessage::Replay),
        ("l", true) => Some(ClientMessage::ListExercises),
        _ => None,
    }
}

/// 姿勢かフィードバックが変わったか、レップが成立したときだけ表示する
fn should_print(last: Option<&TickUpdate>, update: &TickUpdate) -> bool {
    match last {
        None => true,
        Some(prev) => {
            update.rep_completed
                || prev.position != update.position
                || prev.feedback != update.feedback
                || prev.exercise_id != update.exercise_id
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    talava_coach::logging::init("coach_client")?;
    let config = Config::load_or_default(CONFIG_PATH);
    let addr = std::env::args().nth(1).unwrap_or(config.server.listen_addr);

    let stream = tokio::net::TcpStream::connect(&addr)
        .await
        .with_context(|| format!("Failed to connect to {}", addr))?;
    stream.set_nodelay(true)?;
    info!("Connected to {}", addr);
    print_help();

    let (mut sink, mut reader) = protocol::message_stream(stream).split();

    // stdin は別スレッドで読む
    let (cmd_tx, mut cmd_rx) = tokio::sync::mpsc::channel::<Option<ClientMessage>>(8);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) | Err(_) => {
                    let _ = cmd_tx.blocking_send(None);
                    break;
                }
                Ok(_) => {}
            }
            let trimmed = line.trim();
            if trimmed == "q" {
                let _ = cmd_tx.blocking_send(None);
                break;
            }
            if trimmed.is_empty() {
                continue;
            }
            match parse_command(trimmed) {
                Some(cmd) => {
                    if cmd_tx.blocking_send(Some(cmd)).is_err() {
                        break;
                    }
                }
                None => println!("Unknown command: {}", trimmed),
            }
        }
    });

    let mut names: HashMap<String, String> = HashMap::new();
    let mut last_update: Option<TickUpdate> = None;

    loop {
        tokio::select! {
            msg = protocol::recv_message::<_, ServerMessage>(&mut reader) => {
                match msg? {
                    ServerMessage::Catalog { exercises, current } => {
                        println!("Exercises (current: {}):", current);
                        for ex in &exercises {
                            println!(
                                "  {:<12} {:<12} down < {:.0}°, up > {:.0}°",
                                ex.id, ex.display_name, ex.thresholds.down, ex.thresholds.up
                            );
                            for step in &ex.instructions {
                                println!("      - {}", step);
                            }
                        }
                        names = exercises.into_iter().map(|e| (e.id, e.display_name)).collect();
                    }
                    ServerMessage::Update(update) => {
                        if should_print(last_update.as_ref(), &update) {
                            let name = names.get(&update.exercise_id).unwrap_or(&update.exercise_id);
                            println!(
                                "{}",
                                status_line(
                                    name,
                                    update.rep_count,
                                    update.position,
                                    Some(update.angle),
                                    update.feedback.as_deref(),
                                )
                            );
                        }
                        last_update = Some(update);
                    }
                    ServerMessage::SourceState(state) => {
                        println!(
                            "Source: {:?} active={} ended={}",
                            state.kind, state.is_active, state.is_ended
                        );
                        if let Some(e) = state.last_error {
                            println!("  error: {}", e);
                        }
                    }
                    ServerMessage::Reset { exercise_id } => {
                        let name = names.get(&exercise_id).unwrap_or(&exercise_id);
                        println!("{}", status_line(name, 0, Position::Unknown, None, None));
                        last_update = None;
                    }
                    ServerMessage::Error { message } => warn!("server: {}", message),
                }
            }
            cmd = cmd_rx.recv() => {
                match cmd.flatten() {
                    Some(cmd) => protocol::send_message(&mut sink, &cmd).await?,
                    None => break,
                }
            }
        }
    }

    println!("Bye");
    Ok(())
}
