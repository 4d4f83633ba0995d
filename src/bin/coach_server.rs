//! Coach server: runs the rep-counting pipeline on the local camera or a video
//! file and streams per-frame updates to a UI client over TCP.

use std::path::Path;
use std::sync::mpsc;

use anyhow::{Context, Result};
use log::{error, info, warn};
use opencv::core::Mat;

use talava_coach::camera::{OpenCvSourceFactory, VideoController, VideoSourceState};
use talava_coach::config::Config;
use talava_coach::exercise::ExerciseRegistry;
use talava_coach::pipeline::{FramePipeline, NoOverlay, RefreshClock, TickOutcome};
use talava_coach::pose::MoveNetEstimator;
use talava_coach::protocol::{self, ClientMessage, ServerMessage, TickUpdate};
use talava_coach::tracker::ExerciseSession;

const CONFIG_PATH: &str = "coach.toml";
const OUTBOUND_CAPACITY: usize = 8;

// ---------------------------------------------------------------------------
// TCP side
// ---------------------------------------------------------------------------

async fn client_loop(
    stream: tokio::net::TcpStream,
    tx: mpsc::Sender<ClientMessage>,
    mut out_rx: tokio::sync::mpsc::Receiver<ServerMessage>,
) -> Result<()> {
    use futures::StreamExt as _;

    let framed = protocol::message_stream(stream);
    let (mut sink, mut reader) = framed.split();

    loop {
        tokio::select! {
            msg = protocol::recv_message::<_, ClientMessage>(&mut reader) => {
                if tx.send(msg?).is_err() {
                    return Ok(());
                }
            }
            Some(out_msg) = out_rx.recv() => {
                protocol::send_message(&mut sink, &out_msg).await?;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline side (sync, blocking)
// ---------------------------------------------------------------------------

/// 送信キューが詰まっていれば捨てる（古い更新は溜めない）
fn push(out_tx: &tokio::sync::mpsc::Sender<ServerMessage>, msg: ServerMessage) {
    if out_tx.try_send(msg).is_err() {
        warn!("client is slow, dropping message");
    }
}

fn catalog(pipeline: &FramePipeline<Mat>) -> ServerMessage {
    ServerMessage::Catalog {
        exercises: pipeline.session().list_exercises(),
        current: pipeline.session().exercise_id().to_string(),
    }
}

fn handle_command(
    pipeline: &mut FramePipeline<Mat>,
    msg: ClientMessage,
    out_tx: &tokio::sync::mpsc::Sender<ServerMessage>,
) {
    info!("command: {:?}", msg);
    let result = match msg {
        ClientMessage::SelectExercise { id } => pipeline.select_exercise(&id).map_err(|e| e.to_string()),
        ClientMessage::Reset => {
            pipeline.reset();
            Ok(())
        }
        ClientMessage::StartCamera => pipeline.start_camera().map_err(|e| e.to_string()),
        ClientMessage::LoadFile { path } => pipeline.load_file(Path::new(&path)).map_err(|e| e.to_string()),
        ClientMessage::StopSource => {
            pipeline.stop_source();
            Ok(())
        }
        ClientMessage::Replay => pipeline.replay().map_err(|e| e.to_string()),
        ClientMessage::ListExercises => {
            push(out_tx, catalog(pipeline));
            return;
        }
    };

    match result {
        Ok(()) => {
            // ソースが有効になった時点で開始（既に Running なら何もしない）
            if pipeline.source_state().is_active {
                pipeline.start();
            }
            push(
                out_tx,
                ServerMessage::Reset { exercise_id: pipeline.session().exercise_id().to_string() },
            );
        }
        Err(message) => {
            warn!("command failed: {}", message);
            push(out_tx, ServerMessage::Error { message });
        }
    }
}

fn serve_client(
    pipeline: &mut FramePipeline<Mat>,
    config: &Config,
    rx: &mpsc::Receiver<ClientMessage>,
    out_tx: &tokio::sync::mpsc::Sender<ServerMessage>,
) {
    push(out_tx, catalog(pipeline));
    let mut last_source: Option<VideoSourceState> = None;
    let mut clock = RefreshClock::new(config.pipeline.target_fps);

    loop {
        loop {
            match rx.try_recv() {
                Ok(msg) => handle_command(pipeline, msg, out_tx),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    pipeline.stop();
                    pipeline.stop_source();
                    return;
                }
            }
        }

        let source = pipeline.source_state();
        if last_source.as_ref() != Some(source) {
            push(out_tx, ServerMessage::SourceState(source.clone()));
            last_source = Some(source.clone());
        }

        match pipeline.tick(&mut NoOverlay) {
            Ok(TickOutcome::Processed(update)) => {
                let exercise_id = pipeline.session().exercise_id();
                push(out_tx, ServerMessage::Update(TickUpdate::new(exercise_id, &update)));
            }
            Ok(_) => {}
            Err(e) => {
                error!("pipeline: {}", e);
                push(out_tx, ServerMessage::Error { message: e.to_string() });
            }
        }

        clock.wait();
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    talava_coach::logging::init("coach_server")?;
    let config = Config::load_or_default(CONFIG_PATH);

    let factory = OpenCvSourceFactory::new(config.camera.clone());
    let video = VideoController::new(Box::new(factory));
    let session = ExerciseSession::new(ExerciseRegistry::builtin(), &config.exercise.default)?;
    let estimator = MoveNetEstimator::new(&config.model.path)?;
    info!("Pose model loaded: {}", config.model.path);
    let mut pipeline = FramePipeline::new(video, session).with_estimator(Box::new(estimator));

    let bind_addr: std::net::SocketAddr = config.server.listen_addr.parse()
        .context("invalid listen_addr")?;
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Listening on {}", bind_addr);

    loop {
        let (tcp_stream, addr) = listener.accept().await?;
        tcp_stream.set_nodelay(true)?;
        info!("Client connected: {}", addr);

        let (tx, rx) = mpsc::channel::<ClientMessage>();
        let (out_tx, out_rx) = tokio::sync::mpsc::channel::<ServerMessage>(OUTBOUND_CAPACITY);

        let tcp_task = tokio::spawn(async move {
            if let Err(e) = client_loop(tcp_stream, tx, out_rx).await {
                warn!("Client {}: {:#}", addr, e);
            }
        });

        tokio::task::block_in_place(|| serve_client(&mut pipeline, &config, &rx, &out_tx));

        tcp_task.abort();
        info!("Client disconnected, waiting for next connection...");
    }
}
