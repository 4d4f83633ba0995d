//! TCP protocol between the coach server (pipeline side) and a UI client.
//!
//! Frames are length-delimited, payloads are bincode.

use bytes::{Bytes, BytesMut};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::camera::VideoSourceState;
use crate::exercise::{ExerciseSummary, Position};
use crate::tracker::FrameUpdate;

// --- Message types ---

/// UI → server
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ClientMessage {
    SelectExercise { id: String },
    Reset,
    StartCamera,
    LoadFile { path: String },
    StopSource,
    Replay,
    ListExercises,
}

/// Per-frame result as seen by the UI.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TickUpdate {
    pub exercise_id: String,
    pub angle: f32,
    pub position: Position,
    pub feedback: Option<String>,
    pub rep_count: u32,
    pub rep_completed: bool,
    pub data: BTreeMap<String, Option<f32>>,
}

impl TickUpdate {
    pub fn new(exercise_id: &str, update: &FrameUpdate) -> Self {
        Self {
            exercise_id: exercise_id.to_string(),
            angle: update.angle,
            position: update.position,
            feedback: update.feedback.map(str::to_string),
            rep_count: update.rep_count,
            rep_completed: update.rep_completed,
            data: update.data.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }
}

/// Server → UI
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Catalog { exercises: Vec<ExerciseSummary>, current: String },
    Update(TickUpdate),
    SourceState(VideoSourceState),
    /// Counter was reset (exercise change, source change, explicit reset)
    Reset { exercise_id: String },
    Error { message: String },
}

// --- TCP codec helpers ---

pub type MessageStream = Framed<TcpStream, LengthDelimitedCodec>;

const MAX_FRAME_LENGTH: usize = 1024 * 1024;

/// Create a framed message stream with length-delimited framing.
pub fn message_stream(stream: TcpStream) -> MessageStream {
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_codec();
    Framed::new(stream, codec)
}

/// Send a serializable message (bincode + length prefix).
///
/// Works on a whole `MessageStream` or on its write half after `split()`.
pub async fn send_message<S, T>(sink: &mut S, msg: &T) -> anyhow::Result<()>
where
    S: Sink<Bytes, Error = io::Error> + Unpin,
    T: Serialize,
{
    let data = bincode::serialize(msg)?;
    sink.send(Bytes::from(data)).await?;
    Ok(())
}

/// Receive and deserialize a message.
pub async fn recv_message<S, T>(stream: &mut S) -> anyhow::Result<T>
where
    S: Stream<Item = Result<BytesMut, io::Error>> + Unpin,
    T: DeserializeOwned,
{
    match stream.next().await {
        Some(Ok(bytes)) => Ok(bincode::deserialize(&bytes)?),
        Some(Err(e)) => Err(e.into()),
        None => Err(anyhow::anyhow!("connection closed")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::SourceKind;
    use crate::error::VideoSourceError;
    use crate::exercise::ExerciseRegistry;
    use tokio::net::TcpListener;

    #[test]
    fn test_tick_update_from_frame_update() {
        let mut data = BTreeMap::new();
        data.insert("left_knee", Some(95.0));
        data.insert("right_knee", None);
        let update = FrameUpdate {
            angle: 95.0,
            position: Position::Down,
            feedback: Some("Good form"),
            rep_count: 3,
            rep_completed: false,
            data,
        };
        let tick = TickUpdate::new("squat", &update);
        assert_eq!(tick.exercise_id, "squat");
        assert_eq!(tick.feedback.as_deref(), Some("Good form"));
        assert_eq!(tick.data["left_knee"], Some(95.0));
        assert_eq!(tick.data["right_knee"], None);
    }

    #[tokio::test]
    async fn test_round_trip_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut stream = message_stream(socket);
            let msg: ClientMessage = recv_message(&mut stream).await.unwrap();
            assert_eq!(msg, ClientMessage::SelectExercise { id: "squat".into() });

            let catalog = ServerMessage::Catalog {
                exercises: ExerciseRegistry::builtin().list_exercises(),
                current: "squat".into(),
            };
            send_message(&mut stream, &catalog).await.unwrap();

            let state = VideoSourceState {
                kind: SourceKind::File,
                is_active: false,
                is_ended: false,
                last_error: Some(VideoSourceError::UnsupportedFileType("a.txt".into())),
            };
            send_message(&mut stream, &ServerMessage::SourceState(state)).await.unwrap();
        });

        let socket = TcpStream::connect(addr).await.unwrap();
        let (mut tx, mut rx) = message_stream(socket).split();
        send_message(&mut tx, &ClientMessage::SelectExercise { id: "squat".into() })
            .await
            .unwrap();

        match recv_message(&mut rx).await.unwrap() {
            ServerMessage::Catalog { exercises, current } => {
                assert_eq!(current, "squat");
                assert_eq!(exercises.len(), 3);
            }
            other => panic!("unexpected {:?}", other),
        }
        match recv_message(&mut rx).await.unwrap() {
            ServerMessage::SourceState(state) => {
                assert!(!state.is_active);
                assert!(matches!(state.last_error, Some(VideoSourceError::UnsupportedFileType(_))));
            }
            other => panic!("unexpected {:?}", other),
        }

        server.await.unwrap();
        let closed: anyhow::Result<ServerMessage> = recv_message(&mut rx).await;
        assert!(closed.is_err());
    }
}
