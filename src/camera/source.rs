//! 映像ソース（カメラ / 動画ファイル）の切り替えと状態管理
//!
//! パイプラインから見えるのは `VideoSourceState` の `is_active` / `is_ended` と
//! `VideoController::grab` だけ。エラーは `last_error` に記録され、呼び出し元の
//! UI へは `Result` で返すがパイプラインには伝播しない。

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::VideoSourceError;

/// 対応する動画ファイルの拡張子（小文字）
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "m4v", "avi", "mkv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SourceKind {
    #[default]
    None,
    Camera,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoSourceState {
    pub kind: SourceKind,
    pub is_active: bool,
    pub is_ended: bool,
    pub last_error: Option<VideoSourceError>,
}

/// `VideoSource::grab` の結果
#[derive(Debug)]
pub enum Grab<F> {
    /// 未処理の新しいフレーム
    Frame(F),
    /// 新しいフレームがまだ来ていない
    Pending,
    /// ファイル末尾に到達
    Ended,
    Failed(VideoSourceError),
}

/// フレームの生産者。drop でデバイス/ファイルを解放する
pub trait VideoSource<F>: Send {
    fn kind(&self) -> SourceKind;

    /// 前回以降に届いた最新フレームを取り出す（古いフレームは捨てる）
    fn grab(&mut self) -> Grab<F>;

    /// 先頭に戻す。ファイルのみ対応
    fn rewind(&mut self) -> Result<(), VideoSourceError> {
        Err(VideoSourceError::ReplayUnsupported)
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        None
    }
}

/// ソースの生成（デバイスを開く処理）をコントローラから切り離す
pub trait SourceFactory<F>: Send {
    fn open_camera(&mut self) -> Result<Box<dyn VideoSource<F>>, VideoSourceError>;
    fn open_file(&mut self, path: &Path) -> Result<Box<dyn VideoSource<F>>, VideoSourceError>;
}

pub fn is_supported_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()))
}

/// 同時に1つだけのソースを管理する
pub struct VideoController<F> {
    factory: Box<dyn SourceFactory<F>>,
    source: Option<Box<dyn VideoSource<F>>>,
    state: VideoSourceState,
}

impl<F> VideoController<F> {
    pub fn new(factory: Box<dyn SourceFactory<F>>) -> Self {
        Self {
            factory,
            source: None,
            state: VideoSourceState::default(),
        }
    }

    pub fn state(&self) -> &VideoSourceState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active
    }

    pub fn is_ended(&self) -> bool {
        self.state.is_ended
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.source.as_ref().and_then(|s| s.dimensions())
    }

    pub fn start_camera(&mut self) -> Result<(), VideoSourceError> {
        self.release();
        let opened = self.factory.open_camera();
        self.install(SourceKind::Camera, opened)
    }

    pub fn load_file(&mut self, path: &Path) -> Result<(), VideoSourceError> {
        self.release();
        let opened = if is_supported_file(path) {
            self.factory.open_file(path)
        } else {
            Err(VideoSourceError::UnsupportedFileType(path.display().to_string()))
        };
        self.install(SourceKind::File, opened)
    }

    /// 停止。停止済みなら何もしない
    pub fn stop(&mut self) {
        if self.source.is_some() {
            info!("video source stopped ({:?})", self.state.kind);
        }
        self.release();
        self.state.last_error = None;
    }

    /// ファイルを先頭から再生し直す。リソースは開き直さない
    pub fn replay(&mut self) -> Result<(), VideoSourceError> {
        let result = match self.source.as_mut() {
            Some(source) if source.kind() == SourceKind::File => source.rewind(),
            Some(_) => return Err(VideoSourceError::ReplayUnsupported),
            None => return Err(VideoSourceError::NoSource),
        };
        match result {
            Ok(()) => {
                self.state.is_active = true;
                self.state.is_ended = false;
                self.state.last_error = None;
                info!("replaying file source");
                Ok(())
            }
            Err(e) => {
                self.fail(e.clone());
                Err(e)
            }
        }
    }

    /// パイプライン用: 新しいフレームがあれば返す。失敗は状態に記録するだけ
    pub fn grab(&mut self) -> Option<F> {
        if !self.state.is_active || self.state.is_ended {
            return None;
        }
        let source = self.source.as_mut()?;
        match source.grab() {
            Grab::Frame(frame) => Some(frame),
            Grab::Pending => None,
            Grab::Ended => {
                info!("video source reached end of stream");
                self.state.is_ended = true;
                None
            }
            Grab::Failed(e) => {
                self.fail(e);
                None
            }
        }
    }

    fn install(
        &mut self,
        kind: SourceKind,
        opened: Result<Box<dyn VideoSource<F>>, VideoSourceError>,
    ) -> Result<(), VideoSourceError> {
        match opened {
            Ok(source) => {
                info!("video source started ({:?})", kind);
                self.source = Some(source);
                self.state = VideoSourceState {
                    kind,
                    is_active: true,
                    is_ended: false,
                    last_error: None,
                };
                Ok(())
            }
            Err(e) => {
                self.state.kind = kind;
                self.fail(e.clone());
                Err(e)
            }
        }
    }

    /// エラーを記録して非アクティブにする
    fn fail(&mut self, error: VideoSourceError) {
        warn!("video source error: {}", error);
        self.source = None;
        self.state.is_active = false;
        self.state.is_ended = false;
        self.state.last_error = Some(error);
    }

    fn release(&mut self) {
        self.source = None;
        self.state = VideoSourceState::default();
    }
}

/// キャプチャスレッドと読み出し側で共有する深さ1のフレームスロット
///
/// 書き込みは常に上書き。読み出し側は未読のフレームIDだけを処理するので、
/// 推論が遅い場合はフレームが捨てられ、キューには溜まらない。
#[derive(Debug)]
pub struct LatestFrame<F> {
    latest: Mutex<Option<F>>,
    frame_id: AtomicU64,
    ended: AtomicBool,
}

impl<F: Clone> Default for LatestFrame<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Clone> LatestFrame<F> {
    pub fn new() -> Self {
        Self {
            latest: Mutex::new(None),
            frame_id: AtomicU64::new(0),
            ended: AtomicBool::new(false),
        }
    }

    pub fn publish(&self, frame: F) {
        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(frame);
        self.frame_id.fetch_add(1, Ordering::Release);
    }

    /// 現在のフレームID。新フレームが到着するたびにインクリメントされる
    pub fn frame_id(&self) -> u64 {
        self.frame_id.load(Ordering::Acquire)
    }

    pub fn set_ended(&self, ended: bool) {
        self.ended.store(ended, Ordering::Release);
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    /// `last_seen` より新しいフレームがあれば返して `last_seen` を進める
    pub fn grab_newer(&self, last_seen: &mut u64) -> Grab<F> {
        let id = self.frame_id();
        if id != *last_seen {
            let frame = self.latest.lock().unwrap_or_else(|e| e.into_inner()).clone();
            if let Some(frame) = frame {
                *last_seen = id;
                return Grab::Frame(frame);
            }
        }
        if self.is_ended() {
            Grab::Ended
        } else {
            Grab::Pending
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::ScriptedFactory;
    use super::*;
    use std::sync::Arc;

    fn controller(factory: ScriptedFactory) -> VideoController<u32> {
        VideoController::new(Box::new(factory))
    }

    #[test]
    fn test_initial_state() {
        let c = controller(ScriptedFactory::default());
        assert_eq!(*c.state(), VideoSourceState::default());
        assert_eq!(c.state().kind, SourceKind::None);
    }

    #[test]
    fn test_start_camera() {
        let mut c = controller(ScriptedFactory { frames: vec![1, 2], ..Default::default() });
        c.start_camera().unwrap();
        assert_eq!(c.state().kind, SourceKind::Camera);
        assert!(c.is_active());
        assert_eq!(c.grab(), Some(1));
        assert_eq!(c.grab(), Some(2));
        assert_eq!(c.grab(), None);
        assert!(c.is_active());
    }

    #[test]
    fn test_camera_permission_denied() {
        let mut c = controller(ScriptedFactory {
            camera_error: Some(VideoSourceError::PermissionDenied),
            ..Default::default()
        });
        assert_eq!(c.start_camera(), Err(VideoSourceError::PermissionDenied));
        assert!(!c.is_active());
        assert_eq!(c.state().last_error, Some(VideoSourceError::PermissionDenied));
        assert_eq!(c.grab(), None);
    }

    #[test]
    fn test_unsupported_file_type() {
        let opened = Arc::new(AtomicU64::new(0));
        let mut c = controller(ScriptedFactory { opened: Arc::clone(&opened), ..Default::default() });
        let err = c.load_file(Path::new("notes.txt")).unwrap_err();
        assert!(matches!(err, VideoSourceError::UnsupportedFileType(_)));
        assert!(!c.is_active());
        assert_eq!(c.state().kind, SourceKind::File);
        assert!(c.state().last_error.is_some());
        assert_eq!(opened.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_file(Path::new("workout.mp4")));
        assert!(is_supported_file(Path::new("/tmp/Workout.MOV")));
        assert!(!is_supported_file(Path::new("workout")));
        assert!(!is_supported_file(Path::new("workout.gif")));
    }

    #[test]
    fn test_file_ends_and_replays_without_reopen() {
        let opened = Arc::new(AtomicU64::new(0));
        let rewinds = Arc::new(AtomicU64::new(0));
        let mut c = controller(ScriptedFactory {
            frames: vec![7],
            end_after_frames: true,
            opened: Arc::clone(&opened),
            rewinds: Arc::clone(&rewinds),
            ..Default::default()
        });
        c.load_file(Path::new("set.webm")).unwrap();
        assert_eq!(c.grab(), Some(7));
        assert_eq!(c.grab(), None);
        assert!(c.is_ended());
        assert!(c.is_active());

        c.replay().unwrap();
        assert!(!c.is_ended());
        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(rewinds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_replay_requires_file() {
        let mut c = controller(ScriptedFactory::default());
        assert_eq!(c.replay(), Err(VideoSourceError::NoSource));
        c.start_camera().unwrap();
        assert_eq!(c.replay(), Err(VideoSourceError::ReplayUnsupported));
        assert!(c.is_active());
    }

    #[test]
    fn test_new_source_replaces_previous() {
        let mut c = controller(ScriptedFactory { frames: vec![1], ..Default::default() });
        c.start_camera().unwrap();
        c.load_file(Path::new("a.mp4")).unwrap();
        assert_eq!(c.state().kind, SourceKind::File);
        assert!(c.is_active());
    }

    #[test]
    fn test_decode_failure_deactivates() {
        let mut c = controller(ScriptedFactory::default());
        c.start_camera().unwrap();
        c.source = Some(Box::new(super::test_support::ScriptedSource {
            kind: SourceKind::Camera,
            script: vec![Grab::Failed(VideoSourceError::Decode("bad frame".into()))].into(),
            rewinds: Arc::new(AtomicU64::new(0)),
            dimensions: None,
        }));
        assert_eq!(c.grab(), None);
        assert!(!c.is_active());
        assert_eq!(c.state().last_error, Some(VideoSourceError::Decode("bad frame".into())));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut c = controller(ScriptedFactory::default());
        c.start_camera().unwrap();
        c.stop();
        let once = c.state().clone();
        c.stop();
        assert_eq!(*c.state(), once);
        assert_eq!(once, VideoSourceState::default());
    }

    #[test]
    fn test_latest_frame_drops_stale() {
        let slot = LatestFrame::new();
        let mut seen = 0;
        assert!(matches!(slot.grab_newer(&mut seen), Grab::Pending));

        slot.publish(1u32);
        slot.publish(2u32);
        slot.publish(3u32);
        assert!(matches!(slot.grab_newer(&mut seen), Grab::Frame(3)));
        assert_eq!(seen, 3);
        assert!(matches!(slot.grab_newer(&mut seen), Grab::Pending));

        slot.set_ended(true);
        assert!(matches!(slot.grab_newer(&mut seen), Grab::Ended));
    }
}
