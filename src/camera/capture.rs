use anyhow::{Context, Result};
use log::{info, warn};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs, VideoCaptureTrait},
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use super::source::{Grab, LatestFrame, SourceFactory, SourceKind, VideoSource};
use crate::config::CameraConfig;
use crate::error::VideoSourceError;

/// 連続でこの回数読み込みに失敗したらデコード失敗とみなす
const MAX_CONSECUTIVE_READ_ERRORS: u32 = 30;
/// ファイルのFPSが取れない場合の再生レート
const DEFAULT_FILE_FPS: f64 = 30.0;

/// OpenCVを使用したカメラ/動画ファイルキャプチャ
pub struct OpenCvCamera {
    capture: VideoCapture,
    width: u32,
    height: u32,
    fps: f64,
}

impl OpenCvCamera {
    /// 解像度とFPSを指定してカメラを開く
    pub fn open_with_config(index: i32, width: Option<u32>, height: Option<u32>, fps: Option<u32>) -> Result<Self> {
        let mut capture =
            VideoCapture::new(index, VideoCaptureAPIs::CAP_ANY as i32).context("Failed to open camera")?;

        if !capture.is_opened()? {
            anyhow::bail!("Camera {} is not available", index);
        }

        if let Some(w) = width {
            capture.set(videoio::CAP_PROP_FRAME_WIDTH, w as f64)?;
        }
        if let Some(h) = height {
            capture.set(videoio::CAP_PROP_FRAME_HEIGHT, h as f64)?;
        }
        if let Some(f) = fps {
            capture.set(videoio::CAP_PROP_FPS, f as f64)?;
        }
        // 古いフレームを溜めない
        capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0)?;

        Self::from_capture(capture)
    }

    /// 動画ファイルを開く
    pub fn open_file(path: &Path) -> Result<Self> {
        let path_str = path.to_str().context("Video path is not valid UTF-8")?;
        let capture = VideoCapture::from_file(path_str, VideoCaptureAPIs::CAP_ANY as i32)
            .with_context(|| format!("Failed to open video file: {}", path.display()))?;

        if !capture.is_opened()? {
            anyhow::bail!("Video file {} could not be decoded", path.display());
        }

        Self::from_capture(capture)
    }

    fn from_capture(capture: VideoCapture) -> Result<Self> {
        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;
        let fps = capture.get(videoio::CAP_PROP_FPS)?;
        info!("capture opened: {}x{} @ {:.1} fps", width, height, fps);

        Ok(Self { capture, width, height, fps })
    }

    /// 解像度を取得
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// フレームを読み込む（BGR形式）。ストリーム終端なら None
    pub fn read_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        let ok = self.capture.read(&mut frame).context("Failed to read frame")?;
        if !ok || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }

    /// 先頭フレームに戻る
    pub fn rewind(&mut self) -> Result<()> {
        self.capture.set(videoio::CAP_PROP_POS_FRAMES, 0.0)?;
        Ok(())
    }
}

/// 別スレッドでキャプチャを行い、最新フレームだけを保持する
pub struct ThreadedCapture {
    kind: SourceKind,
    slot: Arc<LatestFrame<Mat>>,
    last_seen: u64,
    running: Arc<AtomicBool>,
    rewind_pending: Arc<AtomicBool>,
    error: Arc<Mutex<Option<VideoSourceError>>>,
    width: u32,
    height: u32,
    handle: Option<thread::JoinHandle<()>>,
}

impl ThreadedCapture {
    pub fn start_camera(config: &CameraConfig) -> Result<Self> {
        let camera = OpenCvCamera::open_with_config(
            config.index,
            Some(config.width),
            Some(config.height),
            Some(config.fps),
        )?;
        Ok(Self::spawn(camera, SourceKind::Camera))
    }

    pub fn start_file(path: &Path) -> Result<Self> {
        let camera = OpenCvCamera::open_file(path)?;
        Ok(Self::spawn(camera, SourceKind::File))
    }

    fn spawn(mut camera: OpenCvCamera, kind: SourceKind) -> Self {
        let (width, height) = camera.resolution();
        let slot = Arc::new(LatestFrame::new());
        let running = Arc::new(AtomicBool::new(true));
        let rewind_pending = Arc::new(AtomicBool::new(false));
        let error = Arc::new(Mutex::new(None));

        // ファイルは元のFPSで再生、カメラはデバイス任せ
        let frame_interval = match kind {
            SourceKind::File => {
                let fps = if camera.fps > 0.0 { camera.fps } else { DEFAULT_FILE_FPS };
                Some(Duration::from_secs_f64(1.0 / fps))
            }
            _ => None,
        };

        let handle = {
            let slot = Arc::clone(&slot);
            let running = Arc::clone(&running);
            let rewind_pending = Arc::clone(&rewind_pending);
            let error = Arc::clone(&error);
            thread::spawn(move || {
                let mut read_errors = 0u32;
                while running.load(Ordering::Acquire) {
                    if rewind_pending.load(Ordering::Acquire) {
                        if let Err(e) = camera.rewind() {
                            warn!("rewind failed: {}", e);
                        }
                        slot.set_ended(false);
                        rewind_pending.store(false, Ordering::Release);
                    }
                    if slot.is_ended() {
                        thread::sleep(Duration::from_millis(10));
                        continue;
                    }

                    let started = Instant::now();
                    match camera.read_frame() {
                        Ok(Some(frame)) => {
                            read_errors = 0;
                            slot.publish(frame);
                        }
                        Ok(None) if kind == SourceKind::File => slot.set_ended(true),
                        Ok(None) => {}
                        Err(e) => {
                            read_errors += 1;
                            if read_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                                *error.lock().unwrap_or_else(|p| p.into_inner()) =
                                    Some(VideoSourceError::Decode(e.to_string()));
                                break;
                            }
                        }
                    }
                    if let Some(interval) = frame_interval {
                        if let Some(rest) = interval.checked_sub(started.elapsed()) {
                            thread::sleep(rest);
                        }
                    }
                }
            })
        };

        Self {
            kind,
            slot,
            last_seen: 0,
            running,
            rewind_pending,
            error,
            width,
            height,
            handle: Some(handle),
        }
    }
}

impl VideoSource<Mat> for ThreadedCapture {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn grab(&mut self) -> Grab<Mat> {
        if let Some(e) = self.error.lock().unwrap_or_else(|p| p.into_inner()).take() {
            return Grab::Failed(e);
        }
        match self.slot.grab_newer(&mut self.last_seen) {
            // 巻き戻し要求がスレッドに届くまでは終端扱いしない
            Grab::Ended if self.rewind_pending.load(Ordering::Acquire) => Grab::Pending,
            other => other,
        }
    }

    fn rewind(&mut self) -> Result<(), VideoSourceError> {
        if self.kind != SourceKind::File {
            return Err(VideoSourceError::ReplayUnsupported);
        }
        self.rewind_pending.store(true, Ordering::Release);
        self.slot.set_ended(false);
        Ok(())
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }
}

impl Drop for ThreadedCapture {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// OpenCV でカメラ/ファイルを開くファクトリ
pub struct OpenCvSourceFactory {
    camera: CameraConfig,
    last_file: Option<PathBuf>,
}

impl OpenCvSourceFactory {
    pub fn new(camera: CameraConfig) -> Self {
        Self { camera, last_file: None }
    }

    pub fn last_file(&self) -> Option<&Path> {
        self.last_file.as_deref()
    }
}

impl SourceFactory<Mat> for OpenCvSourceFactory {
    fn open_camera(&mut self) -> Result<Box<dyn VideoSource<Mat>>, VideoSourceError> {
        let capture = ThreadedCapture::start_camera(&self.camera)
            .map_err(|e| VideoSourceError::CameraUnavailable(format!("{:#}", e)))?;
        Ok(Box::new(capture))
    }

    fn open_file(&mut self, path: &Path) -> Result<Box<dyn VideoSource<Mat>>, VideoSourceError> {
        let capture = ThreadedCapture::start_file(path)
            .map_err(|e| VideoSourceError::Decode(format!("{:#}", e)))?;
        self.last_file = Some(path.to_path_buf());
        Ok(Box::new(capture))
    }
}
