//! フレーム処理ループ
//!
//! 映像ソースから最新フレームを取り出し、姿勢推定 → 種目検出 → カウンタの順に
//! 流す。ループは協調的で自分自身と並行に走ることはない。推定だけが唯一の
//! ブロッキング箇所で、その間に `stop()` された場合の結果は捨てる。

use log::{info, warn};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::camera::{VideoController, VideoSourceState};
use crate::error::{RegistryError, VideoSourceError};
use crate::pose::{Pose, PoseEstimator};
use crate::tracker::{ExerciseSession, FrameUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
}

/// 別スレッドから停止を要求するためのハンドル
#[derive(Debug, Clone, Default)]
pub struct PipelineControl {
    running: Arc<AtomicBool>,
}

impl PipelineControl {
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn set_running(&self) {
        self.running.store(true, Ordering::Release);
    }
}

/// フレームへの描画（副作用のみ）
///
/// 推定を通ったフレームごとに呼ばれる。姿勢が無ければ `pose` は None、
/// 検出に必要なランドマークが揃わなければ `update` は None。
pub trait Overlay<F> {
    fn draw(&mut self, frame: &F, pose: Option<&Pose>, update: Option<&FrameUpdate>);
}

/// 何も描画しない
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOverlay;

impl<F> Overlay<F> for NoOverlay {
    fn draw(&mut self, _frame: &F, _pose: Option<&Pose>, _update: Option<&FrameUpdate>) {}
}

/// `tick()` 1回分の結果
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// パイプライン停止中
    Idle,
    SourceInactive,
    SourceEnded,
    /// 未処理のフレームがない
    NoFrame,
    EstimatorFailed,
    NoPose,
    /// 推定中に停止された
    Discarded,
    /// 検出に必要なランドマークが揃わなかった
    NoDetection,
    Processed(FrameUpdate),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub processed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub discarded: u64,
}

impl PipelineStats {
    fn record(&mut self, outcome: &TickOutcome) {
        match outcome {
            TickOutcome::Idle => {}
            TickOutcome::Processed(_) | TickOutcome::NoDetection => self.processed += 1,
            TickOutcome::EstimatorFailed => self.failed += 1,
            TickOutcome::Discarded => self.discarded += 1,
            _ => self.skipped += 1,
        }
    }
}

/// 一定間隔でループを刻むクロック
#[derive(Debug)]
pub struct RefreshClock {
    interval: Duration,
    next: Instant,
}

impl RefreshClock {
    pub fn new(target_fps: u32) -> Self {
        let interval = Duration::from_secs_f64(1.0 / target_fps.max(1) as f64);
        Self { interval, next: Instant::now() + interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 次のティックまで待つ。処理が遅れていれば待たずに基準をずらす
    pub fn wait(&mut self) {
        let now = Instant::now();
        if let Some(rest) = self.next.checked_duration_since(now) {
            thread::sleep(rest);
            self.next += self.interval;
        } else {
            self.next = now + self.interval;
        }
    }
}

pub struct FramePipeline<F> {
    video: VideoController<F>,
    estimator: Option<Box<dyn PoseEstimator<F>>>,
    session: ExerciseSession,
    control: PipelineControl,
    stats: PipelineStats,
}

impl<F> FramePipeline<F> {
    pub fn new(video: VideoController<F>, session: ExerciseSession) -> Self {
        Self {
            video,
            estimator: None,
            session,
            control: PipelineControl::default(),
            stats: PipelineStats::default(),
        }
    }

    pub fn with_estimator(mut self, estimator: Box<dyn PoseEstimator<F>>) -> Self {
        self.estimator = Some(estimator);
        self
    }

    pub fn set_estimator(&mut self, estimator: Box<dyn PoseEstimator<F>>) {
        self.estimator = Some(estimator);
    }

    pub fn control(&self) -> PipelineControl {
        self.control.clone()
    }

    pub fn state(&self) -> PipelineState {
        if self.control.is_running() {
            PipelineState::Running
        } else {
            PipelineState::Idle
        }
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn session(&self) -> &ExerciseSession {
        &self.session
    }

    pub fn source_state(&self) -> &VideoSourceState {
        self.video.state()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.video.dimensions()
    }

    /// ソースがアクティブで推定器があるときだけ開始する
    pub fn start(&mut self) -> bool {
        if self.control.is_running() {
            return true;
        }
        if !self.video.is_active() || self.estimator.is_none() {
            warn!(
                "pipeline not started (source active: {}, estimator: {})",
                self.video.is_active(),
                self.estimator.is_some()
            );
            return false;
        }
        self.control.set_running();
        info!("pipeline started ({})", self.session.exercise_id());
        true
    }

    pub fn stop(&mut self) {
        if self.control.is_running() {
            info!("pipeline stopped");
        }
        self.control.stop();
    }

    /// 1フレーム分の処理。種目IDが不正な場合だけ `Err` を返す
    pub fn tick<O>(&mut self, overlay: &mut O) -> Result<TickOutcome, RegistryError>
    where
        O: Overlay<F> + ?Sized,
    {
        let outcome = self.step(overlay)?;
        self.stats.record(&outcome);
        Ok(outcome)
    }

    fn step<O>(&mut self, overlay: &mut O) -> Result<TickOutcome, RegistryError>
    where
        O: Overlay<F> + ?Sized,
    {
        if !self.control.is_running() {
            return Ok(TickOutcome::Idle);
        }
        if !self.video.is_active() {
            return Ok(TickOutcome::SourceInactive);
        }
        if self.video.is_ended() {
            return Ok(TickOutcome::SourceEnded);
        }
        let Some(estimator) = self.estimator.as_mut() else {
            return Ok(TickOutcome::Idle);
        };
        let Some(frame) = self.video.grab() else {
            return Ok(if self.video.is_ended() {
                TickOutcome::SourceEnded
            } else if !self.video.is_active() {
                TickOutcome::SourceInactive
            } else {
                TickOutcome::NoFrame
            });
        };

        let estimated = estimator.estimate(&frame);

        // 推定中に停止されたら結果は使わない
        if !self.control.is_running() {
            return Ok(TickOutcome::Discarded);
        }

        let poses = match estimated {
            Ok(poses) => poses,
            Err(e) => {
                warn!("pose estimation failed: {:#}", e);
                overlay.draw(&frame, None, None);
                return Ok(TickOutcome::EstimatorFailed);
            }
        };
        let Some(pose) = poses.first() else {
            overlay.draw(&frame, None, None);
            return Ok(TickOutcome::NoPose);
        };

        // 角度はピクセル空間で測る。正規化座標のままだと縦横比で歪む
        let measured = self.video.dimensions().map(|(w, h)| pose.to_pixel_space(w, h));
        let update = self.session.process(measured.as_ref().unwrap_or(pose))?;
        overlay.draw(&frame, Some(pose), update.as_ref());
        Ok(match update {
            Some(update) => TickOutcome::Processed(update),
            None => TickOutcome::NoDetection,
        })
    }

    /// 停止されるまで `clock` の間隔で tick し続ける
    pub fn run<O, C>(
        &mut self,
        clock: &mut RefreshClock,
        overlay: &mut O,
        mut on_tick: C,
    ) -> Result<(), RegistryError>
    where
        O: Overlay<F> + ?Sized,
        C: FnMut(&mut Self, &TickOutcome),
    {
        while self.control.is_running() {
            let outcome = self.tick(overlay)?;
            on_tick(self, &outcome);
            clock.wait();
        }
        Ok(())
    }

    pub fn select_exercise(&mut self, exercise_id: &str) -> Result<(), RegistryError> {
        self.session.select_exercise(exercise_id)
    }

    pub fn next_exercise(&mut self) -> &'static str {
        self.session.next_exercise()
    }

    pub fn reset(&mut self) {
        self.session.reset();
    }

    /// 前のソースは成否に関わらず解放されるので、カウンタも必ずリセットする
    pub fn start_camera(&mut self) -> Result<(), VideoSourceError> {
        self.session.reset();
        self.video.start_camera()
    }

    pub fn load_file(&mut self, path: &Path) -> Result<(), VideoSourceError> {
        self.session.reset();
        self.video.load_file(path)
    }

    pub fn stop_source(&mut self) {
        self.session.reset();
        self.video.stop();
    }

    /// 巻き戻せたときだけリセットする（カメラでは何も変えない）
    pub fn replay(&mut self) -> Result<(), VideoSourceError> {
        self.video.replay()?;
        self.session.reset();
        Ok(())
    }
}
