use anyhow::{bail, Context, Result};
use log::{info, warn};
use std::path::PathBuf;
use std::time::Instant;

use talava_coach::camera::{OpenCvSourceFactory, VideoController};
use talava_coach::config::Config;
use talava_coach::exercise::ExerciseRegistry;
use talava_coach::pipeline::{FramePipeline, RefreshClock, TickOutcome};
use talava_coach::pose::MoveNetEstimator;
use talava_coach::render::{Key, MinifbRenderer};
use talava_coach::tracker::ExerciseSession;

const CONFIG_PATH: &str = "coach.toml";

fn refresh_hud(renderer: &mut MinifbRenderer, pipeline: &FramePipeline<opencv::core::Mat>) {
    if let Some(exercise) = pipeline.session().exercise() {
        renderer.set_exercise(exercise);
    }
}

fn main() -> Result<()> {
    talava_coach::logging::init("rep_counter")?;
    let config = Config::load_or_default(CONFIG_PATH);

    // 引数があれば動画ファイル、なければカメラ
    let file = std::env::args().nth(1).map(PathBuf::from);

    println!("Rep Counter");
    println!("  [R] reset  [N] next exercise  [Space] replay file  [Esc] quit");

    let factory = OpenCvSourceFactory::new(config.camera.clone());
    let video = VideoController::new(Box::new(factory));
    let session = ExerciseSession::new(ExerciseRegistry::builtin(), &config.exercise.default)?;

    info!("Loading model from {}...", config.model.path);
    let estimator = MoveNetEstimator::new(&config.model.path)?;
    let mut pipeline = FramePipeline::new(video, session).with_estimator(Box::new(estimator));

    match &file {
        Some(path) => pipeline
            .load_file(path)
            .with_context(|| format!("Failed to open {}", path.display()))?,
        None => pipeline.start_camera().context("Failed to open camera")?,
    }

    let (width, height) = pipeline
        .dimensions()
        .unwrap_or((config.camera.width, config.camera.height));
    let mut renderer = MinifbRenderer::new(
        "Rep Counter",
        width as usize,
        height as usize,
        config.render.skeleton_min_confidence,
    )?;
    refresh_hud(&mut renderer, &pipeline);

    if !pipeline.start() {
        bail!("Pipeline could not start");
    }

    let mut clock = RefreshClock::new(config.pipeline.target_fps);
    let mut stats_timer = Instant::now();
    let mut last_stats = pipeline.stats();
    let mut reported_error = None;

    while renderer.is_open() {
        match pipeline.tick(&mut renderer)? {
            TickOutcome::Processed(update) if update.rep_completed => {
                info!("rep {} ({})", update.rep_count, pipeline.session().exercise_id());
            }
            TickOutcome::SourceInactive => {
                let error = pipeline.source_state().last_error.clone();
                if error.is_some() && error != reported_error {
                    warn!("video source stopped: {:?}", error);
                    reported_error = error;
                }
            }
            _ => {}
        }

        if renderer.key_pressed(Key::R) {
            pipeline.reset();
            refresh_hud(&mut renderer, &pipeline);
            info!("counter reset");
        }
        if renderer.key_pressed(Key::N) {
            pipeline.next_exercise();
            refresh_hud(&mut renderer, &pipeline);
        }
        if renderer.key_pressed(Key::Space) {
            match pipeline.replay() {
                Ok(()) => refresh_hud(&mut renderer, &pipeline),
                Err(e) => warn!("replay: {}", e),
            }
        }

        renderer.update()?;

        // 1秒ごとに処理状況を出力
        if stats_timer.elapsed().as_secs_f32() >= 1.0 {
            let stats = pipeline.stats();
            info!(
                "processed {} / skipped {} / failed {} / discarded {}",
                stats.processed - last_stats.processed,
                stats.skipped - last_stats.skipped,
                stats.failed - last_stats.failed,
                stats.discarded - last_stats.discarded,
            );
            last_stats = stats;
            stats_timer = Instant::now();
        }

        clock.wait();
    }

    println!("Shutting down... ({} reps)", pipeline.session().rep_count());
    pipeline.stop();
    pipeline.stop_source();
    Ok(())
}
