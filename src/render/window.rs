use anyhow::Result;
use log::warn;
use minifb::{Key, KeyRepeat, Window, WindowOptions};
use opencv::core::{Mat, Vec3b};
use opencv::prelude::*;

use crate::exercise::ExerciseConfig;
use crate::pipeline::Overlay;
use crate::pose::Pose;
use crate::render::canvas::{Canvas, Hud};
use crate::tracker::FrameUpdate;

/// minifb ウィンドウにフレーム・骨格・HUD を表示する
pub struct MinifbRenderer {
    window: Window,
    canvas: Canvas,
    min_confidence: f32,
    hud: Option<Hud>,
    title: String,
}

impl MinifbRenderer {
    pub fn new(title: &str, width: usize, height: usize, min_confidence: f32) -> Result<Self> {
        let window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )?;

        Ok(Self {
            window,
            canvas: Canvas::new(width, height),
            min_confidence,
            hud: None,
            title: title.to_string(),
        })
    }

    /// ウィンドウが開いているか（Esc で閉じる）
    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    /// 押された瞬間だけ true
    pub fn key_pressed(&self, key: Key) -> bool {
        self.window.is_key_pressed(key, KeyRepeat::No)
    }

    /// 種目の切り替えやリセットのたびに呼ぶ
    pub fn set_exercise(&mut self, config: &ExerciseConfig) {
        self.hud = Some(Hud::new(config));
    }

    /// BGR Mat をキャンバスにコピー（サイズ違いはクロップ）
    fn copy_frame(&mut self, frame: &Mat) -> Result<()> {
        let rows = self.canvas.height().min(frame.rows() as usize);
        let cols = self.canvas.width().min(frame.cols() as usize);
        for y in 0..rows {
            for x in 0..cols {
                let px = frame.at_2d::<Vec3b>(y as i32, x as i32)?;
                let rgb = ((px[2] as u32) << 16) | ((px[1] as u32) << 8) | px[0] as u32;
                self.canvas.set_pixel(x as i32, y as i32, rgb);
            }
        }
        Ok(())
    }

    /// キャンバスを表示し、状態をタイトルバーに出す
    pub fn update(&mut self) -> Result<()> {
        if let Some(status) = self.hud.as_ref().map(Hud::status) {
            if status != self.title {
                self.window.set_title(&status);
                self.title = status;
            }
        }
        self.window
            .update_with_buffer(self.canvas.buffer(), self.canvas.width(), self.canvas.height())?;
        Ok(())
    }
}

impl Overlay<Mat> for MinifbRenderer {
    fn draw(&mut self, frame: &Mat, pose: Option<&Pose>, update: Option<&FrameUpdate>) {
        if let Err(e) = self.copy_frame(frame) {
            warn!("failed to draw frame: {}", e);
            return;
        }
        if let Some(pose) = pose {
            self.canvas.draw_pose(pose, self.min_confidence);
        }
        if let Some(hud) = self.hud.as_mut() {
            if let Some(update) = update {
                hud.apply(update);
            }
            self.canvas.draw_hud(hud);
        }
    }
}
