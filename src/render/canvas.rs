use crate::exercise::{ExerciseConfig, Position, Thresholds};
use crate::pose::Pose;
use crate::render::skeleton::{
    gauge_fill, position_color, status_line, threshold_markers, visible_segments, GAUGE_BACKGROUND,
    KEYPOINT_COLOR, LOW_CONFIDENCE_COLOR, SKELETON_COLOR, THRESHOLD_MARKER_COLOR,
};
use crate::tracker::FrameUpdate;

const GAUGE_HEIGHT: usize = 12;
const GAUGE_MARGIN: usize = 8;
const REP_PIP_RADIUS: i32 = 6;

/// 画面上部に出す種目の状態
#[derive(Debug, Clone, PartialEq)]
pub struct Hud {
    pub name: String,
    pub thresholds: Thresholds,
    pub rep_count: u32,
    pub position: Position,
    pub angle: Option<f32>,
    pub feedback: Option<&'static str>,
}

impl Hud {
    pub fn new(config: &ExerciseConfig) -> Self {
        Self {
            name: config.display_name.to_string(),
            thresholds: config.thresholds,
            rep_count: 0,
            position: Position::Unknown,
            angle: None,
            feedback: None,
        }
    }

    pub fn apply(&mut self, update: &FrameUpdate) {
        self.rep_count = update.rep_count;
        self.position = update.position;
        self.angle = Some(update.angle);
        self.feedback = update.feedback;
    }

    pub fn status(&self) -> String {
        status_line(&self.name, self.rep_count, self.position, self.angle, self.feedback)
    }
}

/// 0RGB の u32 ピクセルバッファ
pub struct Canvas {
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self { buffer: vec![0u32; width * height], width, height }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn buffer(&self) -> &[u32] {
        &self.buffer
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        (x < self.width && y < self.height).then(|| self.buffer[y * self.width + x])
    }

    /// 範囲外は無視
    pub fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            self.buffer[y as usize * self.width + x as usize] = color;
        }
    }

    /// Bresenham
    pub fn draw_line(&mut self, from: (i32, i32), to: (i32, i32), color: u32) {
        let (mut x, mut y) = from;
        let dx = (to.0 - x).abs();
        let dy = -(to.1 - y).abs();
        let sx = if x < to.0 { 1 } else { -1 };
        let sy = if y < to.1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.set_pixel(x, y, color);
            if (x, y) == to {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// 塗りつぶし円
    pub fn fill_circle(&mut self, (cx, cy): (i32, i32), radius: i32, color: u32) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.set_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }

    pub fn draw_pose(&mut self, pose: &Pose, min_confidence: f32) {
        let (w, h) = (self.width as u32, self.height as u32);
        for (start, end) in visible_segments(pose, min_confidence) {
            self.draw_line(start.to_pixel(w, h), end.to_pixel(w, h), SKELETON_COLOR);
        }
        for kp in pose.keypoints.iter().flatten() {
            let color = if kp.is_valid(min_confidence) { KEYPOINT_COLOR } else { LOW_CONFIDENCE_COLOR };
            self.fill_circle(kp.to_pixel(w, h), 4, color);
        }
    }

    /// 角度ゲージ（閾値マーカー付き）とレップ数のドット
    pub fn draw_hud(&mut self, hud: &Hud) {
        let gauge_width = self.width.saturating_sub(2 * GAUGE_MARGIN);
        let fill = hud.angle.map_or(0, |a| gauge_fill(a, gauge_width));
        let color = position_color(hud.position);
        let (down, up) = threshold_markers(&hud.thresholds, gauge_width);

        for y in GAUGE_MARGIN..GAUGE_MARGIN + GAUGE_HEIGHT {
            for x in 0..gauge_width {
                let c = if x == down || x == up {
                    THRESHOLD_MARKER_COLOR
                } else if x < fill {
                    color
                } else {
                    GAUGE_BACKGROUND
                };
                self.set_pixel((GAUGE_MARGIN + x) as i32, y as i32, c);
            }
        }

        let row = (GAUGE_MARGIN * 2 + GAUGE_HEIGHT) as i32 + REP_PIP_RADIUS;
        for i in 0..hud.rep_count as i32 {
            let cx = GAUGE_MARGIN as i32 + REP_PIP_RADIUS + i * REP_PIP_RADIUS * 3;
            if cx >= self.width as i32 {
                break;
            }
            self.fill_circle((cx, row), REP_PIP_RADIUS, KEYPOINT_COLOR);
        }
    }
}
