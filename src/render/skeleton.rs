use crate::exercise::{Position, Thresholds};
use crate::pose::{Keypoint, KeypointIndex, Pose};

/// 骨格の接続定義 (開始キーポイント, 終了キーポイント)
pub const SKELETON_CONNECTIONS: [(KeypointIndex, KeypointIndex); 16] = [
    // 顔
    (KeypointIndex::LeftEar, KeypointIndex::LeftEye),
    (KeypointIndex::LeftEye, KeypointIndex::Nose),
    (KeypointIndex::Nose, KeypointIndex::RightEye),
    (KeypointIndex::RightEye, KeypointIndex::RightEar),
    // 上半身
    (KeypointIndex::LeftShoulder, KeypointIndex::RightShoulder),
    (KeypointIndex::LeftShoulder, KeypointIndex::LeftElbow),
    (KeypointIndex::LeftElbow, KeypointIndex::LeftWrist),
    (KeypointIndex::RightShoulder, KeypointIndex::RightElbow),
    (KeypointIndex::RightElbow, KeypointIndex::RightWrist),
    // 胴体
    (KeypointIndex::LeftShoulder, KeypointIndex::LeftHip),
    (KeypointIndex::RightShoulder, KeypointIndex::RightHip),
    (KeypointIndex::LeftHip, KeypointIndex::RightHip),
    // 下半身
    (KeypointIndex::LeftHip, KeypointIndex::LeftKnee),
    (KeypointIndex::LeftKnee, KeypointIndex::LeftAnkle),
    (KeypointIndex::RightHip, KeypointIndex::RightKnee),
    (KeypointIndex::RightKnee, KeypointIndex::RightAnkle),
];

/// キーポイントの色 (RGB)
pub const KEYPOINT_COLOR: u32 = 0x00FF00; // 緑

/// 骨格線の色 (RGB)
pub const SKELETON_COLOR: u32 = 0xFFFF00; // 黄色

/// 信頼度が低いキーポイントの色 (RGB)
pub const LOW_CONFIDENCE_COLOR: u32 = 0xFF0000; // 赤

/// 角度ゲージの背景と閾値マーカー
pub const GAUGE_BACKGROUND: u32 = 0x202020;
pub const THRESHOLD_MARKER_COLOR: u32 = 0xFFFFFF;

/// 姿勢ごとのゲージ色
pub fn position_color(position: Position) -> u32 {
    match position {
        Position::Unknown => 0x808080,
        Position::Up => 0x00C8FF,
        Position::Down => 0xFF8000,
    }
}

/// 両端とも信頼度を満たす骨格線
pub fn visible_segments(pose: &Pose, min_confidence: f32) -> Vec<(Keypoint, Keypoint)> {
    SKELETON_CONNECTIONS
        .iter()
        .filter_map(|&(a, b)| {
            let a = pose.get(a).filter(|k| k.is_valid(min_confidence))?;
            let b = pose.get(b).filter(|k| k.is_valid(min_confidence))?;
            Some((*a, *b))
        })
        .collect()
}

/// 角度 [0, 180] をゲージ幅のピクセル数に変換
pub fn gauge_fill(angle: f32, width: usize) -> usize {
    let ratio = (angle / 180.0).clamp(0.0, 1.0);
    (ratio * width as f32).round() as usize
}

/// 閾値マーカーのゲージ上の位置 (down, up)
pub fn threshold_markers(thresholds: &Thresholds, width: usize) -> (usize, usize) {
    (gauge_fill(thresholds.down, width), gauge_fill(thresholds.up, width))
}

/// タイトルバーやコンソール向けの1行ステータス
pub fn status_line(
    exercise: &str,
    rep_count: u32,
    position: Position,
    angle: Option<f32>,
    feedback: Option<&str>,
) -> String {
    let angle = angle.map_or_else(|| "--".to_string(), |a| format!("{:.0}°", a));
    let mut line = format!("{} | reps {} | {} | {}", exercise, rep_count, position, angle);
    if let Some(f) = feedback {
        line.push_str(" | ");
        line.push_str(f);
    }
    line
}
