//! 種目ごとの角度検出器と、レップ判定に使う閾値の定義
//!
//! 新しい種目は `ExerciseConfig` を作って `ExerciseRegistry::register` するだけで
//! 追加できる。カウンタやパイプラインは変更不要。

pub mod curl;
pub mod pushup;
pub mod registry;
pub mod squat;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::geometry::{angle_between, all_valid, MIN_CONFIDENCE};
use crate::pose::{KeypointIndex, Pose};

pub use registry::ExerciseRegistry;

/// 全種目共通の「問題なし」フィードバック
pub const GOOD_FORM: &str = "Good form";

/// 離散化した姿勢
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Position {
    #[default]
    Unknown,
    Up,
    Down,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Position::Unknown => "unknown",
            Position::Up => "up",
            Position::Down => "down",
        };
        f.write_str(s)
    }
}

/// up/down 判定の閾値。`down < up`、その間はヒステリシス帯
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub down: f32,
    pub up: f32,
}

/// フォーム判定に使う固定閾値（UI表示とテスト用に公開）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormLimit {
    pub key: &'static str,
    pub degrees: f32,
    pub message: &'static str,
}

/// 1フレーム分の検出結果
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    /// 主関節角度 [0, 180]
    pub angle: f32,
    pub feedback: Option<&'static str>,
    pub data: BTreeMap<&'static str, Option<f32>>,
}

pub type DetectFn = fn(&Pose) -> Option<DetectionResult>;
pub type ClassifyFn = fn(&Thresholds, f32, Position) -> Position;

/// 種目定義。起動時に登録され、以後は変更されない
#[derive(Clone)]
pub struct ExerciseConfig {
    pub id: &'static str,
    pub display_name: &'static str,
    pub detect: DetectFn,
    pub classify_position: ClassifyFn,
    pub thresholds: Thresholds,
    pub form_limits: &'static [FormLimit],
    pub instructions: &'static [&'static str],
}

impl fmt::Debug for ExerciseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExerciseConfig")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("thresholds", &self.thresholds)
            .field("form_limits", &self.form_limits)
            .finish_non_exhaustive()
    }
}

impl ExerciseConfig {
    pub fn detect(&self, pose: &Pose) -> Option<DetectionResult> {
        (self.detect)(pose)
    }

    pub fn classify(&self, angle: f32, previous: Position) -> Position {
        (self.classify_position)(&self.thresholds, angle, previous)
    }

    pub fn form_limit(&self, key: &str) -> Option<&FormLimit> {
        self.form_limits.iter().find(|l| l.key == key)
    }

    pub fn summary(&self) -> ExerciseSummary {
        ExerciseSummary {
            id: self.id.to_string(),
            display_name: self.display_name.to_string(),
            thresholds: self.thresholds,
            form_limits: self
                .form_limits
                .iter()
                .map(|l| (l.key.to_string(), l.degrees))
                .collect(),
            instructions: self.instructions.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// UI向けの種目カタログ項目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSummary {
    pub id: String,
    pub display_name: String,
    pub thresholds: Thresholds,
    pub form_limits: BTreeMap<String, f32>,
    pub instructions: Vec<String>,
}

/// 標準のヒステリシス判定
///
/// - `angle < down` → Down
/// - `angle > up` → Up
/// - それ以外は直前の姿勢を維持
pub fn classify_by_hysteresis(thresholds: &Thresholds, angle: f32, previous: Position) -> Position {
    if angle < thresholds.down {
        Position::Down
    } else if angle > thresholds.up {
        Position::Up
    } else {
        previous
    }
}

/// 組み込み種目
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExerciseKind {
    PushUp,
    Squat,
    BicepCurl,
}

impl ExerciseKind {
    pub const ALL: [ExerciseKind; 3] = [Self::PushUp, Self::Squat, Self::BicepCurl];

    pub fn config(self) -> ExerciseConfig {
        match self {
            Self::PushUp => pushup::config(),
            Self::Squat => squat::config(),
            Self::BicepCurl => curl::config(),
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Self::PushUp => pushup::ID,
            Self::Squat => squat::ID,
            Self::BicepCurl => curl::ID,
        }
    }
}

/// 左右どちらか一方の関節連鎖 (a, 頂点b, c)
pub(crate) type Chain = [KeypointIndex; 3];

/// 連鎖の3点がすべて有効なら頂点角度を返す
pub(crate) fn joint_angle(pose: &Pose, chain: Chain) -> Option<f32> {
    let [a, b, c] = chain.map(|idx| pose.get(idx));
    if !all_valid(&[a, b, c], MIN_CONFIDENCE) {
        return None;
    }
    Some(angle_between(a?, b?, c?))
}

/// 両側が使えれば平均、片側のみならその値
pub(crate) fn mean_of_sides(left: Option<f32>, right: Option<f32>) -> Option<f32> {
    match (left, right) {
        (Some(l), Some(r)) => Some((l + r) / 2.0),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    const T: Thresholds = Thresholds { down: 90.0, up: 160.0 };

    #[test]
    fn test_hysteresis_below_and_above() {
        assert_eq!(classify_by_hysteresis(&T, 80.0, Position::Up), Position::Down);
        assert_eq!(classify_by_hysteresis(&T, 170.0, Position::Down), Position::Up);
        assert_eq!(classify_by_hysteresis(&T, 170.0, Position::Unknown), Position::Up);
    }

    #[test]
    fn test_hysteresis_band_keeps_previous() {
        for prev in [Position::Unknown, Position::Up, Position::Down] {
            for angle in [90.0, 120.0, 160.0] {
                assert_eq!(classify_by_hysteresis(&T, angle, prev), prev);
            }
        }
    }

    #[test]
    fn test_mean_of_sides() {
        assert_eq!(mean_of_sides(Some(80.0), Some(100.0)), Some(90.0));
        assert_eq!(mean_of_sides(None, Some(100.0)), Some(100.0));
        assert_eq!(mean_of_sides(Some(80.0), None), Some(80.0));
        assert_eq!(mean_of_sides(None, None), None);
    }

    #[test]
    fn test_builtin_ids_unique() {
        let mut ids: Vec<_> = ExerciseKind::ALL.iter().map(|k| k.config().id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), ExerciseKind::ALL.len());
        for kind in ExerciseKind::ALL {
            let cfg = kind.config();
            assert_eq!(cfg.id, kind.id());
            assert!(cfg.thresholds.down < cfg.thresholds.up, "{}", cfg.id);
            assert!(!cfg.instructions.is_empty());
        }
    }
}
