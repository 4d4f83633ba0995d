use log::debug;
use std::collections::BTreeMap;

use crate::exercise::{DetectionResult, ExerciseConfig, Position};

/// カウンタの状態。遷移関数 (`RepCounter::observe_angle`) からのみ変更される
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CounterState {
    pub position: Position,
    pub last_angle: Option<f32>,
    pub rep_count: u32,
}

/// 1フレーム処理した結果（UI層へ渡す）
#[derive(Debug, Clone, PartialEq)]
pub struct FrameUpdate {
    pub angle: f32,
    pub position: Position,
    pub feedback: Option<&'static str>,
    pub rep_count: u32,
    /// このフレームで Down→Up が成立したか
    pub rep_completed: bool,
    pub data: BTreeMap<&'static str, Option<f32>>,
}

/// up/down 状態機械とレップ数
///
/// 種目に依存しない。姿勢の判定は `ExerciseConfig::classify` に委ね、
/// カウントは「直前が Down で新しい姿勢が Up」のときだけ行う。
#[derive(Debug, Clone, Default)]
pub struct RepCounter {
    state: CounterState,
}

impl RepCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &CounterState {
        &self.state
    }

    pub fn rep_count(&self) -> u32 {
        self.state.rep_count
    }

    pub fn position(&self) -> Position {
        self.state.position
    }

    /// 角度を1つ取り込み、新しい姿勢とレップ成立の有無を返す
    pub fn observe_angle(&mut self, config: &ExerciseConfig, angle: f32) -> (Position, bool) {
        let previous = self.state.position;
        let next = config.classify(angle, previous);
        let completed = previous == Position::Down && next == Position::Up;

        self.state.last_angle = Some(angle);
        self.state.position = next;
        if completed {
            self.state.rep_count += 1;
            debug!("{}: rep {} (angle {:.1})", config.id, self.state.rep_count, angle);
        }
        (next, completed)
    }

    /// 検出結果を反映して UI 向けの更新を作る
    pub fn apply(&mut self, config: &ExerciseConfig, detection: DetectionResult) -> FrameUpdate {
        let (position, rep_completed) = self.observe_angle(config, detection.angle);
        FrameUpdate {
            angle: detection.angle,
            position,
            feedback: detection.feedback,
            rep_count: self.state.rep_count,
            rep_completed,
            data: detection.data,
        }
    }

    pub fn reset(&mut self) {
        self.state = CounterState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercise::{pushup, squat};

    fn feed(counter: &mut RepCounter, config: &ExerciseConfig, angles: &[f32]) -> Vec<Position> {
        angles.iter().map(|&a| counter.observe_angle(config, a).0).collect()
    }

    #[test]
    fn test_initial_state() {
        let counter = RepCounter::new();
        assert_eq!(
            *counter.state(),
            CounterState { position: Position::Unknown, last_angle: None, rep_count: 0 }
        );
    }

    #[test]
    fn test_pushup_sequence() {
        let config = pushup::config();
        let mut counter = RepCounter::new();
        let positions = feed(&mut counter, &config, &[170.0, 150.0, 80.0, 85.0, 170.0]);
        assert_eq!(
            positions,
            vec![Position::Up, Position::Up, Position::Down, Position::Down, Position::Up]
        );
        assert_eq!(counter.rep_count(), 1);
        assert_eq!(counter.state().last_angle, Some(170.0));
    }

    #[test]
    fn test_squat_sequence() {
        let config = squat::config();
        let mut counter = RepCounter::new();
        feed(&mut counter, &config, &[170.0, 95.0, 170.0, 95.0, 170.0]);
        assert_eq!(counter.rep_count(), 2);
    }

    #[test]
    fn test_one_rep_per_cycle() {
        let config = squat::config();
        let mut counter = RepCounter::new();
        let down: Vec<f32> = (0..=10).map(|i| 175.0 - i as f32 * 10.0).collect(); // 175..75
        let up: Vec<f32> = down.iter().rev().copied().collect();

        for cycle in 1..=3 {
            feed(&mut counter, &config, &down);
            // 下で留まってもカウントしない
            feed(&mut counter, &config, &[70.0, 72.0, 68.0]);
            assert_eq!(counter.rep_count(), cycle - 1);
            feed(&mut counter, &config, &up);
            // 上で留まってもカウントしない
            feed(&mut counter, &config, &[175.0, 178.0, 170.0]);
            assert_eq!(counter.rep_count(), cycle);
        }
    }

    #[test]
    fn test_band_only_never_changes() {
        let config = pushup::config();
        let mut counter = RepCounter::new();
        let positions = feed(&mut counter, &config, &[90.0, 120.0, 160.0, 100.0, 155.0]);
        assert!(positions.iter().all(|p| *p == Position::Unknown));
        assert_eq!(counter.rep_count(), 0);
    }

    #[test]
    fn test_unknown_to_up_and_up_to_down_do_not_count() {
        let config = pushup::config();
        let mut counter = RepCounter::new();
        let (pos, completed) = counter.observe_angle(&config, 170.0);
        assert_eq!((pos, completed), (Position::Up, false));
        let (pos, completed) = counter.observe_angle(&config, 60.0);
        assert_eq!((pos, completed), (Position::Down, false));
        assert_eq!(counter.rep_count(), 0);
        let (_, completed) = counter.observe_angle(&config, 170.0);
        assert!(completed);
    }

    #[test]
    fn test_reset() {
        let config = squat::config();
        let mut counter = RepCounter::new();
        feed(&mut counter, &config, &[170.0, 95.0, 170.0, 95.0]);
        counter.reset();
        assert_eq!(*counter.state(), CounterState::default());
        assert_eq!(counter.position(), Position::Unknown);
        counter.reset();
        assert_eq!(*counter.state(), CounterState::default());
    }

    #[test]
    fn test_apply_carries_detection() {
        let config = pushup::config();
        let mut counter = RepCounter::new();
        let mut data = BTreeMap::new();
        data.insert("left_elbow", Some(80.0));
        let update = counter.apply(
            &config,
            DetectionResult { angle: 80.0, feedback: Some("Good form"), data },
        );
        assert_eq!(update.position, Position::Down);
        assert_eq!(update.feedback, Some("Good form"));
        assert_eq!(update.data["left_elbow"], Some(80.0));
        assert!(!update.rep_completed);
    }
}
