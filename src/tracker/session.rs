use log::info;

use super::counter::{CounterState, FrameUpdate, RepCounter};
use crate::error::RegistryError;
use crate::exercise::{ExerciseConfig, ExerciseRegistry, ExerciseSummary};
use crate::pose::Pose;

/// 選択中の種目とカウンタを束ねたセッション
///
/// 種目を切り替えると、新しいフレームを受け付ける前にカウンタをリセットする。
#[derive(Debug, Clone)]
pub struct ExerciseSession {
    registry: ExerciseRegistry,
    exercise_id: &'static str,
    counter: RepCounter,
}

impl ExerciseSession {
    pub fn new(registry: ExerciseRegistry, exercise_id: &str) -> Result<Self, RegistryError> {
        let id = Self::resolve(&registry, exercise_id)?;
        Ok(Self {
            registry,
            exercise_id: id,
            counter: RepCounter::new(),
        })
    }

    fn resolve(registry: &ExerciseRegistry, id: &str) -> Result<&'static str, RegistryError> {
        registry
            .get(id)
            .map(|c| c.id)
            .ok_or_else(|| RegistryError::UnknownExercise(id.to_string()))
    }

    pub fn select_exercise(&mut self, exercise_id: &str) -> Result<(), RegistryError> {
        let id = Self::resolve(&self.registry, exercise_id)?;
        self.counter.reset();
        if id != self.exercise_id {
            info!("exercise: {} -> {}", self.exercise_id, id);
        }
        self.exercise_id = id;
        Ok(())
    }

    /// 次の種目へ（登録順で循環）
    pub fn next_exercise(&mut self) -> &'static str {
        let ids: Vec<_> = self.registry.ids().collect();
        let current = ids.iter().position(|id| *id == self.exercise_id).unwrap_or(0);
        let next = ids[(current + 1) % ids.len()];
        self.counter.reset();
        info!("exercise: {} -> {}", self.exercise_id, next);
        self.exercise_id = next;
        next
    }

    /// 検出に失敗したフレームは None を返し、状態は変わらない
    pub fn process(&mut self, pose: &Pose) -> Result<Option<FrameUpdate>, RegistryError> {
        let detection = match self.registry.detect(self.exercise_id, pose)? {
            Some(d) => d,
            None => return Ok(None),
        };
        let config = self
            .registry
            .get(self.exercise_id)
            .ok_or_else(|| RegistryError::UnknownExercise(self.exercise_id.to_string()))?;
        Ok(Some(self.counter.apply(config, detection)))
    }

    pub fn reset(&mut self) {
        self.counter.reset();
    }

    pub fn exercise_id(&self) -> &'static str {
        self.exercise_id
    }

    pub fn exercise(&self) -> Option<&ExerciseConfig> {
        self.registry.get(self.exercise_id)
    }

    pub fn state(&self) -> &CounterState {
        self.counter.state()
    }

    pub fn rep_count(&self) -> u32 {
        self.counter.rep_count()
    }

    pub fn list_exercises(&self) -> Vec<ExerciseSummary> {
        self.registry.list_exercises()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercise::Position;
    use crate::pose::{Keypoint, KeypointIndex};

    /// 膝角度がほぼ指定値になる横向きの脚
    fn leg_pose(knee_angle_deg: f32) -> Pose {
        let mut pose = Pose::default();
        let (knee_x, knee_y) = (0.5, 0.7);
        let rad = (90.0 + knee_angle_deg).to_radians();
        pose.set(KeypointIndex::LeftKnee, Keypoint::new(knee_x, knee_y, 0.9));
        pose.set(KeypointIndex::LeftAnkle, Keypoint::new(knee_x, knee_y + 0.2, 0.9));
        pose.set(
            KeypointIndex::LeftHip,
            Keypoint::new(knee_x + 0.2 * rad.cos(), knee_y + 0.2 * rad.sin(), 0.9),
        );
        pose
    }

    fn squat_session() -> ExerciseSession {
        ExerciseSession::new(ExerciseRegistry::builtin(), "squat").unwrap()
    }

    #[test]
    fn test_leg_pose_angle() {
        let registry = ExerciseRegistry::builtin();
        for target in [60.0, 95.0, 170.0] {
            let result = registry.detect("squat", &leg_pose(target)).unwrap().unwrap();
            assert!((result.angle - target).abs() < 0.5, "{} vs {}", result.angle, target);
        }
    }

    #[test]
    fn test_process_counts_reps() {
        let mut session = squat_session();
        for angle in [170.0, 95.0, 170.0, 95.0, 170.0] {
            session.process(&leg_pose(angle)).unwrap().unwrap();
        }
        assert_eq!(session.rep_count(), 2);
    }

    #[test]
    fn test_low_confidence_frame_leaves_state() {
        let mut session = squat_session();
        session.process(&leg_pose(95.0)).unwrap();
        let before = *session.state();

        let mut weak = leg_pose(170.0);
        weak.keypoints[KeypointIndex::LeftKnee as usize] = Some(Keypoint::new(0.5, 0.7, 0.2));
        assert_eq!(session.process(&weak).unwrap(), None);
        assert_eq!(*session.state(), before);
        assert_eq!(session.state().position, Position::Down);
    }

    #[test]
    fn test_select_exercise_resets() {
        let mut session = squat_session();
        for angle in [170.0, 95.0, 170.0] {
            session.process(&leg_pose(angle)).unwrap();
        }
        assert_eq!(session.rep_count(), 1);

        session.select_exercise("pushup").unwrap();
        assert_eq!(session.exercise_id(), "pushup");
        assert_eq!(*session.state(), CounterState::default());
    }

    #[test]
    fn test_select_unknown_keeps_session() {
        let mut session = squat_session();
        session.process(&leg_pose(95.0)).unwrap();
        let err = session.select_exercise("burpee").unwrap_err();
        assert_eq!(err, RegistryError::UnknownExercise("burpee".to_string()));
        assert_eq!(session.exercise_id(), "squat");
        assert_eq!(session.state().position, Position::Down);
    }

    #[test]
    fn test_new_with_unknown_exercise() {
        assert!(ExerciseSession::new(ExerciseRegistry::builtin(), "burpee").is_err());
    }

    #[test]
    fn test_next_exercise_cycles() {
        let mut session = squat_session();
        assert_eq!(session.next_exercise(), "bicep_curl");
        assert_eq!(session.next_exercise(), "pushup");
        assert_eq!(session.next_exercise(), "squat");
    }
}
