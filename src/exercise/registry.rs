use log::debug;

use super::{DetectionResult, ExerciseConfig, ExerciseKind, ExerciseSummary};
use crate::error::RegistryError;
use crate::pose::Pose;

/// 種目ID → 検出器の対応表。登録順を保持する
#[derive(Debug, Clone, Default)]
pub struct ExerciseRegistry {
    exercises: Vec<ExerciseConfig>,
}

impl ExerciseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 組み込み種目をすべて登録済みのレジストリ
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for kind in ExerciseKind::ALL {
            let registered = registry.register(kind.config());
            debug_assert!(registered.is_ok(), "built-in exercise ids must be unique: {:?}", registered);
        }
        registry
    }

    pub fn register(&mut self, config: ExerciseConfig) -> Result<(), RegistryError> {
        if self.get(config.id).is_some() {
            return Err(RegistryError::DuplicateId(config.id.to_string()));
        }
        debug!("registered exercise '{}'", config.id);
        self.exercises.push(config);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ExerciseConfig> {
        self.exercises.iter().find(|e| e.id == id)
    }

    /// 検出器の結果（None を含む）をそのまま返す
    pub fn detect(&self, id: &str, pose: &Pose) -> Result<Option<DetectionResult>, RegistryError> {
        let config = self
            .get(id)
            .ok_or_else(|| RegistryError::UnknownExercise(id.to_string()))?;
        Ok(config.detect(pose))
    }

    pub fn list_exercises(&self) -> Vec<ExerciseSummary> {
        self.exercises.iter().map(ExerciseConfig::summary).collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.exercises.iter().map(|e| e.id)
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercise::{pushup, squat};

    #[test]
    fn test_builtin_catalog() {
        let registry = ExerciseRegistry::builtin();
        assert_eq!(registry.len(), ExerciseKind::ALL.len());
        let ids: Vec<_> = registry.ids().collect();
        assert_eq!(ids, vec!["pushup", "squat", "bicep_curl"]);

        let catalog = registry.list_exercises();
        assert_eq!(catalog[0].display_name, "Push-up");
        assert_eq!(catalog[0].thresholds.down, 90.0);
        assert_eq!(catalog[0].form_limits["body_pike_above"], 200.0);
        assert_eq!(catalog[1].thresholds.up, 160.0);
        assert!(!catalog[1].instructions.is_empty());
    }

    #[test]
    fn test_register_duplicate_fails() {
        let mut registry = ExerciseRegistry::new();
        registry.register(pushup::config()).unwrap();
        assert_eq!(
            registry.register(pushup::config()),
            Err(RegistryError::DuplicateId("pushup".to_string()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_unknown() {
        let registry = ExerciseRegistry::builtin();
        assert!(registry.get("burpee").is_none());
        assert_eq!(registry.get("squat").unwrap().id, squat::ID);
    }

    #[test]
    fn test_detect_unknown_exercise() {
        let registry = ExerciseRegistry::new();
        let result = registry.detect("pushup", &Pose::default());
        assert_eq!(result, Err(RegistryError::UnknownExercise("pushup".to_string())));
    }

    #[test]
    fn test_detect_forwards_none() {
        let registry = ExerciseRegistry::builtin();
        assert_eq!(registry.detect("squat", &Pose::default()), Ok(None));
    }
}
