use std::collections::BTreeMap;

use super::{
    classify_by_hysteresis, joint_angle, mean_of_sides, Chain, DetectionResult, ExerciseConfig,
    FormLimit, Thresholds, GOOD_FORM,
};
use crate::geometry::{deviation_from_vertical, is_valid_landmark, MIN_CONFIDENCE};
use crate::pose::{KeypointIndex, Pose};

pub const ID: &str = "squat";

pub const THRESHOLDS: Thresholds = Thresholds { down: 100.0, up: 160.0 };

pub const CHEST_UP: &str = "Keep your chest up";
pub const TOO_DEEP: &str = "Too deep, ease off at the bottom";

/// 肩→腰の線分が鉛直から何度傾いてよいか
pub const BACK_DEVIATION_ABOVE: f32 = 45.0;
pub const KNEE_TOO_DEEP_BELOW: f32 = 50.0;

pub const FORM_LIMITS: &[FormLimit] = &[
    FormLimit { key: "back_deviation_above", degrees: BACK_DEVIATION_ABOVE, message: CHEST_UP },
    FormLimit { key: "knee_too_deep_below", degrees: KNEE_TOO_DEEP_BELOW, message: TOO_DEEP },
];

const INSTRUCTIONS: &[&str] = &[
    "Stand side-on to the camera with your whole body in view",
    "Feet shoulder-width apart, keep your heels on the floor",
    "Sit back until your knees pass 100 degrees, then stand up fully",
];

const LEFT_LEG: Chain = [KeypointIndex::LeftHip, KeypointIndex::LeftKnee, KeypointIndex::LeftAnkle];
const RIGHT_LEG: Chain = [KeypointIndex::RightHip, KeypointIndex::RightKnee, KeypointIndex::RightAnkle];

pub fn config() -> ExerciseConfig {
    ExerciseConfig {
        id: ID,
        display_name: "Squat",
        detect,
        classify_position: classify_by_hysteresis,
        thresholds: THRESHOLDS,
        form_limits: FORM_LIMITS,
        instructions: INSTRUCTIONS,
    }
}

fn back_deviation(pose: &Pose, shoulder: KeypointIndex, hip: KeypointIndex) -> Option<f32> {
    let (s, h) = (pose.get(shoulder), pose.get(hip));
    if !is_valid_landmark(s, MIN_CONFIDENCE) || !is_valid_landmark(h, MIN_CONFIDENCE) {
        return None;
    }
    Some(deviation_from_vertical(s?, h?))
}

pub fn detect(pose: &Pose) -> Option<DetectionResult> {
    let left_knee = joint_angle(pose, LEFT_LEG);
    let right_knee = joint_angle(pose, RIGHT_LEG);
    let knee = mean_of_sides(left_knee, right_knee)?;

    let back = mean_of_sides(
        back_deviation(pose, KeypointIndex::LeftShoulder, KeypointIndex::LeftHip),
        back_deviation(pose, KeypointIndex::RightShoulder, KeypointIndex::RightHip),
    );

    let feedback = match back {
        Some(b) if b > BACK_DEVIATION_ABOVE => CHEST_UP,
        _ if knee < KNEE_TOO_DEEP_BELOW => TOO_DEEP,
        _ => GOOD_FORM,
    };

    let mut data = BTreeMap::new();
    data.insert("left_knee", left_knee);
    data.insert("right_knee", right_knee);
    data.insert("back_deviation", back);

    Some(DetectionResult {
        angle: knee,
        feedback: Some(feedback),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercise::test_util::{make_pose, with_confidence};
    use KeypointIndex::*;

    fn side_pose(shoulder: (f32, f32), hip: (f32, f32)) -> Pose {
        make_pose(&[
            (LeftShoulder, shoulder.0, shoulder.1),
            (LeftHip, hip.0, hip.1),
            (LeftKnee, 0.5, 0.7),
            (LeftAnkle, 0.5, 0.9),
        ])
    }

    #[test]
    fn test_standing() {
        let result = detect(&side_pose((0.5, 0.2), (0.5, 0.5))).unwrap();
        assert!((result.angle - 180.0).abs() < 0.5, "angle {}", result.angle);
        assert_eq!(result.feedback, Some(GOOD_FORM));
        assert!(result.data["back_deviation"].unwrap() < 1.0);
    }

    #[test]
    fn test_parallel_squat() {
        let result = detect(&side_pose((0.4, 0.45), (0.3, 0.7))).unwrap();
        assert!((result.angle - 90.0).abs() < 0.5, "angle {}", result.angle);
        assert_eq!(result.feedback, Some(GOOD_FORM));
    }

    #[test]
    fn test_leaning_forward() {
        let result = detect(&side_pose((0.6, 0.6), (0.3, 0.7))).unwrap();
        assert!(result.data["back_deviation"].unwrap() > BACK_DEVIATION_ABOVE);
        assert_eq!(result.feedback, Some(CHEST_UP));
    }

    #[test]
    fn test_too_deep() {
        let result = detect(&side_pose((0.45, 0.6), (0.4, 0.85))).unwrap();
        assert!(result.angle < KNEE_TOO_DEEP_BELOW, "angle {}", result.angle);
        assert_eq!(result.feedback, Some(TOO_DEEP));
    }

    #[test]
    fn test_missing_knee_returns_none() {
        let pose = with_confidence(side_pose((0.5, 0.2), (0.5, 0.5)), LeftKnee, 0.2);
        assert!(detect(&pose).is_none());
    }

    #[test]
    fn test_missing_shoulder_still_counts() {
        let pose = with_confidence(side_pose((0.6, 0.6), (0.3, 0.7)), LeftShoulder, 0.0);
        let result = detect(&pose).unwrap();
        assert_eq!(result.data["back_deviation"], None);
        assert_eq!(result.feedback, Some(GOOD_FORM));
    }
}
