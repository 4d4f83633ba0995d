use std::collections::BTreeMap;

use super::{
    classify_by_hysteresis, joint_angle, mean_of_sides, Chain, DetectionResult, ExerciseConfig,
    FormLimit, Thresholds, GOOD_FORM,
};
use crate::geometry::{deviation_from_vertical, is_valid_landmark, MIN_CONFIDENCE};
use crate::pose::{KeypointIndex, Pose};

pub const ID: &str = "bicep_curl";

/// 肘を曲げきった状態が Down、伸ばしきって戻ると1レップ
pub const THRESHOLDS: Thresholds = Thresholds { down: 50.0, up: 150.0 };

pub const ELBOWS_IN: &str = "Keep your elbows at your sides";
pub const NO_SWING: &str = "Don't swing your body";

pub const UPPER_ARM_DEVIATION_ABOVE: f32 = 30.0;
pub const TORSO_DEVIATION_ABOVE: f32 = 20.0;

pub const FORM_LIMITS: &[FormLimit] = &[
    FormLimit { key: "upper_arm_deviation_above", degrees: UPPER_ARM_DEVIATION_ABOVE, message: ELBOWS_IN },
    FormLimit { key: "torso_deviation_above", degrees: TORSO_DEVIATION_ABOVE, message: NO_SWING },
];

const INSTRUCTIONS: &[&str] = &[
    "Face the camera with your arms fully visible",
    "Keep your upper arms still and close to your body",
    "Curl until your elbows pass 50 degrees, then lower all the way",
];

const LEFT_ARM: Chain = [KeypointIndex::LeftShoulder, KeypointIndex::LeftElbow, KeypointIndex::LeftWrist];
const RIGHT_ARM: Chain = [KeypointIndex::RightShoulder, KeypointIndex::RightElbow, KeypointIndex::RightWrist];

pub fn config() -> ExerciseConfig {
    ExerciseConfig {
        id: ID,
        display_name: "Bicep curl",
        detect,
        classify_position: classify_by_hysteresis,
        thresholds: THRESHOLDS,
        form_limits: FORM_LIMITS,
        instructions: INSTRUCTIONS,
    }
}

fn segment_deviation(pose: &Pose, top: KeypointIndex, bottom: KeypointIndex) -> Option<f32> {
    let (t, b) = (pose.get(top), pose.get(bottom));
    if !is_valid_landmark(t, MIN_CONFIDENCE) || !is_valid_landmark(b, MIN_CONFIDENCE) {
        return None;
    }
    Some(deviation_from_vertical(t?, b?))
}

pub fn detect(pose: &Pose) -> Option<DetectionResult> {
    use KeypointIndex::*;

    let left_elbow = joint_angle(pose, LEFT_ARM);
    let right_elbow = joint_angle(pose, RIGHT_ARM);
    let elbow = mean_of_sides(left_elbow, right_elbow)?;

    let upper_arm = mean_of_sides(
        segment_deviation(pose, LeftShoulder, LeftElbow),
        segment_deviation(pose, RightShoulder, RightElbow),
    );
    let torso = mean_of_sides(
        segment_deviation(pose, LeftShoulder, LeftHip),
        segment_deviation(pose, RightShoulder, RightHip),
    );

    let feedback = match (upper_arm, torso) {
        (Some(a), _) if a > UPPER_ARM_DEVIATION_ABOVE => ELBOWS_IN,
        (_, Some(t)) if t > TORSO_DEVIATION_ABOVE => NO_SWING,
        _ => GOOD_FORM,
    };

    let mut data = BTreeMap::new();
    data.insert("left_elbow", left_elbow);
    data.insert("right_elbow", right_elbow);
    data.insert("upper_arm_deviation", upper_arm);
    data.insert("torso_deviation", torso);

    Some(DetectionResult {
        angle: elbow,
        feedback: Some(feedback),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercise::test_util::make_pose;
    use KeypointIndex::*;

    fn arm_pose(shoulder: (f32, f32), elbow: (f32, f32), wrist: (f32, f32)) -> Pose {
        make_pose(&[
            (LeftShoulder, shoulder.0, shoulder.1),
            (LeftElbow, elbow.0, elbow.1),
            (LeftWrist, wrist.0, wrist.1),
            (LeftHip, 0.4, 0.7),
        ])
    }

    #[test]
    fn test_arm_extended() {
        let result = detect(&arm_pose((0.4, 0.3), (0.4, 0.5), (0.4, 0.7))).unwrap();
        assert!((result.angle - 180.0).abs() < 0.5);
        assert_eq!(result.feedback, Some(GOOD_FORM));
    }

    #[test]
    fn test_arm_curled() {
        let result = detect(&arm_pose((0.4, 0.3), (0.4, 0.5), (0.45, 0.35))).unwrap();
        assert!(result.angle < THRESHOLDS.down, "angle {}", result.angle);
        assert_eq!(result.feedback, Some(GOOD_FORM));
    }

    #[test]
    fn test_elbow_drifting_forward() {
        let result = detect(&arm_pose((0.4, 0.3), (0.55, 0.45), (0.55, 0.65))).unwrap();
        assert_eq!(result.feedback, Some(ELBOWS_IN));
    }

    #[test]
    fn test_body_swing() {
        let result = detect(&arm_pose((0.6, 0.3), (0.6, 0.5), (0.6, 0.7))).unwrap();
        assert!(result.data["torso_deviation"].unwrap() > TORSO_DEVIATION_ABOVE);
        assert_eq!(result.feedback, Some(NO_SWING));
    }

    #[test]
    fn test_no_arm_returns_none() {
        let pose = make_pose(&[(LeftShoulder, 0.4, 0.3), (LeftHip, 0.4, 0.7)]);
        assert!(detect(&pose).is_none());
    }
}
