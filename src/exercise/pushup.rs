use std::collections::BTreeMap;

use super::{
    classify_by_hysteresis, joint_angle, mean_of_sides, Chain, DetectionResult, ExerciseConfig,
    FormLimit, Thresholds, GOOD_FORM,
};
use crate::geometry::{all_valid, line_side_angle, MIN_CONFIDENCE};
use crate::pose::{KeypointIndex, Pose};

pub const ID: &str = "pushup";

pub const THRESHOLDS: Thresholds = Thresholds { down: 90.0, up: 160.0 };

pub const SAGGING: &str = "Lower body is sagging, tighten your core";
pub const HIPS_TOO_HIGH: &str = "Hips are too high, straighten your body";
pub const OVERBEND: &str = "Don't overbend your elbows";

/// 体幹ライン (肩-腰-足首)。180 で一直線、下回ると腰が落ち、上回ると腰が上がっている
pub const BODY_SAG_BELOW: f32 = 150.0;
pub const BODY_PIKE_ABOVE: f32 = 200.0;
pub const ELBOW_OVERBEND_BELOW: f32 = 40.0;

pub const FORM_LIMITS: &[FormLimit] = &[
    FormLimit { key: "body_sag_below", degrees: BODY_SAG_BELOW, message: SAGGING },
    FormLimit { key: "body_pike_above", degrees: BODY_PIKE_ABOVE, message: HIPS_TOO_HIGH },
    FormLimit { key: "elbow_overbend_below", degrees: ELBOW_OVERBEND_BELOW, message: OVERBEND },
];

const INSTRUCTIONS: &[&str] = &[
    "Place the camera at floor level, side-on to your body",
    "Keep your body in a straight line from shoulders to ankles",
    "Lower until your elbows pass 90 degrees, then push back up",
];

const LEFT_ARM: Chain = [KeypointIndex::LeftShoulder, KeypointIndex::LeftElbow, KeypointIndex::LeftWrist];
const RIGHT_ARM: Chain = [KeypointIndex::RightShoulder, KeypointIndex::RightElbow, KeypointIndex::RightWrist];
const LEFT_BODY: Chain = [KeypointIndex::LeftShoulder, KeypointIndex::LeftHip, KeypointIndex::LeftAnkle];
const RIGHT_BODY: Chain = [KeypointIndex::RightShoulder, KeypointIndex::RightHip, KeypointIndex::RightAnkle];

pub fn config() -> ExerciseConfig {
    ExerciseConfig {
        id: ID,
        display_name: "Push-up",
        detect,
        classify_position: classify_by_hysteresis,
        thresholds: THRESHOLDS,
        form_limits: FORM_LIMITS,
        instructions: INSTRUCTIONS,
    }
}

/// 体幹ラインの角度 [0, 360)
fn body_line(pose: &Pose, chain: Chain) -> Option<f32> {
    let [a, b, c] = chain.map(|idx| pose.get(idx));
    if !all_valid(&[a, b, c], MIN_CONFIDENCE) {
        return None;
    }
    Some(line_side_angle(a?, b?, c?))
}

pub fn detect(pose: &Pose) -> Option<DetectionResult> {
    let left_elbow = joint_angle(pose, LEFT_ARM);
    let right_elbow = joint_angle(pose, RIGHT_ARM);
    let elbow = mean_of_sides(left_elbow, right_elbow)?;

    let body = mean_of_sides(body_line(pose, LEFT_BODY), body_line(pose, RIGHT_BODY));

    let mut data = BTreeMap::new();
    data.insert("left_elbow", left_elbow);
    data.insert("right_elbow", right_elbow);
    data.insert("body_alignment", body);

    Some(DetectionResult {
        angle: elbow,
        feedback: Some(feedback(elbow, body)),
        data,
    })
}

fn feedback(elbow: f32, body: Option<f32>) -> &'static str {
    match body {
        Some(b) if b < BODY_SAG_BELOW => SAGGING,
        Some(b) if b > BODY_PIKE_ABOVE => HIPS_TOO_HIGH,
        _ if elbow < ELBOW_OVERBEND_BELOW => OVERBEND,
        _ => GOOD_FORM,
    }
}
