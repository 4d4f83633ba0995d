use anyhow::{bail, Context, Result};
use ndarray::{Array4, ArrayViewD};
use opencv::{
    core::{Mat, Size, Vec3b},
    imgproc,
    prelude::*,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

use super::estimator::PoseEstimator;
use super::keypoint::{Keypoint, KeypointIndex, Pose};

/// MoveNet の入力サイズ
pub const INPUT_SIZE: i32 = 192;

/// これ未満の平均信頼度は「人がいない」とみなす
const DEFAULT_MIN_POSE_SCORE: f32 = 0.1;

/// MoveNet (SinglePose Lightning) を使用した姿勢推定器
pub struct MoveNetEstimator {
    session: Session,
    min_pose_score: f32,
}

impl MoveNetEstimator {
    /// ONNXモデルを読み込んで初期化
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path.as_ref())
            .with_context(|| format!("Failed to load ONNX model: {}", model_path.as_ref().display()))?;

        Ok(Self { session, min_pose_score: DEFAULT_MIN_POSE_SCORE })
    }

    pub fn with_min_pose_score(mut self, score: f32) -> Self {
        self.min_pose_score = score;
        self
    }

    /// 入力: [1, 192, 192, 3] の f32 テンソル (RGB, 0.0-255.0)
    pub fn infer(&mut self, input: Array4<f32>) -> Result<Pose> {
        let input_tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs!["serving_default_input_0" => input_tensor])
            .context("Inference failed")?;

        let output: ArrayViewD<f32> = outputs["StatefulPartitionedCall_0"]
            .try_extract_array()
            .context("Failed to extract output tensor")?;
        decode(&output)
    }
}

/// BGR フレームを 192x192 の RGB テンソルへ（アスペクト比は保持しない）
pub fn to_input_tensor(frame: &Mat) -> Result<Array4<f32>> {
    let mut resized = Mat::default();
    imgproc::resize(
        frame,
        &mut resized,
        Size::new(INPUT_SIZE, INPUT_SIZE),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;

    let pixels = resized.data_typed::<Vec3b>()?;
    let size = INPUT_SIZE as usize;
    let mut data = Vec::with_capacity(size * size * 3);
    for px in pixels {
        // BGR -> RGB
        data.extend([px[2] as f32, px[1] as f32, px[0] as f32]);
    }
    Ok(Array4::from_shape_vec((1, size, size, 3), data)?)
}

/// 出力 [1, 1, 17, 3] (y, x, confidence) を Pose へ
pub fn decode(output: &ArrayViewD<f32>) -> Result<Pose> {
    if output.shape() != [1, 1, KeypointIndex::COUNT, 3] {
        bail!("Unexpected MoveNet output shape {:?}", output.shape());
    }
    let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
    for (i, kp) in keypoints.iter_mut().enumerate() {
        let y = output[[0, 0, i, 0]];
        let x = output[[0, 0, i, 1]];
        *kp = Keypoint::new(x, y, output[[0, 0, i, 2]]);
    }
    Ok(Pose::new(keypoints))
}

impl PoseEstimator<Mat> for MoveNetEstimator {
    fn estimate(&mut self, frame: &Mat) -> Result<Vec<Pose>> {
        let pose = self.infer(to_input_tensor(frame)?)?;
        if pose.average_confidence() < self.min_pose_score {
            return Ok(Vec::new());
        }
        Ok(vec![pose])
    }
}
