/// MoveNet の 17 キーポイントインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum KeypointIndex {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl KeypointIndex {
    pub const COUNT: usize = 17;
}

/// 単一キーポイント。推定器は正規化座標で返す
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Keypoint {
    /// X座標 (正規化なら 0.0〜1.0)
    pub x: f32,
    /// Y座標 (下向きが正)
    pub y: f32,
    /// 信頼度スコア (0.0〜1.0)
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    /// 信頼度が閾値以上か
    pub fn is_valid(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }

    /// ピクセル座標に変換
    pub fn to_pixel(&self, width: u32, height: u32) -> (i32, i32) {
        let px = (self.x * width as f32) as i32;
        let py = (self.y * height as f32) as i32;
        (px, py)
    }
}

/// 17キーポイントからなる姿勢。推定器が返さなかった点は None
#[derive(Debug, Clone, Default)]
pub struct Pose {
    pub keypoints: [Option<Keypoint>; KeypointIndex::COUNT],
}

impl Pose {
    pub fn new(keypoints: [Keypoint; KeypointIndex::COUNT]) -> Self {
        Self {
            keypoints: keypoints.map(Some),
        }
    }

    /// インデックスでキーポイントを取得
    pub fn get(&self, index: KeypointIndex) -> Option<&Keypoint> {
        self.keypoints[index as usize].as_ref()
    }

    pub fn set(&mut self, index: KeypointIndex, keypoint: Keypoint) {
        self.keypoints[index as usize] = Some(keypoint);
    }

    /// 正規化座標をピクセル座標に引き伸ばした Pose
    ///
    /// 角度は縦横の縮尺が揃った空間で測る必要がある。
    pub fn to_pixel_space(&self, width: u32, height: u32) -> Pose {
        let (w, h) = (width as f32, height as f32);
        Pose {
            keypoints: self
                .keypoints
                .map(|kp| kp.map(|k| Keypoint::new(k.x * w, k.y * h, k.confidence))),
        }
    }

    /// 全キーポイントの平均信頼度（欠損は0扱い）
    pub fn average_confidence(&self) -> f32 {
        let sum: f32 = self.keypoints.iter().flatten().map(|k| k.confidence).sum();
        sum / KeypointIndex::COUNT as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypoint_index_count() {
        assert_eq!(KeypointIndex::COUNT, 17);
        assert_eq!(KeypointIndex::RightAnkle as usize, KeypointIndex::COUNT - 1);
    }

    #[test]
    fn test_keypoint_is_valid() {
        let kp = Keypoint::new(0.5, 0.5, 0.7);
        assert!(kp.is_valid(0.5));
        assert!(!kp.is_valid(0.8));
    }

    #[test]
    fn test_keypoint_to_pixel() {
        let kp = Keypoint::new(0.5, 0.25, 1.0);
        assert_eq!(kp.to_pixel(640, 480), (320, 120));
    }

    #[test]
    fn test_pose_to_pixel_space() {
        let mut pose = Pose::default();
        pose.set(KeypointIndex::LeftKnee, Keypoint::new(0.5, 0.25, 0.8));
        let scaled = pose.to_pixel_space(640, 480);
        assert_eq!(scaled.get(KeypointIndex::LeftKnee), Some(&Keypoint::new(320.0, 120.0, 0.8)));
        assert!(scaled.get(KeypointIndex::Nose).is_none());
    }

    #[test]
    fn test_pose_average_confidence() {
        let pose = Pose::new([Keypoint::new(0.0, 0.0, 0.5); KeypointIndex::COUNT]);
        assert!((pose.average_confidence() - 0.5).abs() < 0.001);
    }
}
