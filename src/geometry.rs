//! 関節角度の計算と信頼度チェック
//!
//! 座標は画像座標系（x右、y下が正）。角度はすべて度。

use crate::pose::Keypoint;

/// ランドマークを有効とみなす最小信頼度
pub const MIN_CONFIDENCE: f32 = 0.3;

/// 頂点 `b` で `b→a` と `b→c` がなす角度 [0, 180]
///
/// `a` または `c` が `b` と一致する場合は未定義（呼び出し側で避ける）。
pub fn angle_between(a: &Keypoint, b: &Keypoint, c: &Keypoint) -> f32 {
    let radians = (c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x);
    let mut angle = radians.abs().to_degrees();
    if angle > 180.0 {
        angle = 360.0 - angle;
    }
    angle
}

/// `angle_between` を [0, 360) に拡張したもの
///
/// `b` が直線 `a–c` より上（画像上でyが小さい側）にあれば 180 を超える。
/// 直線が鉛直の場合は上下が定まらないので `angle_between` と同じ値を返す。
pub fn line_side_angle(a: &Keypoint, b: &Keypoint, c: &Keypoint) -> f32 {
    let base = angle_between(a, b, c);
    let (left, right) = if a.x <= c.x { (a, c) } else { (c, a) };
    let dx = right.x - left.x;
    if dx.abs() < f32::EPSILON {
        return base;
    }
    let cross = dx * (b.y - left.y) - (right.y - left.y) * (b.x - left.x);
    if cross < 0.0 {
        360.0 - base
    } else {
        base
    }
}

/// 線分 `bottom→top` と画像上の鉛直上向きとのなす角 [0, 180]
pub fn deviation_from_vertical(top: &Keypoint, bottom: &Keypoint) -> f32 {
    let dx = top.x - bottom.x;
    let dy = top.y - bottom.y;
    if dx == 0.0 && dy == 0.0 {
        return 0.0;
    }
    dx.abs().atan2(-dy).to_degrees()
}

/// ランドマークが存在し、信頼度が閾値以上か
pub fn is_valid_landmark(landmark: Option<&Keypoint>, min_confidence: f32) -> bool {
    landmark.is_some_and(|kp| kp.is_valid(min_confidence))
}

pub fn all_valid(landmarks: &[Option<&Keypoint>], min_confidence: f32) -> bool {
    landmarks.iter().all(|lm| is_valid_landmark(*lm, min_confidence))
}
