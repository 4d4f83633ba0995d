use anyhow::Result;

use super::keypoint::Pose;

/// 外部の姿勢推定器。フレーム型 `F` を受け取り、検出された人物ごとの Pose を返す
///
/// 推定は同期呼び出しで、パイプラインはこれ以外の箇所でブロックしない。
/// エラーは「このフレームは姿勢なし」として扱われる。
pub trait PoseEstimator<F> {
    fn estimate(&mut self, frame: &F) -> Result<Vec<Pose>>;
}

impl<F, E: PoseEstimator<F> + ?Sized> PoseEstimator<F> for Box<E> {
    fn estimate(&mut self, frame: &F) -> Result<Vec<Pose>> {
        (**self).estimate(frame)
    }
}
