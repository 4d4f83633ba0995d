pub mod estimator;
pub mod keypoint;
#[cfg(feature = "desktop")]
pub mod movenet;

pub use estimator::PoseEstimator;
pub use keypoint::{Keypoint, KeypointIndex, Pose};
#[cfg(feature = "desktop")]
pub use movenet::MoveNetEstimator;
