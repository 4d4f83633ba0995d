use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 種目レジストリのエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("exercise '{0}' is already registered")]
    DuplicateId(String),

    #[error("unknown exercise '{0}'")]
    UnknownExercise(String),
}

/// 映像ソースのエラー。パイプラインへは伝播せず `VideoSourceState::last_error` に残る
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum VideoSourceError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("decode failure: {0}")]
    Decode(String),

    #[error("replay is only supported for file sources")]
    ReplayUnsupported,

    #[error("no video source")]
    NoSource,
}
