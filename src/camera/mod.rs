#[cfg(feature = "desktop")]
pub mod capture;
pub mod source;

#[cfg(feature = "desktop")]
pub use capture::{OpenCvCamera, OpenCvSourceFactory, ThreadedCapture};
pub use source::{
    Grab, LatestFrame, SourceFactory, SourceKind, VideoController, VideoSource, VideoSourceState,
};
