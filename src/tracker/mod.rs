pub mod counter;
pub mod session;

pub use counter::{CounterState, FrameUpdate, RepCounter};
pub use session::ExerciseSession;
