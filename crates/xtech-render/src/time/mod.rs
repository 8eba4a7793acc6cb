//! Game tick timing.
//!
//! Logic runs at a fixed rate independent of the display refresh. The runtime
//! asks the timer whether a tick is due, runs it, and renders only when it is
//! not falling behind.

mod frame_timer;

pub use frame_timer::{FrameTimer, DEFAULT_FRAME_DELAY};
