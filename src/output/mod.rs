//! Narrative output: the sliding-window queue and the task that owns it.

pub mod dispatch;
pub mod throttle;

pub use dispatch::{start_throttle, ThrottleHandle, ThrottleStats};
pub use throttle::{LineSink, NarrativeLine, OutputQueue, SendError, ThrottlePolicy};
