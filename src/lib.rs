//! A quantized delay scheduler: a single-level time wheel with one driver
//! thread per wheel, built for many short-lived callbacks such as heartbeat
//! TTL checks, cache refresh ticks and lease timeouts.
//!
//! Delays are rounded up to the wheel's tick. Delays longer than one
//! revolution (`tick_interval * slot_count`) wait in their slot with a
//! round counter that the driver decrements on every pass.

mod basic;
mod core;
mod time_wheel;

pub use crate::basic::*;
pub use crate::core::{TaskHandle, TaskId, TaskStatus};
pub use time_wheel::{TimeWheel, WheelState, WheelStats};
