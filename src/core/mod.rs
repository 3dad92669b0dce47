// src/core/mod.rs

mod bucket;
mod slot;
mod wheel;

pub(crate) use slot::Task;
pub use slot::{TaskHandle, TaskId, TaskStatus};
pub(crate) use wheel::Wheel;
