mod config;
mod error;
mod result;

pub use config::{WheelConfig, WheelConfigBuilder};
pub use error::TimerError;
pub use result::TimerResult;
