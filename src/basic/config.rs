use std::time::Duration;

use super::{TimerError, TimerResult};

/// Smallest usable tick. Delays are whole milliseconds, so anything finer
/// can't be addressed.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_SLOT_COUNT: usize = 5;
pub const DEFAULT_NAME: &str = "timewheel";

/// Immutable shape of a time wheel.
///
/// Build it with [`WheelConfig::builder`]; `build()` rejects shapes the
/// wheel could not run with, so a `WheelConfig` in hand is always valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelConfig {
    tick_interval: Duration,
    slot_count: usize,
    name: String,
}

impl WheelConfig {
    pub fn builder() -> WheelConfigBuilder {
        WheelConfigBuilder::default()
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// One full revolution of the wheel.
    pub fn revolution(&self) -> Duration {
        self.tick_interval * self.slot_count as u32
    }
}

impl Default for WheelConfig {
    fn default() -> Self {
        WheelConfig {
            tick_interval: DEFAULT_TICK_INTERVAL,
            slot_count: DEFAULT_SLOT_COUNT,
            name: DEFAULT_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WheelConfigBuilder {
    tick_interval: Duration,
    slot_count: usize,
    name: String,
}

impl Default for WheelConfigBuilder {
    fn default() -> Self {
        let WheelConfig {
            tick_interval,
            slot_count,
            name,
        } = WheelConfig::default();

        WheelConfigBuilder {
            tick_interval,
            slot_count,
            name,
        }
    }
}

impl WheelConfigBuilder {
    pub fn tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn slot_count(mut self, slot_count: usize) -> Self {
        self.slot_count = slot_count;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn build(self) -> TimerResult<WheelConfig> {
        if self.slot_count == 0 {
            return Err(TimerError::InvalidSlotCount(self.slot_count));
        }
        if self.tick_interval < MIN_TICK_INTERVAL {
            return Err(TimerError::InvalidTickInterval(self.tick_interval));
        }
        // revolution() multiplies by the slot count as u32
        if u32::try_from(self.slot_count).is_err() {
            return Err(TimerError::InvalidSlotCount(self.slot_count));
        }

        Ok(WheelConfig {
            tick_interval: self.tick_interval,
            slot_count: self.slot_count,
            name: self.name,
        })
    }
}
