//! Period arithmetic

use serde::{Deserialize, Serialize};

use crate::types::{Period, Timestamp};

/// One day, in seconds
pub const DEFAULT_PERIOD_LENGTH: u64 = 86_400;

/// Maps timestamps to fixed-length periods
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodClock {
    period_length: u64,
}

impl PeriodClock {
    /// A zero length is clamped to one second
    pub fn new(period_length: u64) -> Self {
        Self {
            period_length: period_length.max(1),
        }
    }

    pub fn period_length(&self) -> u64 {
        self.period_length
    }

    pub fn period_at(&self, timestamp: Timestamp) -> Period {
        timestamp / self.period_length
    }

    /// First second of `period`
    pub fn period_start(&self, period: Period) -> Timestamp {
        period.saturating_mul(self.period_length)
    }
}

impl Default for PeriodClock {
    fn default() -> Self {
        Self::new(DEFAULT_PERIOD_LENGTH)
    }
}
