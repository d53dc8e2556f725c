use std::{
    fmt::{Debug, Display},
    time::{Duration, SystemTime},
};

use serde::{Deserialize, Serialize};

/// An absolute instant in epoch milliseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimestampMillis(pub u64);

impl TimestampMillis {
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        TimestampMillis(millis as u64)
    }

    pub fn plus(&self, window: Duration) -> Self {
        TimestampMillis(self.0.saturating_add(window.as_millis() as u64))
    }

    pub fn minus(&self, window: Duration) -> Self {
        TimestampMillis(self.0.saturating_sub(window.as_millis() as u64))
    }

    /// True once the instant is no longer strictly in the future.
    pub fn is_past(&self) -> bool {
        *self <= Self::now()
    }
}

impl Display for TimestampMillis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Debug for TimestampMillis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TimestampMillis({})", self.0)
    }
}
