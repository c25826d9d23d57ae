//! Record - the unit of output data
//!
//! A record is an ordered field-name → value map. Values are opaque to the
//! sink layer and are passed through unmodified.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Field values are loosely typed (string, number, boolean, null).
pub use serde_json::Value;

/// Ordered field-name → value mapping (insertion order is preserved)
pub type Record = serde_json::Map<String, Value>;

/// A record paired with the timestamp used for window filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedRecord {
    /// Record payload
    pub record: Record,

    /// Event timestamp; only its time-of-day is used by sinks
    pub timestamp: NaiveDateTime,
}

impl TimedRecord {
    pub fn new(record: Record, timestamp: NaiveDateTime) -> Self {
        Self { record, timestamp }
    }
}
