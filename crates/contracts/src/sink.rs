//! DataSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for Sinks.

use serde::Serialize;
use std::fmt;

use crate::{ContractError, TimedRecord};

/// Outcome of a single delivery attempt that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// Record was handed to the destination
    Delivered,
    /// Timestamp fell outside the sink's window; nothing was written
    OutsideWindow,
    /// Destination format is not supported; reported and skipped
    Unsupported,
}

impl Delivery {
    /// Label used for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::OutsideWindow => "outside_window",
            Self::Unsupported => "unsupported",
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(DataSink: Send)]
pub trait LocalDataSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver one timed record
    ///
    /// Records outside the sink's window are skipped silently and reported
    /// as [`Delivery::OutsideWindow`].
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, item: &TimedRecord) -> Result<Delivery, ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
