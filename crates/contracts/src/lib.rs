//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Records carry a `NaiveDateTime` timestamp
//! - Sinks only look at its time-of-day component when applying a window

mod blueprint;
mod error;
mod options;
mod record;
mod sink;
mod window;

pub use blueprint::*;
pub use error::*;
pub use options::{require_param, SinkOptions};
pub use record::{Record, TimedRecord, Value};
pub use sink::*;
pub use window::{TimeOfDay, TimeOfDayError, TimeWindow};
