//! Record input and run statistics for the `send` command.

mod input;
mod stats;

pub use input::RecordParser;
pub use stats::SendStats;
