//! # Dispatcher
//!
//! 记录分发模块。
//!
//! 负责：
//! - 根据 `SinkConfig` 构造 Queue / Console / File sink
//! - 每个 sink 独占一个 worker，串行写入
//! - Fan-out 到多个 sinks，隔离慢 sink

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{DataSink, Delivery, TimedRecord};
pub use dispatcher::{
    create_dispatcher, create_sink_handle, DispatchReport, Dispatcher, DispatcherBuilder,
    DispatcherConfig,
};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{ConsoleSink, FileSink, MemoryProducer, QueueSink, Sink};
