//! Sink implementations
//!
//! Contains QueueSink, ConsoleSink, and FileSink, plus the closed [`Sink`]
//! enum used when the variant is chosen from configuration.

mod console;
mod file;
#[cfg(feature = "kafka")]
mod kafka;
mod queue;

pub use self::console::ConsoleSink;
pub use self::file::{FileFormat, FileSink, FileSinkConfig, WriteMode, DEFAULT_OUTPUT_DIR};
#[cfg(feature = "kafka")]
pub use self::kafka::KafkaProducer;
pub use self::queue::{
    AckPolicy, MemoryProducer, ProducerError, PublishedMessage, QueueProducer, QueueSink,
    QueueSinkConfig,
};

use contracts::{
    ContractError, DataSink, Delivery, SinkConfig, SinkOptions, SinkType, TimedRecord,
};

/// Any configured sink
pub enum Sink {
    Queue(QueueSink),
    Console(ConsoleSink),
    File(FileSink),
}

impl Sink {
    /// Validate `config` and build the matching variant
    pub fn configure(config: &SinkConfig) -> Result<Self, ContractError> {
        match config.sink_type {
            SinkType::Queue => QueueSink::configure(config).map(Self::Queue),
            SinkType::Console => ConsoleSink::configure(config).map(Self::Console),
            SinkType::File => FileSink::configure(config).map(Self::File),
        }
    }

    /// Shared settings of the wrapped sink
    pub fn options(&self) -> &SinkOptions {
        match self {
            Self::Queue(sink) => sink.options(),
            Self::Console(sink) => sink.options(),
            Self::File(sink) => sink.options(),
        }
    }
}

impl From<QueueSink> for Sink {
    fn from(sink: QueueSink) -> Self {
        Self::Queue(sink)
    }
}

impl From<ConsoleSink> for Sink {
    fn from(sink: ConsoleSink) -> Self {
        Self::Console(sink)
    }
}

impl From<FileSink> for Sink {
    fn from(sink: FileSink) -> Self {
        Self::File(sink)
    }
}

impl DataSink for Sink {
    fn name(&self) -> &str {
        match self {
            Self::Queue(sink) => sink.name(),
            Self::Console(sink) => sink.name(),
            Self::File(sink) => sink.name(),
        }
    }

    async fn write(&mut self, item: &TimedRecord) -> Result<Delivery, ContractError> {
        match self {
            Self::Queue(sink) => sink.write(item).await,
            Self::Console(sink) => sink.write(item).await,
            Self::File(sink) => sink.write(item).await,
        }
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        match self {
            Self::Queue(sink) => sink.flush().await,
            Self::Console(sink) => sink.flush().await,
            Self::File(sink) => sink.flush().await,
        }
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        match self {
            Self::Queue(sink) => sink.close().await,
            Self::Console(sink) => sink.close().await,
            Self::File(sink) => sink.close().await,
        }
    }
}
