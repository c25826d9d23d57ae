//! ConsoleSink - prints one line per record

use contracts::{ContractError, DataSink, Delivery, SinkConfig, SinkOptions, TimedRecord};
use std::io::{self, Write};
use tracing::{debug, instrument};

/// Sink that writes records to standard output as compact JSON lines
pub struct ConsoleSink {
    options: SinkOptions,
    out: Box<dyn Write + Send>,
}

impl ConsoleSink {
    /// Create a ConsoleSink writing to stdout
    pub fn new(options: SinkOptions) -> Self {
        Self::with_writer(options, io::stdout())
    }

    /// Create a ConsoleSink writing to an arbitrary stream
    pub fn with_writer(options: SinkOptions, out: impl Write + Send + 'static) -> Self {
        Self {
            options,
            out: Box::new(out),
        }
    }

    /// Validate configuration and create the sink
    pub fn configure(config: &SinkConfig) -> Result<Self, ContractError> {
        Ok(Self::new(SinkOptions::from_config(config)?))
    }

    pub fn options(&self) -> &SinkOptions {
        &self.options
    }

    fn print_record(&mut self, item: &TimedRecord) -> Result<(), ContractError> {
        let line = serde_json::to_string(&item.record)
            .map_err(|e| ContractError::sink_write(&self.options.name, e.to_string()))?;
        writeln!(self.out, "{line}")?;
        Ok(())
    }
}

impl DataSink for ConsoleSink {
    fn name(&self) -> &str {
        &self.options.name
    }

    #[instrument(
        name = "console_sink_write",
        skip(self, item),
        fields(sink = %self.options.name)
    )]
    async fn write(&mut self, item: &TimedRecord) -> Result<Delivery, ContractError> {
        if !self.options.is_eligible(&item.timestamp) {
            return Ok(Delivery::OutsideWindow);
        }
        self.print_record(item)?;
        Ok(Delivery::Delivered)
    }

    #[instrument(name = "console_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        self.out.flush()?;
        Ok(())
    }

    #[instrument(name = "console_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.out.flush()?;
        debug!(sink = %self.options.name, "ConsoleSink closed");
        Ok(())
    }
}
