//! Dispatcher - main loop for fan-out to sinks

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use contracts::{SinkConfig, TimedRecord};
use observability::{DeliveryStats, DeliverySummary};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::Sink;

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Sink configurations
    pub sinks: Vec<SinkConfig>,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    input_rx: mpsc::Receiver<TimedRecord>,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder
    pub fn new(config: DispatcherConfig, input_rx: mpsc::Receiver<TimedRecord>) -> Self {
        Self { config, input_rx }
    }

    /// Build and start the dispatcher
    ///
    /// Fails on the first sink that cannot be configured; handles spawned
    /// before that point are shut down.
    #[instrument(name = "dispatcher_builder_build", skip(self))]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let handles = Self::initialize_handles(&self.config).await?;

        Ok(Dispatcher {
            handles,
            input_rx: self.input_rx,
        })
    }

    #[instrument(
        name = "dispatcher_initialize_handles",
        skip(config),
        fields(sink_count = config.sinks.len())
    )]
    async fn initialize_handles(
        config: &DispatcherConfig,
    ) -> Result<Vec<SinkHandle>, DispatcherError> {
        let mut handles = Vec::with_capacity(config.sinks.len());
        for sink_config in &config.sinks {
            match create_sink_handle(sink_config).await {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    Dispatcher::shutdown_handles(handles).await;
                    return Err(e);
                }
            }
        }
        Ok(handles)
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
pub async fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    let sink = Sink::configure(config)
        .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
    Ok(SinkHandle::spawn(sink, config.queue_capacity).with_overflow(config.overflow))
}

/// Outcome of a dispatcher run
#[derive(Debug, Clone)]
pub struct DispatchReport {
    /// Records read from the input channel
    pub records: u64,
    /// Per-handle enqueue outcomes and fan-out latency
    pub fanout: DeliverySummary,
    /// Final metrics of every sink, after the workers drained
    pub sinks: Vec<(String, MetricsSnapshot)>,
}

/// The main Dispatcher that fans out records to sinks
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input_rx: mpsc::Receiver<TimedRecord>,
}

impl Dispatcher {
    /// Create a dispatcher with custom sink handles (for testing)
    pub fn with_handles(handles: Vec<SinkHandle>, input_rx: mpsc::Receiver<TimedRecord>) -> Self {
        Self { handles, input_rx }
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Run the dispatcher main loop
    ///
    /// Consumes records from input and fans out to all sinks.
    /// Returns when input channel is closed and every sink has drained.
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(mut self) -> DispatchReport {
        info!(sinks = self.handles.len(), "Dispatcher started");

        let mut record_count: u64 = 0;
        let mut fanout = DeliveryStats::new();

        while let Some(item) = self.input_rx.recv().await {
            record_count += 1;
            self.dispatch_record(&item, &mut fanout).await;

            if record_count.is_multiple_of(100) {
                debug!(records = record_count, "Dispatcher progress");
            }
        }

        info!(
            records = record_count,
            "Dispatcher input closed, shutting down"
        );

        let handles = self.handles;
        let metrics = handles
            .iter()
            .map(|h| (h.name().to_string(), Arc::clone(h.metrics())))
            .collect::<Vec<_>>();
        Self::shutdown_handles(handles).await;

        info!("Dispatcher shutdown complete");

        DispatchReport {
            records: record_count,
            fanout: fanout.summary(),
            sinks: metrics
                .into_iter()
                .map(|(name, m)| (name, m.snapshot()))
                .collect(),
        }
    }

    /// Spawn the dispatcher as a background task
    pub fn spawn(self) -> JoinHandle<DispatchReport> {
        tokio::spawn(self.run())
    }

    async fn dispatch_record(&self, item: &TimedRecord, fanout: &mut DeliveryStats) {
        for handle in &self.handles {
            let started = Instant::now();
            let outcome = match handle.dispatch(item.clone()).await {
                Ok(()) => "queued",
                Err(DispatcherError::QueueFull { .. }) => "queue_full",
                Err(e) => {
                    warn!(sink = %handle.name(), error = %e, "Dispatch failed");
                    "worker_closed"
                }
            };
            fanout.record(outcome, started.elapsed().as_secs_f64() * 1000.0);
        }
    }

    async fn shutdown_handles(handles: Vec<SinkHandle>) {
        for handle in handles {
            handle.shutdown().await;
        }
    }
}

/// Convenience function to create a dispatcher from sink configs
#[instrument(name = "dispatcher_create", skip(sink_configs, input_rx))]
pub async fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    input_rx: mpsc::Receiver<TimedRecord>,
) -> Result<Dispatcher, DispatcherError> {
    let config = DispatcherConfig {
        sinks: sink_configs,
    };
    DispatcherBuilder::new(config, input_rx).build().await
}
