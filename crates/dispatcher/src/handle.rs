//! SinkHandle - manages a sink with isolated queue and worker task
//!
//! The worker owns the sink, so every delivery to one sink runs on a single
//! task in queue order. Sinks themselves carry no locking.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{ContractError, DataSink, Delivery, OverflowPolicy, TimedRecord};

use crate::error::DispatcherError;
use crate::metrics::SinkMetrics;

type Reply = oneshot::Sender<Result<Delivery, ContractError>>;

/// Queued unit of work for a sink worker
struct Envelope {
    item: TimedRecord,
    reply: Option<Reply>,
}

/// Handle to a running sink worker
pub struct SinkHandle {
    /// Sink name
    name: String,
    /// Channel to send records to worker
    tx: mpsc::Sender<Envelope>,
    /// Behaviour of `dispatch` when the queue is full
    overflow: OverflowPolicy,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Create a new SinkHandle and spawn the worker task
    pub fn spawn<S: DataSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            overflow: OverflowPolicy::default(),
            metrics,
            worker_handle,
        }
    }

    /// Set the overflow policy used by [`SinkHandle::dispatch`]
    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get overflow policy
    pub fn overflow(&self) -> OverflowPolicy {
        self.overflow
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Send a record to the sink (non-blocking)
    ///
    /// Returns true if sent, false if queue full (record dropped)
    pub fn try_send(&self, item: TimedRecord) -> bool {
        match self.tx.try_send(Envelope { item, reply: None }) {
            Ok(()) => {
                self.update_queue_len();
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.inc_dropped_count();
                observability::record_dropped(&self.name);
                warn!(sink = %self.name, "Queue full, record dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                false
            }
        }
    }

    /// Send a record, waiting for queue capacity
    pub async fn send(&self, item: TimedRecord) -> Result<(), DispatcherError> {
        self.tx
            .send(Envelope { item, reply: None })
            .await
            .map_err(|_| DispatcherError::worker_closed(&self.name))?;
        self.update_queue_len();
        Ok(())
    }

    /// Send a record according to the overflow policy
    pub async fn dispatch(&self, item: TimedRecord) -> Result<(), DispatcherError> {
        match self.overflow {
            OverflowPolicy::Block => self.send(item).await,
            OverflowPolicy::DropNewest => {
                if self.try_send(item) {
                    Ok(())
                } else {
                    Err(DispatcherError::QueueFull {
                        sink_name: self.name.clone(),
                    })
                }
            }
        }
    }

    /// Deliver a record and wait for the sink's result
    ///
    /// Errors raised by the sink come back to the caller unchanged.
    pub async fn deliver(&self, item: TimedRecord) -> Result<Delivery, DispatcherError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                item,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| DispatcherError::worker_closed(&self.name))?;
        self.update_queue_len();

        let result = reply_rx
            .await
            .map_err(|_| DispatcherError::worker_closed(&self.name))?;
        Ok(result?)
    }

    fn update_queue_len(&self) {
        self.metrics
            .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
    }

    /// Shutdown the sink worker gracefully
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        // Drop sender to signal worker to stop
        drop(self.tx);
        // Wait for worker to finish
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

/// Worker task that consumes records and writes to sink
#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S: DataSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Envelope>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "Sink worker started");

    while let Some(Envelope { item, reply }) = rx.recv().await {
        metrics.set_queue_len(rx.len());
        observability::record_queue_depth(&name, rx.len());

        let started = Instant::now();
        let result = sink.write(&item).await;
        observability::record_delivery_latency_ms(
            &name,
            started.elapsed().as_secs_f64() * 1000.0,
        );

        match &result {
            Ok(Delivery::Delivered) => metrics.inc_write_count(),
            Ok(_) => metrics.inc_skipped_count(),
            Err(_) => metrics.inc_failure_count(),
        }
        observability::record_delivery(
            &name,
            result.as_ref().map_or("failure", |outcome| outcome.as_str()),
        );

        match reply {
            Some(reply) => {
                // caller may have given up waiting
                let _ = reply.send(result);
            }
            None => {
                if let Err(e) = result {
                    error!(sink = %name, error = %e, "Write failed");
                }
            }
        }
    }

    // Cleanup
    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Sink worker stopped");
}
