//! QueueSink - publishes records to a message-queue topic

use contracts::{
    require_param, ContractError, DataSink, Delivery, SinkConfig, SinkOptions, TimedRecord,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// Prefix for params forwarded verbatim to the producer client
pub const CLIENT_PARAM_PREFIX: &str = "kafka.";

const DEFAULT_ACK_TIMEOUT_MS: u64 = 5000;

/// Errors raised by a [`QueueProducer`]
#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("failed to create producer: {0}")]
    Create(String),
    #[error("failed to publish message: {0}")]
    Send(String),
    #[error("failed to flush producer: {0}")]
    Flush(String),
}

/// Transport seam for QueueSink
///
/// Implementations must be usable from several tasks at once.
pub trait QueueProducer: Send + Sync {
    /// Enqueue one message for `topic` with no key
    fn send(&self, topic: &str, payload: &[u8]) -> Result<(), ProducerError>;

    /// Block until outstanding messages are acknowledged or `timeout` elapses
    fn flush(&self, timeout: Duration) -> Result<(), ProducerError>;
}

/// When `write` returns relative to broker acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckPolicy {
    /// Return once the message is enqueued on the client
    #[default]
    FireAndForget,
    /// Flush the producer before returning
    Sync,
}

/// Configuration for QueueSink
#[derive(Debug, Clone)]
pub struct QueueSinkConfig {
    /// Destination topic
    pub topic: String,
    /// Broker addresses
    pub bootstrap_servers: Vec<String>,
    /// Acknowledgment policy
    pub ack: AckPolicy,
    /// Upper bound on a sync flush
    pub ack_timeout: Duration,
    /// Extra client settings (`kafka.*` params with the prefix stripped)
    pub client: HashMap<String, String>,
}

impl QueueSinkConfig {
    /// Create config from a sink configuration
    pub fn from_config(config: &SinkConfig) -> Result<Self, ContractError> {
        let topic = require_param(config, "topic")?.to_string();
        let bootstrap_servers: Vec<String> = require_param(config, "bootstrap_server")?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if bootstrap_servers.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].params.bootstrap_server", config.name),
                "at least one broker address is required",
            ));
        }

        let ack = match config.param("ack") {
            None | Some("none") => AckPolicy::FireAndForget,
            Some("sync") => AckPolicy::Sync,
            Some(other) => {
                return Err(ContractError::config_validation(
                    format!("sinks[{}].params.ack", config.name),
                    format!("unknown ack policy '{}', expected 'none' or 'sync'", other),
                ))
            }
        };

        let ack_timeout_ms = match config.param("ack_timeout_ms") {
            None => DEFAULT_ACK_TIMEOUT_MS,
            Some(raw) => raw.parse().map_err(|_| {
                ContractError::config_validation(
                    format!("sinks[{}].params.ack_timeout_ms", config.name),
                    format!("invalid timeout '{}'", raw),
                )
            })?,
        };

        let client = config
            .params
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(CLIENT_PARAM_PREFIX)
                    .map(|key| (key.to_string(), v.clone()))
            })
            .collect();

        Ok(Self {
            topic,
            bootstrap_servers,
            ack,
            ack_timeout: Duration::from_millis(ack_timeout_ms),
            client,
        })
    }
}

/// Sink that publishes each record as a compact JSON message
pub struct QueueSink {
    options: SinkOptions,
    config: QueueSinkConfig,
    producer: Option<Arc<dyn QueueProducer>>,
}

impl QueueSink {
    /// Create a QueueSink on top of an existing producer
    pub fn with_producer(
        options: SinkOptions,
        config: QueueSinkConfig,
        producer: Arc<dyn QueueProducer>,
    ) -> Self {
        debug!(
            sink = %options.name,
            topic = %config.topic,
            brokers = ?config.bootstrap_servers,
            "QueueSink ready"
        );
        Self {
            options,
            config,
            producer: Some(producer),
        }
    }

    /// Validate configuration and connect a Kafka producer
    #[cfg(feature = "kafka")]
    #[instrument(name = "queue_sink_configure", skip(config), fields(sink = %config.name))]
    pub fn configure(config: &SinkConfig) -> Result<Self, ContractError> {
        let options = SinkOptions::from_config(config)?;
        let queue_config = QueueSinkConfig::from_config(config)?;
        let producer = super::kafka::KafkaProducer::new(
            &queue_config.bootstrap_servers,
            &queue_config.client,
        )
        .map_err(|e| ContractError::sink_connection(&options.name, e.to_string()))?;
        Ok(Self::with_producer(options, queue_config, Arc::new(producer)))
    }

    /// Validate configuration; without the `kafka` feature there is no transport
    #[cfg(not(feature = "kafka"))]
    #[instrument(name = "queue_sink_configure", skip(config), fields(sink = %config.name))]
    pub fn configure(config: &SinkConfig) -> Result<Self, ContractError> {
        SinkOptions::from_config(config)?;
        QueueSinkConfig::from_config(config)?;
        Err(ContractError::config_validation(
            format!("sinks[{}].sink_type", config.name),
            "queue sinks need a build with `--features kafka`",
        ))
    }

    pub fn options(&self) -> &SinkOptions {
        &self.options
    }

    pub fn config(&self) -> &QueueSinkConfig {
        &self.config
    }

    fn producer(&self) -> Result<&Arc<dyn QueueProducer>, ContractError> {
        self.producer
            .as_ref()
            .ok_or_else(|| ContractError::sink_write(&self.options.name, "producer closed"))
    }

    async fn flush_producer(&self) -> Result<(), ContractError> {
        let producer = Arc::clone(self.producer()?);
        let timeout = self.config.ack_timeout;
        tokio::task::spawn_blocking(move || producer.flush(timeout))
            .await
            .map_err(|e| ContractError::sink_write(&self.options.name, e.to_string()))?
            .map_err(|e| ContractError::sink_connection(&self.options.name, e.to_string()))
    }
}

impl DataSink for QueueSink {
    fn name(&self) -> &str {
        &self.options.name
    }

    #[instrument(
        name = "queue_sink_write",
        skip(self, item),
        fields(sink = %self.options.name, topic = %self.config.topic)
    )]
    async fn write(&mut self, item: &TimedRecord) -> Result<Delivery, ContractError> {
        if !self.options.is_eligible(&item.timestamp) {
            return Ok(Delivery::OutsideWindow);
        }

        let payload = serde_json::to_vec(&item.record)
            .map_err(|e| ContractError::sink_write(&self.options.name, e.to_string()))?;
        self.producer()?
            .send(&self.config.topic, &payload)
            .map_err(|e| ContractError::sink_connection(&self.options.name, e.to_string()))?;

        if self.config.ack == AckPolicy::Sync {
            self.flush_producer().await?;
        }

        debug!(sink = %self.options.name, bytes = payload.len(), "Published");
        Ok(Delivery::Delivered)
    }

    #[instrument(name = "queue_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        if self.producer.is_none() {
            return Ok(());
        }
        self.flush_producer().await
    }

    #[instrument(name = "queue_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.producer = None;
        debug!(sink = %self.options.name, "QueueSink closed");
        Ok(())
    }
}

/// A published message captured by [`MemoryProducer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// In-memory producer for tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct MemoryProducer {
    messages: Arc<Mutex<Vec<PublishedMessage>>>,
    failing: bool,
}

impl MemoryProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Producer whose every send fails
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Messages published so far, in order
    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl QueueProducer for MemoryProducer {
    fn send(&self, topic: &str, payload: &[u8]) -> Result<(), ProducerError> {
        if self.failing {
            return Err(ProducerError::Send("broker unavailable".to_string()));
        }
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(PublishedMessage {
                topic: topic.to_string(),
                payload: payload.to_vec(),
            });
        Ok(())
    }

    fn flush(&self, _timeout: Duration) -> Result<(), ProducerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use contracts::{SinkType, TimeWindow};
    use serde_json::json;

    fn queue_config() -> SinkConfig {
        SinkConfig::new("events", SinkType::Queue, vec!["id".into()])
            .with_param("topic", "readings-out")
            .with_param("bootstrap_server", "localhost:9092")
    }

    fn item(value: serde_json::Value, at: &str) -> TimedRecord {
        let record = value.as_object().unwrap().clone();
        let timestamp = NaiveDateTime::parse_from_str(at, "%Y-%m-%d %H:%M:%S").unwrap();
        TimedRecord::new(record, timestamp)
    }

    fn sink_with(producer: &MemoryProducer, config: &SinkConfig) -> QueueSink {
        QueueSink::with_producer(
            SinkOptions::from_config(config).unwrap(),
            QueueSinkConfig::from_config(config).unwrap(),
            Arc::new(producer.clone()),
        )
    }

    #[test]
    fn test_queue_config_parsing() {
        let config = queue_config()
            .with_param("bootstrap_server", "a:9092, b:9092")
            .with_param("ack", "sync")
            .with_param("ack_timeout_ms", "250")
            .with_param("kafka.linger.ms", "5");

        let parsed = QueueSinkConfig::from_config(&config).unwrap();
        assert_eq!(parsed.topic, "readings-out");
        assert_eq!(parsed.bootstrap_servers, vec!["a:9092", "b:9092"]);
        assert_eq!(parsed.ack, AckPolicy::Sync);
        assert_eq!(parsed.ack_timeout, Duration::from_millis(250));
        assert_eq!(parsed.client.get("linger.ms").map(String::as_str), Some("5"));
    }

    #[test]
    fn test_queue_config_defaults_to_fire_and_forget() {
        let parsed = QueueSinkConfig::from_config(&queue_config()).unwrap();
        assert_eq!(parsed.ack, AckPolicy::FireAndForget);
        assert_eq!(parsed.ack_timeout, Duration::from_millis(DEFAULT_ACK_TIMEOUT_MS));
    }

    #[test]
    fn test_queue_config_missing_topic() {
        let config = SinkConfig::new("events", SinkType::Queue, vec![])
            .with_param("bootstrap_server", "localhost:9092");
        let err = QueueSinkConfig::from_config(&config).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("topic"));
    }

    #[test]
    fn test_queue_config_rejects_unknown_ack() {
        let config = queue_config().with_param("ack", "maybe");
        assert!(QueueSinkConfig::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_queue_sink_publishes_compact_json() {
        let producer = MemoryProducer::new();
        let mut sink = sink_with(&producer, &queue_config());

        let outcome = sink
            .write(&item(json!({"id": 1, "val": "a"}), "2024-01-01 12:00:00"))
            .await
            .unwrap();

        assert_eq!(outcome, Delivery::Delivered);
        let messages = producer.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].topic, "readings-out");
        assert_eq!(messages[0].payload, br#"{"id":1,"val":"a"}"#.to_vec());
    }

    #[tokio::test]
    async fn test_queue_sink_sync_ack() {
        let producer = MemoryProducer::new();
        let config = queue_config().with_param("ack", "sync");
        let mut sink = sink_with(&producer, &config);

        sink.write(&item(json!({"id": 7}), "2024-01-01 00:00:00"))
            .await
            .unwrap();
        assert_eq!(producer.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_queue_sink_outside_window_publishes_nothing() {
        let producer = MemoryProducer::new();
        let config = queue_config();
        let mut sink = QueueSink::with_producer(
            SinkOptions::from_config(&config).unwrap().with_window(TimeWindow::new(
                "22:00".parse().unwrap(),
                "06:00".parse().unwrap(),
            )),
            QueueSinkConfig::from_config(&config).unwrap(),
            Arc::new(producer.clone()),
        );

        let skipped = sink
            .write(&item(json!({"id": 1}), "2024-01-01 12:00:00"))
            .await
            .unwrap();
        let sent = sink
            .write(&item(json!({"id": 2}), "2024-01-01 23:00:00"))
            .await
            .unwrap();

        assert_eq!(skipped, Delivery::OutsideWindow);
        assert_eq!(sent, Delivery::Delivered);
        assert_eq!(producer.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_queue_sink_transport_error_propagates() {
        let producer = MemoryProducer::failing();
        let mut sink = sink_with(&producer, &queue_config());

        let err = sink
            .write(&item(json!({"id": 1}), "2024-01-01 12:00:00"))
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::SinkConnection { .. }));
    }

    #[tokio::test]
    async fn test_queue_sink_write_after_close_fails() {
        let producer = MemoryProducer::new();
        let mut sink = sink_with(&producer, &queue_config());
        sink.close().await.unwrap();

        let result = sink
            .write(&item(json!({"id": 1}), "2024-01-01 12:00:00"))
            .await;
        assert!(result.is_err());
        assert!(sink.flush().await.is_ok());
    }

    #[cfg(not(feature = "kafka"))]
    #[test]
    fn test_configure_without_transport_feature() {
        let err = match QueueSink::configure(&queue_config()) {
            Ok(_) => panic!("queue sink configured without a transport"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("--features kafka"), "got: {err}");
    }
}
