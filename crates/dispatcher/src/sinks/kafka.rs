//! Kafka transport for QueueSink

use std::collections::HashMap;
use std::time::Duration;

use rdkafka::producer::{BaseProducer, BaseRecord, Producer};
use rdkafka::ClientConfig;

use super::queue::{ProducerError, QueueProducer};

/// `QueueProducer` backed by an rdkafka `BaseProducer`
pub struct KafkaProducer {
    producer: BaseProducer,
}

impl KafkaProducer {
    /// Create a producer for the given brokers.
    /// `bootstrap.servers` in `client` is ignored; use `bootstrap_servers`.
    pub fn new(
        bootstrap_servers: &[String],
        client: &HashMap<String, String>,
    ) -> Result<Self, ProducerError> {
        let mut conf = ClientConfig::new();
        for (k, v) in client {
            conf.set(k, v);
        }
        let producer = conf
            .set("bootstrap.servers", bootstrap_servers.join(","))
            .create()
            .map_err(|e| ProducerError::Create(e.to_string()))?;
        Ok(Self { producer })
    }
}

impl QueueProducer for KafkaProducer {
    fn send(&self, topic: &str, payload: &[u8]) -> Result<(), ProducerError> {
        self.producer
            .send(BaseRecord::<(), [u8]>::to(topic).payload(payload))
            .map_err(|(e, _)| ProducerError::Send(e.to_string()))?;
        // serve delivery callbacks without blocking
        self.producer.poll(Duration::ZERO);
        Ok(())
    }

    fn flush(&self, timeout: Duration) -> Result<(), ProducerError> {
        self.producer
            .flush(timeout)
            .map_err(|e| ProducerError::Flush(e.to_string()))
    }
}
