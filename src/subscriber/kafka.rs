use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use tracing::{info, warn};

use super::{Deliver, EventStream};

/// Fixed consumer group; every instance shares the same durable cursor.
const CONSUMER_GROUP: &str = "search_engine_consumer";

/// Pull-based durable consumer on a named topic.
pub struct KafkaStream {
    brokers: String,
    topic: String,
}

impl KafkaStream {
    pub fn new(brokers: String, topic: String) -> Self {
        Self { brokers, topic }
    }
}

#[async_trait]
impl EventStream for KafkaStream {
    fn name(&self) -> &'static str {
        "kafka"
    }

    async fn run(self: Box<Self>, deliver: Deliver) -> anyhow::Result<()> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("group.id", CONSUMER_GROUP)
            .set("bootstrap.servers", &self.brokers)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .create()?;
        consumer.subscribe(&[self.topic.as_str()])?;
        info!(topic = %self.topic, group = CONSUMER_GROUP, "kafka subscriber started");

        loop {
            match consumer.recv().await {
                Ok(message) => {
                    if let Some(payload) = message.payload() {
                        deliver(payload.to_vec()).await;
                    }
                }
                Err(err) => {
                    warn!(?err, "kafka receive failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}
