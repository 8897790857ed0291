use async_trait::async_trait;
use futures::StreamExt;
use tracing::info;

use super::{Deliver, EventStream};

/// Subject-based push subscriber.
pub struct NatsStream {
    url: String,
    subject: String,
}

impl NatsStream {
    pub fn new(url: String, subject: String) -> Self {
        Self { url, subject }
    }
}

#[async_trait]
impl EventStream for NatsStream {
    fn name(&self) -> &'static str {
        "nats"
    }

    async fn run(self: Box<Self>, deliver: Deliver) -> anyhow::Result<()> {
        let client = async_nats::connect(&self.url).await?;
        let mut subscription = client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "nats subscriber started");

        while let Some(message) = subscription.next().await {
            deliver(message.payload.to_vec()).await;
        }

        info!("nats subscriber stopped");
        Ok(())
    }
}
