pub mod kafka;
pub mod nats;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::warn;

use crate::application::config::configuration::Configuration;
use crate::ingest::{IngestOp, IngestQueue};
use crate::model::DocMsg;

use self::kafka::KafkaStream;
use self::nats::NatsStream;

/// Callback a stream invokes once per message; payloads are opaque bytes.
pub type Deliver = Arc<dyn Fn(Vec<u8>) -> BoxFuture<'static, ()> + Send + Sync>;

/// One pluggable event stream. Implementations own their connection and
/// hand every payload to `deliver`; the coordinator behind the callback is
/// shared with the HTTP surface.
#[async_trait]
pub trait EventStream: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(self: Box<Self>, deliver: Deliver) -> anyhow::Result<()>;
}

/// A stream is enabled iff both its URL and its subject/topic are set.
pub fn streams_from_config(config: &Configuration) -> Vec<Box<dyn EventStream>> {
    let mut streams: Vec<Box<dyn EventStream>> = Vec::new();
    if let (Some(url), Some(subject)) = (&config.nats_url, &config.nats_subject) {
        streams.push(Box::new(NatsStream::new(url.clone(), subject.clone())));
    }
    if let (Some(url), Some(topic)) = (&config.kafka_url, &config.kafka_topic) {
        streams.push(Box::new(KafkaStream::new(url.clone(), topic.clone())));
    }
    streams
}

/// Wires deliveries into the ingest queue. Unparsable payloads are logged
/// and skipped; delivery is at-least-once and updates are idempotent by id.
pub fn deliver_to_queue(queue: IngestQueue) -> Deliver {
    Arc::new(move |payload: Vec<u8>| {
        let queue = queue.clone();
        Box::pin(async move {
            handle_message(&queue, &payload).await;
        })
    })
}

async fn handle_message(queue: &IngestQueue, payload: &[u8]) {
    let msg: DocMsg = match serde_json::from_slice(payload) {
        Ok(msg) => msg,
        Err(err) => {
            warn!(?err, "skipping unparsable bus message");
            return;
        }
    };
    let op = if msg.deleted {
        IngestOp::Delete { id: msg.doc_id }
    } else {
        IngestOp::Update {
            id: msg.doc_id,
            doc: msg.document,
        }
    };
    if let Err(err) = queue.submit_blocking(op).await {
        warn!(?err, "bus write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::lifecycle::ConfigStore;
    use crate::config::schema::IndexConfig;
    use crate::indexes::indexer::DocIndex;
    use crate::ingest::run_writer;
    use crate::model::Value;
    use std::path::Path;

    const SCHEMA: &str = r#"{
        "indexName": "products",
        "fields": [{"name": "title", "type": "string", "searchable": true, "filterable": true}]
    }"#;

    fn open_engine(dir: &Path) -> Arc<DocIndex> {
        let store = ConfigStore::new(
            dir.join("index.json"),
            dir.join("filters.json"),
            dir.join("ranking.json"),
        );
        store.write_index_config(SCHEMA.as_bytes()).unwrap();
        let schema: IndexConfig = serde_json::from_str(SCHEMA).unwrap();
        Arc::new(
            DocIndex::open(
                &dir.join("indexes"),
                schema,
                store,
                None,
                dir.join("synonyms.json"),
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn deliveries_update_and_delete_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let index = open_engine(dir.path());
        let (queue, rx) = IngestQueue::new();
        tokio::spawn(run_writer(index.clone(), rx));
        let deliver = deliver_to_queue(queue);

        deliver(br#"{"doc_id": "a", "doc": {"title": "red hat"}}"#.to_vec()).await;
        let found = index.get("a").await.unwrap().unwrap();
        assert_eq!(found["title"], Value::Str("red hat".to_owned()));

        // Redelivery of the same message is harmless.
        deliver(br#"{"doc_id": "a", "doc": {"title": "red hat"}}"#.to_vec()).await;
        assert_eq!(index.get_all().await.unwrap().len(), 1);

        deliver(br#"{"doc_id": "a", "doc": {}, "delete": true}"#.to_vec()).await;
        assert!(index.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unparsable_payloads_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let index = open_engine(dir.path());
        let (queue, rx) = IngestQueue::new();
        tokio::spawn(run_writer(index.clone(), rx));
        let deliver = deliver_to_queue(queue);

        deliver(b"not json at all".to_vec()).await;
        assert!(index.get_all().await.unwrap().is_empty());
    }

    #[test]
    fn streams_require_both_url_and_subject() {
        let mut config = Configuration::for_tests();
        assert!(streams_from_config(&config).is_empty());

        config.nats_url = Some("nats://localhost:4222".to_owned());
        assert!(streams_from_config(&config).is_empty());

        config.nats_subject = Some("documents".to_owned());
        assert_eq!(streams_from_config(&config).len(), 1);

        config.kafka_url = Some("localhost:9092".to_owned());
        config.kafka_topic = Some("documents".to_owned());
        assert_eq!(streams_from_config(&config).len(), 2);
    }
}
