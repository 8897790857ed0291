use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::indexes::indexer::{DocIndex, EngineError};
use crate::model::Document;

/// Bound of the shared write queue. HTTP writers are turned away when it is
/// full; bus deliveries block, their delivery rate is the throttle.
pub const INGEST_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug)]
pub enum IngestOp {
    Add { id: String, doc: Document },
    Update { id: String, doc: Document },
    Delete { id: String },
}

pub struct IngestJob {
    op: IngestOp,
    reply: oneshot::Sender<Result<(), EngineError>>,
}

#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("ingest queue is full")]
    Busy,
    #[error("ingest writer has shut down")]
    Closed,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Producer half of the single-writer funnel. Everything that mutates the
/// index goes through here, in FIFO order.
#[derive(Clone)]
pub struct IngestQueue {
    tx: flume::Sender<IngestJob>,
}

impl IngestQueue {
    pub fn new() -> (Self, flume::Receiver<IngestJob>) {
        let (tx, rx) = flume::bounded(INGEST_QUEUE_CAPACITY);
        (Self { tx }, rx)
    }

    /// HTTP path: refuses immediately when the queue is full, then awaits
    /// the engine result so validation errors surface to the caller.
    pub async fn submit(&self, op: IngestOp) -> Result<(), IngestError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .try_send(IngestJob {
                op,
                reply: reply_tx,
            })
            .map_err(|err| match err {
                flume::TrySendError::Full(_) => IngestError::Busy,
                flume::TrySendError::Disconnected(_) => IngestError::Closed,
            })?;
        reply_rx.await.map_err(|_| IngestError::Closed)??;
        Ok(())
    }

    /// Bus path: waits for room instead of failing.
    pub async fn submit_blocking(&self, op: IngestOp) -> Result<(), IngestError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send_async(IngestJob {
                op,
                reply: reply_tx,
            })
            .await
            .map_err(|_| IngestError::Closed)?;
        reply_rx.await.map_err(|_| IngestError::Closed)??;
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.tx.len()
    }
}

/// The single writer: drains the queue and applies each operation to the
/// engine, preserving arrival order.
pub async fn run_writer(index: Arc<DocIndex>, rx: flume::Receiver<IngestJob>) {
    while let Ok(job) = rx.recv_async().await {
        let result = match &job.op {
            IngestOp::Add { id, doc } => index.add(id, doc).await,
            IngestOp::Update { id, doc } => index.update(id, doc).await,
            IngestOp::Delete { id } => index.delete(id).await,
        };
        if let Err(err) = &result {
            warn!(?err, op = ?op_name(&job.op), "ingest operation failed");
        }
        // The producer may have gone away; that is fine.
        let _ = job.reply.send(result);
    }
    debug!("ingest writer stopped");
}

fn op_name(op: &IngestOp) -> &'static str {
    match op {
        IngestOp::Add { .. } => "add",
        IngestOp::Update { .. } => "update",
        IngestOp::Delete { .. } => "delete",
    }
}
