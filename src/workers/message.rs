//! Messages from workers to the supervisor.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{broadcast, mpsc};

/// Wire shape: `{"metadata": {"<domain-key>": <payload>}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerMessage {
    pub metadata: Map<String, Value>,
}

impl WorkerMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-key message.
    pub fn single(key: impl Into<String>, payload: Value) -> Self {
        Self::new().with(key, payload)
    }

    pub fn with(mut self, key: impl Into<String>, payload: Value) -> Self {
        self.metadata.insert(key.into(), payload);
        self
    }
}

/// Sending half handed to a worker. Dropped when the worker finishes.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::Sender<WorkerMessage>,
}

impl Outbox {
    pub(crate) fn new(tx: mpsc::Sender<WorkerMessage>) -> Self {
        Self { tx }
    }

    /// Deliver a message. Returns false once the supervisor stopped listening.
    pub async fn send(&self, message: WorkerMessage) -> bool {
        self.tx.send(message).await.is_ok()
    }

    pub async fn publish(&self, key: impl Into<String>, payload: Value) -> bool {
        self.send(WorkerMessage::single(key, payload)).await
    }
}

/// Everything a worker gets from its spawner. Nothing else is shared.
#[derive(Debug)]
pub struct WorkerContext {
    pub outbox: Outbox,
    pub shutdown: broadcast::Receiver<()>,
}
