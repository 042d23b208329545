//! In-process progress notifications.
//!
//! Topic-keyed broadcast channels carrying JSON values. The seed workers publish
//! the running user total on [`COUNT_UPDATE_TOPIC`]; the SSE endpoint subscribes.
//! Delivery is at-most-once: a publish with no observers is dropped, and an
//! observer that falls behind the channel capacity skips the oldest values.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// Topic for the total user count
pub const COUNT_UPDATE_TOPIC: &str = "count-update";

/// Build the payload published on [`COUNT_UPDATE_TOPIC`]
pub fn count_update(total: i64) -> Value {
    json!({ "type": COUNT_UPDATE_TOPIC, "total": total })
}

#[derive(Clone)]
pub struct ProgressHub {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<Value>>>>,
    capacity: usize,
}

impl ProgressHub {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Send a value to every current observer of a topic. Never waits on
    /// observers; returns how many received it.
    pub async fn publish(&self, topic: &str, value: Value) -> usize {
        let channels = self.channels.read().await;
        match channels.get(topic) {
            Some(tx) => tx.send(value).unwrap_or(0),
            None => 0,
        }
    }

    /// Register an observer; dropping the receiver deregisters it
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<Value> {
        let mut channels = self.channels.write().await;
        let tx = channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        tx.subscribe()
    }

    pub async fn observer_count(&self, topic: &str) -> usize {
        let channels = self.channels.read().await;
        channels.get(topic).map(|tx| tx.receiver_count()).unwrap_or(0)
    }

    /// Close every channel; open observer streams end after draining
    pub async fn shutdown(&self) {
        let mut channels = self.channels.write().await;
        debug!("Closing {} progress channels", channels.len());
        channels.clear();
    }
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new()
    }
}
