use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::messages::ChatMessage;

/// Per-thread conversation persistence.
///
/// `get` returns the full ordered history (empty for an unseen thread id);
/// `append` adds messages at the tail. Threads are isolated from one another;
/// back-to-back calls on the same thread observe each other's writes.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, thread_id: &str) -> Vec<ChatMessage>;
    async fn append(&self, thread_id: &str, messages: Vec<ChatMessage>);
}

/// Process-lifetime store; history lives as long as the host.
#[derive(Default)]
pub struct InMemorySessionStore {
    threads: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, thread_id: &str) -> Vec<ChatMessage> {
        self.threads.read().await.get(thread_id).cloned().unwrap_or_default()
    }

    async fn append(&self, thread_id: &str, messages: Vec<ChatMessage>) {
        self.threads.write().await.entry(thread_id.to_string()).or_default().extend(messages);
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemorySessionStore, SessionStore};
    use crate::messages::ChatMessage;

    #[tokio::test]
    async fn unseen_thread_is_empty() {
        let store = InMemorySessionStore::new();
        assert!(store.get("t1").await.is_empty());
    }

    #[tokio::test]
    async fn appends_preserve_order_across_calls() {
        let store = InMemorySessionStore::new();
        store.append("t1", vec![ChatMessage::user("first")]).await;
        store.append("t1", vec![ChatMessage::assistant("second")]).await;

        let history = store.get("t1").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "first");
        assert_eq!(history[1].content, "second");
    }

    #[tokio::test]
    async fn threads_are_isolated() {
        let store = InMemorySessionStore::new();
        store.append("a", vec![ChatMessage::user("only in a")]).await;
        assert!(store.get("b").await.is_empty());
        assert_eq!(store.get("a").await.len(), 1);
    }
}
