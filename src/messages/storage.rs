//! Write-through transcript log

use super::types::Message;
use crate::persistence::{KeyValueStore, TRANSCRIPT_KEY};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct TranscriptStore {
    messages: Arc<RwLock<Vec<Message>>>,
    backend: Arc<dyn KeyValueStore>,
}

impl TranscriptStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            messages: Arc::new(RwLock::new(Vec::new())),
            backend,
        }
    }

    /// Restore the persisted log, replacing whatever is in memory.
    ///
    /// Unreadable or malformed data yields an empty history.
    pub fn load(&self) -> Vec<Message> {
        let restored = match self.backend.get(TRANSCRIPT_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Message>>(&raw) {
                Ok(messages) => messages,
                Err(e) => {
                    warn!("Discarding malformed transcript: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to read transcript: {}", e);
                Vec::new()
            }
        };

        debug!("Loaded {} transcript messages", restored.len());
        *self.messages.write() = restored.clone();
        restored
    }

    /// Append and immediately persist the whole log
    pub fn append(&self, message: Message) {
        let mut messages = self.messages.write();
        messages.push(message);
        self.persist(&messages);
    }

    /// Empty memory and the persisted copy together
    pub fn clear(&self) {
        let mut messages = self.messages.write();
        messages.clear();
        if let Err(e) = self.backend.remove(TRANSCRIPT_KEY) {
            warn!("Failed to remove persisted transcript: {}", e);
        }
    }

    pub fn get_all(&self) -> Vec<Message> {
        self.messages.read().clone()
    }

    pub fn last(&self) -> Option<Message> {
        self.messages.read().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }

    fn persist(&self, messages: &[Message]) {
        let encoded = match serde_json::to_string(messages) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Failed to encode transcript: {}", e);
                return;
            }
        };
        if let Err(e) = self.backend.set(TRANSCRIPT_KEY, &encoded) {
            warn!("Transcript kept in memory only: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Sender;
    use crate::persistence::MemoryStore;
    use crate::{JarvisError, Result};

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(JarvisError::StorageError("unavailable".into()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(JarvisError::StorageError("unavailable".into()))
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Err(JarvisError::StorageError("unavailable".into()))
        }
    }

    #[test]
    fn test_append_is_write_through() {
        let backend = MemoryStore::new();
        let store = TranscriptStore::new(Arc::new(backend.clone()));

        store.append(Message::user("hello"));

        let raw = backend.get(TRANSCRIPT_KEY).unwrap().unwrap();
        let persisted: Vec<Message> = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].body, "hello");
    }

    #[test]
    fn test_load_after_restart_ends_with_last_append() {
        let backend = MemoryStore::new();
        let first = TranscriptStore::new(Arc::new(backend.clone()));
        first.append(Message::user("open GitHub"));
        let reply = Message::assistant("Opening GitHub for you!");
        first.append(reply.clone());

        let restarted = TranscriptStore::new(Arc::new(backend));
        let loaded = restarted.load();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.last(), Some(&reply));
        assert_eq!(restarted.len(), 2);
    }

    #[test]
    fn test_clear_then_load_is_empty() {
        let backend = MemoryStore::new();
        let store = TranscriptStore::new(Arc::new(backend.clone()));
        store.append(Message::system("note"));
        store.clear();

        assert!(store.is_empty());
        assert!(TranscriptStore::new(Arc::new(backend)).load().is_empty());
    }

    #[test]
    fn test_malformed_data_is_empty_history() {
        let backend = MemoryStore::new();
        backend.set(TRANSCRIPT_KEY, "{not json").unwrap();

        let store = TranscriptStore::new(Arc::new(backend));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_failing_backend_degrades_to_memory() {
        let store = TranscriptStore::new(Arc::new(FailingStore));
        assert!(store.load().is_empty());

        store.append(Message::user("still here"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.last().map(|m| m.sender), Some(Sender::User));

        store.clear();
        assert!(store.is_empty());
    }
}
