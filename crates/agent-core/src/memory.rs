//! Conversation Memory
//!
//! Thread-keyed conversation history shared across requests. Each thread
//! sits behind its own async mutex: a reasoning run checks the thread out
//! for its whole duration, so runs on the same thread serialize while runs
//! on different threads proceed independently.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message};

/// Conversation partition key, supplied by the caller
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(String);

impl ThreadId {
    /// Validate and wrap a caller-supplied id
    pub fn parse(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        if s.trim().is_empty() {
            return Err(AgentError::Validation("thread_id must not be empty".into()));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
struct ThreadState {
    conversation: Conversation,
    last_active: Instant,
}

impl ThreadState {
    fn new() -> Self {
        Self {
            conversation: Conversation::new(),
            last_active: Instant::now(),
        }
    }
}

/// Exclusive handle on one thread's history.
///
/// Dereferences to the thread's [`Conversation`]. Messages pushed through
/// the guard are kept only if [`ThreadGuard::commit`] is called; dropping
/// the guard any other way (rollback, error, cancelled future) restores the
/// thread to its checkout state.
pub struct ThreadGuard {
    state: OwnedMutexGuard<ThreadState>,
    base_len: usize,
    max_messages: Option<usize>,
    committed: bool,
}

impl ThreadGuard {
    /// Number of messages present when the thread was checked out
    pub const fn base_len(&self) -> usize {
        self.base_len
    }

    /// Discard everything appended since checkout
    pub fn rollback(self) {
        drop(self);
    }

    /// Keep appended messages, applying the store's history cap
    pub fn commit(mut self) {
        if let Some(max) = self.max_messages {
            self.state.conversation.retain_recent(max);
        }
        self.state.last_active = Instant::now();
        self.committed = true;
    }
}

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        if !self.committed {
            let base = self.base_len;
            self.state.conversation.truncate(base);
        }
    }
}

impl Deref for ThreadGuard {
    type Target = Conversation;

    fn deref(&self) -> &Conversation {
        &self.state.conversation
    }
}

impl DerefMut for ThreadGuard {
    fn deref_mut(&mut self) -> &mut Conversation {
        &mut self.state.conversation
    }
}

/// Conversation store trait, injected into the agent session
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Lock a thread for exclusive use, creating it on first use
    async fn checkout(&self, thread_id: &ThreadId) -> Result<ThreadGuard>;

    /// Snapshot of a thread's messages (empty for unknown threads)
    async fn get(&self, thread_id: &ThreadId) -> Result<Vec<Message>> {
        let guard = self.checkout(thread_id).await?;
        Ok(guard.messages().to_vec())
    }

    /// Append one message to a thread
    async fn append(&self, thread_id: &ThreadId, message: Message) -> Result<()> {
        let mut guard = self.checkout(thread_id).await?;
        guard.push(message);
        guard.commit();
        Ok(())
    }

    /// Number of live threads
    async fn thread_count(&self) -> usize;

    /// Drop threads idle for longer than `max_idle`; returns how many were removed
    async fn evict_idle(&self, max_idle: Duration) -> usize;
}

/// In-memory conversation store (process lifetime)
#[derive(Default)]
pub struct InMemoryConversationStore {
    threads: RwLock<HashMap<ThreadId, Arc<Mutex<ThreadState>>>>,
    max_messages: Option<usize>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap each thread's history at `max` messages
    #[must_use]
    pub fn with_max_messages(mut self, max: Option<usize>) -> Self {
        self.max_messages = max;
        self
    }

    async fn slot(&self, thread_id: &ThreadId) -> Arc<Mutex<ThreadState>> {
        if let Some(slot) = self.threads.read().await.get(thread_id) {
            return slot.clone();
        }
        self.threads
            .write()
            .await
            .entry(thread_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(ThreadState::new())))
            .clone()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn checkout(&self, thread_id: &ThreadId) -> Result<ThreadGuard> {
        let mut state = self.slot(thread_id).await.lock_owned().await;
        state.last_active = Instant::now();
        let base_len = state.conversation.len();
        Ok(ThreadGuard {
            state,
            base_len,
            max_messages: self.max_messages,
            committed: false,
        })
    }

    async fn thread_count(&self) -> usize {
        self.threads.read().await.len()
    }

    async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut threads = self.threads.write().await;
        let before = threads.len();
        threads.retain(|_, slot| {
            // Anyone else holding the slot is about to use it.
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            slot.try_lock()
                .map_or(true, |state| state.last_active.elapsed() <= max_idle)
        });
        let evicted = before - threads.len();
        if evicted > 0 {
            tracing::info!(evicted, remaining = threads.len(), "Evicted idle threads");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid(s: &str) -> ThreadId {
        ThreadId::parse(s).unwrap()
    }

    #[test]
    fn test_thread_id_rejects_blank() {
        assert!(ThreadId::parse("  ").unwrap_err().is_validation());
        assert_eq!(tid("t-1").as_str(), "t-1");
    }

    #[tokio::test]
    async fn test_get_and_append() {
        let store = InMemoryConversationStore::new();
        assert!(store.get(&tid("a")).await.unwrap().is_empty());

        store.append(&tid("a"), Message::user("hi")).await.unwrap();
        store.append(&tid("a"), Message::assistant("hello")).await.unwrap();

        let messages = store.get(&tid("a")).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "hello");
        assert!(store.get(&tid("b")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rollback_discards_run() {
        let store = InMemoryConversationStore::new();
        store.append(&tid("a"), Message::user("kept")).await.unwrap();

        let mut guard = store.checkout(&tid("a")).await.unwrap();
        assert_eq!(guard.base_len(), 1);
        guard.push(Message::user("dropped"));
        guard.rollback();

        assert_eq!(store.get(&tid("a")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_guard_discards_run() {
        let store = InMemoryConversationStore::new();
        store.append(&tid("a"), Message::user("kept")).await.unwrap();

        {
            let mut guard = store.checkout(&tid("a")).await.unwrap();
            guard.push(Message::user("abandoned"));
        }

        let messages = store.get(&tid("a")).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "kept");
    }

    #[tokio::test]
    async fn test_commit_applies_cap() {
        let store = InMemoryConversationStore::new().with_max_messages(Some(2));
        for i in 0..5 {
            store.append(&tid("a"), Message::user(i.to_string())).await.unwrap();
        }
        let messages = store.get(&tid("a")).await.unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["3", "4"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_thread_runs_serialize() {
        let store = Arc::new(InMemoryConversationStore::new());

        let run = |label: &'static str| {
            let store = store.clone();
            tokio::spawn(async move {
                let mut guard = store.checkout(&tid("shared")).await.unwrap();
                guard.push(Message::user(format!("{label}-1")));
                tokio::time::sleep(Duration::from_millis(20)).await;
                guard.push(Message::assistant(format!("{label}-2")));
                guard.commit();
            })
        };

        let (a, b) = tokio::join!(run("a"), run("b"));
        a.unwrap();
        b.unwrap();

        let contents: Vec<String> = store
            .get(&tid("shared"))
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        let serial_ab = vec!["a-1", "a-2", "b-1", "b-2"];
        let serial_ba = vec!["b-1", "b-2", "a-1", "a-2"];
        assert!(contents == serial_ab || contents == serial_ba, "interleaved: {contents:?}");
    }

    #[tokio::test]
    async fn test_distinct_threads_are_isolated() {
        let store = InMemoryConversationStore::new();
        let mut a = store.checkout(&tid("a")).await.unwrap();
        // Holding "a" must not block "b".
        let mut b = store.checkout(&tid("b")).await.unwrap();
        a.push(Message::user("for a"));
        b.push(Message::user("for b"));
        a.commit();
        b.commit();

        assert_eq!(store.get(&tid("a")).await.unwrap()[0].content, "for a");
        assert_eq!(store.get(&tid("b")).await.unwrap()[0].content, "for b");
        assert_eq!(store.thread_count().await, 2);
    }

    #[tokio::test]
    async fn test_evict_idle() {
        let store = InMemoryConversationStore::new();
        store.append(&tid("old"), Message::user("x")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        store.append(&tid("fresh"), Message::user("y")).await.unwrap();

        let evicted = store.evict_idle(Duration::from_millis(15)).await;
        assert_eq!(evicted, 1);
        assert_eq!(store.thread_count().await, 1);
        assert_eq!(store.get(&tid("fresh")).await.unwrap().len(), 1);
    }
}
