//! Rolling conversation window.
//!
//! The backend keeps exactly one buffer per process. Every caller reads and
//! writes the same window, so turns from concurrent users interleave and can
//! evict one another. Keying the buffer by session would fix that but is not
//! done here.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Speaker of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Bounded FIFO of recent messages.
///
/// Invariant: `len() <= capacity()` after every operation.
#[derive(Debug, Clone)]
pub struct ConversationBuffer {
    messages: VecDeque<Message>,
    capacity: usize,
}

impl ConversationBuffer {
    /// Create an empty buffer. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            messages: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append a message, evicting the oldest entries beyond capacity.
    pub fn append(&mut self, message: Message) {
        self.messages.push_back(message);
        while self.messages.len() > self.capacity {
            self.messages.pop_front();
        }
    }

    pub fn reset(&mut self) {
        self.messages.clear();
    }

    /// Owned copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Process-wide handle to the conversation buffer.
///
/// Clones share the same buffer. The lock is held for a single operation
/// only, never across an await point.
#[derive(Debug, Clone)]
pub struct SharedConversation {
    inner: Arc<Mutex<ConversationBuffer>>,
}

impl SharedConversation {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ConversationBuffer::new(capacity))),
        }
    }

    /// Lock the buffer, recovering it if a previous holder panicked.
    ///
    /// Every buffer operation leaves it within capacity, so the data behind
    /// a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, ConversationBuffer> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Conversation lock was poisoned, recovering");
            self.inner.clear_poison();
            poisoned.into_inner()
        })
    }

    pub fn append(&self, message: Message) {
        self.lock().append(message);
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.lock().snapshot()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> Message {
        Message::user(format!("message {n}"))
    }

    #[test]
    fn append_keeps_order_under_capacity() {
        let mut buffer = ConversationBuffer::new(6);
        buffer.append(Message::user("hi"));
        buffer.append(Message::assistant("hello"));

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0], Message::user("hi"));
        assert_eq!(snapshot[1], Message::assistant("hello"));
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let mut buffer = ConversationBuffer::new(6);
        for n in 0..50 {
            buffer.append(numbered(n));
            assert!(buffer.len() <= buffer.capacity());
        }
        assert_eq!(buffer.len(), 6);
    }

    #[test]
    fn oldest_entries_are_evicted_first() {
        let mut buffer = ConversationBuffer::new(3);
        for n in 0..5 {
            buffer.append(numbered(n));
        }

        let contents: Vec<String> = buffer.snapshot().into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["message 2", "message 3", "message 4"]);
    }

    #[test]
    fn reset_empties_buffer() {
        let mut buffer = ConversationBuffer::new(6);
        buffer.append(numbered(1));
        buffer.append(numbered(2));
        buffer.reset();

        assert!(buffer.is_empty());
        assert!(buffer.snapshot().is_empty());
    }

    #[test]
    fn snapshot_is_detached_from_live_buffer() {
        let mut buffer = ConversationBuffer::new(6);
        buffer.append(numbered(1));

        let mut snapshot = buffer.snapshot();
        snapshot.push(numbered(2));
        snapshot[0].content = "changed".into();

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.snapshot()[0].content, "message 1");
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut buffer = ConversationBuffer::new(0);
        buffer.append(numbered(1));
        buffer.append(numbered(2));
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.snapshot(), vec![numbered(2)]);
    }

    #[test]
    fn shared_handles_see_the_same_buffer() {
        let shared = SharedConversation::new(6);
        let other = shared.clone();

        shared.append(numbered(1));
        assert_eq!(other.len(), 1);

        other.reset();
        assert!(shared.is_empty());
    }

    #[test]
    fn recovers_after_poisoned_lock() {
        let shared = SharedConversation::new(2);
        shared.append(numbered(1));

        let inner = Arc::clone(&shared.inner);
        let _ = std::thread::spawn(move || {
            let _guard = inner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();
        assert!(shared.inner.is_poisoned());

        assert_eq!(shared.snapshot(), vec![numbered(1)]);
        shared.append(numbered(2));
        shared.append(numbered(3));
        assert_eq!(shared.snapshot(), vec![numbered(2), numbered(3)]);
        assert!(!shared.inner.is_poisoned());

        shared.reset();
        assert!(shared.is_empty());
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&Message::assistant("ok")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"ok"}"#);
    }
}
