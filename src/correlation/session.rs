use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use tokio::sync::oneshot;

use crate::event::envelope::EventEnvelope;

use super::{SyncError, SyncResult};

struct Slot {
    token: u64,
    // Taken by the first response.
    sender: Option<oneshot::Sender<EventEnvelope>>,
}

#[derive(Default)]
struct Inner {
    slots: Mutex<HashMap<String, Slot>>,
    next_token: AtomicU64,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Registry of pending correlation sessions.
///
/// Every operation takes the one lock guarding the map. The table only holds the
/// sending half of each session; the [`Session`] itself belongs to the waiting
/// request and unregisters itself when dropped.
#[derive(Clone, Default)]
pub struct SessionTable {
    inner: Arc<Inner>,
    max_sessions: usize,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table admitting at most `max_sessions` pending sessions. 0 means unbounded.
    pub fn with_capacity_limit(max_sessions: usize) -> Self {
        Self {
            inner: Arc::default(),
            max_sessions,
        }
    }

    /// Registers a session for `id`. Never replaces a live session.
    pub fn add(&self, id: &str) -> SyncResult<Session> {
        let mut slots = self.inner.lock();
        if slots.contains_key(id) {
            return Err(SyncError::DuplicateSession(id.to_string()));
        }
        if self.max_sessions > 0 && slots.len() >= self.max_sessions {
            return Err(SyncError::Overloaded {
                limit: self.max_sessions,
            });
        }

        let (sender, receiver) = oneshot::channel();
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        slots.insert(
            id.to_string(),
            Slot {
                token,
                sender: Some(sender),
            },
        );

        Ok(Session {
            id: id.to_string(),
            token,
            receiver,
            table: self.inner.clone(),
        })
    }

    /// Hands `envelope` to the session waiting on `id` without blocking.
    pub fn resolve(&self, id: &str, envelope: EventEnvelope) -> SyncResult<()> {
        let mut slots = self.inner.lock();
        let slot = slots
            .get_mut(id)
            .ok_or_else(|| SyncError::UnknownSession(id.to_string()))?;
        let sender = slot
            .sender
            .take()
            .ok_or_else(|| SyncError::ConnectionClosed(id.to_string()))?;
        sender
            .send(envelope)
            .map_err(|_| SyncError::ConnectionClosed(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A pending request waiting for its correlated response.
pub struct Session {
    id: String,
    token: u64,
    receiver: oneshot::Receiver<EventEnvelope>,
    table: Arc<Inner>,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Waits for the response. `None` when the session can no longer be resolved.
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        (&mut self.receiver).await.ok()
    }

    /// Stops accepting responses and returns one already handed over, if any.
    ///
    /// Later [`SessionTable::resolve`] calls for this id fail with `ConnectionClosed`
    /// until the session is dropped.
    pub fn close(&mut self) -> Option<EventEnvelope> {
        if let Some(slot) = self.table.lock().get_mut(&self.id) {
            if slot.token == self.token {
                slot.sender = None;
            }
        }
        self.receiver.try_recv().ok()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let mut slots = self.table.lock();
        if slots.get(&self.id).is_some_and(|slot| slot.token == self.token) {
            slots.remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn response(id: &str) -> EventEnvelope {
        EventEnvelope::builder()
            .id(id)
            .event_type("test.response")
            .source("backend")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_add_and_resolve() {
        let table = SessionTable::new();
        let mut session = table.add("abc").unwrap();
        assert!(table.contains("abc"));

        table.resolve("abc", response("r1")).unwrap();
        assert_eq!(session.recv().await.map(|e| e.id), Some("r1".to_string()));

        drop(session);
        assert!(table.is_empty());
    }

    #[test]
    fn test_duplicate_add_fails() {
        let table = SessionTable::new();
        let _first = table.add("abc").unwrap();
        assert_eq!(
            table.add("abc").unwrap_err(),
            SyncError::DuplicateSession("abc".to_string())
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_unknown_session() {
        let table = SessionTable::new();
        let _session = table.add("abc").unwrap();
        assert_eq!(
            table.resolve("xyz", response("r1")).unwrap_err(),
            SyncError::UnknownSession("xyz".to_string())
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_second_response_fails() {
        let table = SessionTable::new();
        let _session = table.add("abc").unwrap();
        table.resolve("abc", response("r1")).unwrap();
        assert_eq!(
            table.resolve("abc", response("r2")).unwrap_err(),
            SyncError::ConnectionClosed("abc".to_string())
        );
    }

    #[test]
    fn test_close_returns_handed_over_response() {
        let table = SessionTable::new();
        let mut session = table.add("abc").unwrap();
        table.resolve("abc", response("r1")).unwrap();

        assert_eq!(session.close().map(|e| e.id), Some("r1".to_string()));
        assert_eq!(session.close(), None);
    }

    #[test]
    fn test_resolve_after_close_fails() {
        let table = SessionTable::new();
        let mut session = table.add("abc").unwrap();
        assert_eq!(session.close(), None);

        assert_eq!(
            table.resolve("abc", response("r1")).unwrap_err(),
            SyncError::ConnectionClosed("abc".to_string())
        );
        assert!(table.contains("abc"));

        drop(session);
        assert!(table.is_empty());
    }

    #[test]
    fn test_drop_removes_session() {
        let table = SessionTable::new();
        let session = table.add("abc").unwrap();
        drop(session);
        assert!(!table.contains("abc"));
        assert_eq!(
            table.resolve("abc", response("r1")).unwrap_err(),
            SyncError::UnknownSession("abc".to_string())
        );
    }

    #[test]
    fn test_stale_drop_keeps_newer_session() {
        let table = SessionTable::new();
        let first = table.add("abc").unwrap();
        // Simulates the entry being replaced after the first session was cleared.
        table.inner.lock().remove("abc");
        let _second = table.add("abc").unwrap();

        drop(first);
        assert!(table.contains("abc"));
    }

    #[test]
    fn test_capacity_limit() {
        let table = SessionTable::with_capacity_limit(2);
        let _a = table.add("a").unwrap();
        let b = table.add("b").unwrap();
        assert_eq!(
            table.add("c").unwrap_err(),
            SyncError::Overloaded { limit: 2 }
        );

        drop(b);
        assert!(table.add("c").is_ok());
    }
}
