use crate::domain::clock::Clock;
use crate::services::session_store::{SessionStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy)]
struct Entry {
    user_id: i64,
    expires_at: OffsetDateTime,
}

impl Entry {
    fn is_live(&self, now: OffsetDateTime) -> bool {
        now < self.expires_at
    }
}

/// In-process session store. Expired entries are invisible immediately and
/// reclaimed by [`MemorySessionStore::purge_expired`].
#[derive(Debug, Clone)]
pub struct MemorySessionStore {
    entries: Arc<DashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { entries: Arc::new(DashMap::new()), clock }
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries.iter().filter(|e| e.is_live(now)).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.entries.len())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, session_id: &str, user_id: i64, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = time::Duration::try_from(ttl)
            .ok()
            .and_then(|ttl| self.clock.now().checked_add(ttl))
            .ok_or_else(|| StoreError::Unavailable("session expiry out of range".to_string()))?;
        self.entries.insert(session_id.to_string(), Entry { user_id, expires_at });
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<i64, StoreError> {
        let now = self.clock.now();
        let entry = self.entries.get(session_id).map(|e| *e);
        match entry {
            Some(entry) if entry.is_live(now) => Ok(entry.user_id),
            Some(_) => {
                self.entries.remove_if(session_id, |_, e| !e.is_live(now));
                Err(StoreError::NotFound)
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete(&self, session_id: &str) -> Result<u64, StoreError> {
        let now = self.clock.now();
        match self.entries.remove(session_id) {
            Some((_, entry)) if entry.is_live(now) => Ok(1),
            _ => Ok(0),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::ManualClock;

    fn setup() -> (MemorySessionStore, ManualClock) {
        let clock = ManualClock::starting_now();
        (MemorySessionStore::new(Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let (store, _) = setup();
        store.put("s1", 10, Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.get("s1").await.unwrap(), 10);
        assert_eq!(store.delete("s1").await.unwrap(), 1);
        assert_eq!(store.get("s1").await, Err(StoreError::NotFound));
        assert_eq!(store.delete("s1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let (store, clock) = setup();
        store.put("s1", 10, Duration::from_secs(5)).await.unwrap();
        store.put("s1", 11, Duration::from_secs(60)).await.unwrap();

        clock.advance(30);
        assert_eq!(store.get("s1").await.unwrap(), 11);
    }

    #[tokio::test]
    async fn test_unrepresentable_expiry_is_an_error() {
        let (store, _) = setup();
        let result = store.put("s1", 10, Duration::from_secs(1_000_000_000_000)).await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_passive_expiry() {
        let (store, clock) = setup();
        store.put("s1", 10, Duration::from_secs(900)).await.unwrap();

        clock.advance(899);
        assert_eq!(store.get("s1").await.unwrap(), 10);

        clock.advance(1);
        assert_eq!(store.get("s1").await, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_of_expired_entry_reports_zero() {
        let (store, clock) = setup();
        store.put("s1", 10, Duration::from_secs(1)).await.unwrap();
        clock.advance(2);

        assert_eq!(store.delete("s1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (store, clock) = setup();
        store.put("short", 1, Duration::from_secs(10)).await.unwrap();
        store.put("long", 2, Duration::from_secs(100)).await.unwrap();

        clock.advance(50);
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("long").await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_delete_removes_once() {
        let (store, _) = setup();
        store.put("contested", 1, Duration::from_secs(60)).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.delete("contested").await.unwrap() })
            })
            .collect();

        let removed: u64 = futures::future::join_all(handles).await.into_iter().map(|r| r.unwrap()).sum();
        assert_eq!(removed, 1);
    }
}
