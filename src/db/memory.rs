// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory document store and identity provider.
//!
//! Used by tests and the demo mode. Writes are echoed to every listener of
//! the document, including the writer's own subscription, like the real
//! store does.

use crate::db::{AuthState, DocumentListener, DocumentStore, IdentityProvider, Subscription, Uid};
use crate::error::{Result, TimetableError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

type SnapshotSender = mpsc::UnboundedSender<Option<serde_json::Value>>;

#[derive(Default)]
struct MemoryInner {
    docs: DashMap<Uid, serde_json::Value>,
    listeners: DashMap<Uid, Vec<(u64, SnapshotSender)>>,
    next_listener: AtomicU64,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

/// Document store kept in process memory.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<MemoryInner>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents of a document.
    pub fn get(&self, uid: &str) -> Option<serde_json::Value> {
        self.inner.docs.get(uid).map(|doc| doc.value().clone())
    }

    /// Number of live subscriptions on a document.
    pub fn listener_count(&self, uid: &str) -> usize {
        self.inner.listeners.get(uid).map_or(0, |subs| subs.len())
    }

    /// Make subsequent writes fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes and deletes.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<()> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(TimetableError::Store("Write rejected".to_string()));
        }
        Ok(())
    }

    fn notify(&self, uid: &str, data: Option<serde_json::Value>) {
        if let Some(mut subs) = self.inner.listeners.get_mut(uid) {
            subs.retain(|(_, tx)| tx.send(data.clone()).is_ok());
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn listen(&self, uid: &str) -> Result<DocumentListener> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_listener.fetch_add(1, Ordering::SeqCst);

        {
            // Holding the listener entry orders the initial snapshot before
            // any notification from a concurrent write.
            let mut subs = self.inner.listeners.entry(uid.to_string()).or_default();
            let _ = tx.send(self.get(uid));
            subs.push((id, tx));
        }

        let inner = self.inner.clone();
        let uid = uid.to_string();
        let subscription = Subscription::new(move || {
            if let Some(mut subs) = inner.listeners.get_mut(&uid) {
                subs.retain(|(listener, _)| *listener != id);
            }
        });

        Ok(DocumentListener {
            snapshots: rx,
            subscription,
        })
    }

    async fn set(&self, uid: &str, value: serde_json::Value) -> Result<()> {
        self.check_writable()?;
        self.inner.docs.insert(uid.to_string(), value.clone());
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        self.notify(uid, Some(value));
        Ok(())
    }

    async fn delete(&self, uid: &str) -> Result<()> {
        self.check_writable()?;
        self.inner.docs.remove(uid);
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        self.notify(uid, None);
        Ok(())
    }
}

/// Identity provider driven by the caller.
pub struct MemoryIdentityProvider {
    state: watch::Sender<AuthState>,
    next_uid: AtomicU64,
    fail_sign_in: AtomicBool,
    sign_ins: AtomicUsize,
}

impl MemoryIdentityProvider {
    pub fn new(initial: AuthState) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            state,
            next_uid: AtomicU64::new(1),
            fail_sign_in: AtomicBool::new(false),
            sign_ins: AtomicUsize::new(0),
        }
    }

    pub fn sign_in(&self, uid: impl Into<Uid>) {
        self.state.send_replace(AuthState::SignedIn(uid.into()));
    }

    pub fn sign_out(&self) {
        self.state.send_replace(AuthState::SignedOut);
    }

    pub fn set_fail_sign_in(&self, fail: bool) {
        self.fail_sign_in.store(fail, Ordering::SeqCst);
    }

    /// Number of anonymous identities created.
    pub fn sign_in_count(&self) -> usize {
        self.sign_ins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    async fn sign_in_anonymously(&self) -> Result<Uid> {
        if self.fail_sign_in.load(Ordering::SeqCst) {
            return Err(TimetableError::Identity(
                "Anonymous sign-in rejected".to_string(),
            ));
        }
        let uid = format!("anon-{}", self.next_uid.fetch_add(1, Ordering::SeqCst));
        self.sign_ins.fetch_add(1, Ordering::SeqCst);
        self.sign_in(uid.clone());
        Ok(uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_listen_delivers_current_then_changes() {
        let store = MemoryDocumentStore::new();
        store.set("u1", json!({"ical": "a"})).await.unwrap();

        let mut listener = store.listen("u1").await.unwrap();
        assert_eq!(listener.snapshots.recv().await, Some(Some(json!({"ical": "a"}))));

        store.set("u1", json!({"ical": "b"})).await.unwrap();
        assert_eq!(listener.snapshots.recv().await, Some(Some(json!({"ical": "b"}))));

        store.delete("u1").await.unwrap();
        assert_eq!(listener.snapshots.recv().await, Some(None));
    }

    #[tokio::test]
    async fn test_cancelled_listener_is_removed() {
        let store = MemoryDocumentStore::new();
        let listener = store.listen("u1").await.unwrap();
        assert_eq!(store.listener_count("u1"), 1);

        listener.subscription.cancel();
        assert_eq!(store.listener_count("u1"), 0);
    }

    #[tokio::test]
    async fn test_failed_writes_leave_document_untouched() {
        let store = MemoryDocumentStore::new();
        store.set_fail_writes(true);
        assert!(store.set("u1", json!({})).await.is_err());
        assert!(store.get("u1").is_none());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_anonymous_sign_in_updates_watch() {
        let identity = MemoryIdentityProvider::new(AuthState::SignedOut);
        let rx = identity.watch();

        let uid = identity.sign_in_anonymously().await.unwrap();
        assert_eq!(uid, "anon-1");
        assert_eq!(*rx.borrow(), AuthState::SignedIn("anon-1".to_string()));
        assert_eq!(identity.sign_in_count(), 1);
    }
}
