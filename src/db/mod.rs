// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Document store and identity provider capabilities.
//!
//! The override store talks to both through these traits so that the
//! Firestore/Identity Toolkit backends can be swapped for in-memory fakes.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDocumentStore;
pub use memory::{MemoryDocumentStore, MemoryIdentityProvider};

use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

/// Identity (user id) that owns one profile document.
pub type Uid = String;

/// Identity state reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// The provider has not reported yet.
    #[default]
    Resolving,
    SignedOut,
    SignedIn(Uid),
}

impl AuthState {
    pub fn uid(&self) -> Option<&str> {
        match self {
            AuthState::SignedIn(uid) => Some(uid.as_str()),
            _ => None,
        }
    }
}

/// Cancellation handle for a live subscription.
///
/// Cancelling (or dropping) the handle stops further deliveries.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Live view of one document: every snapshot is the whole document, or
/// `None` when it does not exist.
#[derive(Debug)]
pub struct DocumentListener {
    pub snapshots: mpsc::UnboundedReceiver<Option<serde_json::Value>>,
    pub subscription: Subscription,
}

/// Key-value document service with live subscriptions, one document per uid.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Subscribe to a document. The current snapshot is delivered first.
    async fn listen(&self, uid: &str) -> Result<DocumentListener>;

    /// Replace the whole document.
    async fn set(&self, uid: &str, value: serde_json::Value) -> Result<()>;

    async fn delete(&self, uid: &str) -> Result<()>;
}

/// Source of identities.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Identity changes, latest value first.
    fn watch(&self) -> watch::Receiver<AuthState>;

    /// Create a new anonymous identity and make it current.
    async fn sign_in_anonymously(&self) -> Result<Uid>;
}
