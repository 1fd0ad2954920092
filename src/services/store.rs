// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live-bound override store.
//!
//! Binds one profile document to the current identity:
//! 1. Identity changes (re)start a document subscription, cancelling the
//!    previous one first so no snapshot of the old identity can arrive.
//! 2. Every snapshot replaces the cached value wholesale.
//! 3. Writes go straight to the document store. The cached value only
//!    changes when the store echoes the write back, so a read right after
//!    `set_data` may still see the old value.
//!
//! Writing without an identity first creates an anonymous one.

use crate::db::{AuthState, DocumentListener, DocumentStore, IdentityProvider, Uid};
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Snapshot of the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreState<T> {
    /// Document contents; `None` without identity or document
    pub data: Option<T>,
    /// True while the identity or the document subscription is resolving
    pub loading: bool,
    pub uid: Option<Uid>,
}

impl<T> Default for StoreState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: true,
            uid: None,
        }
    }
}

type UpdateFn<T> = Box<dyn FnOnce(Option<T>) -> Option<T> + Send>;

/// A write: a new value, or a function of the previous one.
pub enum Update<T> {
    Replace(Option<T>),
    Apply(UpdateFn<T>),
}

impl<T> Update<T> {
    /// Store `value`.
    pub fn set(value: T) -> Self {
        Update::Replace(Some(value))
    }

    /// Delete the document.
    pub fn delete() -> Self {
        Update::Replace(None)
    }

    /// Compute the new value from the last snapshot. Returning `None` deletes.
    pub fn apply(f: impl FnOnce(Option<T>) -> Option<T> + Send + 'static) -> Self {
        Update::Apply(Box::new(f))
    }

    fn resolve(self, previous: Option<T>) -> Option<T> {
        match self {
            Update::Replace(value) => value,
            Update::Apply(f) => f(previous),
        }
    }
}

/// Aborts the driver task once the last store handle is gone.
struct DriverHandle(JoinHandle<()>);

impl Drop for DriverHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Identity-keyed, live-bound handle to one stored document.
pub struct OverrideStore<T> {
    identity: Arc<dyn IdentityProvider>,
    documents: Arc<dyn DocumentStore>,
    state: watch::Receiver<StoreState<T>>,
    _driver: Arc<DriverHandle>,
}

impl<T> Clone for OverrideStore<T> {
    fn clone(&self) -> Self {
        Self {
            identity: self.identity.clone(),
            documents: self.documents.clone(),
            state: self.state.clone(),
            _driver: self._driver.clone(),
        }
    }
}

impl<T> OverrideStore<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Start tracking the identity provider. Must be called within a Tokio runtime.
    pub fn new(identity: Arc<dyn IdentityProvider>, documents: Arc<dyn DocumentStore>) -> Self {
        let (tx, rx) = watch::channel(StoreState::default());
        let driver = Driver {
            identity: identity.watch(),
            documents: documents.clone(),
            state: tx,
            active: None,
            _payload: PhantomData,
        };
        let handle = tokio::spawn(driver.run());

        Self {
            identity,
            documents,
            state: rx,
            _driver: Arc::new(DriverHandle(handle)),
        }
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<StoreState<T>> {
        self.state.clone()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> StoreState<T> {
        self.state.borrow().clone()
    }

    pub fn data(&self) -> Option<T> {
        self.state.borrow().data.clone()
    }

    pub fn loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Wait until neither identity nor document is loading.
    pub async fn settled(&self) -> StoreState<T> {
        let mut rx = self.subscribe();
        let state = match rx.wait_for(|s| !s.loading).await {
            Ok(state) => state.clone(),
            Err(_) => self.snapshot(),
        };
        state
    }

    /// Write the document.
    ///
    /// Functional updates see the last delivered snapshot. Without an
    /// identity an anonymous one is created first. A `None` result deletes
    /// the document. Failures are returned, not retried.
    pub async fn set_data(&self, update: Update<T>) -> Result<()> {
        let previous = self.data();
        let next = update.resolve(previous);

        let current = self.identity.watch().borrow().uid().map(str::to_string);
        let uid = match current {
            Some(uid) => uid,
            None => {
                let uid = self.identity.sign_in_anonymously().await?;
                tracing::info!(uid = %uid, "Created anonymous identity for first write");
                uid
            }
        };

        match next {
            Some(value) => {
                let value = serde_json::to_value(&value)?;
                self.documents.set(&uid, value).await?;
                tracing::debug!(uid = %uid, "Stored profile document");
            }
            None => {
                self.documents.delete(&uid).await?;
                tracing::debug!(uid = %uid, "Deleted profile document");
            }
        }
        Ok(())
    }
}

struct ActiveDocument {
    uid: Uid,
    listener: DocumentListener,
}

/// Processes identity changes and document snapshots one at a time.
struct Driver<T> {
    identity: watch::Receiver<AuthState>,
    documents: Arc<dyn DocumentStore>,
    state: watch::Sender<StoreState<T>>,
    active: Option<ActiveDocument>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Driver<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    async fn run(mut self) {
        let initial = self.identity.borrow_and_update().clone();
        self.switch(initial).await;

        loop {
            tokio::select! {
                changed = self.identity.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Identity provider closed, stopping override store");
                        break;
                    }
                    let auth = self.identity.borrow_and_update().clone();
                    self.switch(auth).await;
                }
                snapshot = next_snapshot(&mut self.active) => {
                    match snapshot {
                        Some(value) => self.apply(value),
                        None => self.subscription_closed(),
                    }
                }
            }
        }

        self.cancel_active();
    }

    async fn switch(&mut self, auth: AuthState) {
        let next_uid = auth.uid().map(str::to_string);
        if let (Some(active), Some(uid)) = (&self.active, &next_uid) {
            if active.uid == *uid {
                return;
            }
        }

        self.cancel_active();

        match (auth, next_uid) {
            (AuthState::Resolving, _) => {
                self.state.send_replace(StoreState::default());
            }
            (_, None) => {
                tracing::debug!("Signed out, clearing profile");
                self.state.send_replace(StoreState {
                    data: None,
                    loading: false,
                    uid: None,
                });
            }
            (_, Some(uid)) => {
                self.state.send_replace(StoreState {
                    data: None,
                    loading: true,
                    uid: Some(uid.clone()),
                });

                match self.documents.listen(&uid).await {
                    Ok(listener) => {
                        tracing::debug!(uid = %uid, "Subscribed to profile document");
                        self.active = Some(ActiveDocument { uid, listener });
                    }
                    Err(e) => {
                        tracing::error!(uid = %uid, error = %e, "Failed to subscribe to profile");
                        self.state.send_modify(|s| s.loading = false);
                    }
                }
            }
        }
    }

    fn apply(&mut self, value: Option<serde_json::Value>) {
        let data = match value.map(serde_json::from_value::<T>) {
            Some(Ok(data)) => Some(data),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Ignoring malformed profile document");
                None
            }
            None => None,
        };

        self.state.send_modify(|s| {
            s.data = data;
            s.loading = false;
        });
    }

    fn subscription_closed(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::warn!(uid = %active.uid, "Profile subscription ended");
        }
        self.state.send_modify(|s| s.loading = false);
    }

    fn cancel_active(&mut self) {
        if let Some(active) = self.active.take() {
            active.listener.subscription.cancel();
        }
    }
}

/// Next snapshot of the active document; pending forever when there is none.
async fn next_snapshot(active: &mut Option<ActiveDocument>) -> Option<Option<serde_json::Value>> {
    match active {
        Some(doc) => doc.listener.snapshots.recv().await,
        None => std::future::pending().await,
    }
}
