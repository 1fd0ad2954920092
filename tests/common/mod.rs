// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use timetable_sync::db::{AuthState, MemoryDocumentStore, MemoryIdentityProvider};
use timetable_sync::error::{Result, TimetableError};
use timetable_sync::models::Profile;
use timetable_sync::services::{FeedFetcher, OverrideStore};
use tokio::sync::Notify;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Read a file from tests/fixtures.
#[allow(dead_code)]
pub fn fixture(name: &str) -> String {
    let path = format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read {}: {}", path, e))
}

/// Feed fetcher serving canned bodies, with per-URL gates.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct FakeFetcher {
    bodies: Arc<DashMap<String, std::result::Result<String, String>>>,
    gates: Arc<DashMap<String, Arc<Notify>>>,
    calls: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, body: impl Into<String>) {
        self.bodies.insert(url.to_string(), Ok(body.into()));
    }

    pub fn fail(&self, url: &str, message: &str) {
        self.bodies.insert(url.to_string(), Err(message.to_string()));
    }

    /// Block fetches of `url` until the returned handle is notified.
    pub fn hold(&self, url: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.insert(url.to_string(), gate.clone());
        gate
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedFetcher for FakeFetcher {
    async fn fetch(&self, feed_url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gates.get(feed_url).map(|g| g.value().clone());
        if let Some(gate) = gate {
            gate.notified().await;
        }

        match self.bodies.get(feed_url).map(|b| b.value().clone()) {
            Some(Ok(body)) => Ok(body),
            Some(Err(message)) => Err(TimetableError::Network(message)),
            None => Err(TimetableError::Network(format!("HTTP 404 Not Found: {}", feed_url))),
        }
    }
}

/// Override store wired to in-memory fakes.
#[allow(dead_code)]
pub struct TestStore {
    pub identity: Arc<MemoryIdentityProvider>,
    pub documents: Arc<MemoryDocumentStore>,
    pub store: OverrideStore<Profile>,
}

#[allow(dead_code)]
pub fn test_store(initial: AuthState) -> TestStore {
    let identity = Arc::new(MemoryIdentityProvider::new(initial));
    let documents = Arc::new(MemoryDocumentStore::new());
    let store = OverrideStore::new(identity.clone(), documents.clone());
    TestStore {
        identity,
        documents,
        store,
    }
}

/// Wait until `pred` holds for the receiver's value, failing after a second.
#[allow(dead_code)]
pub async fn wait_until<T>(rx: &mut tokio::sync::watch::Receiver<T>, pred: impl FnMut(&T) -> bool) {
    tokio::time::timeout(Duration::from_secs(1), rx.wait_for(pred))
        .await
        .expect("Timed out waiting for state")
        .expect("State channel closed");
}
