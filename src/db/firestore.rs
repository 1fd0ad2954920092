// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed document store.
//!
//! Profiles live in one collection keyed by uid. Live subscriptions use a
//! Firestore listener per document; the listener only reports changes, so
//! the current document is read once and delivered first.

use crate::db::{DocumentListener, DocumentStore, Subscription};
use crate::error::{Result, TimetableError};
use async_trait::async_trait;
use firestore::{FirestoreListenEvent, FirestoreListenerTarget, FirestoreMemListenStateStorage};
use tokio::sync::mpsc;

const PROFILE_TARGET: FirestoreListenerTarget = FirestoreListenerTarget::new(1_u32);

/// Firestore database client for profile documents.
#[derive(Clone)]
pub struct FirestoreDocumentStore {
    client: Option<firestore::FirestoreDb>,
    collection: String,
}

impl FirestoreDocumentStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str, collection: &str) -> Result<Self> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id, collection).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| TimetableError::Store(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, collection, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
            collection: collection.to_string(),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str, collection: &str) -> Result<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            TimetableError::Store(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            collection,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
            collection: collection.to_string(),
        })
    }

    /// Create an offline client. Every operation returns an error.
    pub fn new_mock() -> Self {
        Self {
            client: None,
            collection: crate::config::DEFAULT_PROFILE_COLLECTION.to_string(),
        }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb> {
        self.client
            .as_ref()
            .ok_or_else(|| TimetableError::Store("Database not connected (offline mode)".to_string()))
    }

    /// Read a document once.
    pub async fn get(&self, uid: &str) -> Result<Option<serde_json::Value>> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(&self.collection)
            .obj()
            .one(uid)
            .await
            .map_err(|e| TimetableError::Store(e.to_string()))
    }
}

#[async_trait]
impl DocumentStore for FirestoreDocumentStore {
    async fn listen(&self, uid: &str) -> Result<DocumentListener> {
        let client = self.get_client()?;
        let (tx, rx) = mpsc::unbounded_channel();

        let _ = tx.send(self.get(uid).await?);

        let mut listener = client
            .create_listener(FirestoreMemListenStateStorage::new())
            .await
            .map_err(|e| TimetableError::Store(format!("Failed to create listener: {}", e)))?;

        client
            .fluent()
            .select()
            .by_id_in(&self.collection)
            .batch_listen([uid.to_string()])
            .add_target(PROFILE_TARGET, &mut listener)
            .map_err(|e| TimetableError::Store(format!("Failed to add listen target: {}", e)))?;

        let doc_uid = uid.to_string();
        listener
            .start(move |event| {
                let tx = tx.clone();
                let doc_uid = doc_uid.clone();
                async move {
                    match event {
                        FirestoreListenEvent::DocumentChange(ref change) => {
                            if let Some(doc) = &change.document {
                                let value: serde_json::Value =
                                    firestore::FirestoreDb::deserialize_doc_to(doc)?;
                                let _ = tx.send(Some(value));
                            }
                        }
                        FirestoreListenEvent::DocumentDelete(_) => {
                            let _ = tx.send(None);
                        }
                        _ => {
                            tracing::trace!(uid = %doc_uid, "Ignoring listen event");
                        }
                    }
                    Ok(())
                }
            })
            .await
            .map_err(|e| TimetableError::Store(format!("Failed to start listener: {}", e)))?;

        tracing::debug!(uid, collection = %self.collection, "Listening to profile document");

        let subscription = Subscription::new(move || {
            let mut listener = listener;
            tokio::spawn(async move {
                if let Err(e) = listener.shutdown().await {
                    tracing::warn!(error = %e, "Failed to shut down Firestore listener");
                }
            });
        });

        Ok(DocumentListener {
            snapshots: rx,
            subscription,
        })
    }

    async fn set(&self, uid: &str, value: serde_json::Value) -> Result<()> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(&self.collection)
            .document_id(uid)
            .object(&value)
            .execute()
            .await
            .map_err(|e| TimetableError::Store(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, uid: &str) -> Result<()> {
        self.get_client()?
            .fluent()
            .delete()
            .from(self.collection.as_str())
            .document_id(uid)
            .execute()
            .await
            .map_err(|e| TimetableError::Store(e.to_string()))?;
        Ok(())
    }
}
