// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity Toolkit client for anonymous identities.
//!
//! Only the anonymous sign-up call is implemented; the resulting uid keys the
//! profile document.

use crate::config::ConfigError;
use crate::db::{AuthState, IdentityProvider, Uid};
use crate::error::{Result, TimetableError};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::watch;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Identity provider backed by Identity Toolkit REST calls.
pub struct IdentityToolkitAuth {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    state: watch::Sender<AuthState>,
}

/// Response of `accounts:signUp`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpResponse {
    pub local_id: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl IdentityToolkitAuth {
    /// Start signed out.
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_state(api_key, AuthState::SignedOut)
    }

    /// Resume an identity obtained earlier.
    pub fn with_uid(api_key: Option<String>, uid: impl Into<Uid>) -> Self {
        Self::with_state(api_key, AuthState::SignedIn(uid.into()))
    }

    fn with_state(api_key: Option<String>, initial: AuthState) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            http: reqwest::Client::new(),
            base_url: IDENTITY_TOOLKIT_URL.to_string(),
            api_key,
            state,
        }
    }

    /// Point at a different endpoint (e.g. the auth emulator).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn sign_out(&self) {
        self.state.send_replace(AuthState::SignedOut);
    }

    async fn sign_up(&self) -> Result<SignUpResponse> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ConfigError::Missing("FIREBASE_API_KEY"))?;

        let response = self
            .http
            .post(format!("{}/accounts:signUp", self.base_url))
            .query(&[("key", api_key)])
            .json(&serde_json::json!({ "returnSecureToken": true }))
            .send()
            .await
            .map_err(|e| TimetableError::Identity(format!("Sign-up request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TimetableError::Identity(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| TimetableError::Identity(format!("Invalid sign-up response: {}", e)))
    }
}

#[async_trait]
impl IdentityProvider for IdentityToolkitAuth {
    fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    async fn sign_in_anonymously(&self) -> Result<Uid> {
        let account = self.sign_up().await?;
        tracing::info!(uid = %account.local_id, "Signed up anonymous identity");
        self.state
            .send_replace(AuthState::SignedIn(account.local_id.clone()));
        Ok(account.local_id)
    }
}
