//! services/api/src/adapters/accounts.rs
//!
//! Account and auth-token bookkeeping layered over any `KeyValueStore`.
//! Users are stored under `user_<username>`, tokens under `authToken_<token>`.

use async_trait::async_trait;
use attendance_core::domain::{AuthToken, User, UserCredentials};
use attendance_core::ports::{AccountService, KeyValueStore, PortError, PortResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct KvAccountAdapter {
    kv: Arc<dyn KeyValueStore>,
    /// Serializes the check-then-insert of `create_user`.
    registration: Mutex<()>,
}

impl KvAccountAdapter {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            registration: Mutex::new(()),
        }
    }

    async fn load_credentials(&self, username: &str) -> PortResult<Option<UserCredentials>> {
        match self.kv.get(&user_key(username)).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| PortError::Unexpected(format!("Corrupt account record: {e}"))),
            None => Ok(None),
        }
    }
}

fn user_key(username: &str) -> String {
    format!("user_{username}")
}

fn token_key(token: &str) -> String {
    format!("authToken_{token}")
}

fn to_json<T: serde::Serialize>(value: &T) -> PortResult<String> {
    serde_json::to_string(value).map_err(|e| PortError::Unexpected(e.to_string()))
}

#[async_trait]
impl AccountService for KvAccountAdapter {
    async fn create_user(&self, user: User, password_hash: &str) -> PortResult<User> {
        let _guard = self.registration.lock().await;
        if self.load_credentials(&user.username).await?.is_some() {
            return Err(PortError::Conflict(format!(
                "Username '{}' is already registered",
                user.username
            )));
        }

        let credentials = UserCredentials {
            user: user.clone(),
            password_hash: password_hash.to_string(),
        };
        self.kv
            .set(&user_key(&user.username), &to_json(&credentials)?)
            .await?;
        info!(username = %user.username, "Registered new user");
        Ok(user)
    }

    async fn get_credentials(&self, username: &str) -> PortResult<UserCredentials> {
        self.load_credentials(username)
            .await?
            .ok_or_else(|| PortError::NotFound(format!("User '{username}'")))
    }

    async fn create_auth_token(
        &self,
        token: &str,
        username: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let record = AuthToken {
            token: token.to_string(),
            username: username.to_string(),
            expires_at,
        };
        self.kv.set(&token_key(token), &to_json(&record)?).await
    }

    async fn validate_auth_token(&self, token: &str) -> PortResult<User> {
        let raw = self
            .kv
            .get(&token_key(token))
            .await?
            .ok_or(PortError::Unauthorized)?;
        let record: AuthToken = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!("Discarding unreadable auth token record: {}", e);
                self.kv.remove(&token_key(token)).await?;
                return Err(PortError::Unauthorized);
            }
        };

        if record.expires_at <= Utc::now() {
            self.kv.remove(&token_key(token)).await?;
            return Err(PortError::Unauthorized);
        }

        self.load_credentials(&record.username)
            .await?
            .map(|credentials| credentials.user)
            .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_token(&self, token: &str) -> PortResult<()> {
        self.kv.remove(&token_key(token)).await
    }
}
