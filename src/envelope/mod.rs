//! Envelope key manager (spec §4.2).
//!
//! Holds a keyed collection of [`EncryptionKey`] records, exactly one of
//! which is active at a time. Mirrors `EncryptionKeyRotationService`
//! (`encryption_key_rotation_service.rs`) but keeps key material only in
//! memory, deriving each data-encryption key (DEK) from the master key via
//! Argon2 (a password-based KDF, the "scrypt or equivalent" the spec calls
//! for) salted with the key's own id.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::crypto;
use crate::error::{CoreError, CoreResult};

/// A single data-encryption key. Key bytes never leave this process.
#[derive(Clone)]
pub struct EncryptionKey {
    pub id: String,
    key_bytes: [u8; 32],
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

/// An encrypted value together with the key generation it was wrapped under.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Envelope {
    pub ciphertext: String,
    pub key_id: String,
}

fn derive_dek(master_key: &[u8], key_id: &str) -> CoreResult<[u8; 32]> {
    let mut out = [0u8; 32];
    Argon2::default()
        .hash_password_into(master_key, key_id.as_bytes(), &mut out)
        .map_err(|e| CoreError::Internal(anyhow::anyhow!("key derivation failed: {e}")))?;
    Ok(out)
}

struct State {
    keys: Vec<EncryptionKey>,
}

/// Manages the active/retired generations of data-encryption keys.
///
/// Internal state is an `Arc<RwLock<_>>`; every public method takes the lock
/// only for the duration of the in-memory mutation/read and never holds it
/// across an `.await` (see DESIGN.md's concurrency note).
pub struct EnvelopeKeyManager {
    master_key: Vec<u8>,
    rotation_days: i64,
    state: Arc<RwLock<State>>,
}

impl EnvelopeKeyManager {
    /// Creates a manager with one freshly generated active key.
    pub fn new(master_key: impl Into<Vec<u8>>, rotation_days: i64) -> CoreResult<Self> {
        let master_key = master_key.into();
        let id = Uuid::new_v4().to_string();
        let key_bytes = derive_dek(&master_key, &id)?;
        let key = EncryptionKey {
            id,
            key_bytes,
            created_at: Utc::now(),
            expires_at: None,
            is_active: true,
        };

        Ok(Self {
            master_key,
            rotation_days,
            state: Arc::new(RwLock::new(State { keys: vec![key] })),
        })
    }

    /// Encrypts `plaintext` under the currently active key.
    pub async fn encrypt(&self, plaintext: &str) -> CoreResult<Envelope> {
        let state = self.state.read().await;
        let active = state
            .keys
            .iter()
            .find(|k| k.is_active)
            .expect("invariant: at least one active key always exists");

        let ciphertext = crypto::encrypt(plaintext, &active.key_bytes)?;
        Ok(Envelope {
            ciphertext,
            key_id: active.id.clone(),
        })
    }

    /// Decrypts a value wrapped under `key_id`, which may be retired.
    pub async fn decrypt(&self, ciphertext: &str, key_id: &str) -> CoreResult<String> {
        let state = self.state.read().await;
        let key = state
            .keys
            .iter()
            .find(|k| k.id == key_id)
            .ok_or_else(|| CoreError::KeyNotFound(key_id.to_string()))?;

        crypto::decrypt(ciphertext, &key.key_bytes)
    }

    /// Generates a new active key, demoting the previous active key to
    /// retired-but-decryptable. Returns the new key's id.
    pub async fn rotate_key(&self) -> CoreResult<String> {
        let mut state = self.state.write().await;

        for key in state.keys.iter_mut() {
            key.is_active = false;
        }

        let id = Uuid::new_v4().to_string();
        let key_bytes = derive_dek(&self.master_key, &id)?;
        state.keys.push(EncryptionKey {
            id: id.clone(),
            key_bytes,
            created_at: Utc::now(),
            expires_at: None,
            is_active: true,
        });

        tracing::warn!("encryption key rotated, new active key id={id}");
        Ok(id)
    }

    /// Whether the active key has exceeded the configured rotation age.
    pub async fn should_rotate_key(&self) -> bool {
        let state = self.state.read().await;
        match state.keys.iter().find(|k| k.is_active) {
            Some(active) => Utc::now() - active.created_at > Duration::days(self.rotation_days),
            None => true,
        }
    }

    /// Purges retired keys past their `expires_at`. Callers are responsible
    /// for ensuring no unexpired ciphertext still references a purged key.
    pub async fn cleanup_expired_keys(&self) {
        let now = Utc::now();
        let mut state = self.state.write().await;
        state.keys.retain(|k| {
            k.is_active
                || match k.expires_at {
                    Some(exp) => exp > now,
                    None => true,
                }
        });
    }

    /// Snapshot of every known key id and whether it is currently active.
    pub async fn key_ids(&self) -> Vec<(String, bool)> {
        let state = self.state.read().await;
        state.keys.iter().map(|k| (k.id.clone(), k.is_active)).collect()
    }
}

/// Suggested polling cadence for a background rotation-age check.
pub fn default_check_interval() -> StdDuration {
    StdDuration::from_secs(3600)
}
