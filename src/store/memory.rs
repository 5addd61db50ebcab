//! In-memory reference backend.
//!
//! Grounded on `scrappyAI-Toka`'s `MemoryVault` (the in-memory counterpart
//! to a persistent event vault, used for tests and local development). Used
//! here as the fixture the lifecycle-manager scenario tests run against,
//! and as a trivial backend for single-process deployments with no
//! durability requirement.
//!
//! Persistence only: audit emission for every state change is the
//! lifecycle manager's responsibility (see `lifecycle.rs`'s module doc), not
//! this store's — `actor`/`action` are accepted per the `Store` trait shape
//! but unused here.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{Identity, Secret};
use crate::error::CoreResult;
use crate::store::{Store, StoreAction};

#[derive(Default)]
pub struct MemoryStore {
    secrets: Arc<RwLock<HashMap<Uuid, Secret>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Helper for tests that want an `Identity`-shaped tenant filter
    /// without constructing a full lifecycle manager.
    pub async fn list_for(&self, identity: &Identity) -> Vec<Secret> {
        self.secrets
            .read()
            .await
            .values()
            .filter(|s| s.tenant == identity.tenant)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_secrets(&self, tenant: Option<&str>) -> CoreResult<Vec<Secret>> {
        let secrets = self.secrets.read().await;
        Ok(secrets
            .values()
            .filter(|s| tenant.map(|t| s.tenant == t).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Secret>> {
        Ok(self.secrets.read().await.get(&id).cloned())
    }

    async fn save(&self, secret: &Secret, _actor: &str, _action: StoreAction) -> CoreResult<()> {
        self.secrets.write().await.insert(secret.id, secret.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid, _actor: &str) -> CoreResult<()> {
        self.secrets.write().await.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Policy, SecretVersion};
    use chrono::Utc;

    fn secret() -> Secret {
        Secret::new(
            "db-pass",
            "default",
            Policy::default(),
            "tester",
            SecretVersion {
                version: 1,
                created_at: Utc::now(),
                value: "encrypted-token".into(),
                checksum: "deadbeef".into(),
                created_by: "tester".into(),
                expires_at: None,
                key_id: None,
            },
        )
    }

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let store = MemoryStore::new();
        let s = secret();
        store.save(&s, "tester", StoreAction::Create).await.unwrap();
        let loaded = store.get(s.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, s.id);
    }

    #[tokio::test]
    async fn list_filters_by_tenant() {
        let store = MemoryStore::new();
        let mut other = secret();
        other.tenant = "other-tenant".to_string();
        store.save(&secret(), "tester", StoreAction::Create).await.unwrap();
        store.save(&other, "tester", StoreAction::Create).await.unwrap();

        let filtered = store.list_secrets(Some("default")).await.unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_the_only_copy() {
        let store = MemoryStore::new();
        let s = secret();
        store.save(&s, "tester", StoreAction::Create).await.unwrap();
        store.delete(s.id, "tester").await.unwrap();
        assert!(store.get(s.id).await.unwrap().is_none());
    }
}
