//! Object-storage backend.
//!
//! The teacher's own stack has no blob-storage client (its file uploads go
//! through `utils/file_storage.rs` directly to local disk). Grounded
//! instead on `raskell-io-shiioo`'s use of the `object_store` crate from
//! the reference pack: a vendor-neutral `ObjectStore` trait implemented for
//! S3, GCS, Azure, and local disk, matching this backend's requirement to
//! treat "key not found" the same way across vendors (spec §4.6: "a
//! not-found response from the vendor maps to an empty document, never an
//! error").
//!
//! Like the file backend, the whole document is stored as a single object
//! (one key) rather than one object per secret, so a `list_secrets` call
//! never has to paginate a bucket listing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use object_store::path::Path as ObjectPath;
use object_store::{Error as ObjectStoreError, ObjectStore};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::Secret;
use crate::error::{CoreError, CoreResult};
use crate::store::{Store, StoreAction};

type Document = HashMap<Uuid, Secret>;

pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    key: ObjectPath,
    lock: Mutex<()>,
}

impl ObjectStoreBackend {
    pub fn new(store: Arc<dyn ObjectStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: ObjectPath::from(key.into()),
            lock: Mutex::new(()),
        }
    }

    async fn read_document(&self) -> CoreResult<Document> {
        match self.store.get(&self.key).await {
            Ok(result) => {
                let bytes = result
                    .bytes()
                    .await
                    .map_err(|e| CoreError::StoreUnavailable(e.to_string()))?;
                if bytes.is_empty() {
                    return Ok(Document::new());
                }
                serde_json::from_slice(&bytes)
                    .map_err(|e| CoreError::Integrity(format!("corrupt store document: {e}")))
            }
            // A not-found vendor response is not an error condition for this
            // backend; it simply means the document has never been written.
            Err(ObjectStoreError::NotFound { .. }) => Ok(Document::new()),
            Err(e) => Err(CoreError::StoreUnavailable(e.to_string())),
        }
    }

    async fn write_document(&self, doc: &Document) -> CoreResult<()> {
        let bytes = serde_json::to_vec(doc).map_err(|e| CoreError::Internal(anyhow::anyhow!(e)))?;
        self.store
            .put(&self.key, bytes.into())
            .await
            .map_err(|e| CoreError::StoreUnavailable(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl Store for ObjectStoreBackend {
    async fn list_secrets(&self, tenant: Option<&str>) -> CoreResult<Vec<Secret>> {
        let _guard = self.lock.lock().await;
        let doc = self.read_document().await?;
        Ok(doc
            .into_values()
            .filter(|s| tenant.map(|t| s.tenant == t).unwrap_or(true))
            .collect())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Secret>> {
        let _guard = self.lock.lock().await;
        let doc = self.read_document().await?;
        Ok(doc.get(&id).cloned())
    }

    async fn save(&self, secret: &Secret, _actor: &str, _action: StoreAction) -> CoreResult<()> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read_document().await?;
        doc.insert(secret.id, secret.clone());
        self.write_document(&doc).await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid, _actor: &str) -> CoreResult<()> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read_document().await?;
        doc.remove(&id);
        self.write_document(&doc).await?;
        Ok(())
    }
}
