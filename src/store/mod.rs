//! The pluggable persistence contract (spec §4.6) and its backends.
//!
//! Grounded on `toka-vault`'s `EventBus` trait shape (an `async_trait` on a
//! `Send + Sync` type) from the reference pack — the teacher's own
//! repositories never need object-safety since handlers hold a concrete
//! `PgPool`-backed repo directly, but an abstract `Store` with three
//! interchangeable implementations must be usable as `dyn Store`.

pub mod file;
pub mod memory;
pub mod object;
pub mod postgres;

use async_trait::async_trait;

use crate::domain::Secret;
use crate::error::CoreResult;

/// Lifecycle verb a `save` call is performed on behalf of. Backends accept
/// `actor`/`action` as part of the trait contract but persistence is all
/// they do with them: the audit entry for "every save call MUST also emit a
/// corresponding audit entry" (spec §4.6) is emitted exactly once, by
/// `LifecycleManager`, immediately after the matching store call succeeds —
/// see `lifecycle.rs`'s module doc.
pub use crate::audit::AuditAction as StoreAction;

#[async_trait]
pub trait Store: Send + Sync {
    async fn list_secrets(&self, tenant: Option<&str>) -> CoreResult<Vec<Secret>>;
    async fn get(&self, id: uuid::Uuid) -> CoreResult<Option<Secret>>;
    async fn save(&self, secret: &Secret, actor: &str, action: StoreAction) -> CoreResult<()>;
    async fn delete(&self, id: uuid::Uuid, actor: &str) -> CoreResult<()>;
}
