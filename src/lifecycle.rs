//! The lifecycle manager: the orchestrator (spec §4.5).
//!
//! Wires together the authorization kernel, policy enforcer, envelope
//! encryption layer, persistence contract, audit sink, and event bus into
//! the six lifecycle operations. Grounded on the overall request-handling
//! shape of the teacher's service layer (`services/encryption_service.rs`
//! composing `EncryptionKeyRotationService` + `AuditService` behind one
//! entry point) rather than any single file — no teacher component plays
//! quite this orchestrator role, since the teacher's handlers call several
//! services directly rather than through one facade.
//!
//! **Audit responsibility.** The manager is the sole emitter of audit
//! entries: every one of the six operations calls `observe()` through its
//! own `audit` sink immediately after its mutation (or read) succeeds, never
//! before — per §4.5's failure atomicity, a failed `store.save`/`store.get`
//! must not produce an audit entry. `Store` implementations persist only;
//! they do not also emit audit themselves, so a secret's store and its
//! audit sink can never silently drift out of sync with each other the way
//! they would if both layers tried to own the same emission.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::audit::{self, AuditAction, AuditLogEntry, AuditSink};
use crate::authz::{allow_action, Action};
use crate::domain::{Identity, Policy, RotationHandlerId, Secret, SecretVersion};
use crate::envelope::EnvelopeKeyManager;
use crate::error::{CoreError, CoreResult};
use crate::events::{EventBus, SecretEvent, SecretEventKind};
use crate::policy_enforcer::enforce_policy;
use crate::store::Store;

/// Context handed to a rotation handler: everything it needs to produce the
/// next value without being given the current plaintext (handlers that want
/// the old value must fetch it themselves through a side channel; the core
/// never passes secret material to a handler it didn't itself generate).
pub struct RotationContext {
    pub secret_id: Uuid,
    pub tenant: String,
    pub name: String,
    pub current_version: u32,
}

/// A caller-registered strategy for producing a secret's next value during
/// rotation. The stored secret references a [`RotationHandlerId`]; the
/// runtime resolves it against a registry rather than embedding a closure
/// directly (spec §9 "Rotation handler as closure").
#[async_trait]
pub trait RotationHandler: Send + Sync {
    async fn produce(&self, ctx: &RotationContext) -> CoreResult<String>;
}

#[derive(Default)]
pub struct RotationHandlerRegistry {
    handlers: RwLock<HashMap<RotationHandlerId, Arc<dyn RotationHandler>>>,
}

impl RotationHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, id: impl Into<RotationHandlerId>, handler: Arc<dyn RotationHandler>) {
        self.handlers.write().await.insert(id.into(), handler);
    }

    async fn resolve(&self, id: &str) -> Option<Arc<dyn RotationHandler>> {
        self.handlers.read().await.get(id).cloned()
    }
}

pub struct LifecycleManager {
    envelope: Arc<EnvelopeKeyManager>,
    store: Arc<dyn Store>,
    audit: Arc<dyn AuditSink>,
    events: EventBus,
    rotation_handlers: RotationHandlerRegistry,
}

impl LifecycleManager {
    pub fn new(
        envelope: Arc<EnvelopeKeyManager>,
        store: Arc<dyn Store>,
        audit: Arc<dyn AuditSink>,
        events: EventBus,
    ) -> Self {
        Self {
            envelope,
            store,
            audit,
            events,
            rotation_handlers: RotationHandlerRegistry::new(),
        }
    }

    pub async fn register_rotation_handler(&self, id: impl Into<RotationHandlerId>, handler: Arc<dyn RotationHandler>) {
        self.rotation_handlers.register(id, handler).await;
    }

    /// Replaces every version's plaintext `value` with its envelope
    /// ciphertext and records the wrapping key id, ready for `store.save`.
    async fn seal(&self, secret: &Secret) -> CoreResult<Secret> {
        let mut sealed = Vec::with_capacity(secret.versions().len());
        for v in secret.versions() {
            let wrapped = self.envelope.encrypt(&v.value).await?;
            sealed.push(SecretVersion {
                version: v.version,
                created_at: v.created_at,
                value: wrapped.ciphertext,
                checksum: v.checksum.clone(),
                created_by: v.created_by.clone(),
                expires_at: v.expires_at,
                key_id: Some(wrapped.key_id),
            });
        }
        Ok(Secret::from_parts(
            secret.id,
            secret.name.clone(),
            secret.tenant.clone(),
            secret.policy.clone(),
            secret.created_at,
            secret.created_by.clone(),
            secret.description.clone(),
            secret.rotation_handler.clone(),
            sealed,
        ))
    }

    /// Reverses [`Self::seal`]: decrypts every version's ciphertext back to
    /// plaintext using the key id recorded on it, which may name a retired
    /// generation (§4.2's "backwards-compatible decryption").
    async fn unseal(&self, secret: Secret) -> CoreResult<Secret> {
        let mut plain = Vec::with_capacity(secret.versions().len());
        for v in secret.versions() {
            let key_id = v
                .key_id
                .as_deref()
                .ok_or_else(|| CoreError::Integrity("stored version carries no key id".to_string()))?;
            let value = self.envelope.decrypt(&v.value, key_id).await?;
            plain.push(SecretVersion {
                version: v.version,
                created_at: v.created_at,
                value,
                checksum: v.checksum.clone(),
                created_by: v.created_by.clone(),
                expires_at: v.expires_at,
                key_id: None,
            });
        }
        Ok(Secret::from_parts(
            secret.id,
            secret.name,
            secret.tenant,
            secret.policy,
            secret.created_at,
            secret.created_by,
            secret.description,
            secret.rotation_handler,
            plain,
        ))
    }

    async fn observe(&self, actor: &Identity, action: AuditAction, secret_id: Option<Uuid>) {
        let mut entry = AuditLogEntry::new(actor.subject.clone(), action, actor.tenant.clone());
        if let Some(id) = secret_id {
            entry = entry.with_secret_id(id.to_string());
        }
        audit::append_best_effort(&self.audit, entry).await;
    }

    pub async fn create_secret(
        &self,
        name: impl Into<String>,
        value: &str,
        policy: Policy,
        actor: &Identity,
        description: Option<String>,
        rotation_handler: Option<RotationHandlerId>,
        ttl_seconds: Option<i64>,
    ) -> CoreResult<Secret> {
        enforce_policy(value, &policy)?;
        allow_action(actor, &actor.tenant, Action::Create)?;

        let now = Utc::now();
        let version = SecretVersion {
            version: 1,
            created_at: now,
            value: value.to_string(),
            checksum: crate::crypto::checksum(value),
            created_by: actor.subject.clone(),
            expires_at: ttl_seconds.map(|s| now + Duration::seconds(s)),
            key_id: None,
        };

        let mut secret = Secret::new(name, actor.tenant.clone(), policy, actor.subject.clone(), version);
        secret.description = description;
        secret.rotation_handler = rotation_handler;

        let sealed = self.seal(&secret).await?;
        self.store.save(&sealed, &actor.subject, AuditAction::Create).await?;
        self.observe(actor, AuditAction::Create, Some(secret.id)).await;

        self.events
            .emit(SecretEvent::new(
                secret.id,
                secret.tenant.clone(),
                actor.subject.clone(),
                SecretEventKind::Created {
                    name: secret.name.clone(),
                    policy_name: secret.policy.name.clone(),
                    ttl_seconds,
                },
            ))
            .await;

        Ok(secret)
    }

    pub async fn put_secret(
        &self,
        id: Uuid,
        value: &str,
        actor: &Identity,
        ttl_seconds: Option<i64>,
    ) -> CoreResult<Secret> {
        let sealed = self.store.get(id).await?.ok_or(CoreError::NotFound)?;
        allow_action(actor, &sealed.tenant, Action::Put)?;

        let mut secret = self.unseal(sealed).await?;
        enforce_policy(value, &secret.policy)?;

        let now = Utc::now();
        let next = secret.next_version_number();
        secret.push_version(SecretVersion {
            version: next,
            created_at: now,
            value: value.to_string(),
            checksum: crate::crypto::checksum(value),
            created_by: actor.subject.clone(),
            expires_at: ttl_seconds.map(|s| now + Duration::seconds(s)),
            key_id: None,
        });

        let resealed = self.seal(&secret).await?;
        self.store.save(&resealed, &actor.subject, AuditAction::Put).await?;
        self.observe(actor, AuditAction::Put, Some(secret.id)).await;

        self.events
            .emit(SecretEvent::new(
                secret.id,
                secret.tenant.clone(),
                actor.subject.clone(),
                SecretEventKind::Updated {
                    version: next,
                    ttl_seconds,
                },
            ))
            .await;

        Ok(secret)
    }

    pub async fn rotate(&self, id: Uuid, actor: &Identity) -> CoreResult<Secret> {
        let sealed = self.store.get(id).await?.ok_or(CoreError::NotFound)?;
        allow_action(actor, &sealed.tenant, Action::Rotate)?;

        let mut secret = self.unseal(sealed).await?;
        let handler_id = secret.rotation_handler.clone().ok_or(CoreError::NoHandler)?;
        let handler = self.rotation_handlers.resolve(&handler_id).await.ok_or(CoreError::NoHandler)?;

        let ctx = RotationContext {
            secret_id: secret.id,
            tenant: secret.tenant.clone(),
            name: secret.name.clone(),
            current_version: secret.latest_version().version,
        };
        let new_value = handler.produce(&ctx).await?;
        enforce_policy(&new_value, &secret.policy)?;

        let next = secret.next_version_number();
        secret.push_version(SecretVersion {
            version: next,
            created_at: Utc::now(),
            value: new_value.clone(),
            checksum: crate::crypto::checksum(&new_value),
            created_by: actor.subject.clone(),
            expires_at: None,
            key_id: None,
        });

        let resealed = self.seal(&secret).await?;
        self.store.save(&resealed, &actor.subject, AuditAction::Rotate).await?;
        self.observe(actor, AuditAction::Rotate, Some(secret.id)).await;

        self.events
            .emit(SecretEvent::new(
                secret.id,
                secret.tenant.clone(),
                actor.subject.clone(),
                SecretEventKind::Rotated { version: next },
            ))
            .await;

        Ok(secret)
    }

    pub async fn get_secret(&self, id: Uuid, actor: &Identity) -> CoreResult<Secret> {
        let sealed = self.store.get(id).await?.ok_or(CoreError::NotFound)?;
        allow_action(actor, &sealed.tenant, Action::Get)?;

        let secret = self.unseal(sealed).await?;
        if secret.latest_version().is_expired() {
            self.events
                .emit(SecretEvent::new(
                    secret.id,
                    secret.tenant.clone(),
                    actor.subject.clone(),
                    SecretEventKind::Expired,
                ))
                .await;
            return Err(CoreError::Expired);
        }

        self.observe(actor, AuditAction::Get, Some(secret.id)).await;
        self.events
            .emit(SecretEvent::new(
                secret.id,
                secret.tenant.clone(),
                actor.subject.clone(),
                SecretEventKind::Accessed,
            ))
            .await;

        Ok(secret)
    }

    pub async fn list_secrets(&self, actor: &Identity) -> CoreResult<Vec<Secret>> {
        allow_action(actor, &actor.tenant, Action::List)?;

        let sealed = self.store.list_secrets(Some(&actor.tenant)).await?;
        let mut out = Vec::with_capacity(sealed.len());
        for secret in sealed {
            let secret = self.unseal(secret).await?;
            self.observe(actor, AuditAction::List, Some(secret.id)).await;
            out.push(secret);
        }
        Ok(out)
    }

    pub async fn delete_secret(&self, id: Uuid, actor: &Identity) -> CoreResult<()> {
        let sealed = self.store.get(id).await?.ok_or(CoreError::NotFound)?;
        allow_action(actor, &sealed.tenant, Action::Delete)?;

        self.store.delete(id, &actor.subject).await?;
        self.observe(actor, AuditAction::Delete, Some(id)).await;

        self.events
            .emit(SecretEvent::new(
                id,
                sealed.tenant.clone(),
                actor.subject.clone(),
                SecretEventKind::Deleted,
            ))
            .await;

        Ok(())
    }
}
