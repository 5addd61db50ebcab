//! Lifecycle event notification (spec §6 "event collaborator", §9 design
//! note "Events as untyped metadata").
//!
//! The spec's source represents event metadata as an untyped map; per the
//! design note we prefer a tagged enum with typed fields per event kind,
//! deriving the stable string-keyed metadata map only at the serialization
//! boundary (`SecretEvent::metadata`). Grounded on `services/audit_service.rs`'s
//! `serde_json::json!` event payload construction and on `toka-vault`'s
//! `EventBus`/`EventSink` trait for fire-and-forget async delivery.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecretEventKind {
    Created {
        name: String,
        policy_name: String,
        ttl_seconds: Option<i64>,
    },
    Updated {
        version: u32,
        ttl_seconds: Option<i64>,
    },
    Rotated {
        version: u32,
    },
    Deleted,
    Accessed,
    Expired,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SecretEvent {
    pub secret_id: Uuid,
    pub tenant: String,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    #[serde(flatten)]
    pub kind: SecretEventKind,
}

impl SecretEvent {
    pub fn new(secret_id: Uuid, tenant: impl Into<String>, actor: impl Into<String>, kind: SecretEventKind) -> Self {
        Self {
            secret_id,
            tenant: tenant.into(),
            timestamp: Utc::now(),
            actor: actor.into(),
            kind,
        }
    }

    /// Flattens the typed payload into a stable string-valued map, for
    /// collaborators (webhook transport, CLI) that only understand the
    /// untyped `metadata` shape described in the spec's data model.
    pub fn metadata(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        match &self.kind {
            SecretEventKind::Created {
                name,
                policy_name,
                ttl_seconds,
            } => {
                map.insert("name".to_string(), name.clone());
                map.insert("policy_name".to_string(), policy_name.clone());
                if let Some(ttl) = ttl_seconds {
                    map.insert("ttl_seconds".to_string(), ttl.to_string());
                }
            }
            SecretEventKind::Updated { version, ttl_seconds } => {
                map.insert("version".to_string(), version.to_string());
                if let Some(ttl) = ttl_seconds {
                    map.insert("ttl_seconds".to_string(), ttl.to_string());
                }
            }
            SecretEventKind::Rotated { version } => {
                map.insert("version".to_string(), version.to_string());
            }
            SecretEventKind::Deleted | SecretEventKind::Accessed | SecretEventKind::Expired => {}
        }
        map
    }
}

/// Delivery is best-effort and asynchronous (spec §6); a sink that fails
/// never rolls back the lifecycle operation that produced the event.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: SecretEvent) -> anyhow::Result<()>;
}

/// Fans an event out to a fixed set of sinks, logging (not propagating)
/// any individual sink failure.
pub struct EventBus {
    sinks: Vec<std::sync::Arc<dyn EventSink>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with_sink(mut self, sink: std::sync::Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub async fn emit(&self, event: SecretEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.publish(event.clone()).await {
                tracing::warn!(error = %e, "event sink delivery failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSink(Arc<AtomicUsize>);

    #[async_trait]
    impl EventSink for CountingSink {
        async fn publish(&self, _event: SecretEvent) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl EventSink for FailingSink {
        async fn publish(&self, _event: SecretEvent) -> anyhow::Result<()> {
            anyhow::bail!("delivery failed")
        }
    }

    #[tokio::test]
    async fn bus_fans_out_to_every_sink() {
        let counter = Arc::new(AtomicUsize::new(0));
        let bus = EventBus::new().with_sink(Arc::new(CountingSink(counter.clone())));
        bus.emit(SecretEvent::new(Uuid::new_v4(), "default", "tester", SecretEventKind::Deleted))
            .await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn a_failing_sink_does_not_stop_delivery_to_others() {
        let counter = Arc::new(AtomicUsize::new(0));
        let bus = EventBus::new()
            .with_sink(Arc::new(FailingSink))
            .with_sink(Arc::new(CountingSink(counter.clone())));
        bus.emit(SecretEvent::new(Uuid::new_v4(), "default", "tester", SecretEventKind::Deleted))
            .await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn created_metadata_flattens_optional_ttl() {
        let event = SecretEvent::new(
            Uuid::new_v4(),
            "default",
            "tester",
            SecretEventKind::Created {
                name: "db-pass".into(),
                policy_name: "default".into(),
                ttl_seconds: Some(3600),
            },
        );
        let meta = event.metadata();
        assert_eq!(meta.get("name"), Some(&"db-pass".to_string()));
        assert_eq!(meta.get("ttl_seconds"), Some(&"3600".to_string()));
    }
}
