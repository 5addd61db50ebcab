//! Append-only audit sink (spec §4.7).
//!
//! Grounded on `services/audit_service.rs` / `services/comprehensive_audit_service.rs`:
//! one JSON object per event, built the same way the teacher builds its
//! `serde_json::json!` event payloads, except written to an append-only
//! line-delimited file instead of a Postgres table — the core has no
//! database dependency of its own for audit (§6's `audit_log_path`).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Put,
    Rotate,
    Get,
    List,
    Delete,
}

#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: DateTime<Utc>,
    pub subject: String,
    pub action: AuditAction,
    pub secret_id: Option<String>,
    pub tenant: String,
    pub metadata: HashMap<String, String>,
}

impl AuditLogEntry {
    pub fn new(subject: impl Into<String>, action: AuditAction, tenant: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            subject: subject.into(),
            action,
            secret_id: None,
            tenant: tenant.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_secret_id(mut self, id: impl Into<String>) -> Self {
        self.secret_id = Some(id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A append-only sink for [`AuditLogEntry`] records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: AuditLogEntry) -> anyhow::Result<()>;
}

/// Writes one JSON object per line to a file opened in append mode,
/// flushing after every write.
pub struct FileAuditSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn append(&self, entry: AuditLogEntry) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;

        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// In-memory sink for tests and for deployments without a configured
/// `audit_log_path`.
#[derive(Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditLogEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, entry: AuditLogEntry) -> anyhow::Result<()> {
        self.entries.lock().await.push(entry);
        Ok(())
    }
}

/// Wraps a sink, ensuring a failed `append` becomes a logged warning rather
/// than a propagated error — per spec §4.7: "an unavailable audit sink must
/// not silently succeed; operations continue but log a local warning."
pub async fn append_best_effort(sink: &Arc<dyn AuditSink>, entry: AuditLogEntry) {
    if let Err(e) = sink.append(entry).await {
        tracing::warn!(error = %e, "audit sink unavailable; continuing without durable audit entry");
    }
}

impl std::fmt::Debug for AuditLogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogEntry")
            .field("timestamp", &self.timestamp)
            .field("subject", &self.subject)
            .field("action", &self.action)
            .field("secret_id", &self.secret_id)
            .field("tenant", &self.tenant)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_sink_accumulates_entries() {
        let sink = MemoryAuditSink::new();
        sink.append(AuditLogEntry::new("alice", AuditAction::Create, "default"))
            .await
            .unwrap();
        assert_eq!(sink.entries().await.len(), 1);
    }

    #[tokio::test]
    async fn file_sink_appends_one_json_line_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let sink = FileAuditSink::new(&path);

        sink.append(AuditLogEntry::new("alice", AuditAction::Create, "default"))
            .await
            .unwrap();
        sink.append(AuditLogEntry::new("bob", AuditAction::Get, "default"))
            .await
            .unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: AuditLogEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.subject, "alice");
    }
}
