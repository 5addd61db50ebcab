//! The secret aggregate and its version history (spec §3).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::policy::Policy;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct SecretVersion {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    /// Plaintext value. Never persisted in the clear — stores encrypt this
    /// field through the envelope layer before serializing and decrypt it
    /// on load (§4.6).
    pub value: String,
    /// SHA-256 hex digest of `value`, retained post-encryption for
    /// integrity checks and drift detection.
    pub checksum: String,
    pub created_by: String,
    pub expires_at: Option<DateTime<Utc>>,
    /// Id of the envelope key `value` is wrapped under. `None` while the
    /// version holds plaintext in memory; set by the lifecycle manager the
    /// moment before a version is handed to `store.save`, so a retired key
    /// can still be located on decrypt after rotation (§4.2, §4.6).
    #[serde(default)]
    pub key_id: Option<String>,
}

impl SecretVersion {
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(exp) => exp <= Utc::now(),
            None => false,
        }
    }
}

/// A reference to a caller-registered rotation strategy. The core resolves
/// this id against a registry the caller supplies; it never embeds a
/// closure directly (spec §9 design note).
pub type RotationHandlerId = String;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Secret {
    pub id: Uuid,
    pub name: String,
    pub tenant: String,
    pub policy: Policy,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub description: Option<String>,
    pub rotation_handler: Option<RotationHandlerId>,
    /// Ordered by ascending `version`; invariant: always non-empty.
    versions: Vec<SecretVersion>,
}

impl Secret {
    pub fn new(
        name: impl Into<String>,
        tenant: impl Into<String>,
        policy: Policy,
        created_by: impl Into<String>,
        first_version: SecretVersion,
    ) -> Self {
        debug_assert_eq!(first_version.version, 1);
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            tenant: tenant.into(),
            policy,
            created_at: Utc::now(),
            created_by: created_by.into(),
            description: None,
            rotation_handler: None,
            versions: vec![first_version],
        }
    }

    /// Reconstructs a secret from persisted parts. Used by store backends;
    /// bypasses `new`'s "first version is 1" assumption since a reloaded
    /// secret may carry any history.
    pub fn from_parts(
        id: Uuid,
        name: String,
        tenant: String,
        policy: Policy,
        created_at: DateTime<Utc>,
        created_by: String,
        description: Option<String>,
        rotation_handler: Option<RotationHandlerId>,
        mut versions: Vec<SecretVersion>,
    ) -> Self {
        versions.sort_by_key(|v| v.version);
        Self {
            id,
            name,
            tenant,
            policy,
            created_at,
            created_by,
            description,
            rotation_handler,
            versions,
        }
    }

    pub fn versions(&self) -> &[SecretVersion] {
        &self.versions
    }

    /// The version with the greatest `version` number — not necessarily the
    /// last appended, though in practice the two coincide since versions
    /// are only ever appended in increasing order.
    pub fn latest_version(&self) -> &SecretVersion {
        self.versions
            .iter()
            .max_by_key(|v| v.version)
            .expect("invariant: a secret always has at least one version")
    }

    pub fn next_version_number(&self) -> u32 {
        self.versions.iter().map(|v| v.version).max().unwrap_or(0) + 1
    }

    /// Appends a new version. Panics if `version` is not exactly
    /// `next_version_number()` — callers (the lifecycle manager) must
    /// always allocate via that method, never a literal.
    pub fn push_version(&mut self, version: SecretVersion) {
        assert_eq!(
            version.version,
            self.next_version_number(),
            "version numbers must be strictly increasing with no gaps"
        );
        self.versions.push(version);
    }
}
