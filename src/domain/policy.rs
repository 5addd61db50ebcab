//! Per-secret policy bundle (spec §3).

use std::collections::HashSet;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Policy {
    pub name: String,
    pub description: Option<String>,
    pub rotation_days: u32,
    pub min_length: usize,
    pub forbid_patterns: Option<HashSet<String>>,
    pub allowed_cidrs: Option<HashSet<String>>,
}

impl Policy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            rotation_days: 90,
            min_length: 16,
            forbid_patterns: None,
            allowed_cidrs: None,
        }
    }

    pub fn with_rotation_days(mut self, days: u32) -> Self {
        self.rotation_days = days;
        self
    }

    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    pub fn with_forbidden(mut self, patterns: impl IntoIterator<Item = String>) -> Self {
        self.forbid_patterns = Some(patterns.into_iter().collect());
        self
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::new("default")
    }
}
