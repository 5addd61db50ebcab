//! The authenticated-caller value object (spec §3, GLOSSARY "Identity").
//!
//! Identities are constructed per request by the (out-of-scope) caller; the
//! core never authenticates anyone itself.

use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Role(pub String);

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        Role(s.to_string())
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Identity {
    pub subject: String,
    pub roles: HashSet<Role>,
    pub tenant: String,
}

impl Identity {
    pub fn new(subject: impl Into<String>, roles: impl IntoIterator<Item = Role>, tenant: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            roles: roles.into_iter().collect(),
            tenant: tenant.into(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.0 == role)
    }
}
