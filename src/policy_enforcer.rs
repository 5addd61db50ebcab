//! Pure policy enforcement (spec §4.3).
//!
//! Never logs the candidate value — the same discipline the teacher's
//! `utils/log_sanitizer.rs` applies to request logging, here enforced by
//! construction: this function takes no logger and emits nothing.

use crate::domain::Policy;
use crate::error::{CoreError, CoreResult, PolicyViolation};

pub fn enforce_policy(value: &str, policy: &Policy) -> CoreResult<()> {
    if value.len() < policy.min_length {
        return Err(CoreError::PolicyViolation(PolicyViolation::TooShort {
            min_length: policy.min_length,
        }));
    }

    if let Some(patterns) = &policy.forbid_patterns {
        for pattern in patterns {
            if !pattern.is_empty() && value.contains(pattern.as_str()) {
                return Err(CoreError::PolicyViolation(PolicyViolation::ForbiddenSubstring));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn rejects_too_short() {
        let policy = Policy::default().with_min_length(8);
        assert!(enforce_policy("short", &policy).is_err());
        assert!(enforce_policy("long-enough", &policy).is_ok());
    }

    #[test]
    fn rejects_forbidden_substring() {
        let mut policy = Policy::default().with_min_length(1);
        policy.forbid_patterns = Some(HashSet::from(["XXX".to_string()]));
        assert!(enforce_policy("abcdefghXXX", &policy).is_err());
        assert!(enforce_policy("abcdefgh", &policy).is_ok());
    }

    #[test]
    fn empty_forbidden_pattern_is_inert() {
        let mut policy = Policy::default().with_min_length(1);
        policy.forbid_patterns = Some(HashSet::from([String::new()]));
        assert!(enforce_policy("anything", &policy).is_ok());
    }
}
