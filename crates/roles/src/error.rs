//! Role reconciliation errors.

use common::SubjectId;
use thiserror::Error;

use crate::role::Role;

/// Failure reported by a claims or profile store.
#[derive(Debug, Clone, Error)]
pub enum RoleStoreError {
    /// The identity provider has no account for the subject.
    #[error("Subject not found: {0}")]
    SubjectNotFound(SubjectId),

    #[error("Role store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The claims write or read failed. The profile was not touched.
    #[error("Claims store failed for {subject}: {source}")]
    Claims {
        subject: SubjectId,
        #[source]
        source: RoleStoreError,
    },

    /// The profile store failed while reading or repairing.
    #[error("Profile store failed for {subject}: {source}")]
    Profile {
        subject: SubjectId,
        #[source]
        source: RoleStoreError,
    },

    /// Claims and profile disagree. `profile` is `None` when its state is
    /// unknown because the mirror write failed.
    #[error("Role mismatch for {subject}: claims {claims}, profile {}", profile_label(.profile))]
    Inconsistent {
        subject: SubjectId,
        claims: Role,
        profile: Option<Role>,
    },
}

fn profile_label(profile: &Option<Role>) -> &'static str {
    profile.map(|r| r.as_str()).unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inconsistent_display() {
        let err = ReconcileError::Inconsistent {
            subject: SubjectId::new("rider-7"),
            claims: Role::Rider,
            profile: None,
        };
        assert_eq!(
            err.to_string(),
            "Role mismatch for rider-7: claims RIDER, profile unknown"
        );
    }
}
