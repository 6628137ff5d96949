//! Role writes that keep identity claims and profiles in agreement.

use common::SubjectId;
use serde::Serialize;

use crate::error::ReconcileError;
use crate::role::Role;
use crate::stores::{ClaimsStore, ProfileStore};

/// Outcome of a role write.
///
/// `claims_updated && !profile_updated` means the profile mirror failed and
/// the two stores disagree until [`RoleReconciler::repair`] runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResult {
    pub subject: SubjectId,
    pub role: Role,
    pub claims_updated: bool,
    pub profile_updated: bool,
}

impl ReconcileResult {
    pub fn is_consistent(&self) -> bool {
        self.claims_updated == self.profile_updated
    }

    /// Turns a half-applied write into [`ReconcileError::Inconsistent`].
    pub fn ensure_consistent(self) -> Result<Self, ReconcileError> {
        if self.is_consistent() {
            Ok(self)
        } else {
            Err(ReconcileError::Inconsistent {
                subject: self.subject,
                claims: self.role,
                profile: None,
            })
        }
    }
}

/// Roles as currently seen by both stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAudit {
    pub subject: SubjectId,
    pub claims: Role,
    pub profile: Role,
}

impl RoleAudit {
    pub fn is_consistent(&self) -> bool {
        self.claims == self.profile
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    AlreadyConsistent,
    /// The profile was overwritten with the claims role.
    Repaired { previous: Role, role: Role },
}

/// Grants and revokes roles.
///
/// Claims are the source of truth: they are written first, and the profile
/// only mirrors them. Every operation is idempotent.
pub struct RoleReconciler<C, P> {
    claims: C,
    profiles: P,
}

impl<C: ClaimsStore, P: ProfileStore> RoleReconciler<C, P> {
    pub fn new(claims: C, profiles: P) -> Self {
        Self { claims, profiles }
    }

    pub fn claims(&self) -> &C {
        &self.claims
    }

    pub fn profiles(&self) -> &P {
        &self.profiles
    }

    /// Writes `role` to the claims store, then mirrors it to the profile.
    ///
    /// A claims failure is an error and leaves the profile untouched. A
    /// profile failure is reported in the result, not as an error.
    #[tracing::instrument(skip(self))]
    pub async fn set_role(
        &self,
        subject: &SubjectId,
        role: Role,
    ) -> Result<ReconcileResult, ReconcileError> {
        self.claims
            .set_role(subject, role)
            .await
            .map_err(|source| ReconcileError::Claims {
                subject: subject.clone(),
                source,
            })?;

        let profile_updated = match self.profiles.set_role(subject, role).await {
            Ok(()) => true,
            Err(err) => {
                metrics::counter!("roles_inconsistencies_total").increment(1);
                tracing::warn!(error = %err, "profile mirror failed, claims and profile disagree");
                false
            }
        };

        metrics::counter!("roles_set_total", "role" => role.as_str()).increment(1);
        if profile_updated {
            tracing::info!("role updated");
        }

        Ok(ReconcileResult {
            subject: subject.clone(),
            role,
            claims_updated: true,
            profile_updated,
        })
    }

    /// Role from the most recent successful claims write.
    pub async fn get_role(&self, subject: &SubjectId) -> Result<Role, ReconcileError> {
        self.claims
            .get_role(subject)
            .await
            .map_err(|source| ReconcileError::Claims {
                subject: subject.clone(),
                source,
            })
    }

    /// Sets [`Role::None`] in both stores.
    pub async fn revoke_role(&self, subject: &SubjectId) -> Result<ReconcileResult, ReconcileError> {
        self.set_role(subject, Role::None).await
    }

    /// Reads both stores without changing anything.
    #[tracing::instrument(skip(self))]
    pub async fn audit(&self, subject: &SubjectId) -> Result<RoleAudit, ReconcileError> {
        let claims = self.get_role(subject).await?;
        let profile = self
            .profiles
            .get_role(subject)
            .await
            .map_err(|source| ReconcileError::Profile {
                subject: subject.clone(),
                source,
            })?;

        let audit = RoleAudit {
            subject: subject.clone(),
            claims,
            profile,
        };
        if !audit.is_consistent() {
            metrics::counter!("roles_inconsistencies_total").increment(1);
            tracing::warn!(%claims, %profile, "role mismatch");
        }
        Ok(audit)
    }

    /// Copies the claims role into the profile when they differ.
    pub async fn repair(&self, subject: &SubjectId) -> Result<RepairOutcome, ReconcileError> {
        let audit = self.audit(subject).await?;
        if audit.is_consistent() {
            return Ok(RepairOutcome::AlreadyConsistent);
        }

        self.profiles
            .set_role(subject, audit.claims)
            .await
            .map_err(|source| ReconcileError::Profile {
                subject: subject.clone(),
                source,
            })?;

        tracing::info!(%subject, previous = %audit.profile, role = %audit.claims, "profile role repaired");
        Ok(RepairOutcome::Repaired {
            previous: audit.profile,
            role: audit.claims,
        })
    }

    /// Deletes the profile of a subject whose identity no longer exists.
    ///
    /// Returns true if a profile was removed. Profiles of live identities are
    /// never touched.
    #[tracing::instrument(skip(self))]
    pub async fn purge_orphaned_profile(&self, subject: &SubjectId) -> Result<bool, ReconcileError> {
        let exists = self
            .claims
            .identity_exists(subject)
            .await
            .map_err(|source| ReconcileError::Claims {
                subject: subject.clone(),
                source,
            })?;
        if exists {
            tracing::debug!("identity still exists, keeping profile");
            return Ok(false);
        }

        let removed = self
            .profiles
            .delete(subject)
            .await
            .map_err(|source| ReconcileError::Profile {
                subject: subject.clone(),
                source,
            })?;
        if removed {
            tracing::info!("orphaned profile removed");
        }
        Ok(removed)
    }
}
