//! Integration tests for role reconciliation.

use common::SubjectId;
use roles::{InMemoryClaimsStore, InMemoryProfileStore, ReconcileError, Role, RoleReconciler};

struct TestHarness {
    reconciler: RoleReconciler<InMemoryClaimsStore, InMemoryProfileStore>,
    claims: InMemoryClaimsStore,
    profiles: InMemoryProfileStore,
}

impl TestHarness {
    fn new() -> Self {
        let claims = InMemoryClaimsStore::new();
        let profiles = InMemoryProfileStore::new();
        let reconciler = RoleReconciler::new(claims.clone(), profiles.clone());
        Self {
            reconciler,
            claims,
            profiles,
        }
    }

    fn subject(&self, id: &str) -> SubjectId {
        self.claims.add_identity(id);
        SubjectId::new(id)
    }
}

#[tokio::test]
async fn test_last_write_wins_and_stores_agree() {
    let h = TestHarness::new();
    let subject = h.subject("courier-12");

    h.reconciler.set_role(&subject, Role::Rider).await.unwrap();
    h.reconciler.set_role(&subject, Role::SuperAdmin).await.unwrap();

    assert_eq!(h.reconciler.get_role(&subject).await.unwrap(), Role::SuperAdmin);
    let audit = h.reconciler.audit(&subject).await.unwrap();
    assert!(audit.is_consistent());
    assert_eq!(audit.profile, Role::SuperAdmin);
}

#[tokio::test]
async fn test_setting_same_role_twice_is_idempotent() {
    let h = TestHarness::new();
    let subject = h.subject("courier-12");

    let first = h.reconciler.set_role(&subject, Role::Rider).await.unwrap();
    let second = h.reconciler.set_role(&subject, Role::Rider).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.profiles.profile_count(), 1);
}

#[tokio::test]
async fn test_unknown_subject_is_a_claims_error() {
    let h = TestHarness::new();
    let subject = SubjectId::new("nobody");

    let err = h.reconciler.set_role(&subject, Role::Admin).await.unwrap_err();

    assert!(matches!(err, ReconcileError::Claims { .. }));
    assert!(!h.profiles.has_profile(&subject));
}

#[tokio::test]
async fn test_failed_mirror_is_detected_and_repaired() {
    let h = TestHarness::new();
    let subject = h.subject("courier-12");
    h.reconciler.set_role(&subject, Role::Rider).await.unwrap();

    h.profiles.set_fail_on_set(true);
    let result = h.reconciler.set_role(&subject, Role::Admin).await.unwrap();
    assert!(!result.is_consistent());

    let audit = h.reconciler.audit(&subject).await.unwrap();
    assert_eq!((audit.claims, audit.profile), (Role::Admin, Role::Rider));

    h.profiles.set_fail_on_set(false);
    h.reconciler.repair(&subject).await.unwrap();
    assert!(h.reconciler.audit(&subject).await.unwrap().is_consistent());
}

#[tokio::test]
async fn test_audit_surfaces_claims_outage() {
    let h = TestHarness::new();
    let subject = h.subject("courier-12");
    h.claims.set_fail_on_get(true);

    let err = h.reconciler.audit(&subject).await.unwrap_err();

    assert!(matches!(err, ReconcileError::Claims { .. }));
}
