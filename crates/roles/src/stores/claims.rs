use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::SubjectId;

use crate::error::RoleStoreError;
use crate::role::Role;

/// Role claims held by the identity provider.
#[async_trait]
pub trait ClaimsStore: Send + Sync {
    /// Current role claim, [`Role::None`] when no claim is set.
    async fn get_role(&self, subject: &SubjectId) -> Result<Role, RoleStoreError>;

    /// Replaces the role claim. Fails for unknown subjects.
    async fn set_role(&self, subject: &SubjectId, role: Role) -> Result<(), RoleStoreError>;

    /// Returns true if the identity provider still has an account for the subject.
    async fn identity_exists(&self, subject: &SubjectId) -> Result<bool, RoleStoreError>;
}

#[derive(Debug, Default)]
struct InMemoryClaimsState {
    identities: HashSet<SubjectId>,
    roles: HashMap<SubjectId, Role>,
    fail_on_set: bool,
    fail_on_get: bool,
}

/// In-memory claims store for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryClaimsStore {
    state: Arc<RwLock<InMemoryClaimsState>>,
}

impl InMemoryClaimsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an identity so roles can be set on it.
    pub fn add_identity(&self, subject: impl Into<SubjectId>) {
        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .identities
            .insert(subject.into());
    }

    /// Deletes an identity and its claims.
    pub fn remove_identity(&self, subject: &SubjectId) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.identities.remove(subject);
        state.roles.remove(subject);
    }

    pub fn set_fail_on_set(&self, fail: bool) {
        self.state.write().unwrap_or_else(|e| e.into_inner()).fail_on_set = fail;
    }

    pub fn set_fail_on_get(&self, fail: bool) {
        self.state.write().unwrap_or_else(|e| e.into_inner()).fail_on_get = fail;
    }
}

#[async_trait]
impl ClaimsStore for InMemoryClaimsStore {
    async fn get_role(&self, subject: &SubjectId) -> Result<Role, RoleStoreError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        if state.fail_on_get {
            return Err(RoleStoreError::Unavailable("identity provider timeout".to_string()));
        }
        Ok(state.roles.get(subject).copied().unwrap_or_default())
    }

    async fn set_role(&self, subject: &SubjectId, role: Role) -> Result<(), RoleStoreError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.fail_on_set {
            return Err(RoleStoreError::Unavailable("identity provider timeout".to_string()));
        }
        if !state.identities.contains(subject) {
            return Err(RoleStoreError::SubjectNotFound(subject.clone()));
        }
        state.roles.insert(subject.clone(), role);
        Ok(())
    }

    async fn identity_exists(&self, subject: &SubjectId) -> Result<bool, RoleStoreError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        if state.fail_on_get {
            return Err(RoleStoreError::Unavailable("identity provider timeout".to_string()));
        }
        Ok(state.identities.contains(subject))
    }
}
