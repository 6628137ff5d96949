use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::SubjectId;

use crate::error::RoleStoreError;
use crate::role::Role;

/// Role mirrored on the subject's profile record.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Profile role, [`Role::None`] when there is no profile.
    async fn get_role(&self, subject: &SubjectId) -> Result<Role, RoleStoreError>;

    /// Sets the profile role, creating the profile if needed.
    async fn set_role(&self, subject: &SubjectId, role: Role) -> Result<(), RoleStoreError>;

    /// Removes the profile. Returns false if there was none.
    async fn delete(&self, subject: &SubjectId) -> Result<bool, RoleStoreError>;
}

#[derive(Debug, Default)]
struct InMemoryProfileState {
    profiles: HashMap<SubjectId, Role>,
    fail_on_set: bool,
    fail_on_delete: bool,
}

/// In-memory profile store for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProfileStore {
    state: Arc<RwLock<InMemoryProfileState>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_set(&self, fail: bool) {
        self.state.write().unwrap_or_else(|e| e.into_inner()).fail_on_set = fail;
    }

    pub fn set_fail_on_delete(&self, fail: bool) {
        self.state.write().unwrap_or_else(|e| e.into_inner()).fail_on_delete = fail;
    }

    pub fn has_profile(&self, subject: &SubjectId) -> bool {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .profiles
            .contains_key(subject)
    }

    pub fn profile_count(&self) -> usize {
        self.state.read().unwrap_or_else(|e| e.into_inner()).profiles.len()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get_role(&self, subject: &SubjectId) -> Result<Role, RoleStoreError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(state.profiles.get(subject).copied().unwrap_or_default())
    }

    async fn set_role(&self, subject: &SubjectId, role: Role) -> Result<(), RoleStoreError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.fail_on_set {
            return Err(RoleStoreError::Unavailable("profile database offline".to_string()));
        }
        state.profiles.insert(subject.clone(), role);
        Ok(())
    }

    async fn delete(&self, subject: &SubjectId) -> Result<bool, RoleStoreError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.fail_on_delete {
            return Err(RoleStoreError::Unavailable("profile database offline".to_string()));
        }
        Ok(state.profiles.remove(subject).is_some())
    }
}
