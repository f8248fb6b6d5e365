//! User directory collaborator

use approval_types::{ApprovalError, ApprovalResult, InstitutionId, User, UserId};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Read access to users
pub trait UserDirectory: Send + Sync {
    fn get_user(&self, id: &UserId) -> ApprovalResult<Option<User>>;

    /// Users whose home institution is `institution`
    fn users_at(&self, institution: &InstitutionId) -> ApprovalResult<Vec<User>>;
}

/// In-memory user directory
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<BTreeMap<UserId, User>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_users(users: impl IntoIterator<Item = User>) -> Self {
        let map = users.into_iter().map(|u| (u.id.clone(), u)).collect();
        Self {
            users: RwLock::new(map),
        }
    }

    /// Insert or replace a user (role changes, transfers)
    pub fn upsert(&self, user: User) -> ApprovalResult<()> {
        let mut guard = self
            .users
            .write()
            .map_err(|_| ApprovalError::Storage("user directory lock poisoned".to_string()))?;
        guard.insert(user.id.clone(), user);
        Ok(())
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn get_user(&self, id: &UserId) -> ApprovalResult<Option<User>> {
        let guard = self
            .users
            .read()
            .map_err(|_| ApprovalError::Storage("user directory lock poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    fn users_at(&self, institution: &InstitutionId) -> ApprovalResult<Vec<User>> {
        let guard = self
            .users
            .read()
            .map_err(|_| ApprovalError::Storage("user directory lock poisoned".to_string()))?;
        Ok(guard
            .values()
            .filter(|u| u.home_institution_id.as_ref() == Some(institution))
            .cloned()
            .collect())
    }
}
