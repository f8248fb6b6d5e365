//! Actors

use crate::{InstitutionId, Role, UserId};
use serde::{Deserialize, Serialize};

/// A user as seen by the engine: an id, a role tag and a home institution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub role: Role,
    /// `None` only for system-wide actors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_institution_id: Option<InstitutionId>,
}

impl User {
    pub fn new(id: impl Into<String>, role: Role, home: Option<InstitutionId>) -> Self {
        Self {
            id: UserId::new(id),
            role,
            home_institution_id: home,
        }
    }

    /// A user anchored at `home`
    pub fn at(id: impl Into<String>, role: Role, home: impl Into<String>) -> Self {
        Self::new(id, role, Some(InstitutionId::new(home)))
    }
}
