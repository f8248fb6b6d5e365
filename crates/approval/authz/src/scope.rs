//! Institution scope of an actor

use approval_types::InstitutionId;
use std::collections::BTreeSet;

/// The institutions an actor may act on
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Every institution, including ones that do not exist yet
    Unrestricted,
    /// An explicit set; empty means no access
    Institutions(BTreeSet<InstitutionId>),
}

impl Scope {
    pub fn none() -> Self {
        Self::Institutions(BTreeSet::new())
    }

    pub fn single(id: InstitutionId) -> Self {
        Self::Institutions(BTreeSet::from([id]))
    }

    pub fn contains(&self, id: &InstitutionId) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Institutions(ids) => ids.contains(id),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Self::Unrestricted)
    }

    /// True only for an explicit empty set
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Institutions(ids) if ids.is_empty())
    }

    /// Number of institutions, `None` when unrestricted
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Unrestricted => None,
            Self::Institutions(ids) => Some(ids.len()),
        }
    }
}
