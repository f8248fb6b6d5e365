//! Institutions: nodes of the organizational tree

use crate::InstitutionId;
use serde::{Deserialize, Serialize};

/// Organizational tier of an institution. Informational only: scope is
/// computed from tree position, never from the tier label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InstitutionTier {
    Ministry,
    Region,
    Sector,
    #[default]
    School,
    /// Sub-units below school level (departments, branches)
    Unit,
}

/// A node in the institution tree
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Institution {
    pub id: InstitutionId,
    /// Parent institution; `None` for roots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<InstitutionId>,
    pub tier: InstitutionTier,
    #[serde(default)]
    pub name: String,
    /// Inactive institutions stay in the tree and in descendant sets
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Institution {
    pub fn root(id: impl Into<String>, tier: InstitutionTier) -> Self {
        Self {
            id: InstitutionId::new(id),
            parent_id: None,
            tier,
            name: String::new(),
            active: true,
        }
    }

    pub fn child(id: impl Into<String>, parent: impl Into<String>, tier: InstitutionTier) -> Self {
        Self {
            id: InstitutionId::new(id),
            parent_id: Some(InstitutionId::new(parent)),
            tier,
            name: String::new(),
            active: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Display label, falling back to the id when no name is set
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            self.id.as_str()
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let region = Institution::root("r1", InstitutionTier::Region).with_name("Baku");
        let school = Institution::child("s1", "r1", InstitutionTier::School);
        assert!(region.is_root());
        assert_eq!(region.label(), "Baku");
        assert_eq!(school.parent_id, Some(InstitutionId::new("r1")));
        assert_eq!(school.label(), "s1");
    }

    #[test]
    fn test_deserialize_defaults() {
        let inst: Institution =
            serde_json::from_str(r#"{"id":"s1","parent_id":"t1","tier":"school"}"#).unwrap();
        assert!(inst.active);
        assert!(inst.name.is_empty());
    }
}
