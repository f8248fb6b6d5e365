//! Workflow definitions: ordered, role-gated approval steps
//!
//! A definition is a chain of steps. Each step has a level (unique,
//! strictly increasing, starting at 1 or above) and the set of roles
//! allowed to decide at that level. Definitions are checked with
//! [`WorkflowDefinition::validate`] before they are stored.

use crate::{ApprovalError, ApprovalResult, Role, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One stage of the approval chain
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub level: u32,
    pub allowed_roles: BTreeSet<Role>,
    /// Optional steps are skipped when advancing unless the workflow is
    /// evaluated with `require_all_levels`.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl WorkflowStep {
    pub fn new(level: u32, allowed_roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            level,
            allowed_roles: allowed_roles.into_iter().collect(),
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn allows(&self, role: &Role) -> bool {
        self.allowed_roles.contains(role)
    }
}

/// A workflow definition: the approval chain a request walks through
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: WorkflowId,
    pub name: String,
    pub steps: Vec<WorkflowStep>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: WorkflowId::new(id),
            name: name.into(),
            steps: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Append a required step
    pub fn with_step(mut self, level: u32, allowed_roles: impl IntoIterator<Item = Role>) -> Self {
        self.steps.push(WorkflowStep::new(level, allowed_roles));
        self
    }

    /// Append an optional step
    pub fn with_optional_step(
        mut self,
        level: u32,
        allowed_roles: impl IntoIterator<Item = Role>,
    ) -> Self {
        self.steps
            .push(WorkflowStep::new(level, allowed_roles).optional());
        self
    }

    /// Validate the step chain.
    ///
    /// The chain must be non-empty, every level must be at least 1, and
    /// levels must be unique and strictly increasing in declaration order.
    pub fn validate(&self) -> ApprovalResult<()> {
        if self.steps.is_empty() {
            return Err(ApprovalError::DataIntegrity(format!(
                "workflow '{}' has no steps",
                self.id
            )));
        }

        let mut seen = BTreeSet::new();
        let mut previous: Option<u32> = None;
        for step in &self.steps {
            if step.level == 0 {
                return Err(ApprovalError::DataIntegrity(format!(
                    "workflow '{}' declares level 0; levels start at 1",
                    self.id
                )));
            }
            if !seen.insert(step.level) {
                return Err(ApprovalError::DataIntegrity(format!(
                    "workflow '{}' declares level {} more than once",
                    self.id, step.level
                )));
            }
            if let Some(prev) = previous {
                if step.level <= prev {
                    return Err(ApprovalError::DataIntegrity(format!(
                        "workflow '{}' levels are not strictly increasing ({} after {})",
                        self.id, step.level, prev
                    )));
                }
            }
            previous = Some(step.level);
        }

        Ok(())
    }

    /// The step at `level`, if declared
    pub fn step(&self, level: u32) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.level == level)
    }

    /// The level a fresh request starts at
    pub fn first_level(&self) -> Option<u32> {
        self.steps.first().map(|s| s.level)
    }

    pub fn last_level(&self) -> Option<u32> {
        self.steps.last().map(|s| s.level)
    }

    /// The level a request moves to after `level` is approved.
    ///
    /// Returns `None` when the chain is complete. Optional steps are skipped
    /// unless `require_all_levels` is set.
    pub fn next_level_after(&self, level: u32, require_all_levels: bool) -> Option<u32> {
        self.steps
            .iter()
            .filter(|s| s.level > level)
            .find(|s| require_all_levels || s.required)
            .map(|s| s.level)
    }

    /// Steps in ascending level order
    pub fn steps(&self) -> impl Iterator<Item = &WorkflowStep> {
        self.steps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_level() -> WorkflowDefinition {
        WorkflowDefinition::new("wf", "Survey approval")
            .with_step(1, [Role::school_admin()])
            .with_step(2, [Role::sector_admin()])
    }

    #[test]
    fn test_valid_definition() {
        let def = two_level();
        assert!(def.validate().is_ok());
        assert_eq!(def.first_level(), Some(1));
        assert_eq!(def.last_level(), Some(2));
        assert!(def.step(2).unwrap().allows(&Role::sector_admin()));
        assert!(!def.step(2).unwrap().allows(&Role::school_admin()));
        assert!(def.step(3).is_none());
    }

    #[test]
    fn test_empty_definition_rejected() {
        let def = WorkflowDefinition::new("wf", "Empty");
        assert!(matches!(
            def.validate(),
            Err(ApprovalError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_duplicate_level_rejected() {
        let def = WorkflowDefinition::new("wf", "Dup")
            .with_step(1, [Role::school_admin()])
            .with_step(1, [Role::sector_admin()]);
        let err = def.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_unordered_levels_rejected() {
        let def = WorkflowDefinition::new("wf", "Unordered")
            .with_step(2, [Role::school_admin()])
            .with_step(1, [Role::sector_admin()]);
        assert!(matches!(
            def.validate(),
            Err(ApprovalError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_level_zero_rejected() {
        let def = WorkflowDefinition::new("wf", "Zero").with_step(0, [Role::school_admin()]);
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_next_level_skips_optional_steps() {
        let def = WorkflowDefinition::new("wf", "Three")
            .with_step(1, [Role::school_admin()])
            .with_optional_step(2, [Role::sector_admin()])
            .with_step(3, [Role::region_admin()]);

        assert_eq!(def.next_level_after(1, false), Some(3));
        assert_eq!(def.next_level_after(1, true), Some(2));
        assert_eq!(def.next_level_after(3, true), None);
    }

    #[test]
    fn test_levels_need_not_be_contiguous() {
        let def = WorkflowDefinition::new("wf", "Gapped")
            .with_step(1, [Role::school_admin()])
            .with_step(5, [Role::region_admin()]);
        assert!(def.validate().is_ok());
        assert_eq!(def.next_level_after(1, false), Some(5));
    }
}
