//! Workflow definitions: the store trait and an in-memory registry
//!
//! Definitions are immutable once registered. A changed chain is a new
//! definition with a new id; requests keep pointing at the id they were
//! submitted under.

use approval_types::{ApprovalError, ApprovalResult, WorkflowDefinition, WorkflowId};
use std::collections::HashMap;
use std::sync::RwLock;

/// Read access to workflow definitions
pub trait WorkflowStore: Send + Sync {
    fn get_workflow(&self, id: &WorkflowId) -> ApprovalResult<Option<WorkflowDefinition>>;
}

/// Registry of workflow definitions
#[derive(Debug, Default)]
pub struct WorkflowRegistry {
    definitions: RwLock<HashMap<WorkflowId, WorkflowDefinition>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workflow definition
    ///
    /// Validates the step chain before storing. Returns the definition ID.
    pub fn register(&self, definition: WorkflowDefinition) -> ApprovalResult<WorkflowId> {
        definition.validate()?;

        let mut definitions = self
            .definitions
            .write()
            .map_err(|_| ApprovalError::Storage("workflow registry lock poisoned".to_string()))?;

        let id = definition.id.clone();
        if definitions.contains_key(&id) {
            return Err(ApprovalError::InvalidState(format!(
                "workflow '{}' is already registered",
                id
            )));
        }

        tracing::info!(
            workflow_id = %id,
            levels = definition.steps.len(),
            "Workflow definition registered"
        );
        definitions.insert(id.clone(), definition);
        Ok(id)
    }

    /// Find a definition by its display name
    pub fn get_by_name(&self, name: &str) -> ApprovalResult<Option<WorkflowDefinition>> {
        Ok(self
            .read()?
            .values()
            .find(|d| d.name == name)
            .cloned())
    }

    /// All registered definitions, ordered by id
    pub fn list(&self) -> ApprovalResult<Vec<WorkflowDefinition>> {
        let mut all: Vec<_> = self.read()?.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    pub fn count(&self) -> usize {
        self.read().map(|d| d.len()).unwrap_or(0)
    }

    fn read(
        &self,
    ) -> ApprovalResult<std::sync::RwLockReadGuard<'_, HashMap<WorkflowId, WorkflowDefinition>>>
    {
        self.definitions
            .read()
            .map_err(|_| ApprovalError::Storage("workflow registry lock poisoned".to_string()))
    }
}

impl WorkflowStore for WorkflowRegistry {
    fn get_workflow(&self, id: &WorkflowId) -> ApprovalResult<Option<WorkflowDefinition>> {
        Ok(self.read()?.get(id).cloned())
    }
}
