//! Bulk decisions: partitioning a batch by scope and reporting per item

use crate::{ApprovalStore, Transition};
use approval_authz::{Scope, ScopeResolver};
use approval_types::{ApprovalError, ApprovalResult, ResourceRef, User};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// The decision applied to every item of a batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    Approve,
    Reject,
    Return,
}

/// Bulk entry point input
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkActionRequest {
    pub resource_ids: Vec<ResourceRef>,
    pub action: BulkAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl BulkActionRequest {
    pub fn new(
        resource_ids: impl IntoIterator<Item = ResourceRef>,
        action: BulkAction,
        comment: Option<String>,
    ) -> Self {
        Self {
            resource_ids: resource_ids.into_iter().collect(),
            action,
            comment,
        }
    }

    /// The transition applied to each authorized item.
    ///
    /// Reject and return need a non-empty comment, checked once for the
    /// whole batch.
    pub fn transition(&self) -> ApprovalResult<Transition> {
        let text = self
            .comment
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        match (self.action, text) {
            (BulkAction::Approve, _) => Ok(Transition::approve(text.map(str::to_string))),
            (BulkAction::Reject, Some(reason)) => Ok(Transition::reject(reason)),
            (BulkAction::Return, Some(comments)) => Ok(Transition::return_for_revision(comments)),
            (action, None) => Err(ApprovalError::InvalidInput(format!(
                "bulk {:?} requires a comment",
                action
            ))),
        }
    }
}

/// A batch split by the actor's scope
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Partition {
    pub authorized: Vec<ResourceRef>,
    pub unauthorized: Vec<ResourceRef>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.authorized.len() + self.unauthorized.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Splits resource ids into those whose current request is inside the
/// actor's scope and everything else.
pub struct BulkAuthorizationPartitioner {
    resolver: Arc<ScopeResolver>,
    requests: Arc<dyn ApprovalStore>,
}

impl BulkAuthorizationPartitioner {
    pub fn new(resolver: Arc<ScopeResolver>, requests: Arc<dyn ApprovalStore>) -> Self {
        Self { resolver, requests }
    }

    /// Partition `ids` for `user`.
    ///
    /// Never fails: missing requests and lookup errors route the id to
    /// `unauthorized`. Duplicate ids collapse to their first occurrence.
    pub fn partition(&self, ids: &[ResourceRef], user: &User) -> Partition {
        let scope = match self.resolver.resolve_scope(user) {
            Ok(scope) => scope,
            Err(e) => {
                tracing::warn!(actor = %user.id, error = %e, "Scope resolution failed, batch unauthorized");
                Scope::none()
            }
        };

        let mut seen = HashSet::new();
        let mut partition = Partition::default();
        for id in ids {
            if !seen.insert(id) {
                continue;
            }
            if self.in_scope(id, &scope) {
                partition.authorized.push(id.clone());
            } else {
                partition.unauthorized.push(id.clone());
            }
        }
        partition
    }

    fn in_scope(&self, id: &ResourceRef, scope: &Scope) -> bool {
        match self.requests.current_for_resource(id) {
            Ok(Some(request)) => scope.contains(request.institution_id()),
            Ok(None) => {
                tracing::debug!(resource = %id, "No request for resource");
                false
            }
            Err(e) => {
                tracing::warn!(resource = %id, error = %e, "Request lookup failed");
                false
            }
        }
    }
}

/// What happened to one item of a batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Approved at one level and moved to the next
    Advanced,
    Approved,
    Rejected,
    Returned,
    /// Outside the actor's scope; not attempted
    Unauthorized,
    /// Attempted and refused
    Failed,
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Advanced | Self::Approved | Self::Rejected | Self::Returned
        )
    }
}

/// Error detail for a refused item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub code: String,
    pub message: String,
}

impl From<&ApprovalError> for ItemError {
    fn from(err: &ApprovalError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Per-item result of a batch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    pub id: ResourceRef,
    pub outcome: ItemOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ItemError>,
}

impl ItemResult {
    pub fn succeeded(id: ResourceRef, outcome: ItemOutcome) -> Self {
        Self {
            id,
            outcome,
            error: None,
        }
    }

    pub fn failed(id: ResourceRef, outcome: ItemOutcome, err: &ApprovalError) -> Self {
        Self {
            id,
            outcome,
            error: Some(err.into()),
        }
    }
}

/// Bulk entry point output
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkReport {
    pub action: BulkAction,
    pub authorized_count: usize,
    pub unauthorized_ids: Vec<ResourceRef>,
    pub succeeded_count: usize,
    pub failed_count: usize,
    pub per_item_results: Vec<ItemResult>,
}

impl BulkReport {
    /// Assemble the report; `results` must be in input order
    pub fn new(action: BulkAction, partition: &Partition, results: Vec<ItemResult>) -> Self {
        let succeeded_count = results.iter().filter(|r| r.outcome.is_success()).count();
        let failed_count = results
            .iter()
            .filter(|r| r.outcome == ItemOutcome::Failed)
            .count();
        Self {
            action,
            authorized_count: partition.authorized.len(),
            unauthorized_ids: partition.unauthorized.clone(),
            succeeded_count,
            failed_count,
            per_item_results: results,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.unauthorized_ids.is_empty() && self.failed_count == 0
    }
}
