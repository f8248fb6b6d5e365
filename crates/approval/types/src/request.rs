//! Approval requests: one resource's progress through a workflow
//!
//! A request is created pending at the workflow's first level and only
//! changes through [`ApprovalRequest::advance`] and
//! [`ApprovalRequest::conclude`]. The owning institution never changes and
//! the decision history is append-only; neither is exposed mutably.

use crate::{
    ApprovalError, ApprovalResult, InstitutionId, RequestId, ResourceRef, UserId, WorkflowId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Status ───────────────────────────────────────────────────────────

/// Lifecycle status of a request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    /// Ends the cycle; the resource may be submitted again
    ReturnedForRevision,
}

impl RequestStatus {
    /// Approved and rejected requests accept nothing further, ever
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Whether the request is still waiting for a decision
    pub fn is_pending(&self) -> bool {
        *self == Self::Pending
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::ReturnedForRevision => "returned_for_revision",
        };
        f.write_str(s)
    }
}

/// A decision taken at one level
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
    ReturnedForRevision,
}

/// Request priority, used to order approval queues
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

// ── History ──────────────────────────────────────────────────────────

/// One immutable audit entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionEntry {
    pub level: u32,
    pub actor_id: UserId,
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl DecisionEntry {
    pub fn new(level: u32, actor_id: UserId, decision: Decision, comment: Option<String>) -> Self {
        Self {
            level,
            actor_id,
            decision,
            comment,
            timestamp: Utc::now(),
        }
    }
}

// ── Approval Request ─────────────────────────────────────────────────

/// One submission cycle of a resource through a workflow
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    id: RequestId,
    resource: ResourceRef,
    institution_id: InstitutionId,
    workflow_id: WorkflowId,
    /// 1-based resubmission counter for the resource
    cycle: u32,
    current_level: u32,
    status: RequestStatus,
    submitted_by: UserId,
    submitted_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
    history: Vec<DecisionEntry>,
    /// Optimistic concurrency token, bumped by the store on every commit
    version: u64,
}

impl ApprovalRequest {
    /// Create a pending request at `first_level`
    pub fn new(
        resource: ResourceRef,
        institution_id: InstitutionId,
        workflow_id: WorkflowId,
        submitted_by: UserId,
        first_level: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RequestId::generate(),
            resource,
            institution_id,
            workflow_id,
            cycle: 1,
            current_level: first_level,
            status: RequestStatus::Pending,
            submitted_by,
            submitted_at: now,
            updated_at: now,
            deadline: None,
            priority: Priority::Normal,
            notes: None,
            history: Vec::new(),
            version: 0,
        }
    }

    pub fn with_cycle(mut self, cycle: u32) -> Self {
        self.cycle = cycle;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Record an approval that moves the request to `to_level`
    pub fn advance(&mut self, entry: DecisionEntry, to_level: u32) -> ApprovalResult<()> {
        self.ensure_pending()?;
        if entry.decision != Decision::Approved {
            return Err(ApprovalError::InvalidState(format!(
                "request {} can only advance on an approval",
                self.id
            )));
        }
        if to_level <= self.current_level {
            return Err(ApprovalError::InvalidState(format!(
                "request {} cannot move from level {} back to level {}",
                self.id, self.current_level, to_level
            )));
        }
        self.updated_at = entry.timestamp;
        self.history.push(entry);
        self.current_level = to_level;
        Ok(())
    }

    /// Record the decision that ends this cycle
    pub fn conclude(&mut self, entry: DecisionEntry) -> ApprovalResult<()> {
        self.ensure_pending()?;
        self.status = match entry.decision {
            Decision::Approved => RequestStatus::Approved,
            Decision::Rejected => RequestStatus::Rejected,
            Decision::ReturnedForRevision => RequestStatus::ReturnedForRevision,
        };
        self.updated_at = entry.timestamp;
        self.history.push(entry);
        Ok(())
    }

    /// Set the concurrency token. Persistence adapters only.
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    fn ensure_pending(&self) -> ApprovalResult<()> {
        if self.status.is_pending() {
            Ok(())
        } else {
            Err(ApprovalError::InvalidState(format!(
                "request {} is {} and accepts no further decisions",
                self.id, self.status
            )))
        }
    }

    // ── Query methods ────────────────────────────────────────────────

    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn resource(&self) -> &ResourceRef {
        &self.resource
    }

    pub fn institution_id(&self) -> &InstitutionId {
        &self.institution_id
    }

    pub fn workflow_id(&self) -> &WorkflowId {
        &self.workflow_id
    }

    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    pub fn current_level(&self) -> u32 {
        self.current_level
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn submitted_by(&self) -> &UserId {
        &self.submitted_by
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn history(&self) -> &[DecisionEntry] {
        &self.history
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Pending past its deadline
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.deadline.is_some_and(|d| now >= d)
    }
}
