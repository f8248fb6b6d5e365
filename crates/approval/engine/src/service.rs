//! Approval service: the main entry point of the engine
//!
//! The service coordinates the collaborators. It:
//! 1. Opens a request cycle for a resource
//! 2. Applies decisions through the state machine
//! 3. Commits with an optimistic version check
//! 4. Publishes the event of each committed transition
//! 5. Runs bulk decisions item by item
//!
//! Users, workflows and requests are looked up fresh on every call.

use crate::{
    ApprovalStateMachine, ApprovalStore, BulkActionRequest, BulkAuthorizationPartitioner,
    BulkReport, EngineConfig, EventSink, ItemOutcome, ItemResult, LevelGate, Transition,
    UserDirectory, WorkflowStore,
};
use approval_authz::ScopeResolver;
use approval_hierarchy::{CachedHierarchy, InstitutionProvider};
use approval_types::{
    ApprovalError, ApprovalEvent, ApprovalRequest, ApprovalResult, EntityKind, EventContext,
    InstitutionId, Priority, RequestId, RequestStatus, ResourceRef, User, UserId,
    WorkflowDefinition, WorkflowId,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// External systems the service reads from and writes to
pub struct Collaborators {
    pub institutions: Arc<dyn InstitutionProvider>,
    pub users: Arc<dyn UserDirectory>,
    pub workflows: Arc<dyn WorkflowStore>,
    pub requests: Arc<dyn ApprovalStore>,
    pub events: Arc<dyn EventSink>,
}

/// A request to open an approval cycle for a resource
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    pub resource: ResourceRef,
    pub institution_id: InstitutionId,
    pub workflow_id: WorkflowId,
    pub submitted_by: UserId,
    pub priority: Priority,
    /// Overrides the configured default deadline
    pub deadline: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl Submission {
    pub fn new(
        resource: impl Into<String>,
        institution_id: impl Into<String>,
        workflow_id: impl Into<String>,
        submitted_by: impl Into<String>,
    ) -> Self {
        Self {
            resource: ResourceRef::new(resource),
            institution_id: InstitutionId::new(institution_id),
            workflow_id: WorkflowId::new(workflow_id),
            submitted_by: UserId::new(submitted_by),
            priority: Priority::Normal,
            deadline: None,
            notes: None,
        }
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
}

/// The approval engine facade
pub struct ApprovalService {
    config: EngineConfig,
    pub(crate) hierarchy: Arc<CachedHierarchy>,
    pub(crate) resolver: Arc<ScopeResolver>,
    pub(crate) gate: LevelGate,
    machine: ApprovalStateMachine,
    partitioner: BulkAuthorizationPartitioner,
    pub(crate) users: Arc<dyn UserDirectory>,
    pub(crate) workflows: Arc<dyn WorkflowStore>,
    pub(crate) requests: Arc<dyn ApprovalStore>,
    events: Arc<dyn EventSink>,
}

impl ApprovalService {
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Self {
        let hierarchy = Arc::new(CachedHierarchy::new(collaborators.institutions));
        let resolver = Arc::new(ScopeResolver::new(
            hierarchy.clone(),
            config.tier_policy.clone(),
        ));
        let gate = LevelGate::new(resolver.clone());
        let machine = ApprovalStateMachine::new(gate.clone(), config.require_all_levels);
        let partitioner =
            BulkAuthorizationPartitioner::new(resolver.clone(), collaborators.requests.clone());

        Self {
            config,
            hierarchy,
            resolver,
            gate,
            machine,
            partitioner,
            users: collaborators.users,
            workflows: collaborators.workflows,
            requests: collaborators.requests,
            events: collaborators.events,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Arc<ScopeResolver> {
        &self.resolver
    }

    pub fn gate(&self) -> &LevelGate {
        &self.gate
    }

    /// Drop the cached hierarchy. Only needed for institution providers
    /// that do not report a revision.
    pub fn invalidate_hierarchy(&self) {
        self.hierarchy.invalidate();
    }

    // ── Submission ───────────────────────────────────────────────────

    /// Open a new approval cycle for a resource.
    ///
    /// The first cycle of a resource starts at cycle 1. A resource whose
    /// latest cycle was returned for revision gets a new request with the
    /// next cycle number; the returned request keeps its history.
    pub fn submit(&self, submission: Submission) -> ApprovalResult<ApprovalRequest> {
        let submitter = self.user(&submission.submitted_by)?;
        let workflow = self.workflow(&submission.workflow_id)?;
        workflow.validate()?;

        if !self.hierarchy.index()?.contains(&submission.institution_id) {
            return Err(ApprovalError::not_found(
                EntityKind::Institution,
                &submission.institution_id,
            ));
        }
        if !self
            .resolver
            .is_authorized_for_institution(&submitter, &submission.institution_id)?
        {
            tracing::warn!(
                actor = %submitter.id,
                institution_id = %submission.institution_id,
                "Submission outside scope refused"
            );
            return Err(ApprovalError::not_authorized(
                &submitter.id,
                format!(
                    "institution {} is outside scope",
                    submission.institution_id
                ),
            ));
        }

        let cycle = match self.requests.current_for_resource(&submission.resource)? {
            None => 1,
            Some(prior) => match prior.status() {
                RequestStatus::ReturnedForRevision => prior.cycle() + 1,
                RequestStatus::Pending => {
                    return Err(ApprovalError::InvalidState(format!(
                        "resource {} already has pending request {}",
                        submission.resource,
                        prior.id()
                    )))
                }
                status => {
                    return Err(ApprovalError::InvalidState(format!(
                        "resource {} was already {}",
                        submission.resource, status
                    )))
                }
            },
        };

        let first_level = workflow.first_level().ok_or_else(|| {
            ApprovalError::DataIntegrity(format!("workflow '{}' has no steps", workflow.id))
        })?;

        let mut request = ApprovalRequest::new(
            submission.resource,
            submission.institution_id,
            submission.workflow_id,
            submission.submitted_by,
            first_level,
        )
        .with_cycle(cycle)
        .with_priority(submission.priority);

        let deadline = match submission.deadline {
            Some(deadline) => Some(deadline),
            None => self.default_deadline()?,
        };
        if let Some(deadline) = deadline {
            request = request.with_deadline(deadline);
        }
        if let Some(notes) = submission.notes {
            request = request.with_notes(notes);
        }

        let stored = self.requests.insert(request)?;

        tracing::info!(
            request_id = %stored.id(),
            resource = %stored.resource(),
            institution_id = %stored.institution_id(),
            cycle,
            level = first_level,
            "Approval request submitted"
        );
        self.events.publish(&ApprovalEvent::RequestSubmitted {
            context: EventContext::for_request(&stored, &submitter.id),
            level: first_level,
        });

        Ok(stored)
    }

    fn default_deadline(&self) -> ApprovalResult<Option<DateTime<Utc>>> {
        let days = self.config.default_deadline_days;
        if days == 0 {
            return Ok(None);
        }
        Duration::try_days(i64::from(days))
            .and_then(|offset| Utc::now().checked_add_signed(offset))
            .map(Some)
            .ok_or_else(|| {
                ApprovalError::Config(format!(
                    "default_deadline_days = {} is out of range",
                    days
                ))
            })
    }

    // ── Decisions ────────────────────────────────────────────────────

    pub fn approve(
        &self,
        request_id: &RequestId,
        actor_id: &UserId,
        comment: Option<String>,
    ) -> ApprovalResult<ApprovalRequest> {
        let actor = self.user(actor_id)?;
        self.decide(request_id, &actor, Transition::approve(comment))
    }

    pub fn reject(
        &self,
        request_id: &RequestId,
        actor_id: &UserId,
        reason: impl Into<String>,
    ) -> ApprovalResult<ApprovalRequest> {
        let actor = self.user(actor_id)?;
        self.decide(request_id, &actor, Transition::reject(reason))
    }

    pub fn return_for_revision(
        &self,
        request_id: &RequestId,
        actor_id: &UserId,
        comments: impl Into<String>,
    ) -> ApprovalResult<ApprovalRequest> {
        let actor = self.user(actor_id)?;
        self.decide(request_id, &actor, Transition::return_for_revision(comments))
    }

    /// Load, transition, commit, then publish
    fn decide(
        &self,
        request_id: &RequestId,
        actor: &User,
        transition: Transition,
    ) -> ApprovalResult<ApprovalRequest> {
        let mut request = self.get(request_id)?;
        let workflow = self.workflow(request.workflow_id())?;
        self.commit(&mut request, &workflow, actor, transition)
    }

    fn commit(
        &self,
        request: &mut ApprovalRequest,
        workflow: &WorkflowDefinition,
        actor: &User,
        transition: Transition,
    ) -> ApprovalResult<ApprovalRequest> {
        let expected_version = request.version();
        let from_level = request.current_level();

        let event = self
            .machine
            .apply(request, workflow, actor, transition)
            .inspect_err(|e| {
                if matches!(e, ApprovalError::NotAuthorized { .. }) {
                    tracing::warn!(
                        request_id = %request.id(),
                        actor = %actor.id,
                        level = from_level,
                        error = %e,
                        "Decision refused"
                    );
                }
            })?;

        let stored = self.requests.update(request.clone(), expected_version)?;

        tracing::info!(
            request_id = %stored.id(),
            actor = %actor.id,
            from_level,
            level = stored.current_level(),
            status = %stored.status(),
            "Decision committed"
        );
        self.events.publish(&event);

        Ok(stored)
    }

    // ── Bulk ─────────────────────────────────────────────────────────

    /// Apply one decision to a batch of resources.
    ///
    /// The batch is partitioned by the actor's scope first; only authorized
    /// items are attempted, each independently. A failed item never stops
    /// its siblings or undoes items already committed.
    pub fn bulk(&self, input: &BulkActionRequest, actor_id: &UserId) -> ApprovalResult<BulkReport> {
        if input.resource_ids.is_empty() {
            return Err(ApprovalError::InvalidInput("bulk batch is empty".into()));
        }
        if input.resource_ids.len() > self.config.max_bulk_batch_size {
            return Err(ApprovalError::BatchTooLarge {
                requested: input.resource_ids.len(),
                limit: self.config.max_bulk_batch_size,
            });
        }
        let transition = input.transition()?;
        let actor = self.user(actor_id)?;

        let partition = self.partitioner.partition(&input.resource_ids, &actor);
        if !partition.unauthorized.is_empty() {
            tracing::warn!(
                actor = %actor.id,
                count = partition.unauthorized.len(),
                "Bulk items outside scope skipped"
            );
        }

        let mut results: HashMap<ResourceRef, ItemResult> = HashMap::new();
        for id in &partition.authorized {
            let result = match self.bulk_item(id, &actor, transition.clone()) {
                Ok(outcome) => ItemResult::succeeded(id.clone(), outcome),
                Err(e) => {
                    tracing::warn!(resource = %id, actor = %actor.id, error = %e, "Bulk item failed");
                    ItemResult::failed(id.clone(), ItemOutcome::Failed, &e)
                }
            };
            results.insert(id.clone(), result);
        }
        for id in &partition.unauthorized {
            let denied = ApprovalError::not_authorized(
                &actor.id,
                format!("resource {} is outside scope or has no request", id),
            );
            results.insert(
                id.clone(),
                ItemResult::failed(id.clone(), ItemOutcome::Unauthorized, &denied),
            );
        }

        // Input order, first occurrence of each id
        let ordered = input
            .resource_ids
            .iter()
            .filter_map(|id| results.remove(id))
            .collect();
        let report = BulkReport::new(input.action, &partition, ordered);

        tracing::info!(
            actor = %actor.id,
            action = ?input.action,
            authorized = report.authorized_count,
            succeeded = report.succeeded_count,
            failed = report.failed_count,
            "Bulk decision finished"
        );
        Ok(report)
    }

    fn bulk_item(
        &self,
        resource: &ResourceRef,
        actor: &User,
        transition: Transition,
    ) -> ApprovalResult<ItemOutcome> {
        let mut request = self
            .requests
            .current_for_resource(resource)?
            .ok_or_else(|| ApprovalError::not_found(EntityKind::Resource, resource))?;
        let workflow = self.workflow(request.workflow_id())?;
        let stored = self.commit(&mut request, &workflow, actor, transition)?;

        Ok(match stored.status() {
            RequestStatus::Pending => ItemOutcome::Advanced,
            RequestStatus::Approved => ItemOutcome::Approved,
            RequestStatus::Rejected => ItemOutcome::Rejected,
            RequestStatus::ReturnedForRevision => ItemOutcome::Returned,
        })
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn get(&self, request_id: &RequestId) -> ApprovalResult<ApprovalRequest> {
        self.requests
            .load(request_id)?
            .ok_or_else(|| ApprovalError::not_found(EntityKind::Request, request_id))
    }

    pub(crate) fn user(&self, id: &UserId) -> ApprovalResult<User> {
        self.users
            .get_user(id)?
            .ok_or_else(|| ApprovalError::not_found(EntityKind::User, id))
    }

    pub(crate) fn workflow(&self, id: &WorkflowId) -> ApprovalResult<WorkflowDefinition> {
        self.workflows
            .get_workflow(id)?
            .ok_or_else(|| ApprovalError::not_found(EntityKind::Workflow, id))
    }
}
