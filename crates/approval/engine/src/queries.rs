//! Read-side queries over approval requests

use crate::ApprovalService;
use approval_types::{
    ApprovalError, ApprovalRequest, ApprovalResult, DecisionEntry, EntityKind, InstitutionId,
    RequestId, RequestStatus, ResourceRef, User, UserId, WorkflowDefinition, WorkflowId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

/// Narrows [`ApprovalService::visible_to`]; unset fields match everything
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RequestStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<InstitutionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<WorkflowId>,
}

impl RequestFilter {
    pub fn status(mut self, status: RequestStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn institution(mut self, id: impl Into<String>) -> Self {
        self.institution_id = Some(InstitutionId::new(id));
        self
    }

    pub fn workflow(mut self, id: impl Into<String>) -> Self {
        self.workflow_id = Some(WorkflowId::new(id));
        self
    }

    pub fn matches(&self, request: &ApprovalRequest) -> bool {
        self.status.map_or(true, |s| s == request.status())
            && self
                .institution_id
                .as_ref()
                .map_or(true, |id| id == request.institution_id())
            && self
                .workflow_id
                .as_ref()
                .map_or(true, |id| id == request.workflow_id())
    }
}

/// One decision an actor took, with the request it belongs to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorDecision {
    pub request_id: RequestId,
    pub resource: ResourceRef,
    pub institution_id: InstitutionId,
    pub entry: DecisionEntry,
}

impl ApprovalService {
    /// Pending requests the actor may decide right now, most urgent first
    pub fn pending_for(&self, actor_id: &UserId) -> ApprovalResult<Vec<ApprovalRequest>> {
        let actor = self.user(actor_id)?;
        let mut workflows = WorkflowCache::default();
        let mut pending = Vec::new();

        for request in self.requests.list()? {
            if !request.is_pending() {
                continue;
            }
            let Some(workflow) = workflows.get(self, request.workflow_id())? else {
                continue;
            };
            if self
                .gate
                .can_act_at_level(&actor, workflow, &request, request.current_level())?
            {
                pending.push(request);
            }
        }

        pending.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| a.submitted_at().cmp(&b.submitted_at()))
        });
        Ok(pending)
    }

    /// The lowest level at which the actor could act on a request.
    ///
    /// Advisory; decisions are still gated on the current level.
    pub fn advisory_level(&self, actor_id: &UserId, request_id: &RequestId) -> ApprovalResult<u32> {
        let actor = self.user(actor_id)?;
        let request = self.get(request_id)?;
        let workflow = self.workflow(request.workflow_id())?;
        self.gate
            .determine_approval_level(&actor, &workflow, &request)
    }

    /// Requests the actor may see, newest first.
    ///
    /// An actor sees requests in scope and requests they submitted.
    pub fn visible_to(
        &self,
        actor_id: &UserId,
        filter: &RequestFilter,
    ) -> ApprovalResult<Vec<ApprovalRequest>> {
        let actor = self.user(actor_id)?;
        let scope = self.resolver.resolve_scope(&actor)?;

        let mut visible: Vec<_> = self
            .requests
            .list()?
            .into_iter()
            .filter(|r| filter.matches(r))
            .filter(|r| r.submitted_by() == &actor.id || scope.contains(r.institution_id()))
            .collect();
        visible.sort_by_key(|r| Reverse(r.submitted_at()));
        Ok(visible)
    }

    pub fn can_view(&self, actor_id: &UserId, request_id: &RequestId) -> ApprovalResult<bool> {
        let actor = self.user(actor_id)?;
        let request = self.get(request_id)?;
        if request.submitted_by() == &actor.id {
            return Ok(true);
        }
        self.resolver
            .is_authorized_for_institution(&actor, request.institution_id())
    }

    /// Every decision the actor recorded, newest first
    pub fn decisions_by(&self, actor_id: &UserId) -> ApprovalResult<Vec<ActorDecision>> {
        let mut decisions: Vec<_> = self
            .requests
            .list()?
            .into_iter()
            .flat_map(|request| {
                request
                    .history()
                    .iter()
                    .filter(|entry| &entry.actor_id == actor_id)
                    .map(|entry| ActorDecision {
                        request_id: request.id().clone(),
                        resource: request.resource().clone(),
                        institution_id: request.institution_id().clone(),
                        entry: entry.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        decisions.sort_by_key(|d| Reverse(d.entry.timestamp));
        Ok(decisions)
    }

    /// Every cycle of a resource, oldest first
    pub fn history_for_resource(
        &self,
        resource: &ResourceRef,
    ) -> ApprovalResult<Vec<ApprovalRequest>> {
        let cycles = self.requests.history_for_resource(resource)?;
        if cycles.is_empty() {
            return Err(ApprovalError::not_found(EntityKind::Resource, resource));
        }
        Ok(cycles)
    }

    /// Root-first breadcrumb of an institution, e.g. `Region > Sector T > School S`
    pub fn institution_path(&self, id: &InstitutionId) -> ApprovalResult<String> {
        let index = self.hierarchy.index()?;
        if !index.contains(id) {
            return Err(ApprovalError::not_found(EntityKind::Institution, id));
        }
        index.path_label(id)
    }

    /// Users who could decide the request at its current level.
    ///
    /// Candidates are the users homed at the request's institution or any
    /// of its ancestors. Unrestricted users without a home institution are
    /// not enumerated.
    pub fn eligible_approvers(&self, request_id: &RequestId) -> ApprovalResult<Vec<User>> {
        let request = self.get(request_id)?;
        if !request.is_pending() {
            return Ok(Vec::new());
        }
        let workflow = self.workflow(request.workflow_id())?;

        let index = self.hierarchy.index()?;
        let mut institutions = vec![request.institution_id().clone()];
        institutions.extend(index.ancestors_of(request.institution_id())?);

        let mut seen = BTreeSet::new();
        let mut approvers = Vec::new();
        for institution in &institutions {
            for user in self.users.users_at(institution)? {
                if !seen.insert(user.id.clone()) {
                    continue;
                }
                if self
                    .gate
                    .can_act_at_level(&user, &workflow, &request, request.current_level())?
                {
                    approvers.push(user);
                }
            }
        }
        Ok(approvers)
    }

    /// Pending requests whose deadline is before `now`, oldest deadline first
    pub fn overdue(&self, now: DateTime<Utc>) -> ApprovalResult<Vec<ApprovalRequest>> {
        let mut overdue: Vec<_> = self
            .requests
            .list()?
            .into_iter()
            .filter(|r| r.is_overdue(now))
            .collect();
        overdue.sort_by_key(|r| r.deadline());
        Ok(overdue)
    }
}

/// Workflow lookups memoized for the duration of one query
#[derive(Default)]
struct WorkflowCache {
    loaded: HashMap<WorkflowId, Option<WorkflowDefinition>>,
}

impl WorkflowCache {
    fn get(
        &mut self,
        service: &ApprovalService,
        id: &WorkflowId,
    ) -> ApprovalResult<Option<&WorkflowDefinition>> {
        if !self.loaded.contains_key(id) {
            let workflow = service.workflows.get_workflow(id)?;
            if workflow.is_none() {
                tracing::warn!(workflow_id = %id, "Request references unknown workflow");
            }
            self.loaded.insert(id.clone(), workflow);
        }
        Ok(self.loaded.get(id).and_then(Option::as_ref))
    }
}
