//! State machine: applies decisions to a single approval request
//!
//! Transitions are pure over an in-memory request: the caller loads the
//! request, applies a [`Transition`], and commits the result. Every
//! accepted transition appends exactly one decision entry and yields the
//! event to publish once the commit succeeds.
//!
//! Checks run in a fixed order: the request must be pending, the actor must
//! be eligible at the request's current level, and only then is the
//! decision text validated.

use crate::LevelGate;
use approval_types::{
    ApprovalError, ApprovalEvent, ApprovalRequest, ApprovalResult, Decision, DecisionEntry,
    EventContext, User, WorkflowDefinition,
};

/// A decision an actor takes on a pending request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    Approve { comment: Option<String> },
    Reject { reason: String },
    ReturnForRevision { comments: String },
}

impl Transition {
    pub fn approve(comment: Option<String>) -> Self {
        Self::Approve { comment }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self::Reject {
            reason: reason.into(),
        }
    }

    pub fn return_for_revision(comments: impl Into<String>) -> Self {
        Self::ReturnForRevision {
            comments: comments.into(),
        }
    }

    pub fn decision(&self) -> Decision {
        match self {
            Self::Approve { .. } => Decision::Approved,
            Self::Reject { .. } => Decision::Rejected,
            Self::ReturnForRevision { .. } => Decision::ReturnedForRevision,
        }
    }

    /// Rejections and returns must explain themselves
    fn validated_text(&self) -> ApprovalResult<Option<String>> {
        match self {
            Self::Approve { comment } => Ok(comment
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)),
            Self::Reject { reason } => required_text(reason, "rejection reason").map(Some),
            Self::ReturnForRevision { comments } => {
                required_text(comments, "revision comments").map(Some)
            }
        }
    }
}

fn required_text(text: &str, what: &str) -> ApprovalResult<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ApprovalError::InvalidInput(format!("{} must not be empty", what)));
    }
    Ok(trimmed.to_string())
}

/// Applies transitions to approval requests
#[derive(Clone, Debug)]
pub struct ApprovalStateMachine {
    gate: LevelGate,
    require_all_levels: bool,
}

impl ApprovalStateMachine {
    pub fn new(gate: LevelGate, require_all_levels: bool) -> Self {
        Self {
            gate,
            require_all_levels,
        }
    }

    pub fn gate(&self) -> &LevelGate {
        &self.gate
    }

    pub fn approve(
        &self,
        request: &mut ApprovalRequest,
        workflow: &WorkflowDefinition,
        actor: &User,
        comment: Option<String>,
    ) -> ApprovalResult<ApprovalEvent> {
        self.apply(request, workflow, actor, Transition::approve(comment))
    }

    pub fn reject(
        &self,
        request: &mut ApprovalRequest,
        workflow: &WorkflowDefinition,
        actor: &User,
        reason: impl Into<String>,
    ) -> ApprovalResult<ApprovalEvent> {
        self.apply(request, workflow, actor, Transition::reject(reason))
    }

    pub fn return_for_revision(
        &self,
        request: &mut ApprovalRequest,
        workflow: &WorkflowDefinition,
        actor: &User,
        comments: impl Into<String>,
    ) -> ApprovalResult<ApprovalEvent> {
        self.apply(request, workflow, actor, Transition::return_for_revision(comments))
    }

    /// Apply `transition` to `request` on behalf of `actor`.
    ///
    /// On error the request is left exactly as it was.
    pub fn apply(
        &self,
        request: &mut ApprovalRequest,
        workflow: &WorkflowDefinition,
        actor: &User,
        transition: Transition,
    ) -> ApprovalResult<ApprovalEvent> {
        if !request.is_pending() {
            return Err(ApprovalError::InvalidState(format!(
                "request {} is {} and accepts no further decisions",
                request.id(),
                request.status()
            )));
        }
        if request.workflow_id() != &workflow.id {
            return Err(ApprovalError::InvalidState(format!(
                "request {} follows workflow {}, not {}",
                request.id(),
                request.workflow_id(),
                workflow.id
            )));
        }

        self.gate.ensure_can_act(actor, workflow, request)?;
        let text = transition.validated_text()?;

        let level = request.current_level();
        let entry = DecisionEntry::new(level, actor.id.clone(), transition.decision(), text.clone());

        let event = match transition {
            Transition::Approve { .. } => {
                match workflow.next_level_after(level, self.require_all_levels) {
                    Some(to_level) => {
                        request.advance(entry, to_level)?;
                        ApprovalEvent::RequestAdvanced {
                            context: EventContext::for_request(request, &actor.id),
                            from_level: level,
                            to_level,
                        }
                    }
                    None => {
                        request.conclude(entry)?;
                        ApprovalEvent::RequestApproved {
                            context: EventContext::for_request(request, &actor.id),
                            level,
                        }
                    }
                }
            }
            Transition::Reject { .. } => {
                request.conclude(entry)?;
                ApprovalEvent::RequestRejected {
                    context: EventContext::for_request(request, &actor.id),
                    level,
                    reason: text.unwrap_or_default(),
                }
            }
            Transition::ReturnForRevision { .. } => {
                request.conclude(entry)?;
                ApprovalEvent::RequestReturned {
                    context: EventContext::for_request(request, &actor.id),
                    level,
                    comments: text.unwrap_or_default(),
                }
            }
        };

        tracing::debug!(
            request_id = %request.id(),
            actor = %actor.id,
            level,
            status = %request.status(),
            "Transition applied"
        );
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approval_authz::{ScopeResolver, TierPolicy};
    use approval_hierarchy::{CachedHierarchy, InMemoryInstitutionTree};
    use approval_types::{Institution, InstitutionTier, RequestStatus, Role};
    use std::sync::Arc;

    fn machine(require_all_levels: bool) -> ApprovalStateMachine {
        let tree = Arc::new(InMemoryInstitutionTree::from_institutions([
            Institution::root("T", InstitutionTier::Sector),
            Institution::child("S", "T", InstitutionTier::School),
            Institution::child("S2", "T", InstitutionTier::School),
        ]));
        let resolver = ScopeResolver::new(
            Arc::new(CachedHierarchy::new(tree)),
            TierPolicy::default(),
        );
        ApprovalStateMachine::new(LevelGate::new(Arc::new(resolver)), require_all_levels)
    }

    fn workflow() -> WorkflowDefinition {
        WorkflowDefinition::new("survey", "Survey")
            .with_step(1, [Role::school_admin()])
            .with_step(2, [Role::sector_admin()])
    }

    fn request() -> ApprovalRequest {
        ApprovalRequest::new(
            "doc".into(),
            "S".into(),
            "survey".into(),
            "teacher".into(),
            1,
        )
    }

    fn principal() -> User {
        User::at("principal", Role::school_admin(), "S")
    }

    fn sector() -> User {
        User::at("sector", Role::sector_admin(), "T")
    }

    #[test]
    fn test_approve_advances_then_concludes() {
        let sm = machine(false);
        let wf = workflow();
        let mut req = request();

        let event = sm.approve(&mut req, &wf, &principal(), None).unwrap();
        assert!(matches!(
            event,
            ApprovalEvent::RequestAdvanced {
                from_level: 1,
                to_level: 2,
                ..
            }
        ));
        assert_eq!(req.current_level(), 2);
        assert!(req.is_pending());

        let event = sm
            .approve(&mut req, &wf, &sector(), Some("ok".into()))
            .unwrap();
        assert!(matches!(event, ApprovalEvent::RequestApproved { level: 2, .. }));
        assert_eq!(req.status(), RequestStatus::Approved);
        assert_eq!(req.history().len(), 2);
        assert_eq!(req.history()[1].comment.as_deref(), Some("ok"));
    }

    #[test]
    fn test_optional_step_skipped_unless_required() {
        let wf = WorkflowDefinition::new("survey", "Survey")
            .with_step(1, [Role::school_admin()])
            .with_optional_step(2, [Role::sector_admin()]);

        let mut req = request();
        machine(false)
            .approve(&mut req, &wf, &principal(), None)
            .unwrap();
        assert_eq!(req.status(), RequestStatus::Approved);

        let mut req = request();
        machine(true)
            .approve(&mut req, &wf, &principal(), None)
            .unwrap();
        assert_eq!(req.current_level(), 2);
    }

    #[test]
    fn test_reject_requires_reason() {
        let sm = machine(false);
        let wf = workflow();
        let mut req = request();

        assert!(matches!(
            sm.reject(&mut req, &wf, &principal(), "   "),
            Err(ApprovalError::InvalidInput(_))
        ));
        assert!(req.history().is_empty());

        let event = sm
            .reject(&mut req, &wf, &principal(), " incomplete ")
            .unwrap();
        match event {
            ApprovalEvent::RequestRejected { reason, level, .. } => {
                assert_eq!(reason, "incomplete");
                assert_eq!(level, 1);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(req.status(), RequestStatus::Rejected);
    }

    #[test]
    fn test_return_for_revision() {
        let sm = machine(false);
        let wf = workflow();
        let mut req = request();
        sm.approve(&mut req, &wf, &principal(), None).unwrap();

        let event = sm
            .return_for_revision(&mut req, &wf, &sector(), "fix section 2")
            .unwrap();
        assert_eq!(event.kind(), "request_returned");
        assert_eq!(req.status(), RequestStatus::ReturnedForRevision);
        assert_eq!(req.history()[1].decision, Decision::ReturnedForRevision);
    }

    #[test]
    fn test_wrong_level_role_is_refused_not_coerced() {
        let sm = machine(false);
        let wf = workflow();
        let mut req = request();
        let before = req.clone();

        // Sector admin is in scope but only allowed at level 2
        assert!(matches!(
            sm.approve(&mut req, &wf, &sector(), None),
            Err(ApprovalError::NotAuthorized { .. })
        ));
        assert_eq!(req, before);
    }

    #[test]
    fn test_out_of_scope_actor_refused() {
        let sm = machine(false);
        let mut req = request();
        let outsider = User::at("p2", Role::school_admin(), "S2");
        assert!(matches!(
            sm.approve(&mut req, &workflow(), &outsider, None),
            Err(ApprovalError::NotAuthorized { .. })
        ));
        assert_eq!(req.current_level(), 1);
    }

    #[test]
    fn test_terminal_state_checked_before_authorization() {
        let sm = machine(false);
        let wf = workflow();
        let mut req = request();
        sm.reject(&mut req, &wf, &principal(), "no").unwrap();
        let before = req.clone();

        // An unauthorized actor on a terminal request sees the state error
        let outsider = User::at("p2", Role::school_admin(), "S2");
        for transition in [
            Transition::approve(None),
            Transition::reject("again"),
            Transition::return_for_revision("again"),
        ] {
            assert!(matches!(
                sm.apply(&mut req, &wf, &outsider, transition),
                Err(ApprovalError::InvalidState(_))
            ));
        }
        assert_eq!(req, before);
    }

    #[test]
    fn test_mismatched_workflow_refused() {
        let sm = machine(false);
        let other = WorkflowDefinition::new("other", "Other").with_step(1, [Role::school_admin()]);
        let mut req = request();
        assert!(matches!(
            sm.approve(&mut req, &other, &principal(), None),
            Err(ApprovalError::InvalidState(_))
        ));
    }
}
