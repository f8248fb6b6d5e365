//! Level eligibility: may this user act at this level of this request?
//!
//! Answers combine two independent checks. The workflow step must
//! allow-list the user's role, and the request's institution must be in
//! the user's scope. Neither is cached; both are evaluated per call so that
//! role changes and tree moves take effect on the next decision.

use approval_authz::ScopeResolver;
use approval_types::{ApprovalError, ApprovalRequest, ApprovalResult, User, WorkflowDefinition};
use std::sync::Arc;

/// Decides which workflow levels a user may act at
#[derive(Debug, Clone)]
pub struct LevelGate {
    resolver: Arc<ScopeResolver>,
}

impl LevelGate {
    pub fn new(resolver: Arc<ScopeResolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &Arc<ScopeResolver> {
        &self.resolver
    }

    /// The lowest level of `workflow` at which `user` could act on `request`.
    ///
    /// Advisory only: transitions are gated on the request's current level,
    /// never on this answer.
    pub fn determine_approval_level(
        &self,
        user: &User,
        workflow: &WorkflowDefinition,
        request: &ApprovalRequest,
    ) -> ApprovalResult<u32> {
        if !self
            .resolver
            .is_authorized_for_institution(user, request.institution_id())?
        {
            return Err(ApprovalError::not_authorized(
                &user.id,
                format!("institution {} is outside scope", request.institution_id()),
            ));
        }

        workflow
            .steps()
            .find(|step| step.allows(&user.role))
            .map(|step| step.level)
            .ok_or_else(|| {
                ApprovalError::not_authorized(
                    &user.id,
                    format!(
                        "role {} is not allowed at any level of workflow {}",
                        user.role, workflow.id
                    ),
                )
            })
    }

    /// Whether `user` may act on `request` at `level`
    pub fn can_act_at_level(
        &self,
        user: &User,
        workflow: &WorkflowDefinition,
        request: &ApprovalRequest,
        level: u32,
    ) -> ApprovalResult<bool> {
        let role_allowed = workflow
            .step(level)
            .is_some_and(|step| step.allows(&user.role));
        if !role_allowed {
            return Ok(false);
        }
        self.resolver
            .is_authorized_for_institution(user, request.institution_id())
    }

    /// Like [`can_act_at_level`](Self::can_act_at_level) for the request's
    /// current level, but explains a refusal.
    pub fn ensure_can_act(
        &self,
        user: &User,
        workflow: &WorkflowDefinition,
        request: &ApprovalRequest,
    ) -> ApprovalResult<()> {
        let level = request.current_level();
        let step = workflow.step(level).ok_or_else(|| {
            ApprovalError::DataIntegrity(format!(
                "request {} is at level {} which workflow {} does not declare",
                request.id(),
                level,
                workflow.id
            ))
        })?;

        if !step.allows(&user.role) {
            return Err(ApprovalError::not_authorized(
                &user.id,
                format!("role {} is not allowed at level {}", user.role, level),
            ));
        }

        if !self
            .resolver
            .is_authorized_for_institution(user, request.institution_id())?
        {
            return Err(ApprovalError::not_authorized(
                &user.id,
                format!("institution {} is outside scope", request.institution_id()),
            ));
        }

        Ok(())
    }
}
