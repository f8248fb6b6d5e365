//! Scope resolver: actor → institutions it may act on

use crate::{Scope, TierPolicy};
use approval_hierarchy::CachedHierarchy;
use approval_types::{ApprovalResult, InstitutionId, RoleTier, User};
use std::sync::Arc;

/// Resolves actor scope against the institution hierarchy
#[derive(Debug, Clone)]
pub struct ScopeResolver {
    hierarchy: Arc<CachedHierarchy>,
    policy: TierPolicy,
}

impl ScopeResolver {
    pub fn new(hierarchy: Arc<CachedHierarchy>, policy: TierPolicy) -> Self {
        Self { hierarchy, policy }
    }

    pub fn policy(&self) -> &TierPolicy {
        &self.policy
    }

    pub fn hierarchy(&self) -> &Arc<CachedHierarchy> {
        &self.hierarchy
    }

    /// The institutions `user` may act on, resolved now
    pub fn resolve_scope(&self, user: &User) -> ApprovalResult<Scope> {
        let Some(tier) = self.policy.tier_of(&user.role) else {
            tracing::debug!(user = %user.id, role = %user.role, "Role has no tier, empty scope");
            return Ok(Scope::none());
        };

        if tier == RoleTier::SystemWide {
            return Ok(Scope::Unrestricted);
        }

        let Some(home) = user.home_institution_id.as_ref() else {
            tracing::debug!(user = %user.id, ?tier, "No home institution, empty scope");
            return Ok(Scope::none());
        };

        let scope = if tier.covers_subtree() {
            Scope::Institutions(self.hierarchy.index()?.descendants_of(home)?)
        } else {
            Scope::single(home.clone())
        };

        tracing::trace!(user = %user.id, ?tier, size = ?scope.len(), "Scope resolved");
        Ok(scope)
    }

    /// Whether `user` may act on `institution`.
    ///
    /// Agrees with [`resolve_scope`](Self::resolve_scope) but walks up from
    /// `institution` instead of collecting the whole subtree.
    pub fn is_authorized_for_institution(
        &self,
        user: &User,
        institution: &InstitutionId,
    ) -> ApprovalResult<bool> {
        let Some(tier) = self.policy.tier_of(&user.role) else {
            return Ok(false);
        };
        if tier == RoleTier::SystemWide {
            return Ok(true);
        }
        let Some(home) = user.home_institution_id.as_ref() else {
            return Ok(false);
        };

        if tier.covers_subtree() {
            self.hierarchy.index()?.is_self_or_descendant(home, institution)
        } else {
            Ok(home == institution)
        }
    }
}
