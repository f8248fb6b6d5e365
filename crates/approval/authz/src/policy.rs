//! Role → tier policy

use approval_types::{Role, RoleTier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maps role tags to the scope tier they grant. Roles absent from the map
/// grant nothing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierPolicy {
    tiers: BTreeMap<Role, RoleTier>,
}

impl TierPolicy {
    /// A policy that maps no role at all
    pub fn empty() -> Self {
        Self {
            tiers: BTreeMap::new(),
        }
    }

    pub fn with(mut self, role: Role, tier: RoleTier) -> Self {
        self.tiers.insert(role, tier);
        self
    }

    pub fn tier_of(&self, role: &Role) -> Option<RoleTier> {
        self.tiers.get(role).copied()
    }

    /// Roles mapped to `tier`
    pub fn roles_with(&self, tier: RoleTier) -> impl Iterator<Item = &Role> {
        self.tiers
            .iter()
            .filter(move |(_, t)| **t == tier)
            .map(|(r, _)| r)
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self::empty()
            .with(Role::superadmin(), RoleTier::SystemWide)
            .with(Role::region_admin(), RoleTier::Region)
            .with(Role::sector_admin(), RoleTier::Sector)
            .with(Role::school_admin(), RoleTier::School)
            .with(Role::teacher(), RoleTier::School)
    }
}
