//! Roles and role tiers
//!
//! A [`Role`] is parsed once at the boundary and is opaque afterwards: the
//! engine compares it against allowed-role sets and nothing else. The scope
//! a role grants is expressed by the closed [`RoleTier`] enumeration.

use crate::{ApprovalError, ApprovalResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// An opaque, validated role tag
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Role(String);

impl Role {
    /// Parse a role tag. Tags are trimmed and lower-cased; anything other
    /// than `[a-z0-9_-]` afterwards is rejected.
    pub fn parse(raw: &str) -> ApprovalResult<Self> {
        let tag = raw.trim().to_ascii_lowercase();
        if tag.is_empty() {
            return Err(ApprovalError::InvalidInput("role tag is empty".into()));
        }
        if let Some(bad) = tag
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(ApprovalError::InvalidInput(format!(
                "role tag '{}' contains invalid character '{}'",
                raw, bad
            )));
        }
        Ok(Self(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn superadmin() -> Self {
        Self("superadmin".into())
    }

    pub fn region_admin() -> Self {
        Self("regionadmin".into())
    }

    pub fn sector_admin() -> Self {
        Self("sektoradmin".into())
    }

    pub fn school_admin() -> Self {
        Self("schooladmin".into())
    }

    pub fn teacher() -> Self {
        Self("muellim".into())
    }
}

impl FromStr for Role {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Role {
    type Error = ApprovalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.0
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The shape of institution scope a role grants
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleTier {
    /// Every institution, present and future
    SystemWide,
    /// The home institution and its whole subtree
    Region,
    /// The home institution and its whole subtree
    Sector,
    /// The home institution only
    School,
}

impl RoleTier {
    /// Whether this tier covers the home institution's subtree
    pub fn covers_subtree(&self) -> bool {
        matches!(self, Self::Region | Self::Sector)
    }
}
