//! Engine configuration

use approval_authz::TierPolicy;
use approval_types::{ApprovalError, ApprovalResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound for `default_deadline_days` (ten years)
pub const MAX_DEADLINE_DAYS: u32 = 3650;

/// Engine configuration.
///
/// Loaded from TOML. Every field has a default; a `[tier_policy]` table,
/// when present, replaces the default role mapping entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Role → scope tier mapping
    pub tier_policy: TierPolicy,

    /// Largest batch accepted by a bulk operation
    pub max_bulk_batch_size: usize,

    /// Days until a new request's deadline; 0 disables deadlines
    pub default_deadline_days: u32,

    /// Stop at optional workflow steps instead of skipping them
    pub require_all_levels: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tier_policy: TierPolicy::default(),
            max_bulk_batch_size: 100,
            default_deadline_days: 7,
            require_all_levels: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    ///
    /// `None` or a missing file yields defaults.
    pub fn load(path: Option<&Path>) -> ApprovalResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            ApprovalError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> ApprovalResult<Self> {
        let config: EngineConfig =
            toml::from_str(contents).map_err(|e| ApprovalError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ApprovalResult<()> {
        if self.max_bulk_batch_size == 0 {
            return Err(ApprovalError::Config(
                "max_bulk_batch_size must be at least 1".into(),
            ));
        }
        if self.default_deadline_days > MAX_DEADLINE_DAYS {
            return Err(ApprovalError::Config(format!(
                "default_deadline_days must be at most {}",
                MAX_DEADLINE_DAYS
            )));
        }
        Ok(())
    }
}
