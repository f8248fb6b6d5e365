//! Authorization Scope Resolution
//!
//! The single place that decides which institutions an actor may act on.
//! A role maps to a [`RoleTier`](approval_types::RoleTier) through the
//! [`TierPolicy`]; the tier decides the shape of the [`Scope`]:
//!
//! - system-wide: [`Scope::Unrestricted`], never materialized
//! - region / sector: the home institution's whole subtree
//! - school: the home institution only
//! - unmapped role or missing home: empty (fail-closed)
//!
//! Scopes are resolved on every call. Nothing here caches per actor.

#![deny(unsafe_code)]

mod policy;
mod resolver;
mod scope;

pub use policy::TierPolicy;
pub use resolver::ScopeResolver;
pub use scope::Scope;
