//! Approval Domain Types
//!
//! Approvals are sequential, role-gated decisions over a resource owned by
//! an institution. Who may decide is scoped by where the actor sits in the
//! institution tree.
//!
//! # Key Concepts
//!
//! - **Institution**: a node in the organizational tree (region, sector,
//!   school, ...). Depth is not fixed.
//! - **Role**: an opaque tag. The engine only tests it for membership in a
//!   step's allowed-role set.
//! - **RoleTier**: the closed set of scope shapes a role can map to.
//! - **WorkflowDefinition**: ordered approval steps, each with its allowed
//!   roles.
//! - **ApprovalRequest**: one resource's progress through a workflow, with
//!   an append-only decision history.
//! - **ApprovalEvent**: what the engine tells the outside world after a
//!   committed transition.

#![deny(unsafe_code)]

mod definition;
mod errors;
mod events;
mod ids;
mod institution;
mod request;
mod role;
mod user;

pub use definition::*;
pub use errors::*;
pub use events::*;
pub use ids::*;
pub use institution::*;
pub use request::*;
pub use role::*;
pub use user::*;
