//! Approval Workflow Engine
//!
//! Moves approval requests through sequential, role-gated workflow steps.
//! Every decision is re-authorized at the moment it is taken: the actor's
//! role must be allowed at the request's current level, and the request's
//! institution must be inside the actor's scope.
//!
//! # Architecture
//!
//! The [`ApprovalService`] composes specialized components:
//!
//! - [`LevelGate`]: who may act at which level of a request
//! - [`ApprovalStateMachine`]: pure transitions over one request
//! - [`BulkAuthorizationPartitioner`]: splits a batch by scope before any
//!   transition runs
//! - Collaborator traits ([`UserDirectory`], [`WorkflowStore`],
//!   [`ApprovalStore`], [`EventSink`]) with in-memory adapters
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use approval_engine::*;
//! use approval_hierarchy::InMemoryInstitutionTree;
//! use approval_types::*;
//!
//! let tree = Arc::new(InMemoryInstitutionTree::from_institutions([
//!     Institution::root("T", InstitutionTier::Sector),
//!     Institution::child("S", "T", InstitutionTier::School),
//! ]));
//! let users = Arc::new(InMemoryUserDirectory::from_users([
//!     User::at("teacher", Role::teacher(), "S"),
//!     User::at("principal", Role::school_admin(), "S"),
//!     User::at("sector", Role::sector_admin(), "T"),
//! ]));
//! let workflows = Arc::new(WorkflowRegistry::new());
//! workflows
//!     .register(
//!         WorkflowDefinition::new("survey", "Survey response approval")
//!             .with_step(1, [Role::school_admin()])
//!             .with_step(2, [Role::sector_admin()]),
//!     )
//!     .unwrap();
//!
//! let service = ApprovalService::new(
//!     EngineConfig::default(),
//!     Collaborators {
//!         institutions: tree,
//!         users,
//!         workflows,
//!         requests: Arc::new(InMemoryApprovalStore::new()),
//!         events: Arc::new(RecordingEventSink::new()),
//!     },
//! );
//!
//! let request = service
//!     .submit(Submission::new("response-1", "S", "survey", "teacher"))
//!     .unwrap();
//! let request = service
//!     .approve(request.id(), &UserId::new("principal"), None)
//!     .unwrap();
//! assert_eq!(request.current_level(), 2);
//! let request = service
//!     .approve(request.id(), &UserId::new("sector"), None)
//!     .unwrap();
//! assert_eq!(request.status(), RequestStatus::Approved);
//! ```

#![deny(unsafe_code)]

pub mod bulk;
pub mod config;
pub mod directory;
pub mod eligibility;
pub mod events;
pub mod queries;
pub mod service;
pub mod state_machine;
pub mod store;
pub mod workflows;

// Re-export main types
pub use bulk::{
    BulkAction, BulkActionRequest, BulkAuthorizationPartitioner, BulkReport, ItemError,
    ItemOutcome, ItemResult, Partition,
};
pub use config::{EngineConfig, MAX_DEADLINE_DAYS};
pub use directory::{InMemoryUserDirectory, UserDirectory};
pub use eligibility::LevelGate;
pub use events::{EventSink, RecordingEventSink, TracingEventSink};
pub use queries::{ActorDecision, RequestFilter};
pub use service::{ApprovalService, Collaborators, Submission};
pub use state_machine::{ApprovalStateMachine, Transition};
pub use store::{ApprovalStore, InMemoryApprovalStore};
pub use workflows::{WorkflowRegistry, WorkflowStore};
