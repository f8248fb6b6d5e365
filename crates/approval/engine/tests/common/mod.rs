//! Shared fixture for engine integration tests.
//!
//! ```text
//! R (region) ─┬─ T (sector) ─┬─ S  (school)
//!             │              └─ S2 (school)
//!             └─ T2 (sector) ─── S3 (school)
//! ```

#![allow(dead_code)]

use approval_engine::*;
use approval_hierarchy::InMemoryInstitutionTree;
use approval_types::*;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const SURVEY: &str = "survey";

pub struct Fixture {
    pub service: ApprovalService,
    pub tree: Arc<InMemoryInstitutionTree>,
    pub users: Arc<InMemoryUserDirectory>,
    pub workflows: Arc<WorkflowRegistry>,
    pub store: Arc<InMemoryApprovalStore>,
    pub events: Arc<RecordingEventSink>,
}

impl Fixture {
    /// Submit `resource` at `institution` on behalf of the school's teacher
    pub fn submit(&self, resource: &str, institution: &str) -> ApprovalRequest {
        let submitter = match institution {
            "S2" => "teacher2",
            "S3" => "teacher3",
            _ => "teacher",
        };
        self.service
            .submit(Submission::new(resource, institution, SURVEY, submitter))
            .unwrap()
    }

    pub fn load(&self, id: &RequestId) -> ApprovalRequest {
        self.store.load(id).unwrap().unwrap()
    }
}

pub fn uid(id: &str) -> UserId {
    UserId::new(id)
}

pub fn refs(ids: &[&str]) -> Vec<ResourceRef> {
    ids.iter().map(|id| ResourceRef::new(*id)).collect()
}

pub fn fixture() -> Fixture {
    fixture_with(EngineConfig::default())
}

pub fn fixture_with(config: EngineConfig) -> Fixture {
    init_tracing();

    let tree = Arc::new(InMemoryInstitutionTree::from_institutions([
        Institution::root("R", InstitutionTier::Region).with_name("Region"),
        Institution::child("T", "R", InstitutionTier::Sector).with_name("Sector T"),
        Institution::child("T2", "R", InstitutionTier::Sector).with_name("Sector T2"),
        Institution::child("S", "T", InstitutionTier::School).with_name("School S"),
        Institution::child("S2", "T", InstitutionTier::School).with_name("School S2"),
        Institution::child("S3", "T2", InstitutionTier::School).with_name("School S3"),
    ]));

    let users = Arc::new(InMemoryUserDirectory::from_users([
        User::at("teacher", Role::teacher(), "S"),
        User::at("teacher2", Role::teacher(), "S2"),
        User::at("teacher3", Role::teacher(), "S3"),
        User::at("principal", Role::school_admin(), "S"),
        User::at("principal2", Role::school_admin(), "S2"),
        User::at("principal3", Role::school_admin(), "S3"),
        User::at("sector", Role::sector_admin(), "T"),
        User::at("sector2", Role::sector_admin(), "T2"),
        User::at("region", Role::region_admin(), "R"),
        User::new("root", Role::superadmin(), None),
    ]));

    let workflows = Arc::new(WorkflowRegistry::new());
    workflows
        .register(
            WorkflowDefinition::new(SURVEY, "Survey response approval")
                .with_step(1, [Role::school_admin()])
                .with_step(2, [Role::sector_admin()]),
        )
        .unwrap();

    let store = Arc::new(InMemoryApprovalStore::new());
    let events = Arc::new(RecordingEventSink::new());

    let service = ApprovalService::new(
        config,
        Collaborators {
            institutions: tree.clone(),
            users: users.clone(),
            workflows: workflows.clone(),
            requests: store.clone(),
            events: events.clone(),
        },
    );

    Fixture {
        service,
        tree,
        users,
        workflows,
        store,
        events,
    }
}

/// Surface engine logs with `RUST_LOG=approval_engine=debug`
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
