//! Approval request persistence
//!
//! Every commit goes through an optimistic version check: a writer passes
//! the version it loaded, and the store refuses the write if another
//! writer committed in between.

use approval_types::{
    ApprovalError, ApprovalRequest, ApprovalResult, EntityKind, RequestId, ResourceRef,
};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Persistence boundary for approval requests
pub trait ApprovalStore: Send + Sync {
    fn load(&self, id: &RequestId) -> ApprovalResult<Option<ApprovalRequest>>;

    /// Store a new request and return it with its first version.
    ///
    /// Refused when the resource already has a pending request.
    fn insert(&self, request: ApprovalRequest) -> ApprovalResult<ApprovalRequest>;

    /// Commit a modified request if the stored version is still
    /// `expected_version`; returns the request with its new version.
    fn update(
        &self,
        request: ApprovalRequest,
        expected_version: u64,
    ) -> ApprovalResult<ApprovalRequest>;

    /// The latest cycle for a resource
    fn current_for_resource(&self, resource: &ResourceRef)
        -> ApprovalResult<Option<ApprovalRequest>>;

    /// Every cycle for a resource, oldest first
    fn history_for_resource(&self, resource: &ResourceRef) -> ApprovalResult<Vec<ApprovalRequest>>;

    /// All requests, oldest submission first
    fn list(&self) -> ApprovalResult<Vec<ApprovalRequest>>;
}

#[derive(Debug, Default)]
struct Tables {
    requests: HashMap<RequestId, ApprovalRequest>,
    /// Request ids per resource in cycle order
    by_resource: HashMap<ResourceRef, Vec<RequestId>>,
}

impl Tables {
    fn current(&self, resource: &ResourceRef) -> Option<&ApprovalRequest> {
        self.by_resource
            .get(resource)
            .and_then(|ids| ids.last())
            .and_then(|id| self.requests.get(id))
    }
}

/// In-memory request store
#[derive(Debug, Default)]
pub struct InMemoryApprovalStore {
    tables: RwLock<Tables>,
}

impl InMemoryApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().map(|t| t.requests.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> ApprovalResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| ApprovalError::Storage("approval store lock poisoned".to_string()))
    }

    fn write(&self) -> ApprovalResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| ApprovalError::Storage("approval store lock poisoned".to_string()))
    }
}

impl ApprovalStore for InMemoryApprovalStore {
    fn load(&self, id: &RequestId) -> ApprovalResult<Option<ApprovalRequest>> {
        Ok(self.read()?.requests.get(id).cloned())
    }

    fn insert(&self, mut request: ApprovalRequest) -> ApprovalResult<ApprovalRequest> {
        let mut tables = self.write()?;

        if tables.requests.contains_key(request.id()) {
            return Err(ApprovalError::InvalidState(format!(
                "request {} already exists",
                request.id()
            )));
        }
        if let Some(current) = tables.current(request.resource()) {
            if current.is_pending() {
                return Err(ApprovalError::InvalidState(format!(
                    "resource {} already has pending request {}",
                    request.resource(),
                    current.id()
                )));
            }
        }

        request.set_version(1);
        tables
            .by_resource
            .entry(request.resource().clone())
            .or_default()
            .push(request.id().clone());
        tables
            .requests
            .insert(request.id().clone(), request.clone());
        Ok(request)
    }

    fn update(
        &self,
        mut request: ApprovalRequest,
        expected_version: u64,
    ) -> ApprovalResult<ApprovalRequest> {
        let mut tables = self.write()?;
        let stored = tables
            .requests
            .get(request.id())
            .ok_or_else(|| ApprovalError::not_found(EntityKind::Request, request.id()))?;

        if stored.version() != expected_version {
            tracing::warn!(
                request_id = %request.id(),
                expected = expected_version,
                found = stored.version(),
                "Stale request update refused"
            );
            return Err(ApprovalError::ConcurrentModification {
                request: request.id().clone(),
                expected: expected_version,
                found: stored.version(),
            });
        }

        if stored.resource() != request.resource()
            || stored.institution_id() != request.institution_id()
            || stored.workflow_id() != request.workflow_id()
            || stored.cycle() != request.cycle()
            || stored.submitted_by() != request.submitted_by()
        {
            return Err(ApprovalError::DataIntegrity(format!(
                "request {} identity fields cannot change",
                request.id()
            )));
        }
        if !request.history().starts_with(stored.history()) {
            return Err(ApprovalError::DataIntegrity(format!(
                "request {} history is append-only",
                request.id()
            )));
        }

        request.set_version(expected_version + 1);
        tables
            .requests
            .insert(request.id().clone(), request.clone());
        Ok(request)
    }

    fn current_for_resource(
        &self,
        resource: &ResourceRef,
    ) -> ApprovalResult<Option<ApprovalRequest>> {
        Ok(self.read()?.current(resource).cloned())
    }

    fn history_for_resource(&self, resource: &ResourceRef) -> ApprovalResult<Vec<ApprovalRequest>> {
        let tables = self.read()?;
        Ok(tables
            .by_resource
            .get(resource)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| tables.requests.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list(&self) -> ApprovalResult<Vec<ApprovalRequest>> {
        let mut all: Vec<_> = self.read()?.requests.values().cloned().collect();
        all.sort_by(|a, b| {
            a.submitted_at()
                .cmp(&b.submitted_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approval_types::{Decision, DecisionEntry, RequestStatus, UserId};

    fn request(resource: &str) -> ApprovalRequest {
        ApprovalRequest::new(
            resource.into(),
            "S1".into(),
            "survey".into(),
            "teacher".into(),
            1,
        )
    }

    fn approval(level: u32) -> DecisionEntry {
        DecisionEntry::new(level, UserId::new("principal"), Decision::Approved, None)
    }

    #[test]
    fn test_insert_assigns_first_version() {
        let store = InMemoryApprovalStore::new();
        let stored = store.insert(request("doc-1")).unwrap();
        assert_eq!(stored.version(), 1);
        assert_eq!(store.load(stored.id()).unwrap(), Some(stored.clone()));
        assert_eq!(
            store
                .current_for_resource(&ResourceRef::new("doc-1"))
                .unwrap()
                .map(|r| r.id().clone()),
            Some(stored.id().clone())
        );
    }

    #[test]
    fn test_second_pending_for_resource_refused() {
        let store = InMemoryApprovalStore::new();
        store.insert(request("doc-1")).unwrap();
        assert!(matches!(
            store.insert(request("doc-1")),
            Err(ApprovalError::InvalidState(_))
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_bumps_version() {
        let store = InMemoryApprovalStore::new();
        let mut req = store.insert(request("doc-1")).unwrap();
        req.advance(approval(1), 2).unwrap();

        let saved = store.update(req, 1).unwrap();
        assert_eq!(saved.version(), 2);
        assert_eq!(saved.current_level(), 2);
    }

    #[test]
    fn test_stale_update_leaves_store_untouched() {
        let store = InMemoryApprovalStore::new();
        let loaded = store.insert(request("doc-1")).unwrap();
        let id = loaded.id().clone();

        let mut first = loaded.clone();
        first.advance(approval(1), 2).unwrap();
        store.update(first, 1).unwrap();

        let mut second = loaded;
        second
            .conclude(DecisionEntry::new(
                1,
                UserId::new("other"),
                Decision::Rejected,
                Some("no".into()),
            ))
            .unwrap();
        let err = store.update(second, 1).unwrap_err();
        assert_eq!(
            err,
            ApprovalError::ConcurrentModification {
                request: id.clone(),
                expected: 1,
                found: 2,
            }
        );

        let stored = store.load(&id).unwrap().unwrap();
        assert_eq!(stored.status(), RequestStatus::Pending);
        assert_eq!(stored.current_level(), 2);
        assert_eq!(stored.history().len(), 1);
    }

    #[test]
    fn test_history_cannot_be_rewritten() {
        let store = InMemoryApprovalStore::new();
        let mut req = store.insert(request("doc-1")).unwrap();
        let snapshot = req.clone();
        req.advance(approval(1), 2).unwrap();
        store.update(req, 1).unwrap();

        // An update built from the pre-decision snapshot drops history
        assert!(matches!(
            store.update(snapshot, 2),
            Err(ApprovalError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_update_unknown_request() {
        let store = InMemoryApprovalStore::new();
        assert!(matches!(
            store.update(request("doc-1"), 0),
            Err(ApprovalError::NotFound { .. })
        ));
    }

    #[test]
    fn test_cycles_kept_in_order() {
        let store = InMemoryApprovalStore::new();
        let mut first = store.insert(request("doc-1")).unwrap();
        first
            .conclude(DecisionEntry::new(
                1,
                UserId::new("principal"),
                Decision::ReturnedForRevision,
                Some("fix".into()),
            ))
            .unwrap();
        store.update(first.clone(), 1).unwrap();

        let second = store.insert(request("doc-1").with_cycle(2)).unwrap();
        store.insert(request("doc-2")).unwrap();

        let cycles = store
            .history_for_resource(&ResourceRef::new("doc-1"))
            .unwrap();
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].id(), first.id());
        assert_eq!(cycles[1].id(), second.id());
        assert_eq!(store.list().unwrap().len(), 3);
    }
}
