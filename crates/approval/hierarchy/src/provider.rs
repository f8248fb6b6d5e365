//! Institution tree provider: the collaborator that owns institution data

use approval_types::{ApprovalError, ApprovalResult, EntityKind, Institution, InstitutionId};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Read access to the institution tree
pub trait InstitutionProvider: Send + Sync {
    /// Look up one institution
    fn get_institution(&self, id: &InstitutionId) -> ApprovalResult<Option<Institution>>;

    /// Direct children of `id`
    fn enumerate_children(&self, id: &InstitutionId) -> ApprovalResult<Vec<Institution>>;

    /// Snapshot of the whole tree, used to build the index
    fn all_institutions(&self) -> ApprovalResult<Vec<Institution>>;

    /// Counter that changes whenever the tree changes.
    ///
    /// Caches compare it before serving a snapshot. Providers that cannot
    /// track changes keep the default and rely on explicit invalidation.
    fn revision(&self) -> u64 {
        0
    }
}

/// In-memory institution tree.
///
/// Performs no structural validation on insert; the index detects
/// integrity problems when it is built or traversed.
#[derive(Debug, Default)]
pub struct InMemoryInstitutionTree {
    institutions: RwLock<BTreeMap<InstitutionId, Institution>>,
    revision: AtomicU64,
}

impl InMemoryInstitutionTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_institutions(institutions: impl IntoIterator<Item = Institution>) -> Self {
        let map = institutions
            .into_iter()
            .map(|inst| (inst.id.clone(), inst))
            .collect();
        Self {
            institutions: RwLock::new(map),
            revision: AtomicU64::new(0),
        }
    }

    /// Insert or replace an institution
    pub fn upsert(&self, institution: Institution) -> ApprovalResult<()> {
        let mut guard = self.write()?;
        guard.insert(institution.id.clone(), institution);
        self.revision.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Move `id` under `new_parent`
    pub fn reparent(
        &self,
        id: &InstitutionId,
        new_parent: Option<InstitutionId>,
    ) -> ApprovalResult<()> {
        let mut guard = self.write()?;
        let inst = guard
            .get_mut(id)
            .ok_or_else(|| ApprovalError::not_found(EntityKind::Institution, id))?;
        inst.parent_id = new_parent;
        self.revision.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.institutions.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(
        &self,
    ) -> ApprovalResult<std::sync::RwLockWriteGuard<'_, BTreeMap<InstitutionId, Institution>>> {
        self.institutions
            .write()
            .map_err(|_| ApprovalError::Storage("institution tree lock poisoned".to_string()))
    }

    fn read(
        &self,
    ) -> ApprovalResult<std::sync::RwLockReadGuard<'_, BTreeMap<InstitutionId, Institution>>> {
        self.institutions
            .read()
            .map_err(|_| ApprovalError::Storage("institution tree lock poisoned".to_string()))
    }
}

impl InstitutionProvider for InMemoryInstitutionTree {
    fn get_institution(&self, id: &InstitutionId) -> ApprovalResult<Option<Institution>> {
        Ok(self.read()?.get(id).cloned())
    }

    fn enumerate_children(&self, id: &InstitutionId) -> ApprovalResult<Vec<Institution>> {
        Ok(self
            .read()?
            .values()
            .filter(|i| i.parent_id.as_ref() == Some(id))
            .cloned()
            .collect())
    }

    fn all_institutions(&self) -> ApprovalResult<Vec<Institution>> {
        Ok(self.read()?.values().cloned().collect())
    }

    fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approval_types::InstitutionTier;

    #[test]
    fn test_children_and_lookup() {
        let tree = InMemoryInstitutionTree::from_institutions([
            Institution::root("r", InstitutionTier::Region),
            Institution::child("t1", "r", InstitutionTier::Sector),
            Institution::child("t2", "r", InstitutionTier::Sector),
            Institution::child("s1", "t1", InstitutionTier::School),
        ]);

        assert_eq!(tree.len(), 4);
        let children = tree.enumerate_children(&InstitutionId::new("r")).unwrap();
        assert_eq!(children.len(), 2);
        assert!(tree
            .get_institution(&InstitutionId::new("s1"))
            .unwrap()
            .is_some());
        assert!(tree
            .get_institution(&InstitutionId::new("nope"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_reparent() {
        let tree = InMemoryInstitutionTree::from_institutions([
            Institution::root("r", InstitutionTier::Region),
            Institution::child("t1", "r", InstitutionTier::Sector),
            Institution::root("s1", InstitutionTier::School),
        ]);
        tree.reparent(&InstitutionId::new("s1"), Some(InstitutionId::new("t1")))
            .unwrap();
        let children = tree.enumerate_children(&InstitutionId::new("t1")).unwrap();
        assert_eq!(children[0].id, InstitutionId::new("s1"));

        let missing = tree.reparent(&InstitutionId::new("zz"), None);
        assert!(matches!(missing, Err(ApprovalError::NotFound { .. })));
    }

    #[test]
    fn test_revision_tracks_mutations() {
        let tree = InMemoryInstitutionTree::from_institutions([
            Institution::root("r", InstitutionTier::Region),
            Institution::root("t1", InstitutionTier::Sector),
        ]);
        assert_eq!(tree.revision(), 0);

        tree.upsert(Institution::child("s1", "r", InstitutionTier::School))
            .unwrap();
        assert_eq!(tree.revision(), 1);
        tree.reparent(&InstitutionId::new("t1"), Some(InstitutionId::new("r")))
            .unwrap();
        assert_eq!(tree.revision(), 2);

        // Failed moves and reads leave it alone
        assert!(tree.reparent(&InstitutionId::new("zz"), None).is_err());
        tree.all_institutions().unwrap();
        assert_eq!(tree.revision(), 2);
    }
}
