//! Cached hierarchy: builds the index lazily and rebuilds when the tree changes

use crate::{HierarchyIndex, InstitutionProvider};
use approval_types::{ApprovalError, ApprovalResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Shares one [`HierarchyIndex`] between readers.
///
/// Reads are served from the cached snapshot while the provider's
/// [`revision`](InstitutionProvider::revision) is unchanged; a new revision
/// triggers a rebuild on the next read. Providers that do not track
/// revisions need [`CachedHierarchy::invalidate`] after each mutation.
pub struct CachedHierarchy {
    provider: Arc<dyn InstitutionProvider>,
    /// Snapshot tagged with the provider revision it was built from
    index: RwLock<Option<(u64, Arc<HierarchyIndex>)>>,
    generation: AtomicU64,
}

impl CachedHierarchy {
    pub fn new(provider: Arc<dyn InstitutionProvider>) -> Self {
        Self {
            provider,
            index: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// The current snapshot, building it if needed
    pub fn index(&self) -> ApprovalResult<Arc<HierarchyIndex>> {
        // Read before the snapshot so a concurrent mutation forces another rebuild
        let revision = self.provider.revision();
        {
            let guard = self
                .index
                .read()
                .map_err(|_| ApprovalError::Storage("hierarchy cache lock poisoned".to_string()))?;
            if let Some(index) = Self::current(&guard, revision) {
                return Ok(index);
            }
        }

        let mut guard = self
            .index
            .write()
            .map_err(|_| ApprovalError::Storage("hierarchy cache lock poisoned".to_string()))?;
        // Another reader may have rebuilt while we waited for the write lock
        if let Some(index) = Self::current(&guard, revision) {
            return Ok(index);
        }

        let index = Arc::new(HierarchyIndex::from_provider(self.provider.as_ref())?);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(
            generation,
            revision,
            institutions = index.len(),
            "Hierarchy cache rebuilt"
        );
        *guard = Some((revision, Arc::clone(&index)));
        Ok(index)
    }

    fn current(
        cached: &Option<(u64, Arc<HierarchyIndex>)>,
        revision: u64,
    ) -> Option<Arc<HierarchyIndex>> {
        cached
            .as_ref()
            .filter(|(built_from, _)| *built_from == revision)
            .map(|(_, index)| Arc::clone(index))
    }

    /// Drop the cached snapshot. Readers holding an `Arc` keep their copy.
    ///
    /// Needed only for providers whose revision does not move on mutation.
    pub fn invalidate(&self) {
        match self.index.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
        tracing::debug!("Hierarchy cache invalidated");
    }

    /// Number of times the index has been built
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn provider(&self) -> &Arc<dyn InstitutionProvider> {
        &self.provider
    }
}

impl std::fmt::Debug for CachedHierarchy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedHierarchy")
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryInstitutionTree;
    use approval_types::{ApprovalResult, Institution, InstitutionId, InstitutionTier};

    /// Provider that never reports a new revision
    struct Untracked(InMemoryInstitutionTree);

    impl InstitutionProvider for Untracked {
        fn get_institution(&self, id: &InstitutionId) -> ApprovalResult<Option<Institution>> {
            self.0.get_institution(id)
        }

        fn enumerate_children(&self, id: &InstitutionId) -> ApprovalResult<Vec<Institution>> {
            self.0.enumerate_children(id)
        }

        fn all_institutions(&self) -> ApprovalResult<Vec<Institution>> {
            self.0.all_institutions()
        }
    }

    #[test]
    fn test_index_rebuilds_on_new_revision() {
        let tree = Arc::new(InMemoryInstitutionTree::from_institutions([
            Institution::root("R", InstitutionTier::Region),
            Institution::child("T", "R", InstitutionTier::Sector),
        ]));
        let cache = CachedHierarchy::new(tree.clone());

        let first = cache.index().unwrap();
        let second = cache.index().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.generation(), 1);

        tree.upsert(Institution::child("S", "T", InstitutionTier::School))
            .unwrap();
        let rebuilt = cache.index().unwrap();
        assert!(rebuilt.contains(&InstitutionId::new("S")));
        assert_eq!(cache.generation(), 2);
        // The old snapshot is unaffected
        assert!(!first.contains(&InstitutionId::new("S")));

        // Unchanged revision serves the cached copy again
        assert!(Arc::ptr_eq(&rebuilt, &cache.index().unwrap()));
        assert_eq!(cache.generation(), 2);
    }

    #[test]
    fn test_untracked_provider_needs_invalidation() {
        let provider = Arc::new(Untracked(InMemoryInstitutionTree::from_institutions([
            Institution::root("R", InstitutionTier::Region),
        ])));
        let cache = CachedHierarchy::new(provider.clone());
        cache.index().unwrap();

        provider
            .0
            .upsert(Institution::child("T", "R", InstitutionTier::Sector))
            .unwrap();
        // Stale until invalidated
        assert!(!cache.index().unwrap().contains(&InstitutionId::new("T")));

        cache.invalidate();
        assert!(cache.index().unwrap().contains(&InstitutionId::new("T")));
        assert_eq!(cache.generation(), 2);
    }
}
