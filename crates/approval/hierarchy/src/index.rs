//! Arena-backed institution hierarchy index
//!
//! One slot per institution. Each slot holds the institution, a parent
//! pointer and the list of child slots. All queries work on slot indices
//! and never go back to the provider.

use crate::InstitutionProvider;
use approval_types::{ApprovalError, ApprovalResult, Institution, InstitutionId};
use std::collections::{BTreeSet, HashMap};

#[derive(Clone, Debug)]
struct Node {
    institution: Institution,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Immutable snapshot of the institution tree
#[derive(Clone, Debug, Default)]
pub struct HierarchyIndex {
    nodes: Vec<Node>,
    slots: HashMap<InstitutionId, usize>,
}

impl HierarchyIndex {
    /// Build the index from a set of institutions.
    ///
    /// Duplicate ids are a `DataIntegrity` error. A parent id that is not
    /// part of the set is treated as absent and the institution becomes a
    /// root. Parent cycles are not rejected here; traversals detect them.
    pub fn build(institutions: impl IntoIterator<Item = Institution>) -> ApprovalResult<Self> {
        let mut nodes: Vec<Node> = Vec::new();
        let mut slots: HashMap<InstitutionId, usize> = HashMap::new();

        for institution in institutions {
            if slots.contains_key(&institution.id) {
                return Err(ApprovalError::DataIntegrity(format!(
                    "institution '{}' appears more than once",
                    institution.id
                )));
            }
            slots.insert(institution.id.clone(), nodes.len());
            nodes.push(Node {
                institution,
                parent: None,
                children: Vec::new(),
            });
        }

        for slot in 0..nodes.len() {
            let Some(parent_id) = nodes[slot].institution.parent_id.clone() else {
                continue;
            };
            match slots.get(&parent_id) {
                Some(&parent) => {
                    nodes[slot].parent = Some(parent);
                    nodes[parent].children.push(slot);
                }
                None => {
                    tracing::warn!(
                        institution = %nodes[slot].institution.id,
                        parent = %parent_id,
                        "Parent institution missing from tree, treating as root"
                    );
                }
            }
        }

        tracing::debug!(institutions = nodes.len(), "Hierarchy index built");
        Ok(Self { nodes, slots })
    }

    /// Build from a provider snapshot
    pub fn from_provider(provider: &dyn InstitutionProvider) -> ApprovalResult<Self> {
        Self::build(provider.all_institutions()?)
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn get(&self, id: &InstitutionId) -> Option<&Institution> {
        self.slots.get(id).map(|&s| &self.nodes[s].institution)
    }

    pub fn contains(&self, id: &InstitutionId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Institutions without a (known) parent
    pub fn roots(&self) -> Vec<&InstitutionId> {
        self.nodes
            .iter()
            .filter(|n| n.parent.is_none())
            .map(|n| &n.institution.id)
            .collect()
    }

    pub fn parent_of(&self, id: &InstitutionId) -> Option<&InstitutionId> {
        let slot = *self.slots.get(id)?;
        self.nodes[slot]
            .parent
            .map(|p| &self.nodes[p].institution.id)
    }

    /// Direct children of `id`
    pub fn children_of(&self, id: &InstitutionId) -> Vec<&InstitutionId> {
        match self.slots.get(id) {
            Some(&slot) => self.nodes[slot]
                .children
                .iter()
                .map(|&c| &self.nodes[c].institution.id)
                .collect(),
            None => Vec::new(),
        }
    }

    // ── Traversals ───────────────────────────────────────────────────

    /// `id` and everything below it, to any depth.
    ///
    /// Unknown ids yield an empty set.
    pub fn descendants_of(&self, id: &InstitutionId) -> ApprovalResult<BTreeSet<InstitutionId>> {
        let mut result = BTreeSet::new();
        let Some(&start) = self.slots.get(id) else {
            return Ok(result);
        };

        // Each slot has one parent, so reaching a slot twice means the
        // parent links loop back into this subtree.
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![start];
        while let Some(slot) = stack.pop() {
            if visited[slot] {
                return Err(self.cycle_error(slot));
            }
            visited[slot] = true;
            result.insert(self.nodes[slot].institution.id.clone());
            stack.extend(self.nodes[slot].children.iter().copied());
        }

        Ok(result)
    }

    /// Whether `candidate` is `ancestor` or lies below it. Walks upward
    /// from `candidate`, O(depth).
    pub fn is_self_or_descendant(
        &self,
        ancestor: &InstitutionId,
        candidate: &InstitutionId,
    ) -> ApprovalResult<bool> {
        let (Some(&target), Some(&start)) = (self.slots.get(ancestor), self.slots.get(candidate))
        else {
            return Ok(false);
        };

        let mut found = false;
        self.walk_up(start, |slot| {
            if slot == target {
                found = true;
            }
            !found
        })?;
        Ok(found)
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself
    pub fn ancestors_of(&self, id: &InstitutionId) -> ApprovalResult<Vec<InstitutionId>> {
        let Some(&start) = self.slots.get(id) else {
            return Ok(Vec::new());
        };

        let mut ancestors = Vec::new();
        self.walk_up(start, |slot| {
            if slot != start {
                ancestors.push(self.nodes[slot].institution.id.clone());
            }
            true
        })?;
        Ok(ancestors)
    }

    /// Root-first path ending at `id`
    pub fn path_of(&self, id: &InstitutionId) -> ApprovalResult<Vec<&Institution>> {
        let Some(&start) = self.slots.get(id) else {
            return Ok(Vec::new());
        };

        let mut path = Vec::new();
        self.walk_up(start, |slot| {
            path.push(&self.nodes[slot].institution);
            true
        })?;
        path.reverse();
        Ok(path)
    }

    /// Human-readable path, e.g. `Baku > Sector 3 > School 12`
    pub fn path_label(&self, id: &InstitutionId) -> ApprovalResult<String> {
        let path = self.path_of(id)?;
        let labels: Vec<&str> = path.iter().map(|i| i.label()).collect();
        Ok(labels.join(" > "))
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Visit `start` and its ancestors until `visit` returns false
    fn walk_up(
        &self,
        start: usize,
        mut visit: impl FnMut(usize) -> bool,
    ) -> ApprovalResult<()> {
        let mut visited = vec![false; self.nodes.len()];
        let mut current = Some(start);
        while let Some(slot) = current {
            if visited[slot] {
                return Err(self.cycle_error(slot));
            }
            visited[slot] = true;
            if !visit(slot) {
                break;
            }
            current = self.nodes[slot].parent;
        }
        Ok(())
    }

    fn cycle_error(&self, slot: usize) -> ApprovalError {
        let id = &self.nodes[slot].institution.id;
        tracing::error!(institution = %id, "Cycle detected in institution hierarchy");
        ApprovalError::DataIntegrity(format!(
            "institution hierarchy contains a cycle through '{}'",
            id
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approval_types::InstitutionTier;

    fn id(s: &str) -> InstitutionId {
        InstitutionId::new(s)
    }

    /// R ─┬─ T1 ─┬─ S1 ── U1
    ///    │      └─ S2
    ///    └─ T2 ─── S3
    fn sample() -> HierarchyIndex {
        HierarchyIndex::build([
            Institution::root("R", InstitutionTier::Region).with_name("Region"),
            Institution::child("T1", "R", InstitutionTier::Sector).with_name("Sector 1"),
            Institution::child("T2", "R", InstitutionTier::Sector),
            Institution::child("S1", "T1", InstitutionTier::School).with_name("School 1"),
            Institution::child("S2", "T1", InstitutionTier::School),
            Institution::child("S3", "T2", InstitutionTier::School),
            Institution::child("U1", "S1", InstitutionTier::Unit),
        ])
        .unwrap()
    }

    #[test]
    fn test_descendants_include_self_and_full_depth() {
        let index = sample();
        let d = index.descendants_of(&id("T1")).unwrap();
        let expected: BTreeSet<_> = ["T1", "S1", "S2", "U1"].into_iter().map(id).collect();
        assert_eq!(d, expected);

        assert_eq!(index.descendants_of(&id("R")).unwrap().len(), 7);
        assert_eq!(index.descendants_of(&id("U1")).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_id_is_empty_not_error() {
        let index = sample();
        assert!(index.descendants_of(&id("missing")).unwrap().is_empty());
        assert!(!index.is_self_or_descendant(&id("R"), &id("missing")).unwrap());
        assert!(index.ancestors_of(&id("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_is_self_or_descendant() {
        let index = sample();
        assert!(index.is_self_or_descendant(&id("R"), &id("U1")).unwrap());
        assert!(index.is_self_or_descendant(&id("S1"), &id("S1")).unwrap());
        assert!(!index.is_self_or_descendant(&id("T2"), &id("S1")).unwrap());
        assert!(!index.is_self_or_descendant(&id("S1"), &id("T1")).unwrap());
    }

    #[test]
    fn test_ancestors_and_path() {
        let index = sample();
        assert_eq!(
            index.ancestors_of(&id("U1")).unwrap(),
            vec![id("S1"), id("T1"), id("R")]
        );
        assert_eq!(
            index.path_label(&id("S1")).unwrap(),
            "Region > Sector 1 > School 1"
        );
        assert_eq!(index.parent_of(&id("S3")), Some(&id("T2")));
        assert_eq!(index.roots(), vec![&id("R")]);
        assert_eq!(index.children_of(&id("T1")).len(), 2);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = HierarchyIndex::build([
            Institution::root("R", InstitutionTier::Region),
            Institution::root("R", InstitutionTier::Region),
        ]);
        assert!(matches!(result, Err(ApprovalError::DataIntegrity(_))));
    }

    #[test]
    fn test_dangling_parent_becomes_root() {
        let index = HierarchyIndex::build([Institution::child("S", "gone", InstitutionTier::School)])
            .unwrap();
        assert_eq!(index.roots(), vec![&id("S")]);
        assert!(index.parent_of(&id("S")).is_none());
    }

    #[test]
    fn test_cycle_detected_downward() {
        let index = HierarchyIndex::build([
            Institution::child("A", "B", InstitutionTier::Sector),
            Institution::child("B", "A", InstitutionTier::Sector),
        ])
        .unwrap();
        assert!(matches!(
            index.descendants_of(&id("A")),
            Err(ApprovalError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_cycle_detected_upward() {
        let index = HierarchyIndex::build([
            Institution::child("A", "C", InstitutionTier::Sector),
            Institution::child("B", "A", InstitutionTier::Sector),
            Institution::child("C", "B", InstitutionTier::Sector),
            Institution::root("X", InstitutionTier::Region),
        ])
        .unwrap();
        assert!(matches!(
            index.is_self_or_descendant(&id("X"), &id("A")),
            Err(ApprovalError::DataIntegrity(_))
        ));
        assert!(index.ancestors_of(&id("B")).is_err());
    }

    #[test]
    fn test_self_parent_detected() {
        let index =
            HierarchyIndex::build([Institution::child("A", "A", InstitutionTier::School)]).unwrap();
        assert!(index.descendants_of(&id("A")).is_err());
    }

    #[test]
    fn test_clean_subtree_next_to_cycle_still_resolves() {
        let index = HierarchyIndex::build([
            Institution::child("A", "B", InstitutionTier::Sector),
            Institution::child("B", "A", InstitutionTier::Sector),
            Institution::root("R", InstitutionTier::Region),
            Institution::child("S", "R", InstitutionTier::School),
        ])
        .unwrap();
        assert_eq!(index.descendants_of(&id("R")).unwrap().len(), 2);
    }
}
