//! Institution Hierarchy Index
//!
//! Answers subtree-membership questions over the institution tree. The tree
//! is loaded once from an [`InstitutionProvider`] into an arena
//! ([`HierarchyIndex`]): one slot per institution with a parent pointer and
//! a children list. [`CachedHierarchy`] keeps the built index around until
//! the tree changes.
//!
//! Every traversal carries a visited set. A provider whose parent links
//! form a cycle produces a `DataIntegrity` error instead of a hang.

#![deny(unsafe_code)]

pub mod cache;
pub mod index;
pub mod provider;

pub use cache::CachedHierarchy;
pub use index::HierarchyIndex;
pub use provider::{InMemoryInstitutionTree, InstitutionProvider};
