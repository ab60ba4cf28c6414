//! Root properties: one fully loaded configuration file.

use crate::tree::PropertyTree;
use canopy_core::Namespace;
use std::path::{Path, PathBuf};

/// A property tree bound to the module that loaded it and, when it came from
/// disk, to its source file. After the merge pass a module holds at most one
/// root per namespace.
#[derive(Debug, Clone)]
pub struct RootProperty {
    tree: PropertyTree,
    module: String,
    namespace: Namespace,
    source: Option<PathBuf>,
}

impl RootProperty {
    /// Bind a tree to its owning module and optional source file.
    pub fn new(tree: PropertyTree, module: impl Into<String>, source: Option<PathBuf>) -> Self {
        let namespace = tree.namespace(tree.root()).clone();
        Self {
            tree,
            module: module.into(),
            namespace,
            source,
        }
    }

    /// The owning module's name.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// The root's namespace.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Source file this root was parsed from, if any. Merged roots have no
    /// single source.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// File name used when persisting this root.
    pub fn file_name(&self) -> String {
        self.source
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("{}.xml", self.namespace))
    }

    /// The underlying tree.
    pub fn tree(&self) -> &PropertyTree {
        &self.tree
    }

    /// The underlying tree, mutably.
    pub fn tree_mut(&mut self) -> &mut PropertyTree {
        &mut self.tree
    }

    /// Whether the root or any descendant changed since the last save.
    pub fn is_dirty(&self) -> bool {
        self.tree.is_dirty(self.tree.root(), true)
    }

    /// Clear all dirty flags, typically after a successful save.
    pub fn mark_clean(&mut self) {
        let root = self.tree.root();
        self.tree.mark_clean(root);
    }

    /// Re-read the namespace from the tree after a root-level namespace
    /// change.
    pub fn refresh_namespace(&mut self) {
        self.namespace = self.tree.namespace(self.tree.root()).clone();
    }
}
