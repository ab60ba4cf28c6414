//! Tracking files: the record of directive blocks already applied.

use crate::manifest::DirectiveKind;
use crate::DISTINGUISHED_BASE;
use canopy_core::{Namespace, Result};
use canopy_property::{xml, NodeId, PropertyTree};
use std::path::{Path, PathBuf};

/// The persisted record of applied directive blocks for one base file.
///
/// Lives in the module's persistence directory as `<base>-added.xml` (bare
/// `added.xml` for the distinguished base). Blocks recorded here are skipped
/// on later runs, which is what makes add application idempotent.
#[derive(Debug)]
pub struct TrackingFile {
    path: PathBuf,
    tree: PropertyTree,
    modified: bool,
}

impl TrackingFile {
    /// File name of the tracking companion for a base and kind.
    pub fn file_name(base: &str, kind: DirectiveKind) -> String {
        if base == DISTINGUISHED_BASE {
            format!("{}.xml", kind.tracking_suffix())
        } else {
            format!("{base}-{}.xml", kind.tracking_suffix())
        }
    }

    /// Open (or start) the tracking file for a base in a persistence
    /// directory.
    pub fn open(persistence_dir: &Path, base: &str, kind: DirectiveKind) -> Result<Self> {
        let path = persistence_dir.join(Self::file_name(base, kind));
        let namespace = Namespace::new(base);
        let tree = if path.is_file() {
            xml::parse_file(&path, &namespace)?
        } else {
            PropertyTree::new(base, namespace)
        };
        Ok(Self {
            path,
            tree,
            modified: false,
        })
    }

    /// The recorded tree.
    pub fn tree(&self) -> &PropertyTree {
        &self.tree
    }

    /// Recorded blocks for a repeatable key, in record order.
    pub fn blocks(&self, key: &str) -> Vec<NodeId> {
        let root = self.tree.root();
        self.tree
            .children_named(root, key)
            .filter(|&c| !self.tree.children(c).is_empty())
            .collect()
    }

    /// Recorded value of a scalar key, if any.
    pub fn scalar(&self, key: &str) -> Option<&str> {
        let root = self.tree.root();
        self.tree
            .children_named(root, key)
            .find(|&c| self.tree.children(c).is_empty())
            .and_then(|c| self.tree.value(c))
    }

    /// Record an applied block, appending after the last recorded one.
    pub fn record_block(&mut self, source: &PropertyTree, block: NodeId) -> Result<()> {
        let root = self.tree.root();
        self.tree.graft(root, source, block, None)?;
        self.modified = true;
        Ok(())
    }

    /// Record an applied scalar, replacing any earlier record of the key.
    pub fn record_scalar(&mut self, key: &str, value: &str) -> Result<()> {
        let root = self.tree.root();
        let existing = self
            .tree
            .children_named(root, key)
            .find(|&c| self.tree.children(c).is_empty());
        match existing {
            Some(node) => self.tree.set_value(node, Some(value))?,
            None => {
                self.tree.add_child(root, key, Some(value))?;
            }
        }
        self.modified = true;
        Ok(())
    }

    /// Persist the record if anything was added this run.
    pub fn save(&mut self) -> Result<()> {
        if self.modified {
            xml::write_file(&self.tree, &self.path)?;
            self.modified = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_names() {
        assert_eq!(
            TrackingFile::file_name("configuration", DirectiveKind::Add),
            "added.xml"
        );
        assert_eq!(
            TrackingFile::file_name("panel", DirectiveKind::Add),
            "panel-added.xml"
        );
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempdir().unwrap();

        let mut source = PropertyTree::new("add", Namespace::new("add"));
        let block = source.add_child(source.root(), "pair", None).unwrap();
        source.add_child(block, "name", Some("k")).unwrap();

        let mut tracking = TrackingFile::open(dir.path(), "panel", DirectiveKind::Add).unwrap();
        assert!(tracking.blocks("pair").is_empty());
        tracking.record_block(&source, block).unwrap();
        tracking.record_scalar("startup", "fast").unwrap();
        tracking.save().unwrap();

        let reopened = TrackingFile::open(dir.path(), "panel", DirectiveKind::Add).unwrap();
        assert_eq!(reopened.blocks("pair").len(), 1);
        assert_eq!(reopened.scalar("startup"), Some("fast"));
    }

    #[test]
    fn test_scalar_record_replaces() {
        let dir = tempdir().unwrap();
        let mut tracking =
            TrackingFile::open(dir.path(), "configuration", DirectiveKind::Add).unwrap();
        tracking.record_scalar("startup", "fast").unwrap();
        tracking.record_scalar("startup", "slow").unwrap();
        assert_eq!(tracking.scalar("startup"), Some("slow"));

        let root = tracking.tree().root();
        assert_eq!(tracking.tree().children_named(root, "startup").count(), 1);
    }

    #[test]
    fn test_unmodified_tracking_writes_nothing() {
        let dir = tempdir().unwrap();
        let mut tracking = TrackingFile::open(dir.path(), "panel", DirectiveKind::Add).unwrap();
        tracking.save().unwrap();
        assert!(!dir.path().join("panel-added.xml").exists());
    }
}
