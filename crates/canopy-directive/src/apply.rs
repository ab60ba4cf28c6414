//! Applying directives to a live tree.

use crate::manifest::{DirectiveEntry, DirectiveKind};
use crate::tracking::TrackingFile;
use canopy_core::Result;
use canopy_property::{xml, NodeId, PropertyTree};
use std::path::Path;
use tracing::{debug, warn};

/// Apply one directive to a live tree.
///
/// Returns whether the tree was mutated; callers use this to decide whether
/// to re-serialize. `origin` is recorded as provenance on added nodes that
/// do not already carry one — pass it when the directive's module differs
/// from the tree's owner.
pub fn apply(
    entry: &DirectiveEntry,
    tree: &mut PropertyTree,
    persistence_dir: &Path,
    origin: Option<&str>,
) -> Result<bool> {
    match entry.kind {
        DirectiveKind::Add => apply_add(entry, tree, persistence_dir, origin),
        DirectiveKind::Change | DirectiveKind::Remove => {
            // Declared extension points without semantics. Presence is
            // acknowledged and nothing else happens.
            warn!(
                kind = entry.kind.suffix(),
                file = %entry.path.display(),
                "directive kind is not implemented; ignoring"
            );
            Ok(false)
        }
    }
}

fn apply_add(
    entry: &DirectiveEntry,
    tree: &mut PropertyTree,
    persistence_dir: &Path,
    origin: Option<&str>,
) -> Result<bool> {
    let namespace = tree.namespace(tree.root()).clone();
    let add_tree = xml::parse_file(&entry.path, &namespace)?;
    let mut tracking = TrackingFile::open(persistence_dir, &entry.base, DirectiveKind::Add)?;

    let mut mutated = false;
    let add_root = add_tree.root();
    for &candidate in add_tree.children(add_root) {
        let key = add_tree.name(candidate).to_string();
        if add_tree.children(candidate).is_empty() {
            if apply_scalar(&add_tree, candidate, &key, tree, &mut tracking, origin)? {
                mutated = true;
            }
        } else if apply_block(&add_tree, candidate, &key, tree, &mut tracking, origin)? {
            mutated = true;
        }
    }

    tracking.save()?;
    Ok(mutated)
}

/// A repeatable indexed block: skip when the tracking file already records a
/// block with the identical leaf set, append otherwise.
fn apply_block(
    add_tree: &PropertyTree,
    block: NodeId,
    key: &str,
    tree: &mut PropertyTree,
    tracking: &mut TrackingFile,
    origin: Option<&str>,
) -> Result<bool> {
    let signature = flatten(add_tree, block);
    let already_applied = tracking.blocks(key).into_iter().any(|recorded| {
        let mut recorded_signature = flatten(tracking.tree(), recorded);
        recorded_signature.sort();
        let mut candidate_signature = signature.clone();
        candidate_signature.sort();
        recorded_signature == candidate_signature
    });
    if already_applied {
        debug!(key, "add block already applied; skipping");
        return Ok(false);
    }

    let root = tree.root();
    tree.graft(root, add_tree, block, origin)?;
    tracking.record_block(add_tree, block)?;
    Ok(true)
}

/// A non-indexed scalar key: added when absent, re-applied when the tracking
/// file records a different value.
fn apply_scalar(
    add_tree: &PropertyTree,
    node: NodeId,
    key: &str,
    tree: &mut PropertyTree,
    tracking: &mut TrackingFile,
    origin: Option<&str>,
) -> Result<bool> {
    let value = add_tree.value(node).unwrap_or("").trim().to_string();
    let root = tree.root();
    let existing = tree
        .children_named(root, key)
        .find(|&c| tree.children(c).is_empty());

    match existing {
        None => {
            let added = tree.add_child(root, key, Some(&value))?;
            if tree.origin_module(added).is_none() {
                tree.set_origin_module(added, origin);
            }
            tracking.record_scalar(key, &value)?;
            Ok(true)
        }
        Some(node_in_tree) => {
            if tracking.scalar(key).map(str::trim) == Some(value.as_str()) {
                debug!(key, "scalar already applied; skipping");
                return Ok(false);
            }
            tree.set_value(node_in_tree, Some(&value))?;
            tracking.record_scalar(key, &value)?;
            Ok(true)
        }
    }
}

/// Leaf (path, value) pairs of a block, paths relative to the block element
/// so the block's own index never participates in comparison. Values are
/// trimmed.
fn flatten(tree: &PropertyTree, block: NodeId) -> Vec<(String, String)> {
    let mut leaves = Vec::new();
    collect_leaves(tree, block, &mut Vec::new(), &mut leaves);
    leaves
}

fn collect_leaves(
    tree: &PropertyTree,
    node: NodeId,
    prefix: &mut Vec<String>,
    out: &mut Vec<(String, String)>,
) {
    let children = tree.children(node);
    if children.is_empty() && !prefix.is_empty() {
        out.push((
            prefix.join("."),
            tree.value(node).unwrap_or("").trim().to_string(),
        ));
        return;
    }
    for &child in children {
        prefix.push(tree.name(child).to_string());
        collect_leaves(tree, child, prefix, out);
        prefix.pop();
    }
}
