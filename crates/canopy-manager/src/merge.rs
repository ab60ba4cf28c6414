//! The per-module namespace merge pass.

use canopy_property::{PropertyTree, RootProperty};
use tracing::debug;

/// Collapse a module's roots so at most one exists per namespace.
///
/// Repeatedly scans for two roots sharing a namespace; when found, a fresh
/// root named after the namespace takes both originals' children and
/// replaces the pair, then the scan restarts. Terminates because every
/// merge strictly decreases the root count.
pub fn merge_module_roots(mut roots: Vec<RootProperty>) -> Vec<RootProperty> {
    'scan: loop {
        for i in 0..roots.len() {
            for j in (i + 1)..roots.len() {
                if roots[i].namespace() == roots[j].namespace() {
                    let second = roots.remove(j);
                    let first = roots.remove(i);
                    debug!(
                        namespace = %first.namespace(),
                        module = first.module(),
                        "merging roots sharing a namespace"
                    );
                    let merged = merge_pair(first, second);
                    roots.insert(i, merged);
                    continue 'scan;
                }
            }
        }
        return roots;
    }
}

fn merge_pair(first: RootProperty, second: RootProperty) -> RootProperty {
    let namespace = first.namespace().clone();
    let owner = first.module().to_string();
    let was_dirty = first.is_dirty() || second.is_dirty();

    let root_name = namespace.as_str().to_string();
    let mut tree = PropertyTree::new(root_name, namespace);
    let target = tree.root();
    for source in [&first, &second] {
        // Nodes copied in from another module keep their provenance.
        let origin = (source.module() != owner).then(|| source.module().to_string());
        let source_tree = source.tree();
        for &child in source_tree.children(source_tree.root()) {
            tree.graft(target, source_tree, child, origin.as_deref())
                .expect("fresh merge root is mutable");
        }
    }

    // Re-parenting is restructuring, not user mutation: no events, and
    // dirtiness only survives if an original was already dirty.
    tree.take_events();
    if !was_dirty {
        tree.mark_clean(target);
    }
    RootProperty::new(tree, owner, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core::Namespace;
    use canopy_property::xml;

    fn root(module: &str, namespace: &str, doc: &str) -> RootProperty {
        let tree = xml::parse_str(doc, &Namespace::new(namespace)).unwrap();
        RootProperty::new(tree, module, None)
    }

    #[test]
    fn test_merge_collapses_shared_namespace() {
        let roots = vec![
            root("outer", "gui", "<gui><menu>file</menu></gui>"),
            root("outer", "provenance", "<provenance/>"),
            root("outer", "gui", "<gui><menu>edit</menu></gui>"),
        ];

        let merged = merge_module_roots(roots);
        assert_eq!(merged.len(), 2);

        let gui = merged.iter().find(|r| r.namespace().as_str() == "gui").unwrap();
        let tree = gui.tree();
        let menus: Vec<_> = tree
            .children_named(tree.root(), "menu")
            .filter_map(|m| tree.value(m))
            .collect();
        assert_eq!(menus, vec!["file", "edit"]);
        assert_eq!(tree.name(tree.root()), "gui");
        assert!(!gui.is_dirty());
    }

    #[test]
    fn test_merge_is_exhaustive() {
        let roots = vec![
            root("outer", "gui", "<gui><a/></gui>"),
            root("outer", "gui", "<gui><b/></gui>"),
            root("outer", "gui", "<gui><c/></gui>"),
        ];

        let merged = merge_module_roots(roots);
        assert_eq!(merged.len(), 1);
        let tree = merged[0].tree();
        assert_eq!(tree.children(tree.root()).len(), 3);
    }

    #[test]
    fn test_dirty_original_keeps_merged_root_dirty() {
        let mut dirty = root("outer", "gui", "<gui/>");
        let node = dirty.tree().root();
        dirty.tree_mut().add_child(node, "added", None).unwrap();

        let merged = merge_module_roots(vec![dirty, root("outer", "gui", "<gui><b/></gui>")]);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].is_dirty());
    }

    #[test]
    fn test_unrelated_namespaces_untouched() {
        let roots = vec![
            root("outer", "gui", "<gui/>"),
            root("outer", "provenance", "<provenance/>"),
        ];
        let merged = merge_module_roots(roots);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_cross_module_content_keeps_provenance() {
        let foreign = root("inner", "gui", "<gui><tool>lens</tool></gui>");
        let merged = merge_module_roots(vec![root("outer", "gui", "<gui/>"), foreign]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].module(), "outer");
        let tree = merged[0].tree();
        let tool = tree.child_by_name(tree.root(), "tool", 0).unwrap();
        assert_eq!(tree.origin_module(tool), Some("inner"));
    }
}
