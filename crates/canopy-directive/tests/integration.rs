use canopy_core::Namespace;
use canopy_directive::{apply, DirectiveEntry, DirectiveKind, DirectiveManifest};
use canopy_property::xml;
use proptest::prelude::*;
use std::fs;
use std::path::Path;

fn entry(path: &Path) -> DirectiveEntry {
    DirectiveEntry {
        base: "configuration".to_string(),
        kind: DirectiveKind::Add,
        path: path.to_path_buf(),
    }
}

#[test]
fn test_discovered_manifest_applies_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let directives = dir.path().join("directives");
    let persistent = dir.path().join("persistent");
    fs::create_dir_all(&directives).unwrap();
    fs::create_dir_all(&persistent).unwrap();
    fs::write(
        directives.join("add.xml"),
        "<configuration><a><b>2</b></a></configuration>",
    )
    .unwrap();
    fs::write(directives.join("remove.xml"), "<configuration><a/></configuration>").unwrap();

    let manifest = DirectiveManifest::load(&directives).unwrap();
    assert_eq!(manifest.len(), 2);

    let mut tree = xml::parse_str(
        "<configuration><a><b>1</b></a></configuration>",
        &Namespace::new("configuration"),
    )
    .unwrap();
    let mut mutated = false;
    for directive in manifest.for_base("configuration") {
        if apply(directive, &mut tree, &persistent, None).unwrap() {
            mutated = true;
        }
    }
    assert!(mutated);
    let root = tree.root();
    assert_eq!(tree.children_named(root, "a").count(), 2);
    assert!(persistent.join("added.xml").exists());
}

/// Strategy for a small add/base document: repeatable blocks over a tight
/// key alphabet so collisions actually happen, plus a few scalars.
fn doc_strategy() -> impl Strategy<Value = String> {
    let block = (
        prop::sample::select(vec!["a", "b", "c"]),
        prop::collection::vec(
            (
                prop::sample::select(vec!["x", "y"]),
                prop::sample::select(vec!["1", "2", "3"]),
            ),
            1..3,
        ),
    );
    // At most one occurrence per scalar key: a directive that contradicts
    // itself on one key is not idempotent by construction.
    let scalars = (
        prop::option::of(prop::sample::select(vec!["fast", "slow"])),
        prop::option::of(prop::sample::select(vec!["deep", "shallow"])),
    )
        .prop_map(|(mode, depth)| {
            let mut scalars = Vec::new();
            if let Some(mode) = mode {
                scalars.push(("mode", mode));
            }
            if let Some(depth) = depth {
                scalars.push(("depth", depth));
            }
            scalars
        });
    (prop::collection::vec(block, 0..4), scalars)
        .prop_map(|(blocks, scalars)| {
            let mut doc = String::from("<configuration>");
            for (key, leaves) in blocks {
                doc.push_str(&format!("<{key}>"));
                for (leaf, value) in leaves {
                    doc.push_str(&format!("<{leaf}>{value}</{leaf}>"));
                }
                doc.push_str(&format!("</{key}>"));
            }
            for (key, value) in scalars {
                doc.push_str(&format!("<{key}>{value}</{key}>"));
            }
            doc.push_str("</configuration>");
            doc
        })
}

proptest! {
    // apply(apply(T, d)) == apply(T, d), for arbitrary trees and add files.
    #[test]
    fn prop_add_application_is_idempotent(base in doc_strategy(), add in doc_strategy()) {
        let ns = Namespace::new("configuration");
        let base_tree = xml::parse_str(&base, &ns).unwrap();

        let once_dir = tempfile::tempdir().unwrap();
        let add_path = once_dir.path().join("add.xml");
        fs::write(&add_path, &add).unwrap();

        let mut once = base_tree.clone();
        apply(&entry(&add_path), &mut once, once_dir.path(), None).unwrap();

        let twice_dir = tempfile::tempdir().unwrap();
        let add_path_twice = twice_dir.path().join("add.xml");
        fs::write(&add_path_twice, &add).unwrap();

        let mut twice = base_tree.clone();
        apply(&entry(&add_path_twice), &mut twice, twice_dir.path(), None).unwrap();
        let second_run_mutated =
            apply(&entry(&add_path_twice), &mut twice, twice_dir.path(), None).unwrap();

        prop_assert!(!second_run_mutated);
        prop_assert!(once.content_eq(once.root(), &twice, twice.root()));
    }
}
