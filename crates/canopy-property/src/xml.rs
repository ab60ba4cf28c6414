//! The persisted XML form of a property tree.
//!
//! The root element is named after the root node; nested elements are
//! property names and element text is the scalar value. Two child element
//! names are reserved: `<mutable>false</mutable>` and
//! `<originModule>name</originModule>` set flags on the *enclosing* node and
//! never become property nodes. The writer emits a fixed layout (2-space
//! indentation, `originModule` before `mutable`, reserved elements ahead of
//! regular children) so parse → write cycles are byte-stable.

use crate::tree::{NodeId, PropertyTree};
use canopy_core::{Error, Namespace, Result};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Reserved element controlling the enclosing node's mutability.
pub const MUTABLE_ELEMENT: &str = "mutable";
/// Reserved element recording the enclosing node's contributing module.
pub const ORIGIN_MODULE_ELEMENT: &str = "originModule";

/// Parse a tree from an in-memory document.
pub fn parse_str(input: &str, namespace: &Namespace) -> Result<PropertyTree> {
    parse_impl(input, namespace, Path::new("<memory>"))
}

/// Parse a tree from a file on disk.
pub fn parse_file(path: &Path, namespace: &Namespace) -> Result<PropertyTree> {
    let input = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    parse_impl(&input, namespace, path)
}

fn parse_impl(input: &str, namespace: &Namespace, source: &Path) -> Result<PropertyTree> {
    let mut reader = Reader::from_str(input);

    let mut tree: Option<PropertyTree> = None;
    let mut stack: Vec<NodeId> = Vec::new();

    loop {
        let position = reader.buffer_position() as u64;
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = element_name(&e, source, position)?;
                reject_attributes(&e, source, position)?;
                match (&mut tree, stack.last().copied()) {
                    (None, _) => {
                        let t = PropertyTree::new(name, namespace.clone());
                        stack.push(t.root());
                        tree = Some(t);
                    }
                    (Some(t), Some(parent)) => {
                        let id = t.insert_raw(parent, name, None);
                        stack.push(id);
                    }
                    (Some(_), None) => {
                        return Err(parse_error(source, position, "multiple root elements"));
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                let name = element_name(&e, source, position)?;
                reject_attributes(&e, source, position)?;
                match (&mut tree, stack.last().copied()) {
                    (None, _) => {
                        tree = Some(PropertyTree::new(name, namespace.clone()));
                    }
                    (Some(t), Some(parent)) => {
                        t.insert_raw(parent, name, None);
                    }
                    (Some(_), None) => {
                        return Err(parse_error(source, position, "multiple root elements"));
                    }
                }
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| parse_error(source, position, e.to_string()))?;
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let Some(&current) = stack.last() else {
                    return Err(parse_error(source, position, "text outside the root element"));
                };
                let tree = tree.as_mut().expect("stack implies tree");
                let merged = match tree.value(current) {
                    Some(existing) => format!("{existing} {trimmed}"),
                    None => trimmed.to_string(),
                };
                tree.set_value_raw(current, Some(merged));
            }
            Ok(Event::CData(t)) => {
                let Some(&current) = stack.last() else {
                    return Err(parse_error(source, position, "text outside the root element"));
                };
                let text = String::from_utf8_lossy(t.as_ref()).to_string();
                tree.as_mut()
                    .expect("stack implies tree")
                    .set_value_raw(current, Some(text));
            }
            Ok(Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_)) => {}
            Ok(Event::Eof) => break,
            Err(e) => return Err(parse_error(source, position, e.to_string())),
        }
    }

    let mut tree = tree.ok_or_else(|| parse_error(source, 0, "no root element"))?;
    apply_reserved_elements(&mut tree, source)?;
    Ok(tree)
}

fn element_name(
    e: &quick_xml::events::BytesStart<'_>,
    source: &Path,
    position: u64,
) -> Result<String> {
    std::str::from_utf8(e.name().as_ref())
        .map(str::to_string)
        .map_err(|_| parse_error(source, position, "element name is not UTF-8"))
}

fn reject_attributes(
    e: &quick_xml::events::BytesStart<'_>,
    source: &Path,
    position: u64,
) -> Result<()> {
    if e.attributes().next().is_some() {
        return Err(parse_error(
            source,
            position,
            "attributes are not part of the property model",
        ));
    }
    Ok(())
}

fn parse_error(source: &Path, offset: u64, message: impl Into<String>) -> Error {
    Error::Parse {
        path: source.to_path_buf(),
        offset,
        message: message.into(),
    }
}

/// Fold `<mutable>` / `<originModule>` children into their enclosing node
/// and detach them so they never surface as properties.
fn apply_reserved_elements(tree: &mut PropertyTree, source: &Path) -> Result<()> {
    let mut pending = vec![tree.root()];
    let mut reserved = Vec::new();
    while let Some(id) = pending.pop() {
        for &child in tree.children(id) {
            match tree.name(child) {
                MUTABLE_ELEMENT | ORIGIN_MODULE_ELEMENT => reserved.push((id, child)),
                _ => pending.push(child),
            }
        }
    }

    for (parent, child) in reserved {
        if !tree.children(child).is_empty() {
            return Err(parse_error(
                source,
                0,
                format!("reserved element '{}' must not have children", tree.name(child)),
            ));
        }
        let value = tree.value(child).unwrap_or("").trim().to_string();
        match tree.name(child) {
            MUTABLE_ELEMENT => match value.as_str() {
                "false" => tree.set_mutable(parent, false),
                "true" => tree.set_mutable(parent, true),
                other => {
                    return Err(parse_error(
                        source,
                        0,
                        format!("reserved element 'mutable' must be true or false, got '{other}'"),
                    ))
                }
            },
            _ => {
                if value.is_empty() {
                    return Err(parse_error(
                        source,
                        0,
                        "reserved element 'originModule' must name a module",
                    ));
                }
                tree.set_origin_module(parent, Some(&value));
            }
        }
        tree.detach_raw(child);
    }
    Ok(())
}

/// Serialize a tree to the deterministic persisted form.
pub fn to_xml_string(tree: &PropertyTree) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    write_node(tree, tree.root(), 0, &mut out);
    out
}

fn write_node(tree: &PropertyTree, id: NodeId, depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    let name = tree.name(id);
    let value = tree.value(id);
    let has_reserved = tree.origin_module(id).is_some() || !tree.is_mutable(id);
    let has_children = !tree.children(id).is_empty();

    if !has_children && !has_reserved {
        match value {
            None => out.push_str(&format!("{pad}<{name}/>\n")),
            Some(v) => out.push_str(&format!("{pad}<{name}>{}</{name}>\n", escape(v))),
        }
        return;
    }

    out.push_str(&format!("{pad}<{name}>\n"));
    let inner = "  ".repeat(depth + 1);
    if let Some(v) = value {
        out.push_str(&format!("{inner}{}\n", escape(v)));
    }
    if let Some(origin) = tree.origin_module(id) {
        out.push_str(&format!(
            "{inner}<{ORIGIN_MODULE_ELEMENT}>{}</{ORIGIN_MODULE_ELEMENT}>\n",
            escape(origin)
        ));
    }
    if !tree.is_mutable(id) {
        out.push_str(&format!("{inner}<{MUTABLE_ELEMENT}>false</{MUTABLE_ELEMENT}>\n"));
    }
    for &child in tree.children(id) {
        write_node(tree, child, depth + 1, out);
    }
    out.push_str(&format!("{pad}</{name}>\n"));
}

/// Write a tree to disk atomically (write to a temp file, then rename).
pub fn write_file(tree: &PropertyTree, path: &Path) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;

    let mut temp_path: PathBuf = path.to_path_buf();
    if let Some(name) = path.file_name() {
        temp_path.set_file_name(format!(".{}.tmp", name.to_string_lossy()));
    } else {
        temp_path.push(".tmp");
    }

    let contents = to_xml_string(tree);
    {
        let mut file = File::create(&temp_path).map_err(|e| Error::io(&temp_path, e))?;
        file.write_all(contents.as_bytes())
            .map_err(|e| Error::io(&temp_path, e))?;
        file.sync_all().map_err(|e| Error::io(&temp_path, e))?;
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        Error::io(path, e)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core::Namespace;

    fn ns() -> Namespace {
        Namespace::new("configuration")
    }

    #[test]
    fn test_parse_nested_elements() {
        let tree = parse_str("<configuration><a><b>1</b></a></configuration>", &ns()).unwrap();
        assert_eq!(tree.name(tree.root()), "configuration");

        let a = tree.child_by_name(tree.root(), "a", 0).unwrap();
        let b = tree.child_by_name(a, "b", 0).unwrap();
        assert_eq!(tree.value(b), Some("1"));
        assert_eq!(tree.namespace(b), &ns());
        assert!(!tree.is_dirty(tree.root(), true));
    }

    #[test]
    fn test_reserved_mutable_freezes_enclosing_node() {
        let tree = parse_str(
            "<configuration><a><mutable>false</mutable><b>1</b></a></configuration>",
            &ns(),
        )
        .unwrap();
        let a = tree.child_by_name(tree.root(), "a", 0).unwrap();
        assert!(!tree.is_mutable(a));
        // The reserved element is not a property.
        assert_eq!(tree.children(a).len(), 1);
        assert_eq!(tree.name(tree.children(a)[0]), "b");
    }

    #[test]
    fn test_reserved_origin_module() {
        let tree = parse_str(
            "<configuration><a><originModule>outer</originModule></a></configuration>",
            &ns(),
        )
        .unwrap();
        let a = tree.child_by_name(tree.root(), "a", 0).unwrap();
        assert_eq!(tree.origin_module(a), Some("outer"));
        assert!(tree.children(a).is_empty());
    }

    #[test]
    fn test_attributes_rejected() {
        let err = parse_str("<configuration version=\"1\"/>", &ns()).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_malformed_document_reports_offset() {
        let err = parse_str("<configuration><a></configuration>", &ns()).unwrap_err();
        match err {
            Error::Parse { offset, .. } => assert!(offset > 0),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_escaped_text_round_trips() {
        let tree = parse_str(
            "<configuration><expr>a &lt; b &amp; c</expr></configuration>",
            &ns(),
        )
        .unwrap();
        let expr = tree.child_by_name(tree.root(), "expr", 0).unwrap();
        assert_eq!(tree.value(expr), Some("a < b & c"));

        let serialized = to_xml_string(&tree);
        assert!(serialized.contains("a &lt; b &amp; c"));
    }

    #[test]
    fn test_serialized_form_is_parse_stable() {
        let input = "\
<?xml version=\"1.0\" encoding=\"UTF-8\"?>
<configuration>
  <a>
    <originModule>outer</originModule>
    <b>1</b>
  </a>
  <flag/>
</configuration>
";
        let tree = parse_str(input, &ns()).unwrap();
        let first = to_xml_string(&tree);
        let reparsed = parse_str(&first, &ns()).unwrap();
        let second = to_xml_string(&reparsed);
        assert_eq!(first, second);
        assert_eq!(first, input);
    }

    #[test]
    fn test_immutable_node_serializes_reserved_element() {
        let mut tree = PropertyTree::new("configuration", ns());
        let a = tree.add_child(tree.root(), "a", None).unwrap();
        tree.add_child(a, "b", Some("1")).unwrap();
        tree.set_mutable(a, false);

        let serialized = to_xml_string(&tree);
        assert!(serialized.contains("<mutable>false</mutable>"));

        let reparsed = parse_str(&serialized, &ns()).unwrap();
        let a2 = reparsed.child_by_name(reparsed.root(), "a", 0).unwrap();
        assert!(!reparsed.is_mutable(a2));
        assert_eq!(to_xml_string(&reparsed), serialized);
    }

    #[test]
    fn test_write_file_is_atomic_and_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persistent").join("configuration.xml");

        let mut tree = PropertyTree::new("configuration", ns());
        tree.add_child(tree.root(), "a", Some("1")).unwrap();
        write_file(&tree, &path).unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("persistent").join(".configuration.xml.tmp").exists());
        let reloaded = parse_file(&path, &ns()).unwrap();
        assert!(tree.content_eq(tree.root(), &reloaded, reloaded.root()));
    }
}
