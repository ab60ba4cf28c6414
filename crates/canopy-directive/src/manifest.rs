//! The directive manifest.
//!
//! Application is driven by an explicit manifest rather than bare file
//! presence. A declared `directives.yaml` in the directives directory wins;
//! without one the manifest is discovered from the naming contract.

use crate::DISTINGUISHED_BASE;
use canopy_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the declared manifest file inside a directives directory.
pub const MANIFEST_FILE: &str = "directives.yaml";

/// The three directive kinds. Only `add` has semantics; `change` and
/// `remove` are declared extension points and apply as logged no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectiveKind {
    /// Append blocks and scalars to the base tree.
    Add,
    /// Reserved; unimplemented.
    Change,
    /// Reserved; unimplemented.
    Remove,
}

impl DirectiveKind {
    /// File-name suffix for this kind.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Change => "change",
            Self::Remove => "remove",
        }
    }

    /// File-name suffix of the companion tracking file.
    pub fn tracking_suffix(self) -> &'static str {
        match self {
            Self::Add => "added",
            Self::Change => "changed",
            Self::Remove => "removed",
        }
    }
}

/// One directive to apply against a base file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectiveEntry {
    /// Base name the directive patches, e.g. `configuration`.
    pub base: String,
    /// Directive kind.
    pub kind: DirectiveKind,
    /// Directive file; relative paths in a declared manifest resolve
    /// against the directives directory.
    pub path: PathBuf,
}

/// Ordered list of directives for one module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectiveManifest {
    /// Directives in application order.
    pub directives: Vec<DirectiveEntry>,
}

impl DirectiveManifest {
    /// Load the manifest for a directives directory: the declared
    /// `directives.yaml` when present, discovery otherwise. A missing
    /// directory yields an empty manifest.
    pub fn load(dir: &Path) -> Result<Self> {
        let declared = dir.join(MANIFEST_FILE);
        if declared.is_file() {
            let contents = fs::read_to_string(&declared).map_err(|e| Error::io(&declared, e))?;
            let mut manifest: Self = serde_yaml::from_str(&contents).map_err(|e| Error::Parse {
                path: declared.clone(),
                offset: 0,
                message: e.to_string(),
            })?;
            for entry in &mut manifest.directives {
                if entry.path.is_relative() {
                    entry.path = dir.join(&entry.path);
                }
            }
            return Ok(manifest);
        }
        Self::discover(dir)
    }

    /// Derive the manifest from the directory's file names.
    pub fn discover(dir: &Path) -> Result<Self> {
        let mut directives = Vec::new();
        if !dir.is_dir() {
            return Ok(Self { directives });
        }

        let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("xml") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match classify(stem) {
                Some((base, kind)) => directives.push(DirectiveEntry {
                    base: base.to_string(),
                    kind,
                    path,
                }),
                None => debug!(file = %path.display(), "not a directive file"),
            }
        }

        // read_dir order is platform-dependent; application order is not.
        directives.sort_by(|a, b| (&a.base, a.kind).cmp(&(&b.base, b.kind)));
        Ok(Self { directives })
    }

    /// Directives for one base name, in application order.
    pub fn for_base<'a>(&'a self, base: &'a str) -> impl Iterator<Item = &'a DirectiveEntry> {
        self.directives.iter().filter(move |d| d.base == base)
    }

    /// Whether the manifest holds no directives.
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Number of directives.
    pub fn len(&self) -> usize {
        self.directives.len()
    }
}

/// Map a directive file stem to its (base, kind). `add` → the distinguished
/// base; `name-add` → base `name`. Tracking stems are not directives.
fn classify(stem: &str) -> Option<(&str, DirectiveKind)> {
    for kind in [DirectiveKind::Add, DirectiveKind::Change, DirectiveKind::Remove] {
        if stem == kind.tracking_suffix() {
            return None;
        }
        if let Some(base) = stem.strip_suffix(kind.tracking_suffix()) {
            if base.ends_with('-') {
                return None;
            }
        }
    }
    for kind in [DirectiveKind::Add, DirectiveKind::Change, DirectiveKind::Remove] {
        if stem == kind.suffix() {
            return Some((DISTINGUISHED_BASE, kind));
        }
        if let Some(base) = stem.strip_suffix(kind.suffix()) {
            if let Some(base) = base.strip_suffix('-') {
                if !base.is_empty() {
                    return Some((base, kind));
                }
            }
        }
    }
    None
}

/// Whether a file stem names a directive or tracking file rather than a
/// loadable base configuration file.
pub fn is_directive_file_name(stem: &str) -> bool {
    if classify(stem).is_some() {
        return true;
    }
    for kind in [DirectiveKind::Add, DirectiveKind::Change, DirectiveKind::Remove] {
        if stem == kind.tracking_suffix()
            || stem
                .strip_suffix(kind.tracking_suffix())
                .is_some_and(|base| base.ends_with('-') && base.len() > 1)
        {
            return true;
        }
    }
    false
}
