//! The module-registry collaborator contract.
//!
//! Module discovery and ordering happen outside this system. The registry is
//! handed in fully populated; canopy only reads the directory layout and,
//! for the persistence directory, writes user-local state back.

use std::path::{Path, PathBuf};

/// Per-module directory layout supplied by the external module registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSpec {
    /// Module name; unique within a registry.
    pub name: String,
    /// Directory holding the module's shipped configuration files.
    pub config_dir: PathBuf,
    /// Directory holding the module's directive files.
    pub directives_dir: PathBuf,
    /// User-writable directory for overrides, tracking files, and saved trees.
    pub persistence_dir: PathBuf,
}

impl ModuleSpec {
    /// Create a module spec with an explicit directory layout.
    pub fn new(
        name: impl Into<String>,
        config_dir: impl Into<PathBuf>,
        directives_dir: impl Into<PathBuf>,
        persistence_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            config_dir: config_dir.into(),
            directives_dir: directives_dir.into(),
            persistence_dir: persistence_dir.into(),
        }
    }

    /// Conventional layout with all three directories under one root:
    /// `<root>/configuration`, `<root>/directives`, `<root>/persistent`.
    pub fn under(name: impl Into<String>, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            name: name.into(),
            config_dir: root.join("configuration"),
            directives_dir: root.join("directives"),
            persistence_dir: root.join("persistent"),
        }
    }
}

/// Ordered collection of module specs.
///
/// Order is significant and externally decided; iteration yields modules in
/// registration order.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: Vec<ModuleSpec>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a module, keeping the supplied order.
    pub fn register(&mut self, spec: ModuleSpec) {
        self.modules.push(spec);
    }

    /// Look up a module by name.
    pub fn get(&self, name: &str) -> Option<&ModuleSpec> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Iterate modules in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ModuleSpec> {
        self.modules.iter()
    }

    /// Number of registered modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl FromIterator<ModuleSpec> for ModuleRegistry {
    fn from_iter<I: IntoIterator<Item = ModuleSpec>>(iter: I) -> Self {
        Self {
            modules: iter.into_iter().collect(),
        }
    }
}
