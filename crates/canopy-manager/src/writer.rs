//! Persisting dirty roots to the user-writable store.

use canopy_core::{ModuleSpec, Result};
use canopy_property::{xml, RootProperty};
use tracing::debug;

/// When the manager persists dirty roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SavePolicy {
    /// Save at the end of every change-dispatch flush.
    #[default]
    OnChange,
    /// Save only on an explicit `save_all`.
    Manual,
}

/// Writes root properties into a module's persistence directory.
#[derive(Debug, Default)]
pub struct ConfigurationWriter;

impl ConfigurationWriter {
    /// Persist one root if it is dirty. Writes atomically and clears the
    /// dirty flags on success. Returns whether a write happened.
    pub fn save(&self, module: &ModuleSpec, root: &mut RootProperty) -> Result<bool> {
        if !root.is_dirty() {
            return Ok(false);
        }
        let path = module.persistence_dir.join(root.file_name());
        xml::write_file(root.tree(), &path)?;
        root.mark_clean();
        debug!(
            module = %module.name,
            file = %path.display(),
            "persisted dirty configuration root"
        );
        Ok(true)
    }
}
