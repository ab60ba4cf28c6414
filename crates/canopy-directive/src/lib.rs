//! Directive patch files.
//!
//! A base file `name.xml` may be accompanied by `name-add.xml` (and the
//! reserved `name-change.xml` / `name-remove.xml`); the distinguished base
//! `configuration.xml` uses bare `add.xml` / `change.xml` / `remove.xml`.
//! Add directives apply at most once across process runs: applied blocks are
//! recorded in a tracking file (`name-added.xml`) in the module's
//! persistence directory and skipped on later runs.

pub mod apply;
pub mod manifest;
pub mod tracking;

pub use apply::apply;
pub use manifest::{is_directive_file_name, DirectiveEntry, DirectiveKind, DirectiveManifest};
pub use tracking::TrackingFile;

/// Base name whose directives drop the `<base>-` prefix.
pub const DISTINGUISHED_BASE: &str = "configuration";
