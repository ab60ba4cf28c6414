//! Test utilities for Canopy crates.

use canopy_core::ModuleSpec;
use std::path::PathBuf;
use tempfile::TempDir;

/// Creates a temporary directory that is cleaned up on drop.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Creates a temporary file with given content.
pub fn temp_file(content: &str) -> (TempDir, PathBuf) {
    let dir = temp_dir();
    let path = dir.path().join("test_file");
    std::fs::write(&path, content).expect("Failed to write temp file");
    (dir, path)
}

/// Creates a module with the conventional directory layout
/// (`configuration`, `directives`, `persistent`) under a temp dir.
pub fn module_fixture(name: &str) -> (TempDir, ModuleSpec) {
    let dir = temp_dir();
    let spec = ModuleSpec::under(name, dir.path().join(name));
    for d in [&spec.config_dir, &spec.directives_dir, &spec.persistence_dir] {
        std::fs::create_dir_all(d).expect("Failed to create module directory");
    }
    (dir, spec)
}

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a Result is Err.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(v) => panic!("Expected Err, got Ok: {:?}", v),
            Err(_) => {}
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_file_creation() {
        let content = "test content";
        let (_dir, path) = temp_file(content);
        assert!(path.exists());
        let read_content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(read_content, content);
    }

    #[test]
    fn test_module_fixture_layout() {
        let (_dir, spec) = module_fixture("outer");
        assert_eq!(spec.name, "outer");
        assert!(spec.config_dir.is_dir());
        assert!(spec.directives_dir.is_dir());
        assert!(spec.persistence_dir.is_dir());
    }
}
