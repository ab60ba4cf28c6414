//! Typed dot-paths.
//!
//! Lookup paths like `a.b.c` are parsed once into an ordered segment list
//! instead of being re-split on every query. The manager keeps a
//! [`PathCache`] so hot paths parse a single time per process.

use canopy_core::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// An ordered descent through nested element names. No wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    segments: Vec<String>,
}

impl PropertyPath {
    /// Parse a dot-path. Empty segments are rejected; the empty string is
    /// the identity path (resolves to the node it is applied to).
    pub fn parse(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Ok(Self {
                segments: Vec::new(),
            });
        }
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(Error::InvalidPath {
                path: path.to_string(),
            });
        }
        Ok(Self { segments })
    }

    /// The path segments in descent order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether this is the identity path.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl FromStr for PropertyPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Memoizes parsed paths by their source string.
#[derive(Debug, Default)]
pub struct PathCache {
    cache: HashMap<String, Arc<PropertyPath>>,
}

impl PathCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a path, reusing a previous parse of the same string.
    pub fn get(&mut self, path: &str) -> Result<Arc<PropertyPath>> {
        if let Some(parsed) = self.cache.get(path) {
            return Ok(Arc::clone(parsed));
        }
        let parsed = Arc::new(PropertyPath::parse(path)?);
        self.cache.insert(path.to_string(), Arc::clone(&parsed));
        Ok(parsed)
    }

    /// Drop every cached path.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Number of cached paths.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
