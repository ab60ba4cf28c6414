//! Error types for Canopy.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Canopy operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A namespace was used where it is not compatible.
    #[error("namespace error: {0}")]
    Namespace(String),

    /// A second root was registered for a (module, namespace) pair.
    #[error("module '{module}' already owns a root in namespace '{namespace}'")]
    DuplicateNamespace {
        /// Module that owns the existing root.
        module: String,
        /// Namespace of the rejected root.
        namespace: String,
    },

    /// A mutation targeted a property under an immutable node.
    #[error("property '{path}' is immutable")]
    Immutable {
        /// Dot-path of the property that rejected the mutation.
        path: String,
    },

    /// A mutation targeted a property that does not exist.
    #[error("no property '{path}' in namespace '{namespace}' of module '{module}'")]
    PropertyNotFound {
        /// Module that was searched.
        module: String,
        /// Namespace that was searched.
        namespace: String,
        /// Dot-path that did not resolve.
        path: String,
    },

    /// A dot-path string could not be parsed.
    #[error("invalid property path '{path}'")]
    InvalidPath {
        /// The offending path string.
        path: String,
    },

    /// I/O failure while reading or writing a configuration file.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// File the operation was against.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file failed to parse.
    #[error("parse error in {} at byte {offset}: {message}", .path.display())]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Byte offset of the failure.
        offset: u64,
        /// Parser message.
        message: String,
    },

    /// A directive file violated the directive contract.
    #[error("directive error: {0}")]
    Directive(String),

    /// Change dispatch re-entered past its bound.
    #[error("change dispatch exceeded re-entrant depth {limit}")]
    DispatchDepth {
        /// Configured depth bound.
        limit: usize,
    },
}

impl Error {
    /// Create a namespace error.
    pub fn namespace(msg: impl Into<String>) -> Self {
        Self::Namespace(msg.into())
    }

    /// Create a directive error.
    pub fn directive(msg: impl Into<String>) -> Self {
        Self::Directive(msg.into())
    }

    /// Create an I/O error bound to a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias using Canopy's Error.
pub type Result<T> = std::result::Result<T, Error>;
