//! Arena-backed hierarchical property trees.
//!
//! A [`PropertyTree`] owns every node of one loaded configuration file in a
//! single growable table; parent/child relations are [`NodeId`] indices, so
//! the graph has no reference cycles. Mutations enforce the namespace and
//! mutability invariants, mark nodes dirty, and record [`PropertyEvent`]s
//! that the configuration manager drains and dispatches after the outermost
//! mutation returns.

pub mod event;
pub mod path;
pub mod root;
pub mod tree;
pub mod xml;

pub use event::{ChangeKind, PropertyEvent};
pub use path::{PathCache, PropertyPath};
pub use root::RootProperty;
pub use tree::{NodeId, PropertyTree};
