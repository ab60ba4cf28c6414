//! Change events recorded by tree mutations.

use canopy_core::Namespace;

/// What kind of mutation produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A scalar value was set or cleared.
    ValueSet,
    /// A child node was added.
    ChildAdded,
    /// A child node was removed.
    ChildRemoved,
    /// The namespace of a subtree was changed.
    NamespaceSet,
}

/// One recorded mutation.
///
/// Events carry the display path of the changed node (root name included),
/// not a [`NodeId`](crate::NodeId), so they stay meaningful after further
/// structural changes and across the manager boundary.
#[derive(Debug, Clone)]
pub struct PropertyEvent {
    /// Namespace of the tree at the time of the mutation.
    pub namespace: Namespace,
    /// Display path of the changed node, e.g. `configuration.a.b`.
    pub path: String,
    /// Mutation kind.
    pub kind: ChangeKind,
    /// New scalar value, for [`ChangeKind::ValueSet`] and added leaves.
    pub value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_carries_path_and_kind() {
        let event = PropertyEvent {
            namespace: Namespace::new("configuration"),
            path: "configuration.a.b".to_string(),
            kind: ChangeKind::ValueSet,
            value: Some("1".to_string()),
        };
        assert_eq!(event.kind, ChangeKind::ValueSet);
        assert_eq!(event.path, "configuration.a.b");
    }
}
