//! The configuration manager.

use crate::loader::ConfigurationReader;
use crate::merge::merge_module_roots;
use crate::writer::{ConfigurationWriter, SavePolicy};
use canopy_core::{Error, ModuleRegistry, Namespace, Result};
use canopy_locale::{detect_locale_with_override, LocaleCode};
use canopy_property::{
    ChangeKind, NodeId, PathCache, PropertyPath, PropertyTree, RootProperty,
};
use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, warn};

/// One change, as delivered to subscribers.
#[derive(Debug, Clone)]
pub struct ChangeNotice {
    /// Module owning the changed root.
    pub module: String,
    /// Namespace of the changed root.
    pub namespace: Namespace,
    /// Display path of the changed node; arbitrarily deep, not only roots.
    pub path: String,
    /// Mutation kind.
    pub kind: ChangeKind,
    /// New scalar value, when the mutation carried one.
    pub value: Option<String>,
}

/// Handle for removing a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type SubscriberFn = Box<dyn FnMut(&ChangeNotice) + Send>;

/// Construction options.
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Target locale preference; the environment is consulted when unset.
    pub locale: Option<String>,
    /// When dirty roots are persisted.
    pub save_policy: SavePolicy,
    /// Bound on re-entrant dispatch rounds within one flush.
    pub dispatch_depth: usize,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            locale: None,
            save_policy: SavePolicy::default(),
            dispatch_depth: 8,
        }
    }
}

/// A query result: one node inside one registered root.
#[derive(Clone, Copy)]
pub struct PropertyRef<'a> {
    root: &'a RootProperty,
    node: NodeId,
}

impl<'a> PropertyRef<'a> {
    /// The matched node.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The tree the node lives in.
    pub fn tree(&self) -> &'a PropertyTree {
        self.root.tree()
    }

    /// Owning module of the root.
    pub fn module(&self) -> &'a str {
        self.root.module()
    }

    /// Namespace of the root.
    pub fn namespace(&self) -> &'a Namespace {
        self.root.namespace()
    }

    /// Node name.
    pub fn name(&self) -> &'a str {
        self.root.tree().name(self.node)
    }

    /// Scalar value, if any.
    pub fn value(&self) -> Option<&'a str> {
        self.root.tree().value(self.node)
    }

    /// Value parsed as a boolean.
    pub fn bool_value(&self) -> Option<bool> {
        self.root.tree().bool_value(self.node)
    }

    /// Value parsed as an integer.
    pub fn i64_value(&self) -> Option<i64> {
        self.root.tree().i64_value(self.node)
    }

    /// Module that contributed the node, when it differs from the owner.
    pub fn origin_module(&self) -> Option<&'a str> {
        self.root.tree().origin_module(self.node)
    }

    /// Display path of the node.
    pub fn path(&self) -> String {
        self.root.tree().path_of(self.node)
    }
}

/// Owns all loaded roots and the query/mutation/notification surface.
pub struct ConfigurationManager {
    registry: ModuleRegistry,
    options: ManagerOptions,
    locale: LocaleCode,
    reader: ConfigurationReader,
    writer: ConfigurationWriter,
    roots: Vec<RootProperty>,
    subscribers: Vec<(SubscriptionId, SubscriberFn)>,
    next_subscription: u64,
    paths: Mutex<PathCache>,
    pending: Vec<ChangeNotice>,
    save_queue: Arc<Mutex<BTreeSet<(String, String)>>>,
}

impl ConfigurationManager {
    /// Open the configuration for a module registry: load every module's
    /// files (override resolution, locale filtering, directives), merge
    /// namespaces per module, and persist anything the directives dirtied.
    ///
    /// A module whose required base file fails to parse contributes
    /// nothing; other load failures skip only the affected file.
    pub fn open(registry: ModuleRegistry, options: ManagerOptions) -> Result<Self> {
        let locale = detect_locale_with_override(options.locale.as_deref());
        debug!(%locale, modules = registry.len(), "opening configuration");

        let mut manager = Self {
            registry,
            options,
            locale,
            reader: ConfigurationReader,
            writer: ConfigurationWriter,
            roots: Vec::new(),
            subscribers: Vec::new(),
            next_subscription: 1,
            paths: Mutex::new(PathCache::new()),
            pending: Vec::new(),
            save_queue: Arc::new(Mutex::new(BTreeSet::new())),
        };
        manager.register_builtin_subscriber();

        let modules: Vec<_> = manager.registry.iter().cloned().collect();
        for module in &modules {
            match manager.reader.load_module(module, &manager.locale) {
                Ok(roots) => manager.roots.extend(merge_module_roots(roots)),
                Err(e) => {
                    error!(
                        module = %module.name,
                        error = %e,
                        "module configuration failed to load; module contributes nothing"
                    );
                }
            }
        }

        // Directive application may have dirtied trees before any events
        // could reach the built-in subscriber; queue those roots directly.
        {
            let mut queue = manager.save_queue.lock().expect("save queue poisoned");
            for root in manager.roots.iter().filter(|r| r.is_dirty()) {
                queue.insert((root.module().to_string(), root.namespace().to_string()));
            }
        }
        manager.flush()?;
        Ok(manager)
    }

    /// The built-in subscriber collects changed roots for persistence. It is
    /// always first and cannot be unsubscribed.
    fn register_builtin_subscriber(&mut self) {
        let queue = Arc::clone(&self.save_queue);
        self.subscribers.push((
            SubscriptionId(0),
            Box::new(move |notice: &ChangeNotice| {
                queue
                    .lock()
                    .expect("save queue poisoned")
                    .insert((notice.module.clone(), notice.namespace.to_string()));
            }),
        ));
    }

    /// The locale this manager loaded for.
    pub fn locale(&self) -> &LocaleCode {
        &self.locale
    }

    /// All loaded roots, in module order.
    pub fn roots(&self) -> &[RootProperty] {
        &self.roots
    }

    /// Roots owned by one module.
    pub fn roots_for_module(&self, module: &str) -> Vec<&RootProperty> {
        self.roots.iter().filter(|r| r.module() == module).collect()
    }

    /// The root for a (module, namespace) pair, if loaded.
    pub fn root(&self, module: &str, namespace: &str) -> Option<&RootProperty> {
        self.root_index(module, namespace).map(|i| &self.roots[i])
    }

    fn root_index(&self, module: &str, namespace: &str) -> Option<usize> {
        self.roots
            .iter()
            .position(|r| r.module() == module && r.namespace().as_str() == namespace)
    }

    fn parse_path(&self, path: &str) -> Result<Arc<PropertyPath>> {
        self.paths.lock().expect("path cache poisoned").get(path)
    }

    /// All descendants matching a dot-path. Queries never fail: an unknown
    /// module, namespace, or malformed path yields an empty result.
    pub fn find_all(&self, module: &str, namespace: &str, path: &str) -> Vec<PropertyRef<'_>> {
        let Ok(parsed) = self.parse_path(path) else {
            return Vec::new();
        };
        let Some(root) = self.root(module, namespace) else {
            return Vec::new();
        };
        let tree = root.tree();
        tree.find_all(tree.root(), &parsed)
            .into_iter()
            .map(|node| PropertyRef { root, node })
            .collect()
    }

    /// First match for a dot-path, if any.
    pub fn find(&self, module: &str, namespace: &str, path: &str) -> Option<PropertyRef<'_>> {
        self.find_all(module, namespace, path).into_iter().next()
    }

    /// First matching value for a dot-path, if any.
    pub fn value(&self, module: &str, namespace: &str, path: &str) -> Option<&str> {
        let parsed = self.parse_path(path).ok()?;
        let root = self.root(module, namespace)?;
        let tree = root.tree();
        let node = tree.find(tree.root(), &parsed)?;
        tree.value(node)
    }

    /// Register a root. Rejects a second root for the owning (module,
    /// namespace) pair — the one place uniqueness is enforced outside the
    /// merge pass.
    pub fn add_root(&mut self, root: RootProperty) -> Result<()> {
        self.ensure_unique(&root)?;
        self.insert_root(root);
        self.flush()
    }

    /// Register several roots; the whole batch is validated before any root
    /// is inserted.
    pub fn add_roots(&mut self, roots: Vec<RootProperty>) -> Result<()> {
        for (i, root) in roots.iter().enumerate() {
            self.ensure_unique(root)?;
            for earlier in &roots[..i] {
                if earlier.module() == root.module() && earlier.namespace() == root.namespace() {
                    return Err(Error::DuplicateNamespace {
                        module: root.module().to_string(),
                        namespace: root.namespace().to_string(),
                    });
                }
            }
        }
        for root in roots {
            self.insert_root(root);
        }
        self.flush()
    }

    fn ensure_unique(&self, root: &RootProperty) -> Result<()> {
        if self.root(root.module(), root.namespace().as_str()).is_some() {
            return Err(Error::DuplicateNamespace {
                module: root.module().to_string(),
                namespace: root.namespace().to_string(),
            });
        }
        Ok(())
    }

    fn insert_root(&mut self, root: RootProperty) {
        self.pending.push(ChangeNotice {
            module: root.module().to_string(),
            namespace: root.namespace().clone(),
            path: root.tree().name(root.tree().root()).to_string(),
            kind: ChangeKind::ChildAdded,
            value: None,
        });
        self.roots.push(root);
    }

    fn locate(&self, module: &str, namespace: &str, path: &str) -> Result<(usize, NodeId)> {
        let parsed = self.parse_path(path)?;
        let index = self
            .root_index(module, namespace)
            .ok_or_else(|| Error::PropertyNotFound {
                module: module.to_string(),
                namespace: namespace.to_string(),
                path: path.to_string(),
            })?;
        let tree = self.roots[index].tree();
        let node = tree
            .find(tree.root(), &parsed)
            .ok_or_else(|| Error::PropertyNotFound {
                module: module.to_string(),
                namespace: namespace.to_string(),
                path: path.to_string(),
            })?;
        Ok((index, node))
    }

    /// Set the value of the first property matching a dot-path.
    pub fn set_value(
        &mut self,
        module: &str,
        namespace: &str,
        path: &str,
        value: Option<&str>,
    ) -> Result<()> {
        let (index, node) = self.locate(module, namespace, path)?;
        self.roots[index].tree_mut().set_value(node, value)?;
        self.flush()
    }

    /// Add a property under the first node matching `parent_path` (the
    /// empty path addresses the root).
    pub fn add_property(
        &mut self,
        module: &str,
        namespace: &str,
        parent_path: &str,
        name: &str,
        value: Option<&str>,
    ) -> Result<()> {
        let (index, parent) = self.locate(module, namespace, parent_path)?;
        self.roots[index].tree_mut().add_child(parent, name, value)?;
        self.flush()
    }

    /// Remove the first property matching a dot-path.
    pub fn remove_property(&mut self, module: &str, namespace: &str, path: &str) -> Result<()> {
        let (index, node) = self.locate(module, namespace, path)?;
        self.roots[index].tree_mut().remove(node)?;
        self.flush()
    }

    /// Move a whole root to a new namespace. Rejected when the module
    /// already owns a root there.
    pub fn set_namespace(&mut self, module: &str, namespace: &str, new: &str) -> Result<()> {
        if self.root(module, new).is_some() {
            return Err(Error::DuplicateNamespace {
                module: module.to_string(),
                namespace: new.to_string(),
            });
        }
        let index = self
            .root_index(module, namespace)
            .ok_or_else(|| Error::PropertyNotFound {
                module: module.to_string(),
                namespace: namespace.to_string(),
                path: String::new(),
            })?;
        let root = &mut self.roots[index];
        let node = root.tree().root();
        root.tree_mut().set_namespace(node, Namespace::new(new))?;
        root.refresh_namespace();
        self.flush()
    }

    /// Register a subscriber; it sees every later change, in registration
    /// order, including changes to arbitrarily deep nodes.
    pub fn subscribe(&mut self, f: impl FnMut(&ChangeNotice) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(f)));
        id
    }

    /// Remove a subscriber. The built-in persistence subscriber stays.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        if id.0 == 0 {
            return false;
        }
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    /// Queue-and-flush dispatch: events recorded during the outer mutation
    /// drain here, round by round, until quiet. Each round re-collects
    /// events so re-entrant mutations are delivered too; more rounds than
    /// `dispatch_depth` is an error. A panicking subscriber is logged and
    /// the remaining subscribers still run.
    fn flush(&mut self) -> Result<()> {
        let mut rounds = 0;
        loop {
            let mut notices: Vec<ChangeNotice> = std::mem::take(&mut self.pending);
            for root in &mut self.roots {
                let module = root.module().to_string();
                for event in root.tree_mut().take_events() {
                    notices.push(ChangeNotice {
                        module: module.clone(),
                        namespace: event.namespace,
                        path: event.path,
                        kind: event.kind,
                        value: event.value,
                    });
                }
            }
            if notices.is_empty() {
                break;
            }

            rounds += 1;
            if rounds > self.options.dispatch_depth {
                return Err(Error::DispatchDepth {
                    limit: self.options.dispatch_depth,
                });
            }

            for notice in &notices {
                for (id, subscriber) in &mut self.subscribers {
                    if catch_unwind(AssertUnwindSafe(|| subscriber(notice))).is_err() {
                        error!(
                            subscription = id.0,
                            path = %notice.path,
                            "subscriber panicked; continuing with the rest"
                        );
                    }
                }
            }
        }

        if self.options.save_policy == SavePolicy::OnChange {
            self.drain_save_queue()?;
        }
        Ok(())
    }

    fn drain_save_queue(&mut self) -> Result<()> {
        let pending: Vec<(String, String)> = {
            let mut queue = self.save_queue.lock().expect("save queue poisoned");
            std::mem::take(&mut *queue).into_iter().collect()
        };
        for (module, namespace) in pending {
            let Some(spec) = self.registry.get(&module).cloned() else {
                warn!(module, "changed root has no registered module; not persisted");
                continue;
            };
            if let Some(index) = self.root_index(&module, &namespace) {
                self.writer.save(&spec, &mut self.roots[index])?;
            }
        }
        Ok(())
    }

    /// Persist every dirty root whose module is registered. Returns how many
    /// roots were written.
    pub fn save_all(&mut self) -> Result<usize> {
        let mut written = 0;
        for index in 0..self.roots.len() {
            let Some(spec) = self.registry.get(self.roots[index].module()).cloned() else {
                continue;
            };
            if self.writer.save(&spec, &mut self.roots[index])? {
                written += 1;
            }
        }
        self.save_queue.lock().expect("save queue poisoned").clear();
        Ok(written)
    }

    /// Drop every root and pending notification. Intended for tests;
    /// production trees live for the process lifetime.
    pub fn reset(&mut self) {
        self.roots.clear();
        self.pending.clear();
        self.save_queue.lock().expect("save queue poisoned").clear();
        self.paths.lock().expect("path cache poisoned").clear();
    }
}
