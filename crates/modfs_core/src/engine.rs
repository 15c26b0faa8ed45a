//! The virtual node engine: dispatch, caching, and preview/base layering.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::{instrument, trace};

use crate::cache::NodeCache;
use crate::lazy::Lazy;
use crate::name;
use crate::node::Node;
use crate::path::{self, MODULES_PREFIX, PACKAGES_PREFIX};
use crate::provider::{NodeFactory, ResourceProvider};

struct EngineInner {
    provider: Arc<dyn ResourceProvider>,
    preview: bool,
    cache: NodeCache,
    module_names: Lazy<FxHashSet<String>>,
    package_names: Lazy<FxHashSet<String>>,
}

/// The entry point of the virtual hierarchy: resolves absolute paths to
/// [`Node`]s, backed by a [`ResourceProvider`] and a memoized node cache.
///
/// Cheap to clone; all state is shared through an inner `Arc`.
#[derive(Clone)]
pub struct NodeEngine(Arc<EngineInner>);

impl NodeEngine {
    /// Builds an engine over `provider`. When `preview` is `true`, preview
    /// resources take precedence over base resources wherever both exist
    /// for the same module.
    #[must_use]
    pub fn new(provider: Box<dyn ResourceProvider>, preview: bool) -> Self {
        let provider: Arc<dyn ResourceProvider> = Arc::from(provider);
        let for_modules = Arc::clone(&provider);
        let for_packages = Arc::clone(&provider);
        let inner = Arc::new(EngineInner {
            provider,
            preview,
            cache: NodeCache::new(),
            module_names: Lazy::new(move || for_modules.all_module_names()),
            package_names: Lazy::new(move || for_packages.package_names(preview)),
        });
        Self(inner)
    }

    fn factory(&self) -> NodeFactory {
        NodeFactory::new(self.clone())
    }

    fn module_names(&self) -> Arc<FxHashSet<String>> {
        self.0.module_names.get()
    }

    fn package_names(&self) -> Arc<FxHashSet<String>> {
        self.0.package_names.get()
    }

    /// Resolves an absolute virtual path to a node.
    ///
    /// Returns `None` for an invalid path or one that does not exist in
    /// this hierarchy.
    #[instrument(level = "trace", skip(self), fields(preview = self.0.preview))]
    pub fn find_node(&self, path: &str) -> Option<Node> {
        if !path::is_valid_absolute(path) {
            trace!(path, "rejected: invalid path");
            return None;
        }
        if path.is_empty() {
            return Some(self.root());
        }
        let found = self
            .0
            .cache
            .get_or_try_insert_with(path, || self.resolve_uncached(path));
        if found.is_none() {
            trace!(path, "not found");
        }
        found
    }

    fn resolve_uncached(&self, path: &str) -> Option<Node> {
        if path == MODULES_PREFIX {
            return Some(self.modules_root());
        }
        if path == PACKAGES_PREFIX {
            return Some(self.packages_root());
        }
        if let Some(rel) = path::relativize(MODULES_PREFIX, path) {
            return self.find_in_modules(rel);
        }
        if let Some(rel) = path::relativize(PACKAGES_PREFIX, path) {
            return self.find_in_packages(rel);
        }
        None
    }

    /// The fixed two-child root directory: `/modules` and `/packages`.
    fn root(&self) -> Node {
        let engine = self.clone();
        self.0.cache.get_or_insert_with("", move || {
            Node::directory(
                "",
                Lazy::ready(vec![engine.modules_root(), engine.packages_root()]),
            )
        })
    }

    fn modules_root(&self) -> Node {
        let engine = self.clone();
        self.0
            .cache
            .get_or_insert_with(MODULES_PREFIX, move || {
                let mut names: Vec<&String> = engine.module_names().iter().collect();
                names.sort_unstable();
                let children = names
                    .into_iter()
                    .map(|name| {
                        let abs = path::resolve(MODULES_PREFIX, name);
                        engine.factory().directory(abs, name)
                    })
                    .collect();
                Node::directory(MODULES_PREFIX, Lazy::ready(children))
            })
    }

    fn packages_root(&self) -> Node {
        let engine = self.clone();
        self.0
            .cache
            .get_or_insert_with(PACKAGES_PREFIX, move || {
                let mut names: Vec<&String> = engine.package_names().iter().collect();
                names.sort_unstable();
                let children = names
                    .into_iter()
                    .filter_map(|dotted| {
                        // A dotted package name is itself a single, valid path
                        // segment (internal dots are legal, see path::is_valid_segment),
                        // so it addresses `/packages/<dotted>` directly — it is
                        // never split into one virtual directory per component.
                        let abs = path::resolve(PACKAGES_PREFIX, dotted);
                        engine.package_directory(&abs, dotted)
                    })
                    .collect();
                Node::directory(PACKAGES_PREFIX, Lazy::ready(children))
            })
    }

    fn find_in_modules(&self, resource_path: &str) -> Option<Node> {
        if resource_path.is_empty() {
            return Some(self.modules_root());
        }
        // `resource_path` is derived from an already-validated absolute
        // virtual path (see `find_node`), so this can never actually fail;
        // made an explicit guard rather than an invariant nobody checks,
        // since nothing may reach the provider with a malformed path.
        if !path::is_valid_resource(resource_path) {
            return None;
        }
        let (module, rest) = path::split_module(resource_path);
        if !name::is_valid_module_name(module) || !self.module_names().contains(module) {
            return None;
        }
        let abs = path::resolve(MODULES_PREFIX, resource_path);
        if rest.is_empty() {
            return Some(
                self.0
                    .cache
                    .get_or_insert_with(&abs, || self.factory().directory(abs.as_str(), resource_path)),
            );
        }
        self.resolve_module_resource(&abs, resource_path)
    }

    /// Materializes a single resource somewhere under `/modules`, checking
    /// the preview layer first when preview is enabled.
    fn resolve_module_resource(&self, abs_path: &str, resource_path: &str) -> Option<Node> {
        let engine = self.clone();
        let resource_path = resource_path.to_string();
        self.0.cache.get_or_try_insert_with(abs_path, move || {
            let factory = engine.factory();
            if engine.0.preview {
                if let Some(node) = engine
                    .0
                    .provider
                    .get_resource(&factory, &resource_path, true)
                {
                    return Some(node);
                }
            }
            engine.0.provider.get_resource(&factory, &resource_path, false)
        })
    }

    /// Computes the ordered, preview/base-unioned children of the directory
    /// at `resource_path` (relative to `/modules`).
    ///
    /// When preview is disabled, only the base layer is visible. When
    /// enabled and the preview layer has no children here, the base layer
    /// is used unchanged. Otherwise every preview child is kept, and a base
    /// child is dropped whenever a preview child shares its base name
    /// (preview shadows base, it never merges with it at the same name).
    #[instrument(level = "trace", skip(self))]
    pub(crate) fn enumerate_module_children(&self, resource_path: &str) -> Vec<Node> {
        let factory = self.factory();
        let mut base = Vec::new();
        self.0
            .provider
            .for_each_child_of(&factory, resource_path, false, &mut |n| base.push(n));

        if !self.0.preview {
            base.sort_unstable_by(|a, b| path::base_name(a.path()).cmp(path::base_name(b.path())));
            return base;
        }

        let mut preview = Vec::new();
        self.0
            .provider
            .for_each_child_of(&factory, resource_path, true, &mut |n| preview.push(n));

        if preview.is_empty() {
            base.sort_unstable_by(|a, b| path::base_name(a.path()).cmp(path::base_name(b.path())));
            return base;
        }

        let preview_names: FxHashSet<&str> =
            preview.iter().map(|n| path::base_name(n.path())).collect();
        let mut merged: Vec<Node> = preview;
        merged.extend(
            base.into_iter()
                .filter(|n| !preview_names.contains(path::base_name(n.path()))),
        );
        merged.sort_unstable_by(|a, b| path::base_name(a.path()).cmp(path::base_name(b.path())));
        merged
    }

    fn find_in_packages(&self, resource_path: &str) -> Option<Node> {
        if resource_path.is_empty() {
            return Some(self.packages_root());
        }
        let (dotted_prefix, rest) = match resource_path.split_once('/') {
            Some((pkg, rest)) => (pkg, Some(rest)),
            None => (resource_path, None),
        };
        let dotted = name::path_to_package(dotted_prefix);
        if !name::is_valid_package_name(&dotted) || !self.package_names().contains(&dotted) {
            return None;
        }
        let abs = path::resolve(PACKAGES_PREFIX, resource_path);
        match rest {
            None => self.package_directory(&abs, &dotted),
            Some(module) => {
                if !name::is_valid_module_name(module) {
                    return None;
                }
                self.package_link(&abs, &dotted, module)
            }
        }
    }

    /// Builds the directory at `/packages/<dotted as path>`: one symbolic
    /// link per module contributing to `dotted`.
    fn package_directory(&self, abs_path: &str, dotted: &str) -> Option<Node> {
        if !self.package_names().contains(dotted) {
            return None;
        }
        let engine = self.clone();
        let dotted = dotted.to_string();
        let abs_path_owned = abs_path.to_string();
        Some(self.0.cache.get_or_insert_with(abs_path, move || {
            let preview = engine.0.preview;
            let mut modules: Vec<String> = engine
                .0
                .provider
                .modules_for_package(&dotted, preview)
                .into_iter()
                .collect();
            modules.sort_unstable();
            let children = modules
                .into_iter()
                .filter_map(|module| {
                    let link_path = path::resolve(&abs_path_owned, &module);
                    engine.package_link(&link_path, &dotted, &module)
                })
                .collect();
            Node::directory(abs_path_owned.clone(), Lazy::ready(children))
        }))
    }

    /// Builds the late-bound symbolic link at `/packages/<dotted>/<module>`
    /// pointing at the whole `/modules/<module>` directory (never at the
    /// package's own sub-path inside that module).
    fn package_link(&self, abs_path: &str, dotted: &str, module: &str) -> Option<Node> {
        if !self
            .0
            .provider
            .package_exists(module, dotted, self.0.preview)
        {
            return None;
        }
        let engine = self.clone();
        let target_path = path::resolve(MODULES_PREFIX, module);
        Some(self.0.cache.get_or_insert_with(abs_path, move || {
            let target_for_closure = target_path.clone();
            Node::link(
                abs_path.to_string(),
                Lazy::new(move || {
                    engine.find_node(&target_for_closure).unwrap_or_else(|| {
                        Node::file(target_for_closure.clone(), Lazy::ready(Ok(Vec::new())))
                    })
                }),
            )
        }))
    }
}
