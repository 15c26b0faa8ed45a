//! The seam between the engine and a concrete packed-image (or other)
//! resource backend.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::engine::NodeEngine;
use crate::error::Error;
use crate::lazy::Lazy;
use crate::node::Node;

/// A source of module content and metadata.
///
/// Implementations own the packed-image (or other) backing store and are
/// responsible only for enumerating and materializing resources one layer
/// at a time; layering resources across preview/base and synthesizing
/// `/packages` is the engine's job, not the provider's.
pub trait ResourceProvider: Send + Sync {
    /// Materializes the resource at `resource_path` within `preview`'s
    /// layer, or returns `None` if it does not exist there.
    fn get_resource(
        &self,
        factory: &NodeFactory,
        resource_path: &str,
        preview: bool,
    ) -> Option<Node>;

    /// Invokes `sink` once per direct child of `resource_path` that exists
    /// in `preview`'s layer. Implementations enumerate only their own
    /// layer; they do not need to know about the other layer.
    fn for_each_child_of(
        &self,
        factory: &NodeFactory,
        resource_path: &str,
        preview: bool,
        sink: &mut dyn FnMut(Node),
    );

    /// The full set of module names known to this provider, across both
    /// layers.
    fn all_module_names(&self) -> FxHashSet<String>;

    /// The set of dotted package names visible in `preview`'s layer.
    fn package_names(&self, preview: bool) -> FxHashSet<String>;

    /// Returns `true` if `module` contributes to `package` in `preview`'s
    /// layer.
    fn package_exists(&self, module: &str, package: &str, preview: bool) -> bool;

    /// The modules that contribute to `package` in `preview`'s layer.
    fn modules_for_package(&self, package: &str, preview: bool) -> FxHashSet<String>;
}

/// [`NodeEngine::new`] takes ownership of a `Box<dyn ResourceProvider>`, so a
/// caller who also needs to reach a provider-specific method after handing
/// one to an engine (e.g. a packed-image provider's `close`) wraps it in an
/// `Arc` first and passes `Box::new(Arc::clone(&provider))`, keeping their
/// own handle alive alongside the engine's.
impl<T: ResourceProvider + ?Sized> ResourceProvider for Arc<T> {
    fn get_resource(&self, factory: &NodeFactory, resource_path: &str, preview: bool) -> Option<Node> {
        (**self).get_resource(factory, resource_path, preview)
    }

    fn for_each_child_of(
        &self,
        factory: &NodeFactory,
        resource_path: &str,
        preview: bool,
        sink: &mut dyn FnMut(Node),
    ) {
        (**self).for_each_child_of(factory, resource_path, preview, sink);
    }

    fn all_module_names(&self) -> FxHashSet<String> {
        (**self).all_module_names()
    }

    fn package_names(&self, preview: bool) -> FxHashSet<String> {
        (**self).package_names(preview)
    }

    fn package_exists(&self, module: &str, package: &str, preview: bool) -> bool {
        (**self).package_exists(module, package, preview)
    }

    fn modules_for_package(&self, package: &str, preview: bool) -> FxHashSet<String> {
        (**self).modules_for_package(package, preview)
    }
}

/// Builds [`Node`]s on a provider's behalf, wiring directory children back
/// through the owning engine so the preview/base union algorithm runs in
/// exactly one place.
#[derive(Clone)]
pub struct NodeFactory {
    pub(crate) engine: NodeEngine,
}

impl NodeFactory {
    #[must_use]
    pub(crate) fn new(engine: NodeEngine) -> Self {
        Self { engine }
    }

    /// Builds a lazily-contented file node. `content` is memoized after its
    /// first successful read, same as any other [`Lazy`] producer: a racing
    /// reader may invoke it more than once, but every reader converges on
    /// one published result.
    #[must_use]
    pub fn file(
        &self,
        abs_path: impl Into<std::sync::Arc<str>>,
        content: impl Fn() -> Result<Vec<u8>, Error> + Send + Sync + 'static,
    ) -> Node {
        Node::file(abs_path, Lazy::new(content))
    }

    /// Builds a directory node at `abs_path` whose children are the
    /// engine's preview/base union of `resource_path`'s children.
    #[must_use]
    pub fn directory(&self, abs_path: impl Into<std::sync::Arc<str>>, resource_path: &str) -> Node {
        let engine = self.engine.clone();
        let resource_path = resource_path.to_string();
        Node::directory(
            abs_path,
            Lazy::new(move || engine.enumerate_module_children(&resource_path)),
        )
    }
}
