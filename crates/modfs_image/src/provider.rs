//! A [`ResourceProvider`] backed by a packed runtime image.
//!
//! Translates between the module-relative resource paths `modfs_core`
//! traffics in (e.g. `"m/java/lang/Object.class"`) and this crate's
//! collision-free container paths (`"modules/m/java/lang/Object.class"`,
//! or `"modules/m/META-INF/preview/java/lang/Object.class"` for preview
//! content), and answers package queries by combining the container's
//! build-time base-package index with each module's lazily-walked preview
//! package set.

use std::path::Path;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::instrument;

use modfs_core::provider::{NodeFactory, ResourceProvider};
use modfs_core::{Error, Node};

use crate::container::Container;
use crate::error::ImageError;
use crate::module::Module;

const PREVIEW_DIR: &str = "META-INF/preview";

fn container_path(resource_path: &str, preview: bool) -> String {
    if preview {
        let (module, rest) = resource_path.split_once('/').unwrap_or((resource_path, ""));
        if rest.is_empty() {
            format!("modules/{module}/{PREVIEW_DIR}")
        } else {
            format!("modules/{module}/{PREVIEW_DIR}/{rest}")
        }
    } else {
        format!("modules/{resource_path}")
    }
}

/// A read-only, closeable view over a packed runtime image.
///
/// Closing detaches this provider's ability to read file *content*; every
/// lookup and enumeration method stays total, matching
/// [`modfs_core::Node::children`]'s lack of an error channel (see
/// [`Container::file_bytes`] for why only content reads are gated).
pub struct PackedImageProvider {
    container: Arc<Container>,
    modules: FxHashMap<String, Module>,
}

impl PackedImageProvider {
    /// Opens and memory-maps the packed image at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        Self::from_container(Container::open(path)?)
    }

    /// Wraps an already-open container, e.g. one built in memory by
    /// [`crate::builder::ImageBuilder`] for tests.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ImageError> {
        Self::from_container(Container::from_bytes(bytes)?)
    }

    fn from_container(container: Container) -> Result<Self, ImageError> {
        let container = Arc::new(container);
        let modules_root = container.modules_root_index();
        let mut modules = FxHashMap::default();
        for child_index in container.children_indices(modules_root)? {
            let loc = container.location(child_index);
            if !loc.is_directory {
                continue;
            }
            let name = loc.resource_path.rsplit('/').next().unwrap_or(&loc.resource_path);
            modules.insert(name.to_string(), Module::new(name, Arc::clone(&container)));
        }
        Ok(Self { container, modules })
    }

    /// Detaches this provider's content-read capability. Idempotent.
    ///
    /// Safe to call while an engine built over this provider is still in
    /// use: the underlying mapping stays valid for as long as any
    /// `Arc<Container>` reference (including ones already captured by a
    /// file node's lazily-evaluated content closure) is alive; only
    /// subsequent [`modfs_core::Node::content`] calls start failing.
    pub fn close(&self) {
        self.container.close();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.container.is_closed()
    }
}

impl ResourceProvider for PackedImageProvider {
    #[instrument(level = "trace", skip(self, factory))]
    fn get_resource(&self, factory: &NodeFactory, resource_path: &str, preview: bool) -> Option<Node> {
        let path = container_path(resource_path, preview);
        let loc = self.container.find(&path)?;
        let abs = modfs_core::path::resolve(modfs_core::path::MODULES_PREFIX, resource_path);
        if loc.is_directory {
            Some(factory.directory(abs, resource_path))
        } else {
            let container = Arc::clone(&self.container);
            let index = loc.index;
            Some(factory.file(abs, move || {
                container.file_bytes(index).map_err(Error::from)
            }))
        }
    }

    fn for_each_child_of(
        &self,
        factory: &NodeFactory,
        resource_path: &str,
        preview: bool,
        sink: &mut dyn FnMut(Node),
    ) {
        let path = container_path(resource_path, preview);
        let Some(loc) = self.container.find(&path) else {
            return;
        };
        if !loc.is_directory {
            return;
        }
        let Ok(children) = self.container.children_indices(loc.index) else {
            return;
        };
        for child_index in children {
            let child_loc = self.container.location(child_index);
            let name = child_loc
                .resource_path
                .rsplit('/')
                .next()
                .unwrap_or(&child_loc.resource_path);
            let child_resource = modfs_core::path::resolve(resource_path, name);
            if let Some(node) = self.get_resource(factory, &child_resource, preview) {
                sink(node);
            }
        }
    }

    fn all_module_names(&self) -> FxHashSet<String> {
        self.modules.keys().cloned().collect()
    }

    fn package_names(&self, preview: bool) -> FxHashSet<String> {
        let mut out = self.base_package_names();
        if preview {
            for module in self.modules.values() {
                out.extend(module.preview_package_names().iter().cloned());
            }
        }
        out
    }

    fn package_exists(&self, module: &str, package: &str, preview: bool) -> bool {
        // `package` is a single path segment in the container, same as in the
        // virtual namespace (a dotted name may contain internal dots but is
        // never split into one container directory per component).
        if self
            .container
            .find(&format!("packages/{package}/{module}"))
            .is_some()
        {
            return true;
        }
        preview
            && self
                .modules
                .get(module)
                .is_some_and(|m| m.preview_package_names().contains(package))
    }

    fn modules_for_package(&self, package: &str, preview: bool) -> FxHashSet<String> {
        let mut out = FxHashSet::default();
        if let Some(loc) = self.container.find(&format!("packages/{package}")) {
            if let Ok(children) = self.container.children_indices(loc.index) {
                for child_index in children {
                    let child_loc = self.container.location(child_index);
                    if let Some(name) = child_loc.resource_path.rsplit('/').next() {
                        out.insert(name.to_string());
                    }
                }
            }
        }
        if preview {
            for module in self.modules.values() {
                if module.preview_package_names().contains(package) {
                    out.insert(module.name().to_string());
                }
            }
        }
        out
    }
}

impl PackedImageProvider {
    fn base_package_names(&self) -> FxHashSet<String> {
        let Some(loc) = self.container.find("packages") else {
            return FxHashSet::default();
        };
        let Ok(children) = self.container.children_indices(loc.index) else {
            return FxHashSet::default();
        };
        children
            .into_iter()
            .filter_map(|i| {
                let child = self.container.location(i);
                child.resource_path.strip_prefix("packages/").map(str::to_string)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ImageBuilder;
    use modfs_core::NodeEngine;

    fn sample(preview_enabled: bool) -> NodeEngine {
        let mut builder = ImageBuilder::new();
        builder.add_file("m", "java/lang/Object.class", b"base-object".to_vec());
        builder.add_file("m", "java/util/List.class", b"base-list".to_vec());
        builder.add_file("other", "java/lang/Thread.class", b"other-thread".to_vec());
        builder.add_file(
            "m",
            "META-INF/preview/java/lang/Object.class",
            b"preview-object".to_vec(),
        );
        builder.add_file(
            "m",
            "META-INF/preview/b/gus/Gizmo.class",
            b"preview-only".to_vec(),
        );
        let provider = PackedImageProvider::from_bytes(builder.build()).unwrap();
        NodeEngine::new(Box::new(provider), preview_enabled)
    }

    #[test]
    fn base_layer_resolves_without_preview() {
        let engine = sample(false);
        let node = engine.find_node("/modules/m/java/lang/Object.class").unwrap();
        assert_eq!(node.content().unwrap(), b"base-object");
    }

    #[test]
    fn preview_shadows_base_for_the_same_name() {
        let engine = sample(true);
        let node = engine.find_node("/modules/m/java/lang/Object.class").unwrap();
        assert_eq!(node.content().unwrap(), b"preview-object");
    }

    #[test]
    fn preview_only_package_is_reachable_through_packages_root() {
        let engine = sample(true);
        let link = engine.find_node("/packages/b.gus/m").unwrap();
        assert!(link.is_link());
        let target = link.resolve_link(false);
        assert_eq!(target.path(), "/modules/m");
    }

    #[test]
    fn preview_only_package_is_absent_without_preview() {
        let engine = sample(false);
        assert!(engine.find_node("/packages/b.gus").is_none());
    }

    #[test]
    fn base_package_lists_every_contributing_module() {
        let engine = sample(false);
        let dir = engine.find_node("/packages/java.lang").unwrap();
        let names: Vec<&str> = dir.children().iter().map(Node::path).collect();
        assert_eq!(names, vec!["/packages/java.lang/m", "/packages/java.lang/other"]);
    }

    #[test]
    fn closing_fails_content_reads_but_not_lookups() {
        let mut builder = ImageBuilder::new();
        builder.add_file("m", "a/B.class", b"content".to_vec());
        let provider = Arc::new(PackedImageProvider::from_bytes(builder.build()).unwrap());
        let engine = NodeEngine::new(Box::new(Arc::clone(&provider)), false);
        provider.close();
        let node = engine.find_node("/modules/m/a/B.class").unwrap();
        assert!(matches!(node.content(), Err(Error::ProviderClosed)));
        assert!(engine.find_node("/modules/m/a").is_some());
    }
}
