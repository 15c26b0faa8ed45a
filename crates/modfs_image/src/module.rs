//! Per-module lazy discovery of preview-only package names.

use std::sync::Arc;

use modfs_core::lazy::Lazy;
use rustc_hash::FxHashSet;

use crate::container::Container;

const PREVIEW_DIR: &str = "META-INF/preview";

/// A module's preview-package set, computed once by walking
/// `<module>/META-INF/preview` and memoized thereafter.
///
/// Base-layer package membership is baked into the container at build time
/// (see [`crate::builder::ImageBuilder`]), but a preview subtree can name a
/// package with no base counterpart at all, so it has to be discovered by
/// walking the tree rather than looked up in that build-time index.
pub(crate) struct Module {
    name: Arc<str>,
    preview_packages: Lazy<FxHashSet<String>>,
}

impl Module {
    pub(crate) fn new(name: impl Into<Arc<str>>, container: Arc<Container>) -> Self {
        let name = name.into();
        let name_for_walk = Arc::clone(&name);
        Self {
            name,
            preview_packages: Lazy::new(move || walk_preview_packages(&container, &name_for_walk)),
        }
    }

    #[must_use]
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Every dotted package name this module contributes via its preview
    /// subtree, including ones with no base-layer counterpart.
    pub(crate) fn preview_package_names(&self) -> Arc<FxHashSet<String>> {
        self.preview_packages.get()
    }
}

fn walk_preview_packages(container: &Container, module: &str) -> FxHashSet<String> {
    let mut out = FxHashSet::default();
    let root = format!("modules/{module}/{PREVIEW_DIR}");
    let Some(loc) = container.find(&root) else {
        return out;
    };
    if !loc.is_directory {
        return out;
    }
    walk_dir(container, loc.index, &[], &mut out);
    out
}

fn walk_dir(container: &Container, index: u32, prefix: &[String], out: &mut FxHashSet<String>) {
    let Ok(children) = container.children_indices(index) else {
        return;
    };
    for child_index in children {
        let loc = container.location(child_index);
        if !loc.is_directory {
            continue;
        }
        let name = loc
            .resource_path
            .rsplit('/')
            .next()
            .unwrap_or(&loc.resource_path)
            .to_string();
        let mut segments = prefix.to_vec();
        segments.push(name);
        out.insert(segments.join("."));
        walk_dir(container, child_index, &segments, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ImageBuilder;

    #[test]
    fn walks_nested_preview_packages() {
        let mut builder = ImageBuilder::new();
        builder.add_file("m", "META-INF/preview/java/util/Record.class", vec![1]);
        let container = Arc::new(Container::from_bytes(builder.build()).unwrap());
        let module = Module::new("m", Arc::clone(&container));
        let names = module.preview_package_names();
        assert!(names.contains("java"));
        assert!(names.contains("java.util"));
    }

    #[test]
    fn module_without_preview_subtree_has_no_preview_packages() {
        let mut builder = ImageBuilder::new();
        builder.add_file("m", "java/lang/Object.class", vec![1]);
        let container = Arc::new(Container::from_bytes(builder.build()).unwrap());
        let module = Module::new("m", container);
        assert!(module.preview_package_names().is_empty());
    }
}
