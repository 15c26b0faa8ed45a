//! Constructs an in-memory packed image.
//!
//! The virtual node engine this workspace builds is read-only by design
//! (spec non-goal), so this builder is not part of that read path at all —
//! it exists to produce fixtures for [`crate::container`] and
//! [`crate::provider`] tests (and would back a real packing tool, the way
//! `red_knot_vendored`'s `build.rs` produces its zip ahead of time) without
//! needing an actual runtime image file on disk.

use std::collections::{BTreeMap, BTreeSet};

use crate::container::{ByteOrder, HEADER_LEN, MAGIC, NO_EXTENSION};

enum ContentSpec {
    File(Vec<u8>),
    Dir(Vec<u32>),
}

struct RawLocation {
    module_offset: u32,
    parent_offset: u32,
    base_offset: u32,
    ext_offset: u32,
    content: ContentSpec,
}

struct StringTable {
    bytes: Vec<u8>,
    offsets: BTreeMap<String, u32>,
}

impl StringTable {
    fn new() -> Self {
        let mut table = Self {
            bytes: Vec::new(),
            offsets: BTreeMap::new(),
        };
        table.intern("");
        table
    }

    fn intern(&mut self, s: &str) -> u32 {
        if let Some(&offset) = self.offsets.get(s) {
            return offset;
        }
        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        self.offsets.insert(s.to_string(), offset);
        offset
    }
}

/// Builds a packed image byte buffer from a set of per-module files.
///
/// Internally every entry is addressed by an absolute-ish container path
/// (`"modules/<mod>/<rest>"` or `"packages/<dotted>"`) to keep the two
/// subtrees from ever colliding in the location index; [`crate::provider`]
/// translates to and from `modfs_core`'s module-relative resource paths at
/// the boundary.
pub struct ImageBuilder {
    byte_order: ByteOrder,
    modules: BTreeSet<String>,
    dirs: BTreeMap<String, BTreeSet<String>>,
    files: BTreeMap<String, Vec<u8>>,
}

impl ImageBuilder {
    #[must_use]
    pub fn new() -> Self {
        let mut dirs = BTreeMap::new();
        dirs.insert("modules".to_string(), BTreeSet::new());
        dirs.insert("packages".to_string(), BTreeSet::new());
        Self {
            byte_order: ByteOrder::Little,
            modules: BTreeSet::new(),
            dirs,
            files: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn big_endian(mut self) -> Self {
        self.byte_order = ByteOrder::Big;
        self
    }

    /// Ensures `module` exists, even if it never gets a file of its own.
    pub fn add_module(&mut self, module: &str) -> &mut Self {
        self.ensure_module(module);
        self
    }

    /// Adds a file at `rel_path` (e.g. `"java/lang/Object.class"`, or
    /// `"META-INF/preview/java/lang/Record.class"` for preview content)
    /// within `module`, creating every intermediate directory along the way.
    pub fn add_file(&mut self, module: &str, rel_path: &str, content: Vec<u8>) -> &mut Self {
        self.ensure_module(module);
        let full = format!("modules/{module}/{rel_path}");
        self.register_ancestors(&full);
        self.files.insert(full, content);
        self
    }

    fn ensure_module(&mut self, module: &str) {
        if self.modules.insert(module.to_string()) {
            let path = format!("modules/{module}");
            self.dirs.entry(path.clone()).or_default();
            self.dirs.get_mut("modules").unwrap().insert(path);
        }
    }

    fn register_ancestors(&mut self, full_path: &str) {
        let parts: Vec<&str> = full_path.split('/').collect();
        for i in 1..parts.len() {
            let parent = parts[..i].join("/");
            let child = parts[..=i].join("/");
            self.dirs.entry(parent).or_default().insert(child);
        }
    }

    /// Every non-`META-INF` directory under a module, at any depth, is
    /// considered a package that module contributes in the base layer —
    /// mirroring [`crate::provider::PackedImageProvider::package_exists`]'s
    /// own directory-probe definition of package existence. Returns the
    /// dotted package name mapped to every module contributing to it.
    ///
    /// Preview-only packages are deliberately not folded in here: they are
    /// discovered by [`crate::module::Module`] walking the preview subtree
    /// at lookup time, since a preview package can have no base counterpart
    /// to derive it from at build time.
    fn derive_base_packages(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut out: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for path in self.dirs.keys() {
            let segments: Vec<&str> = path.split('/').collect();
            if segments.len() >= 3 && segments[0] == "modules" && segments[2] != "META-INF" {
                let dotted = segments[2..].join(".");
                out.entry(dotted).or_default().insert(segments[1].to_string());
            }
        }
        out
    }

    /// Serializes the accumulated tree into a packed image byte buffer.
    ///
    /// Every base package gets one pseudo-directory marker per contributing
    /// module at `packages/<dotted>/<module>`, so [`crate::provider`] can
    /// answer `package_exists`/`modules_for_package` for the base layer by
    /// probing [`crate::container::Container`] directly.
    #[must_use]
    pub fn build(mut self) -> Vec<u8> {
        for (dotted, modules) in self.derive_base_packages() {
            for module in modules {
                let marker = format!("packages/{dotted}/{module}");
                self.register_ancestors(&marker);
                self.dirs.entry(marker).or_default();
            }
        }
        self.assemble()
    }

    fn assemble(self) -> Vec<u8> {
        let byte_order = self.byte_order;
        let mut strings = StringTable::new();
        let modules_pseudo_offset = strings.intern("modules");

        let mut all_paths: Vec<String> = self
            .dirs
            .keys()
            .cloned()
            .chain(self.files.keys().cloned())
            .collect();
        all_paths.sort();
        let index_of: BTreeMap<String, u32> = all_paths
            .iter()
            .enumerate()
            .map(|(i, p)| (p.clone(), i as u32))
            .collect();
        let modules_root_index = index_of["modules"];
        let packages_root_index = index_of["packages"];

        let mut raws = Vec::with_capacity(all_paths.len());
        for path in &all_paths {
            let (parent, leaf) = match path.rsplit_once('/') {
                Some((p, l)) => (p.to_string(), l.to_string()),
                None => (String::new(), path.clone()),
            };
            if let Some(children) = self.dirs.get(path) {
                let parent_offset = strings.intern(&parent);
                let base_offset = strings.intern(&leaf);
                let child_indices = children.iter().map(|c| index_of[c]).collect();
                raws.push(RawLocation {
                    module_offset: modules_pseudo_offset,
                    parent_offset,
                    base_offset,
                    ext_offset: NO_EXTENSION,
                    content: ContentSpec::Dir(child_indices),
                });
            } else {
                let content = self.files.get(path).cloned().unwrap();
                let segments: Vec<&str> = path.split('/').collect();
                let module_name = segments.get(1).copied().unwrap_or("");
                let module_offset = strings.intern(module_name);
                let parent_offset = strings.intern(&parent);
                let (base, ext) = match leaf.rsplit_once('.') {
                    Some((b, e)) if !b.is_empty() => (b.to_string(), Some(e.to_string())),
                    _ => (leaf.clone(), None),
                };
                let base_offset = strings.intern(&base);
                let ext_offset = ext.as_deref().map_or(NO_EXTENSION, |e| strings.intern(e));
                raws.push(RawLocation {
                    module_offset,
                    parent_offset,
                    base_offset,
                    ext_offset,
                    content: ContentSpec::File(content),
                });
            }
        }

        let mut content_blob = Vec::new();
        let mut location_table = Vec::new();
        for raw in &raws {
            let (content_offset, content_len) = match &raw.content {
                ContentSpec::File(bytes) => {
                    let offset = content_blob.len() as u32;
                    content_blob.extend_from_slice(bytes);
                    (offset, bytes.len() as u32)
                }
                ContentSpec::Dir(children) => {
                    let offset = content_blob.len() as u32;
                    for &child in children {
                        content_blob.extend_from_slice(&byte_order.write_u32(child));
                    }
                    (offset, (children.len() * 4) as u32)
                }
            };
            location_table.extend_from_slice(&byte_order.write_u32(raw.module_offset));
            location_table.extend_from_slice(&byte_order.write_u32(raw.parent_offset));
            location_table.extend_from_slice(&byte_order.write_u32(raw.base_offset));
            location_table.extend_from_slice(&byte_order.write_u32(raw.ext_offset));
            location_table.extend_from_slice(&byte_order.write_u32(content_offset));
            location_table.extend_from_slice(&byte_order.write_u32(content_len));
        }

        let string_table_offset = HEADER_LEN as u32;
        let string_table_len = strings.bytes.len() as u32;
        let location_table_offset = string_table_offset + string_table_len;
        let location_table_len = location_table.len() as u32;
        let content_blob_offset = location_table_offset + location_table_len;

        let mut out = Vec::with_capacity(content_blob_offset as usize + content_blob.len());
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&1u16.to_le_bytes());
        out.push(match byte_order {
            ByteOrder::Little => 0,
            ByteOrder::Big => 1,
        });
        out.push(0);
        out.extend_from_slice(&byte_order.write_u32(raws.len() as u32));
        out.extend_from_slice(&byte_order.write_u32(string_table_offset));
        out.extend_from_slice(&byte_order.write_u32(string_table_len));
        out.extend_from_slice(&byte_order.write_u32(location_table_offset));
        out.extend_from_slice(&byte_order.write_u32(content_blob_offset));
        out.extend_from_slice(&byte_order.write_u32(modules_pseudo_offset));
        out.extend_from_slice(&byte_order.write_u32(modules_root_index));
        out.extend_from_slice(&byte_order.write_u32(packages_root_index));
        out.extend_from_slice(&strings.bytes);
        out.extend_from_slice(&location_table);
        out.extend_from_slice(&content_blob);
        out
    }
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Container;

    #[test]
    fn empty_image_has_both_roots() {
        let container = Container::from_bytes(ImageBuilder::new().build()).unwrap();
        assert!(container.location(container.modules_root_index()).is_directory);
        assert!(container.location(container.packages_root_index()).is_directory);
    }

    #[test]
    fn derives_base_packages_and_their_contributing_modules() {
        let mut builder = ImageBuilder::new();
        builder.add_file("m", "java/lang/Object.class", b"x".to_vec());
        builder.add_file("m", "META-INF/preview/java/util/List.class", b"y".to_vec());
        let packages = builder.derive_base_packages();
        assert_eq!(packages.get("java.lang").unwrap(), &BTreeSet::from(["m".to_string()]));
        assert!(packages.contains_key("java"));
        assert!(!packages.keys().any(|p| p.starts_with("META-INF")));
    }

    #[test]
    fn build_emits_package_module_markers_in_the_container() {
        let mut builder = ImageBuilder::new();
        builder.add_file("m", "java/lang/Object.class", b"x".to_vec());
        builder.add_file("other", "java/lang/Thread.class", b"y".to_vec());
        let container = Container::from_bytes(builder.build()).unwrap();
        assert!(container.find("packages/java.lang/m").is_some());
        assert!(container.find("packages/java.lang/other").is_some());
        assert!(container.find("packages/java.lang/missing").is_none());
    }

    #[test]
    fn big_endian_round_trips() {
        let mut builder = ImageBuilder::new().big_endian();
        builder.add_file("m", "a/B", b"content".to_vec());
        let container = Container::from_bytes(builder.build()).unwrap();
        let loc = container.find("modules/m/a/B").unwrap();
        assert_eq!(container.file_bytes(loc.index).unwrap(), b"content");
    }
}
