//! The byte-level packed-image container: header, string table, and
//! location table. This is the narrow, low-level reader the rest of the
//! crate is built on — it understands offsets and endianness, nothing
//! about `/modules` vs `/packages` semantics or preview layering. Those
//! live in [`crate::provider`].
//!
//! Format (all multi-byte integers in the header's declared byte order):
//!
//! ```text
//! header (40 bytes)
//!   magic[4] = b"MFSI"
//!   version: u16
//!   byte_order: u8     (0 = little-endian, 1 = big-endian)
//!   _pad: u8
//!   location_count: u32
//!   string_table_offset: u32
//!   string_table_len: u32
//!   location_table_offset: u32
//!   content_blob_offset: u32
//!   modules_pseudo_offset: u32   (string-table offset of the literal "modules")
//!   modules_root_index: u32
//!   packages_root_index: u32
//! string table: NUL-terminated UTF-8 strings, offset-addressed
//! location table: `location_count` fixed 24-byte records
//!   module_offset: u32  (== modules_pseudo_offset for a pseudo-directory)
//!   parent_offset: u32  (resource path of the parent; "" at the string
//!                        table's zero offset for a top-level entry)
//!   base_offset: u32
//!   ext_offset: u32     (u32::MAX means "no extension")
//!   content_offset: u32 (into the content blob)
//!   content_len: u32    (byte length of file content, or of a directory's
//!                        u32 child-index array)
//! content blob: raw file bytes and u32 child-index arrays
//! ```

use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use memmap2::Mmap;
use rustc_hash::FxHashMap;

use crate::error::ImageError;

pub const MAGIC: [u8; 4] = *b"MFSI";
pub const HEADER_LEN: usize = 40;
pub const LOCATION_LEN: usize = 24;
pub const NO_EXTENSION: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn read_u32(self, bytes: &[u8]) -> u32 {
        let arr: [u8; 4] = bytes[..4].try_into().expect("4-byte slice");
        match self {
            ByteOrder::Little => u32::from_le_bytes(arr),
            ByteOrder::Big => u32::from_be_bytes(arr),
        }
    }

    pub(crate) fn write_u32(self, value: u32) -> [u8; 4] {
        match self {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        }
    }
}

struct Header {
    byte_order: ByteOrder,
    location_count: u32,
    string_table_offset: u32,
    string_table_len: u32,
    location_table_offset: u32,
    content_blob_offset: u32,
    modules_pseudo_offset: u32,
    modules_root_index: u32,
    packages_root_index: u32,
}

impl Header {
    fn parse(bytes: &[u8]) -> Result<Self, ImageError> {
        if bytes.len() < HEADER_LEN {
            return Err(ImageError::Corrupt("file shorter than header".into()));
        }
        if bytes[0..4] != MAGIC {
            return Err(ImageError::Corrupt("bad magic".into()));
        }
        let byte_order = match bytes[6] {
            0 => ByteOrder::Little,
            1 => ByteOrder::Big,
            other => return Err(ImageError::Corrupt(format!("bad byte-order tag {other}"))),
        };
        let word = |at: usize| byte_order.read_u32(&bytes[at..at + 4]);
        Ok(Header {
            byte_order,
            location_count: word(8),
            string_table_offset: word(12),
            string_table_len: word(16),
            location_table_offset: word(20),
            content_blob_offset: word(24),
            modules_pseudo_offset: word(28),
            modules_root_index: word(32),
            packages_root_index: word(36),
        })
    }
}

/// A single resolved entry: a file or a pseudo-directory, keyed by its
/// container path. Every entry lives under an explicit `"modules/"` or
/// `"packages/"` prefix (e.g. `"modules/java.base/java/lang/Object.class"`)
/// so the two subtrees can never collide in [`Container::find`]'s shared
/// index; [`crate::provider`] strips the prefix back off at the boundary
/// with [`modfs_core`].
#[derive(Debug, Clone)]
pub struct Location {
    pub index: u32,
    pub resource_path: Arc<str>,
    pub is_directory: bool,
    content_offset: u32,
    content_len: u32,
}

enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Backing {
    fn as_slice(&self) -> &[u8] {
        match self {
            Backing::Mapped(m) => m,
            Backing::Owned(v) => v,
        }
    }
}

/// An opened packed image: the raw bytes (mapped or owned), its parsed
/// header, and an eagerly-built path index over the (small, metadata-only)
/// location table. File content itself is never copied eagerly — it is
/// sliced out of the backing bytes on demand, so a memory-mapped image pays
/// for content only as pages are actually touched.
pub struct Container {
    backing: Backing,
    header: Header,
    locations: Vec<Location>,
    by_path: FxHashMap<Arc<str>, u32>,
    closed: AtomicBool,
}

impl Container {
    /// Opens and memory-maps the image file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        let file = File::open(path)?;
        // Safety: the mapping is read-only and scoped to this `Container`;
        // the caller is responsible for not mutating the backing file out
        // from under a long-lived mapping, same caveat as any mmap use.
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_backing(Backing::Mapped(mmap))
    }

    /// Parses an already-in-memory image, e.g. one produced by
    /// [`crate::builder::ImageBuilder`] for tests.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ImageError> {
        Self::from_backing(Backing::Owned(bytes))
    }

    fn from_backing(backing: Backing) -> Result<Self, ImageError> {
        let header = Header::parse(backing.as_slice())?;
        let mut container = Container {
            backing,
            header,
            locations: Vec::new(),
            by_path: FxHashMap::default(),
            closed: AtomicBool::new(false),
        };
        container.locations = container.parse_locations()?;
        for loc in &container.locations {
            container
                .by_path
                .insert(Arc::clone(&loc.resource_path), loc.index);
        }
        Ok(container)
    }

    fn read_str(&self, offset: u32) -> Result<&str, ImageError> {
        let bytes = self.backing.as_slice();
        let table_start = self.header.string_table_offset as usize;
        let table_end = table_start + self.header.string_table_len as usize;
        let start = table_start + offset as usize;
        if start > table_end || table_end > bytes.len() {
            return Err(ImageError::Corrupt("string offset out of range".into()));
        }
        let rel_end = bytes[start..table_end]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| ImageError::Corrupt("unterminated string".into()))?;
        std::str::from_utf8(&bytes[start..start + rel_end])
            .map_err(|_| ImageError::Corrupt("string table is not valid UTF-8".into()))
    }

    fn parse_locations(&self) -> Result<Vec<Location>, ImageError> {
        let bytes = self.backing.as_slice();
        let base = self.header.location_table_offset as usize;
        let mut out = Vec::with_capacity(self.header.location_count as usize);
        for i in 0..self.header.location_count {
            let start = base + i as usize * LOCATION_LEN;
            let end = start + LOCATION_LEN;
            if end > bytes.len() {
                return Err(ImageError::Corrupt("location table truncated".into()));
            }
            let word = |off: usize| self.header.byte_order.read_u32(&bytes[start + off..start + off + 4]);
            let module_offset = word(0);
            let parent_offset = word(4);
            let base_offset = word(8);
            let ext_offset = word(12);
            let content_offset = word(16);
            let content_len = word(20);

            let is_directory = module_offset == self.header.modules_pseudo_offset;
            let parent = self.read_str(parent_offset)?;
            let name = self.read_str(base_offset)?;
            let resource_path = if ext_offset == NO_EXTENSION {
                join(parent, name)
            } else {
                let ext = self.read_str(ext_offset)?;
                if ext.is_empty() {
                    join(parent, name)
                } else {
                    join(parent, &format!("{name}.{ext}"))
                }
            };
            out.push(Location {
                index: i,
                resource_path: Arc::from(resource_path),
                is_directory,
                content_offset,
                content_len,
            });
        }
        Ok(out)
    }

    #[must_use]
    pub fn location(&self, index: u32) -> &Location {
        &self.locations[index as usize]
    }

    #[must_use]
    pub fn modules_root_index(&self) -> u32 {
        self.header.modules_root_index
    }

    #[must_use]
    pub fn packages_root_index(&self) -> u32 {
        self.header.packages_root_index
    }

    /// Finds the location whose resource path is exactly `path`, if any.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&Location> {
        self.by_path.get(path).map(|&i| &self.locations[i as usize])
    }

    /// The immediate child indices of the directory at `index`, in the
    /// order stored in the image (callers sort by name themselves).
    pub fn children_indices(&self, index: u32) -> Result<Vec<u32>, ImageError> {
        let loc = self.location(index);
        if !loc.is_directory {
            return Err(ImageError::Corrupt(format!(
                "{} is not a directory entry",
                loc.resource_path
            )));
        }
        let bytes = self.backing.as_slice();
        let start = self.header.content_blob_offset as usize + loc.content_offset as usize;
        let len = loc.content_len as usize;
        if len % 4 != 0 {
            return Err(ImageError::Corrupt("child offset array misaligned".into()));
        }
        let end = start + len;
        let slice = bytes
            .get(start..end)
            .ok_or_else(|| ImageError::Corrupt("child offset array out of range".into()))?;
        Ok(slice
            .chunks_exact(4)
            .map(|chunk| self.header.byte_order.read_u32(chunk))
            .collect())
    }

    /// Reads the raw content of the file at `index`.
    ///
    /// Fails with [`ImageError::Closed`] once [`Self::close`] has been
    /// called. Structural operations (`find`, `children_indices`) stay
    /// total regardless of closed state: per the engine's contract, only
    /// content reads are allowed to surface an I/O error, and memory safety
    /// doesn't depend on it either, since the backing bytes stay mapped for
    /// as long as any `Arc<Container>` (including ones captured by a file
    /// node's content closure) is still alive.
    pub fn file_bytes(&self, index: u32) -> Result<Vec<u8>, ImageError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ImageError::Closed);
        }
        let loc = self.location(index);
        if loc.is_directory {
            return Err(ImageError::Corrupt(format!(
                "{} is a directory, not a file",
                loc.resource_path
            )));
        }
        let bytes = self.backing.as_slice();
        let start = self.header.content_blob_offset as usize + loc.content_offset as usize;
        let end = start + loc.content_len as usize;
        bytes
            .get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| ImageError::Corrupt("file content out of range".into()))
    }

    /// Marks this container closed. Idempotent; safe to call more than once.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ImageBuilder;

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = ImageBuilder::new().build();
        bytes[0] = b'X';
        assert!(matches!(
            Container::from_bytes(bytes),
            Err(ImageError::Corrupt(_))
        ));
    }

    #[test]
    fn round_trips_a_minimal_module() {
        let mut builder = ImageBuilder::new();
        builder.add_file("m", "java/lang/Object.class", b"hello".to_vec());
        let container = Container::from_bytes(builder.build()).unwrap();

        let loc = container.find("modules/m/java/lang/Object.class").unwrap();
        assert!(!loc.is_directory);
        assert_eq!(container.file_bytes(loc.index).unwrap(), b"hello");

        let dir = container.find("modules/m/java/lang").unwrap();
        assert!(dir.is_directory);
        let children = container.children_indices(dir.index).unwrap();
        assert_eq!(children.len(), 1);
    }
}
