//! Errors surfaced while opening or reading a packed runtime image.

use std::sync::Arc;

/// Failure modes specific to the packed-image container format and the
/// scoped file/mmap handle it owns.
///
/// [`modfs_core::Error`] is the error type the engine and its nodes traffic
/// in; this type converts into it at the [`crate::PackedImageProvider`]
/// boundary (see [`From`] below), so callers going through `modfs_core`
/// never need to know this type exists.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ImageError {
    /// Opening, mapping, or reading the underlying image file failed.
    #[error("I/O error on packed image: {0}")]
    Io(Arc<std::io::Error>),

    /// The image's header, string table, or location table failed a
    /// structural check (bad magic, truncated table, offset out of range).
    #[error("malformed packed image: {0}")]
    Corrupt(String),

    /// An operation was attempted after [`crate::PackedImageProvider::close`].
    #[error("packed image provider has been closed")]
    Closed,
}

impl From<std::io::Error> for ImageError {
    fn from(err: std::io::Error) -> Self {
        ImageError::Io(Arc::new(err))
    }
}

impl From<ImageError> for modfs_core::Error {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::Io(e) => modfs_core::Error::IoFailure(e),
            ImageError::Corrupt(msg) => {
                modfs_core::Error::IoFailure(Arc::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    msg,
                )))
            }
            ImageError::Closed => modfs_core::Error::ProviderClosed,
        }
    }
}
