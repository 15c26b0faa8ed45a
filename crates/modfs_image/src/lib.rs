//! A [`modfs_core::ResourceProvider`] backed by a packed runtime image: a
//! single file holding every module's contents plus base/preview layering
//! metadata, read lazily through a memory mapping.
//!
//! ```text
//! PackedImageProvider::open("image.mfsi")  ->  modfs_core::NodeEngine
//! ```

pub mod builder;
mod container;
mod error;
mod module;
mod provider;

pub use error::ImageError;
pub use provider::PackedImageProvider;
