//! Core types for a read-only, hierarchical virtual filesystem over a
//! pluggable resource backend: a `/modules` tree mirroring a packed
//! runtime image's module layout, and a `/packages` tree synthesizing
//! package-to-module membership as symbolic links into `/modules`.
//!
//! This crate defines the node model, the concurrent memoizing cache, the
//! [`provider::ResourceProvider`] contract a concrete backend implements,
//! and the [`engine::NodeEngine`] that ties them together. A concrete
//! packed-image backend lives in a separate crate.

pub mod cache;
pub mod engine;
pub mod error;
pub mod lazy;
pub mod name;
pub mod node;
pub mod path;
pub mod provider;

pub use engine::NodeEngine;
pub use error::Error;
pub use node::Node;
pub use provider::{NodeFactory, ResourceProvider};
