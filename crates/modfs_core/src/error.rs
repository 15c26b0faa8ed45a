use std::sync::Arc;

/// Errors surfaced from the virtual node engine.
///
/// Lookups never fail with an I/O error — at most they return `None` from
/// [`crate::engine::NodeEngine::find_node`]. This type is only ever produced
/// by [`crate::node::Node::content`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The underlying resource provider failed to read file content.
    #[error("I/O error reading virtual file content: {0}")]
    IoFailure(Arc<std::io::Error>),

    /// The resource provider backing this node has been closed.
    #[error("resource provider is closed")]
    ProviderClosed,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoFailure(Arc::new(err))
    }
}
