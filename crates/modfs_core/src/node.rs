//! The closed set of virtual filesystem node kinds.

use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::lazy::Lazy;

/// A node in the virtual hierarchy: a directory, a regular file, or a
/// symbolic link. Identity and equality are by path alone.
#[derive(Clone)]
pub enum Node {
    Directory(Arc<DirectoryNode>),
    File(Arc<FileNode>),
    Link(Arc<LinkNode>),
}

pub struct DirectoryNode {
    pub(crate) path: Arc<str>,
    pub(crate) children: Lazy<Vec<Node>>,
}

pub struct FileNode {
    pub(crate) path: Arc<str>,
    pub(crate) content: Lazy<Result<Vec<u8>, Error>>,
}

pub struct LinkNode {
    pub(crate) path: Arc<str>,
    pub(crate) target: Lazy<Node>,
}

impl Node {
    #[must_use]
    pub fn directory(path: impl Into<Arc<str>>, children: Lazy<Vec<Node>>) -> Self {
        Node::Directory(Arc::new(DirectoryNode {
            path: path.into(),
            children,
        }))
    }

    #[must_use]
    pub fn file(path: impl Into<Arc<str>>, content: Lazy<Result<Vec<u8>, Error>>) -> Self {
        Node::File(Arc::new(FileNode {
            path: path.into(),
            content,
        }))
    }

    #[must_use]
    pub fn link(path: impl Into<Arc<str>>, target: Lazy<Node>) -> Self {
        Node::Link(Arc::new(LinkNode {
            path: path.into(),
            target,
        }))
    }

    /// The absolute virtual path identifying this node.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Node::Directory(d) => &d.path,
            Node::File(f) => &f.path,
            Node::Link(l) => &l.path,
        }
    }

    #[must_use]
    pub fn is_directory(&self) -> bool {
        matches!(self, Node::Directory(_))
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        matches!(self, Node::File(_))
    }

    #[must_use]
    pub fn is_link(&self) -> bool {
        matches!(self, Node::Link(_))
    }

    /// Returns this directory's children.
    ///
    /// # Panics
    /// Panics if called on a `File` or `Link` node. This is a programmer
    /// error, not a lookup failure: callers must check [`Self::is_directory`]
    /// first.
    #[must_use]
    pub fn children(&self) -> Vec<Node> {
        match self {
            Node::Directory(d) => (*d.children.get()).clone(),
            Node::File(_) | Node::Link(_) => {
                panic!("Node::children called on a non-directory: {}", self.path())
            }
        }
    }

    /// Returns file content.
    ///
    /// # Errors
    /// Propagates whatever error the backing provider's content producer
    /// returned, including after the provider has since been closed.
    ///
    /// # Panics
    /// Panics if called on a `Directory` or `Link` node. This is a
    /// programmer error, not a lookup failure: callers must check
    /// [`Self::is_file`] first.
    pub fn content(&self) -> Result<Vec<u8>, Error> {
        match self {
            Node::File(f) => (*f.content.get()).clone(),
            Node::Directory(_) | Node::Link(_) => {
                panic!("Node::content called on a non-file: {}", self.path())
            }
        }
    }

    /// Follows a link to its target. `recursive` is accepted for parity with
    /// the external API's `resolveLink(recursive)` contract, but has no
    /// observable effect here: a link in this design targets only
    /// `/modules/<mod>`, which is never itself a link, so one hop already
    /// reaches a terminal node regardless of `recursive`.
    ///
    /// Returns `self` unchanged for a non-link.
    #[must_use]
    pub fn resolve_link(&self, recursive: bool) -> Node {
        let _ = recursive;
        match self {
            Node::Link(l) => (*l.target.get()).clone(),
            Node::Directory(_) | Node::File(_) => self.clone(),
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.path() == other.path()
    }
}

impl Eq for Node {}

impl std::hash::Hash for Node {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.path().hash(state);
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Node::Directory(_) => "Directory",
            Node::File(_) => "File",
            Node::Link(_) => "Link",
        };
        f.debug_struct("Node")
            .field("kind", &kind)
            .field("path", &self.path())
            .finish()
    }
}
