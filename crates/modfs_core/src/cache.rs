//! Concurrent, memoized node cache keyed by absolute virtual path.

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;

use crate::node::Node;

pub struct NodeCache {
    map: DashMap<String, Node, FxBuildHasher>,
}

impl NodeCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            map: DashMap::with_hasher(FxBuildHasher::default()),
        }
    }

    /// Returns the cached node at `path`, computing and publishing it with
    /// `make` if absent.
    ///
    /// `make` is invoked with no shard lock held. This matters: building a
    /// node (a `/packages/<pkg>` directory's link children, for instance)
    /// can itself look up other paths in this same cache, and holding a
    /// shard lock across that reentrant call would deadlock against a
    /// writer on the same shard. The trade-off is that two racing callers
    /// for the same absent path may both run `make`; only one result is
    /// published; the other is discarded. Node construction is free of
    /// external side effects, so the discard is harmless.
    pub fn get_or_insert_with(&self, path: &str, make: impl FnOnce() -> Node) -> Node {
        if let Some(existing) = self.map.get(path) {
            return existing.clone();
        }
        let computed = make();
        self.map
            .entry(path.to_string())
            .or_insert_with(|| computed.clone())
            .clone()
    }

    /// Like [`Self::get_or_insert_with`], but for lookups that may
    /// legitimately fail to produce a node at all (an absent path).
    /// A `None` result from `make` is never cached, since the provider's
    /// backing content could in principle become available without the
    /// path itself changing identity.
    pub fn get_or_try_insert_with(
        &self,
        path: &str,
        make: impl FnOnce() -> Option<Node>,
    ) -> Option<Node> {
        if let Some(existing) = self.map.get(path) {
            return Some(existing.clone());
        }
        let computed = make()?;
        Some(
            self.map
                .entry(path.to_string())
                .or_insert_with(|| computed.clone())
                .clone(),
        )
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for NodeCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lazy::Lazy;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn second_lookup_does_not_recompute() {
        let cache = NodeCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let make = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Node::directory("/modules", Lazy::ready(Vec::new()))
        };
        let first = cache.get_or_insert_with("/modules", make);
        let second = cache.get_or_insert_with("/modules", || {
            panic!("make must not run on a cache hit")
        });
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reentrant_make_does_not_deadlock() {
        let cache = Arc::new(NodeCache::new());
        let inner = Arc::clone(&cache);
        let node = cache.get_or_insert_with("/packages/p", move || {
            inner.get_or_insert_with("/modules/m", || {
                Node::directory("/modules/m", Lazy::ready(Vec::new()))
            })
        });
        assert_eq!(node.path(), "/modules/m");
        assert_eq!(cache.len(), 2);
    }
}
