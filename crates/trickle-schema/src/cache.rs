//! Memoization of resolution results.
//!
//! The cache is threaded through [`crate::from_json_ast`] by value:
//! callers keep the returned cache and pass it back in on the next
//! resolution. Entries are tagged with the node version they were
//! computed at, so a change anywhere in a subtree (which bumps every
//! ancestor's version) naturally invalidates exactly the entries that
//! could have changed.

use std::collections::{HashMap, HashSet};

use trickle_parse::NodeId;

use crate::resolve::Resolution;
use crate::types::SchemaId;

#[derive(Debug, Clone)]
struct Entry {
    result: Resolution,
    version: u64,
}

/// Memoized resolution results, keyed by `(schema, node)`.
#[derive(Debug, Clone, Default)]
pub struct ResolutionCache {
    entries: HashMap<(SchemaId, NodeId), Entry>,
    /// Alternatives of an `any_of` schema that have been ruled out for a
    /// node. Unlike `entries` this survives version changes: once a
    /// document fragment has disqualified an alternative, no further
    /// input can requalify it.
    pruned: HashMap<(SchemaId, NodeId), HashSet<usize>>,
}

impl ResolutionCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of memoized results, mostly useful in tests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no memoized results.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn lookup(
        &self,
        schema: SchemaId,
        node: NodeId,
        version: u64,
    ) -> Option<Resolution> {
        let entry = self.entries.get(&(schema, node))?;
        (entry.version == version).then(|| entry.result.clone())
    }

    pub(crate) fn store(
        &mut self,
        schema: SchemaId,
        node: NodeId,
        version: u64,
        result: Resolution,
    ) {
        self.entries.insert((schema, node), Entry { result, version });
    }

    pub(crate) fn is_pruned(&self, schema: SchemaId, node: NodeId, option: usize) -> bool {
        self.pruned
            .get(&(schema, node))
            .is_some_and(|set| set.contains(&option))
    }

    pub(crate) fn prune(&mut self, schema: SchemaId, node: NodeId, option: usize) {
        self.pruned.entry((schema, node)).or_default().insert(option);
    }
}
