//! Per-run state.
//!
//! A run never reads stamps back from the store while it traverses. Levels,
//! "touched in this run" and "inverted by token" live in a [`RunState`]
//! owned by the run and are written to the store once, by
//! [`RunState::flush`], after every pass has finished.

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use smallvec::SmallVec;
use tracing::debug;

use crate::model::{Direction, NodeId, Value};
use crate::storage::StorageBackend;
use crate::{Error, Result};

use super::config::PropertyKeys;
use super::run::RunToken;

/// Neighbours of one node over the run's relationship type.
pub type Neighbors = SmallVec<[NodeId; 4]>;

// ============================================================================
// Adjacency
// ============================================================================

/// Read-through cache of typed neighbour lists for one run.
///
/// Each (node, direction) pair is fetched from the backend at most once.
pub struct Adjacency<'a, B: StorageBackend> {
    backend: &'a B,
    tx: &'a B::Tx,
    rel_type: &'a str,
    cache: HashMap<(NodeId, Direction), Neighbors>,
}

impl<'a, B: StorageBackend> Adjacency<'a, B> {
    pub fn new(backend: &'a B, tx: &'a B::Tx, rel_type: &'a str) -> Self {
        Self {
            backend,
            tx,
            rel_type,
            cache: HashMap::new(),
        }
    }

    /// Nodes one `rel_type` edge away from `node` in direction `dir`,
    /// one entry per edge.
    pub async fn neighbors(&mut self, node: NodeId, dir: Direction) -> Result<Neighbors> {
        if let Some(cached) = self.cache.get(&(node, dir)) {
            return Ok(cached.clone());
        }
        let rels = self.backend
            .get_relationships(self.tx, node, dir, Some(self.rel_type))
            .await?;
        let neighbors: Neighbors = rels.iter()
            .filter_map(|rel| rel.neighbor(node, dir))
            .collect();
        self.cache.insert((node, dir), neighbors.clone());
        Ok(neighbors)
    }

    /// Number of distinct neighbour lists fetched from the backend.
    pub fn fetched(&self) -> usize {
        self.cache.len()
    }
}

// ============================================================================
// RunState
// ============================================================================

/// What a node holds within one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelEntry {
    pub level: u64,
    /// Token of the inversion pass that last rewrote `level`, if any.
    pub inverted: Option<RunToken>,
}

/// Outcome of [`RunState::assign`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// First visit in this run; level set.
    Touched,
    /// Already visited with a lower level; level raised.
    Raised,
    /// Already visited with an equal or higher level; unchanged.
    Kept,
}

/// Levels assigned during one run, keyed by node.
#[derive(Debug, Clone)]
pub struct RunState {
    token: RunToken,
    entries: HashMap<NodeId, LevelEntry>,
    /// First-touch order, so flushes are deterministic.
    order: Vec<NodeId>,
}

impl RunState {
    pub fn new(token: RunToken) -> Self {
        Self {
            token,
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn token(&self) -> &RunToken {
        &self.token
    }

    /// Merge `level` into the node's entry, keeping the larger value.
    pub fn assign(&mut self, node: NodeId, level: u64) -> Assignment {
        match self.entries.entry(node) {
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                if entry.level < level {
                    entry.level = level;
                    Assignment::Raised
                } else {
                    Assignment::Kept
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(LevelEntry { level, inverted: None });
                self.order.push(node);
                Assignment::Touched
            }
        }
    }

    /// Level of a node touched in this run.
    pub fn level(&self, node: NodeId) -> Option<u64> {
        self.entries.get(&node).map(|e| e.level)
    }

    pub fn is_inverted_by(&self, node: NodeId, token: &RunToken) -> bool {
        self.entries.get(&node)
            .and_then(|e| e.inverted.as_ref())
            .is_some_and(|t| t == token)
    }

    /// Rewrite the node's level as `max_level - level` and stamp it with
    /// `token`. Returns the new level, or `None` if the node was never
    /// touched in this run.
    pub fn invert(&mut self, node: NodeId, token: &RunToken, max_level: u64) -> Result<Option<u64>> {
        let Some(entry) = self.entries.get_mut(&node) else {
            return Ok(None);
        };
        let inverted = max_level.checked_sub(entry.level).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "max level {max_level} is below level {} of node {node}",
                entry.level,
            ))
        })?;
        entry.level = inverted;
        entry.inverted = Some(token.clone());
        Ok(Some(inverted))
    }

    /// Number of nodes touched in this run.
    pub fn touched(&self) -> usize {
        self.entries.len()
    }

    /// Write level, visited stamp and (if set) inverted stamp of every
    /// touched node. Returns the number of nodes written.
    pub async fn flush<B: StorageBackend>(
        &self,
        backend: &B,
        tx: &mut B::Tx,
        keys: &PropertyKeys,
    ) -> Result<usize> {
        let visited = Value::from(self.token.as_str());
        for id in &self.order {
            let Some(entry) = self.entries.get(id) else { continue };
            let level = i64::try_from(entry.level).map_err(|_| {
                Error::StorageError(format!("level {} of node {id} does not fit an integer property", entry.level))
            })?;
            backend.set_node_property(tx, *id, &keys.level, Value::Int(level)).await?;
            backend.set_node_property(tx, *id, &keys.visited, visited.clone()).await?;
            if let Some(token) = &entry.inverted {
                backend.set_node_property(tx, *id, &keys.inverted, Value::from(token.as_str())).await?;
            }
        }
        debug!(run = %self.token, nodes = self.order.len(), "flushed run state");
        Ok(self.order.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_keeps_longest() {
        let mut state = RunState::new(RunToken::new("r1"));
        let n = NodeId(1);

        assert_eq!(state.assign(n, 1), Assignment::Touched);
        assert_eq!(state.assign(n, 3), Assignment::Raised);
        assert_eq!(state.assign(n, 2), Assignment::Kept);
        assert_eq!(state.assign(n, 3), Assignment::Kept);
        assert_eq!(state.level(n), Some(3));
        assert_eq!(state.touched(), 1);
    }

    #[test]
    fn test_invert_once_per_token() {
        let mut state = RunState::new(RunToken::new("r1"));
        let t1 = RunToken::new("r1");
        let t2 = RunToken::new("r2");
        state.assign(NodeId(1), 1);

        assert_eq!(state.invert(NodeId(1), &t1, 4).unwrap(), Some(3));
        assert!(state.is_inverted_by(NodeId(1), &t1));
        assert!(!state.is_inverted_by(NodeId(1), &t2));

        // A different token inverts back.
        assert_eq!(state.invert(NodeId(1), &t2, 4).unwrap(), Some(1));
        assert!(state.is_inverted_by(NodeId(1), &t2));
    }

    #[test]
    fn test_invert_untouched_is_none() {
        let mut state = RunState::new(RunToken::new("r1"));
        assert_eq!(state.invert(NodeId(5), &RunToken::new("r1"), 2).unwrap(), None);
    }

    #[test]
    fn test_invert_rejects_low_max_level() {
        let mut state = RunState::new(RunToken::new("r1"));
        state.assign(NodeId(1), 5);
        let err = state.invert(NodeId(1), &RunToken::new("r1"), 2).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_levels_in_first_touch_order() {
        let mut state = RunState::new(RunToken::new("r1"));
        state.assign(NodeId(9), 0);
        state.assign(NodeId(2), 1);
        state.assign(NodeId(9), 2);

        assert_eq!(state.order, vec![NodeId(9), NodeId(2)]);
        assert_eq!(state.level(NodeId(9)), Some(2));
        assert_eq!(state.level(NodeId(2)), Some(1));
    }
}
