//! Level propagation.
//!
//! Assigns every node reachable from a seed the length of the longest walk
//! (over edges of one type, in one direction) that reaches it from a seed
//! without exceeding `max_depth`.
//!
//! The traversal is a depth-first walk over *states* `(node, level)`. A node
//! reached again over a longer walk is expanded again at the new level, so
//! longer walks propagate through subtrees that were already visited. A
//! state is expanded at most once per run: its subtree maximum is memoised
//! and reused on every later arrival. Level grows by one along every edge,
//! so no state can reach itself and the walk terminates on cyclic graphs.
//! At most `nodes × (max_depth + 1)` states exist.
//!
//! ```text
//!   A ──▶ B ──▶ D        eager from A:  A=0  B=1  C=1  D=2
//!   └───▶ C ──▶┘         (D keeps the longer of its two arrivals)
//! ```

use hashbrown::HashMap;
use tracing::trace;

use crate::model::{Direction, NodeId};
use crate::storage::StorageBackend;
use crate::Result;

use super::state::{Adjacency, Neighbors, RunState};

struct Frame {
    node: NodeId,
    level: u64,
    neighbors: Neighbors,
    cursor: usize,
    sub_level: u64,
}

/// One run's propagation pass.
pub struct Propagation<'a, B: StorageBackend> {
    adjacency: Adjacency<'a, B>,
    state: RunState,
    max_depth: u64,
    direction: Direction,
    /// Subtree maximum of every expanded state.
    memo: HashMap<(NodeId, u64), u64>,
}

impl<'a, B: StorageBackend> Propagation<'a, B> {
    pub fn new(adjacency: Adjacency<'a, B>, state: RunState, max_depth: u64, direction: Direction) -> Self {
        Self {
            adjacency,
            state,
            max_depth,
            direction,
            memo: HashMap::new(),
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Number of distinct states expanded so far.
    pub fn expanded(&self) -> usize {
        self.memo.len()
    }

    pub fn finish(self) -> (Adjacency<'a, B>, RunState) {
        (self.adjacency, self.state)
    }

    /// Assign `level` to `node` and propagate `level + 1` to its
    /// neighbours. Returns the highest level reached in the subtree.
    ///
    /// Levels beyond `max_depth` are not assigned; such an arrival reports
    /// `max_depth`.
    pub async fn propagate(&mut self, node: NodeId, level: u64) -> Result<u64> {
        if level > self.max_depth {
            return Ok(self.max_depth);
        }
        if let Some(&sub_level) = self.memo.get(&(node, level)) {
            self.state.assign(node, level);
            return Ok(sub_level);
        }

        let mut result = level;
        let mut stack = vec![self.enter(node, level).await?];

        while let Some(frame) = stack.last_mut() {
            if let Some(&next) = frame.neighbors.get(frame.cursor) {
                frame.cursor += 1;
                let next_level = frame.level + 1;
                if next_level > self.max_depth {
                    frame.sub_level = frame.sub_level.max(self.max_depth);
                    continue;
                }
                if let Some(&sub_level) = self.memo.get(&(next, next_level)) {
                    frame.sub_level = frame.sub_level.max(sub_level);
                    continue;
                }
                let child = self.enter(next, next_level).await?;
                stack.push(child);
            } else if let Some(done) = stack.pop() {
                self.memo.insert((done.node, done.level), done.sub_level);
                match stack.last_mut() {
                    Some(parent) => parent.sub_level = parent.sub_level.max(done.sub_level),
                    None => result = done.sub_level,
                }
            }
        }

        Ok(result)
    }

    async fn enter(&mut self, node: NodeId, level: u64) -> Result<Frame> {
        let assignment = self.state.assign(node, level);
        trace!(run = %self.state.token(), %node, level, ?assignment, "visiting node");
        let neighbors = self.adjacency.neighbors(node, self.direction).await?;
        Ok(Frame {
            node,
            level,
            neighbors,
            cursor: 0,
            sub_level: level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertyMap;
    use crate::partition::RunToken;
    use crate::storage::MemoryBackend;
    use crate::tx::TxMode;

    async fn graph(edges: &[(usize, usize)], nodes: usize) -> (MemoryBackend, Vec<NodeId>) {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let mut ids = Vec::new();
        for _ in 0..nodes {
            ids.push(db.create_node(&mut tx, &["Operation"], PropertyMap::new()).await.unwrap());
        }
        for &(a, b) in edges {
            db.create_relationship(&mut tx, ids[a], ids[b], "HAS_SUCCESSOR", PropertyMap::new()).await.unwrap();
        }
        db.commit_tx(tx).await.unwrap();
        (db, ids)
    }

    #[tokio::test]
    async fn test_diamond_takes_longest_arrival() {
        // 0→1→3, 0→2→3, plus a shortcut 0→3
        let (db, ids) = graph(&[(0, 1), (1, 3), (0, 2), (2, 3), (0, 3)], 4).await;
        let tx = db.begin_tx(TxMode::ReadOnly).await.unwrap();

        let adjacency = Adjacency::new(&db, &tx, "HAS_SUCCESSOR");
        let mut p = Propagation::new(adjacency, RunState::new(RunToken::new("t")), 10, Direction::Outgoing);
        let max = p.propagate(ids[0], 0).await.unwrap();

        assert_eq!(max, 2);
        assert_eq!(p.state().level(ids[3]), Some(2));
        assert_eq!(p.state().level(ids[1]), Some(1));
    }

    #[tokio::test]
    async fn test_clamp_reports_max_depth() {
        let (db, ids) = graph(&[(0, 1), (1, 2), (2, 3)], 4).await;
        let tx = db.begin_tx(TxMode::ReadOnly).await.unwrap();

        let adjacency = Adjacency::new(&db, &tx, "HAS_SUCCESSOR");
        let mut p = Propagation::new(adjacency, RunState::new(RunToken::new("t")), 1, Direction::Outgoing);

        assert_eq!(p.propagate(ids[0], 0).await.unwrap(), 1);
        assert_eq!(p.state().touched(), 2);
        assert_eq!(p.state().level(ids[2]), None);

        // Arriving above the bound touches nothing.
        assert_eq!(p.propagate(ids[3], 2).await.unwrap(), 1);
        assert_eq!(p.state().level(ids[3]), None);
    }

    #[tokio::test]
    async fn test_cycle_terminates_at_depth() {
        // 0→1→2→0
        let (db, ids) = graph(&[(0, 1), (1, 2), (2, 0)], 3).await;
        let tx = db.begin_tx(TxMode::ReadOnly).await.unwrap();

        let adjacency = Adjacency::new(&db, &tx, "HAS_SUCCESSOR");
        let mut p = Propagation::new(adjacency, RunState::new(RunToken::new("t")), 7, Direction::Outgoing);
        let max = p.propagate(ids[0], 0).await.unwrap();

        assert_eq!(max, 7);
        // Walk lengths ≤ 7: node 0 at 6, node 1 at 7, node 2 at 5.
        assert_eq!(p.state().level(ids[0]), Some(6));
        assert_eq!(p.state().level(ids[1]), Some(7));
        assert_eq!(p.state().level(ids[2]), Some(5));
        assert_eq!(p.expanded(), 8);
    }

    #[tokio::test]
    async fn test_memoised_state_reused_across_seeds() {
        // Two seeds share the tail 2→3.
        let (db, ids) = graph(&[(0, 2), (1, 2), (2, 3)], 4).await;
        let tx = db.begin_tx(TxMode::ReadOnly).await.unwrap();

        let adjacency = Adjacency::new(&db, &tx, "HAS_SUCCESSOR");
        let mut p = Propagation::new(adjacency, RunState::new(RunToken::new("t")), 5, Direction::Outgoing);

        assert_eq!(p.propagate(ids[0], 0).await.unwrap(), 2);
        let expanded = p.expanded();
        assert_eq!(p.propagate(ids[1], 0).await.unwrap(), 2);
        // Only seed 1 itself is new; (2, 1) and (3, 2) were memoised.
        assert_eq!(p.expanded(), expanded + 1);

        let (adjacency, _) = p.finish();
        assert_eq!(adjacency.fetched(), 4);
    }
}
