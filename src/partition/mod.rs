//! # Partitioning
//!
//! Assigns dependency levels to the nodes reachable from a set of seeds.
//!
//! | Strategy | Direction | Seeds | Far nodes |
//! |----------|-----------|-------|-----------|
//! | `Mark`   | incoming  | 0     | high      |
//! | `Eager`  | outgoing  | 0     | high      |
//! | `Lazy`   | incoming, then inverted | high | 0 |
//!
//! A run mints one [`RunToken`], propagates levels from every seed at
//! level 0 (see [`propagate`]), inverts them for the lazy strategy (see
//! [`invert`]), and finally writes `level` and the `visited` / `inverted`
//! stamps onto every node it reached.
//!
//! Given `A -[:HAS_SUCCESSOR]-> B -[:HAS_SUCCESSOR]-> C`:
//!
//! ```text
//! eager from A:  A=0 B=1 C=2
//! mark  from C:  C=0 B=1 A=2
//! lazy  from C:  C=2 B=1 A=0
//! ```

pub mod config;
pub mod invert;
pub mod propagate;
pub mod run;
pub mod state;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::{Direction, NodeId};
use crate::storage::StorageBackend;
use crate::tx::Transaction;
use crate::{Error, Result};

pub use config::{PartitionConfig, PropertyKeys};
pub use invert::invert;
pub use propagate::Propagation;
pub use run::{RunIssuer, RunToken};
pub use state::{Adjacency, Assignment, LevelEntry, Neighbors, RunState};

// ============================================================================
// Strategy
// ============================================================================

/// Which partitioning to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Follow incoming edges; predecessors get increasing levels.
    Mark,
    /// Follow outgoing edges; successors get increasing levels.
    Eager,
    /// As `Mark`, then invert so the nodes furthest from the seeds are 0.
    Lazy,
}

impl Strategy {
    pub fn direction(self) -> Direction {
        match self {
            Strategy::Mark | Strategy::Lazy => Direction::Incoming,
            Strategy::Eager => Direction::Outgoing,
        }
    }

    pub fn inverts(self) -> bool {
        self == Strategy::Lazy
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Mark => write!(f, "mark"),
            Strategy::Eager => write!(f, "eager"),
            Strategy::Lazy => write!(f, "lazy"),
        }
    }
}

// ============================================================================
// Request / result
// ============================================================================

/// Input of a partition run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRequest {
    pub seeds: Vec<NodeId>,
    /// Only edges with exactly this type are followed.
    pub rel_type: String,
    /// Highest level that may be assigned.
    pub max_depth: u64,
    /// Use this token instead of issuing one.
    #[serde(default)]
    pub token: Option<RunToken>,
}

impl PartitionRequest {
    pub fn new(
        seeds: impl IntoIterator<Item = NodeId>,
        rel_type: impl Into<String>,
        max_depth: u64,
    ) -> Self {
        Self {
            seeds: seeds.into_iter().collect(),
            rel_type: rel_type.into(),
            max_depth,
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<RunToken>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.rel_type.is_empty() {
            return Err(Error::InvalidArgument("relationship type must not be empty".into()));
        }
        if self.token.as_ref().is_some_and(RunToken::is_empty) {
            return Err(Error::InvalidArgument("run token must not be empty".into()));
        }
        Ok(())
    }
}

/// Output of a partition run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionResult {
    /// Highest level assigned in the run (before inversion for `Lazy`).
    pub max_level: u64,
    /// Token written as the `visited` stamp of every reached node.
    pub visited_stamp: RunToken,
    /// Number of nodes that received a level.
    pub nodes_visited: usize,
}

// ============================================================================
// Run
// ============================================================================

/// Run one partition inside a caller-managed read-write transaction.
///
/// Every seed must exist. Nothing is written until all passes have finished,
/// so a failing traversal leaves the store untouched.
pub async fn run_partition<B: StorageBackend>(
    backend: &B,
    tx: &mut B::Tx,
    strategy: Strategy,
    request: &PartitionRequest,
    token: RunToken,
    keys: &PropertyKeys,
) -> Result<PartitionResult> {
    request.validate()?;
    if token.is_empty() {
        return Err(Error::InvalidArgument("run token must not be empty".into()));
    }
    if !tx.is_writable() {
        return Err(Error::TxError(format!("{strategy} partition needs a read-write transaction")));
    }
    for &seed in &request.seeds {
        if !backend.node_exists(tx, seed).await? {
            return Err(Error::InvalidArgument(format!("seed node {seed} does not exist")));
        }
    }

    info!(
        run = %token, %strategy, seeds = request.seeds.len(), rel_type = %request.rel_type,
        max_depth = request.max_depth, "starting partition"
    );

    let (state, max_level) = {
        let adjacency = Adjacency::new(backend, &*tx, &request.rel_type);
        let state = RunState::new(token.clone());
        let mut propagation = Propagation::new(adjacency, state, request.max_depth, strategy.direction());

        let mut max_level = 0;
        for &seed in &request.seeds {
            max_level = max_level.max(propagation.propagate(seed, 0).await?);
        }
        debug!(
            run = %token, max_level, states = propagation.expanded(),
            nodes = propagation.state().touched(), "propagation finished"
        );

        let (mut adjacency, mut state) = propagation.finish();
        debug!(run = %token, lists = adjacency.fetched(), "neighbour lists fetched");
        if strategy.inverts() {
            let mut inverted = 0;
            for &seed in &request.seeds {
                inverted += invert(&mut adjacency, &mut state, seed, &token, max_level).await?;
            }
            debug!(run = %token, inverted, "inversion finished");
        }
        (state, max_level)
    };

    let nodes_visited = state.flush(backend, tx, keys).await?;

    info!(run = %token, %strategy, max_level, nodes_visited, "finished partition");
    Ok(PartitionResult {
        max_level,
        visited_stamp: token,
        nodes_visited,
    })
}

// ============================================================================
// Reading stamped results back
// ============================================================================

/// Level stored on `node` by the run `token`; `None` if the node does not
/// carry that run's stamp.
pub async fn stamped_level<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    keys: &PropertyKeys,
    node: NodeId,
    token: &RunToken,
) -> Result<Option<u64>> {
    let node = backend.get_node(tx, node).await?
        .ok_or_else(|| Error::NotFound(format!("Node {node}")))?;
    if node.get_str(&keys.visited) != Some(token.as_str()) {
        return Ok(None);
    }
    Ok(node.get_int(&keys.level).and_then(|l| u64::try_from(l).ok()))
}

/// All nodes carrying the `visited` stamp of run `token`, with their levels.
pub async fn stamped_nodes<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    keys: &PropertyKeys,
    token: &RunToken,
) -> Result<Vec<(NodeId, u64)>> {
    let nodes = backend.all_nodes(tx).await?;
    let mut stamped: Vec<(NodeId, u64)> = nodes.iter()
        .filter(|n| n.get_str(&keys.visited) == Some(token.as_str()))
        .filter_map(|n| {
            let level = n.get_int(&keys.level).and_then(|l| u64::try_from(l).ok())?;
            Some((n.id, level))
        })
        .collect();
    stamped.sort_unstable_by_key(|(id, _)| *id);
    Ok(stamped)
}
