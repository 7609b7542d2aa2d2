//! # dag-partition — dependency leveling for property graphs
//!
//! Assigns every node reachable from a set of seed nodes an integer level:
//! the length of the longest walk from a seed over one relationship type,
//! bounded by a maximum depth. The levels partition a workflow or build graph
//! into stages that can run one after another.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `StorageBackend` is the contract between the engine and the store
//! 2. **Run-scoped state**: a run keeps its levels in memory and writes them back once
//! 3. **Stamped results**: every written level carries the token of the run that wrote it
//! 4. **Bounded work**: each (node, level) state is expanded at most once, cycles included
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dag_partition::{Graph, NodeId, PropertyMap, StorageBackend, TxMode};
//!
//! # async fn example() -> dag_partition::Result<()> {
//! let graph = Graph::open_memory().await?;
//!
//! let backend = graph.backend();
//! let mut tx = backend.begin_tx(TxMode::ReadWrite).await?;
//! let a = backend.create_node(&mut tx, &["Operation"], PropertyMap::new()).await?;
//! let b = backend.create_node(&mut tx, &["Operation"], PropertyMap::new()).await?;
//! backend.create_relationship(&mut tx, a, b, "HAS_SUCCESSOR", PropertyMap::new()).await?;
//! backend.commit_tx(tx).await?;
//!
//! let result = graph.partition_eager([a], "HAS_SUCCESSOR", 100).await?;
//! assert_eq!(result.max_level, 1);
//! assert_eq!(graph.stamped_level(b, &result.visited_stamp).await?, Some(1));
//! # Ok(())
//! # }
//! ```
//!
//! ## Strategies
//!
//! | Strategy | Procedure | Follows |
//! |----------|-----------|---------|
//! | Mark | `partition.mark` | incoming edges |
//! | Eager | `partition.eager` | outgoing edges |
//! | Lazy | `partition.lazy` | incoming edges, levels inverted |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod partition;
pub mod procedures;
pub mod storage;
pub mod tx;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Node, Relationship, Value, PropertyMap,
    NodeId, RelId, Direction, props,
};

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{StorageBackend, MemoryBackend, ProcedureResult};

// ============================================================================
// Re-exports: Transactions
// ============================================================================

pub use tx::{Transaction, TxMode, TxId};

// ============================================================================
// Re-exports: Partitioning
// ============================================================================

pub use partition::{
    PartitionConfig, PartitionRequest, PartitionResult, PropertyKeys,
    RunIssuer, RunToken, Strategy,
};

use tracing::warn;

// ============================================================================
// Top-level Graph handle
// ============================================================================

/// The primary entry point. A `Graph` wraps a storage backend and runs
/// partitions against it, one transaction per run.
pub struct Graph<B: StorageBackend> {
    backend: B,
    config: PartitionConfig,
    issuer: RunIssuer,
}

impl<B: StorageBackend> Graph<B> {
    /// Create a Graph with the given backend and default configuration.
    pub fn with_backend(backend: B) -> Self {
        Self::with_config(backend, PartitionConfig::default())
    }

    /// Create a Graph with the given backend and configuration.
    pub fn with_config(backend: B, config: PartitionConfig) -> Self {
        let issuer = RunIssuer::new(config.token_prefix.clone());
        Self { backend, config, issuer }
    }

    /// Access the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    /// Run a partition in its own read-write transaction.
    ///
    /// Uses the request's token if it has one, otherwise issues a new one.
    /// The transaction is rolled back if the run fails.
    pub async fn partition(
        &self,
        strategy: Strategy,
        request: PartitionRequest,
    ) -> Result<PartitionResult> {
        let token = match &request.token {
            Some(token) => token.clone(),
            None => self.issuer.issue(),
        };

        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let outcome = partition::run_partition(
            &self.backend, &mut tx, strategy, &request, token, &self.config.keys,
        ).await;

        match outcome {
            Ok(result) => {
                self.backend.commit_tx(tx).await?;
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback) = self.backend.rollback_tx(tx).await {
                    warn!(error = %rollback, "rollback after failed partition failed");
                }
                Err(e)
            }
        }
    }

    /// Levels increase along incoming edges from the seeds.
    pub async fn partition_mark(
        &self,
        seeds: impl IntoIterator<Item = NodeId>,
        rel_type: &str,
        max_depth: u64,
    ) -> Result<PartitionResult> {
        self.partition(Strategy::Mark, PartitionRequest::new(seeds, rel_type, max_depth)).await
    }

    /// Levels increase along outgoing edges from the seeds.
    pub async fn partition_eager(
        &self,
        seeds: impl IntoIterator<Item = NodeId>,
        rel_type: &str,
        max_depth: u64,
    ) -> Result<PartitionResult> {
        self.partition(Strategy::Eager, PartitionRequest::new(seeds, rel_type, max_depth)).await
    }

    /// As [`Graph::partition_mark`], then inverted: the deepest ancestors get
    /// 0 and the seeds get the run's maximum level.
    pub async fn partition_lazy(
        &self,
        seeds: impl IntoIterator<Item = NodeId>,
        rel_type: &str,
        max_depth: u64,
    ) -> Result<PartitionResult> {
        self.partition(Strategy::Lazy, PartitionRequest::new(seeds, rel_type, max_depth)).await
    }

    /// Level written on `node` by run `token`, if the node carries its stamp.
    pub async fn stamped_level(&self, node: NodeId, token: &RunToken) -> Result<Option<u64>> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let level = partition::stamped_level(&self.backend, &tx, &self.config.keys, node, token).await;
        self.backend.commit_tx(tx).await?;
        level
    }

    /// Every node stamped by run `token`, with its level, ordered by id.
    pub async fn stamped_nodes(&self, token: &RunToken) -> Result<Vec<(NodeId, u64)>> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let nodes = partition::stamped_nodes(&self.backend, &tx, &self.config.keys, token).await;
        self.backend.commit_tx(tx).await?;
        nodes
    }

    /// Call a registered procedure by name. See [`procedures`].
    pub async fn call(&self, name: &str, args: Vec<Value>) -> Result<ProcedureResult> {
        procedures::dispatch(self, name, &args).await
    }
}

/// In-memory graph for testing and embedding.
impl Graph<storage::MemoryBackend> {
    pub async fn open_memory() -> Result<Self> {
        let backend = storage::MemoryBackend::new();
        Ok(Self::with_backend(backend))
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Transaction error: {0}")]
    TxError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
