//! Lazy inversion pass.
//!
//! Turns levels measured from the seeds into levels measured from the far
//! end of the explored subgraph: `level = max_level - level`. Runs over
//! incoming edges from the seeds after propagation has finished, and
//! rewrites each node at most once per token.

use tracing::trace;

use crate::model::{Direction, NodeId};
use crate::storage::StorageBackend;
use crate::Result;

use super::run::RunToken;
use super::state::{Adjacency, RunState};

/// Invert every node reachable from `node` over incoming edges that has not
/// been inverted by `token` yet. Returns the number of nodes inverted.
///
/// Nodes the propagation pass never reached (beyond the depth bound) hold
/// no level for this run; they are neither inverted nor walked through.
pub async fn invert<B: StorageBackend>(
    adjacency: &mut Adjacency<'_, B>,
    state: &mut RunState,
    node: NodeId,
    token: &RunToken,
    max_level: u64,
) -> Result<usize> {
    let mut inverted = 0;
    let mut pending = vec![node];

    while let Some(current) = pending.pop() {
        if state.is_inverted_by(current, token) {
            continue;
        }
        let Some(level) = state.invert(current, token, max_level)? else {
            trace!(run = %token, node = %current, "not reached by propagation, skipping");
            continue;
        };
        trace!(run = %token, node = %current, level, "inverted level");
        inverted += 1;

        for next in adjacency.neighbors(current, Direction::Incoming).await? {
            if !state.is_inverted_by(next, token) {
                pending.push(next);
            }
        }
    }

    Ok(inverted)
}
