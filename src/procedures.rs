//! Named procedures.
//!
//! Callable via [`crate::Graph::call`] with dynamically typed arguments,
//! mirroring a graph store's `CALL name(args) YIELD cols` extension point.
//!
//! | Procedure | Arguments | Columns |
//! |-----------|-----------|---------|
//! | `partition.mark` | seeds, relationship, depth | `maxLevel`, `visitedStamp` |
//! | `partition.eager` | seeds, relationship, depth | `maxLevel`, `visitedStamp` |
//! | `partition.lazy` | seeds, relationship, depth | `maxLevel`, `visitedStamp` |
//! | `util.join` | strings, delimiter = `","` | `value` |
//! | `util.relationshipTypes` | node | `outgoing`, `incoming` |
//!
//! Seeds and nodes are `Value::Node`s or non-negative `Value::Int` ids.

use std::collections::BTreeSet;

use crate::model::{Direction, NodeId, Value};
use crate::partition::{PartitionRequest, Strategy};
use crate::storage::{ProcedureResult, StorageBackend};
use crate::tx::TxMode;
use crate::{Error, Graph, Result};

// ============================================================================
// Procedure registry
// ============================================================================

/// All registered procedures.
pub static PROCEDURE_NAMES: &[&str] = &[
    "partition.mark",          // Levels along incoming edges
    "partition.eager",         // Levels along outgoing edges
    "partition.lazy",          // Incoming levels, inverted
    "util.join",               // Join strings with a delimiter
    "util.relationshipTypes",  // Distinct relationship types around a node
];

/// Dispatch a procedure call to the appropriate handler.
pub async fn dispatch<B: StorageBackend>(
    graph: &Graph<B>,
    name: &str,
    args: &[Value],
) -> Result<ProcedureResult> {
    match name {
        "partition.mark" => proc_partition(graph, Strategy::Mark, args).await,
        "partition.eager" => proc_partition(graph, Strategy::Eager, args).await,
        "partition.lazy" => proc_partition(graph, Strategy::Lazy, args).await,
        "util.join" => proc_join(args),
        "util.relationshipTypes" => proc_relationship_types(graph, args).await,
        _ => Err(Error::ExecutionError(format!("Unknown procedure: {name}"))),
    }
}

// ============================================================================
// partition.{mark,eager,lazy}(seeds, relationship, depth) → (maxLevel, visitedStamp)
// ============================================================================

async fn proc_partition<B: StorageBackend>(
    graph: &Graph<B>,
    strategy: Strategy,
    args: &[Value],
) -> Result<ProcedureResult> {
    let name = format!("partition.{strategy}");
    let seeds = match args.first() {
        Some(Value::List(items)) => items.iter()
            .map(|v| node_id_arg(&name, v))
            .collect::<Result<Vec<_>>>()?,
        Some(other) => return Err(type_error("LIST", other)),
        None => return Err(missing(&name, "seeds")),
    };
    let rel_type = match args.get(1) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => return Err(type_error("STRING", other)),
        None => return Err(missing(&name, "relationship")),
    };
    let depth = match args.get(2) {
        Some(Value::Int(depth)) => *depth,
        Some(Value::Null) | None => return Err(missing(&name, "depth")),
        Some(other) => return Err(type_error("INTEGER", other)),
    };
    let max_depth = u64::try_from(depth).map_err(|_| {
        Error::InvalidArgument(format!("{name}: depth must not be negative, got {depth}"))
    })?;

    let result = graph.partition(strategy, PartitionRequest::new(seeds, rel_type, max_depth)).await?;
    let max_level = i64::try_from(result.max_level).map_err(|_| {
        Error::ExecutionError(format!("{name}: max level {} out of range", result.max_level))
    })?;

    Ok(ProcedureResult::single(vec![
        ("maxLevel", Value::Int(max_level)),
        ("visitedStamp", Value::from(result.visited_stamp.as_str())),
    ]))
}

// ============================================================================
// util.join(strings, delimiter = ",") → value
// ============================================================================

fn proc_join(args: &[Value]) -> Result<ProcedureResult> {
    let strings = match args.first() {
        Some(Value::List(items)) => Some(items),
        Some(Value::Null) => None,
        Some(other) => return Err(type_error("LIST", other)),
        None => return Err(missing("util.join", "strings")),
    };
    let delimiter = match args.get(1) {
        None => Some(","),
        Some(Value::String(s)) => Some(s.as_str()),
        Some(Value::Null) => None,
        Some(other) => return Err(type_error("STRING", other)),
    };

    let value = match (strings, delimiter) {
        (Some(items), Some(delimiter)) => {
            let parts = items.iter()
                .map(|v| v.as_str().ok_or_else(|| type_error("STRING", v)))
                .collect::<Result<Vec<_>>>()?;
            Value::String(parts.join(delimiter))
        }
        _ => Value::Null,
    };

    Ok(ProcedureResult::single(vec![("value", value)]))
}

// ============================================================================
// util.relationshipTypes(node) → (outgoing, incoming)
// ============================================================================

async fn proc_relationship_types<B: StorageBackend>(
    graph: &Graph<B>,
    args: &[Value],
) -> Result<ProcedureResult> {
    let node = match args.first() {
        Some(v) => node_id_arg("util.relationshipTypes", v)?,
        None => return Err(missing("util.relationshipTypes", "node")),
    };

    let backend = graph.backend();
    let tx = backend.begin_tx(TxMode::ReadOnly).await?;
    if !backend.node_exists(&tx, node).await? {
        backend.rollback_tx(tx).await?;
        return Err(Error::InvalidArgument(format!("util.relationshipTypes: node {node} does not exist")));
    }
    let outgoing = distinct_types(backend.get_relationships(&tx, node, Direction::Outgoing, None).await?);
    let incoming = distinct_types(backend.get_relationships(&tx, node, Direction::Incoming, None).await?);
    backend.commit_tx(tx).await?;

    Ok(ProcedureResult::single(vec![
        ("outgoing", Value::from(outgoing)),
        ("incoming", Value::from(incoming)),
    ]))
}

fn distinct_types(rels: Vec<crate::model::Relationship>) -> Vec<String> {
    rels.into_iter()
        .map(|r| r.rel_type)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// ============================================================================
// Argument helpers
// ============================================================================

fn node_id_arg(procedure: &str, value: &Value) -> Result<NodeId> {
    value.as_node_id().ok_or_else(|| {
        Error::InvalidArgument(format!("{procedure}: expected a node or node id, got {value}"))
    })
}

fn missing(procedure: &str, arg: &str) -> Error {
    Error::InvalidArgument(format!("{procedure}: missing argument '{arg}'"))
}

fn type_error(expected: &str, got: &Value) -> Error {
    Error::TypeError {
        expected: expected.into(),
        got: got.type_name().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(args: Vec<Value>) -> Value {
        proc_join(&args).unwrap().first("value").cloned().unwrap()
    }

    #[test]
    fn test_join_default_delimiter() {
        assert_eq!(join(vec![Value::from(vec!["a", "b", "c"])]), Value::from("a,b,c"));
    }

    #[test]
    fn test_join_custom_delimiter() {
        assert_eq!(join(vec![Value::from(vec!["a", "b"]), Value::from(" | ")]), Value::from("a | b"));
        assert_eq!(join(vec![Value::List(vec![]), Value::from("-")]), Value::from(""));
    }

    #[test]
    fn test_join_null_arguments() {
        assert_eq!(join(vec![Value::Null]), Value::Null);
        assert_eq!(join(vec![Value::from(vec!["a"]), Value::Null]), Value::Null);
    }

    #[test]
    fn test_join_rejects_non_strings() {
        let err = proc_join(&[Value::from(vec![1i64, 2])]).unwrap_err();
        assert!(matches!(err, Error::TypeError { .. }));
    }

    #[test]
    fn test_distinct_types_sorted() {
        use crate::model::{RelId, Relationship};
        let rels = vec![
            Relationship::new(RelId(1), NodeId(1), NodeId(2), "READS"),
            Relationship::new(RelId(2), NodeId(1), NodeId(3), "HAS_SUCCESSOR"),
            Relationship::new(RelId(3), NodeId(1), NodeId(4), "READS"),
        ];
        assert_eq!(distinct_types(rels), vec!["HAS_SUCCESSOR", "READS"]);
    }
}
