//! Engine error types with granular categories

use crate::graph::NodeId;
use crate::value::ValueType;
use std::fmt;
use thiserror::Error;

/// Which side of a node a port index refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSide {
    Input,
    Output,
}

impl fmt::Display for PortSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortSide::Input => write!(f, "input"),
            PortSide::Output => write!(f, "output"),
        }
    }
}

/// Errors raised by graph construction, scheduling, execution and output reads
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GraphError {
    #[error("required argument '{what}' is null")]
    NullArg { what: &'static str },

    #[error("unknown node type '{name}'")]
    UnknownType { name: String },

    #[error("unknown node {id}")]
    UnknownNode { id: NodeId },

    #[error("unknown parameter '{key}' on node {id}")]
    UnknownParam { id: NodeId, key: String },

    #[error("duplicate node id {id}")]
    DuplicateId { id: NodeId },

    #[error("{side} port {port} out of range on node {id} ({count} available)")]
    PortIndexOutOfRange {
        id: NodeId,
        side: PortSide,
        port: i64,
        count: usize,
    },

    #[error("type mismatch: output {from_out} of node {from} is {found}, input {to_in} of node {to} expects {expected}")]
    TypeMismatch {
        from: NodeId,
        from_out: usize,
        found: ValueType,
        to: NodeId,
        to_in: usize,
        expected: ValueType,
    },

    #[error("Cycle detected: {unresolved} node(s) remain with unmet dependencies")]
    CycleDetected { unresolved: usize },

    #[error("dangling edge: node {from} produced no output {port}")]
    DanglingEdge { from: NodeId, port: usize },

    #[error("{type_name} compute failed: {reason}")]
    ComputeFailed { type_name: String, reason: String },

    #[error("output {index} is not computed")]
    NotComputed { index: usize },

    #[error("type mismatch: output {index} is {found}, requested {expected}")]
    PinTypeMismatch {
        index: usize,
        found: ValueType,
        expected: ValueType,
    },

    #[error("output index {index} out of range ({count} pins)")]
    IndexOutOfRange { index: usize, count: usize },
}

/// Errors raised while ingesting an external plan
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("plan syntax error at line {line}: {reason}")]
    Syntax { line: usize, reason: String },

    #[error("unsupported plan version {found} (expected 1)")]
    UnsupportedVersion { found: u64 },

    #[error("invalid parameter '{key}' on node {id}: {reason}")]
    Param {
        id: NodeId,
        key: String,
        reason: String,
    },

    #[error("plan JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_names_the_cycle() {
        let err = GraphError::CycleDetected { unresolved: 2 };
        assert!(err.to_string().contains("Cycle"));
    }

    #[test]
    fn test_compute_message_prefixes_type_name() {
        let err = GraphError::ComputeFailed {
            type_name: "AddNumber".into(),
            reason: "input 0 is not a number".into(),
        };
        assert_eq!(
            err.to_string(),
            "AddNumber compute failed: input 0 is not a number"
        );
    }

    #[test]
    fn test_plan_error_wraps_graph_error() {
        let err = PlanError::from(GraphError::DuplicateId { id: 7 });
        assert_eq!(err.to_string(), "duplicate node id 7");
    }
}
