//! Cascade core library
//!
//! A typed dataflow execution engine: a fixed catalog of node types, graphs
//! of typed ports built incrementally through validated operations, schedule
//! analysis (cycle detection, input binding, derived control edges) and
//! parallel execution with conditional branch gating. The modules expose a
//! fully typed API; the companion `cascade-ffi` crate wraps it in a stable
//! C handle boundary.

pub mod config;
pub mod describe;
pub mod errors;
mod executor;
pub mod graph;
pub mod plan;
pub mod registry;
pub mod schedule;
pub mod value;

// Re-export the canonical engine interface
pub use config::ExecutorConfig;
pub use errors::{GraphError, PlanError, Result};
pub use graph::{DataEdge, Graph, Node, NodeExecutionState, NodeId, OutputPin};
pub use plan::Plan;
pub use registry::{NodeType, NodeTypeRegistry, ParamSpec};
pub use value::{Value, ValueType};
