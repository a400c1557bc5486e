//! Graph data structures and the incremental builder
//!
//! A graph is built one operation at a time (add node, set parameter,
//! connect, designate output pin), each validated against the registry and
//! prior state. `run` hands the committed graph to the schedule analyzer and
//! the parallel executor.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::ExecutorConfig;
use crate::errors::{GraphError, PortSide, Result};
use crate::executor;
use crate::registry::{NodeType, NodeTypeRegistry};
use crate::value::{Value, ValueType};

/// Caller-assigned node identifier, unique within a graph
pub type NodeId = i32;

/// Per-run lifecycle of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeExecutionState {
    Pending,
    Active,
    Skipped,
    Completed,
}

/// A node instance in the graph
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub ty: &'static NodeType,
    pub name: Option<String>,
    pub params: HashMap<String, Value>,
    pub input_values: Vec<Value>,
    pub output_values: Vec<Value>,
}

impl Node {
    fn new(id: NodeId, ty: &'static NodeType, name: Option<&str>) -> Self {
        Self {
            id,
            ty,
            name: name.map(str::to_string),
            params: HashMap::new(),
            // Pre-seeded so an isolated node can still compute.
            input_values: ty.inputs.iter().map(|tag| Value::zero(*tag)).collect(),
            output_values: Vec::new(),
        }
    }

    pub fn input(&self, idx: usize) -> Option<&Value> {
        self.input_values.get(idx)
    }

    pub fn input_number(&self, idx: usize) -> std::result::Result<f64, String> {
        self.input(idx)
            .and_then(Value::as_number)
            .ok_or_else(|| format!("input {idx} is not a number"))
    }

    pub fn input_str(&self, idx: usize) -> std::result::Result<&str, String> {
        self.input(idx)
            .and_then(Value::as_str)
            .ok_or_else(|| format!("input {idx} is not a string"))
    }

    pub fn input_bool(&self, idx: usize) -> std::result::Result<bool, String> {
        self.input(idx)
            .and_then(Value::as_bool)
            .ok_or_else(|| format!("input {idx} is not a bool"))
    }

    /// Read a number parameter, falling back to the declared default when the
    /// key is absent or carries a mismatched tag
    pub fn number_param(&self, key: &str) -> f64 {
        match self.params.get(key) {
            Some(Value::Number(v)) => *v,
            _ => match self.ty.param_default(key) {
                Some(Value::Number(v)) => *v,
                _ => 0.0,
            },
        }
    }

    pub fn string_param(&self, key: &str) -> String {
        match self.params.get(key) {
            Some(Value::String(v)) => v.clone(),
            _ => match self.ty.param_default(key) {
                Some(Value::String(v)) => v.clone(),
                _ => String::new(),
            },
        }
    }

    pub fn bool_param(&self, key: &str) -> bool {
        match self.params.get(key) {
            Some(Value::Bool(v)) => *v,
            _ => match self.ty.param_default(key) {
                Some(Value::Bool(v)) => *v,
                _ => false,
            },
        }
    }
}

/// Typed connection from an output port to an input port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataEdge {
    pub from: NodeId,
    pub from_out: usize,
    pub to: NodeId,
    pub to_in: usize,
}

/// Externally observable output: the position in the pin list is the index
/// callers pass to `get_output_*`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputPin {
    pub node: NodeId,
    pub output: usize,
}

/// A committed dataflow graph
#[derive(Debug, Default)]
pub struct Graph {
    pub(crate) nodes: HashMap<NodeId, Node>,
    pub(crate) edges: Vec<DataEdge>,
    pub(crate) outputs: Vec<OutputPin>,
    pub(crate) states: HashMap<NodeId, NodeExecutionState>,
    pub(crate) last_error: Option<String>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node of a known type under a caller-chosen id
    pub fn add_node(&mut self, id: NodeId, type_name: &str, label: Option<&str>) -> Result<()> {
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateId { id });
        }
        let ty = NodeTypeRegistry::global()
            .lookup(type_name)
            .ok_or_else(|| GraphError::UnknownType {
                name: type_name.to_string(),
            })?;
        self.nodes.insert(id, Node::new(id, ty, label));
        Ok(())
    }

    /// Upsert a parameter. No schema check happens here: unknown keys are
    /// tolerated and mismatched tags are ignored by compute, which reads only
    /// the keys it knows.
    pub fn set_param(&mut self, id: NodeId, key: &str, value: Value) -> Result<()> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(GraphError::UnknownNode { id })?;
        node.params.insert(key.to_string(), value);
        Ok(())
    }

    /// Append a data edge after validating both endpoints
    ///
    /// An edge leaving a conditional node is a control edge; its tags are not
    /// required to match since its payload is the branch signal, not data.
    pub fn connect(
        &mut self,
        from: NodeId,
        from_out: usize,
        to: NodeId,
        to_in: usize,
    ) -> Result<()> {
        let source = self
            .nodes
            .get(&from)
            .ok_or(GraphError::UnknownNode { id: from })?;
        let target = self
            .nodes
            .get(&to)
            .ok_or(GraphError::UnknownNode { id: to })?;

        if from_out >= source.ty.outputs.len() {
            return Err(GraphError::PortIndexOutOfRange {
                id: from,
                side: PortSide::Output,
                port: from_out as i64,
                count: source.ty.outputs.len(),
            });
        }
        if to_in >= target.ty.inputs.len() {
            return Err(GraphError::PortIndexOutOfRange {
                id: to,
                side: PortSide::Input,
                port: to_in as i64,
                count: target.ty.inputs.len(),
            });
        }

        let found = source.ty.outputs[from_out];
        let expected = target.ty.inputs[to_in];
        if !source.ty.is_conditional() && !found.is_compatible_with(&expected) {
            return Err(GraphError::TypeMismatch {
                from,
                from_out,
                found,
                to,
                to_in,
                expected,
            });
        }

        self.edges.push(DataEdge {
            from,
            from_out,
            to,
            to_in,
        });
        Ok(())
    }

    /// Designate an externally observable pin
    pub fn add_output(&mut self, id: NodeId, out_idx: usize) -> Result<()> {
        let node = self.nodes.get(&id).ok_or(GraphError::UnknownNode { id })?;
        if out_idx >= node.ty.outputs.len() {
            return Err(GraphError::PortIndexOutOfRange {
                id,
                side: PortSide::Output,
                port: out_idx as i64,
                count: node.ty.outputs.len(),
            });
        }
        self.outputs.push(OutputPin {
            node: id,
            output: out_idx,
        });
        Ok(())
    }

    /// Execute the graph on the process-wide pool
    pub fn run(&mut self) -> Result<()> {
        self.run_with(&ExecutorConfig::default())
    }

    /// Execute the graph with explicit executor settings
    pub fn run_with(&mut self, config: &ExecutorConfig) -> Result<()> {
        debug!(
            "running graph: {} node(s), {} edge(s), {} pin(s)",
            self.nodes.len(),
            self.edges.len(),
            self.outputs.len()
        );
        match executor::run(self, config) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub fn get_output_count(&self) -> usize {
        self.outputs.len()
    }

    pub fn output_pin(&self, index: usize) -> Result<OutputPin> {
        self.outputs
            .get(index)
            .copied()
            .ok_or(GraphError::IndexOutOfRange {
                index,
                count: self.outputs.len(),
            })
    }

    pub fn get_output_type(&self, index: usize) -> Result<ValueType> {
        let pin = self.output_pin(index)?;
        let node = self
            .nodes
            .get(&pin.node)
            .ok_or(GraphError::UnknownNode { id: pin.node })?;
        Ok(node.ty.outputs[pin.output])
    }

    /// Read the value behind a pin whose producer completed the last run
    pub fn get_output_value(&self, index: usize) -> Result<&Value> {
        let pin = self.output_pin(index)?;
        if self.states.get(&pin.node) != Some(&NodeExecutionState::Completed) {
            return Err(GraphError::NotComputed { index });
        }
        let node = self
            .nodes
            .get(&pin.node)
            .ok_or(GraphError::UnknownNode { id: pin.node })?;
        node.output_values
            .get(pin.output)
            .ok_or(GraphError::NotComputed { index })
    }

    pub fn get_output_number(&self, index: usize) -> Result<f64> {
        let value = self.get_output_value(index)?;
        value.as_number().ok_or(GraphError::PinTypeMismatch {
            index,
            found: value.value_type(),
            expected: ValueType::Number,
        })
    }

    pub fn get_output_string(&self, index: usize) -> Result<&str> {
        let value = self.get_output_value(index)?;
        value.as_str().ok_or(GraphError::PinTypeMismatch {
            index,
            found: value.value_type(),
            expected: ValueType::String,
        })
    }

    pub fn get_output_bool(&self, index: usize) -> Result<bool> {
        let value = self.get_output_value(index)?;
        value.as_bool().ok_or(GraphError::PinTypeMismatch {
            index,
            found: value.value_type(),
            expected: ValueType::Bool,
        })
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges(&self) -> &[DataEdge] {
        &self.edges
    }

    pub fn output_pins(&self) -> &[OutputPin] {
        &self.outputs
    }

    /// Lifecycle the node reached in the last run, if any run happened
    pub fn node_state(&self, id: NodeId) -> Option<NodeExecutionState> {
        self.states.get(&id).copied()
    }

    /// Message recorded by the most recent failing operation on this graph
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
