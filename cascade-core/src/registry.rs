//! Immutable catalog of node types
//!
//! The catalog is built once per process on first use; afterwards every
//! lookup is a contention-free read. Node instances borrow their `NodeType`
//! directly from here, so signatures live for the whole process.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

use crate::graph::Node;
use crate::value::{Value, ValueType};

/// Type name whose outgoing edges double as control edges
pub const CONDITIONAL_TYPE: &str = "If";

/// Compute function of a node type
///
/// Receives the node with its input vector and parameter map already filled
/// and returns one value per declared output, or a failure reason. Compute
/// must not touch graph structure.
pub type ComputeFn = fn(&Node) -> std::result::Result<Vec<Value>, String>;

/// Declaration of a single named parameter
#[derive(Debug, Clone, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub default: Value,
    pub description: &'static str,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<&'static str>>,
}

impl ParamSpec {
    pub fn number(name: &'static str, default: f64, description: &'static str) -> Self {
        Self {
            name,
            value_type: ValueType::Number,
            default: Value::Number(default),
            description,
            allowed: None,
        }
    }

    pub fn string(name: &'static str, default: &'static str, description: &'static str) -> Self {
        Self {
            name,
            value_type: ValueType::String,
            default: Value::String(default.to_string()),
            description,
            allowed: None,
        }
    }

    pub fn boolean(name: &'static str, default: bool, description: &'static str) -> Self {
        Self {
            name,
            value_type: ValueType::Bool,
            default: Value::Bool(default),
            description,
            allowed: None,
        }
    }

    /// Restrict a string parameter to an enumeration of literals
    pub fn with_allowed(mut self, allowed: &[&'static str]) -> Self {
        debug_assert_eq!(self.value_type, ValueType::String);
        debug_assert!(!allowed.is_empty());
        debug_assert!(matches!(
            &self.default,
            Value::String(d) if d.is_empty() || allowed.iter().any(|a| *a == d.as_str())
        ));
        self.allowed = Some(allowed.to_vec());
        self
    }
}

/// Immutable signature plus compute function of one node type
#[derive(Debug, Clone)]
pub struct NodeType {
    pub name: &'static str,
    pub inputs: Vec<ValueType>,
    pub outputs: Vec<ValueType>,
    pub params: Vec<ParamSpec>,
    pub version: &'static str,
    pub description: &'static str,
    pub compute: ComputeFn,
}

impl NodeType {
    fn new(name: &'static str, description: &'static str, compute: ComputeFn) -> Self {
        Self {
            name,
            inputs: Vec::new(),
            outputs: Vec::new(),
            params: Vec::new(),
            version: "1.0",
            description,
            compute,
        }
    }

    fn with_inputs(mut self, inputs: Vec<ValueType>) -> Self {
        self.inputs = inputs;
        self
    }

    fn with_outputs(mut self, outputs: Vec<ValueType>) -> Self {
        self.outputs = outputs;
        self
    }

    fn with_params(mut self, params: Vec<ParamSpec>) -> Self {
        self.params = params;
        self
    }

    /// Whether edges leaving this type gate their targets
    pub fn is_conditional(&self) -> bool {
        self.name == CONDITIONAL_TYPE
    }

    pub fn param_spec(&self, key: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == key)
    }

    pub fn param_default(&self, key: &str) -> Option<&Value> {
        self.param_spec(key).map(|p| &p.default)
    }
}

/// The process-wide node-type catalog
#[derive(Debug)]
pub struct NodeTypeRegistry {
    types: HashMap<&'static str, NodeType>,
    names: Vec<&'static str>,
}

static REGISTRY: Lazy<NodeTypeRegistry> = Lazy::new(NodeTypeRegistry::with_builtins);

impl NodeTypeRegistry {
    pub fn global() -> &'static Self {
        &REGISTRY
    }

    pub fn lookup(&'static self, name: &str) -> Option<&'static NodeType> {
        self.types.get(name)
    }

    /// All registered type names, sorted
    pub fn type_names(&self) -> &[&'static str] {
        &self.names
    }

    fn with_builtins() -> Self {
        let mut types = HashMap::new();
        for ty in builtin_types() {
            let previous = types.insert(ty.name, ty);
            debug_assert!(previous.is_none(), "builtin registered twice");
        }
        let mut names: Vec<&'static str> = types.keys().copied().collect();
        names.sort_unstable();
        Self { types, names }
    }
}

fn builtin_types() -> Vec<NodeType> {
    use ValueType::{Bool, Number, String};

    let add = NodeType::new("AddNumber", "Sum of two numbers.", add_numbers)
        .with_inputs(vec![Number, Number])
        .with_outputs(vec![Number]);
    let mut add_alias = add.clone();
    add_alias.name = "Add";
    add_alias.description = "Sum of two numbers (alias of AddNumber).";

    vec![
        NodeType::new("Number", "Constant number source.", number_source)
            .with_outputs(vec![Number])
            .with_params(vec![ParamSpec::number("value", 0.0, "Emitted value.")]),
        NodeType::new("String", "Constant string source.", string_source)
            .with_outputs(vec![String])
            .with_params(vec![ParamSpec::string("text", "", "Emitted text.")]),
        NodeType::new("Bool", "Constant boolean source.", bool_source)
            .with_outputs(vec![Bool])
            .with_params(vec![ParamSpec::boolean("value", false, "Emitted value.")]),
        add,
        add_alias,
        NodeType::new("Multiply", "Product of two numbers.", multiply_numbers)
            .with_inputs(vec![Number, Number])
            .with_outputs(vec![Number]),
        NodeType::new(
            "ClampNumber",
            "Clamps a value between a lower and an upper bound.",
            clamp_number,
        )
        .with_inputs(vec![Number, Number, Number])
        .with_outputs(vec![Number]),
        NodeType::new("ToString", "Formats a number as text.", number_to_string)
            .with_inputs(vec![Number])
            .with_outputs(vec![String])
            .with_params(vec![ParamSpec::string(
                "format",
                "default",
                "Rendering of the number.",
            )
            .with_allowed(&["default", "fixed", "scientific", "hex"])]),
        NodeType::new("Concat", "Concatenates two strings.", concat_strings)
            .with_inputs(vec![String, String])
            .with_outputs(vec![String]),
        NodeType::new(
            "OutputNumber",
            "Identity over a number; marks an observable pin.",
            identity,
        )
        .with_inputs(vec![Number])
        .with_outputs(vec![Number]),
        NodeType::new(
            "OutputString",
            "Identity over a string; marks an observable pin.",
            identity,
        )
        .with_inputs(vec![String])
        .with_outputs(vec![String]),
        NodeType::new(
            CONDITIONAL_TYPE,
            "Splits control flow: output 0 carries the condition, output 1 its negation.",
            if_branch,
        )
        .with_inputs(vec![Bool])
        .with_outputs(vec![Bool, Bool]),
        NodeType::new(
            "Merge",
            "Emits the first input when it is non-zero, the second otherwise.",
            merge_numbers,
        )
        .with_inputs(vec![Number, Number])
        .with_outputs(vec![Number]),
    ]
}

fn number_source(node: &Node) -> Result<Vec<Value>, String> {
    Ok(vec![Value::Number(node.number_param("value"))])
}

fn string_source(node: &Node) -> Result<Vec<Value>, String> {
    Ok(vec![Value::String(node.string_param("text"))])
}

fn bool_source(node: &Node) -> Result<Vec<Value>, String> {
    Ok(vec![Value::Bool(node.bool_param("value"))])
}

fn add_numbers(node: &Node) -> Result<Vec<Value>, String> {
    let a = node.input_number(0)?;
    let b = node.input_number(1)?;
    Ok(vec![Value::Number(a + b)])
}

fn multiply_numbers(node: &Node) -> Result<Vec<Value>, String> {
    let a = node.input_number(0)?;
    let b = node.input_number(1)?;
    Ok(vec![Value::Number(a * b)])
}

fn clamp_number(node: &Node) -> Result<Vec<Value>, String> {
    let v = node.input_number(0)?;
    let lo = node.input_number(1)?;
    let hi = node.input_number(2)?;
    Ok(vec![Value::Number(v.max(lo).min(hi))])
}

fn number_to_string(node: &Node) -> Result<Vec<Value>, String> {
    let v = node.input_number(0)?;
    let text = match node.string_param("format").as_str() {
        "fixed" => format!("{v:.6}"),
        "scientific" => format!("{v:e}"),
        "hex" => format!("{:x}", v as i32),
        _ => format!("{v}"),
    };
    Ok(vec![Value::String(text)])
}

fn concat_strings(node: &Node) -> Result<Vec<Value>, String> {
    let a = node.input_str(0)?;
    let b = node.input_str(1)?;
    Ok(vec![Value::String(format!("{a}{b}"))])
}

fn identity(node: &Node) -> Result<Vec<Value>, String> {
    let value = node
        .input(0)
        .ok_or_else(|| "input 0 is missing".to_string())?;
    Ok(vec![value.clone()])
}

fn if_branch(node: &Node) -> Result<Vec<Value>, String> {
    let condition = node.input_bool(0)?;
    Ok(vec![Value::Bool(condition), Value::Bool(!condition)])
}

fn merge_numbers(node: &Node) -> Result<Vec<Value>, String> {
    let first = node.input_number(0)?;
    let value = if first != 0.0 {
        first
    } else {
        node.input_number(1)?
    };
    Ok(vec![Value::Number(value)])
}
