//! Serialized signatures and run outputs for boundary consumers
//!
//! Front-ends discover the catalog through `list_types_json` and
//! `describe_type_json` and read committed run results through
//! `outputs_json`. All three return compact JSON strings; serde_json handles
//! escaping and shortest round-trip number rendering.

use serde::Serialize;

use crate::errors::{GraphError, Result};
use crate::graph::Graph;
use crate::registry::{NodeType, NodeTypeRegistry, ParamSpec};
use crate::value::{Value, ValueType};

/// Signature of a node type as shown to boundary consumers
#[derive(Debug, Serialize)]
pub struct TypeSignature<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub description: &'a str,
    pub inputs: &'a [ValueType],
    pub outputs: &'a [ValueType],
    pub params: &'a [ParamSpec],
}

impl<'a> From<&'a NodeType> for TypeSignature<'a> {
    fn from(ty: &'a NodeType) -> Self {
        Self {
            name: ty.name,
            version: ty.version,
            description: ty.description,
            inputs: &ty.inputs,
            outputs: &ty.outputs,
            params: &ty.params,
        }
    }
}

/// JSON array of every registered type name
pub fn list_types_json() -> String {
    serde_json::to_string(NodeTypeRegistry::global().type_names())
        .expect("type name list serializes")
}

/// JSON signature of one type
pub fn describe_type_json(name: &str) -> Result<String> {
    let ty = NodeTypeRegistry::global()
        .lookup(name)
        .ok_or_else(|| GraphError::UnknownType {
            name: name.to_string(),
        })?;
    Ok(serde_json::to_string(&TypeSignature::from(ty)).expect("type signature serializes"))
}

#[derive(Debug, Serialize)]
struct OutputEntry<'a> {
    index: usize,
    #[serde(rename = "type")]
    value_type: ValueType,
    value: &'a Value,
}

#[derive(Debug, Serialize)]
struct OutputsDoc<'a> {
    outputs: Vec<OutputEntry<'a>>,
}

/// JSON rendering of every designated pin after a successful run
///
/// Fails with `NotComputed` when any pin's producer did not complete.
pub fn outputs_json(graph: &Graph) -> Result<String> {
    let mut outputs = Vec::with_capacity(graph.get_output_count());
    for index in 0..graph.get_output_count() {
        let value = graph.get_output_value(index)?;
        outputs.push(OutputEntry {
            index,
            value_type: value.value_type(),
            value,
        });
    }
    Ok(serde_json::to_string(&OutputsDoc { outputs }).expect("run outputs serialize"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_types_is_a_json_array_of_names() {
        let listed: Vec<String> = serde_json::from_str(&list_types_json()).unwrap();
        assert!(listed.iter().any(|n| n == "AddNumber"));
        assert!(listed.iter().any(|n| n == "If"));
    }

    #[test]
    fn test_describe_unknown_type() {
        assert!(matches!(
            describe_type_json("Bogus"),
            Err(GraphError::UnknownType { .. })
        ));
    }

    #[test]
    fn test_describe_round_trips_tags_and_defaults() {
        let doc: serde_json::Value =
            serde_json::from_str(&describe_type_json("ToString").unwrap()).unwrap();
        assert_eq!(doc["name"], "ToString");
        assert_eq!(doc["inputs"], serde_json::json!(["number"]));
        assert_eq!(doc["outputs"], serde_json::json!(["string"]));
        let param = &doc["params"][0];
        assert_eq!(param["name"], "format");
        assert_eq!(param["type"], "string");
        assert_eq!(param["default"], "default");
        assert_eq!(
            param["enum"],
            serde_json::json!(["default", "fixed", "scientific", "hex"])
        );
    }

    #[test]
    fn test_describe_omits_enum_when_unrestricted() {
        let doc: serde_json::Value =
            serde_json::from_str(&describe_type_json("Number").unwrap()).unwrap();
        let param = &doc["params"][0];
        assert_eq!(param["name"], "value");
        assert_eq!(param["default"], 0);
        assert!(param.get("enum").is_none());
    }

    #[test]
    fn test_outputs_json_shape() {
        let mut graph = Graph::new();
        graph.add_node(1, "Number", None).unwrap();
        graph.set_param(1, "value", Value::Number(5.0)).unwrap();
        graph.add_output(1, 0).unwrap();
        graph.run().unwrap();
        assert_eq!(
            outputs_json(&graph).unwrap(),
            r#"{"outputs":[{"index":0,"type":"number","value":5}]}"#
        );
    }

    #[test]
    fn test_outputs_json_fails_on_uncomputed_pin() {
        let mut graph = Graph::new();
        graph.add_node(1, "Number", None).unwrap();
        graph.add_output(1, 0).unwrap();
        assert!(matches!(
            outputs_json(&graph),
            Err(GraphError::NotComputed { .. })
        ));
    }
}
