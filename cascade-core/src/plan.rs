//! External plan ingestion
//!
//! A plan is a declarative description of a graph that a caller replays
//! against the builder. Two engine-external grammars are accepted: the
//! line-oriented textual v0 format and the JSON v1 format. Parsing lives in
//! the engine so every front-end agrees on the grammar; the front-ends
//! themselves stay external.

use serde::Deserialize;
use std::str::FromStr;

use crate::errors::PlanError;
use crate::graph::{DataEdge, Graph, NodeId, OutputPin};
use crate::value::Value;

/// One node declaration with its parameter assignments in plan order
#[derive(Debug, Clone, PartialEq)]
pub struct PlanNode {
    pub id: NodeId,
    pub type_name: String,
    pub params: Vec<(String, Value)>,
}

/// A parsed plan, ready to replay against a graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub nodes: Vec<PlanNode>,
    pub connections: Vec<DataEdge>,
    pub outputs: Vec<OutputPin>,
}

impl Plan {
    /// Parse the line-oriented textual v0 format
    ///
    /// Recognized heads are `NODES` (ignored), `NODE <id> <type> [k=v ...]`,
    /// `CONNECTION <from> <fromOut> <to> <toIn>` and `OUTPUT <id> <outIdx>`;
    /// any other line is skipped. Parameter values parse as number when
    /// numeric, else as string.
    pub fn parse_text(src: &str) -> Result<Self, PlanError> {
        let mut plan = Plan::default();
        for (offset, raw) in src.lines().enumerate() {
            let line = offset + 1;
            let mut tokens = raw.split_whitespace();
            match tokens.next() {
                Some("NODE") => {
                    let id = parse_field(tokens.next(), line, "node id")?;
                    let type_name: String = parse_field(tokens.next(), line, "node type")?;
                    let mut params = Vec::new();
                    for pair in tokens {
                        let (key, value) =
                            pair.split_once('=').ok_or_else(|| PlanError::Syntax {
                                line,
                                reason: format!("parameter '{pair}' is not key=value"),
                            })?;
                        let value = match f64::from_str(value) {
                            Ok(number) => Value::Number(number),
                            Err(_) => Value::String(value.to_string()),
                        };
                        params.push((key.to_string(), value));
                    }
                    plan.nodes.push(PlanNode {
                        id,
                        type_name,
                        params,
                    });
                }
                Some("CONNECTION") => {
                    plan.connections.push(DataEdge {
                        from: parse_field(tokens.next(), line, "source id")?,
                        from_out: parse_field(tokens.next(), line, "source port")?,
                        to: parse_field(tokens.next(), line, "target id")?,
                        to_in: parse_field(tokens.next(), line, "target port")?,
                    });
                }
                Some("OUTPUT") => {
                    plan.outputs.push(OutputPin {
                        node: parse_field(tokens.next(), line, "node id")?,
                        output: parse_field(tokens.next(), line, "output port")?,
                    });
                }
                // NODES counts and unknown heads are ignored.
                _ => {}
            }
        }
        Ok(plan)
    }

    /// Parse the JSON v1 format
    ///
    /// `version` must equal 1; unknown top-level keys and the reserved
    /// `edges.control` array are ignored (control is derived at run time).
    pub fn parse_json(src: &str) -> Result<Self, PlanError> {
        let doc: PlanDoc = serde_json::from_str(src)?;
        if doc.version != 1 {
            return Err(PlanError::UnsupportedVersion { found: doc.version });
        }

        let mut plan = Plan::default();
        for node in doc.nodes {
            let mut params = Vec::new();
            for (key, raw) in node.params {
                let value: Value =
                    serde_json::from_value(raw).map_err(|e| PlanError::Param {
                        id: node.id,
                        key: key.clone(),
                        reason: e.to_string(),
                    })?;
                params.push((key, value));
            }
            plan.nodes.push(PlanNode {
                id: node.id,
                type_name: node.type_name,
                params,
            });
        }
        for edge in doc.edges.data {
            plan.connections.push(DataEdge {
                from: edge.from,
                from_out: edge.from_output,
                to: edge.to,
                to_in: edge.to_input,
            });
        }
        for output in doc.outputs {
            plan.outputs.push(OutputPin {
                node: output.node,
                output: output.output,
            });
        }
        Ok(plan)
    }

    /// Replay the plan against a fresh graph
    pub fn build_graph(&self) -> Result<Graph, PlanError> {
        let mut graph = Graph::new();
        for node in &self.nodes {
            graph.add_node(node.id, &node.type_name, None)?;
            for (key, value) in &node.params {
                graph.set_param(node.id, key, value.clone())?;
            }
        }
        for edge in &self.connections {
            graph.connect(edge.from, edge.from_out, edge.to, edge.to_in)?;
        }
        for pin in &self.outputs {
            graph.add_output(pin.node, pin.output)?;
        }
        Ok(graph)
    }
}

fn parse_field<T: FromStr>(
    token: Option<&str>,
    line: usize,
    what: &str,
) -> Result<T, PlanError> {
    let token = token.ok_or_else(|| PlanError::Syntax {
        line,
        reason: format!("missing {what}"),
    })?;
    token.parse().map_err(|_| PlanError::Syntax {
        line,
        reason: format!("invalid {what} '{token}'"),
    })
}

#[derive(Debug, Deserialize)]
struct PlanDoc {
    version: u64,
    #[serde(default)]
    nodes: Vec<DocNode>,
    #[serde(default)]
    edges: DocEdges,
    #[serde(default)]
    outputs: Vec<DocOutput>,
}

#[derive(Debug, Deserialize)]
struct DocNode {
    id: NodeId,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    params: serde_json::Map<String, serde_json::Value>,
}

// The reserved `control` array is not declared and therefore ignored.
#[derive(Debug, Default, Deserialize)]
struct DocEdges {
    #[serde(default)]
    data: Vec<DocDataEdge>,
}

#[derive(Debug, Deserialize)]
struct DocDataEdge {
    from: NodeId,
    #[serde(rename = "fromOutput")]
    from_output: usize,
    to: NodeId,
    #[serde(rename = "toInput")]
    to_input: usize,
}

#[derive(Debug, Deserialize)]
struct DocOutput {
    node: NodeId,
    output: usize,
}
