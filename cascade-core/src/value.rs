//! Tagged values exchanged between node ports and parameters

use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type tag for ports and parameters
///
/// Tag equality is the only coercion rule in the engine. Conversion between
/// types is the job of explicit node types (e.g. `ToString`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Number,
    String,
    Bool,
}

impl ValueType {
    /// Check whether an output of this type may feed an input of `other`
    pub fn is_compatible_with(&self, other: &ValueType) -> bool {
        self == other
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Number => write!(f, "number"),
            ValueType::String => write!(f, "string"),
            ValueType::Bool => write!(f, "bool"),
        }
    }
}

/// A value flowing through the graph
///
/// Every value carries its tag; readers check the tag before use. The serde
/// form is untagged (a bare JSON number, string or boolean), which is the
/// shape parameters take in plans and signatures.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    String(String),
    Bool(bool),
}

impl Value {
    /// The tag carried by this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Number(_) => ValueType::Number,
            Value::String(_) => ValueType::String,
            Value::Bool(_) => ValueType::Bool,
        }
    }

    /// The per-type zero used to pre-seed input slots
    pub fn zero(tag: ValueType) -> Self {
        match tag {
            ValueType::Number => Value::Number(0.0),
            ValueType::String => Value::String(String::new()),
            ValueType::Bool => Value::Bool(false),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

// Hand-written so integral doubles serialize without a fractional part
// ("5", not "5.0"), matching the shortest round-trip decimals the boundary
// JSON promises. Deserialize stays derived-untagged above.
impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() <= i64::MAX as f64 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Value::String(s) => serializer.serialize_str(s),
            Value::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}
