//! The shape of an already-parsed graph description, as ingested by
//! `dataflow-graph::GraphStore::load`.
//!
//! This module never reads a file or parses JSON itself: a host parses its
//! own configuration format (JSON, TOML, an in-memory builder, ...) into
//! these types and hands the result to `load`. That keeps the boundary
//! named in the purpose/scope section — "configuration file reading and
//! JSON parsing" is a host concern — while still giving hosts a typed,
//! `serde`-deserializable shape to target.

use std::collections::HashMap;

use serde::Deserialize;

use crate::node_kind::NodeKind;
use crate::value::{DType, Value};

/// A scalar parameter value. A strict subset of [`Value`] plus bare
/// integers, matching the description grammar's `parameters` bag.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            ParamValue::Int(v) => *v as f64,
            ParamValue::Float(v) => *v,
            ParamValue::Str(_) => 0.0,
        }
    }

    /// Coerce this parameter to a [`Value`] of the given declared type.
    pub fn to_value(&self, dtype: DType) -> Value {
        match (self, dtype) {
            (ParamValue::Str(s), DType::Str) => Value::Str(s.clone()),
            (_, DType::Str) => Value::Str(String::new()),
            (ParamValue::Int(v), DType::I32) => Value::I32(*v as i32),
            (ParamValue::Int(v), DType::F32) => Value::F32(*v as f32),
            (ParamValue::Int(v), DType::F64) => Value::F64(*v as f64),
            (ParamValue::Float(v), DType::I32) => Value::I32(*v as i32),
            (ParamValue::Float(v), DType::F32) => Value::F32(*v as f32),
            (ParamValue::Float(v), DType::F64) => Value::F64(*v),
            (ParamValue::Str(_), _) => Value::I32(0).coerce(dtype),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortDesc {
    pub id: String,
    #[serde(rename = "type")]
    pub dtype: DeclaredDType,
}

/// The wire spelling of a declared port type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclaredDType {
    I32,
    F32,
    F64,
    #[serde(alias = "string")]
    Str,
}

impl From<DeclaredDType> for DType {
    fn from(d: DeclaredDType) -> Self {
        match d {
            DeclaredDType::I32 => DType::I32,
            DeclaredDType::F32 => DType::F32,
            DeclaredDType::F64 => DType::F64,
            DeclaredDType::Str => DType::Str,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeDesc {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub inputs: Vec<PortDesc>,
    #[serde(default)]
    pub outputs: Vec<PortDesc>,
    #[serde(default)]
    pub parameters: HashMap<String, ParamValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionDesc {
    #[serde(rename = "fromNode")]
    pub from_node: String,
    #[serde(rename = "fromPort")]
    pub from_port: String,
    #[serde(rename = "toNode")]
    pub to_node: String,
    #[serde(rename = "toPort")]
    pub to_port: String,
}

/// The top-level document consumed by `load`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphDescription {
    #[serde(default)]
    pub nodes: Vec<NodeDesc>,
    #[serde(default)]
    pub connections: Vec<ConnectionDesc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_document() {
        let json = r#"{
            "nodes": [
                { "id": "a", "type": "DeviceTrigger", "outputs": [{"id": "out1", "type": "f32"}] },
                { "id": "sum", "type": "Add",
                  "inputs": [{"id": "in1", "type": "f32"}],
                  "outputs": [{"id": "out1", "type": "f32"}] }
            ],
            "connections": [
                { "fromNode": "a", "fromPort": "out1", "toNode": "sum", "toPort": "in1" }
            ]
        }"#;

        let desc: GraphDescription = serde_json::from_str(json).unwrap();
        assert_eq!(desc.nodes.len(), 2);
        assert_eq!(desc.connections.len(), 1);
    }
}
