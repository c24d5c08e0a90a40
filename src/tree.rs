//! The decoded-message tree (`ProtoTree` in spec terms) that every
//! protocol layer contributes a node to, and that the (out-of-scope)
//! formatters ultimately consume.
//!
//! Per design note §9, the original "static reusable struct" and
//! "function-table of parse/format/destroy" patterns are replaced here
//! with one owned, tagged-variant node type plus plain `Vec` children —
//! no arena is needed since Rust's ownership already gives each burst's
//! tree a single root with no aliasing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::metadata::Vdl2MsgMetadata;

/// One node of a decoded message tree.
///
/// `fields` holds the human/machine-readable key-value pairs a layer
/// contributes (the analogue of the original's per-type `format`
/// callback); `children` holds nested layers (the analogue of recursive
/// decode). A node that failed to parse still reports `fields` (at
/// minimum a `reason`) so the raw bytes are never silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Name of the protocol layer or record this node represents,
    /// e.g. `"avlc"`, `"xid"`, `"acars"`, `"x25"`, `"clnp"`.
    pub name: &'static str,
    /// Ordered key-value fields this layer decoded.
    pub fields: Vec<(String, FieldValue)>,
    /// Nested layers, in decode order.
    pub children: Vec<Node>,
    /// Set when this node represents a failed or partial decode; the
    /// original bytes are preserved in `fields` under `"raw"`.
    pub unparsed: bool,
}

impl Node {
    /// A normally-decoded node with no children yet.
    pub fn new(name: &'static str) -> Self {
        Node { name, fields: Vec::new(), children: Vec::new(), unparsed: false }
    }

    /// An "unparseable" leaf carrying the original bytes, per §7's
    /// recovery policy for content-level failures.
    pub fn unparsed(name: &'static str, raw: &[u8], reason: impl Into<String>) -> Self {
        let mut n = Node::new(name);
        n.unparsed = true;
        n.push("reason", FieldValue::Text(reason.into()));
        n.push("raw", FieldValue::Bytes(raw.to_vec()));
        n
    }

    /// Append a field.
    pub fn push(&mut self, key: impl Into<String>, value: FieldValue) -> &mut Self {
        self.fields.push((key.into(), value));
        self
    }

    /// Append a child node.
    pub fn child(&mut self, node: Node) -> &mut Self {
        self.children.push(node);
        self
    }
}

/// A value attached to a [`Node`] field. Kept as a small closed set
/// rather than `serde_json::Value` so layers can't accidentally produce
/// formatter-specific shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A signed integer field (altitudes, offsets, counters).
    Int(i64),
    /// A floating-point field (coordinates, speeds, power levels).
    Float(f64),
    /// A short human-readable string.
    Text(String),
    /// A boolean flag.
    Bool(bool),
    /// Raw bytes, for opaque or unparsed payloads.
    Bytes(Vec<u8>),
}

/// The complete decode result for one burst: metadata plus the AVLC
/// root node and everything decoded beneath it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtoTree {
    /// Metadata captured at burst-decode time.
    pub metadata: Vdl2MsgMetadata,
    /// Root of the decoded protocol tree (normally an `"avlc"` node).
    pub root: Node,
}

impl ProtoTree {
    /// Flatten every field at every level into a single map, keyed by
    /// dotted path (`"avlc.xid.type"`). Convenience for tests and for a
    /// future (out-of-scope) text formatter.
    pub fn flatten(&self) -> BTreeMap<String, FieldValue> {
        let mut out = BTreeMap::new();
        flatten_node(&self.root, &self.root.name.to_string(), &mut out);
        out
    }
}

fn flatten_node(node: &Node, prefix: &str, out: &mut BTreeMap<String, FieldValue>) {
    for (k, v) in &node.fields {
        out.insert(format!("{prefix}.{k}"), v.clone());
    }
    for child in &node.children {
        let child_prefix = format!("{prefix}.{}", child.name);
        flatten_node(child, &child_prefix, out);
    }
}
