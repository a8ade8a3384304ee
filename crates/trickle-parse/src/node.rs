//! The node graph built up by the parser.
//!
//! Nodes live in a flat arena owned by [`crate::ParserState`] and are
//! addressed by [`NodeId`]. A node is created the moment its first
//! character arrives and is marked closed when its last character does,
//! so consumers can observe values mid-flight.

use serde_json::Value;

/// Index of a node in the parser's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn from_index(index: usize) -> Self {
        NodeId(index as u32)
    }

    /// Position of this node in the arena.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Type-specific payload of a node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// An object. `keys` and `children` run in parallel, in document
    /// order. A key whose value has not started yet is not listed.
    Object {
        keys: Vec<String>,
        children: Vec<NodeId>,
    },
    /// An array, children in document order.
    Array { children: Vec<NodeId> },
    /// A string. `buf` holds decoded characters only; bytes of an
    /// incomplete escape sequence are buffered in the scanner, never here.
    String { buf: String },
    /// A number. `raw` is the source text; `value` is set at close.
    Number { raw: String, value: Option<f64> },
    /// `true` or `false`. The value is known from the first character.
    Boolean { value: bool },
    /// `null`.
    Null,
}

/// A single node in the graph.
#[derive(Debug, Clone)]
pub struct Node {
    /// This node's own id.
    pub id: NodeId,
    /// Containing object or array, `None` for the root.
    pub parent: Option<NodeId>,
    /// Whether the node's final character has been consumed.
    pub closed: bool,
    /// Bumped on every change to this node or anything beneath it.
    pub version: u64,
    /// Type-specific payload.
    pub kind: NodeKind,
}

impl Node {
    /// String contents seen so far, if this is a string node.
    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::String { buf } => Some(buf),
            _ => None,
        }
    }

    /// Numeric value, if this is a closed number node.
    pub fn as_number(&self) -> Option<f64> {
        match &self.kind {
            NodeKind::Number { value, .. } => *value,
            _ => None,
        }
    }

    /// Boolean value, if this is a boolean node.
    pub fn as_bool(&self) -> Option<bool> {
        match &self.kind {
            NodeKind::Boolean { value } => Some(*value),
            _ => None,
        }
    }

    /// Whether this is a null node.
    pub fn is_null(&self) -> bool {
        matches!(self.kind, NodeKind::Null)
    }

    /// Child ids, empty for scalars.
    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Object { children, .. } => children,
            NodeKind::Array { children } => children,
            _ => &[],
        }
    }

    /// Object keys in document order, empty for everything else.
    pub fn keys(&self) -> &[String] {
        match &self.kind {
            NodeKind::Object { keys, .. } => keys,
            _ => &[],
        }
    }

    /// Look up an object member by key. With duplicate keys the last
    /// occurrence wins, matching how resolved values are assembled.
    pub fn get(&self, key: &str) -> Option<NodeId> {
        match &self.kind {
            NodeKind::Object { keys, children } => keys
                .iter()
                .rposition(|k| k == key)
                .map(|index| children[index]),
            _ => None,
        }
    }
}

/// Convert a closed number to a JSON value, preferring integer
/// representation when the value is a whole number in `i64` range.
pub(crate) fn number_to_json(value: f64) -> Option<Value> {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0; // 2^53
    if value.fract() == 0.0 && value.abs() <= MAX_EXACT {
        Some(Value::from(value as i64))
    } else {
        serde_json::Number::from_f64(value).map(Value::Number)
    }
}
