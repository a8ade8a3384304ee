//! Type-directed resolution of parser state against a schema.
//!
//! Resolution answers one question: given everything parsed so far, does
//! the document match the schema (`Match`), could it still match once
//! more input arrives (`Pending`), or can no continuation ever make it
//! match (`Invalid`)? The distinction between `Pending` and `Invalid` is
//! load-bearing — `any_of` uses `Invalid` to prune alternatives
//! permanently, long before the document finishes.

use serde_json::{Map, Value};
use tracing::trace;
use trickle_parse::{Node, NodeId, NodeKind, ParserError, ParserState};

use crate::cache::ResolutionCache;
use crate::types::{Schema, SchemaKind};

/// Key under which producers wrap a primitive root value in an object,
/// for transports that only allow object roots.
pub const PRIMITIVE_WRAPPER_KEY: &str = "value";

/// Outcome of resolving a schema against a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The input seen so far satisfies the schema; here is its value.
    Match(Value),
    /// Not satisfied yet, but more input could still get there.
    Pending,
    /// No continuation of the input can satisfy the schema.
    Invalid(ParserError),
}

impl Resolution {
    /// The matched value, if this is a `Match`.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Resolution::Match(value) => Some(value),
            _ => None,
        }
    }

    /// Whether this is a `Match`.
    pub fn is_match(&self) -> bool {
        matches!(self, Resolution::Match(_))
    }
}

/// Resolve `schema` against the document in `state`.
///
/// The cache is consumed and returned so repeated resolution over a
/// streaming document skips unchanged subtrees. Pass a fresh
/// [`ResolutionCache`] the first time, then thread the returned one
/// through subsequent calls.
///
/// A parser error makes the whole document `Invalid` regardless of
/// schema. A document with no root yet is `Pending`.
pub fn from_json_ast(
    schema: &Schema,
    state: &ParserState,
    mut cache: ResolutionCache,
) -> (Resolution, ResolutionCache) {
    if let Some(error) = state.error() {
        return (Resolution::Invalid(error.clone()), cache);
    }
    let Some(root) = state.root_id() else {
        return (Resolution::Pending, cache);
    };
    let root = unwrap_primitive_root(schema, state, root);
    let mut resolver = Resolver {
        state,
        cache: &mut cache,
        path: Vec::new(),
    };
    let result = resolver.resolve(schema, root);
    (result, cache)
}

/// Providers that force object roots wrap primitive documents as
/// `{"value": ...}`. When the schema root is not object-shaped and the
/// document root is an object with that single well-known key, resolve
/// against the wrapped value instead.
fn unwrap_primitive_root(schema: &Schema, state: &ParserState, root: NodeId) -> NodeId {
    let object_shaped = match schema.kind() {
        SchemaKind::Object(_) => true,
        SchemaKind::AnyOf(options) => options
            .iter()
            .any(|o| matches!(o.kind(), SchemaKind::Object(_))),
        _ => false,
    };
    if object_shaped {
        return root;
    }
    let node = state.node(root);
    let keys = node.keys();
    if keys.len() == 1 && keys[0] == PRIMITIVE_WRAPPER_KEY && node.children().len() == 1 {
        trace!("unwrapping primitive root wrapper");
        node.children()[0]
    } else {
        root
    }
}

struct Resolver<'a> {
    state: &'a ParserState,
    cache: &'a mut ResolutionCache,
    path: Vec<String>,
}

impl Resolver<'_> {
    fn resolve(&mut self, schema: &Schema, id: NodeId) -> Resolution {
        let version = self.state.node(id).version;
        if let Some(hit) = self.cache.lookup(schema.id(), id, version) {
            return hit;
        }
        let result = self.resolve_fresh(schema, id);
        self.cache.store(schema.id(), id, version, result.clone());
        result
    }

    fn resolve_fresh(&mut self, schema: &Schema, id: NodeId) -> Resolution {
        let node = self.state.node(id);
        match schema.kind() {
            SchemaKind::String => self.resolve_string(schema, node),
            SchemaKind::Number => self.resolve_number(node, id),
            SchemaKind::Boolean => self.resolve_boolean(node),
            SchemaKind::Literal(expected) => self.resolve_literal(node, expected),
            SchemaKind::Enumeration(values) => self.resolve_enumeration(node, values),
            SchemaKind::Object(fields) => self.resolve_object(schema, node, fields),
            SchemaKind::Array(element) => self.resolve_array(schema, node, element),
            SchemaKind::AnyOf(options) => self.resolve_any_of(schema, id, options),
            SchemaKind::Nullish => self.resolve_nullish(node),
        }
    }

    fn resolve_string(&mut self, schema: &Schema, node: &Node) -> Resolution {
        let Some(text) = node.as_str() else {
            return self.mismatch("string", node);
        };
        if node.closed || schema.is_streaming() {
            Resolution::Match(Value::String(text.to_owned()))
        } else {
            Resolution::Pending
        }
    }

    fn resolve_number(&mut self, node: &Node, id: NodeId) -> Resolution {
        if !matches!(node.kind, NodeKind::Number { .. }) {
            return self.mismatch("number", node);
        }
        if !node.closed {
            return Resolution::Pending;
        }
        match self.state.node_value(id) {
            Some(value) => Resolution::Match(value),
            None => self.invalid("number is out of range"),
        }
    }

    fn resolve_boolean(&mut self, node: &Node) -> Resolution {
        match node.as_bool() {
            Some(value) if node.closed => Resolution::Match(Value::Bool(value)),
            Some(_) => Resolution::Pending,
            None => self.mismatch("boolean", node),
        }
    }

    fn resolve_literal(&mut self, node: &Node, expected: &Value) -> Resolution {
        match (&node.kind, expected) {
            (NodeKind::String { buf }, Value::String(want)) => {
                if node.closed {
                    if buf == want {
                        Resolution::Match(expected.clone())
                    } else {
                        self.invalid(format!("expected the literal {:?}", want))
                    }
                } else if want.starts_with(buf.as_str()) {
                    Resolution::Pending
                } else {
                    self.invalid(format!("expected the literal {:?}", want))
                }
            }
            (NodeKind::Number { value, .. }, Value::Number(want)) => {
                if !node.closed {
                    return Resolution::Pending;
                }
                if *value == want.as_f64() {
                    Resolution::Match(expected.clone())
                } else {
                    self.invalid(format!("expected the literal {}", want))
                }
            }
            (NodeKind::Boolean { value }, Value::Bool(want)) => {
                if value != want {
                    self.invalid(format!("expected the literal {}", want))
                } else if node.closed {
                    Resolution::Match(expected.clone())
                } else {
                    Resolution::Pending
                }
            }
            (NodeKind::Null, Value::Null) => {
                if node.closed {
                    Resolution::Match(Value::Null)
                } else {
                    Resolution::Pending
                }
            }
            _ => self.mismatch("literal", node),
        }
    }

    fn resolve_enumeration(&mut self, node: &Node, values: &[String]) -> Resolution {
        let Some(text) = node.as_str() else {
            return self.mismatch("string", node);
        };
        if node.closed {
            if values.iter().any(|v| v == text) {
                Resolution::Match(Value::String(text.to_owned()))
            } else {
                self.invalid(format!("{:?} is not one of the allowed values", text))
            }
        } else if values.iter().any(|v| v.starts_with(text)) {
            Resolution::Pending
        } else {
            self.invalid("no allowed value starts with the text seen so far")
        }
    }

    fn resolve_object(
        &mut self,
        schema: &Schema,
        node: &Node,
        fields: &[(String, std::sync::Arc<Schema>)],
    ) -> Resolution {
        if !matches!(node.kind, NodeKind::Object { .. }) {
            return self.mismatch("object", node);
        }
        // Keys only appear on the node once they are fully scanned, so an
        // undeclared key can never grow into a declared one.
        for key in node.keys() {
            if !fields.iter().any(|(name, _)| name == key) {
                self.path.push(key.clone());
                let result = self.invalid("unexpected field");
                self.path.pop();
                return result;
            }
        }
        if schema.is_streaming() {
            self.resolve_streaming_object(node, fields)
        } else {
            self.resolve_strict_object(node, fields)
        }
    }

    /// A strict object matches once every declared field matches. Fields
    /// that have not appeared keep it pending while the object is open;
    /// once the object closes a missing field (other than a nullish one)
    /// is fatal.
    fn resolve_strict_object(
        &mut self,
        node: &Node,
        fields: &[(String, std::sync::Arc<Schema>)],
    ) -> Resolution {
        let mut map = Map::new();
        let mut pending = false;
        for (key, field) in fields {
            match node.get(key) {
                Some(child) => {
                    self.path.push(key.clone());
                    let result = self.resolve(field, child);
                    self.path.pop();
                    match result {
                        Resolution::Match(value) => {
                            map.insert(key.clone(), value);
                        }
                        Resolution::Pending => pending = true,
                        invalid @ Resolution::Invalid(_) => return invalid,
                    }
                }
                None if matches!(field.kind(), SchemaKind::Nullish) => {
                    if node.closed {
                        map.insert(key.clone(), Value::Null);
                    } else {
                        pending = true;
                    }
                }
                None if node.closed => {
                    self.path.push(key.clone());
                    let result = self.invalid("missing required field");
                    self.path.pop();
                    return result;
                }
                None => pending = true,
            }
        }
        if pending {
            Resolution::Pending
        } else {
            Resolution::Match(Value::Object(map))
        }
    }

    /// A streaming object always matches, carrying whatever fields have
    /// resolved so far. Missing streaming-typed fields show up as empty
    /// defaults so consumers see a stable shape.
    fn resolve_streaming_object(
        &mut self,
        node: &Node,
        fields: &[(String, std::sync::Arc<Schema>)],
    ) -> Resolution {
        let mut map = Map::new();
        for (key, field) in fields {
            match node.get(key) {
                Some(child) => {
                    self.path.push(key.clone());
                    let result = self.resolve(field, child);
                    self.path.pop();
                    match result {
                        Resolution::Match(value) => {
                            map.insert(key.clone(), value);
                        }
                        Resolution::Pending => {}
                        invalid @ Resolution::Invalid(_) => return invalid,
                    }
                }
                None => {
                    if let Some(default) = streaming_default(field) {
                        map.insert(key.clone(), default);
                    }
                }
            }
        }
        Resolution::Match(Value::Object(map))
    }

    fn resolve_array(&mut self, schema: &Schema, node: &Node, element: &Schema) -> Resolution {
        if !matches!(node.kind, NodeKind::Array { .. }) {
            return self.mismatch("array", node);
        }
        let children: Vec<NodeId> = node.children().to_vec();
        if schema.is_streaming() {
            let mut values = Vec::new();
            for (index, child) in children.into_iter().enumerate() {
                self.path.push(format!("[{}]", index));
                let result = self.resolve(element, child);
                self.path.pop();
                match result {
                    Resolution::Match(value) => values.push(value),
                    Resolution::Pending => break,
                    invalid @ Resolution::Invalid(_) => return invalid,
                }
            }
            Resolution::Match(Value::Array(values))
        } else {
            if !node.closed {
                return Resolution::Pending;
            }
            let mut values = Vec::new();
            for (index, child) in children.into_iter().enumerate() {
                self.path.push(format!("[{}]", index));
                let result = self.resolve(element, child);
                self.path.pop();
                match result {
                    Resolution::Match(value) => values.push(value),
                    Resolution::Pending => return Resolution::Pending,
                    invalid @ Resolution::Invalid(_) => return invalid,
                }
            }
            Resolution::Match(Value::Array(values))
        }
    }

    fn resolve_any_of(
        &mut self,
        schema: &Schema,
        id: NodeId,
        options: &[std::sync::Arc<Schema>],
    ) -> Resolution {
        let mut pending = false;
        let mut last_error = None;
        for (index, option) in options.iter().enumerate() {
            if self.cache.is_pruned(schema.id(), id, index) {
                continue;
            }
            match self.resolve(option, id) {
                // Options are tried in declaration order, so the first
                // match is also the earliest-declared one.
                matched @ Resolution::Match(_) => return matched,
                Resolution::Pending => pending = true,
                Resolution::Invalid(error) => {
                    trace!("pruning alternative {} for node {:?}", index, id);
                    self.cache.prune(schema.id(), id, index);
                    last_error = Some(error);
                }
            }
        }
        if pending {
            Resolution::Pending
        } else {
            match last_error {
                Some(error) => Resolution::Invalid(error),
                None => self.invalid("no alternative matches"),
            }
        }
    }

    fn resolve_nullish(&mut self, node: &Node) -> Resolution {
        if !node.is_null() {
            return self.mismatch("null", node);
        }
        if node.closed {
            Resolution::Match(Value::Null)
        } else {
            Resolution::Pending
        }
    }

    fn mismatch(&self, expected: &str, node: &Node) -> Resolution {
        self.invalid(format!(
            "expected {}, found {}",
            expected,
            kind_name(&node.kind)
        ))
    }

    fn invalid(&self, reason: impl Into<String>) -> Resolution {
        Resolution::Invalid(ParserError::SchemaInvalid {
            path: self.path_string(),
            reason: reason.into(),
        })
    }

    fn path_string(&self) -> String {
        let mut out = String::from("$");
        for segment in &self.path {
            if segment.starts_with('[') {
                out.push_str(segment);
            } else {
                out.push('.');
                out.push_str(segment);
            }
        }
        out
    }
}

fn kind_name(kind: &NodeKind) -> &'static str {
    match kind {
        NodeKind::Object { .. } => "object",
        NodeKind::Array { .. } => "array",
        NodeKind::String { .. } => "string",
        NodeKind::Number { .. } => "number",
        NodeKind::Boolean { .. } => "boolean",
        NodeKind::Null => "null",
    }
}

/// The empty value a missing streaming field presents as: `""`, `[]`, or
/// `{}`. Streaming objects with any non-streaming field get no default,
/// since those fields cannot be conjured from nothing.
fn streaming_default(schema: &Schema) -> Option<Value> {
    if !schema.is_streaming() {
        return None;
    }
    match schema.kind() {
        SchemaKind::String => Some(Value::String(String::new())),
        SchemaKind::Array(_) => Some(Value::Array(Vec::new())),
        SchemaKind::Object(fields) => {
            if fields.iter().all(|(_, field)| streaming_default(field).is_some()) {
                Some(Value::Object(Map::new()))
            } else {
                None
            }
        }
        _ => None,
    }
}
