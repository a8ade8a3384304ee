//! Schema values and the builder functions that create them.
//!
//! Schemas are plain data: a tree of [`Schema`] values built with the
//! functions in this module (and [`streaming`] for the variants that
//! match early). Every schema carries a human-readable description that
//! travels into generated documentation, and a process-unique [`SchemaId`]
//! used as a cache key.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

static NEXT_SCHEMA_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identity of one schema node.
///
/// Cloning a [`Schema`] preserves its id: a clone is the same schema, not
/// a new one, so cached resolutions carry over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(u64);

/// One node of a schema tree.
#[derive(Debug, Clone)]
pub struct Schema {
    id: SchemaId,
    description: String,
    streaming: bool,
    kind: SchemaKind,
}

/// The shape a schema expects.
#[derive(Debug, Clone)]
pub enum SchemaKind {
    /// Any string.
    String,
    /// Any number (IEEE-754 double).
    Number,
    /// `true` or `false`.
    Boolean,
    /// Exactly this value.
    Literal(Value),
    /// One of a fixed set of strings.
    Enumeration(Vec<String>),
    /// An object with these fields, in declaration order.
    Object(Vec<(String, Arc<Schema>)>),
    /// An array of uniformly typed elements.
    Array(Arc<Schema>),
    /// The first matching alternative wins.
    AnyOf(Vec<Arc<Schema>>),
    /// `null`, or absence when used as an object field.
    Nullish,
}

impl Schema {
    fn new(description: &str, streaming: bool, kind: SchemaKind) -> Self {
        Self {
            id: SchemaId(NEXT_SCHEMA_ID.fetch_add(1, Ordering::Relaxed)),
            description: description.to_owned(),
            streaming,
            kind,
        }
    }

    /// This schema's identity.
    #[inline]
    pub fn id(&self) -> SchemaId {
        self.id
    }

    /// The human-readable description.
    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether this schema matches early on partial input.
    #[inline]
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// The expected shape.
    #[inline]
    pub fn kind(&self) -> &SchemaKind {
        &self.kind
    }
}

/// Any string. Matches only once the closing quote has been seen; see
/// [`streaming::string`] for partial matches.
pub fn string(description: &str) -> Schema {
    Schema::new(description, false, SchemaKind::String)
}

/// Any number.
pub fn number(description: &str) -> Schema {
    Schema::new(description, false, SchemaKind::Number)
}

/// `true` or `false`.
pub fn boolean(description: &str) -> Schema {
    Schema::new(description, false, SchemaKind::Boolean)
}

/// Exactly `value`, nothing else.
pub fn literal(description: &str, value: impl Into<Value>) -> Schema {
    Schema::new(description, false, SchemaKind::Literal(value.into()))
}

/// One of a fixed set of strings.
pub fn enumeration(description: &str, values: &[&str]) -> Schema {
    Schema::new(
        description,
        false,
        SchemaKind::Enumeration(values.iter().map(|v| (*v).to_owned()).collect()),
    )
}

/// An object with the given fields. Every field is required unless its
/// schema is [`nullish`]. Non-streaming fields are ordered ahead of
/// streaming ones, so a producer emitting fields in schema order settles
/// the required scalars first.
pub fn object(description: &str, fields: Vec<(&str, Schema)>) -> Schema {
    Schema::new(description, false, SchemaKind::Object(collect_fields(fields)))
}

/// An array of `element`. Matches only once the closing bracket has been
/// seen; see [`streaming::array`] for prefix matches.
pub fn array(description: &str, element: Schema) -> Schema {
    Schema::new(description, false, SchemaKind::Array(Arc::new(element)))
}

/// The first matching alternative, tried in declaration order.
pub fn any_of(description: &str, options: Vec<Schema>) -> Schema {
    Schema::new(
        description,
        false,
        SchemaKind::AnyOf(options.into_iter().map(Arc::new).collect()),
    )
}

/// `null`, or absence when used as an object field.
pub fn nullish(description: &str) -> Schema {
    Schema::new(description, false, SchemaKind::Nullish)
}

fn collect_fields(fields: Vec<(&str, Schema)>) -> Vec<(String, Arc<Schema>)> {
    let mut fields: Vec<(String, Arc<Schema>)> = fields
        .into_iter()
        .map(|(key, schema)| (key.to_owned(), Arc::new(schema)))
        .collect();
    // Stable, so declaration order is preserved within each group.
    fields.sort_by_key(|(_, schema)| schema.is_streaming());
    fields
}

/// Builders for schemas that match early on partial input.
pub mod streaming {
    use super::*;

    /// A string that matches its characters as they arrive.
    pub fn string(description: &str) -> Schema {
        Schema::new(description, true, SchemaKind::String)
    }

    /// An object that matches with whatever fields have resolved so far.
    pub fn object(description: &str, fields: Vec<(&str, Schema)>) -> Schema {
        Schema::new(description, true, SchemaKind::Object(collect_fields(fields)))
    }

    /// An array that matches its longest prefix of matching elements.
    pub fn array(description: &str, element: Schema) -> Schema {
        Schema::new(description, true, SchemaKind::Array(Arc::new(element)))
    }
}
