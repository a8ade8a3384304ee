#![doc = include_str!("../README.md")]

mod types;
pub use types::{
    Schema, SchemaId, SchemaKind, any_of, array, boolean, enumeration, literal, nullish, number,
    object, streaming, string,
};

mod cache;
pub use cache::ResolutionCache;

mod resolve;
pub use resolve::{PRIMITIVE_WRAPPER_KEY, Resolution, from_json_ast};

mod json_schema;
pub use json_schema::to_json_schema;
