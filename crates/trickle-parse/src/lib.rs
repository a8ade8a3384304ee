#![doc = include_str!("../README.md")]

mod error;
pub use error::ParserError;

mod node;
pub use node::{Node, NodeId, NodeKind};

mod parser;
pub use parser::ParserState;

mod diagnostic;
