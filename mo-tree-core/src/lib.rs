//! Generic managed-object tree parsing primitives used by higher-level tools.

pub mod parser;
pub mod tree;

pub use parser::{parse, parse_file, parse_json, parse_xml, ParseError};
pub use tree::MoNode;
