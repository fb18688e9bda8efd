//! Template markup: tokenizing, tag discovery, section structure and data lookup

pub mod expand;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod xml;

pub use lexer::{TagKind, TagToken};
pub use parser::Node;
