//! Structure parsing for legal documents.
//!
//! Turns plain text into a hierarchical clause tree plus a cross-reference
//! index and a definitions table. The parser is configured per document
//! family through [`ParserConfig`]; when the configured clause pattern does
//! not match enough of the document it falls back to a set of built-in
//! heading patterns and picks the best-scoring one.

pub mod config;
pub mod crossref;
pub mod definitions;
pub mod error;
pub mod structure;
pub mod tree;

pub use config::ParserConfig;
pub use crossref::extract_cross_references;
pub use definitions::{extract_definitions, merge_supplemental, Definition, DefinitionSource};
pub use error::{ParserError, Result};
pub use structure::StructureParser;
pub use tree::{ClauseNode, ClauseTree, CrossReference};
