//! Provider parsing and AST definitions.
//!
//! This module handles:
//! - Splitting and classifying argument declarations
//! - Parsing provider files into a `Provider`
//! - Defining the AST the code generators consume

pub mod classifier;
pub mod provider;
pub mod schema;

// Re-export main types
pub use classifier::{classify, split_declaration, Classification, Declaration, UserTypes};
pub use provider::{parse_provider, parse_provider_str, provider_name_from_path};
pub use schema::{
    Argument, EnumValue, Field, FieldKind, FlagValue, Provider, Shape, TraceEnum, TraceFlags,
    Tracepoint,
};
