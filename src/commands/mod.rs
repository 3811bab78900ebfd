//! CLI command implementations.
//!
//! Commands orchestrate the parser, the code generators and the output
//! writers to perform user tasks.

pub mod generate;

// Re-export main command functions
pub use generate::{execute_generate, validate_args, GenerateArgs};
