//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use thiserror::Error;

/// Errors that can occur while reading and parsing a provider file
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to read '{file}': {source}")]
    ReadFailed {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{file}' line {line} is not valid UTF-8")]
    InvalidUtf8 { file: String, line: usize },

    #[error("Cannot derive a provider name from '{0}'")]
    InvalidProviderName(String),

    #[error("Syntax error while processing '{file}' line {line}: '{text}' does not look like a tracepoint definition")]
    Syntax {
        file: String,
        line: usize,
        text: String,
    },

    #[error("Syntax error while processing '{file}': no closing brace found for prefix text block")]
    UnterminatedPrefix { file: String },

    #[error("Syntax error while processing '{file}' line {line}: only one prefix text block is allowed")]
    DuplicatePrefix { file: String, line: usize },

    #[error("Syntax error while processing '{file}': {kind} block opened on line {line} is never closed")]
    UnterminatedBlock {
        file: String,
        kind: &'static str,
        line: usize,
    },

    #[error("Syntax error while processing '{file}' line {line}: invalid {kind} entry '{text}'")]
    InvalidEntry {
        file: String,
        line: usize,
        kind: &'static str,
        text: String,
    },

    #[error("Error while processing '{file}' line {line}: {message}")]
    InvalidDefinition {
        file: String,
        line: usize,
        message: String,
    },

    #[error("Missing parameter type for argument {index} of {tracepoint} ({file}:{line})")]
    MissingType {
        file: String,
        line: usize,
        index: usize,
        tracepoint: String,
    },

    #[error("Missing parameter name for argument {index} of {tracepoint} ({file}:{line})")]
    MissingName {
        file: String,
        line: usize,
        index: usize,
        tracepoint: String,
    },
}

/// Errors that can occur while generating backend code
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Cannot deduce {backend} type for '{param_type} {field}' in tracepoint {tracepoint}")]
    UnsupportedField {
        backend: &'static str,
        tracepoint: String,
        field: String,
        param_type: String,
    },
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}
