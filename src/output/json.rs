//! JSON AST output writer.
//!
//! Dumps a parsed `Provider` as pretty-printed JSON for inspection.

use super::prepare_output_path;
use crate::parser::schema::Provider;
use crate::utils::error::OutputError;
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write a provider AST to a JSON file
///
/// **Public** - backs `--dump-ast`
///
/// # Arguments
/// * `provider` - Parsed provider
/// * `output_path` - Path to output JSON file
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::SerializationFailed` - JSON serialization error
/// * `OutputError::InvalidPath` - Path is empty or a directory
pub fn write_provider_json(
    provider: &Provider,
    output_path: impl AsRef<Path>,
) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    info!("Writing provider AST to: {}", output_path.display());

    prepare_output_path(output_path)?;

    let file = File::create(output_path).map_err(OutputError::WriteFailed)?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, provider)
        .map_err(OutputError::SerializationFailed)?;
    writer.write_all(b"\n").map_err(OutputError::WriteFailed)?;
    writer.flush().map_err(OutputError::WriteFailed)?;

    Ok(())
}

/// Serialize a provider AST to a string
///
/// **Public** - useful for tests and debugging
pub fn provider_to_string(provider: &Provider) -> Result<String, OutputError> {
    serde_json::to_string_pretty(provider).map_err(OutputError::SerializationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_provider_str;
    use tempfile::NamedTempFile;

    #[test]
    fn test_write_provider_json() {
        let provider =
            parse_provider_str("qtcore", "qtcore.tracepoints", "evt(int a, char* b[5])").unwrap();
        let temp_file = NamedTempFile::new().unwrap();

        write_provider_json(&provider, temp_file.path()).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(temp_file.path()).unwrap()).unwrap();
        assert_eq!(value["name"], "qtcore");
        assert_eq!(value["tracepoints"][0]["args"][1]["type"], "char**");
        assert_eq!(value["tracepoints"][0]["fields"][1]["kind"]["category"], "array");
        assert_eq!(value["tracepoints"][0]["fields"][1]["kind"]["len"], 5);
    }

    #[test]
    fn test_provider_to_string() {
        let provider = parse_provider_str("p", "p.tracepoints", "evt()").unwrap();
        let text = provider_to_string(&provider).unwrap();
        assert!(text.contains("\"name\": \"p\""));
    }
}
