//! Generated header output writer.
//!
//! Writes the generated C++ text in one go. A file that could only be
//! partially written is removed again, so a failed run never leaves a
//! truncated header behind.

use super::prepare_output_path;
use crate::utils::error::OutputError;
use log::{info, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write generated source to a file
///
/// **Public** - main entry point for header output
///
/// # Arguments
/// * `content` - Complete generated text
/// * `output_path` - Path to the output header
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write; the partial file is removed
/// * `OutputError::InvalidPath` - Path is empty or a directory
///
/// # Example
/// ```ignore
/// let code = generate(Backend::Lttng, &provider, "qtcore_tracepoints_p.h")?;
/// write_source(&code, "qtcore_tracepoints_p.h")?;
/// ```
pub fn write_source(content: &str, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    info!("Writing generated code to: {}", output_path.display());

    prepare_output_path(output_path)?;

    let file = File::create(output_path).map_err(OutputError::WriteFailed)?;

    if let Err(e) = write_all(file, content) {
        warn!("Write failed, removing {}", output_path.display());
        let _ = std::fs::remove_file(output_path);
        return Err(OutputError::WriteFailed(e));
    }

    info!(
        "Generated code written successfully ({} bytes, {:.2} KB)",
        content.len(),
        content.len() as f64 / 1024.0
    );

    Ok(())
}

/// **Private** - buffered write followed by an explicit flush
fn write_all(file: File, content: &str) -> std::io::Result<()> {
    let mut writer = BufWriter::new(file);
    writer.write_all(content.as_bytes())?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    const HEADER: &str = "#ifndef X_H\n#define X_H\n#endif // X_H\n";

    #[test]
    fn test_write_source() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        write_source(HEADER, path).unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), HEADER);
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested_path = temp_dir.path().join("nested/dirs/x_p.h");

        write_source(HEADER, &nested_path).unwrap();

        assert!(nested_path.exists());
    }

    #[test]
    fn test_write_to_directory_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = write_source(HEADER, temp_dir.path());
        assert!(matches!(result, Err(OutputError::InvalidPath(_))));
    }
}
