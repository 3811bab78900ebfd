//! Generate command implementation.
//!
//! The generate command:
//! 1. Parses the provider file
//! 2. Generates the backend header in memory
//! 3. Writes the output file, then the optional AST dump
//!
//! Nothing is written until generation has succeeded, so a fatal error
//! never leaves an output file or AST dump behind.

use crate::codegen::{generate, Backend};
use crate::output::{write_provider_json, write_source};
use crate::parser::parse_provider;
use anyhow::{Context, Result};
use log::{debug, info};
use std::path::PathBuf;
use std::time::Instant;

/// Arguments for the generate command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct GenerateArgs {
    /// Target tracing backend
    pub backend: Backend,

    /// Provider description file
    pub input: PathBuf,

    /// Generated header
    pub output: PathBuf,

    /// Optional path for a JSON dump of the parsed provider
    pub dump_ast: Option<PathBuf>,
}

impl Default for GenerateArgs {
    fn default() -> Self {
        Self {
            backend: Backend::Lttng,
            input: PathBuf::new(),
            output: PathBuf::new(),
            dump_ast: None,
        }
    }
}

/// Execute the generate command
///
/// **Public** - main entry point called from main.rs
///
/// # Arguments
/// * `args` - Generate command arguments
///
/// # Returns
/// Ok if the header was written, Err with context if any step fails
///
/// # Errors
/// * Input read or parse errors
/// * Fields the backend cannot represent
/// * File write errors
///
/// # Example
/// ```ignore
/// let args = GenerateArgs {
///     backend: Backend::Etw,
///     input: PathBuf::from("qtcore.tracepoints"),
///     output: PathBuf::from("qtcore_tracepoints_p.h"),
///     dump_ast: None,
/// };
///
/// execute_generate(args)?;
/// ```
pub fn execute_generate(args: GenerateArgs) -> Result<()> {
    let start_time = Instant::now();

    info!(
        "Generating {} header for: {}",
        args.backend,
        args.input.display()
    );

    // Step 1: Parse provider
    info!("Step 1/3: Parsing provider file...");
    let provider = parse_provider(&args.input)
        .with_context(|| format!("Failed to parse {}", args.input.display()))?;

    debug!(
        "Parsed provider {}: {} tracepoints, {} enums, {} flags",
        provider.name,
        provider.tracepoints.len(),
        provider.enumerations.len(),
        provider.flags.len()
    );

    // Step 2: Generate code
    info!("Step 2/3: Generating {} code...", args.backend);
    let file_name = output_file_name(&args)?;
    let code = generate(args.backend, &provider, &file_name)
        .with_context(|| format!("Failed to generate {} code", args.backend))?;

    // Step 3: Write output
    info!("Step 3/3: Writing output file...");
    write_source(&code, &args.output).context("Failed to write generated header")?;

    info!("✓ Header written to: {}", args.output.display());

    if let Some(dump_path) = &args.dump_ast {
        write_provider_json(&provider, dump_path).context("Failed to write AST dump")?;
        info!("✓ AST written to: {}", dump_path.display());
    }

    let elapsed = start_time.elapsed();
    info!("Generation completed in {:.2}s", elapsed.as_secs_f64());

    Ok(())
}

/// Validate generate arguments
///
/// **Public** - can be called before execute_generate for early validation
///
/// # Arguments
/// * `args` - Arguments to validate
///
/// # Returns
/// Ok if arguments are valid, Err with message if not
pub fn validate_args(args: &GenerateArgs) -> Result<()> {
    if args.input.as_os_str().is_empty() {
        anyhow::bail!("Input file cannot be empty");
    }

    if args.output.as_os_str().is_empty() {
        anyhow::bail!("Output file cannot be empty");
    }

    if args.input == args.output {
        anyhow::bail!("Output file must differ from the input file");
    }

    if args.dump_ast.as_ref() == Some(&args.output) {
        anyhow::bail!("AST dump must not overwrite the generated header");
    }

    output_file_name(args)?;

    Ok(())
}

/// Final component of the output path, used for include guards
///
/// **Private** - directories never leak into generated text
fn output_file_name(args: &GenerateArgs) -> Result<String> {
    let name = args
        .output
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid output file name: {}", args.output.display()))?;
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_args() -> GenerateArgs {
        GenerateArgs {
            input: PathBuf::from("qtcore.tracepoints"),
            output: PathBuf::from("out/qtcore_tracepoints_p.h"),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_args_valid() {
        assert!(validate_args(&valid_args()).is_ok());
    }

    #[test]
    fn test_validate_args_empty_input() {
        let args = GenerateArgs {
            input: PathBuf::new(),
            ..valid_args()
        };

        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_validate_args_same_paths() {
        let args = GenerateArgs {
            output: PathBuf::from("qtcore.tracepoints"),
            ..valid_args()
        };

        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_validate_args_dump_over_output() {
        let args = GenerateArgs {
            dump_ast: Some(PathBuf::from("out/qtcore_tracepoints_p.h")),
            ..valid_args()
        };

        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_output_file_name_strips_directories() {
        assert_eq!(output_file_name(&valid_args()).unwrap(), "qtcore_tracepoints_p.h");
    }

    #[test]
    fn test_output_file_name_rejects_root() {
        let args = GenerateArgs {
            output: PathBuf::from("/"),
            ..valid_args()
        };

        assert!(output_file_name(&args).is_err());
    }
}
