//! Backend code generators.
//!
//! Each backend turns a parsed `Provider` into one self-contained C++
//! header for its tracing ecosystem:
//! - `lttng` - LTTng-UST tracepoint provider header
//! - `etw` - Windows TraceLogging provider header
//! - `ctf` - CTF event header with inline metadata

pub mod ctf;
pub mod etw;
pub mod helpers;
pub mod lttng;

use crate::parser::schema::Provider;
use crate::utils::error::GenerateError;
use clap::ValueEnum;
use log::info;
use std::fmt;

// Re-export main functions
pub use ctf::generate_ctf;
pub use etw::generate_etw;
pub use lttng::generate_lttng;

/// Supported tracing backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Backend {
    /// LTTng-UST (Linux)
    Lttng,
    /// Event Tracing for Windows via TraceLogging
    Etw,
    /// Common Trace Format
    Ctf,
}

impl Backend {
    /// Name used in diagnostics
    pub fn label(self) -> &'static str {
        match self {
            Backend::Lttng => "LTTNG",
            Backend::Etw => "ETW",
            Backend::Ctf => "CTF",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Generate the header for one backend
///
/// **Public** - main entry point for code generation
///
/// # Arguments
/// * `backend` - Target tracing backend
/// * `provider` - Parsed provider
/// * `file_name` - Output file name (no directories), needed by LTTng's
///   `TRACEPOINT_INCLUDE`
///
/// # Errors
/// * `GenerateError::UnsupportedField` - a field has no representation in the backend
pub fn generate(
    backend: Backend,
    provider: &Provider,
    file_name: &str,
) -> Result<String, GenerateError> {
    info!(
        "Generating {} code for provider {} ({} tracepoints)",
        backend,
        provider.name,
        provider.tracepoints.len()
    );

    let code = match backend {
        Backend::Lttng => generate_lttng(provider, file_name)?,
        Backend::Etw => generate_etw(provider),
        Backend::Ctf => generate_ctf(provider)?,
    };

    info!("Generated {} bytes of {} code", code.len(), backend);
    Ok(code)
}
