//! tracegen
//!
//! Compiles tracepoint provider descriptions into C++ headers for
//! LTTng-UST, ETW (TraceLogging) and CTF.
//!
//! This crate provides the core implementation for the `tracegen` CLI
//! tool. A provider file lists tracepoints with typed arguments plus
//! optional enum and flags declarations; each backend turns the parsed
//! provider into one self-contained header.
//!
//! ## Getting Started
//!
//! ```bash
//! tracegen lttng qtcore.tracepoints qtcore_tracepoints_p.h
//! tracegen --help
//! ```

pub mod codegen;
pub mod commands;
pub mod output;
pub mod parser;
pub mod utils;
