//! tracegen CLI
//!
//! Compiles a tracepoint provider description into a C++ header for one
//! tracing backend.

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use env_logger::Env;
use std::path::PathBuf;
use std::process::ExitCode;

use tracegen::codegen::Backend;
use tracegen::commands::{execute_generate, validate_args, GenerateArgs};

/// tracegen - tracepoint header generator for LTTng, ETW and CTF
#[derive(Parser, Debug)]
#[command(name = "tracegen")]
#[command(version, about, long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Target tracing backend
    #[arg(value_enum)]
    backend: Backend,

    /// Provider description file
    input: PathBuf,

    /// Generated header
    output: PathBuf,

    /// Also write the parsed provider as JSON
    #[arg(long, value_name = "FILE")]
    dump_ast: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => return report_usage(e),
    };

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fatal: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Build the command arguments and run generation
///
/// **Private** - everything after argument parsing
fn run(cli: Cli) -> Result<()> {
    let args = GenerateArgs {
        backend: cli.backend,
        input: cli.input,
        output: cli.output,
        dump_ast: cli.dump_ast,
    };

    // Validate args first
    validate_args(&args)?;

    execute_generate(args)
}

/// Print help or a usage error
///
/// **Private** - a bare invocation shows help and succeeds; any other
/// usage error fails without touching the file system
fn report_usage(e: clap::Error) -> ExitCode {
    match e.kind() {
        ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            let _ = Cli::command().print_help();
            ExitCode::SUCCESS
        }
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = e.print();
            ExitCode::SUCCESS
        }
        _ => {
            let _ = e.print();
            ExitCode::FAILURE
        }
    }
}
