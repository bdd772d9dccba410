// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::CompileOptions;
use crate::types::{OutputLevel, TeardownPolicy};

/// Command-line arguments for `tsrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "tsrun",
    version,
    about = "Compile a TypeScript entry point, run the output and rebuild on change.",
    long_about = None
)]
pub struct CliArgs {
    /// Entry point to compile.
    #[arg(value_name = "ENTRY")]
    pub entry: String,

    /// Output file path. A trailing `/` makes it a directory (`index.js`
    /// inside it). Without it the output goes to a temporary file and is run.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// TypeScript project configuration.
    #[arg(short, long, value_name = "PATH", default_value = "tsconfig.json")]
    pub project: PathBuf,

    /// Rebuild whenever a source file changes.
    #[arg(short, long)]
    pub watch: bool,

    /// Print the compiler's own output after successful builds.
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print diagnostics.
    #[arg(short, long)]
    pub quiet: bool,

    /// Print nothing and discard the output of the compiled program.
    #[arg(short, long)]
    pub silent: bool,

    /// Override file (TOML). Defaults to `tsrun.toml` when it exists.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Run the compiled output.
    #[arg(long)]
    pub run: bool,

    /// Type-check in parallel with compilation.
    #[arg(short = 't', long)]
    pub type_check: bool,

    /// Build for production.
    #[arg(long)]
    pub release: bool,

    /// Command to execute after every successful build.
    #[arg(short, long, value_name = "COMMAND")]
    pub exec: Option<String>,

    /// Keep the last good processes running while a rebuild is failing.
    #[arg(long)]
    pub keep_alive_on_failure: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TSRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Arguments passed to the compiled program.
    #[arg(last = true, value_name = "RUN_ARGS")]
    pub run_args: Vec<String>,
}

impl CliArgs {
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            entry: self.entry.clone(),
            output: self.output.clone(),
            project: self.project.clone(),
            override_config: self.config.clone(),
            dev: !self.release,
            check_types: self.type_check,
            watch: self.watch,
            run: self.run,
            run_args: self.run_args.clone(),
            exec: self.exec.clone(),
            verbose: self.verbose,
            output_level: OutputLevel::from_flags(self.quiet, self.silent),
            teardown: if self.keep_alive_on_failure {
                TeardownPolicy::KeepUntilSuccess
            } else {
                TeardownPolicy::OnCompileStart
            },
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
