// src/engine/report.rs

//! User-facing status lines.

use owo_colors::{OwoColorize, Stream};

use crate::build::FailureKind;
use crate::engine::Announcement;
use crate::types::{ExitOutcome, OutputLevel};

/// Renders [`Announcement`]s on stderr, honouring quiet/silent.
#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    level: OutputLevel,
    verbose: bool,
}

impl Reporter {
    pub fn new(level: OutputLevel, verbose: bool) -> Self {
        Self { level, verbose }
    }

    pub fn announce(&self, announcement: &Announcement) {
        let quiet = self.level.is_quiet();
        let silent = self.level.is_silent();

        match announcement {
            Announcement::CompileSucceeded { elapsed_ms, output } => {
                if !quiet {
                    let line = format!("> Successfully compiled in {elapsed_ms}ms");
                    eprintln!("{}", line.if_supports_color(Stream::Stderr, |t| t.green()));
                }
                if self.verbose && !silent && !output.is_empty() {
                    eprintln!("{output}");
                }
            }
            Announcement::CompileFailed(failure) => {
                let line = match failure.elapsed_ms {
                    Some(ms) => format!("> Compilation failed after {ms}ms"),
                    None => "> Compilation failed".to_string(),
                };
                let show_line = match failure.kind {
                    FailureKind::Fatal => !quiet,
                    FailureKind::Diagnostics => !silent,
                };
                if show_line {
                    eprintln!("{}", line.if_supports_color(Stream::Stderr, |t| t.red()));
                }
                if !silent {
                    eprintln!("{}", failure.message);
                }
            }
            Announcement::TypeProblems(diagnostics) => {
                if !silent {
                    let line = "> Type check reported problems";
                    eprintln!("{}", line.if_supports_color(Stream::Stderr, |t| t.yellow()));
                    eprintln!("{diagnostics}");
                }
            }
            Announcement::ExecStarting => {
                if !quiet {
                    let line = "> Running exec command";
                    eprintln!("{}", line.if_supports_color(Stream::Stderr, |t| t.blue()));
                }
            }
            Announcement::ProcessFinished { role, outcome } => {
                if !quiet {
                    let line = match outcome {
                        ExitOutcome::Success => format!("> Process finished ({role})"),
                        other => format!("> Process finished ({role}): {other}"),
                    };
                    eprintln!("{}", line.if_supports_color(Stream::Stderr, |t| t.red()));
                }
            }
        }
    }
}
