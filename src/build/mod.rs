// src/build/mod.rs

//! Build invocation layer.
//!
//! The compiler and the type checker are external programs. This module
//! turns one submission per cycle into [`BuildEvent`]s tagged with the cycle
//! id, delivered through the runtime event channel.
//!
//! - [`command`] renders the compiler / type checker / plugin command lines.
//! - [`runner`] runs them and classifies the results.
//! - [`backend`] provides the `BuildBackend` trait and the production
//!   `CommandBuildBackend`; tests plug in scripted backends instead.
//! - [`invoker`] seeds the first cycle and, in watch mode, keeps the file
//!   watcher that requests the following ones.

use std::fmt;

pub mod backend;
pub mod command;
pub mod invoker;
pub mod runner;

pub use backend::{BuildBackend, CommandBuildBackend};
pub use invoker::{BuildMode, Submission, submit};

/// Completion signal of one build phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    /// Compilation (or a plugin hook) failed.
    Failed(BuildFailure),
    /// The transpile/bundle phase finished. `output` is the compiler's stdout.
    Succeeded { elapsed_ms: u64, output: String },
    /// The decoupled type checker finished. `diagnostics` is set when it
    /// reported problems.
    TypeCheckCompleted {
        elapsed_ms: u64,
        diagnostics: Option<String>,
    },
}

/// Whether a failure is an ordinary compile report or the compiler itself
/// falling over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Diagnostics,
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    pub kind: FailureKind,
    pub message: String,
    pub elapsed_ms: Option<u64>,
}

impl BuildFailure {
    pub fn diagnostics(message: impl Into<String>, elapsed_ms: Option<u64>) -> Self {
        Self {
            kind: FailureKind::Diagnostics,
            message: message.into(),
            elapsed_ms,
        }
    }

    pub fn fatal(message: impl Into<String>, elapsed_ms: Option<u64>) -> Self {
        Self {
            kind: FailureKind::Fatal,
            message: message.into(),
            elapsed_ms,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind == FailureKind::Fatal
    }
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
