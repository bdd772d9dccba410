// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::build::BuildFailure;
use crate::types::{ExitOutcome, Role};

#[derive(Error, Debug)]
pub enum TsrunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Compilation failed: {0}")]
    CompileError(BuildFailure),

    #[error("Process `{role}` {outcome}")]
    ProcessError { role: Role, outcome: ExitOutcome },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TsrunError {
    /// Whether the failure was already shown to the user through the status
    /// reporter (compile diagnostics, process exits).
    pub fn is_reported(&self) -> bool {
        matches!(
            self,
            TsrunError::CompileError(_) | TsrunError::ProcessError { .. }
        )
    }
}

/// Terminal failure of a single build cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CycleError {
    #[error("{0}")]
    Compile(BuildFailure),

    #[error("process `{role}` {outcome}")]
    Process { role: Role, outcome: ExitOutcome },
}

impl From<CycleError> for TsrunError {
    fn from(err: CycleError) -> Self {
        match err {
            CycleError::Compile(failure) => TsrunError::CompileError(failure),
            CycleError::Process { role, outcome } => TsrunError::ProcessError { role, outcome },
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TsrunError>;
