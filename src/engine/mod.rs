// src/engine/mod.rs

//! Build-cycle orchestration engine.
//!
//! This module ties together:
//! - the per-cycle accounting (which cycle is active, what it waits for)
//! - the main runtime event loop that reacts to:
//!   - build requests (initial submission, file changes)
//!   - compiler / type-checker completions
//!   - supervised process exits
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::path::PathBuf;

use crate::build::BuildEvent;
use crate::types::{CycleId, ExitOutcome, Role, TeardownPolicy};

pub use crate::errors::CycleError;

/// Terminal value of one cycle.
pub type CycleResult = Result<(), CycleError>;

/// Why a new cycle was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerReason {
    /// First cycle of a session.
    Initial,
    /// Source files changed (watch mode).
    FileWatch { paths: Vec<PathBuf> },
}

/// Events flowing into the runtime from the invoker, watcher, supervisor.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Start a new cycle.
    BuildRequested { reason: TriggerReason },
    /// A build phase of `cycle` completed.
    Build { cycle: CycleId, event: BuildEvent },
    /// The runtime finished spawning the processes of `cycle`.
    Spawned { cycle: CycleId },
    /// A supervised process exited on its own (never sent for torn-down
    /// processes).
    ProcessExited {
        cycle: CycleId,
        role: Role,
        pid: Option<u32>,
        outcome: ExitOutcome,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

/// Where the active cycle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleState {
    #[default]
    Idle,
    Compiling,
    /// Compiled, waiting for the decoupled type checker.
    TypeChecking,
    Spawning,
    Running,
    /// The cycle failed; waits for the next trigger.
    Failed,
    /// One-shot session reported its result.
    Finished,
}

/// Session-wide options used by the core.
#[derive(Debug, Clone, Copy)]
pub struct ControllerOptions {
    /// Persistent session: failures are recoverable, no result is reported.
    pub watch: bool,
    /// Wait for `TypeCheckCompleted` before spawning.
    pub check_types: bool,
    /// Spawn the compiled artifact.
    pub run: bool,
    /// Spawn the exec command.
    pub exec: bool,
    pub teardown: TeardownPolicy,
}

impl ControllerOptions {
    /// Roles spawned by every successful cycle.
    pub fn roles(&self) -> Vec<Role> {
        let mut roles = Vec::new();
        if self.run {
            roles.push(Role::Run);
        }
        if self.exec {
            roles.push(Role::Exec);
        }
        roles
    }
}

pub mod core;
pub mod cycle;
pub mod event_handlers;
pub mod report;
pub mod runtime;

pub use core::CycleController;
pub use cycle::{CycleTracker, LiveProcesses};
pub use event_handlers::{Announcement, CoreCommand, CoreStep};
pub use report::Reporter;
pub use runtime::{CompletionHook, Runtime};
