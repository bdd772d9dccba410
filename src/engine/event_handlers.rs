// src/engine/event_handlers.rs

//! Event handling logic for the core controller.

use tracing::{debug, info};

use crate::build::{BuildEvent, BuildFailure};
use crate::engine::cycle::{CycleTracker, LiveProcesses};
use crate::engine::{ControllerOptions, CycleError, CycleResult, CycleState, TriggerReason};
use crate::types::{CycleId, ExitOutcome, Role, TeardownPolicy};

/// User-facing status produced by the core, rendered by the reporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Announcement {
    CompileSucceeded { elapsed_ms: u64, output: String },
    CompileFailed(BuildFailure),
    TypeProblems(String),
    ExecStarting,
    ProcessFinished { role: Role, outcome: ExitOutcome },
}

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Tear down every supervised process.
    TeardownAll,
    /// Hand `cycle` to the build backend.
    SubmitBuild { cycle: CycleId },
    /// Replace-and-spawn these roles for `cycle`.
    Spawn { cycle: CycleId, roles: Vec<Role> },
    Announce(Announcement),
    /// Deliver the session result (one-shot only).
    Report(CycleResult),
    /// Request that the runtime stops.
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub fn proceed(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    pub fn idle() -> Self {
        Self::proceed(Vec::new())
    }

    /// Report `result`, tear everything down and stop.
    fn finish(
        tracker: &mut CycleTracker,
        mut commands: Vec<CoreCommand>,
        result: CycleResult,
    ) -> Self {
        tracker.set_state(CycleState::Finished);
        commands.push(CoreCommand::Report(result));
        commands.push(CoreCommand::TeardownAll);
        commands.push(CoreCommand::RequestExit);
        Self {
            commands,
            keep_running: false,
        }
    }
}

/// Handle a request for a new cycle.
///
/// - One-shot sessions only ever start one cycle.
/// - Under [`TeardownPolicy::OnCompileStart`] the previous processes go away
///   before the compiler is even started.
pub fn handle_build_requested(
    tracker: &mut CycleTracker,
    live: &mut LiveProcesses,
    options: &ControllerOptions,
    reason: TriggerReason,
) -> CoreStep {
    if !options.watch && tracker.has_started() {
        debug!(?reason, "one-shot session already started; ignoring build request");
        return CoreStep::idle();
    }

    let mut commands = Vec::new();

    if options.teardown == TeardownPolicy::OnCompileStart && !live.is_empty() {
        commands.push(CoreCommand::TeardownAll);
        live.clear();
    }

    let cycle = tracker.begin();
    match &reason {
        TriggerReason::Initial => info!(cycle, "starting initial build"),
        TriggerReason::FileWatch { paths } => {
            info!(cycle, changed = paths.len(), "sources changed; rebuilding")
        }
    }

    commands.push(CoreCommand::SubmitBuild { cycle });
    CoreStep::proceed(commands)
}

/// Handle a compiler or type-checker completion.
pub fn handle_build_event(
    tracker: &mut CycleTracker,
    live: &mut LiveProcesses,
    options: &ControllerOptions,
    cycle: CycleId,
    event: BuildEvent,
) -> CoreStep {
    if !tracker.is_current(cycle) {
        debug!(cycle, current = tracker.current(), "discarding stale build event");
        return CoreStep::idle();
    }

    let state = tracker.state();
    match event {
        BuildEvent::Failed(failure) => {
            if !matches!(state, CycleState::Compiling | CycleState::TypeChecking) {
                debug!(cycle, ?state, "failure outside of compilation; ignoring");
                return CoreStep::idle();
            }

            info!(cycle, fatal = failure.is_fatal(), "compilation failed");
            tracker.set_state(CycleState::Failed);
            let commands = vec![CoreCommand::Announce(Announcement::CompileFailed(
                failure.clone(),
            ))];

            if options.watch {
                CoreStep::proceed(commands)
            } else {
                CoreStep::finish(tracker, commands, Err(CycleError::Compile(failure)))
            }
        }

        BuildEvent::Succeeded { elapsed_ms, output } => {
            if state != CycleState::Compiling {
                debug!(cycle, ?state, "duplicate compile success; ignoring");
                return CoreStep::idle();
            }

            tracker.record_compiled(elapsed_ms, output);
            if !options.check_types || tracker.is_checked() {
                begin_spawn(tracker, live, options, elapsed_ms)
            } else {
                debug!(cycle, "compiled; waiting for type check");
                tracker.set_state(CycleState::TypeChecking);
                CoreStep::idle()
            }
        }

        BuildEvent::TypeCheckCompleted {
            elapsed_ms,
            diagnostics,
        } => {
            let mut commands = Vec::new();
            if !matches!(state, CycleState::Compiling | CycleState::TypeChecking) {
                debug!(cycle, ?state, "type check finished after the cycle moved on; ignoring");
                return CoreStep::idle();
            }
            if let Some(diagnostics) = diagnostics {
                commands.push(CoreCommand::Announce(Announcement::TypeProblems(diagnostics)));
            }

            if state == CycleState::Compiling {
                tracker.mark_checked();
                return CoreStep::proceed(commands);
            }

            let elapsed = tracker.compiled_ms().map_or(elapsed_ms, |c| c.max(elapsed_ms));
            let mut step = begin_spawn(tracker, live, options, elapsed);
            commands.append(&mut step.commands);
            step.commands = commands;
            step
        }
    }
}

/// Both signals are in: announce success and ask for the processes.
fn begin_spawn(
    tracker: &mut CycleTracker,
    live: &mut LiveProcesses,
    options: &ControllerOptions,
    elapsed_ms: u64,
) -> CoreStep {
    let cycle = tracker.current();
    tracker.set_state(CycleState::Spawning);

    let mut commands = vec![CoreCommand::Announce(Announcement::CompileSucceeded {
        elapsed_ms,
        output: tracker.take_compiler_output(),
    })];

    // Processes kept alive through failed rebuilds are replaced together.
    if !live.is_empty() {
        commands.push(CoreCommand::TeardownAll);
        live.clear();
    }

    if options.exec {
        commands.push(CoreCommand::Announce(Announcement::ExecStarting));
    }
    commands.push(CoreCommand::Spawn {
        cycle,
        roles: options.roles(),
    });

    CoreStep::proceed(commands)
}

/// Handle the runtime's confirmation that `cycle`'s processes were spawned.
///
/// A one-shot session reports its result once every spawned role exited,
/// the `exec` command included, or right away when nothing was spawned.
pub fn handle_spawned(
    tracker: &mut CycleTracker,
    live: &mut LiveProcesses,
    options: &ControllerOptions,
    cycle: CycleId,
) -> CoreStep {
    if !tracker.is_current(cycle) || tracker.state() != CycleState::Spawning {
        debug!(cycle, state = ?tracker.state(), "unexpected spawn confirmation; ignoring");
        return CoreStep::idle();
    }

    let roles = options.roles();
    tracker.set_state(CycleState::Running);
    live.started(cycle, &roles);
    debug!(cycle, ?roles, "cycle running");

    if !options.watch && live.all_exited() {
        // Nothing has to run to completion.
        return CoreStep::finish(tracker, Vec::new(), Ok(()));
    }

    CoreStep::proceed(Vec::new())
}

/// Handle a supervised process exiting on its own.
///
/// Exits never trigger a rebuild. In one-shot sessions the result is
/// reported once every spawned process exited.
pub fn handle_process_exited(
    tracker: &mut CycleTracker,
    live: &mut LiveProcesses,
    options: &ControllerOptions,
    cycle: CycleId,
    role: Role,
    outcome: ExitOutcome,
) -> CoreStep {
    if !live.belongs_to_live(cycle) {
        debug!(cycle, %role, "exit of a superseded process; ignoring");
        return CoreStep::idle();
    }

    let commands = vec![CoreCommand::Announce(Announcement::ProcessFinished {
        role,
        outcome: outcome.clone(),
    })];

    if options.watch || tracker.state() != CycleState::Running {
        return CoreStep::proceed(commands);
    }

    let failure = (!outcome.is_success()).then(|| CycleError::Process { role, outcome });
    live.exited(role, failure);

    if live.all_exited() {
        let result = match live.take_failure() {
            Some(err) => Err(err),
            None => Ok(()),
        };
        return CoreStep::finish(tracker, commands, result);
    }

    CoreStep::proceed(commands)
}

/// Handle a shutdown request.
pub fn handle_shutdown(live: &mut LiveProcesses) -> CoreStep {
    live.clear();
    CoreStep {
        commands: vec![CoreCommand::TeardownAll, CoreCommand::RequestExit],
        keep_running: false,
    }
}
