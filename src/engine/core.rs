// src/engine/core.rs

//! Pure core state machine.
//!
//! This module contains a synchronous, deterministic controller that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated cycle state
//! - a list of commands describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from the channel
//! - submitting builds to the backend
//! - spawning and tearing down processes through the supervisor
//! - handling Ctrl+C / shutdown
//!
//! The core is unit tested without any Tokio, channels, filesystem, or
//! processes.

use crate::engine::cycle::{CycleTracker, LiveProcesses};
use crate::engine::event_handlers::{
    CoreStep, handle_build_event, handle_build_requested, handle_process_exited, handle_shutdown,
    handle_spawned,
};
use crate::engine::{ControllerOptions, CycleState, RuntimeEvent};
use crate::types::CycleId;

/// Pure core controller state.
///
/// This owns:
/// - the per-cycle accounting (current cycle, state, type-check flag)
/// - the core's view of which cycle's processes are alive
/// - session options
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CycleController {
    tracker: CycleTracker,
    live: LiveProcesses,
    options: ControllerOptions,
}

impl CycleController {
    pub fn new(options: ControllerOptions) -> Self {
        Self {
            tracker: CycleTracker::default(),
            live: LiveProcesses::default(),
            options,
        }
    }

    pub fn state(&self) -> CycleState {
        self.tracker.state()
    }

    pub fn current_cycle(&self) -> CycleId {
        self.tracker.current()
    }

    /// Cycle whose processes are currently alive, if any.
    pub fn live_cycle(&self) -> Option<CycleId> {
        self.live.cycle()
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::BuildRequested { reason } => {
                handle_build_requested(&mut self.tracker, &mut self.live, &self.options, reason)
            }
            RuntimeEvent::Build { cycle, event } => {
                handle_build_event(&mut self.tracker, &mut self.live, &self.options, cycle, event)
            }
            RuntimeEvent::Spawned { cycle } => {
                handle_spawned(&mut self.tracker, &mut self.live, &self.options, cycle)
            }
            RuntimeEvent::ProcessExited {
                cycle,
                role,
                outcome,
                ..
            } => handle_process_exited(
                &mut self.tracker,
                &mut self.live,
                &self.options,
                cycle,
                role,
                outcome,
            ),
            RuntimeEvent::ShutdownRequested => handle_shutdown(&mut self.live),
        }
    }
}
