// src/engine/cycle.rs

//! Bookkeeping owned by the core: the active cycle and the live process set
//! as the core sees it.

use std::collections::BTreeSet;

use crate::engine::{CycleError, CycleState};
use crate::types::{CycleId, Role};

/// Per-cycle accounting.
///
/// Every event carries the id of the cycle it belongs to; anything not
/// matching [`CycleTracker::current`] is stale.
#[derive(Debug, Default)]
pub struct CycleTracker {
    current: CycleId,
    state: CycleState,
    /// `TypeCheckCompleted` seen for the current cycle.
    checked: bool,
    /// Compile time of the current cycle, once `Succeeded` arrived.
    compiled_ms: Option<u64>,
    compiler_output: String,
}

impl CycleTracker {
    /// Enter `Compiling` for a fresh cycle and return its id.
    pub fn begin(&mut self) -> CycleId {
        self.current += 1;
        self.state = CycleState::Compiling;
        self.checked = false;
        self.compiled_ms = None;
        self.compiler_output.clear();
        self.current
    }

    pub fn current(&self) -> CycleId {
        self.current
    }

    pub fn has_started(&self) -> bool {
        self.current != 0
    }

    pub fn is_current(&self, cycle: CycleId) -> bool {
        self.has_started() && cycle == self.current
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn set_state(&mut self, state: CycleState) {
        self.state = state;
    }

    pub fn mark_checked(&mut self) {
        self.checked = true;
    }

    pub fn is_checked(&self) -> bool {
        self.checked
    }

    pub fn record_compiled(&mut self, elapsed_ms: u64, output: String) {
        self.compiled_ms = Some(elapsed_ms);
        self.compiler_output = output;
    }

    pub fn compiled_ms(&self) -> Option<u64> {
        self.compiled_ms
    }

    pub fn take_compiler_output(&mut self) -> String {
        std::mem::take(&mut self.compiler_output)
    }
}

/// Which cycle's processes are alive, and (one-shot) which ones the result
/// still waits for.
#[derive(Debug, Default)]
pub struct LiveProcesses {
    cycle: Option<CycleId>,
    awaiting: BTreeSet<Role>,
    failure: Option<CycleError>,
}

impl LiveProcesses {
    pub fn cycle(&self) -> Option<CycleId> {
        self.cycle
    }

    pub fn is_empty(&self) -> bool {
        self.cycle.is_none()
    }

    /// The processes of `cycle` are now the live ones.
    pub fn started(&mut self, cycle: CycleId, roles: &[Role]) {
        self.cycle = Some(cycle);
        self.awaiting = roles.iter().copied().collect();
        self.failure = None;
    }

    pub fn clear(&mut self) {
        self.cycle = None;
        self.awaiting.clear();
        self.failure = None;
    }

    pub fn belongs_to_live(&self, cycle: CycleId) -> bool {
        self.cycle == Some(cycle)
    }

    /// Record an exit; the first failure wins.
    pub fn exited(&mut self, role: Role, failure: Option<CycleError>) {
        self.awaiting.remove(&role);
        if self.failure.is_none() {
            self.failure = failure;
        }
    }

    pub fn all_exited(&self) -> bool {
        self.awaiting.is_empty()
    }

    pub fn take_failure(&mut self) -> Option<CycleError> {
        self.failure.take()
    }
}
