// src/supervisor/mod.rs

//! Process supervision.
//!
//! [`ProcessSupervisor`] is the only owner of live child processes. Its
//! narrow API guarantees:
//! - at most one live process per [`Role`];
//! - the previous holder of a role is signalled before its replacement
//!   starts;
//! - teardown is idempotent.

pub mod handle;
pub mod spec;

use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::engine::RuntimeEvent;
use crate::types::{CycleId, Role};

pub use handle::ChildProcessHandle;
pub use spec::{ProcessSpec, RunCallback, RunHook, SpawnPlan, StdioPolicy};

#[derive(Debug)]
pub struct ProcessSupervisor {
    live: BTreeMap<Role, ChildProcessHandle>,
    /// Listeners of torn-down processes still inside their grace period.
    stopping: Vec<JoinHandle<()>>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
}

impl ProcessSupervisor {
    /// Exit events of supervised processes are delivered to `runtime_tx`.
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            live: BTreeMap::new(),
            stopping: Vec::new(),
            runtime_tx,
        }
    }

    /// Tear down whatever holds `spec.role`, then spawn `spec`.
    ///
    /// Returns the new pid, or `None` when spawning failed (reported as a
    /// `ProcessExited` event).
    pub async fn replace_and_spawn(
        &mut self,
        spec: &ProcessSpec,
        cycle: CycleId,
        callback: Option<&mut RunCallback>,
    ) -> Option<u32> {
        self.teardown(spec.role).await;

        let handle = handle::spawn_process(spec, cycle, callback, self.runtime_tx.clone())?;
        let pid = handle.pid();
        self.live.insert(spec.role, handle);
        pid
    }

    /// Tear down the process holding `role`, if any.
    pub async fn teardown(&mut self, role: Role) {
        if let Some(handle) = self.live.remove(&role) {
            self.stop(handle).await;
        }
    }

    /// Tear down every process.
    pub async fn teardown_all(&mut self) {
        if self.live.is_empty() {
            return;
        }
        debug!(roles = ?self.live.keys().collect::<Vec<_>>(), "tearing down all processes");

        let live = std::mem::take(&mut self.live);
        for (_, handle) in live {
            self.stop(handle).await;
        }
    }

    /// Tear down every process and wait until all of them were reaped.
    ///
    /// Used when the session ends, so children get their grace period
    /// before the orchestrator exits.
    pub async fn shutdown(&mut self) {
        self.teardown_all().await;
        for listener in self.stopping.drain(..) {
            if let Err(err) = listener.await {
                debug!(error = %err, "process listener ended abnormally");
            }
        }
    }

    async fn stop(&mut self, mut handle: ChildProcessHandle) {
        handle.teardown().await;
        self.stopping.retain(|listener| !listener.is_finished());
        self.stopping.push(handle.into_listener());
    }

    pub fn is_live(&self, role: Role) -> bool {
        self.live.get(&role).is_some_and(ChildProcessHandle::is_live)
    }

    pub fn pid(&self, role: Role) -> Option<u32> {
        self.live.get(&role).and_then(ChildProcessHandle::pid)
    }

    /// Number of processes still running.
    pub fn live_count(&self) -> usize {
        self.live.values().filter(|h| h.is_live()).count()
    }
}
