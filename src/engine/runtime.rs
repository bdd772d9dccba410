// src/engine/runtime.rs

use std::collections::VecDeque;
use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::build::BuildBackend;
use crate::errors::Result;
use crate::supervisor::{ProcessSupervisor, SpawnPlan};
use crate::types::{CycleId, Role};

use super::core::CycleController;
use super::report::Reporter;
use super::{CoreCommand, CycleResult, RuntimeEvent};

/// Called once with the result of a one-shot session.
pub type CompletionHook = Box<dyn FnOnce(&CycleResult) + Send>;

/// Drives the cycle controller in response to `RuntimeEvent`s, and delegates
/// builds to a `BuildBackend` and processes to the `ProcessSupervisor`.
///
/// This is a pure IO shell around `CycleController`, which contains all the
/// orchestration semantics.
pub struct Runtime<B: BuildBackend> {
    core: CycleController,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    backend: B,
    supervisor: ProcessSupervisor,
    plan: SpawnPlan,
    reporter: Reporter,
    on_complete: Option<CompletionHook>,
    result: Option<CycleResult>,
}

impl<B: BuildBackend> fmt::Debug for Runtime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("supervisor", &self.supervisor)
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}

impl<B: BuildBackend> Runtime<B> {
    pub fn new(
        core: CycleController,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        backend: B,
        supervisor: ProcessSupervisor,
        plan: SpawnPlan,
        reporter: Reporter,
    ) -> Self {
        Self {
            core,
            event_rx,
            backend,
            supervisor,
            plan,
            reporter,
            on_complete: None,
            result: None,
        }
    }

    /// Register the hook receiving the one-shot result.
    pub fn with_completion_hook(mut self, hook: CompletionHook) -> Self {
        self.on_complete = Some(hook);
        self
    }

    /// Main event loop.
    ///
    /// - Consumes `RuntimeEvent`s from `event_rx`.
    /// - Feeds them into the core.
    /// - Executes the commands returned by the core.
    ///
    /// Returns the reported cycle result (one-shot sessions), after every
    /// supervised process was torn down.
    pub async fn run(mut self) -> Result<Option<CycleResult>> {
        info!("tsrun runtime started");

        let outcome = self.event_loop().await;

        self.backend.cancel();
        self.supervisor.shutdown().await;
        info!("runtime exiting");

        outcome?;
        Ok(self.result)
    }

    async fn event_loop(&mut self) -> Result<()> {
        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    return Ok(());
                }
            };

            if !self.dispatch(event).await? {
                info!("core requested exit; stopping runtime");
                return Ok(());
            }
        }
    }

    /// Feed one event, plus any follow-up events produced while executing
    /// its commands, through the core. Follow-ups are handled before the
    /// next channel event.
    async fn dispatch(&mut self, event: RuntimeEvent) -> Result<bool> {
        let mut pending = VecDeque::from([event]);

        while let Some(event) = pending.pop_front() {
            debug!(?event, "runtime received event");
            let step = self.core.step(event);

            for command in step.commands {
                if let Some(follow_up) = self.execute_command(command).await? {
                    pending.push_back(follow_up);
                }
            }

            if !step.keep_running {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<Option<RuntimeEvent>> {
        match command {
            CoreCommand::TeardownAll => {
                self.supervisor.teardown_all().await;
            }
            CoreCommand::SubmitBuild { cycle } => {
                debug!(cycle, "submitting build to backend");
                self.backend.submit(cycle).await?;
            }
            CoreCommand::Spawn { cycle, roles } => {
                self.spawn_roles(cycle, &roles).await;
                return Ok(Some(RuntimeEvent::Spawned { cycle }));
            }
            CoreCommand::Announce(announcement) => {
                self.reporter.announce(&announcement);
            }
            CoreCommand::Report(result) => {
                if let Some(hook) = self.on_complete.take() {
                    hook(&result);
                }
                self.result = Some(result);
            }
            CoreCommand::RequestExit => {
                info!("core issued RequestExit command");
            }
        }
        Ok(None)
    }

    async fn spawn_roles(&mut self, cycle: CycleId, roles: &[Role]) {
        for &role in roles {
            let Some(spec) = self.plan.spec(role).cloned() else {
                debug!(cycle, %role, "no process configured for role");
                continue;
            };
            let callback = self.plan.callback_mut(role);
            let pid = self.supervisor.replace_and_spawn(&spec, cycle, callback).await;
            debug!(cycle, %role, ?pid, "role spawned");
        }
    }
}
