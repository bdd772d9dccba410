// src/lib.rs

pub mod build;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod supervisor;
pub mod types;
pub mod watch;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::build::{BuildBackend, BuildMode, CommandBuildBackend};
use crate::cli::CliArgs;
use crate::config::{BuildConfig, CompileOptions};
use crate::engine::{
    CompletionHook, ControllerOptions, CycleController, Reporter, Runtime, RuntimeEvent,
};
use crate::errors::Result;
use crate::supervisor::{ProcessSupervisor, RunHook, SpawnPlan};

/// Capacity of the runtime event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<()> {
    compile(args.compile_options(), RunHook::Disabled, None).await
}

/// Compile (and run / watch) with the production build backend.
///
/// This wires together:
/// - config resolution (configuration errors surface here, before any build)
/// - the command build backend
/// - the session (controller, supervisor, optional watcher, Ctrl-C)
pub async fn compile(
    options: CompileOptions,
    run_hook: RunHook,
    on_complete: Option<CompletionHook>,
) -> Result<()> {
    let config = Arc::new(config::resolve(&options)?);
    config::prepare_output_dir(&config)?;

    let channel = SessionChannel::new();
    let backend = CommandBuildBackend::new(Arc::clone(&config), channel.sender());

    let hooks = SessionHooks {
        run: run_hook,
        on_complete,
    };
    let outcome = run_session(&options, Arc::clone(&config), backend, hooks, channel).await;

    if options.output.is_none() {
        config::remove_temporary_output(&config);
    }
    outcome
}

/// Caller-supplied wiring for a session.
pub struct SessionHooks {
    /// How the compiled artifact is run.
    pub run: RunHook,
    /// Receives the one-shot result.
    pub on_complete: Option<CompletionHook>,
}

impl Default for SessionHooks {
    fn default() -> Self {
        Self {
            run: RunHook::Disabled,
            on_complete: None,
        }
    }
}

/// The runtime event channel of a session.
///
/// Backends need the sender before the session starts, so the channel is
/// created up front.
#[derive(Debug)]
pub struct SessionChannel {
    tx: mpsc::Sender<RuntimeEvent>,
    rx: mpsc::Receiver<RuntimeEvent>,
}

impl SessionChannel {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx, rx }
    }

    pub fn sender(&self) -> mpsc::Sender<RuntimeEvent> {
        self.tx.clone()
    }
}

impl Default for SessionChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a session with any build backend.
///
/// One-shot sessions return the cycle's failure as an error; watch sessions
/// only return on shutdown.
pub async fn run_session<B: BuildBackend + 'static>(
    options: &CompileOptions,
    config: Arc<BuildConfig>,
    backend: B,
    hooks: SessionHooks,
    channel: SessionChannel,
) -> Result<()> {
    let SessionChannel { tx: rt_tx, rx: rt_rx } = channel;

    let plan = SpawnPlan::new(&config, options, hooks.run);
    let controller_options = ControllerOptions {
        watch: options.watch,
        check_types: config.check_types,
        run: plan.has_run(),
        exec: plan.has_exec(),
        teardown: options.teardown,
    };
    debug!(?controller_options, ?plan, "session plan");

    let mode = if options.watch {
        BuildMode::Watch
    } else {
        BuildMode::Once
    };
    let _submission = build::submit(mode, &config, &rt_tx).await?;

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let core = CycleController::new(controller_options);
    let supervisor = ProcessSupervisor::new(rt_tx.clone());
    let reporter = Reporter::new(options.output_level, options.verbose);

    let mut runtime = Runtime::new(core, rt_rx, backend, supervisor, plan, reporter);
    if let Some(hook) = hooks.on_complete {
        runtime = runtime.with_completion_hook(hook);
    }

    match runtime.run().await? {
        Some(Err(err)) => Err(err.into()),
        Some(Ok(())) => {
            info!("session finished successfully");
            Ok(())
        }
        None => Ok(()),
    }
}
