// src/build/runner.rs

//! Runs the compiler, plugin hooks and the type checker for one cycle.

use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::build::command::{CommandLine, compiler_command, plugin_command, type_checker_command};
use crate::build::{BuildEvent, BuildFailure};
use crate::config::BuildConfig;
use crate::engine::RuntimeEvent;
use crate::types::CycleId;

/// Run a command to completion, capturing its output.
///
/// Returns `Ok(None)` when `cancel_rx` resolves first (explicit cancel or the
/// sender being dropped); the child is killed on drop in that case.
async fn run_captured(
    command: &CommandLine,
    cancel_rx: &mut oneshot::Receiver<()>,
) -> Result<Option<Output>> {
    let child = Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning `{}`", command.program))?;

    tokio::select! {
        output = child.wait_with_output() => {
            let output = output.with_context(|| format!("waiting for `{}`", command.program))?;
            Ok(Some(output))
        }
        _ = cancel_rx => Ok(None),
    }
}

/// Join stderr and stdout into one diagnostic text. Compilers disagree on
/// which stream carries errors.
fn diagnostic_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let parts: Vec<&str> = [stderr.trim(), stdout.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();

    if parts.is_empty() {
        match output.status.code() {
            Some(code) => format!("exited with code {code} without output"),
            None => "terminated by a signal without output".to_string(),
        }
    } else {
        parts.join("\n")
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Compile one cycle and report `Succeeded` / `Failed`.
///
/// A cancelled compilation reports nothing; the cycle it belonged to has
/// already been superseded.
pub async fn run_compile(
    config: Arc<BuildConfig>,
    cycle: CycleId,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let started = Instant::now();
    let command = compiler_command(&config);
    info!(cycle, program = %command.program, "starting compiler");
    debug!(cycle, args = ?command.args, "compiler arguments");

    let event = match run_captured(&command, &mut cancel_rx).await {
        Ok(None) => {
            debug!(cycle, "compilation cancelled");
            return;
        }
        Err(err) => BuildEvent::Failed(BuildFailure::fatal(
            format!("{err:#}"),
            Some(elapsed_ms(started)),
        )),
        Ok(Some(output)) if !output.status.success() => BuildEvent::Failed(
            BuildFailure::diagnostics(diagnostic_text(&output), Some(elapsed_ms(started))),
        ),
        Ok(Some(output)) => {
            match run_plugins(&config, cycle, &mut cancel_rx).await {
                PluginsOutcome::Cancelled => return,
                PluginsOutcome::Failed(message) => BuildEvent::Failed(
                    BuildFailure::diagnostics(message, Some(elapsed_ms(started))),
                ),
                PluginsOutcome::Done => BuildEvent::Succeeded {
                    elapsed_ms: elapsed_ms(started),
                    output: String::from_utf8_lossy(&output.stdout).trim().to_string(),
                },
            }
        }
    };

    info!(cycle, ?event, "compiler finished");

    if runtime_tx
        .send(RuntimeEvent::Build { cycle, event })
        .await
        .is_err()
    {
        debug!(cycle, "runtime gone; dropping compile result");
    }
}

enum PluginsOutcome {
    Done,
    Failed(String),
    Cancelled,
}

async fn run_plugins(
    config: &BuildConfig,
    cycle: CycleId,
    cancel_rx: &mut oneshot::Receiver<()>,
) -> PluginsOutcome {
    for hook in config.plugins.iter() {
        let command = plugin_command(hook, config);
        debug!(cycle, hook = %hook, "running plugin hook");

        match run_captured(&command, cancel_rx).await {
            Ok(None) => return PluginsOutcome::Cancelled,
            Ok(Some(output)) if output.status.success() => {}
            Ok(Some(output)) => {
                return PluginsOutcome::Failed(format!(
                    "plugin `{hook}` failed:\n{}",
                    diagnostic_text(&output)
                ));
            }
            Err(err) => {
                return PluginsOutcome::Failed(format!("plugin `{hook}` failed: {err:#}"));
            }
        }
    }
    PluginsOutcome::Done
}

/// Type-check one cycle and report `TypeCheckCompleted`.
///
/// A checker that cannot start still completes (with diagnostics), so a
/// cycle never waits forever on the second signal.
pub async fn run_type_check(
    config: Arc<BuildConfig>,
    cycle: CycleId,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let started = Instant::now();
    let command = type_checker_command(&config);
    info!(cycle, program = %command.program, "starting type checker");

    let diagnostics = match run_captured(&command, &mut cancel_rx).await {
        Ok(None) => {
            debug!(cycle, "type check cancelled");
            return;
        }
        Ok(Some(output)) if output.status.success() => None,
        Ok(Some(output)) => Some(diagnostic_text(&output)),
        Err(err) => {
            warn!(cycle, error = %err, "type checker could not run");
            Some(format!("type checker could not run: {err:#}"))
        }
    };

    let event = BuildEvent::TypeCheckCompleted {
        elapsed_ms: elapsed_ms(started),
        diagnostics,
    };

    if runtime_tx
        .send(RuntimeEvent::Build { cycle, event })
        .await
        .is_err()
    {
        debug!(cycle, "runtime gone; dropping type check result");
    }
}
