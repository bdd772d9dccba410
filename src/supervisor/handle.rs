// src/supervisor/handle.rs

//! One supervised child process and its exit listener.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::supervisor::spec::{ProcessSpec, RunCallback};
use crate::types::{CycleId, ExitOutcome, Role};

/// Upper bound for waiting on the stop signal to be delivered.
const KILL_ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Time a terminated process gets to exit before it is killed outright.
const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Teardown request: carries the channel on which the runner confirms that
/// the stop signal was sent.
type CancelRequest = oneshot::Sender<()>;

/// A spawned process.
///
/// - `cancel` detaches the exit listener and kills the process.
/// - `listener` is the Tokio task waiting on the process; it reports a
///   natural exit as `RuntimeEvent::ProcessExited` and nothing otherwise.
pub struct ChildProcessHandle {
    role: Role,
    pid: Option<u32>,
    cycle: CycleId,
    cancel: Option<oneshot::Sender<CancelRequest>>,
    listener: tokio::task::JoinHandle<()>,
}

impl std::fmt::Debug for ChildProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildProcessHandle")
            .field("role", &self.role)
            .field("pid", &self.pid)
            .field("cycle", &self.cycle)
            .finish_non_exhaustive()
    }
}

impl ChildProcessHandle {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn cycle(&self) -> CycleId {
        self.cycle
    }

    /// Still running and not torn down.
    pub fn is_live(&self) -> bool {
        self.cancel.is_some() && !self.listener.is_finished()
    }

    /// The listener task; it finishes once the process was reaped.
    pub(crate) fn into_listener(self) -> tokio::task::JoinHandle<()> {
        self.listener
    }

    /// Detach the exit listener and stop the process.
    ///
    /// On unix the process receives SIGTERM and is killed if it is still
    /// running after a grace period. Waits only until the first signal was
    /// delivered, not for the process to exit. Calling it again, or on a
    /// process that already exited, does nothing.
    pub async fn teardown(&mut self) {
        let Some(cancel) = self.cancel.take() else {
            return;
        };

        let (ack_tx, ack_rx) = oneshot::channel::<()>();
        if cancel.send(ack_tx).is_err() {
            debug!(
                role = %self.role,
                pid = ?self.pid,
                "process already exited; nothing to tear down"
            );
            return;
        }

        match tokio::time::timeout(KILL_ACK_TIMEOUT, ack_rx).await {
            Ok(Ok(())) => {
                debug!(role = %self.role, pid = ?self.pid, cycle = self.cycle, "process torn down");
            }
            Ok(Err(_)) => {
                debug!(role = %self.role, pid = ?self.pid, "listener ended while tearing down");
            }
            Err(_) => {
                warn!(
                    role = %self.role,
                    pid = ?self.pid,
                    "timed out waiting for stop signal delivery"
                );
            }
        }
    }
}

/// Spawn `spec` for `cycle`.
///
/// Returns `None` when the OS refuses to start the process; the failure is
/// then delivered as a `ProcessExited` event with
/// [`ExitOutcome::SpawnFailed`], like any other exit.
pub(crate) fn spawn_process(
    spec: &ProcessSpec,
    cycle: CycleId,
    callback: Option<&mut RunCallback>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Option<ChildProcessHandle> {
    let role = spec.role;

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(std::process::Stdio::null())
        .stdout(spec.stdio.to_stdio())
        .stderr(spec.stdio.to_stdio())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            warn!(%role, cycle, program = %spec.program, error = %err, "failed to spawn process");
            let outcome = ExitOutcome::SpawnFailed(err.to_string());
            // Never block the runtime on its own channel.
            tokio::spawn(async move {
                let _ = runtime_tx
                    .send(RuntimeEvent::ProcessExited {
                        cycle,
                        role,
                        pid: None,
                        outcome,
                    })
                    .await;
            });
            return None;
        }
    };

    let pid = child.id();
    info!(%role, cycle, ?pid, program = %spec.program, "process started");

    if let Some(callback) = callback {
        (*callback)(&mut child);
    }
    drain_output(&mut child, role);

    let (cancel_tx, cancel_rx) = oneshot::channel::<CancelRequest>();
    let listener = tokio::spawn(listen_for_exit(child, role, pid, cycle, cancel_rx, runtime_tx));

    Some(ChildProcessHandle {
        role,
        pid,
        cycle,
        cancel: Some(cancel_tx),
        listener,
    })
}

/// Consume piped streams the run hook left alone so the child never blocks
/// on a full pipe; log them at debug.
fn drain_output(child: &mut Child, role: Role) {
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(log_lines(stdout, role, "stdout"));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(log_lines(stderr, role, "stderr"));
    }
}

async fn log_lines<R>(stream: R, role: Role, name: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(%role, stream = name, "{}", line);
    }
}

/// Either the process exits on its own, or a teardown request arrives.
async fn listen_for_exit(
    mut child: Child,
    role: Role,
    pid: Option<u32>,
    cycle: CycleId,
    mut cancel_rx: oneshot::Receiver<CancelRequest>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    tokio::select! {
        biased;

        request = &mut cancel_rx => {
            if !send_terminate(role, pid) {
                force_kill(&mut child, role, pid);
            }
            match request {
                Ok(ack) => {
                    let _ = ack.send(());
                }
                Err(_) => {
                    debug!(%role, ?pid, "handle dropped without teardown; stopping process");
                }
            }
            // Reap it; no exit event for a torn-down process.
            if tokio::time::timeout(TERMINATE_GRACE, child.wait()).await.is_err() {
                warn!(%role, ?pid, "process ignored the terminate signal; killing it");
                force_kill(&mut child, role, pid);
                let _ = child.wait().await;
            }
        }

        status = child.wait() => {
            let outcome = match status {
                Ok(status) => ExitOutcome::from_status(status),
                Err(err) => {
                    warn!(%role, ?pid, error = %err, "waiting for process failed");
                    ExitOutcome::Failed(-1)
                }
            };

            info!(%role, cycle, ?pid, %outcome, "process exited");

            let _ = runtime_tx
                .send(RuntimeEvent::ProcessExited {
                    cycle,
                    role,
                    pid,
                    outcome,
                })
                .await;
        }
    }
}

/// Send SIGTERM so the process can shut down cleanly. Returns `false` when
/// the signal could not be sent.
#[cfg(unix)]
fn send_terminate(role: Role, pid: Option<u32>) -> bool {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(raw) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return false;
    };
    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) => true,
        Err(err) => {
            debug!(%role, ?pid, error = %err, "SIGTERM failed");
            false
        }
    }
}

#[cfg(not(unix))]
fn send_terminate(_role: Role, _pid: Option<u32>) -> bool {
    false
}

fn force_kill(child: &mut Child, role: Role, pid: Option<u32>) {
    if let Err(err) = child.start_kill() {
        debug!(%role, ?pid, error = %err, "kill failed; process probably exited already");
    }
}
