// tests/runtime_session.rs
#![cfg(unix)]

use std::error::Error;
use std::fs;
use std::path::Path;
use std::process::Command as StdCommand;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use tsrun::config::{BuildConfig, CompileOptions};
use tsrun::engine::{
    ControllerOptions, CycleController, CycleError, CycleResult, Reporter, Runtime, RuntimeEvent,
    TriggerReason,
};
use tsrun::errors::TsrunError;
use tsrun::supervisor::{ProcessSupervisor, RunHook, SpawnPlan};
use tsrun::types::{ExitOutcome, OutputLevel, Role, TeardownPolicy};
use tsrun::{SessionChannel, SessionHooks, run_session};
use tsrun_test_utils::builders::{ProjectFixture, write_script};
use tsrun_test_utils::fake_backend::{FakeBuildBackend, failed, succeeded, type_checked};
use tsrun_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

/// Run hook collecting the artifact's stdout.
fn capture_stdout() -> (RunHook, mpsc::UnboundedReceiver<String>) {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let hook = RunHook::Custom(Box::new(move |child: &mut Child| {
        if let Some(mut stdout) = child.stdout.take() {
            let out_tx = out_tx.clone();
            tokio::spawn(async move {
                let mut text = String::new();
                let _ = stdout.read_to_string(&mut text).await;
                let _ = out_tx.send(text);
            });
        }
    }));
    (hook, out_rx)
}

fn record_result() -> (
    tsrun::engine::CompletionHook,
    Arc<Mutex<Option<CycleResult>>>,
) {
    let slot = Arc::new(Mutex::new(None));
    let hook_slot = Arc::clone(&slot);
    let hook: tsrun::engine::CompletionHook = Box::new(move |result: &CycleResult| {
        *hook_slot.lock().unwrap() = Some(result.clone());
    });
    (hook, slot)
}

#[tokio::test]
async fn one_shot_compile_and_run_prints_output() -> TestResult {
    init_tracing();
    let project = ProjectFixture::new();
    let config = Arc::new(project.config().build());
    write_script(&config.artifact_path(), "echo Basics");

    let channel = SessionChannel::new();
    let backend = FakeBuildBackend::new(channel.sender());
    let submitted = backend.submitted();
    let (run, mut stdout) = capture_stdout();
    let (on_complete, result) = record_result();

    let hooks = SessionHooks {
        run,
        on_complete: Some(on_complete),
    };
    with_timeout(run_session(&project.options(), config, backend, hooks, channel)).await?;

    assert_eq!(*result.lock().unwrap(), Some(Ok(())));
    assert_eq!(*submitted.lock().unwrap(), vec![1]);

    let printed = with_timeout(stdout.recv()).await.expect("stdout captured");
    assert_eq!(printed, "Basics\n");
    Ok(())
}

#[tokio::test]
async fn compile_diagnostics_reach_the_completion_hook_and_the_caller() -> TestResult {
    init_tracing();
    let project = ProjectFixture::new();
    let config = Arc::new(project.config().build());
    write_script(&config.artifact_path(), "echo should-not-run");

    let channel = SessionChannel::new();
    let backend = FakeBuildBackend::new(channel.sender()).then(vec![failed(
        "src/index.ts(7,13): error TS2304: Cannot find name 'missing'.",
    )]);
    let (run, mut stdout) = capture_stdout();
    let (on_complete, result) = record_result();

    let hooks = SessionHooks {
        run,
        on_complete: Some(on_complete),
    };
    let err = with_timeout(run_session(&project.options(), config, backend, hooks, channel))
        .await
        .unwrap_err();

    match &err {
        TsrunError::CompileError(failure) => assert!(failure.message.contains("(7,13)")),
        other => panic!("expected CompileError, got {other:?}"),
    }
    assert!(err.is_reported());

    match &*result.lock().unwrap() {
        Some(Err(CycleError::Compile(failure))) => assert!(failure.message.contains("(7,13)")),
        other => panic!("completion hook got {other:?}"),
    }

    assert!(stdout.try_recv().is_err(), "artifact ran after a failed compile");
    Ok(())
}

#[tokio::test]
async fn failing_artifact_fails_a_one_shot_session() -> TestResult {
    init_tracing();
    let project = ProjectFixture::new();
    let config = Arc::new(project.config().build());
    write_script(&config.artifact_path(), "exit 4");

    let channel = SessionChannel::new();
    let backend = FakeBuildBackend::new(channel.sender());
    let options = CompileOptions {
        run: true,
        output_level: OutputLevel::Silent,
        ..project.options()
    };

    let hooks = SessionHooks {
        run: RunHook::Disabled,
        on_complete: None,
    };
    let err = with_timeout(run_session(&options, config, backend, hooks, channel))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TsrunError::ProcessError {
            role: Role::Run,
            outcome: ExitOutcome::Failed(4)
        }
    ));
    Ok(())
}

#[tokio::test]
async fn type_problems_do_not_prevent_running() -> TestResult {
    init_tracing();
    let project = ProjectFixture::new();
    let config = Arc::new(project.config().check_types(true).build());
    write_script(&config.artifact_path(), "echo checked");

    let channel = SessionChannel::new();
    let backend = FakeBuildBackend::new(channel.sender()).then(vec![
        type_checked(Some("src/index.ts(2,5): error TS2322")),
        succeeded(),
    ]);
    let (run, mut stdout) = capture_stdout();

    let hooks = SessionHooks {
        run,
        on_complete: None,
    };
    with_timeout(run_session(&project.options(), config, backend, hooks, channel)).await?;

    let printed = with_timeout(stdout.recv()).await.expect("stdout captured");
    assert_eq!(printed, "checked\n");
    Ok(())
}

#[tokio::test]
async fn compile_only_session_does_not_run_the_artifact() -> TestResult {
    init_tracing();
    let project = ProjectFixture::new();
    let config = Arc::new(project.config().build());
    let marker = project.path("ran.txt");
    write_script(
        &config.artifact_path(),
        &format!("touch {}", marker.display()),
    );

    let channel = SessionChannel::new();
    let backend = FakeBuildBackend::new(channel.sender());

    with_timeout(run_session(
        &project.options(),
        config,
        backend,
        SessionHooks::default(),
        channel,
    ))
    .await?;

    sleep(Duration::from_millis(100)).await;
    assert!(!marker.exists());
    Ok(())
}

// --- watch sessions, driven by hand-fed build requests ---

fn pid_alive(pid: u32) -> bool {
    StdCommand::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

async fn wait_until_gone(pid: u32) -> bool {
    for _ in 0..100 {
        if !pid_alive(pid) {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

/// Wait until `path` lists `count` pids, one per line.
async fn wait_for_pids(path: &Path, count: usize) -> Vec<u32> {
    for _ in 0..100 {
        let pids: Vec<u32> = fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .filter_map(|l| l.trim().parse().ok())
            .collect();
        if pids.len() >= count {
            return pids;
        }
        sleep(Duration::from_millis(50)).await;
    }
    panic!("{} never listed {count} pids", path.display());
}

/// Script recording its pid, then staying alive.
fn long_lived_script(pid_file: &Path) -> String {
    format!("echo $$ >> {}\nexec sleep 30", pid_file.display())
}

struct WatchSession {
    tx: mpsc::Sender<RuntimeEvent>,
    join: tokio::task::JoinHandle<tsrun::errors::Result<Option<CycleResult>>>,
}

impl WatchSession {
    fn start(
        config: &BuildConfig,
        options: &CompileOptions,
        controller: ControllerOptions,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<RuntimeEvent>(64);
        let backend = FakeBuildBackend::new(tx.clone());
        let plan = SpawnPlan::new(config, options, RunHook::Inherit);
        let core = CycleController::new(controller);
        let supervisor = ProcessSupervisor::new(tx.clone());
        let reporter = Reporter::new(OutputLevel::Silent, false);

        let runtime = Runtime::new(core, rx, backend, supervisor, plan, reporter);
        let join = tokio::spawn(runtime.run());
        Self { tx, join }
    }

    async fn rebuild(&self, reason: TriggerReason) {
        self.tx
            .send(RuntimeEvent::BuildRequested { reason })
            .await
            .expect("runtime alive");
    }

    async fn shutdown(self) -> tsrun::errors::Result<Option<CycleResult>> {
        self.tx
            .send(RuntimeEvent::ShutdownRequested)
            .await
            .expect("runtime alive");
        with_timeout(self.join).await.expect("runtime task panicked")
    }
}

fn watch_controller(exec: bool) -> ControllerOptions {
    ControllerOptions {
        watch: true,
        check_types: false,
        run: true,
        exec,
        teardown: TeardownPolicy::OnCompileStart,
    }
}

#[tokio::test]
async fn successive_watch_cycles_keep_one_run_process() -> TestResult {
    init_tracing();
    let project = ProjectFixture::new();
    let config = project.config().build();
    let pid_file = project.path("run.pids");
    write_script(&config.artifact_path(), &long_lived_script(&pid_file));

    let options = CompileOptions {
        watch: true,
        run: true,
        ..project.options()
    };
    let session = WatchSession::start(&config, &options, watch_controller(false));

    session.rebuild(TriggerReason::Initial).await;
    let first = wait_for_pids(&pid_file, 1).await;

    session
        .rebuild(TriggerReason::FileWatch {
            paths: vec![project.path("src/index.ts")],
        })
        .await;
    let pids = wait_for_pids(&pid_file, 2).await;

    assert_eq!(pids.len(), 2);
    assert_eq!(pids[0], first[0]);
    assert!(wait_until_gone(pids[0]).await, "cycle-1 process still alive");
    assert!(pid_alive(pids[1]));

    // The torn-down process must not count as an exit of the live cycle.
    sleep(Duration::from_millis(200)).await;
    assert!(pid_alive(pids[1]));

    let result = session.shutdown().await?;
    assert_eq!(result, None);
    assert!(wait_until_gone(pids[1]).await);
    Ok(())
}

#[tokio::test]
async fn exec_and_run_live_together_and_restart_together() -> TestResult {
    init_tracing();
    let project = ProjectFixture::new();
    let config = project.config().build();
    let run_pids = project.path("run.pids");
    let exec_pids = project.path("exec.pids");
    write_script(&config.artifact_path(), &long_lived_script(&run_pids));
    let exec_script = write_script(&project.path("exec.sh"), &long_lived_script(&exec_pids));

    let options = CompileOptions {
        watch: true,
        run: true,
        exec: Some(format!("sh {}", exec_script.display())),
        ..project.options()
    };
    let session = WatchSession::start(&config, &options, watch_controller(true));

    session.rebuild(TriggerReason::Initial).await;
    let run_first = wait_for_pids(&run_pids, 1).await[0];
    let exec_first = wait_for_pids(&exec_pids, 1).await[0];
    assert!(pid_alive(run_first));
    assert!(pid_alive(exec_first));

    session
        .rebuild(TriggerReason::FileWatch { paths: vec![] })
        .await;
    let run_second = wait_for_pids(&run_pids, 2).await[1];
    let exec_second = wait_for_pids(&exec_pids, 2).await[1];

    assert!(wait_until_gone(run_first).await);
    assert!(wait_until_gone(exec_first).await);
    assert!(pid_alive(run_second));
    assert!(pid_alive(exec_second));

    session.shutdown().await?;
    assert!(wait_until_gone(run_second).await);
    assert!(wait_until_gone(exec_second).await);
    Ok(())
}

#[tokio::test]
async fn failed_rebuild_keeps_last_good_process_when_configured() -> TestResult {
    init_tracing();
    let project = ProjectFixture::new();
    let config = project.config().build();
    let pid_file = project.path("run.pids");
    write_script(&config.artifact_path(), &long_lived_script(&pid_file));

    let options = CompileOptions {
        watch: true,
        run: true,
        ..project.options()
    };

    let (tx, rx) = mpsc::channel::<RuntimeEvent>(64);
    let backend = FakeBuildBackend::new(tx.clone())
        .then(vec![succeeded()])
        .then(vec![failed("broken")])
        .then(vec![succeeded()]);
    let submitted = backend.submitted();
    let core = CycleController::new(ControllerOptions {
        teardown: TeardownPolicy::KeepUntilSuccess,
        ..watch_controller(false)
    });
    let runtime = Runtime::new(
        core,
        rx,
        backend,
        ProcessSupervisor::new(tx.clone()),
        SpawnPlan::new(&config, &options, RunHook::Inherit),
        Reporter::new(OutputLevel::Silent, false),
    );
    let join = tokio::spawn(runtime.run());

    tx.send(RuntimeEvent::BuildRequested {
        reason: TriggerReason::Initial,
    })
    .await?;
    let first = wait_for_pids(&pid_file, 1).await[0];

    tx.send(RuntimeEvent::BuildRequested {
        reason: TriggerReason::FileWatch { paths: vec![] },
    })
    .await?;
    // Let the failure land.
    for _ in 0..100 {
        if submitted.lock().unwrap().len() == 2 {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    sleep(Duration::from_millis(200)).await;
    assert!(pid_alive(first), "last good process torn down by a failed rebuild");

    tx.send(RuntimeEvent::BuildRequested {
        reason: TriggerReason::FileWatch { paths: vec![] },
    })
    .await?;
    let second = wait_for_pids(&pid_file, 2).await[1];
    assert!(wait_until_gone(first).await);
    assert!(pid_alive(second));

    tx.send(RuntimeEvent::ShutdownRequested).await?;
    with_timeout(join).await??;
    assert!(wait_until_gone(second).await);
    Ok(())
}
