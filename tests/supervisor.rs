// tests/supervisor.rs
#![cfg(unix)]

use std::error::Error;
use std::process::Command as StdCommand;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use tsrun::engine::RuntimeEvent;
use tsrun::supervisor::{ProcessSpec, ProcessSupervisor, StdioPolicy};
use tsrun::types::{ExitOutcome, Role};
use tsrun_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

fn shell(role: Role, script: &str) -> ProcessSpec {
    ProcessSpec {
        role,
        program: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        env: vec![],
        stdio: StdioPolicy::Ignore,
    }
}

fn long_running(role: Role) -> ProcessSpec {
    shell(role, "sleep 30")
}

fn pid_alive(pid: u32) -> bool {
    StdCommand::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Poll until the process is gone (killed and reaped).
async fn wait_until_gone(pid: u32) -> bool {
    for _ in 0..100 {
        if !pid_alive(pid) {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn replacing_a_role_keeps_exactly_one_live_process() -> TestResult {
    init_tracing();
    let (tx, _rx) = mpsc::channel::<RuntimeEvent>(16);
    let mut supervisor = ProcessSupervisor::new(tx);

    let mut pids = Vec::new();
    for cycle in 1..=3 {
        let pid = supervisor
            .replace_and_spawn(&long_running(Role::Run), cycle, None)
            .await
            .expect("spawned");
        pids.push(pid);
        assert_eq!(supervisor.live_count(), 1);
        assert_eq!(supervisor.pid(Role::Run), Some(pid));
    }

    for old in &pids[..2] {
        assert!(wait_until_gone(*old).await, "process {old} still alive");
    }
    assert!(pid_alive(pids[2]));

    supervisor.teardown_all().await;
    assert!(wait_until_gone(pids[2]).await);
    Ok(())
}

#[tokio::test]
async fn teardown_is_idempotent() -> TestResult {
    init_tracing();
    let (tx, _rx) = mpsc::channel::<RuntimeEvent>(16);
    let mut supervisor = ProcessSupervisor::new(tx);

    let pid = supervisor
        .replace_and_spawn(&long_running(Role::Run), 1, None)
        .await
        .expect("spawned");

    supervisor.teardown(Role::Run).await;
    supervisor.teardown(Role::Run).await;
    supervisor.teardown_all().await;
    supervisor.teardown_all().await;

    assert_eq!(supervisor.live_count(), 0);
    assert!(!supervisor.is_live(Role::Run));
    assert!(wait_until_gone(pid).await);
    Ok(())
}

#[tokio::test]
async fn torn_down_processes_report_no_exit() -> TestResult {
    init_tracing();
    let (tx, mut rx) = mpsc::channel::<RuntimeEvent>(16);
    let mut supervisor = ProcessSupervisor::new(tx);

    let pid = supervisor
        .replace_and_spawn(&long_running(Role::Run), 1, None)
        .await
        .expect("spawned");
    supervisor.teardown_all().await;
    assert!(wait_until_gone(pid).await);

    sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err(), "torn-down process reported an exit");
    Ok(())
}

#[tokio::test]
async fn natural_exit_is_reported_with_its_cycle() -> TestResult {
    init_tracing();
    let (tx, mut rx) = mpsc::channel::<RuntimeEvent>(16);
    let mut supervisor = ProcessSupervisor::new(tx);

    let pid = supervisor
        .replace_and_spawn(&shell(Role::Exec, "exit 3"), 7, None)
        .await;

    let event = timeout(Duration::from_secs(5), rx.recv())
        .await?
        .expect("exit event");
    match event {
        RuntimeEvent::ProcessExited {
            cycle,
            role,
            pid: reported,
            outcome,
        } => {
            assert_eq!(cycle, 7);
            assert_eq!(role, Role::Exec);
            assert_eq!(reported, pid);
            assert_eq!(outcome, ExitOutcome::Failed(3));
        }
        other => panic!("unexpected event {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn spawn_failure_is_reported_as_an_exit() -> TestResult {
    init_tracing();
    let (tx, mut rx) = mpsc::channel::<RuntimeEvent>(16);
    let mut supervisor = ProcessSupervisor::new(tx);

    let spec = ProcessSpec {
        program: "tsrun-test-no-such-program".to_string(),
        args: vec![],
        ..long_running(Role::Run)
    };
    let pid = supervisor.replace_and_spawn(&spec, 1, None).await;
    assert_eq!(pid, None);
    assert_eq!(supervisor.live_count(), 0);

    let event = timeout(Duration::from_secs(5), rx.recv())
        .await?
        .expect("exit event");
    assert!(matches!(
        event,
        RuntimeEvent::ProcessExited {
            cycle: 1,
            role: Role::Run,
            pid: None,
            outcome: ExitOutcome::SpawnFailed(_),
        }
    ));
    Ok(())
}

#[tokio::test]
async fn run_and_exec_live_together_and_go_down_together() -> TestResult {
    init_tracing();
    let (tx, _rx) = mpsc::channel::<RuntimeEvent>(16);
    let mut supervisor = ProcessSupervisor::new(tx);

    let run = supervisor
        .replace_and_spawn(&long_running(Role::Run), 1, None)
        .await
        .expect("run spawned");
    let exec = supervisor
        .replace_and_spawn(&long_running(Role::Exec), 1, None)
        .await
        .expect("exec spawned");

    assert!(supervisor.is_live(Role::Run));
    assert!(supervisor.is_live(Role::Exec));
    assert_eq!(supervisor.live_count(), 2);

    supervisor.teardown_all().await;

    assert_eq!(supervisor.live_count(), 0);
    assert!(wait_until_gone(run).await);
    assert!(wait_until_gone(exec).await);
    Ok(())
}

#[tokio::test]
async fn child_environment_is_applied() -> TestResult {
    init_tracing();
    let (tx, mut rx) = mpsc::channel::<RuntimeEvent>(16);
    let mut supervisor = ProcessSupervisor::new(tx);

    let spec = ProcessSpec {
        env: vec![("NODE_ENV".to_string(), "production".to_string())],
        ..shell(Role::Run, "test \"$NODE_ENV\" = production")
    };
    supervisor.replace_and_spawn(&spec, 1, None).await;

    let event = timeout(Duration::from_secs(5), rx.recv())
        .await?
        .expect("exit event");
    assert!(matches!(
        event,
        RuntimeEvent::ProcessExited {
            outcome: ExitOutcome::Success,
            ..
        }
    ));
    Ok(())
}

#[tokio::test]
async fn teardown_lets_the_process_handle_sigterm() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let marker = dir.path().join("terminated");
    let script = format!(
        "trap 'echo term > {}; exit 0' TERM; while true; do sleep 0.05; done",
        marker.display()
    );
    let (tx, mut rx) = mpsc::channel::<RuntimeEvent>(16);
    let mut supervisor = ProcessSupervisor::new(tx);

    let pid = supervisor
        .replace_and_spawn(&shell(Role::Run, &script), 1, None)
        .await
        .expect("spawned");
    // Give the shell time to install its trap.
    sleep(Duration::from_millis(200)).await;

    timeout(Duration::from_secs(10), supervisor.shutdown()).await?;

    assert!(marker.exists(), "TERM handler did not run");
    assert!(!pid_alive(pid));
    assert!(timeout(Duration::from_millis(300), rx.recv()).await.is_err());
    Ok(())
}

#[tokio::test]
async fn process_ignoring_sigterm_is_killed_after_the_grace_period() -> TestResult {
    init_tracing();
    let (tx, _rx) = mpsc::channel::<RuntimeEvent>(16);
    let mut supervisor = ProcessSupervisor::new(tx);

    let pid = supervisor
        .replace_and_spawn(
            &shell(Role::Run, "trap '' TERM; while true; do sleep 0.05; done"),
            1,
            None,
        )
        .await
        .expect("spawned");
    sleep(Duration::from_millis(200)).await;

    supervisor.teardown_all().await;
    assert_eq!(supervisor.live_count(), 0);
    assert!(pid_alive(pid), "ignored TERM should keep it alive during the grace period");

    timeout(Duration::from_secs(10), supervisor.shutdown()).await?;
    assert!(!pid_alive(pid));
    Ok(())
}
