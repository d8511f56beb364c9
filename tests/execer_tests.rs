//! Integration tests for the baseline OS execer: spawn, capture, reap,
//! abort, and timeout behavior.


use std::io::Write;
use std::time::{Duration, Instant};

use taskrun::error::ExecError;
use taskrun::execer::{
    Command, Execer, FailureCause, OsExecer, OutputBuffer, ProcessState,
};
use test_support::sh;

#[tokio::test]
async fn test_true_completes_with_exit_zero() {
    let execer = OsExecer::new();
    let handle = execer
        .exec(Command::new(["true"]))
        .await
        .expect("spawn true");

    let status = handle.wait().await;
    assert_eq!(status.state, ProcessState::Complete);
    assert_eq!(status.exit_code, Some(0));
    assert!(status.cause.is_none());
}

#[tokio::test]
async fn test_false_completes_with_exit_one() {
    let execer = OsExecer::new();
    let handle = execer
        .exec(Command::new(["false"]))
        .await
        .expect("spawn false");

    let status = handle.wait().await;
    assert_eq!(status.state, ProcessState::Complete);
    assert_eq!(status.exit_code, Some(1));
}

#[tokio::test]
async fn test_exit_code_is_preserved() {
    let execer = OsExecer::new();
    let handle = execer.exec(sh("exit 42")).await.expect("spawn");

    let status = handle.wait().await;
    assert_eq!(status.state, ProcessState::Complete);
    assert_eq!(status.exit_code, Some(42));
}

#[tokio::test]
async fn test_stdout_capture() {
    let execer = OsExecer::new();
    let stdout = OutputBuffer::new();
    let stderr = OutputBuffer::new();
    let cmd = Command::new(["echo", "hello world"])
        .with_stdout(stdout.clone())
        .with_stderr(stderr.clone());

    let status = execer.exec(cmd).await.expect("spawn echo").wait().await;

    assert_eq!(status.state, ProcessState::Complete);
    assert_eq!(status.exit_code, Some(0));
    assert_eq!(stdout.to_string_lossy(), "hello world\n");
    assert_eq!(stderr.to_string_lossy(), "");
    // The status snapshots the same capture.
    assert_eq!(status.stdout.as_deref(), Some("hello world\n"));
    assert_eq!(status.stderr.as_deref(), Some(""));
}

#[tokio::test]
async fn test_stderr_capture() {
    let execer = OsExecer::new();
    let stdout = OutputBuffer::new();
    let stderr = OutputBuffer::new();
    let cmd = sh("echo oops >&2")
        .with_stdout(stdout.clone())
        .with_stderr(stderr.clone());

    let status = execer.exec(cmd).await.expect("spawn").wait().await;

    assert_eq!(status.state, ProcessState::Complete);
    assert_eq!(stdout.to_string_lossy(), "");
    assert_eq!(stderr.to_string_lossy(), "oops\n");
}

#[tokio::test]
async fn test_output_discarded_without_sinks() {
    let execer = OsExecer::new();
    let status = execer
        .exec(sh("echo ignored"))
        .await
        .expect("spawn")
        .wait()
        .await;

    assert_eq!(status.state, ProcessState::Complete);
    assert!(status.stdout.is_none());
    assert!(status.stderr.is_none());
}

#[tokio::test]
async fn test_env_overrides_are_merged() {
    let execer = OsExecer::new();
    let stdout = OutputBuffer::new();
    let cmd = sh("printf %s \"$TASKRUN_TEST_ENV\"")
        .with_env("TASKRUN_TEST_ENV", "from-override")
        .with_stdout(stdout.clone());

    let status = execer.exec(cmd).await.expect("spawn").wait().await;

    assert_eq!(status.exit_code, Some(0));
    assert_eq!(stdout.to_string_lossy(), "from-override");
}

#[tokio::test]
async fn test_script_file_execution() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script_path = dir.path().join("script.sh");
    let mut file = std::fs::File::create(&script_path).expect("create script");
    writeln!(file, "echo from-script").expect("write script");
    drop(file);

    let execer = OsExecer::new();
    let stdout = OutputBuffer::new();
    let cmd = Command::new(["sh", script_path.to_str().expect("utf8 path")])
        .with_stdout(stdout.clone());

    let status = execer.exec(cmd).await.expect("spawn").wait().await;

    assert_eq!(status.exit_code, Some(0));
    assert_eq!(stdout.to_string_lossy(), "from-script\n");
}

#[tokio::test]
async fn test_spawn_failure_returns_error_and_no_handle() {
    let execer = OsExecer::new();
    let result = execer
        .exec(Command::new(["definitely-not-a-real-binary-taskrun"]))
        .await;

    match result {
        Err(ExecError::Spawn { program, .. }) => {
            assert_eq!(program, "definitely-not-a-real-binary-taskrun");
        }
        other => panic!("expected spawn error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_argv_is_rejected() {
    let execer = OsExecer::new();
    let result = execer.exec(Command::default()).await;
    assert!(matches!(result, Err(ExecError::EmptyArgv)));
}

#[tokio::test]
async fn test_abort_terminates_running_process() {
    let execer = OsExecer::new();
    let handle = execer.exec(sh("sleep 5")).await.expect("spawn");

    let start = Instant::now();
    let status = handle.abort().await;

    assert_eq!(status.state, ProcessState::Aborted);
    assert_eq!(status.cause, Some(FailureCause::UserAbort));
    assert!(status.exit_code.is_none());
    assert!(
        start.elapsed() < Duration::from_secs(4),
        "abort should not wait out the sleep"
    );
}

#[tokio::test]
async fn test_abort_is_idempotent() {
    let execer = OsExecer::new();
    let handle = execer.exec(sh("sleep 5")).await.expect("spawn");

    let first = handle.abort().await;
    let second = handle.abort().await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_abort_after_completion_returns_existing_status() {
    let execer = OsExecer::new();
    let handle = execer.exec(Command::new(["true"])).await.expect("spawn");

    let completed = handle.wait().await;
    let aborted = handle.abort().await;

    assert_eq!(completed, aborted);
    assert_eq!(aborted.state, ProcessState::Complete);
    assert_eq!(aborted.exit_code, Some(0));
}

#[tokio::test]
async fn test_concurrent_aborts_agree_on_one_cause() {
    let execer = OsExecer::new();
    let handle = execer.exec(sh("sleep 5")).await.expect("spawn");

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move { handle.abort().await }));
    }

    let mut statuses = Vec::new();
    for task in tasks {
        statuses.push(task.await.expect("abort task"));
    }
    for status in &statuses {
        assert_eq!(status, &statuses[0]);
        assert_eq!(status.cause, Some(FailureCause::UserAbort));
    }
}

#[tokio::test]
async fn test_concurrent_waiters_observe_identical_status() {
    let execer = OsExecer::new();
    let handle = execer.exec(sh("sleep 5")).await.expect("spawn");

    let mut waiters = Vec::new();
    for _ in 0..8 {
        let handle = handle.clone();
        waiters.push(tokio::spawn(async move { handle.wait().await }));
    }

    // Give the waiters a moment to block, then abort.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let aborted = handle.abort().await;

    for waiter in waiters {
        let status = waiter.await.expect("wait task");
        assert_eq!(status, aborted);
    }
}

#[tokio::test]
async fn test_wait_is_repeatable() {
    let execer = OsExecer::new();
    let handle = execer.exec(Command::new(["true"])).await.expect("spawn");

    let first = handle.wait().await;
    let second = handle.wait().await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_timeout_yields_timedout_not_aborted() {
    let execer = OsExecer::new();
    let cmd = sh("sleep 5").with_timeout(Duration::from_millis(100));
    let handle = execer.exec(cmd).await.expect("spawn");

    let start = Instant::now();
    let status = handle.wait().await;

    assert_eq!(status.state, ProcessState::TimedOut);
    assert_eq!(status.cause, Some(FailureCause::Timeout));
    assert_ne!(status.cause, Some(FailureCause::UserAbort));
    assert!(
        start.elapsed() < Duration::from_secs(4),
        "timeout should fire well before the sleep finishes"
    );
}

#[tokio::test]
async fn test_zero_timeout_means_unbounded() {
    let execer = OsExecer::new();
    // Default timeout is zero; the command finishes on its own.
    let status = execer
        .exec(sh("sleep 1; exit 0"))
        .await
        .expect("spawn")
        .wait()
        .await;
    assert_eq!(status.state, ProcessState::Complete);
}

#[tokio::test]
async fn test_external_signal_maps_to_failed() {
    let execer = OsExecer::new();
    let handle = execer.exec(sh("kill -9 $$")).await.expect("spawn");

    let status = handle.wait().await;
    assert_eq!(status.state, ProcessState::Failed);
    assert_eq!(status.cause, Some(FailureCause::Signal));
    assert!(
        status.error.as_deref().is_some_and(|e| e.contains('9')),
        "signal number should be recorded, got {:?}",
        status.error
    );
}

#[tokio::test]
async fn test_status_peek_is_none_until_terminal() {
    let execer = OsExecer::new();
    let handle = execer.exec(sh("sleep 5")).await.expect("spawn");

    assert!(handle.status().is_none());
    let aborted = handle.abort().await;
    assert_eq!(handle.status(), Some(aborted));
}

#[tokio::test]
async fn test_correlation_ids_are_echoed() {
    let execer = OsExecer::new();
    let cmd = Command::new(["true"])
        .with_job_id("job-abc")
        .with_task_id("task-xyz");
    let handle = execer.exec(cmd).await.expect("spawn");

    assert_eq!(handle.job_id(), "job-abc");
    assert_eq!(handle.task_id(), "task-xyz");

    let status = handle.wait().await;
    assert_eq!(status.job_id, "job-abc");
    assert_eq!(status.task_id, "task-xyz");
}
