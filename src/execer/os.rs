//! Baseline OS execer: spawn, capture, reap.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::task::JoinHandle;

use crate::error::{ExecError, Result};
use crate::execer::command::{Command, OutputBuffer};
use crate::execer::memory::{ProcessTree, SystemProcessTree};
use crate::execer::process::{arm_timeout, ProcShared, ProcessHandle};
use crate::execer::status::{FailureCause, Status};
use crate::execer::Execer;

/// How long the reaper waits for output pumps to drain after the
/// process exits. Bounded because an orphaned descendant can inherit
/// the pipe and keep it open indefinitely.
const PUMP_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Executes commands as OS processes.
///
/// `exec` spawns the process and returns immediately; a detached reaper
/// task waits for OS-level exit in the background and settles the
/// handle's terminal [`Status`] exactly once. Kill requests (abort,
/// timeout, memory ceiling) are routed through the reaper, which
/// signals the whole discovered process tree, not just the root pid.
pub struct OsExecer {
    tree: Arc<dyn ProcessTree>,
}

impl OsExecer {
    pub fn new() -> Self {
        Self::with_tree(Arc::new(SystemProcessTree::new()))
    }

    /// Use a custom process-tree enumerator for descendant discovery.
    pub fn with_tree(tree: Arc<dyn ProcessTree>) -> Self {
        Self { tree }
    }
}

impl Default for OsExecer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Execer for OsExecer {
    async fn exec(&self, cmd: Command) -> Result<ProcessHandle> {
        let (program, args) = cmd.argv.split_first().ok_or(ExecError::EmptyArgv)?;

        let mut os_cmd = tokio::process::Command::new(program);
        os_cmd
            .args(args)
            .envs(&cmd.env)
            .stdin(Stdio::null())
            .stdout(stdio_for(&cmd.stdout))
            .stderr(stdio_for(&cmd.stderr));

        let mut child = os_cmd.spawn().map_err(|source| ExecError::Spawn {
            program: program.clone(),
            source,
        })?;

        // The pid stays readable until the reaper consumes the exit,
        // which only happens in the task spawned below.
        let pid = child.id().expect("pid is available before the child is reaped");

        let mut pumps = Vec::new();
        if let Some(sink) = cmd.stdout.clone() {
            if let Some(stream) = child.stdout.take() {
                pumps.push(tokio::spawn(pump(stream, sink)));
            }
        }
        if let Some(sink) = cmd.stderr.clone() {
            if let Some(stream) = child.stderr.take() {
                pumps.push(tokio::spawn(pump(stream, sink)));
            }
        }

        let shared = Arc::new(ProcShared::new(pid, cmd.job_id.clone(), cmd.task_id.clone()));
        if !cmd.timeout.is_zero() {
            arm_timeout(shared.clone(), cmd.timeout);
        }

        tracing::info!(pid, job_id = %cmd.job_id, task_id = %cmd.task_id, command = %cmd, "spawned process");

        tokio::spawn(reap(child, shared.clone(), self.tree.clone(), cmd, pumps));

        Ok(ProcessHandle::new(shared))
    }
}

fn stdio_for(sink: &Option<OutputBuffer>) -> Stdio {
    if sink.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    }
}

/// Copy a child output stream into its capture sink until EOF.
async fn pump<R: AsyncRead + Unpin>(mut stream: R, sink: OutputBuffer) {
    let mut buf = [0u8; 8192];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => sink.append(&buf[..n]),
        }
    }
}

/// Wait for OS-level exit, honoring kill requests, then settle the
/// terminal status exactly once.
async fn reap(
    mut child: Child,
    shared: Arc<ProcShared>,
    tree: Arc<dyn ProcessTree>,
    cmd: Command,
    pumps: Vec<JoinHandle<()>>,
) {
    let wait_result = tokio::select! {
        result = child.wait() => result,
        _ = shared.kill_requested() => {
            let pid = shared.pid();
            let enumerator = tree.clone();
            // Whole-tree kill: children can keep allocating after the
            // root dies. The enumerator treats dead pids as no-ops, and
            // start_kill covers a root it can no longer see.
            let _ = tokio::task::spawn_blocking(move || enumerator.kill_tree(pid)).await;
            let _ = child.start_kill();
            child.wait().await
        }
    };

    // Let capture finish before snapshotting; an orphaned writer must
    // not stall settling forever.
    for handle in pumps {
        let _ = tokio::time::timeout(PUMP_DRAIN_GRACE, handle).await;
    }

    let status = match wait_result {
        Ok(exit) => map_exit(exit, shared.claimed_cause()),
        Err(error) => Status::terminated(
            FailureCause::Spawn,
            Some(format!("wait failed: {error}")),
        ),
    };
    let status = status
        .with_outputs(
            cmd.stdout.as_ref().map(OutputBuffer::to_string_lossy),
            cmd.stderr.as_ref().map(OutputBuffer::to_string_lossy),
        )
        .with_ids(cmd.job_id, cmd.task_id);

    tracing::info!(
        pid = shared.pid(),
        job_id = %shared.job_id(),
        status = %status,
        "process settled"
    );
    shared.settle(status);
}

/// Map an OS exit status to a terminal [`Status`].
///
/// A normal exit is `Complete` regardless of any claimed cause — if the
/// process beat the kill signal, its exit code stands. A signal death
/// resolves to the claimed cause when this engine sent the signal, and
/// to `Failed` when someone else did.
fn map_exit(exit: std::process::ExitStatus, claimed: Option<FailureCause>) -> Status {
    if let Some(code) = exit.code() {
        return Status::complete(code);
    }

    #[cfg(unix)]
    let signal = std::os::unix::process::ExitStatusExt::signal(&exit);
    #[cfg(not(unix))]
    let signal: Option<i32> = None;

    match claimed {
        Some(cause) => Status::terminated(cause, None),
        None => Status::terminated(
            FailureCause::Signal,
            Some(match signal {
                Some(signal) => format!("killed by external signal {signal}"),
                None => "terminated without an exit code".to_string(),
            }),
        ),
    }
}
