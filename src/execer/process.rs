//! Process handle and terminal-state plumbing.
//!
//! Every run is tracked by a set of cooperating background tasks — the
//! reaper, at most one timeout timer, and (for bounded execution) one
//! memory sampler. They coordinate through [`ProcShared`]:
//!
//! - **cause claim** — write-once slot recording *why* the engine is
//!   killing the process. First claimer wins; later claims no-op.
//! - **kill token** — cancelled when a cause is claimed; wakes the
//!   reaper to signal the process tree.
//! - **terminal slot + done token** — the reaper writes the final
//!   [`Status`] exactly once, then cancels the done token. The write
//!   strictly precedes the cancel, so every waiter that observes the
//!   token also observes the settled status.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::execer::status::{FailureCause, Status};

/// Handle to a spawned process.
///
/// Cloneable; every clone shares the same terminal slot. [`wait`] may
/// be called from any number of tasks, repeatedly — all of them observe
/// the identical terminal [`Status`].
///
/// [`wait`]: ProcessHandle::wait
#[derive(Clone)]
pub struct ProcessHandle {
    shared: Arc<ProcShared>,
}

impl ProcessHandle {
    pub(crate) fn new(shared: Arc<ProcShared>) -> Self {
        Self { shared }
    }

    /// OS process id of the spawned root process.
    pub fn pid(&self) -> u32 {
        self.shared.pid
    }

    pub fn job_id(&self) -> &str {
        &self.shared.job_id
    }

    pub fn task_id(&self) -> &str {
        &self.shared.task_id
    }

    /// Block until the process reaches a terminal state.
    pub async fn wait(&self) -> Status {
        self.shared.done.cancelled().await;
        self.shared
            .terminal
            .get()
            .cloned()
            // settle() writes the slot strictly before cancelling `done`.
            .expect("terminal status is set before the done token is cancelled")
    }

    /// Request termination and wait for the resulting terminal status.
    ///
    /// Idempotent and safe to call concurrently: the first cause to
    /// claim the kill wins, later calls (including aborts of an already
    /// terminal process) simply return the settled status.
    pub async fn abort(&self) -> Status {
        self.shared.request_kill(FailureCause::UserAbort);
        self.wait().await
    }

    /// Completes when the process reaches a terminal state. Unlike
    /// [`wait`](ProcessHandle::wait) it does not clone the status, which
    /// makes it cheap to use inside `select!` loops.
    pub async fn terminated(&self) {
        self.shared.done.cancelled().await;
    }

    /// The terminal status, if the process has already settled.
    pub fn status(&self) -> Option<Status> {
        self.shared.terminal.get().cloned()
    }

    pub(crate) fn request_kill(&self, cause: FailureCause) {
        self.shared.request_kill(cause);
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.shared.pid)
            .field("job_id", &self.shared.job_id)
            .field("task_id", &self.shared.task_id)
            .field("terminal", &self.shared.terminal.get())
            .finish()
    }
}

/// State shared between the handle and its background tasks.
pub(crate) struct ProcShared {
    pid: u32,
    job_id: String,
    task_id: String,
    claim: OnceLock<FailureCause>,
    kill: CancellationToken,
    terminal: OnceLock<Status>,
    done: CancellationToken,
}

impl ProcShared {
    pub(crate) fn new(pid: u32, job_id: String, task_id: String) -> Self {
        Self {
            pid,
            job_id,
            task_id,
            claim: OnceLock::new(),
            kill: CancellationToken::new(),
            terminal: OnceLock::new(),
            done: CancellationToken::new(),
        }
    }

    pub(crate) fn pid(&self) -> u32 {
        self.pid
    }

    pub(crate) fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Claim the kill cause and wake the reaper. No-op when the run is
    /// already terminal or another cause won the claim.
    pub(crate) fn request_kill(&self, cause: FailureCause) {
        if self.done.is_cancelled() {
            return;
        }
        if self.claim.set(cause).is_ok() {
            tracing::debug!(
                pid = self.pid,
                job_id = %self.job_id,
                cause = %cause,
                "termination requested"
            );
            self.kill.cancel();
        }
    }

    /// The cause that won the kill claim, if any.
    pub(crate) fn claimed_cause(&self) -> Option<FailureCause> {
        self.claim.get().copied()
    }

    /// Completes once some task has claimed a kill cause.
    pub(crate) async fn kill_requested(&self) {
        self.kill.cancelled().await;
    }

    /// Publish the terminal status. First writer wins; the status write
    /// happens strictly before the done token is cancelled.
    pub(crate) fn settle(&self, status: Status) {
        if self.terminal.set(status).is_ok() {
            self.done.cancel();
        }
    }
}

/// Arm the timeout timer for a spawned process. Runs until either the
/// run settles or the timer fires and claims the `Timeout` cause.
pub(crate) fn arm_timeout(shared: Arc<ProcShared>, timeout: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = shared.done.cancelled() => {}
            _ = tokio::time::sleep(timeout) => {
                shared.request_kill(FailureCause::Timeout);
            }
        }
    });
}
