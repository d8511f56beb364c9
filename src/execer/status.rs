use serde::{Deserialize, Serialize};

/// Lifecycle state of an executed command.
///
/// `Complete`, `Failed`, `Aborted` and `TimedOut` are terminal: once a
/// process reaches one of them its [`Status`] never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessState {
    /// Accepted but spawn not yet confirmed. Effectively instantaneous;
    /// callers normally never observe it.
    Pending,
    /// Spawned and running.
    Running,
    /// Exited on its own; the exit code is meaningful.
    Complete,
    /// Died from a spawn-adjacent OS error or a signal this engine did
    /// not send.
    Failed,
    /// Terminated by this engine: caller abort or memory ceiling.
    Aborted,
    /// Terminated by this engine: timeout expired.
    TimedOut,
}

impl ProcessState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProcessState::Pending | ProcessState::Running)
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessState::Pending => write!(f, "pending"),
            ProcessState::Running => write!(f, "running"),
            ProcessState::Complete => write!(f, "complete"),
            ProcessState::Failed => write!(f, "failed"),
            ProcessState::Aborted => write!(f, "aborted"),
            ProcessState::TimedOut => write!(f, "timed-out"),
        }
    }
}

/// Why a run ended in a non-`Complete` terminal state.
///
/// Self-inflicted termination (abort, timeout, ceiling) is never
/// conflated with termination from outside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureCause {
    /// OS error surfaced after a successful launch.
    Spawn,
    /// Killed by a signal this engine did not send.
    Signal,
    /// Caller-invoked abort.
    UserAbort,
    /// The command's timeout expired.
    Timeout,
    /// Aggregate process-tree memory crossed the configured ceiling.
    MemoryCeiling,
}

impl FailureCause {
    /// The terminal state this cause resolves to.
    pub fn terminal_state(&self) -> ProcessState {
        match self {
            FailureCause::Spawn | FailureCause::Signal => ProcessState::Failed,
            FailureCause::UserAbort | FailureCause::MemoryCeiling => ProcessState::Aborted,
            FailureCause::Timeout => ProcessState::TimedOut,
        }
    }
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureCause::Spawn => write!(f, "spawn failure"),
            FailureCause::Signal => write!(f, "external signal"),
            FailureCause::UserAbort => write!(f, "abort"),
            FailureCause::Timeout => write!(f, "timeout"),
            FailureCause::MemoryCeiling => write!(f, "memory ceiling exceeded"),
        }
    }
}

/// The externally observable outcome of a run.
///
/// Invariants, enforced by the constructors:
/// - `exit_code` is `Some` iff `state == Complete`
/// - `cause` is `Some` iff `state` is terminal and not `Complete`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub state: ProcessState,
    pub exit_code: Option<i32>,
    pub cause: Option<FailureCause>,
    /// Human-readable detail: signal number, OS error text.
    pub error: Option<String>,
    /// Captured stdout, snapshotted once when the run settled.
    /// `None` when the command had no stdout sink.
    pub stdout: Option<String>,
    /// Captured stderr, snapshotted once when the run settled.
    pub stderr: Option<String>,
    pub job_id: String,
    pub task_id: String,
}

impl Status {
    /// Terminal status for a natural exit.
    pub fn complete(exit_code: i32) -> Self {
        Self {
            state: ProcessState::Complete,
            exit_code: Some(exit_code),
            cause: None,
            error: None,
            stdout: None,
            stderr: None,
            job_id: String::new(),
            task_id: String::new(),
        }
    }

    /// Terminal status for a run that did not complete on its own.
    pub fn terminated(cause: FailureCause, error: Option<String>) -> Self {
        Self {
            state: cause.terminal_state(),
            exit_code: None,
            cause: Some(cause),
            error,
            stdout: None,
            stderr: None,
            job_id: String::new(),
            task_id: String::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn success(&self) -> bool {
        self.state == ProcessState::Complete && self.exit_code == Some(0)
    }

    pub(crate) fn with_outputs(mut self, stdout: Option<String>, stderr: Option<String>) -> Self {
        self.stdout = stdout;
        self.stderr = stderr;
        self
    }

    pub(crate) fn with_ids(mut self, job_id: String, task_id: String) -> Self {
        self.job_id = job_id;
        self.task_id = task_id;
        self
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.state)?;
        if let Some(code) = self.exit_code {
            write!(f, " (exit {})", code)?;
        }
        if let Some(cause) = self.cause {
            write!(f, " ({})", cause)?;
        }
        if let Some(error) = &self.error {
            write!(f, ": {}", error)?;
        }
        Ok(())
    }
}
