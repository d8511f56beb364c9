use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// A command, execution environment, and timeout.
///
/// Immutable description of one unit of work; safe to clone and share
/// across concurrent launches. Correlation ids are opaque: they are
/// echoed into the resulting [`Status`](crate::execer::Status) and log
/// events but never interpreted.
#[derive(Debug, Clone, Default)]
pub struct Command {
    /// Command line to run: program followed by its arguments. Must be
    /// non-empty by the time the command is executed.
    pub argv: Vec<String>,

    /// Environment overrides, merged over the ambient environment.
    /// An empty map changes nothing.
    pub env: HashMap<String, String>,

    /// Kill the command after this long. Zero means unbounded.
    pub timeout: Duration,

    /// Capture sink for the child's stdout. `None` discards the stream.
    pub stdout: Option<OutputBuffer>,

    /// Capture sink for the child's stderr. `None` discards the stream.
    pub stderr: Option<OutputBuffer>,

    /// Opaque job correlation id.
    pub job_id: String,

    /// Opaque task correlation id.
    pub task_id: String,
}

impl Command {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_stdout(mut self, sink: OutputBuffer) -> Self {
        self.stdout = Some(sink);
        self
    }

    pub fn with_stderr(mut self, sink: OutputBuffer) -> Self {
        self.stderr = Some(sink);
        self
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = job_id.into();
        self
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = task_id.into();
        self
    }

    /// The program to execute, if the argv is non-empty.
    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "argv={:?} timeout={:?} job_id={} task_id={}",
            self.argv, self.timeout, self.job_id, self.task_id
        )?;
        if !self.env.is_empty() {
            // Keys only; values may hold credentials.
            let mut keys: Vec<&str> = self.env.keys().map(String::as_str).collect();
            keys.sort_unstable();
            write!(f, " env_keys={:?}", keys)?;
        }
        Ok(())
    }
}

/// Shared append-only capture buffer for child output.
///
/// Handed to the engine via [`Command::with_stdout`] /
/// [`Command::with_stderr`]; the caller keeps its clone and may read
/// the contents at any time. All clones observe the same bytes.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.lock().clone()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub(crate) fn append(&self, bytes: &[u8]) {
        self.lock().extend_from_slice(bytes);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        // Appends cannot panic mid-write; recover the data regardless.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
