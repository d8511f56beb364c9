//! Process execution engine.
//!
//! Turns a [`Command`] into a running OS process and tracks it to
//! exactly one terminal [`Status`]:
//!
//! - **Spawn**: [`OsExecer`] launches the process and returns a
//!   [`ProcessHandle`] immediately; a background reaper waits for
//!   OS-level exit.
//! - **Cancel**: [`ProcessHandle::abort`], the timeout timer and the
//!   memory monitor all converge on one kill path; the first cause to
//!   claim the termination wins and is preserved in the final status.
//! - **Bound**: [`BoundedExecer`] samples the aggregate resident memory
//!   of the process and its descendants, and terminates the whole tree
//!   when it crosses the configured ceiling.
//!
//! # Execution Flow
//!
//! 1. Caller builds a [`Command`] and calls [`Execer::exec`]
//! 2. On spawn failure, `exec` returns an error and no handle exists
//! 3. On success, the reaper (and optionally the timeout timer and the
//!    memory sampler) run until the process reaches a terminal state
//! 4. Any number of callers retrieve the identical terminal [`Status`]
//!    via [`ProcessHandle::wait`]

pub mod bounded;
pub mod command;
pub mod memory;
pub mod os;
pub mod process;
pub mod status;

pub use bounded::BoundedExecer;
pub use command::{Command, OutputBuffer};
pub use memory::{ProcessTree, SystemProcessTree};
pub use os::OsExecer;
pub use process::ProcessHandle;
pub use status::{FailureCause, ProcessState, Status};

use crate::error::Result;

/// Launches commands as OS processes.
#[async_trait::async_trait]
pub trait Execer: Send + Sync {
    /// Spawn `cmd` and return a handle to the running process.
    ///
    /// An error means no process was created: there is no handle, no
    /// status, and nothing to monitor.
    async fn exec(&self, cmd: Command) -> Result<ProcessHandle>;
}
