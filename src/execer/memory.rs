//! Process-tree discovery and memory accounting.
//!
//! A command may be a shell or interpreter that forks children, so
//! per-process memory is not enough: each sample walks the OS process
//! table, finds every process whose parent chain leads back to the
//! launched pid, and sums their resident memory.
//!
//! Discovery is re-done from a fresh snapshot on every call — a cached
//! descendant list would be unsound once the kernel recycles a pid to
//! an unrelated process. A process that vanished between snapshot and
//! read contributes zero; a process we cannot read contributes zero and
//! is skipped, never an error.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use sysinfo::{Pid, ProcessesToUpdate, Signal, System};

/// Pluggable process-tree enumerator.
///
/// Abstracts how descendants are discovered and measured so that
/// OS-specific mechanisms (and test doubles) can be swapped without
/// touching the monitor logic.
pub trait ProcessTree: Send + Sync {
    /// Aggregate resident memory, in bytes, of `root` and every live
    /// descendant. `None` when `root` itself is no longer running.
    fn tree_memory(&self, root: u32) -> Option<u64>;

    /// Deliver SIGKILL to `root` and every discovered descendant.
    /// Signaling an already-dead pid is a no-op.
    fn kill_tree(&self, root: u32);
}

/// [`ProcessTree`] backed by the OS process table via `sysinfo`.
///
/// The `System` snapshot is refreshed under an internal mutex; callers
/// share the enumerator as `Arc<dyn ProcessTree>`.
pub struct SystemProcessTree {
    sys: Mutex<System>,
}

impl SystemProcessTree {
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(System::new()),
        }
    }

    /// `root` plus all transitive children, root first. Parentage comes
    /// from the snapshot alone; a `seen` set guards against pid-reuse
    /// producing inconsistent parent links mid-refresh.
    fn collect_tree(sys: &System, root: Pid) -> Vec<Pid> {
        let mut children: HashMap<Pid, Vec<Pid>> = HashMap::new();
        for (pid, process) in sys.processes() {
            if let Some(parent) = process.parent() {
                children.entry(parent).or_default().push(*pid);
            }
        }

        let mut tree = vec![root];
        let mut seen: HashSet<Pid> = HashSet::from([root]);
        let mut i = 0;
        while i < tree.len() {
            if let Some(kids) = children.get(&tree[i]) {
                for kid in kids {
                    if seen.insert(*kid) {
                        tree.push(*kid);
                    }
                }
            }
            i += 1;
        }
        tree
    }
}

impl Default for SystemProcessTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTree for SystemProcessTree {
    fn tree_memory(&self, root: u32) -> Option<u64> {
        let mut sys = self
            .sys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sys.refresh_processes(ProcessesToUpdate::All, true);

        let root = Pid::from_u32(root);
        sys.process(root)?;

        let total = Self::collect_tree(&sys, root)
            .into_iter()
            .filter_map(|pid| sys.process(pid))
            .map(|process| process.memory())
            .sum();
        Some(total)
    }

    fn kill_tree(&self, root: u32) {
        let mut sys = self
            .sys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sys.refresh_processes(ProcessesToUpdate::All, true);

        let root = Pid::from_u32(root);
        // Root first so it stops forking replacements for its children.
        for pid in Self::collect_tree(&sys, root) {
            if let Some(process) = sys.process(pid) {
                if process.kill_with(Signal::Kill) == Some(false) {
                    tracing::debug!(pid = pid.as_u32(), "kill signal not delivered");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_process_has_nonzero_tree_memory() {
        let tree = SystemProcessTree::new();
        let usage = tree
            .tree_memory(std::process::id())
            .expect("this process is running");
        assert!(usage > 0, "expected nonzero resident memory, got {usage}");
    }

    #[test]
    fn vanished_root_yields_none() {
        let tree = SystemProcessTree::new();
        // Pid far above any default pid_max.
        assert_eq!(tree.tree_memory(u32::MAX - 1), None);
    }

    #[test]
    fn kill_tree_of_dead_pid_is_noop() {
        let tree = SystemProcessTree::new();
        tree.kill_tree(u32::MAX - 1);
    }
}
