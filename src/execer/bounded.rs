//! Resource-bounded execer decorator.

use std::sync::Arc;

use tokio::time::MissedTickBehavior;

use crate::config::MonitorConfig;
use crate::error::Result;
use crate::execer::command::Command;
use crate::execer::memory::{ProcessTree, SystemProcessTree};
use crate::execer::process::ProcessHandle;
use crate::execer::status::FailureCause;
use crate::execer::Execer;
use crate::stats::{
    StatsReceiver, CEILING_EXCEEDED_COUNTER, SPAWN_FAILURE_COUNTER, TREE_MEM_GAUGE,
};

/// Wraps an [`Execer`] and enforces a hard memory ceiling.
///
/// Spawning is delegated to the inner execer. On success a sampler task
/// is started, scoped to that handle's lifetime: each tick it measures
/// the aggregate resident memory of the process tree, reports it to the
/// stats sink, and — if the ceiling is exceeded — terminates the whole
/// tree through the same kill path an abort uses, with the
/// distinguishing [`FailureCause::MemoryCeiling`] cause.
pub struct BoundedExecer<E> {
    inner: E,
    config: MonitorConfig,
    tree: Arc<dyn ProcessTree>,
    stats: Arc<dyn StatsReceiver>,
}

impl<E: Execer> BoundedExecer<E> {
    pub fn new(inner: E, config: MonitorConfig, stats: Arc<dyn StatsReceiver>) -> Self {
        Self::with_tree(inner, config, Arc::new(SystemProcessTree::new()), stats)
    }

    /// Use a custom process-tree enumerator for memory accounting.
    pub fn with_tree(
        inner: E,
        config: MonitorConfig,
        tree: Arc<dyn ProcessTree>,
        stats: Arc<dyn StatsReceiver>,
    ) -> Self {
        Self {
            inner,
            config,
            tree,
            stats,
        }
    }
}

#[async_trait::async_trait]
impl<E: Execer> Execer for BoundedExecer<E> {
    async fn exec(&self, cmd: Command) -> Result<ProcessHandle> {
        let handle = match self.inner.exec(cmd).await {
            Ok(handle) => handle,
            Err(error) => {
                self.stats.counter(SPAWN_FAILURE_COUNTER, 1);
                return Err(error);
            }
        };

        tokio::spawn(sample(
            handle.clone(),
            self.config.clone(),
            self.tree.clone(),
            self.stats.clone(),
        ));

        Ok(handle)
    }
}

/// Periodic memory sampler for one process handle.
///
/// Stops the moment the handle settles, whatever the cause. A sample
/// that races the process's natural exit sees a vanished root and is
/// dropped; it is never surfaced as a fault.
async fn sample(
    handle: ProcessHandle,
    config: MonitorConfig,
    tree: Arc<dyn ProcessTree>,
    stats: Arc<dyn StatsReceiver>,
) {
    let pid = handle.pid();
    let mut ticker = tokio::time::interval(config.sample_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = handle.terminated() => break,
            _ = ticker.tick() => {
                let enumerator = tree.clone();
                // The walk is a synchronous process-table scan; keep it
                // off the async workers.
                let usage = match tokio::task::spawn_blocking(move || enumerator.tree_memory(pid)).await {
                    Ok(Some(usage)) => usage,
                    Ok(None) => continue,
                    Err(error) => {
                        tracing::warn!(pid, error = %error, "memory sample failed");
                        continue;
                    }
                };

                stats.gauge(TREE_MEM_GAUGE, usage);
                tracing::trace!(pid, usage, "sampled process tree memory");

                if usage > config.mem_ceiling_bytes {
                    tracing::warn!(
                        pid,
                        job_id = %handle.job_id(),
                        usage,
                        ceiling = config.mem_ceiling_bytes,
                        "memory ceiling exceeded; terminating process tree"
                    );
                    stats.counter(CEILING_EXCEEDED_COUNTER, 1);
                    handle.request_kill(FailureCause::MemoryCeiling);
                    // The reaper kills the tree and settles; nothing
                    // left to measure.
                    break;
                }
            }
        }
    }
}
