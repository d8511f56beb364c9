//! Process execution engine for distributed task workers.
//!
//! A control plane dispatches commands to worker nodes; this crate is
//! the worker-side engine that runs them: it spawns OS processes,
//! tracks each one to a single race-free terminal status, and can
//! enforce a hard memory ceiling over a process and everything it
//! forks.
//!
//! # Components
//!
//! - [`execer::Command`] / [`execer::Status`]: what to run and how it
//!   ended
//! - [`execer::OsExecer`]: baseline spawn/capture/reap
//! - [`execer::BoundedExecer`]: memory-ceiling decorator
//! - [`execer::ProcessTree`]: pluggable process-tree discovery and
//!   accounting
//! - [`stats::StatsReceiver`]: sink for memory gauges and counters

pub mod config;
pub mod error;
pub mod execer;
pub mod stats;
