//
// Copyright 2019 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! A work-stealing fork/join task scheduler for parallelizing CPU-side
//! engine work across cores.
//!
//! # Model
//!
//! - A [`Task`] is a unit of deferred work: an optional function plus a
//!   completion count covering itself and every child attached to it. A
//!   parent is observably complete only after all of its children have
//!   finished. This is the join barrier.
//! - A [`TaskGraph`] owns a fixed pool of worker threads. Every
//!   participating thread (the graph's owning thread and each worker) pushes
//!   to its own queue; any of them may steal from any queue.
//! - Waiting is cooperative: [`TaskGraph::wait_for_completion`] executes
//!   other runnable tasks inline instead of blocking, so a task may fork and
//!   join sub-tasks without risking deadlock.
//!
//! Most callers only need the [`parallel_for`] / [`parallel_for_batched`]
//! wrappers, which generate the task tree for a data-parallel loop:
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! // `TaskGraph::new()` sizes the pool from the detected hardware
//! // concurrency; a fixed thread count keeps this example host-independent.
//! let graph = ngsjob::TaskGraph::with_config(ngsjob::Config {
//!     hardware_threads: Some(4),
//!     ..ngsjob::Config::default()
//! })
//! .unwrap();
//!
//! let sum = AtomicUsize::new(0);
//! ngsjob::parallel_for(&graph, 100, |i| { sum.fetch_add(i, Ordering::Relaxed); }, false);
//! assert_eq!(sum.into_inner(), 99 * 100 / 2);
//!
//! graph.shutdown();
//! ```
//!
//! # Non-goals
//!
//! No task cancellation, priorities, timeouts, or persistent/distributed
//! execution. The thread pool is fixed for the graph's lifetime and
//! execution is single-machine, shared-memory only.
mod error;
mod graph;
mod parallel;
mod queue;
mod registry;
mod task;
#[cfg(test)]
mod test_utils;
mod worker;

pub use self::error::{Error, ErrorKind, Result};
pub use self::graph::{Config, TaskGraph, MAX_WORKERS};
pub use self::parallel::{parallel_for, parallel_for_batched};
pub use self::task::{Task, TaskRef};
