//
// Copyright 2019 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! The scheduler: owns the registry and the worker pool, and provides the
//! scheduling and waiting entry points.
use crossbeam_utils::Backoff;
use log::debug;
use std::cmp;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, ErrorKind, Result};
use crate::registry::{Registry, OWNER_SLOT};
use crate::task::TaskRef;
use crate::worker::Worker;

#[cfg(test)]
#[path = "./graph_test.rs"]
mod graph_test;

/// The upper bound on the number of spawned workers.
pub const MAX_WORKERS: usize = 10;

/// Tracks whether a `TaskGraph` currently exists. Two live graphs would
/// compete for the same thread-registration slots, so constructing a second
/// one is a contract violation.
static GRAPH_EXISTS: AtomicBool = AtomicBool::new(false);

/// Construction parameters for [`TaskGraph`].
#[derive(Debug, Clone)]
pub struct Config {
    /// The number of hardware threads to assume. `None` means auto-detect.
    ///
    /// One thread is reserved for the graph's owning thread; the rest host
    /// workers.
    pub hardware_threads: Option<usize>,

    /// The upper bound on the number of spawned workers.
    pub max_workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hardware_threads: None,
            max_workers: MAX_WORKERS,
        }
    }
}

/// A work-stealing fork/join scheduler over a fixed pool of OS threads.
///
/// The constructing ("owning") thread and every worker each own one task
/// queue they alone may push to; any of those threads may pop from any queue.
/// Construction does not return until every thread has registered its queue,
/// so from that moment on every registered queue is a valid steal target.
///
/// The graph is an explicit value: create it with [`TaskGraph::new`], pass it
/// by reference to whatever needs to schedule work, and tear it down with
/// [`TaskGraph::shutdown`] (or by dropping it). It must not be torn down
/// while tasks created through it are incomplete; that is a caller
/// obligation, backstopped by the task drop assertion.
#[derive(Debug)]
pub struct TaskGraph {
    registry: Arc<Registry>,
    workers: Vec<Worker>,
}

impl TaskGraph {
    /// Create a scheduler sized for the detected hardware concurrency
    /// (`max(1, hardware_threads - 1)` workers, capped at [`MAX_WORKERS`]).
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::TooFewCpus`] if fewer than two hardware threads
    /// are available, since there is no room for both the owning thread and
    /// at least one worker.
    ///
    /// # Panics
    ///
    /// Panics if another `TaskGraph` is currently live.
    pub fn new() -> Result<Self> {
        Self::with_config(Config::default())
    }

    /// Create a scheduler with an explicit configuration.
    ///
    /// See [`TaskGraph::new`] for the error and panic conditions.
    pub fn with_config(config: Config) -> Result<Self> {
        assert!(config.max_workers >= 1, "max_workers must be nonzero");

        let hardware_threads = config.hardware_threads.unwrap_or_else(num_cpus::get);
        if hardware_threads < 2 {
            return Err(Error::with_detail(
                ErrorKind::TooFewCpus,
                format!(
                    "{} hardware thread(s) available, at least 2 required",
                    hardware_threads
                ),
            ));
        }
        let worker_count = cmp::min(cmp::max(1, hardware_threads - 1), config.max_workers);

        if GRAPH_EXISTS
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            panic!("a TaskGraph already exists; shut it down first");
        }

        // One queue slot per participating thread: the owning thread plus
        // every worker.
        let registry = Arc::new(Registry::new(worker_count + 1));
        registry.register_current_thread(OWNER_SLOT);

        let workers = (1..=worker_count)
            .map(|slot| Worker::spawn(Arc::clone(&registry), slot))
            .collect();

        registry.wait_until_ready();
        debug!("task graph running with {} worker(s)", worker_count);

        Ok(Self { registry, workers })
    }

    /// Push `task` onto the calling thread's queue.
    ///
    /// Works from the owning thread and from worker threads (e.g., a task
    /// body forking further tasks); both have registered queues.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread is not registered with this graph.
    pub fn schedule_task(&self, task: &TaskRef) {
        let queue = self
            .registry
            .queue_for_current_thread()
            .expect("schedule_task called from a thread not registered with this task graph");
        queue.enqueue(TaskRef::clone(task));
        self.registry.notify_work_available();
    }

    /// Block until `task` is completed, executing other runnable tasks on the
    /// calling thread in the meantime.
    ///
    /// This is a help-and-wait loop, not an OS-level block: a thread waiting
    /// on a dependency keeps draining the global work pool, including
    /// anything the awaited task transitively depends on, so nested fork/join
    /// cannot deadlock.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread is not registered with this graph.
    pub fn wait_for_completion(&self, task: &TaskRef) {
        let home = self
            .registry
            .current_slot()
            .expect("wait_for_completion called from a thread not registered with this task graph");
        let backoff = Backoff::new();
        while !task.is_completed() {
            if let Some(other) = self.registry.find_work(home) {
                other.execute();
                backoff.reset();
            } else {
                backoff.snooze();
            }
        }
    }

    /// Whether every worker found no runnable task on its last sweep.
    ///
    /// Diagnostics only; the result is stale by the time it is observed.
    pub fn is_graph_idle(&self) -> bool {
        self.workers.iter().all(|worker| worker.is_idle())
    }

    /// Spin until [`TaskGraph::is_graph_idle`] reports `true`.
    pub fn wait_until_graph_idle(&self) {
        let backoff = Backoff::new();
        while !self.is_graph_idle() {
            backoff.snooze();
        }
    }

    /// The number of worker threads.
    pub fn worker_thread_count(&self) -> usize {
        self.workers.len()
    }

    /// The number of worker threads other than the calling thread.
    pub fn worker_thread_count_excluding_self(&self) -> usize {
        match self.registry.current_slot() {
            Some(slot) if slot != OWNER_SLOT => self.workers.len() - 1,
            _ => self.workers.len(),
        }
    }

    /// Tear the scheduler down: signal and join every worker, then drop the
    /// registry.
    ///
    /// Must not be called while tasks are outstanding.
    pub fn shutdown(self) {
        // Drop does the actual work.
    }
}

impl Drop for TaskGraph {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.trigger_shutdown();
        }
        self.registry.notify_all_sleepers();
        for worker in &mut self.workers {
            worker.wait_until_shutdown();
        }
        GRAPH_EXISTS.store(false, Ordering::SeqCst);
        debug!("task graph shut down");
    }
}
