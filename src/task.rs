//
// Copyright 2019 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! The task entity and its completion-counting state machine.
use log::error;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::process::abort;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[cfg(test)]
#[path = "./task_test.rs"]
mod task_test;

/// A shared owning reference to a [`Task`].
///
/// Task memory is reference-counted: scheduling a task clones the reference
/// into a queue, and the executing worker holds that clone for the duration
/// of the execution. A fire-and-forget leaf is released automatically the
/// moment it finishes because by then the worker's clone is the last owner.
/// A manually managed task (e.g., a join-point root) is released by dropping
/// the caller's reference after the join.
pub type TaskRef = Arc<Task>;

type TaskFn = Box<dyn FnOnce() + Send + 'static>;

/// A unit of deferred work.
///
/// A task optionally wraps a function to run, and tracks the completion of
/// itself plus every task created with it as the parent. `unfinished_count`
/// starts at `1` (the task's own not-yet-executed unit of work) and is
/// incremented for each attached child. When the count reaches zero the
/// parent (if any) is finished recursively. This count-based propagation is
/// what implements the fork/join barrier.
///
/// A task is executed by exactly one worker and is never re-scheduled or
/// re-executed.
pub struct Task {
    function: Mutex<FnSlot>,
    parent: Option<TaskRef>,
    unfinished_count: AtomicUsize,
}

enum FnSlot {
    /// The task's function, waiting to be taken by the executing worker.
    Work(TaskFn),
    /// The task is a pure join point and runs no function.
    JoinPoint,
    /// The task has already been executed.
    Taken,
}

impl Task {
    /// Create a task with no function, used purely as a join point for a set
    /// of child tasks.
    pub fn create_empty() -> TaskRef {
        Arc::new(Self {
            function: Mutex::new(FnSlot::JoinPoint),
            parent: None,
            unfinished_count: AtomicUsize::new(1),
        })
    }

    /// Create a task wrapping `function`.
    pub fn create(function: impl FnOnce() + Send + 'static) -> TaskRef {
        Arc::new(Self {
            function: Mutex::new(FnSlot::Work(Box::new(function))),
            parent: None,
            unfinished_count: AtomicUsize::new(1),
        })
    }

    /// Create a task wrapping `function` as a child of `parent`.
    ///
    /// The parent's unfinished count is raised by one, so the parent will not
    /// be observed as completed until this task has finished. All children
    /// must be attached before the parent starts executing or finishing;
    /// under that constraint, attachment is safe to perform concurrently from
    /// multiple threads for the same parent.
    pub fn create_with_parent(parent: &TaskRef, function: impl FnOnce() + Send + 'static) -> TaskRef {
        parent.unfinished_count.fetch_add(1, Ordering::SeqCst);
        Arc::new(Self {
            function: Mutex::new(FnSlot::Work(Box::new(function))),
            parent: Some(TaskRef::clone(parent)),
            unfinished_count: AtomicUsize::new(1),
        })
    }

    /// Check whether the task and all of its children have finished.
    ///
    /// Uses the strongest memory ordering so that a waiter observing `true`
    /// sees the side effects of the entire finished subtree.
    pub fn is_completed(&self) -> bool {
        self.unfinished_count.load(Ordering::SeqCst) == 0
    }

    /// Run the task's function (if any) and mark the task's own unit of work
    /// as finished.
    ///
    /// Called exactly once per task, by the single worker that dequeued it.
    ///
    /// # Panics
    ///
    /// Panics if the task was already executed.
    ///
    /// # Aborts
    ///
    /// A panic escaping the task's function would silently wedge the join
    /// barrier (the unfinished counts upstream would never reach zero), so it
    /// is reported and escalated to `abort`.
    pub(crate) fn execute(&self) {
        let slot = std::mem::replace(&mut *self.function.lock(), FnSlot::Taken);
        match slot {
            FnSlot::Work(function) => {
                if catch_unwind(AssertUnwindSafe(function)).is_err() {
                    error!("a task function panicked; aborting");
                    abort();
                }
            }
            FnSlot::JoinPoint => {}
            FnSlot::Taken => panic!("task executed twice"),
        }
        self.finish();
    }

    /// Decrement `unfinished_count`, recursively finishing the parent when it
    /// reaches zero.
    fn finish(&self) {
        let prev = self.unfinished_count.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0);
        if prev == 1 {
            if let Some(ref parent) = self.parent {
                parent.finish();
            }
        }
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        // Dropping the last reference to a task that still has unfinished
        // work means a task tree was torn down before all children ran.
        assert_eq!(
            self.unfinished_count.load(Ordering::Relaxed),
            0,
            "task dropped while it still has unfinished work (dangling dependency)"
        );
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Task")
            .field("unfinished_count", &self.unfinished_count)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}
