//
// Copyright 2019 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
use crossbeam_queue::SegQueue;

use crate::task::TaskRef;

/// A queue of not-yet-executed tasks, one per registered thread.
///
/// Tasks are pushed only by the queue's owning thread; any thread may pop
/// ("steal"). The queue is unbounded: `ParallelFor` fan-out is caller
/// controlled and can exceed any fixed capacity, so pushes never fail or
/// block.
#[derive(Debug)]
pub(crate) struct TaskQueue {
    inner: SegQueue<TaskRef>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            inner: SegQueue::new(),
        }
    }

    /// Push a task. Must only be called by the owning thread.
    pub fn enqueue(&self, task: TaskRef) {
        self.inner.push(task);
    }

    /// Non-blocking pop attempt, usable from any thread.
    pub fn try_dequeue(&self) -> Option<TaskRef> {
        self.inner.pop()
    }
}
