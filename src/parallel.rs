//
// Copyright 2019 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Ergonomic fork/join wrappers for data-parallel loops.
use log::warn;
use std::cmp;
use std::mem;

use crate::graph::TaskGraph;
use crate::task::Task;

#[cfg(test)]
#[path = "./parallel_test.rs"]
mod parallel_test;

/// Above this iteration count, `parallel_for` suggests the batched variant.
/// Purely informational; never changes behavior.
const LARGE_COUNT_ADVISORY: usize = 1000;

/// Invoke `body(i)` for every `i` in `[0, count)`, distributing the
/// invocations across the graph's threads.
///
/// Does not return until every invocation has completed. Each invocation runs
/// as one task, so the per-iteration scheduling overhead is only appropriate
/// for coarse work items; see [`parallel_for_batched`] for fine-grained
/// loops.
///
/// `single_threaded` is a debugging aid: it runs the loop in ascending index
/// order on the calling thread, creating no tasks.
///
/// Fast paths: `count == 0` is a no-op and `count == 1` calls `body(0)`
/// synchronously, bypassing the scheduler entirely.
///
/// # Panics
///
/// Panics if the calling thread is not registered with `graph` (unless a
/// fast path applies).
pub fn parallel_for(
    graph: &TaskGraph,
    count: usize,
    body: impl Fn(usize) + Sync,
    single_threaded: bool,
) {
    if count > LARGE_COUNT_ADVISORY {
        warn!(
            "parallel_for called with count = {}; consider parallel_for_batched \
             to amortize the per-task overhead",
            count
        );
    }

    if count == 0 {
        return;
    }
    if count == 1 {
        body(0);
        return;
    }
    if single_threaded {
        for i in 0..count {
            body(i);
        }
        return;
    }

    let body_ref: &(dyn Fn(usize) + Sync) = &body;
    // Sound: `wait_for_completion` below does not return until every child
    // has finished, and each child's function is consumed when it executes,
    // so no reference to `body` survives this call.
    let body_ref: &'static (dyn Fn(usize) + Sync) = unsafe { mem::transmute(body_ref) };

    let root = Task::create_empty();
    for i in 0..count {
        // Fire-and-forget: the queue's reference is the last owner once this
        // loop iteration ends, so the child releases itself on completion.
        let child = Task::create_with_parent(&root, move || body_ref(i));
        graph.schedule_task(&child);
    }
    graph.schedule_task(&root);
    graph.wait_for_completion(&root);
}

/// Like [`parallel_for`], but runs `batch_size` consecutive indices per task,
/// amortizing the scheduling overhead across the batch.
///
/// `ceil(count / batch_size)` tasks are created, each covering a contiguous
/// index range. If the whole range fits in one batch, it runs sequentially on
/// the calling thread with no task overhead.
///
/// # Panics
///
/// Panics if `batch_size` is zero.
pub fn parallel_for_batched(
    graph: &TaskGraph,
    count: usize,
    batch_size: usize,
    body: impl Fn(usize) + Sync,
    single_threaded: bool,
) {
    assert!(batch_size > 0, "batch_size must be nonzero");

    if count <= batch_size {
        for i in 0..count {
            body(i);
        }
        return;
    }

    let batch_count = batch_count_for(count, batch_size);
    parallel_for(
        graph,
        batch_count,
        |batch| {
            let start = batch * batch_size;
            let end = cmp::min(start + batch_size, count);
            for i in start..end {
                body(i);
            }
        },
        single_threaded,
    );
}

/// `ceil(count / batch_size)`, for `count >= 1` and `batch_size >= 1`.
///
/// Written so that the intermediate value cannot overflow even for counts
/// near `usize::MAX`.
fn batch_count_for(count: usize, batch_size: usize) -> usize {
    1 + (count - 1) / batch_size
}
