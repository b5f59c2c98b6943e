//
// Copyright 2019 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{Config, TaskGraph};
use crate::task::Task;
use crate::test_utils::{with_config_graph, with_graph, GRAPH_LOCK};

#[test]
fn too_few_cpus_is_an_environment_error() {
    let err = TaskGraph::with_config(Config {
        hardware_threads: Some(1),
        ..Config::default()
    })
    .unwrap_err();
    assert_eq!(err.kind(), crate::ErrorKind::TooFewCpus);
}

#[test]
#[should_panic(expected = "max_workers must be nonzero")]
fn zero_max_workers_is_a_contract_violation() {
    let _ = TaskGraph::with_config(Config {
        hardware_threads: Some(4),
        max_workers: 0,
    });
}

#[test]
fn wait_from_an_unregistered_thread_is_a_contract_violation() {
    with_graph(|graph| {
        let task = Task::create(|| {});
        graph.schedule_task(&task);
        graph.wait_for_completion(&task);

        // The same contract as `schedule_task`: foreign threads have no
        // queue and may not participate in the help-and-wait loop.
        let result = std::thread::scope(|scope| {
            scope
                .spawn(|| graph.wait_for_completion(&task))
                .join()
        });
        assert!(result.is_err());
    });
}

#[test]
fn worker_count_is_capped_by_the_config() {
    with_config_graph(
        Config {
            hardware_threads: Some(8),
            max_workers: 2,
        },
        |graph| {
            assert_eq!(graph.worker_thread_count(), 2);
        },
    );
}

#[test]
fn worker_counts_from_the_owning_thread() {
    with_graph(|graph| {
        assert!(graph.worker_thread_count() >= 1);
        // The owning thread is not a worker.
        assert_eq!(
            graph.worker_thread_count_excluding_self(),
            graph.worker_thread_count()
        );
    });
}

#[test]
fn schedule_and_wait_runs_the_whole_tree() {
    with_graph(|graph| {
        let counter = Arc::new(AtomicUsize::new(0));

        let root = Task::create_empty();
        for _ in 0..16 {
            let child = Task::create_with_parent(&root, {
                let counter = Arc::clone(&counter);
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            });
            graph.schedule_task(&child);
        }
        graph.schedule_task(&root);
        graph.wait_for_completion(&root);

        assert!(root.is_completed());
        assert_eq!(counter.load(Ordering::SeqCst), 16);
    });
}

#[test]
fn task_memory_is_freed_after_the_join() {
    with_graph(|graph| {
        let root = Task::create_empty();
        let child = Task::create_with_parent(&root, || {});
        let child_weak = Arc::downgrade(&child);

        graph.schedule_task(&child);
        drop(child); // fire-and-forget; the queue holds the last reference
        graph.schedule_task(&root);
        graph.wait_for_completion(&root);

        let root_weak = Arc::downgrade(&root);
        drop(root);
        // The executing worker may still be dropping its clone.
        assert_eventually_freed(&child_weak);
        assert_eventually_freed(&root_weak);
    });
}

fn assert_eventually_freed(weak: &std::sync::Weak<Task>) {
    for _ in 0..100_000 {
        if weak.upgrade().is_none() {
            return;
        }
        std::thread::yield_now();
    }
    panic!("task memory is still live");
}

#[test]
fn graph_goes_idle_once_the_work_is_drained() {
    with_graph(|graph| {
        let counter = Arc::new(AtomicUsize::new(0));

        let root = Task::create_empty();
        for _ in 0..8 {
            let child = Task::create_with_parent(&root, {
                let counter = Arc::clone(&counter);
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            });
            graph.schedule_task(&child);
        }
        graph.schedule_task(&root);
        graph.wait_for_completion(&root);

        graph.wait_until_graph_idle();
        assert!(graph.is_graph_idle());
    });
}

#[test]
fn graphs_can_be_created_again_after_shutdown() {
    let _guard = GRAPH_LOCK.lock();
    for _ in 0..3 {
        let graph = TaskGraph::with_config(Config {
            hardware_threads: Some(4),
            ..Config::default()
        })
        .unwrap();
        let task = Task::create(|| {});
        graph.schedule_task(&task);
        graph.wait_for_completion(&task);
        graph.shutdown();
    }
}
