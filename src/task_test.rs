//
// Copyright 2019 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::Task;

#[test]
fn new_task_is_incomplete() {
    let task = Task::create_empty();
    assert!(!task.is_completed());
    task.execute();
    assert!(task.is_completed());
}

#[test]
fn execute_runs_the_function() {
    let counter = Arc::new(AtomicUsize::new(0));
    let task = Task::create({
        let counter = Arc::clone(&counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });
    assert!(!task.is_completed());
    task.execute();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(task.is_completed());
}

#[test]
fn attaching_a_child_raises_the_parent_count() {
    let root = Task::create_empty();
    let child = Task::create_with_parent(&root, || {});
    assert_eq!(root.unfinished_count.load(Ordering::SeqCst), 2);
    assert_eq!(child.unfinished_count.load(Ordering::SeqCst), 1);
    child.execute();
    root.execute();
}

#[test]
fn parent_completes_only_after_the_last_child() {
    let root = Task::create_empty();
    let children: Vec<_> = (0..3)
        .map(|_| Task::create_with_parent(&root, || {}))
        .collect();

    root.execute();
    assert!(!root.is_completed());

    for (i, child) in children.iter().enumerate() {
        assert!(!root.is_completed());
        child.execute();
        assert!(child.is_completed());
        assert_eq!(root.is_completed(), i == 2);
    }
}

#[test]
fn completion_propagates_through_nested_parents() {
    let root = Task::create_empty();
    let mid = Task::create_with_parent(&root, || {});
    let leaf = Task::create_with_parent(&mid, || {});

    root.execute();
    mid.execute();
    assert!(!mid.is_completed());
    assert!(!root.is_completed());

    leaf.execute();
    assert!(leaf.is_completed());
    assert!(mid.is_completed());
    assert!(root.is_completed());
}

#[test]
#[should_panic(expected = "task executed twice")]
fn double_execute_is_a_contract_violation() {
    let task = Task::create_empty();
    task.execute();
    task.execute();
}
