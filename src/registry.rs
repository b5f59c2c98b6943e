//
// Copyright 2019 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! The per-graph thread registry: queue slots, the start-up rendezvous, and
//! the "work available" signal.
use parking_lot::{Condvar, Mutex};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crate::queue::TaskQueue;
use crate::task::TaskRef;

/// The slot index reserved for the graph's owning thread.
pub(crate) const OWNER_SLOT: usize = 0;

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// The `(registry id, slot index)` pair the current thread registered
    /// under. The id check makes a stale entry from an already shut-down
    /// graph read as "not registered".
    static REGISTERED_SLOT: Cell<Option<(u64, usize)>> = Cell::new(None);
}

/// Maps each participating thread to its task queue.
///
/// One slot per thread (owner + workers), fixed at construction. A thread
/// claims its preassigned slot from its own OS thread during start-up; the
/// registration lock is the only lock on that path and is taken exactly once
/// per thread. Once the rendezvous completes, slot lookup and queue access
/// are lock-free.
#[derive(Debug)]
pub(crate) struct Registry {
    id: u64,
    slots: Box<[TaskQueue]>,

    /// Number of threads that have registered so far. Start-up only.
    registered: Mutex<usize>,
    /// Set once every slot is claimed. After this point every queue is a
    /// valid steal target.
    ready: AtomicBool,
    rendezvous: Condvar,

    /// Number of workers currently parked waiting for work.
    sleepers: AtomicUsize,
    sleep_lock: Mutex<()>,
    work_available: Condvar,
}

impl Registry {
    pub fn new(thread_count: usize) -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            slots: (0..thread_count)
                .map(|_| TaskQueue::new())
                .collect::<Vec<_>>()
                .into_boxed_slice(),
            registered: Mutex::new(0),
            ready: AtomicBool::new(false),
            rendezvous: Condvar::new(),
            sleepers: AtomicUsize::new(0),
            sleep_lock: Mutex::new(()),
            work_available: Condvar::new(),
        }
    }

    /// Claim `slot` for the calling thread.
    pub fn register_current_thread(&self, slot: usize) {
        debug_assert!(slot < self.slots.len());
        REGISTERED_SLOT.with(|s| s.set(Some((self.id, slot))));

        let mut registered = self.registered.lock();
        *registered += 1;
        if *registered == self.slots.len() {
            self.ready.store(true, Ordering::SeqCst);
            self.rendezvous.notify_all();
        }
    }

    /// Block until every participating thread has registered its queue.
    ///
    /// One-shot rendezvous: no task can be stolen from a queue that does not
    /// exist yet, and no thread proceeds past this point before the registry
    /// is complete.
    pub fn wait_until_ready(&self) {
        if self.ready.load(Ordering::SeqCst) {
            return;
        }
        let mut registered = self.registered.lock();
        while !self.ready.load(Ordering::SeqCst) {
            self.rendezvous.wait(&mut registered);
        }
    }

    /// The slot index the calling thread registered under, if any.
    pub fn current_slot(&self) -> Option<usize> {
        REGISTERED_SLOT.with(|s| match s.get() {
            Some((id, slot)) if id == self.id => Some(slot),
            _ => None,
        })
    }

    /// The calling thread's own queue, if the thread is registered.
    pub fn queue_for_current_thread(&self) -> Option<&TaskQueue> {
        self.current_slot().map(|slot| &self.slots[slot])
    }

    /// Try to obtain a runnable task: first from the queue at `home`, then by
    /// sweeping every registered queue.
    pub fn find_work(&self, home: usize) -> Option<TaskRef> {
        if let Some(task) = self.slots[home].try_dequeue() {
            return Some(task);
        }
        self.slots.iter().find_map(|queue| queue.try_dequeue())
    }

    /// Wake a parked worker, if there is one.
    ///
    /// Called after every enqueue. The `sleepers` check keeps the enqueue
    /// path lock-free whenever no worker is parked.
    pub fn notify_work_available(&self) {
        if self.sleepers.load(Ordering::SeqCst) > 0 {
            let _guard = self.sleep_lock.lock();
            self.work_available.notify_one();
        }
    }

    /// Wake every parked worker. Used at shutdown.
    pub fn notify_all_sleepers(&self) {
        let _guard = self.sleep_lock.lock();
        self.work_available.notify_all();
    }

    /// Park the calling worker until work may be available.
    ///
    /// The caller must have swept all queues and come up empty immediately
    /// before calling this. An enqueue can still slip in between that sweep
    /// and the wait; the timeout bounds the latency of that window.
    pub fn sleep_until_work(&self) {
        self.sleepers.fetch_add(1, Ordering::SeqCst);
        {
            let mut guard = self.sleep_lock.lock();
            let _ = self
                .work_available
                .wait_for(&mut guard, Duration::from_millis(1));
        }
        self.sleepers.fetch_sub(1, Ordering::SeqCst);
    }
}
