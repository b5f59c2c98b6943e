//
// Copyright 2019 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
use crossbeam_utils::{Backoff, CachePadded};
use log::debug;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;

use crate::registry::Registry;

const STATE_STARTING: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_SHUTTING_DOWN: u8 = 2;
const STATE_STOPPED: u8 = 3;

/// A scheduler thread bound to one OS thread and one queue slot for the
/// graph's lifetime.
///
/// Life of a worker: *Starting* (register own queue, wait for the start-up
/// rendezvous) → *Running* (dequeue/steal/execute loop) → *ShuttingDown*
/// (shutdown flag observed) → *Stopped*.
#[derive(Debug)]
pub(crate) struct Worker {
    shared: Arc<Shared>,
    join_handle: Option<thread::JoinHandle<()>>,
}

#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    /// Padded so that per-worker idle tracking does not false-share.
    idle: CachePadded<AtomicBool>,
}

impl Worker {
    /// Spawn a worker thread that participates in `registry` using the queue
    /// at `slot`.
    pub fn spawn(registry: Arc<Registry>, slot: usize) -> Self {
        let shared = Arc::new(Shared {
            state: AtomicU8::new(STATE_STARTING),
            idle: CachePadded::new(AtomicBool::new(false)),
        });

        let join_handle = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name(format!("ngsjob-worker-{}", slot))
                .spawn(move || Self::run(registry, shared, slot))
                .expect("failed to spawn a worker thread")
        };

        Self {
            shared,
            join_handle: Some(join_handle),
        }
    }

    fn run(registry: Arc<Registry>, shared: Arc<Shared>, slot: usize) {
        registry.register_current_thread(slot);
        registry.wait_until_ready();

        // A shutdown may have been triggered while we were still starting.
        let _ = shared.state.compare_exchange(
            STATE_STARTING,
            STATE_RUNNING,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        debug!("worker {} running", slot);

        let backoff = Backoff::new();
        while shared.state.load(Ordering::SeqCst) == STATE_RUNNING {
            if let Some(task) = registry.find_work(slot) {
                shared.idle.store(false, Ordering::Release);
                backoff.reset();
                task.execute();
            } else {
                shared.idle.store(true, Ordering::Release);
                if backoff.is_completed() {
                    registry.sleep_until_work();
                } else {
                    backoff.snooze();
                }
            }
        }

        shared.state.store(STATE_STOPPED, Ordering::SeqCst);
        debug!("worker {} stopped", slot);
    }

    /// Whether the worker found no runnable task on its last sweep.
    pub fn is_idle(&self) -> bool {
        self.shared.idle.load(Ordering::Acquire)
    }

    /// Ask the worker to exit its loop. The worker observes the flag between
    /// steal attempts.
    pub fn trigger_shutdown(&self) {
        let state = &self.shared.state;
        // Starting and Running both advance to ShuttingDown; Stopped stays.
        let _ = state.compare_exchange(
            STATE_STARTING,
            STATE_SHUTTING_DOWN,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        let _ = state.compare_exchange(
            STATE_RUNNING,
            STATE_SHUTTING_DOWN,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Join the worker's OS thread. Must be preceded by `trigger_shutdown`.
    pub fn wait_until_shutdown(&mut self) {
        if let Some(join_handle) = self.join_handle.take() {
            join_handle.join().expect("a worker thread panicked");
        }
    }
}
