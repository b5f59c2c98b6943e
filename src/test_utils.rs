//
// Copyright 2019 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Helpers shared by the unit tests.
use lazy_static::lazy_static;
use parking_lot::Mutex;

use crate::graph::{Config, TaskGraph};

lazy_static! {
    /// Only one `TaskGraph` may be live at a time, so tests that construct
    /// one take this lock.
    pub static ref GRAPH_LOCK: Mutex<()> = Mutex::new(());
}

pub fn with_graph(f: impl FnOnce(&TaskGraph)) {
    // A fixed thread count keeps the suite independent of the host's
    // hardware concurrency (`TaskGraph::new` errors on single-CPU hosts).
    with_config_graph(
        Config {
            hardware_threads: Some(4),
            ..Config::default()
        },
        f,
    );
}

pub fn with_config_graph(config: Config, f: impl FnOnce(&TaskGraph)) {
    let _guard = GRAPH_LOCK.lock();
    let graph = TaskGraph::with_config(config).unwrap();
    f(&graph);
    graph.shutdown();
}
