//! A single-thread loop that drives one fiber manager.
//!
//! The loop is owned by the thread that created it (`EventLoop` is `!Send`).
//! Other threads reach it through a [`LoopHandle`], which queues tasks and
//! unparks the loop thread.

use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use tracing::trace;

use super::manager::FiberManager;
use super::options::Options;
use super::shared::Shared;
use crate::context;
use crate::executor::{self, Executor, Task};

/// Event loop driving a [`FiberManager`] on the current thread.
pub struct EventLoop {
    shared: Arc<Shared>,
    manager: Rc<FiberManager>,
    options: Options,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    /// Loop with default [`Options`].
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    /// Loop with explicit options.
    pub fn with_options(options: Options) -> Self {
        let shared = Arc::new(Shared::new());
        let manager = FiberManager::new(shared.clone(), options);
        Self {
            shared,
            manager,
            options,
        }
    }

    /// The fiber manager driven by this loop.
    pub fn fiber_manager(&self) -> &FiberManager {
        &self.manager
    }

    /// Thread-safe handle for queueing work onto this loop.
    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            shared: self.shared.clone(),
        }
    }

    /// One pass: run queued loop tasks, then let the manager run everything
    /// that is ready. When nothing ran, spin briefly and then park until new
    /// work arrives or the next fiber deadline passes.
    ///
    /// Returns whether anything ran. Panics if called from a fiber.
    pub fn loop_once(&self) -> bool {
        assert!(
            !context::on_fiber(),
            "EventLoop::loop_once: the loop cannot be driven from one of its fibers"
        );
        let mut progressed = self.run_loop_tasks();
        progressed |= self.manager.loop_until_no_ready();
        if !progressed {
            self.idle();
        }
        progressed
    }

    /// Run passes until `done` returns true.
    pub fn run_until(&self, mut done: impl FnMut() -> bool) {
        while !done() {
            self.loop_once();
        }
    }

    /// Run passes until [`LoopHandle::stop`] is called.
    pub fn loop_forever(&self) {
        while !self.shared.take_stop() {
            self.loop_once();
        }
    }

    fn run_loop_tasks(&self) -> bool {
        let pending = self.shared.loop_tasks.len();
        let mut ran = false;
        for _ in 0..pending {
            let Some(task) = self.shared.loop_tasks.pop() else {
                break;
            };
            executor::run_contained(task, "loop");
            ran = true;
        }
        ran
    }

    fn idle(&self) {
        let deadline = self.manager.next_deadline();
        let mut budget = self.options.wait_budget();
        while !budget.exhausted() {
            if self.shared.has_work() || deadline.is_some_and(|at| at <= Instant::now()) {
                return;
            }
            budget.step();
        }
        trace!(?deadline, "loop parking");
        self.shared.park(deadline);
    }
}

/// Cloneable, thread-safe handle to an [`EventLoop`].
///
/// As an [`Executor`], it runs tasks on the loop thread as plain loop tasks:
/// outside the fiber manager and off any fiber. A panicking task is logged and
/// the loop keeps running.
#[derive(Clone)]
pub struct LoopHandle {
    shared: Arc<Shared>,
}

impl LoopHandle {
    /// Ask [`EventLoop::loop_forever`] to return after its current pass.
    pub fn stop(&self) {
        self.shared.request_stop();
    }

    /// Unpark the loop thread so it re-checks its exit condition.
    pub fn wake(&self) {
        self.shared.notify();
    }
}

impl Executor for LoopHandle {
    fn add(&self, task: Task) {
        self.shared.loop_tasks.push(task);
        self.shared.notify();
    }
}

impl core::fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoopHandle").finish_non_exhaustive()
    }
}
