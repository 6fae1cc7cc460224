//! Executors: where a continuation runs.

use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

use crate::error::panic_message;

/// A unit of work handed to an executor.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Run a queued task, logging a panic instead of unwinding into the thread
/// that drains the queue.
pub(crate) fn run_contained(task: Task, queue: &'static str) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
        warn!(queue, panic = %panic_message(&*payload), "queued task panicked");
    }
}

/// Something that runs tasks, possibly on another thread.
pub trait Executor: Send + Sync {
    /// Schedule `task`. Must not block waiting for it to run.
    fn add(&self, task: Task);
}

/// Runs every task immediately on the calling thread.
#[derive(Copy, Clone, Debug, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    #[inline]
    fn add(&self, task: Task) {
        task()
    }
}

impl<E: Executor + ?Sized> Executor for std::sync::Arc<E> {
    #[inline]
    fn add(&self, task: Task) {
        (**self).add(task)
    }
}
