use core::sync::atomic::{AtomicBool, Ordering};
use crossbeam_queue::SegQueue;
use parking_lot::{Condvar, Mutex};
use std::time::Instant;

use super::manager::FiberId;
use crate::executor::Task;

/// State shared between a loop thread and every thread that feeds it.
pub(crate) struct Shared {
    /// Tasks run by the event loop itself, outside the fiber manager.
    pub(crate) loop_tasks: SegQueue<Task>,
    /// Tasks run on the fiber manager's main context.
    pub(crate) main_tasks: SegQueue<Task>,
    /// Fibers whose wait condition may have changed.
    pub(crate) woken: SegQueue<FiberId>,
    stop: AtomicBool,
    notified: Mutex<bool>,
    cond: Condvar,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            loop_tasks: SegQueue::new(),
            main_tasks: SegQueue::new(),
            woken: SegQueue::new(),
            stop: AtomicBool::new(false),
            notified: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Wake the loop thread if it is parked, or make its next park return.
    pub(crate) fn notify(&self) {
        let mut notified = self.notified.lock();
        *notified = true;
        self.cond.notify_one();
    }

    /// Park until notified or until `deadline`. A notification that arrived
    /// since the previous park makes this return immediately.
    pub(crate) fn park(&self, deadline: Option<Instant>) {
        let mut notified = self.notified.lock();
        if !*notified {
            match deadline {
                Some(at) => {
                    self.cond.wait_until(&mut notified, at);
                }
                None => self.cond.wait(&mut notified),
            }
        }
        *notified = false;
    }

    pub(crate) fn has_work(&self) -> bool {
        !self.loop_tasks.is_empty() || !self.main_tasks.is_empty() || !self.woken.is_empty()
    }

    pub(crate) fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
        self.notify();
    }

    pub(crate) fn take_stop(&self) -> bool {
        self.stop.swap(false, Ordering::AcqRel)
    }
}
