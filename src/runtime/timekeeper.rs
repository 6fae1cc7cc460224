//! Process-wide timer thread.
//!
//! Completions scheduled here run on the timekeeper thread, which is never a
//! fiber loop thread. That makes it the natural "foreign producer" for sleeps.

use core::cmp::Ordering;
use core::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::collections::BinaryHeap;
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::debug;

use crate::executor::{self, Task};

struct Entry {
    at: Instant,
    seq: u64,
    task: Task,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        (self.at, self.seq) == (other.at, other.seq)
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed so the max-heap yields the earliest deadline first.
    fn cmp(&self, other: &Self) -> Ordering {
        (other.at, other.seq).cmp(&(self.at, self.seq))
    }
}

struct Timekeeper {
    queue: Mutex<BinaryHeap<Entry>>,
    cond: Condvar,
    seq: AtomicU64,
}

static TIMEKEEPER: OnceLock<&'static Timekeeper> = OnceLock::new();

fn global() -> &'static Timekeeper {
    TIMEKEEPER.get_or_init(|| {
        let tk: &'static Timekeeper = Box::leak(Box::new(Timekeeper {
            queue: Mutex::new(BinaryHeap::new()),
            cond: Condvar::new(),
            seq: AtomicU64::new(0),
        }));
        thread::Builder::new()
            .name("fiber-await-timekeeper".into())
            .spawn(move || tk.run())
            .expect("failed to spawn the timekeeper thread");
        debug!("timekeeper started");
        tk
    })
}

/// Run `task` on the timekeeper thread once `delay` has elapsed.
pub(crate) fn after(delay: Duration, task: Task) {
    let tk = global();
    let at = Instant::now() + delay;
    let seq = tk.seq.fetch_add(1, AtomicOrdering::Relaxed);
    tk.queue.lock().push(Entry { at, seq, task });
    tk.cond.notify_one();
}

impl Timekeeper {
    fn run(&self) {
        let mut queue = self.queue.lock();
        loop {
            match queue.peek().map(|e| e.at) {
                Some(at) if at <= Instant::now() => {
                    if let Some(entry) = queue.pop() {
                        MutexGuard::unlocked(&mut queue, || {
                            executor::run_contained(entry.task, "timekeeper");
                        });
                    }
                }
                Some(at) => {
                    self.cond.wait_until(&mut queue, at);
                }
                None => self.cond.wait(&mut queue),
            }
        }
    }
}
