//! Baton: a single-slot, single-waiter wake primitive.
//!
//! `post` may come from any thread, before or after the wait. On a fiber,
//! waiting parks only the fiber; on a plain thread it parks the thread.

use std::thread::{self, Thread};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::context;
use crate::runtime::FiberWaker;
use crate::token::{Async, require_fiber};

/// One-shot wake flag with at most one waiter.
///
/// - Posting twice without a [`reset`](Baton::reset) panics.
/// - Two concurrent waiters panic; waiters are never queued.
/// - A timed-out wait leaves the baton unset.
pub struct Baton {
    state: Mutex<State>,
}

struct State {
    posted: bool,
    waiter: Option<Waiter>,
}

#[derive(Clone)]
enum Waiter {
    Fiber(FiberWaker),
    Thread(Thread),
}

impl Waiter {
    fn current() -> Self {
        match context::current_fiber() {
            Some(fiber) => Waiter::Fiber(fiber.waker()),
            None => Waiter::Thread(thread::current()),
        }
    }

    fn same(&self, other: &Waiter) -> bool {
        match (self, other) {
            (Waiter::Fiber(a), Waiter::Fiber(b)) => a.id() == b.id(),
            (Waiter::Thread(a), Waiter::Thread(b)) => a.id() == b.id(),
            _ => false,
        }
    }

    fn wake(self) {
        match self {
            Waiter::Fiber(fiber) => fiber.wake(),
            Waiter::Thread(thread) => thread.unpark(),
        }
    }

    fn park(&self, deadline: Option<Instant>) {
        match self {
            Waiter::Fiber(_) => context::suspend_current(),
            Waiter::Thread(_) => match deadline {
                Some(at) => thread::park_timeout(at.saturating_duration_since(Instant::now())),
                None => thread::park(),
            },
        }
    }
}

impl Default for Baton {
    fn default() -> Self {
        Self::new()
    }
}

impl Baton {
    /// An unposted baton.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                posted: false,
                waiter: None,
            }),
        }
    }

    /// Set the baton and wake the waiter, if any.
    pub fn post(&self) {
        let waiter = {
            let mut state = self.state.lock();
            assert!(!state.posted, "Baton::post: baton is already posted");
            state.posted = true;
            state.waiter.take()
        };
        if let Some(waiter) = waiter {
            waiter.wake();
        }
    }

    /// Has the baton been posted?
    pub fn ready(&self) -> bool {
        self.state.lock().posted
    }

    /// Clear the posted flag so the baton can be reused. Must not race with a
    /// waiter.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.waiter.is_none(), "Baton::reset: a waiter is blocked");
        state.posted = false;
    }

    /// Wait until posted.
    pub fn wait(&self) {
        self.wait_until(None);
    }

    /// Wait until posted or until `timeout` elapses. Returns whether the
    /// baton was posted.
    pub fn try_wait_for(&self, timeout: Duration) -> bool {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.try_wait_until(deadline),
            None => {
                self.wait();
                true
            }
        }
    }

    /// Wait until posted or until `deadline`. Returns whether the baton was
    /// posted. Never returns `false` before `deadline`.
    pub fn try_wait_until(&self, deadline: Instant) -> bool {
        self.wait_until(Some(deadline))
    }

    fn wait_until(&self, deadline: Option<Instant>) -> bool {
        let waiter = Waiter::current();
        if let (Some(at), Waiter::Fiber(fiber)) = (deadline, &waiter) {
            if let Some(manager) = context::current_manager() {
                manager.schedule_wake(at, fiber.id());
            }
        }

        // Drops the registration on every exit, including a fiber unwound by
        // its manager's teardown.
        let _registration = Registration {
            baton: self,
            waiter: &waiter,
        };
        loop {
            {
                let mut state = self.state.lock();
                if state.posted {
                    return true;
                }
                if deadline.is_some_and(|at| Instant::now() >= at) {
                    state.waiter = None;
                    return false;
                }
                match &state.waiter {
                    None => state.waiter = Some(waiter.clone()),
                    Some(current) if current.same(&waiter) => {}
                    Some(_) => panic!("Baton::wait: another waiter is already blocked on this baton"),
                }
            }
            waiter.park(deadline);
        }
    }
}

struct Registration<'a> {
    baton: &'a Baton,
    waiter: &'a Waiter,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let mut state = self.baton.state.lock();
        if state.waiter.as_ref().is_some_and(|w| w.same(self.waiter)) {
            state.waiter = None;
        }
    }
}

/// Wait on `baton` from a fiber.
#[track_caller]
pub fn baton_wait(baton: &Baton) -> Async<()> {
    require_fiber("baton_wait");
    baton.wait();
    Async::new(())
}

/// Timed wait on `baton` from a fiber; `false` on timeout.
#[track_caller]
pub fn baton_try_wait_for(baton: &Baton, timeout: Duration) -> Async<bool> {
    require_fiber("baton_try_wait_for");
    Async::new(baton.try_wait_for(timeout))
}

/// Deadline wait on `baton` from a fiber; `false` on timeout.
#[track_caller]
pub fn baton_try_wait_until(baton: &Baton, deadline: Instant) -> Async<bool> {
    require_fiber("baton_try_wait_until");
    Async::new(baton.try_wait_until(deadline))
}
