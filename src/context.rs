//! Where is the current code running?
//!
//! Two independent facts are tracked per thread, each by a scope guard:
//!
//! - *in fiber loop*: the thread is inside [`FiberManager::loop_until_no_ready`],
//!   either on a fiber or on the manager's main context;
//! - *on fiber*: the thread is executing on a fiber's own stack.
//!
//! Code handed to [`run_in_main_context`] observes `in_fiber_loop() == true`
//! and `on_fiber() == false`; event-loop tasks observe both as `false`.

use core::cell::RefCell;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::thread;

use crate::runtime::{FiberCtx, FiberId, FiberManager, Suspend};

thread_local! {
    static CURRENT_FIBER: RefCell<Option<Rc<FiberCtx>>> = const { RefCell::new(None) };
    static CURRENT_MANAGER: RefCell<Option<Rc<FiberManager>>> = const { RefCell::new(None) };
}

/// True while executing on a fiber's stack.
pub fn on_fiber() -> bool {
    CURRENT_FIBER.with(|f| f.borrow().is_some())
}

/// True while a fiber manager is running its loop on this thread.
pub fn in_fiber_loop() -> bool {
    CURRENT_MANAGER.with(|m| m.borrow().is_some())
}

/// The manager whose loop is running on this thread, if any.
///
/// Returns a shared handle; the manager itself is owned by its
/// [`EventLoop`](crate::EventLoop).
pub fn current_manager() -> Option<Rc<FiberManager>> {
    CURRENT_MANAGER.with(|m| m.borrow().clone())
}

/// Id of the fiber executing on this thread, if any.
pub fn current_fiber_id() -> Option<FiberId> {
    current_fiber().map(|f| f.id())
}

pub(crate) fn current_fiber() -> Option<Rc<FiberCtx>> {
    CURRENT_FIBER.with(|f| f.borrow().clone())
}

/// Suspend the current fiber until something wakes it through
/// [`FiberManager::wake`].
///
/// Resumption may be spurious; callers re-check their condition. Does nothing
/// when called off a fiber.
pub fn suspend_current() {
    if let Some(fiber) = current_fiber() {
        fiber.suspend(Suspend::Park);
    }
}

/// Run `f` on the fiber manager's main context instead of the fiber stack.
///
/// The calling fiber is suspended while `f` runs on the loop thread's own
/// stack, then resumed with the result. A panic in `f` is re-raised on the
/// fiber. Off a fiber, `f` simply runs in place.
pub fn run_in_main_context<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let Some(fiber) = current_fiber() else {
        return f();
    };

    let mut f = Some(f);
    let mut out: Option<thread::Result<R>> = None;
    let mut call = || {
        if let Some(f) = f.take() {
            out = Some(panic::catch_unwind(AssertUnwindSafe(f)));
        }
    };
    let call: &mut dyn FnMut() = &mut call;
    // Safety: the manager invokes the closure exactly once, before it resumes
    // this fiber, while this frame is suspended and intact. The pointer is
    // never used after the fiber is resumed.
    let call: *mut (dyn FnMut() + 'static) = unsafe { mem::transmute(call) };
    fiber.suspend(Suspend::MainContext(call));

    match out {
        Some(Ok(value)) => value,
        Some(Err(payload)) => panic::resume_unwind(payload),
        None => unreachable!("main-context call was not executed before resuming the fiber"),
    }
}

/// Marks "on fiber" for the duration of one fiber resumption.
pub(crate) struct FiberScope {
    prev: Option<Rc<FiberCtx>>,
}

impl FiberScope {
    pub(crate) fn enter(fiber: Rc<FiberCtx>) -> Self {
        let prev = CURRENT_FIBER.with(|f| f.replace(Some(fiber)));
        Self { prev }
    }
}

impl Drop for FiberScope {
    fn drop(&mut self) {
        let prev = self.prev.take();
        CURRENT_FIBER.with(|f| *f.borrow_mut() = prev);
    }
}

/// Marks "in fiber loop" while a manager runs its loop.
pub(crate) struct ManagerScope {
    prev: Option<Rc<FiberManager>>,
}

impl ManagerScope {
    pub(crate) fn enter(manager: Rc<FiberManager>) -> Self {
        let prev = CURRENT_MANAGER.with(|m| m.replace(Some(manager)));
        Self { prev }
    }
}

impl Drop for ManagerScope {
    fn drop(&mut self) {
        let prev = self.prev.take();
        CURRENT_MANAGER.with(|m| *m.borrow_mut() = prev);
    }
}
