//! Stackful fibers multiplexed onto the loop thread.
//!
//! Fibers are resumed only from [`FiberManager::loop_until_no_ready`]. A fiber
//! gives control back in one of two ways: it parks until woken, or it asks the
//! manager to run a closure on the main context and resume it right after.

use core::cell::{Cell, RefCell};
use core::sync::atomic::{AtomicU64, Ordering};
use std::any::{Any, TypeId};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Instant;

use corosensei::stack::DefaultStack;
use corosensei::{Coroutine, CoroutineResult, Yielder};
use tracing::{debug, trace, warn};

use super::options::Options;
use super::shared::Shared;
use crate::context::{FiberScope, ManagerScope};
use crate::deferred::Deferred;
use crate::error::{Error, Result, panic_message};
use crate::executor::{self, Executor, Task};

/// Identifier of a fiber, unique across every manager in the process.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FiberId(u64);

static NEXT_FIBER_ID: AtomicU64 = AtomicU64::new(1);

impl FiberId {
    fn next() -> Self {
        FiberId(NEXT_FIBER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value, for logging.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Why a fiber handed control back to the manager.
pub(crate) enum Suspend {
    /// Wait until woken.
    Park,
    /// Run this closure on the main context, then resume immediately.
    MainContext(*mut (dyn FnMut() + 'static)),
}

type FiberCoroutine = Coroutine<(), Suspend, (), DefaultStack>;

/// Per-fiber state reachable from code running on the fiber.
pub(crate) struct FiberCtx {
    id: FiberId,
    yielder: Cell<*const Yielder<(), Suspend>>,
    shared: Arc<Shared>,
    cancelled: Cell<bool>,
}

impl FiberCtx {
    pub(crate) fn id(&self) -> FiberId {
        self.id
    }

    pub(crate) fn waker(&self) -> FiberWaker {
        FiberWaker {
            id: self.id,
            shared: self.shared.clone(),
        }
    }

    /// Hand control back to the manager. Must be called on this fiber.
    pub(crate) fn suspend(&self, why: Suspend) {
        let yielder = self.yielder.get();
        assert!(!yielder.is_null(), "fiber suspended before it started");
        // Safety: the pointer is recorded on the fiber's first resumption and the
        // yielder it points to lives on this fiber's stack until the fiber body
        // returns. Only code running on this fiber reaches `suspend`.
        unsafe { (*yielder).suspend(why) }
    }
}

/// Thread-safe handle that makes a parked fiber runnable again.
#[derive(Clone)]
pub(crate) struct FiberWaker {
    id: FiberId,
    shared: Arc<Shared>,
}

impl FiberWaker {
    pub(crate) fn id(&self) -> FiberId {
        self.id
    }

    pub(crate) fn wake(&self) {
        self.shared.woken.push(self.id);
        self.shared.notify();
    }
}

struct Fiber {
    ctx: Rc<FiberCtx>,
    coroutine: FiberCoroutine,
}

/// Runs fibers for one [`EventLoop`](super::EventLoop), on the loop's thread.
pub struct FiberManager {
    me: Weak<FiberManager>,
    shared: Arc<Shared>,
    options: Options,
    runnable: RefCell<VecDeque<Fiber>>,
    parked: RefCell<HashMap<FiberId, Fiber>>,
    deadlines: RefCell<BinaryHeap<Reverse<(Instant, FiberId)>>>,
    locals: RefCell<HashMap<TypeId, Box<dyn Any>>>,
}

impl FiberManager {
    pub(crate) fn new(shared: Arc<Shared>, options: Options) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            me: me.clone(),
            shared,
            options,
            runnable: RefCell::new(VecDeque::new()),
            parked: RefCell::new(HashMap::new()),
            deadlines: RefCell::new(BinaryHeap::new()),
            locals: RefCell::new(HashMap::new()),
        })
    }

    /// Start `f` on a new fiber. Its result, or the panic that ended it, is
    /// delivered through the returned deferred value.
    ///
    /// The fiber first runs on the next pass of the manager's loop.
    pub fn add_task<F, T>(&self, f: F) -> Result<Deferred<T>>
    where
        F: FnOnce() -> T + 'static,
        T: Send + 'static,
    {
        let (resolver, deferred) = Deferred::pair();
        self.spawn(move |ctx| match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => resolver.resolve(value),
            // Teardown unwinds parked fibers; that unwind must keep going.
            Err(payload) if ctx.cancelled.get() => panic::resume_unwind(payload),
            Err(payload) => {
                let msg = panic_message(&*payload);
                warn!(fiber = ctx.id.0, panic = %msg, "fiber task panicked");
                resolver.reject(Error::Panicked(msg));
            }
        })?;
        Ok(deferred)
    }

    fn spawn(&self, body: impl FnOnce(&FiberCtx) + 'static) -> Result<FiberId> {
        let id = FiberId::next();

        let stack = DefaultStack::new(self.options.fiber_stack_size()).map_err(Error::Stack)?;
        let ctx = Rc::new(FiberCtx {
            id,
            yielder: Cell::new(ptr::null()),
            shared: self.shared.clone(),
            cancelled: Cell::new(false),
        });
        let entry = ctx.clone();
        let coroutine = Coroutine::with_stack(stack, move |yielder: &Yielder<(), Suspend>, ()| {
            entry.yielder.set(yielder as *const _);
            body(&entry);
        });

        debug!(fiber = id.0, "fiber added");
        self.runnable
            .borrow_mut()
            .push_back(Fiber { ctx, coroutine });
        Ok(id)
    }

    /// Make fiber `id` runnable on the next pass. Waking a fiber that is not
    /// parked, or no longer exists, is harmless.
    pub fn wake(&self, id: FiberId) {
        self.shared.woken.push(id);
        self.shared.notify();
    }

    /// Executor that runs tasks on this manager's main context: on the loop
    /// thread, inside the manager loop, off any fiber stack.
    pub fn main_context_executor(&self) -> MainContextExecutor {
        MainContextExecutor {
            shared: self.shared.clone(),
        }
    }

    /// Per-manager instance of `T`, created on first use.
    ///
    /// Every call returns a view of the same value for as long as the manager
    /// lives.
    pub fn local<T: Default + 'static>(&self) -> &T {
        let key = TypeId::of::<T>();
        if !self.locals.borrow().contains_key(&key) {
            // Built outside the borrow so `T::default` may itself use locals.
            let value: Box<dyn Any> = Box::new(T::default());
            self.locals.borrow_mut().entry(key).or_insert(value);
        }
        let locals = self.locals.borrow();
        let value: *const T = locals
            .get(&key)
            .and_then(|v| v.downcast_ref::<T>())
            .expect("local slot is keyed by the TypeId of its value");
        // Safety: slots are boxed and never removed or replaced while the
        // manager is alive, so the pointee outlives the `&self` borrow.
        unsafe { &*value }
    }

    /// Number of fibers that have not finished yet.
    pub fn fiber_count(&self) -> usize {
        self.runnable.borrow().len() + self.parked.borrow().len()
    }

    /// Run ready fibers, expired fiber deadlines and main-context tasks until
    /// none are left. Returns whether anything ran.
    pub fn loop_until_no_ready(&self) -> bool {
        let Some(me) = self.me.upgrade() else {
            return false;
        };
        let _scope = ManagerScope::enter(me);

        let mut progressed = false;
        loop {
            let mut ran = self.run_main_tasks();
            self.fire_deadlines(Instant::now());
            self.collect_woken();
            while let Some(fiber) = self.pop_runnable() {
                self.run_fiber(fiber);
                ran = true;
            }
            if !ran {
                break;
            }
            progressed = true;
        }
        progressed
    }

    pub(crate) fn schedule_wake(&self, at: Instant, id: FiberId) {
        self.deadlines.borrow_mut().push(Reverse((at, id)));
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.borrow().peek().map(|Reverse((at, _))| *at)
    }

    fn pop_runnable(&self) -> Option<Fiber> {
        self.runnable.borrow_mut().pop_front()
    }

    fn run_main_tasks(&self) -> bool {
        let pending = self.shared.main_tasks.len();
        let mut ran = false;
        for _ in 0..pending {
            let Some(task) = self.shared.main_tasks.pop() else {
                break;
            };
            trace!(pending, "main-context task");
            executor::run_contained(task, "main-context");
            ran = true;
        }
        ran
    }

    fn fire_deadlines(&self, now: Instant) {
        let mut deadlines = self.deadlines.borrow_mut();
        while let Some(Reverse((at, id))) = deadlines.peek().copied() {
            if at > now {
                break;
            }
            deadlines.pop();
            self.shared.woken.push(id);
        }
    }

    fn collect_woken(&self) {
        while let Some(id) = self.shared.woken.pop() {
            let fiber = self.parked.borrow_mut().remove(&id);
            if let Some(fiber) = fiber {
                self.runnable.borrow_mut().push_back(fiber);
            }
        }
    }

    fn run_fiber(&self, mut fiber: Fiber) {
        let id = fiber.ctx.id;
        loop {
            let step = {
                let _on_fiber = FiberScope::enter(fiber.ctx.clone());
                fiber.coroutine.resume(())
            };
            match step {
                CoroutineResult::Yield(Suspend::Park) => {
                    trace!(fiber = id.0, "fiber parked");
                    self.parked.borrow_mut().insert(id, fiber);
                    return;
                }
                CoroutineResult::Yield(Suspend::MainContext(call)) => {
                    trace!(fiber = id.0, "running on main context");
                    // Safety: `call` points into the suspended fiber's frame,
                    // which stays intact until the resume at the top of this loop.
                    unsafe { (*call)() };
                }
                CoroutineResult::Return(()) => {
                    debug!(fiber = id.0, "fiber finished");
                    return;
                }
            }
        }
    }
}

impl Drop for FiberManager {
    fn drop(&mut self) {
        let parked = self.parked.get_mut().drain().map(|(_, fiber)| fiber);
        let runnable = self.runnable.get_mut().drain(..);
        for fiber in parked.chain(runnable) {
            debug!(fiber = fiber.ctx.id.0, "dropping unfinished fiber");
            fiber.ctx.cancelled.set(true);
            drop(fiber);
        }
    }
}

/// Runs tasks on a fiber manager's main context. Cheap to clone, usable from
/// any thread.
#[derive(Clone)]
pub struct MainContextExecutor {
    shared: Arc<Shared>,
}

impl Executor for MainContextExecutor {
    fn add(&self, task: Task) {
        self.shared.main_tasks.push(task);
        self.shared.notify();
    }
}

impl core::fmt::Debug for MainContextExecutor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MainContextExecutor").finish_non_exhaustive()
    }
}
