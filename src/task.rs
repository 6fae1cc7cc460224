//! Driving a stackless coroutine (a Rust future) from a fiber.
//!
//! The future is polled on the manager's main context, never on the fiber's
//! stack, so code inside it sees `on_fiber() == false`. While it is pending
//! the fiber waits on a [`Baton`] posted by the future's waker.

use core::future::{Future, IntoFuture};
use core::pin::pin;
use core::sync::atomic::{AtomicBool, Ordering};
use core::task::{Context, Poll};
use std::sync::Arc;

use futures::task::{ArcWake, waker};

use crate::baton::Baton;
use crate::context;
use crate::token::{Async, require_fiber};

/// A future to be awaited from a fiber through [`wait_on`](crate::wait_on).
#[must_use = "a coroutine does nothing until it is waited on"]
pub struct Coroutine<F> {
    future: F,
}

impl<F: Future> Coroutine<F> {
    /// Wrap `future`.
    pub fn new(future: F) -> Self {
        Self { future }
    }

    pub(crate) fn into_inner(self) -> F {
        self.future
    }
}

struct Signal {
    baton: Baton,
    notified: AtomicBool,
}

impl ArcWake for Signal {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        // Wakers may fire many times per round; the baton takes one post.
        if !arc_self.notified.swap(true, Ordering::AcqRel) {
            arc_self.baton.post();
        }
    }
}

/// Run `future` to completion from a fiber, parking only the fiber while it
/// is pending. A panic inside the future resumes on the fiber.
#[track_caller]
pub fn task_wait<F: IntoFuture>(future: F) -> Async<F::Output> {
    require_fiber("task_wait");
    let mut future = pin!(future.into_future());
    let signal = Arc::new(Signal {
        baton: Baton::new(),
        notified: AtomicBool::new(false),
    });
    let waker = waker(signal.clone());

    loop {
        let polled = context::run_in_main_context(|| {
            let mut cx = Context::from_waker(&waker);
            future.as_mut().poll(&mut cx)
        });
        match polled {
            Poll::Ready(output) => return Async::new(output),
            Poll::Pending => {
                signal.baton.wait();
                signal.baton.reset();
                signal.notified.store(false, Ordering::Release);
            }
        }
    }
}
