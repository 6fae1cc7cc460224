use core::future::Future;

use crate::baton::{Baton, baton_wait};
use crate::deferred::{Deferred, deferred_wait};
use crate::error::Result;
use crate::promise::{PromiseChannel, channel_wait};
use crate::task::{Coroutine, task_wait};
use crate::token::Async;

/// Anything a fiber can suspend on.
pub trait FiberWait {
    /// What the wait yields.
    type Output;

    /// Suspend the calling fiber until `self` is ready.
    fn wait_on(self) -> Async<Self::Output>;
}

impl FiberWait for &Baton {
    type Output = ();

    #[track_caller]
    fn wait_on(self) -> Async<()> {
        baton_wait(self)
    }
}

impl<T> FiberWait for PromiseChannel<T> {
    type Output = Result<T>;

    #[track_caller]
    fn wait_on(self) -> Async<Result<T>> {
        channel_wait(self)
    }
}

impl<T: Send + 'static> FiberWait for Deferred<T> {
    type Output = Result<T>;

    #[track_caller]
    fn wait_on(self) -> Async<Result<T>> {
        deferred_wait(self)
    }
}

impl<F: Future> FiberWait for Coroutine<F> {
    type Output = F::Output;

    #[track_caller]
    fn wait_on(self) -> Async<F::Output> {
        task_wait(self.into_inner())
    }
}

/// Suspend the calling fiber on `what`. Panics off a fiber.
#[track_caller]
pub fn wait_on<W: FiberWait>(what: W) -> Async<W::Output> {
    what.wait_on()
}
