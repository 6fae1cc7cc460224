//! One-shot value handoff from any thread to a waiting fiber.
//!
//! The producer half, [`Promise`], is `Send` and fulfilled by value, so it can
//! be handed to callback-based code on another thread. The consumer half,
//! [`PromiseChannel`], is waited on from the fiber.

use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::baton::Baton;
use crate::error::{Error, Result};
use crate::token::{Async, r#await, require_fiber};

struct Slot<T> {
    value: Mutex<SlotState<T>>,
    baton: Baton,
}

enum SlotState<T> {
    Empty,
    Full(Result<T>),
    Taken,
}

impl<T> Slot<T> {
    fn fill(&self, result: Result<T>) {
        {
            let mut value = self.value.lock();
            assert!(
                matches!(*value, SlotState::Empty),
                "promise fulfilled more than once"
            );
            *value = SlotState::Full(result);
        }
        // The value is published before the waiter can observe the post.
        self.baton.post();
    }

    fn take(&self) -> Result<T> {
        match mem::replace(&mut *self.value.lock(), SlotState::Taken) {
            SlotState::Full(result) => result,
            SlotState::Empty | SlotState::Taken => {
                unreachable!("promise slot read before it was filled")
            }
        }
    }
}

/// Producer half: fulfil exactly once, from any thread.
///
/// Dropping it unfulfilled delivers [`Error::BrokenPromise`].
pub struct Promise<T> {
    slot: Option<Arc<Slot<T>>>,
}

impl<T> Promise<T> {
    /// Deliver a value.
    pub fn set_value(self, value: T) {
        self.fulfil(Ok(value))
    }

    /// Deliver an error; it is returned at the wait site.
    pub fn set_error(self, error: impl Into<Error>) {
        self.fulfil(Err(error.into()))
    }

    /// Deliver a result.
    pub fn fulfil(mut self, result: Result<T>) {
        if let Some(slot) = self.slot.take() {
            slot.fill(result);
        }
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.fill(Err(Error::BrokenPromise));
        }
    }
}

/// Consumer half of a one-shot handoff.
pub struct PromiseChannel<T> {
    slot: Arc<Slot<T>>,
}

impl<T> PromiseChannel<T> {
    /// A connected producer/consumer pair.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Promise<T>, PromiseChannel<T>) {
        let slot = Arc::new(Slot {
            value: Mutex::new(SlotState::Empty),
            baton: Baton::new(),
        });
        (
            Promise {
                slot: Some(slot.clone()),
            },
            PromiseChannel { slot },
        )
    }

    /// Has the producer delivered yet?
    pub fn is_ready(&self) -> bool {
        self.slot.baton.ready()
    }

    /// Block the calling context (fiber or thread) until the producer
    /// delivers, then return what it delivered.
    pub fn wait(self) -> Result<T> {
        self.slot.baton.wait();
        self.slot.take()
    }
}

/// Wait on `channel` from a fiber.
#[track_caller]
pub fn channel_wait<T>(channel: PromiseChannel<T>) -> Async<Result<T>> {
    require_fiber("channel_wait");
    Async::new(channel.wait())
}

/// Hand a fresh [`Promise`] to `f`, then wait on it from the fiber.
///
/// `f` runs immediately on the fiber; it typically passes the promise to a
/// callback API that fulfils it later, possibly on another thread.
#[track_caller]
pub fn promise_wait<T, F>(f: F) -> Async<Result<T>>
where
    F: FnOnce(Promise<T>),
{
    require_fiber("promise_wait");
    let (promise, channel) = PromiseChannel::new();
    f(promise);
    Async::new(r#await(channel_wait(channel)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn value_crosses_threads() {
        let (promise, channel) = PromiseChannel::new();
        let t = thread::spawn(move || promise.set_value(String::from("hi")));
        assert_eq!(channel.wait().unwrap(), "hi");
        t.join().unwrap();
    }

    #[test]
    fn dropped_promise_breaks_the_channel() {
        let (promise, channel) = PromiseChannel::<u8>::new();
        drop(promise);
        assert!(channel.is_ready());
        assert!(matches!(channel.wait(), Err(Error::BrokenPromise)));
    }

    #[test]
    fn errors_are_delivered() {
        let (promise, channel) = PromiseChannel::<u8>::new();
        promise.set_error(Error::custom("nope"));
        let err = channel.wait().unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }
}
