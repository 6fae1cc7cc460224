//! Deferred values: results produced elsewhere, with continuations whose
//! execution context is chosen by the consumer.
//!
//! A [`Deferred`] starts [`Policy::Unbound`]: continuations added with
//! [`defer`](Deferred::defer) are held until the consumer decides where they
//! run, with [`via`](Deferred::via), [`inline`](Deferred::inline), or by
//! waiting on it (see [`deferred_wait`]).

mod bridge;
mod hop;
mod stage;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

pub use bridge::deferred_wait;
pub use hop::Policy;

use self::hop::Hop;
use self::stage::Core;
use crate::error::{Error, Result, panic_message};
use crate::executor::Executor;
use crate::promise::PromiseChannel;
use crate::runtime::{EventLoop, timekeeper};

/// A value that will be available later, possibly produced on another thread.
#[must_use = "a deferred value does nothing unless waited on or subscribed to"]
pub struct Deferred<T> {
    core: Arc<Core<T>>,
    hop: Arc<Hop>,
}

/// Producer side of a [`Deferred`]. Dropping it unresolved fails the
/// deferred with [`Error::BrokenPromise`].
pub struct Resolver<T> {
    core: Option<Arc<Core<T>>>,
}

impl<T> Resolver<T> {
    /// Complete with a value.
    pub fn resolve(self, value: T) {
        self.complete(Ok(value))
    }

    /// Complete with an error.
    pub fn reject(self, error: impl Into<Error>) {
        self.complete(Err(error.into()))
    }

    /// Complete with a result.
    pub fn complete(mut self, result: Result<T>) {
        if let Some(core) = self.core.take() {
            core.complete(result);
        }
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        if let Some(core) = self.core.take() {
            core.complete(Err(Error::BrokenPromise));
        }
    }
}

impl<T: Send + 'static> Deferred<T> {
    /// A connected resolver/deferred pair.
    pub fn pair() -> (Resolver<T>, Self) {
        let core = Arc::new(Core::new());
        (
            Resolver {
                core: Some(core.clone()),
            },
            Self {
                core,
                hop: Arc::new(Hop::new()),
            },
        )
    }

    /// Already completed with `value`.
    pub fn ready(value: T) -> Self {
        Self::from_result(Ok(value))
    }

    /// Already failed with `error`.
    pub fn failed(error: impl Into<Error>) -> Self {
        Self::from_result(Err(error.into()))
    }

    fn from_result(result: Result<T>) -> Self {
        Self {
            core: Arc::new(Core::done(result)),
            hop: Arc::new(Hop::new()),
        }
    }

    /// The continuation policy currently in force.
    pub fn policy(&self) -> Policy {
        self.hop.policy()
    }

    /// Has the final value arrived?
    pub fn is_ready(&self) -> bool {
        self.core.is_ready()
    }

    /// Run continuations as tasks on `executor`.
    pub fn via(self, executor: impl Executor + 'static) -> Self {
        self.hop.bind(Policy::Via(Arc::new(executor)));
        self
    }

    /// Run continuations on whichever thread completes the previous step.
    /// Held continuations run right away on the calling thread.
    pub fn inline(self) -> Self {
        self.hop.bind(Policy::Inline);
        self
    }

    /// Add a continuation that sees the full result of this step.
    ///
    /// A panic in `f` fails the next step with [`Error::Panicked`].
    pub fn defer<U, F>(self, f: F) -> Deferred<U>
    where
        U: Send + 'static,
        F: FnOnce(Result<T>) -> Result<U> + Send + 'static,
    {
        let next = Arc::new(Core::new());
        let stage = next.clone();
        let hop = self.hop.clone();
        self.core.subscribe(Box::new(move |result| {
            hop.dispatch(Box::new(move || stage.complete(run_stage(f, result))));
        }));
        Deferred {
            core: next,
            hop: self.hop,
        }
    }

    /// Add a continuation on the value; errors skip `f` and pass through.
    pub fn defer_value<U, F>(self, f: F) -> Deferred<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.defer(move |result| result.map(f))
    }

    /// Register the final consumer. `callback` runs on the thread that
    /// completes the last step, or right here if it is already complete.
    pub fn on_complete(self, callback: impl FnOnce(Result<T>) + Send + 'static) {
        self.core.subscribe(Box::new(callback));
    }

    /// Block the calling context until the value arrives.
    ///
    /// Unbound continuations run inline: on the completing thread, or on
    /// this one if they are already pending.
    pub fn get(self) -> Result<T> {
        let deferred = match self.policy() {
            Policy::Unbound => self.inline(),
            _ => self,
        };
        let (promise, channel) = PromiseChannel::new();
        deferred.on_complete(move |result| promise.fulfil(result));
        channel.wait()
    }

    /// Drive `event_loop` on this thread until the value arrives.
    ///
    /// Unbound continuations run as tasks on `event_loop`.
    pub fn get_via(self, event_loop: &EventLoop) -> Result<T> {
        let deferred = match self.policy() {
            Policy::Unbound => self.via(event_loop.handle()),
            _ => self,
        };
        let (promise, channel) = PromiseChannel::new();
        let handle = event_loop.handle();
        deferred.on_complete(move |result| {
            promise.fulfil(result);
            handle.wake();
        });
        event_loop.run_until(|| channel.is_ready());
        channel.wait()
    }
}

fn run_stage<T, U>(f: impl FnOnce(Result<T>) -> Result<U>, input: Result<T>) -> Result<U> {
    panic::catch_unwind(AssertUnwindSafe(move || f(input)))
        .unwrap_or_else(|payload| Err(Error::Panicked(panic_message(&*payload))))
}

/// A deferred unit value completed on the timekeeper thread after `delay`.
pub fn sleep(delay: Duration) -> Deferred<()> {
    let (resolver, deferred) = Deferred::pair();
    timekeeper::after(delay, Box::new(move || resolver.resolve(())));
    deferred
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::InlineExecutor;
    use std::thread;

    #[test]
    fn stages_are_held_until_a_policy_is_chosen() {
        let (resolver, deferred) = Deferred::pair();
        let deferred = deferred.defer_value(|v: u32| v + 1);
        resolver.resolve(1);
        assert!(!deferred.is_ready());
        let deferred = deferred.inline();
        assert!(deferred.is_ready());
        assert_eq!(deferred.get().unwrap(), 2);
    }

    #[test]
    fn inline_stages_run_on_the_completing_thread() {
        let (resolver, deferred) = Deferred::<()>::pair();
        let deferred = deferred
            .defer_value(|()| thread::current().id())
            .via(InlineExecutor);
        let producer = thread::spawn(move || {
            resolver.resolve(());
            thread::current().id()
        });
        let producer_id = producer.join().unwrap();
        assert_eq!(deferred.get().unwrap(), producer_id);
    }

    #[test]
    fn errors_skip_value_stages() {
        let deferred = Deferred::<u8>::failed(Error::custom("bad")).defer_value(|v| v * 2);
        let err = deferred.get().unwrap_err();
        assert_eq!(err.to_string(), "bad");
    }

    #[test]
    fn panicking_stage_fails_the_chain() {
        let deferred = Deferred::ready(1u8).defer_value(|_| -> u8 { panic!("stage blew up") });
        match deferred.get() {
            Err(Error::Panicked(msg)) => assert!(msg.contains("stage blew up")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn dropped_resolver_breaks_the_deferred() {
        let (resolver, deferred) = Deferred::<u8>::pair();
        drop(resolver);
        assert!(matches!(deferred.get(), Err(Error::BrokenPromise)));
    }

    #[test]
    fn sleep_completes_off_thread() {
        let start = std::time::Instant::now();
        sleep(Duration::from_millis(5)).get().unwrap();
        assert!(start.elapsed() >= Duration::from_millis(5));
    }
}
