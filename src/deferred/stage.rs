//! Completion slot of one deferred stage.

use std::mem;

use parking_lot::Mutex;

use crate::error::Result;

pub(crate) type Callback<T> = Box<dyn FnOnce(Result<T>) + Send>;

enum State<T> {
    Pending,
    Subscribed(Callback<T>),
    Done(Result<T>),
    Spent,
}

/// Holds a stage's result until its single consumer subscribes, or holds the
/// consumer until the result arrives. Whichever comes second runs the
/// callback, on its own thread.
pub(crate) struct Core<T> {
    state: Mutex<State<T>>,
}

impl<T> Core<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State::Pending),
        }
    }

    pub(crate) fn done(result: Result<T>) -> Self {
        Self {
            state: Mutex::new(State::Done(result)),
        }
    }

    pub(crate) fn complete(&self, result: Result<T>) {
        let mut state = self.state.lock();
        match mem::replace(&mut *state, State::Spent) {
            State::Pending => *state = State::Done(result),
            State::Subscribed(callback) => {
                drop(state);
                callback(result);
            }
            State::Done(_) | State::Spent => panic!("deferred value completed twice"),
        }
    }

    pub(crate) fn subscribe(&self, callback: Callback<T>) {
        let mut state = self.state.lock();
        match mem::replace(&mut *state, State::Spent) {
            State::Pending => *state = State::Subscribed(callback),
            State::Done(result) => {
                drop(state);
                callback(result);
            }
            State::Subscribed(_) | State::Spent => {
                panic!("deferred value already has a consumer")
            }
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        matches!(*self.state.lock(), State::Done(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn callback_runs_once_whichever_side_comes_second() {
        let hits = Arc::new(AtomicU32::new(0));

        let early = Core::new();
        let h = hits.clone();
        early.subscribe(Box::new(move |r| {
            assert_eq!(r.unwrap(), 1);
            h.fetch_add(1, Ordering::SeqCst);
        }));
        early.complete(Ok(1));

        let late = Core::done(Ok(1));
        assert!(late.is_ready());
        let h = hits.clone();
        late.subscribe(Box::new(move |r| {
            assert_eq!(r.unwrap(), 1);
            h.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[should_panic(expected = "completed twice")]
    fn double_completion_panics() {
        let core = Core::<u8>::new();
        core.complete(Ok(1));
        core.complete(Ok(2));
    }
}
