//! Timers for code that is not on a fiber's stack.
//!
//! Fiber code waits with [`Baton::try_wait_for`](crate::Baton::try_wait_for);
//! futures driven by [`task_wait`](crate::task_wait) use [`sleep`]. Both
//! completions of a [`sleep`] and of [`deferred::sleep`](crate::deferred::sleep)
//! happen on the shared timekeeper thread.

use core::future::Future;
use core::pin::Pin;
use core::sync::atomic::{AtomicBool, Ordering};
use core::task::{Context, Poll};
use std::sync::Arc;
use std::time::Duration;

use futures::task::AtomicWaker;

use crate::runtime::timekeeper;

/// Future that completes once `delay` has elapsed.
pub fn sleep(delay: Duration) -> Sleep {
    Sleep { delay, timer: None }
}

/// Future returned by [`sleep`]. The timer starts on first poll.
#[must_use = "futures do nothing unless polled"]
pub struct Sleep {
    delay: Duration,
    timer: Option<Arc<Timer>>,
}

struct Timer {
    fired: AtomicBool,
    waker: AtomicWaker,
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        let delay = this.delay;
        let timer = this.timer.get_or_insert_with(|| {
            let timer = Arc::new(Timer {
                fired: AtomicBool::new(false),
                waker: AtomicWaker::new(),
            });
            let fire = timer.clone();
            timekeeper::after(
                delay,
                Box::new(move || {
                    fire.fired.store(true, Ordering::Release);
                    fire.waker.wake();
                }),
            );
            timer
        });
        timer.waker.register(cx.waker());
        if timer.fired.load(Ordering::Acquire) {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn sleep_resolves_after_delay() {
        let start = Instant::now();
        futures::executor::block_on(sleep(Duration::from_millis(10)));
        assert!(start.elapsed() >= Duration::from_millis(10));
    }
}
