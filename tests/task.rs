mod common;

use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};

use fiber_await::prelude::*;
use fiber_await::time;

#[test]
fn future_runs_on_the_loop_thread_off_the_fiber() {
    let loop_thread = thread::current().id();
    let seen = common::on_fiber(|| {
        init_await(task_wait(async {
            time::sleep(Duration::from_millis(1)).await;
            (thread::current().id(), in_fiber_loop(), on_fiber())
        }))
    });
    assert_eq!(seen, (loop_thread, true, false));
}

#[test]
fn sleeping_future_takes_at_least_its_delay() {
    let elapsed = common::on_fiber(|| {
        let start = Instant::now();
        init_await(wait_on(Coroutine::new(time::sleep(Duration::from_millis(15)))));
        start.elapsed()
    });
    assert!(elapsed >= Duration::from_millis(15));
}

#[test]
fn error_output_is_returned_as_is() {
    let out = common::on_fiber(|| {
        init_await(task_wait(async {
            time::sleep(Duration::from_millis(1)).await;
            Err::<u8, _>(Error::custom("async failure"))
        }))
    });
    assert_eq!(out.unwrap_err().to_string(), "async failure");
}

#[test]
fn panic_inside_the_future_resumes_on_the_fiber() {
    let caught = common::on_fiber(|| {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            init_await(task_wait(async {
                time::sleep(Duration::from_millis(1)).await;
                if on_fiber() {
                    return 0u8;
                }
                panic!("future panicked")
            }))
        }));
        let payload = result.expect_err("the panic propagates to the fiber");
        // Back on the fiber after the unwind.
        (on_fiber(), payload.downcast_ref::<&str>().copied())
    });
    assert_eq!(caught, (true, Some("future panicked")));
}

#[test]
fn futures_can_wait_on_other_threads() {
    let v = common::on_fiber(|| {
        init_await(task_wait(async {
            let (tx, rx) = futures::channel::oneshot::channel();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(2));
                let _ = tx.send(99u32);
            });
            rx.await
        }))
    });
    assert_eq!(v.unwrap(), 99);
}

#[test]
fn main_context_calls_see_the_loop_but_not_the_fiber() {
    let seen = common::on_fiber(|| {
        let inner = run_in_main_context(|| (in_fiber_loop(), on_fiber()));
        (inner, (in_fiber_loop(), on_fiber()))
    });
    assert_eq!(seen, ((true, false), (true, true)));
}

#[test]
fn already_ready_future_needs_no_suspension() {
    let v = common::on_fiber(|| init_await(task_wait(async { 5 })));
    assert_eq!(v, 5);
}
