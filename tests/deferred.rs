mod common;

use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use fiber_await::deferred;
use fiber_await::prelude::*;
use fiber_await::{Executor, InlineExecutor, Policy};

type Seen = (ThreadId, bool, bool);

fn where_am_i() -> Seen {
    (thread::current().id(), in_fiber_loop(), on_fiber())
}

#[test]
fn inline_continuation_runs_on_the_completing_thread() {
    let loop_thread = thread::current().id();
    let (tid, in_loop, fiber) = common::on_fiber(|| {
        let work = deferred::sleep(Duration::from_millis(1))
            .defer_value(|()| where_am_i())
            .inline();
        init_await(deferred_wait(work)).unwrap()
    });
    assert_ne!(tid, loop_thread);
    assert!(!in_loop);
    assert!(!fiber);
}

#[test]
fn via_loop_handle_runs_as_a_loop_task() {
    common::init_tracing();
    let loop_thread = thread::current().id();
    let ev = EventLoop::new();
    let handle = ev.handle();
    let seen = ev
        .fiber_manager()
        .add_task(move || {
            let work = deferred::sleep(Duration::from_millis(1))
                .defer_value(|()| where_am_i())
                .via(handle);
            init_await(deferred_wait(work)).unwrap()
        })
        .unwrap()
        .get_via(&ev)
        .unwrap();
    assert_eq!(seen, (loop_thread, false, false));
}

#[test]
fn via_executor_on_another_thread_reports_that_thread() {
    let (tx, rx) = std::sync::mpsc::channel();
    let worker = thread::spawn(move || {
        let ev = EventLoop::new();
        tx.send(ev.handle()).unwrap();
        ev.loop_forever();
        thread::current().id()
    });
    let remote = rx.recv().unwrap();
    let stopper = remote.clone();

    let loop_thread = thread::current().id();
    let (tid, in_loop, fiber) = common::on_fiber(move || {
        let work = deferred::sleep(Duration::from_millis(1))
            .defer_value(|()| where_am_i())
            .via(remote);
        init_await(deferred_wait(work)).unwrap()
    });
    stopper.stop();
    let worker_thread = worker.join().unwrap();

    assert_ne!(tid, loop_thread);
    assert_eq!(tid, worker_thread);
    assert!(!in_loop);
    assert!(!fiber);
}

#[test]
fn unbound_continuation_runs_on_the_main_context() {
    let loop_thread = thread::current().id();
    let seen = common::on_fiber(|| {
        let work = deferred::sleep(Duration::from_millis(1)).defer_value(|()| where_am_i());
        assert!(matches!(work.policy(), Policy::Unbound));
        init_await(wait_on(work)).unwrap()
    });
    assert_eq!(seen, (loop_thread, true, false));
}

#[test]
fn several_stages_chain_under_one_policy() {
    let loop_thread = thread::current().id();
    let (value, seen) = common::on_fiber(|| {
        let work = deferred::sleep(Duration::from_millis(1))
            .defer_value(|()| 20)
            .defer_value(|v| v + 1)
            .defer(|r| r.map(|v| (v * 2, where_am_i())));
        init_await(deferred_wait(work)).unwrap()
    });
    assert_eq!(value, 42);
    assert_eq!(seen, (loop_thread, true, false));
}

#[test]
fn errors_and_panics_reach_the_waiter() {
    common::on_fiber(|| {
        let failed = Deferred::<u8>::failed(Error::custom("upstream")).defer_value(|v| v + 1);
        let err = init_await(deferred_wait(failed)).unwrap_err();
        assert_eq!(err.to_string(), "upstream");

        let panicked = deferred::sleep(Duration::from_millis(1))
            .defer_value(|()| -> u8 { panic!("stage panicked") });
        match init_await(deferred_wait(panicked)) {
            Err(Error::Panicked(msg)) => assert!(msg.contains("stage panicked")),
            other => panic!("unexpected {other:?}"),
        }
    });
}

#[test]
fn resolver_on_another_thread() {
    let v = common::on_fiber(|| {
        let (resolver, work) = Deferred::pair();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(2));
            resolver.resolve(String::from("resolved"));
        });
        init_await(deferred_wait(work.via(InlineExecutor)))
    });
    assert_eq!(v.unwrap(), "resolved");
}

#[test]
fn get_via_drives_the_loop_until_done() {
    common::init_tracing();
    let ev = EventLoop::new();
    let loop_thread = thread::current().id();
    let seen = deferred::sleep(Duration::from_millis(2))
        .defer_value(|()| where_am_i())
        .get_via(&ev)
        .unwrap();
    assert_eq!(seen, (loop_thread, false, false));
}

#[test]
fn fiber_panic_fails_its_task() {
    common::init_tracing();
    let ev = EventLoop::new();
    let task = ev
        .fiber_manager()
        .add_task(|| -> u8 { panic!("fiber body panicked") })
        .unwrap();
    match task.get_via(&ev) {
        Err(Error::Panicked(msg)) => assert!(msg.contains("fiber body panicked")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn dropping_the_loop_breaks_parked_tasks() {
    common::init_tracing();
    let ev = EventLoop::new();
    let (_promise, channel) = PromiseChannel::<u8>::new();
    let task = ev
        .fiber_manager()
        .add_task(move || init_await(channel_wait(channel)))
        .unwrap();
    assert!(ev.loop_once());
    assert_eq!(ev.fiber_manager().fiber_count(), 1);
    drop(ev);
    assert!(matches!(task.get(), Err(Error::BrokenPromise)));
}

#[test]
fn baton_is_reusable_after_its_waiter_was_torn_down() {
    common::init_tracing();
    let baton = Arc::new(Baton::new());

    let ev = EventLoop::new();
    let parked = {
        let baton = baton.clone();
        ev.fiber_manager()
            .add_task(move || init_await(baton_wait(&baton)))
            .unwrap()
    };
    assert!(ev.loop_once());
    drop(ev);
    assert!(matches!(parked.get(), Err(Error::BrokenPromise)));

    let waiter = baton.clone();
    let timed_out = common::on_fiber(move || {
        init_await(baton_try_wait_for(&waiter, Duration::from_millis(5)))
    });
    assert!(!timed_out);

    baton.post();
    let waiter = baton.clone();
    common::on_fiber(move || init_await(baton_wait(&waiter)));
}

#[test]
fn panicking_completion_callback_does_not_stop_later_timers() {
    let (done_tx, done_rx) = std::sync::mpsc::channel();
    deferred::sleep(Duration::from_millis(1))
        .inline()
        .on_complete(move |_| {
            done_tx.send(()).unwrap();
            panic!("completion callback failed");
        });
    done_rx.recv().unwrap();

    deferred::sleep(Duration::from_millis(1)).get().unwrap();
    let loop_thread = thread::current().id();
    let seen = common::on_fiber(|| {
        init_await(task_wait(async {
            fiber_await::time::sleep(Duration::from_millis(1)).await;
            thread::current().id()
        }))
    });
    assert_eq!(seen, loop_thread);
}

#[test]
fn panicking_loop_task_leaves_the_loop_running() {
    common::init_tracing();
    let ev = EventLoop::new();
    ev.handle().add(Box::new(|| panic!("loop task failed")));
    assert!(ev.loop_once());

    let v = ev
        .fiber_manager()
        .add_task(|| init_await(promise_wait(|p: Promise<u8>| p.set_value(9))))
        .unwrap()
        .get_via(&ev)
        .unwrap();
    assert_eq!(v.unwrap(), 9);
}
