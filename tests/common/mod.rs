#![allow(dead_code)]

use fiber_await::prelude::*;

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Run `f` on a fresh fiber and drive its loop on this thread until it ends.
pub fn on_fiber<T, F>(f: F) -> T
where
    F: FnOnce() -> T + 'static,
    T: Send + 'static,
{
    init_tracing();
    let ev = EventLoop::new();
    ev.fiber_manager()
        .add_task(f)
        .expect("fiber stack")
        .get_via(&ev)
        .expect("fiber task failed")
}
