#![forbid(unsafe_op_in_unsafe_fn)]
#![deny(missing_docs)]

//! Blocking-looking waits for fiber code that park only the fiber, never the
//! loop thread, bridging four idioms: [`Baton`] wait/post, promise/value
//! handoff ([`Promise`] / [`PromiseChannel`]), [`Deferred`] values with an
//! executor policy, and Rust futures driven as coroutines.
//!
//! Every wait returns an [`Async<T>`] token which only fiber code can unwrap:
//!
//! ```no_run
//! use fiber_await::prelude::*;
//!
//! let ev = EventLoop::new();
//! let answer = ev
//!     .fiber_manager()
//!     .add_task(|| {
//!         let v = init_await(promise_wait(|p: Promise<u32>| {
//!             std::thread::spawn(move || p.set_value(42));
//!         }));
//!         v.unwrap()
//!     })
//!     .unwrap()
//!     .get_via(&ev)
//!     .unwrap();
//! assert_eq!(answer, 42);
//! ```

mod awaitable;
mod baton;
pub mod context;
pub mod deferred;
mod error;
mod executor;
mod promise;
pub mod runtime;
mod task;
pub mod time;
mod token;
mod util;

pub use awaitable::{FiberWait, wait_on};
pub use baton::{Baton, baton_try_wait_for, baton_try_wait_until, baton_wait};
pub use deferred::{Deferred, Policy, Resolver, deferred_wait};
pub use error::{Error, Result};
pub use executor::{Executor, InlineExecutor, Task};
pub use promise::{Promise, PromiseChannel, channel_wait, promise_wait};
pub use runtime::{EventLoop, FiberId, FiberManager, LoopHandle, Options};
pub use task::{Coroutine, task_wait};
pub use token::{Async, AsyncInner, AsyncValue, init_await, r#await};

/// Everything needed to write fiber code.
pub mod prelude {
    pub use crate::context::{in_fiber_loop, on_fiber, run_in_main_context};
    pub use crate::{
        Async, Baton, Coroutine, Deferred, Error, EventLoop, Executor, FiberManager, FiberWait,
        LoopHandle, Promise, PromiseChannel, Result, baton_try_wait_for, baton_try_wait_until,
        baton_wait, channel_wait, deferred_wait, init_await, promise_wait, r#await, task_wait,
        wait_on,
    };
}
