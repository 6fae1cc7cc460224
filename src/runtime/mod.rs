//! The scheduler side: an event loop, the fiber manager it drives, and a
//! timer thread. These implement exactly the surface the bridges consume:
//! run a fiber, park it, wake it by id, and run code on the main context.

mod event_loop;
mod manager;
mod options;
mod shared;
pub(crate) mod timekeeper;

pub use event_loop::{EventLoop, LoopHandle};
pub use manager::{FiberId, FiberManager, MainContextExecutor};
pub use options::Options;

pub(crate) use manager::{FiberCtx, FiberWaker, Suspend};
