use super::{Deferred, Policy};
use crate::context;
use crate::error::Result;
use crate::promise::{PromiseChannel, channel_wait};
use crate::token::{Async, r#await, require_fiber};

/// Wait on a deferred value from a fiber, parking only the fiber.
///
/// Where the deferred's continuations run depends on its policy:
///
/// - [`Policy::Inline`]: on the thread that completes the underlying work;
/// - [`Policy::Via`]: on the bound executor;
/// - [`Policy::Unbound`]: on this fiber's thread, on the manager's main
///   context. They see `in_fiber_loop() == true` and `on_fiber() == false`.
///
/// Errors and panics of the chain come back as `Err`.
#[track_caller]
pub fn deferred_wait<T: Send + 'static>(deferred: Deferred<T>) -> Async<Result<T>> {
    require_fiber("deferred_wait");
    let deferred = match (deferred.policy(), context::current_manager()) {
        (Policy::Unbound, Some(manager)) => deferred.via(manager.main_context_executor()),
        (Policy::Unbound, None) => deferred.inline(),
        _ => deferred,
    };
    let (promise, channel) = PromiseChannel::new();
    deferred.on_complete(move |result| promise.fulfil(result));
    Async::new(r#await(channel_wait(channel)))
}
