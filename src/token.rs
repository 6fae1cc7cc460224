//! `Async<T>`: proof that a value was produced on a fiber.
//!
//! Functions that may suspend the calling fiber return `Async<T>` instead of
//! `T`. The only way to get the value out is [`r#await`] or [`init_await`],
//! both of which check that the caller is itself on a fiber, so a
//! fiber-only call can never be made silently from a plain thread.
//!
//! The token keeps the value category of its payload: `Async<T>` owns a `T`,
//! `Async<&T>` / `Async<&mut T>` carry a borrow whose lifetime the compiler
//! tracks, and `Async<()>` carries nothing.

use core::fmt;
use core::marker::PhantomData;

use crate::context;

/// A value produced by fiber-only code. Unwrap with [`r#await`].
#[must_use = "an Async value must be awaited"]
pub struct Async<T> {
    value: T,
    // Tokens are consumed where they are produced: !Send and !Sync.
    _local: PhantomData<*const ()>,
}

impl<T> Async<T> {
    /// Wrap `value`. Panics when not called on a fiber.
    ///
    /// Passing a reference builds a reference token (`Async<&U>`). Use
    /// [`Async::cloned`] or `From<&T>` to get an owned copy instead.
    #[track_caller]
    pub fn new(value: T) -> Self {
        require_fiber("Async::new");
        Self {
            value,
            _local: PhantomData,
        }
    }

    /// Convert the payload with `From`, moving it.
    ///
    /// `Async<String>` becomes `Async<Option<String>>` without copying the
    /// string.
    pub fn map_into<U: From<T>>(self) -> Async<U> {
        Async {
            value: U::from(self.value),
            _local: PhantomData,
        }
    }
}

impl<T: Clone> Async<T> {
    /// Owned token holding a clone of `value`. Panics off a fiber.
    #[track_caller]
    pub fn cloned(value: &T) -> Self {
        Self::new(value.clone())
    }
}

impl<T> From<T> for Async<T> {
    #[track_caller]
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

/// Implicit promotion of a borrowed value copies it: `(&x).into()` is an
/// owned `Async<T>`. A reference token has to be asked for by type, as in
/// `Async::<&T>::new(&x)`.
impl<T: Clone> From<&T> for Async<T> {
    #[track_caller]
    fn from(value: &T) -> Self {
        Self::cloned(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Async<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Async").field(&self.value).finish()
    }
}

/// Unwrap a token. Panics when not called on a fiber.
#[track_caller]
pub fn r#await<T>(token: Async<T>) -> T {
    require_fiber("await");
    token.value
}

/// Unwrap a token at the outermost call site of a fiber.
///
/// Same checks and result as [`r#await`]; it marks the point where a fiber
/// body enters awaitable code.
#[track_caller]
pub fn init_await<T>(token: Async<T>) -> T {
    require_fiber("init_await");
    token.value
}

#[track_caller]
pub(crate) fn require_fiber(what: &str) {
    assert!(
        context::on_fiber(),
        "{what}: fiber-only operation called outside of a fiber"
    );
}

mod sealed {
    pub trait Sealed {}
    impl<T> Sealed for super::Async<T> {}
}

/// Implemented only by [`Async`]: a compile-time "is this a token" query.
pub trait AsyncValue: sealed::Sealed {
    /// The payload type, value category included.
    type Inner;
}

impl<T> AsyncValue for Async<T> {
    type Inner = T;
}

/// Payload type of a token type: `AsyncInner<Async<&i32>>` is `&i32`.
pub type AsyncInner<A> = <A as AsyncValue>::Inner;
