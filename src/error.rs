//! Errors propagated to the await site.
//!
//! Contract violations (awaiting off a fiber, double post, double fulfilment,
//! concurrent double wait) are bugs in the caller and panic instead.

use std::any::Any;

/// Error delivered through a promise, a deferred value or a fiber task.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The producing side was dropped without ever being fulfilled.
    #[error("promise dropped before it was fulfilled")]
    BrokenPromise,
    /// A fiber task or a deferred continuation panicked.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// A fiber stack could not be allocated.
    #[error("failed to allocate fiber stack")]
    Stack(#[source] std::io::Error),
    /// Error raised by user code.
    #[error(transparent)]
    Custom(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap an arbitrary error raised by user code.
    pub fn custom(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Custom(error.into())
    }

    /// True if this error came from a panic.
    pub fn is_panic(&self) -> bool {
        matches!(self, Error::Panicked(_))
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_messages_are_recovered() {
        let payload = std::panic::catch_unwind(|| panic!("boom {}", 7)).unwrap_err();
        assert_eq!(panic_message(&*payload), "boom 7");

        let payload = std::panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(&*payload), "static");
    }

    #[test]
    fn custom_errors_keep_their_message() {
        let err = Error::custom("bad input");
        assert_eq!(err.to_string(), "bad input");
        assert!(!err.is_panic());
    }
}
