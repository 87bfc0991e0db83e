use thiserror::Error;

/// An error raised by a subscriber while handling an event.
///
/// Handler errors are collected per dispatch and reported to the
/// publisher; they are never raised individually and never affect the
/// commit that produced the event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("handler failed: {reason}")]
pub struct HandlerError {
    /// Why the handler failed.
    pub reason: String,
}

impl HandlerError {
    /// Creates a handler error with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// One handler's failure during a dispatch pass.
#[derive(Debug, Clone)]
pub struct HandlerFailure {
    /// Name of the failing handler.
    pub handler: String,

    /// The error it returned.
    pub error: HandlerError,
}
