//! Error types shared by the task state machine and its combinators.
//!
//! # Design background (Why)
//! - A `Task<T>` is polymorphic over an opaque error type so that any
//!   continuation, regardless of which crate it lives in, can fail with its
//!   own error without the core state machine having to know about it. We
//!   pick the single-erased-type approach spec.md §9 calls out (rather than a
//!   second generic parameter on `Task`/`TaskSource`) because it keeps the
//!   public surface small and matches how the teacher crate layers
//!   `CoreError` over an arbitrary boxed cause.
//!
//! # Contract (What)
//! - [`TaskFailure`] is the library's `UserError`: a cheaply-`Clone`able
//!   wrapper around any `std::error::Error + Send + Sync + 'static`.
//! - [`AggregateError`] is produced only by `when_all`/`when_all_result`
//!   (spec.md §4.5) and is itself liftable into a `TaskFailure`.
//! - [`AlreadyCompleted`] is returned by the non-`try` setters on
//!   `TaskSource` when the backing `TaskCore` has already left `Pending`.
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Returned by [`crate::TaskSource`]'s non-`try` setters when the task has
/// already reached a terminal state.
///
/// spec.md §7 calls this a programming error: callers are expected to use the
/// `try_*` setters whenever a race on completion is possible, and to treat an
/// `Err` here as a bug to fix rather than a condition to route around.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("task was already completed")]
pub struct AlreadyCompleted;

/// An opaque, cheaply-cloneable error carried by a faulted [`crate::Task`].
///
/// Cloning is backed by an `Arc`, so every continuation that reads
/// [`crate::Task::error`] on an already-completed task shares the same
/// allocation rather than re-boxing the cause.
#[derive(Clone)]
pub struct TaskFailure {
    inner: Arc<dyn std::error::Error + Send + Sync + 'static>,
}

impl TaskFailure {
    /// Wraps any standard error as a task failure.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(error),
        }
    }

    /// Builds a task failure from a plain message, with no underlying cause.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self::new(MessageError(message.into()))
    }

    /// Recovers a task failure from a continuation panic payload.
    ///
    /// Continuations are run inside `catch_unwind` (spec.md §7: exceptions
    /// thrown out of a continuation must not escape onto the executor
    /// thread); this turns whatever was passed to `panic!` into a message
    /// when it is a `&str`/`String`, and falls back to a generic message
    /// otherwise.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        if let Some(message) = payload.downcast_ref::<&'static str>() {
            Self::from_message(*message)
        } else if let Some(message) = payload.downcast_ref::<String>() {
            Self::from_message(message.clone())
        } else {
            Self::from_message("continuation panicked")
        }
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskFailure").field(&self.inner).finish()
    }
}

impl std::error::Error for TaskFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

#[derive(Debug)]
struct MessageError(String);

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for MessageError {}

/// Error produced by `when_all`/`when_all_result` when one or more inputs
/// faulted (spec.md §4.5, §6).
///
/// `errors` preserves *completion order*, not input order — the Open
/// Question spec.md §9 raises is resolved in favor of completion order (see
/// DESIGN.md).
#[derive(Debug, Clone)]
pub struct AggregateError {
    errors: Vec<TaskFailure>,
}

impl AggregateError {
    /// Builds an aggregate error from the errors observed, in the order they
    /// completed.
    pub fn new(errors: Vec<TaskFailure>) -> Self {
        Self { errors }
    }

    /// The underlying errors, in completion order.
    pub fn errors(&self) -> &[TaskFailure] {
        &self.errors
    }

    /// Number of faulted inputs.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// True when no input actually faulted (should not occur in practice,
    /// since `when_all` only constructs this error when `errors` is
    /// non-empty).
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.first() {
            Some(first) => write!(
                f,
                "{} of the aggregated tasks failed (first: {first})",
                self.errors.len()
            ),
            None => write!(f, "aggregate error with no underlying causes"),
        }
    }
}

impl std::error::Error for AggregateError {}

impl From<AggregateError> for TaskFailure {
    fn from(value: AggregateError) -> Self {
        TaskFailure::new(value)
    }
}
