//! `TaskSource<T>`: the write-side handle that completes a [`TaskCore`]
//! exactly once (spec.md §3, §4.2).
use crate::core::{Outcome, TaskCore};
use crate::error::{AlreadyCompleted, TaskFailure};
use crate::task::Task;

/// The exclusive write handle paired with a [`Task`].
///
/// Nothing stops application code from cloning a `TaskSource` (the
/// underlying core only ever accepts the first completion, regardless of
/// which clone calls it), which is convenient for combinators like
/// `when_all` that complete one source from many independently-racing
/// continuations; see spec.md §3's note that a core's lifetime is the
/// longest-lived holder among its `Task`/`TaskSource` handles.
pub struct TaskSource<T> {
    core: std::sync::Arc<TaskCore<T>>,
}

impl<T> Clone for TaskSource<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<T: Send + 'static> TaskSource<T> {
    /// Creates a fresh, `Pending` source and its paired task.
    pub fn new() -> Self {
        Self {
            core: TaskCore::new(),
        }
    }

    /// The `Task` handle paired with this source. May be called any number
    /// of times; every call returns a handle to the same underlying core.
    pub fn task(&self) -> Task<T> {
        Task {
            core: self.core.clone(),
        }
    }

    /// Transitions `Pending -> Success(value)`. Fails with
    /// [`AlreadyCompleted`] if the task was already completed.
    pub fn set_result(&self, value: T) -> Result<(), AlreadyCompleted> {
        self.core.complete(Outcome::Success(value))
    }

    /// Transitions `Pending -> Failure(error)`. Fails with
    /// [`AlreadyCompleted`] if the task was already completed.
    pub fn set_error(&self, error: TaskFailure) -> Result<(), AlreadyCompleted> {
        self.core.complete(Outcome::Failure(error))
    }

    /// Transitions `Pending -> Cancelled`. Fails with [`AlreadyCompleted`] if
    /// the task was already completed.
    pub fn cancel(&self) -> Result<(), AlreadyCompleted> {
        self.core.complete(Outcome::Cancelled)
    }

    /// Same as [`TaskSource::set_result`], collapsing `AlreadyCompleted` to
    /// `false` instead of returning it.
    pub fn try_set_result(&self, value: T) -> bool {
        self.set_result(value).is_ok()
    }

    /// Same as [`TaskSource::set_error`], collapsing `AlreadyCompleted` to
    /// `false` instead of returning it.
    pub fn try_set_error(&self, error: TaskFailure) -> bool {
        self.set_error(error).is_ok()
    }

    /// Same as [`TaskSource::cancel`], collapsing `AlreadyCompleted` to
    /// `false` instead of returning it.
    pub fn try_cancel(&self) -> bool {
        self.cancel().is_ok()
    }
}

impl<T: Send + 'static> Default for TaskSource<T> {
    fn default() -> Self {
        Self::new()
    }
}
