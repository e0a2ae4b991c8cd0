//! `TaskCore<T>`: the single-assignment cell shared by a `Task`/`TaskSource`
//! pair (spec.md §3, §4.2).
//!
//! # Design background (Why)
//! - Every invariant in spec.md §8 ultimately reduces to two critical
//!   sections on this type: completing the core, and attaching a
//!   continuation to it. Both must observe the *same* lock, and both must
//!   release that lock before running any user code, or a continuation that
//!   completes a second `TaskCore` it shares a thread with could deadlock
//!   against a continuation registered on *this* core (spec.md §9).
//!
//! # Concurrency (How)
//! - `parking_lot::Mutex` guards `state`; `parking_lot::Condvar` backs
//!   `wait_until_completed`. Draining the continuation list happens inside
//!   the lock (step 4 of spec.md §4.2's completion protocol); *running* the
//!   drained continuations happens strictly after the lock is dropped (step
//!   7).
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::{AlreadyCompleted, TaskFailure};
use crate::executor::{Continuation, Executor};

/// The three ways a `Task` can terminate (spec.md §3: `Success(value: T) |
/// Failure(error) | Cancelled`).
#[derive(Clone)]
pub(crate) enum Outcome<T> {
    Success(T),
    Failure(TaskFailure),
    Cancelled,
}

pub(crate) enum State<T> {
    Pending(Vec<(Executor, Continuation)>),
    Done(Outcome<T>),
}

pub(crate) struct TaskCore<T> {
    state: Mutex<State<T>>,
    condvar: Condvar,
}

impl<T> TaskCore<T> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::Pending(Vec::new())),
            condvar: Condvar::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock()
    }

    /// Completes the core exactly once (spec.md §4.2's completion protocol).
    ///
    /// Returns `Err(AlreadyCompleted)` without touching `outcome` a second
    /// time if `state` had already left `Pending` — the non-`try` setters
    /// surface that as an error, the `try_*` setters collapse it to `false`.
    pub(crate) fn complete(&self, outcome: Outcome<T>) -> Result<(), AlreadyCompleted> {
        let continuations = {
            let mut guard = self.lock();
            match &*guard {
                State::Done(_) => return Err(AlreadyCompleted),
                State::Pending(_) => {}
            }
            let previous = std::mem::replace(&mut *guard, State::Done(outcome));
            match previous {
                State::Pending(continuations) => continuations,
                State::Done(_) => unreachable!("checked above"),
            }
            // `guard` drops here, before any continuation runs.
        };
        self.condvar.notify_all();
        tracing::trace!(
            continuations = continuations.len(),
            "task completed, draining continuations"
        );
        for (executor, job) in continuations {
            executor.execute(job);
        }
        Ok(())
    }

    /// Registers a continuation, or runs it immediately if the core has
    /// already completed (spec.md §4.2's attachment protocol).
    pub(crate) fn add_continuation(&self, executor: Executor, job: Continuation) {
        let mut guard = self.lock();
        match &mut *guard {
            State::Pending(continuations) => {
                continuations.push((executor, job));
            }
            State::Done(_) => {
                drop(guard);
                executor.execute(job);
            }
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        matches!(&*self.lock(), State::Pending(_))
    }

    pub(crate) fn is_faulted(&self) -> bool {
        matches!(&*self.lock(), State::Done(Outcome::Failure(_)))
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        matches!(&*self.lock(), State::Done(Outcome::Cancelled))
    }

    pub(crate) fn error(&self) -> Option<TaskFailure> {
        match &*self.lock() {
            State::Done(Outcome::Failure(error)) => Some(error.clone()),
            _ => None,
        }
    }

    pub(crate) fn wait_until_completed(&self) {
        let mut guard = self.lock();
        while matches!(&*guard, State::Pending(_)) {
            self.condvar.wait(&mut guard);
        }
    }
}

impl<T: Clone> TaskCore<T> {
    pub(crate) fn result(&self) -> T {
        match &*self.lock() {
            State::Done(Outcome::Success(value)) => value.clone(),
            State::Done(Outcome::Failure(_)) => {
                panic!("Task::result() called on a task that failed")
            }
            State::Done(Outcome::Cancelled) => {
                panic!("Task::result() called on a cancelled task")
            }
            State::Pending(_) => panic!("Task::result() called before the task completed"),
        }
    }
}
