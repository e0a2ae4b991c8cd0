//! `Task<T>`: the read-only handle to a [`TaskCore`] (spec.md §3).
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::core::{Outcome, TaskCore};
use crate::error::TaskFailure;
use crate::executor::Executor;
use crate::source::TaskSource;

/// An immutable handle to the eventual outcome of a computation.
///
/// Cloning a `Task` is always cheap (an `Arc` bump) regardless of `T`; the
/// `T: Clone` bound only shows up on the methods that actually need to hand
/// a copy of the success value to more than one caller (spec.md allows
/// attaching arbitrarily many continuations to the same task, each of which
/// may read `result()`).
pub struct Task<T> {
    pub(crate) core: Arc<TaskCore<T>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<T: Send + 'static> Task<T> {
    /// True once the task has left `Pending`, regardless of how.
    pub fn completed(&self) -> bool {
        !self.core.is_pending()
    }

    /// True when the task completed with a failure.
    pub fn faulted(&self) -> bool {
        self.core.is_faulted()
    }

    /// True when the task was cancelled.
    pub fn cancelled(&self) -> bool {
        self.core.is_cancelled()
    }

    /// The underlying error, defined only when [`Task::faulted`] is true.
    pub fn error(&self) -> Option<TaskFailure> {
        self.core.error()
    }

    /// Blocks the calling thread until the task reaches a terminal state.
    ///
    /// spec.md §4.8: it is a programming error to call this on the only
    /// thread that could ever complete the task (e.g. the main thread, when
    /// completion itself is only scheduled via `Executor::MainThread`) — the
    /// library does not attempt to detect that deadlock.
    pub fn wait_until_completed(&self) {
        self.core.wait_until_completed();
    }
}

impl<T: Clone + Send + 'static> Task<T> {
    /// A task that is already successfully completed with `value`.
    pub fn from_value(value: T) -> Self {
        let source = TaskSource::new();
        source
            .set_result(value)
            .expect("a freshly constructed TaskSource is always Pending");
        source.task()
    }

    /// A task that is already failed with `error`.
    pub fn from_error(error: TaskFailure) -> Self {
        let source = TaskSource::new();
        source
            .set_error(error)
            .expect("a freshly constructed TaskSource is always Pending");
        source.task()
    }

    /// A task that is already cancelled.
    pub fn cancelled_task() -> Self {
        let source = TaskSource::new();
        source
            .cancel()
            .expect("a freshly constructed TaskSource is always Pending");
        source.task()
    }

    /// The success value. Defined only when `completed && !faulted &&
    /// !cancelled` (spec.md §3); panics otherwise, since observing `result`
    /// outside that window is a programming error that must fail loudly
    /// (spec.md §7).
    pub fn result(&self) -> T {
        self.core.result()
    }

    /// Runs `closure` on `executor` after this task completes, regardless of
    /// its terminal state (spec.md §4.3). The produced task's outcome is the
    /// value `closure` returns.
    pub fn continue_with_on<U, F>(&self, executor: Executor, closure: F) -> Task<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Task<T>) -> U + Send + 'static,
    {
        chain(self, executor, ChainMode::Always, move |t| {
            ChainOutcome::Value(closure(t))
        })
    }

    /// Like [`Task::continue_with_on`], defaulting to `Executor::Default`.
    pub fn continue_with<U, F>(&self, closure: F) -> Task<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Task<T>) -> U + Send + 'static,
    {
        self.continue_with_on(Executor::Default, closure)
    }

    /// Like [`Task::continue_with_on`], but `closure` returns a `Task<U>`
    /// whose terminal state is propagated into the produced task (spec.md
    /// §4.3).
    pub fn continue_with_task_on<U, F>(&self, executor: Executor, closure: F) -> Task<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Task<T>) -> Task<U> + Send + 'static,
    {
        chain(self, executor, ChainMode::Always, move |t| {
            ChainOutcome::Task(closure(t))
        })
    }

    /// Like [`Task::continue_with_task_on`], defaulting to `Executor::Default`.
    pub fn continue_with_task<U, F>(&self, closure: F) -> Task<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Task<T>) -> Task<U> + Send + 'static,
    {
        self.continue_with_task_on(Executor::Default, closure)
    }

    /// Runs `closure` on `executor` only when this task succeeds; a failed
    /// or cancelled antecedent propagates to the produced task without
    /// invoking `closure` (spec.md §4.4).
    pub fn continue_on_success_with_on<U, F>(&self, executor: Executor, closure: F) -> Task<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        chain(self, executor, ChainMode::OnSuccessOnly, move |t| {
            ChainOutcome::Value(closure(t.result()))
        })
    }

    /// Like [`Task::continue_on_success_with_on`], defaulting to
    /// `Executor::Default`.
    pub fn continue_on_success_with<U, F>(&self, closure: F) -> Task<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.continue_on_success_with_on(Executor::Default, closure)
    }

    /// Like [`Task::continue_on_success_with_on`], but `closure` returns a
    /// `Task<U>` (spec.md §4.4).
    pub fn continue_on_success_with_task_on<U, F>(&self, executor: Executor, closure: F) -> Task<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Task<U> + Send + 'static,
    {
        chain(self, executor, ChainMode::OnSuccessOnly, move |t| {
            ChainOutcome::Task(closure(t.result()))
        })
    }

    /// Like [`Task::continue_on_success_with_task_on`], defaulting to
    /// `Executor::Default`.
    pub fn continue_on_success_with_task<U, F>(&self, closure: F) -> Task<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Task<U> + Send + 'static,
    {
        self.continue_on_success_with_task_on(Executor::Default, closure)
    }
}

impl<U: Clone + Send + 'static> Task<U> {
    /// Runs `work` on `executor` and returns a task completed with its
    /// result (spec.md §6: `Task.execute(executor?, closure)`).
    pub fn execute<F>(executor: Executor, work: F) -> Task<U>
    where
        F: FnOnce() -> U + Send + 'static,
    {
        let source = TaskSource::<U>::new();
        let produced = source.task();
        executor.execute(Box::new(move || {
            match panic::catch_unwind(AssertUnwindSafe(work)) {
                Ok(value) => {
                    let _ = source.set_result(value);
                }
                Err(payload) => {
                    let _ = source.set_error(TaskFailure::from_panic(payload));
                }
            }
        }));
        produced
    }

    /// Like [`Task::execute`], but `work` returns a `Task<U>` whose terminal
    /// state is propagated into the produced task (spec.md §6:
    /// `Task.executeWithTask`).
    pub fn execute_with_task<F>(executor: Executor, work: F) -> Task<U>
    where
        F: FnOnce() -> Task<U> + Send + 'static,
    {
        let source = TaskSource::<U>::new();
        let produced = source.task();
        executor.execute(Box::new(move || match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(inner) => forward_into(&inner, source),
            Err(payload) => {
                let _ = source.set_error(TaskFailure::from_panic(payload));
            }
        }));
        produced
    }
}

enum ChainMode {
    Always,
    OnSuccessOnly,
}

enum ChainOutcome<U> {
    Value(U),
    Task(Task<U>),
}

/// Shared plumbing behind all four `continue_*` methods (spec.md §4.3,
/// §4.4): register a wrapper continuation on the antecedent that either
/// forwards its state without running `closure` (`OnSuccessOnly` mode, seeing
/// a non-`Success` antecedent), or runs `closure` under `catch_unwind` and
/// settles the produced task from whatever it returns.
fn chain<T, U, F>(antecedent: &Task<T>, executor: Executor, mode: ChainMode, f: F) -> Task<U>
where
    T: Clone + Send + 'static,
    U: Clone + Send + 'static,
    F: FnOnce(Task<T>) -> ChainOutcome<U> + Send + 'static,
{
    let source = TaskSource::<U>::new();
    let produced = source.task();
    let antecedent_for_job = antecedent.clone();
    let job: Box<dyn FnOnce() + Send> = Box::new(move || {
        let should_invoke = match mode {
            ChainMode::Always => true,
            ChainMode::OnSuccessOnly => !antecedent_for_job.faulted() && !antecedent_for_job.cancelled(),
        };
        if !should_invoke {
            if antecedent_for_job.faulted() {
                let error = antecedent_for_job
                    .error()
                    .expect("faulted task always carries an error");
                let _ = source.set_error(error);
            } else {
                let _ = source.cancel();
            }
            return;
        }
        match panic::catch_unwind(AssertUnwindSafe(|| f(antecedent_for_job))) {
            Ok(ChainOutcome::Value(value)) => {
                let _ = source.set_result(value);
            }
            Ok(ChainOutcome::Task(inner)) => forward_into(&inner, source),
            Err(payload) => {
                let _ = source.set_error(TaskFailure::from_panic(payload));
            }
        }
    });
    antecedent.core.add_continuation(executor, job);
    produced
}

/// Attaches an `Immediate` continuation on `inner` that forwards its
/// terminal state into `source` (spec.md §4.3: "attach an inner continuation
/// ... that forwards t's terminal state into s").
pub(crate) fn forward_into<U: Clone + Send + 'static>(inner: &Task<U>, source: TaskSource<U>) {
    let inner_for_job = inner.clone();
    inner.core.add_continuation(
        Executor::Immediate,
        Box::new(move || match snapshot(&inner_for_job) {
            Outcome::Success(value) => {
                let _ = source.set_result(value);
            }
            Outcome::Failure(error) => {
                let _ = source.set_error(error);
            }
            Outcome::Cancelled => {
                let _ = source.cancel();
            }
        }),
    );
}

fn snapshot<U: Clone + Send + 'static>(task: &Task<U>) -> Outcome<U> {
    if task.faulted() {
        Outcome::Failure(task.error().expect("faulted task always carries an error"))
    } else if task.cancelled() {
        Outcome::Cancelled
    } else {
        Outcome::Success(task.result())
    }
}
