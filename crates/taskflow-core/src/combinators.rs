//! Aggregate combinators: `when_all`, `when_all_result`, `when_any` and
//! `with_delay` (spec.md §4.5, §4.6, §4.7).
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{AggregateError, TaskFailure};
use crate::executor::Executor;
use crate::platform::platform;
use crate::source::TaskSource;
use crate::task::Task;

struct Tally<T> {
    remaining: AtomicUsize,
    results: Mutex<Vec<Option<T>>>,
    errors: Mutex<Vec<TaskFailure>>,
    any_cancelled: AtomicBool,
}

/// Shared counting/classification logic behind `when_all`/`when_all_result`
/// (spec.md §4.5): every input is observed on `Executor::Immediate`, and the
/// aggregate is decided once the last input lands, in priority order
/// (errors, then cancellation, then success). `finish` maps the ordered
/// vector of successes into whatever `when_all`/`when_all_result` actually
/// hands back (`()` or the vector itself).
fn when_all_core<T, O, F>(tasks: Vec<Task<T>>, finish: F) -> Task<O>
where
    T: Clone + Send + 'static,
    O: Clone + Send + 'static,
    F: Fn(Vec<T>) -> O + Send + Sync + 'static,
{
    let count = tasks.len();
    let source = TaskSource::<O>::new();
    let produced = source.task();

    if count == 0 {
        let _ = source.set_result(finish(Vec::new()));
        return produced;
    }

    let tally = Arc::new(Tally {
        remaining: AtomicUsize::new(count),
        results: Mutex::new((0..count).map(|_| None).collect()),
        errors: Mutex::new(Vec::new()),
        any_cancelled: AtomicBool::new(false),
    });
    let finish = Arc::new(finish);

    for (index, task) in tasks.into_iter().enumerate() {
        let tally = tally.clone();
        let source = source.clone();
        let finish = finish.clone();
        let task_for_read = task.clone();
        task.continue_with_on(Executor::Immediate, move |_| {
            if task_for_read.faulted() {
                let error = task_for_read
                    .error()
                    .expect("faulted task always carries an error");
                tally.errors.lock().push(error);
            } else if task_for_read.cancelled() {
                tally.any_cancelled.store(true, Ordering::Release);
            } else {
                tally.results.lock()[index] = Some(task_for_read.result());
            }

            if tally.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                let errors = std::mem::take(&mut *tally.errors.lock());
                if !errors.is_empty() {
                    tracing::debug!(failed = errors.len(), total = count, "when_all aggregate faulted");
                    let _ = source.set_error(TaskFailure::from(AggregateError::new(errors)));
                } else if tally.any_cancelled.load(Ordering::Acquire) {
                    tracing::debug!(total = count, "when_all aggregate cancelled");
                    let _ = source.cancel();
                } else {
                    let values = std::mem::take(&mut *tally.results.lock())
                        .into_iter()
                        .map(|value| value.expect("every input recorded a result"))
                        .collect();
                    let _ = source.set_result(finish(values));
                }
            }
        });
    }

    produced
}

/// Completes once every input has reached a terminal state (spec.md §4.5).
/// Empty input completes immediately with success.
pub fn when_all<T: Clone + Send + 'static>(tasks: Vec<Task<T>>) -> Task<()> {
    when_all_core(tasks, |_| ())
}

/// Like [`when_all`], but succeeds with the per-input results in input order
/// (spec.md §4.5, the `whenAllResult` variant).
pub fn when_all_result<T: Clone + Send + 'static>(tasks: Vec<Task<T>>) -> Task<Vec<T>> {
    when_all_core(tasks, |values| values)
}

/// Completes with whichever input reaches a terminal state first; later
/// completions are ignored (spec.md §4.6). Empty input is a programming
/// error.
pub fn when_any<T: Clone + Send + 'static>(tasks: Vec<Task<T>>) -> Task<Task<T>> {
    assert!(
        !tasks.is_empty(),
        "when_any requires at least one input task"
    );

    let source = TaskSource::<Task<T>>::new();
    let produced = source.task();
    let claimed = Arc::new(AtomicBool::new(false));

    for task in tasks {
        let claimed = claimed.clone();
        let source = source.clone();
        let winner = task.clone();
        task.continue_with_on(Executor::Immediate, move |_| {
            if claimed
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let _ = source.set_result(winner);
            }
        });
    }

    produced
}

/// A task that succeeds with `()` after at least `delay` has elapsed
/// (spec.md §4.7). Never faults or cancels on its own.
pub fn with_delay(delay: Duration) -> Task<()> {
    let source = TaskSource::<()>::new();
    let produced = source.task();
    platform()
        .timer()
        .schedule(delay, Box::new(move || {
            let _ = source.set_result(());
        }));
    produced
}
