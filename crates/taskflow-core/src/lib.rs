//! Executor-agnostic task composition: single-assignment completion,
//! continuation chaining and aggregate combinators.
//!
//! # Overview
//! A [`Task<T>`] is a read-only handle to the eventual outcome of some
//! computation: `Success(T)`, `Failure` or `Cancelled`. A [`TaskSource<T>`]
//! is the paired write handle that settles a task exactly once. Neither type
//! is itself a future or an executor: where a continuation runs is always
//! named explicitly, via an [`Executor`] passed to a `continue_with*` call
//! (or defaulted to [`Executor::Default`]).
//!
//! # Modules
//! - [`core`] (private): the single-assignment state machine shared by a
//!   `Task`/`TaskSource` pair.
//! - [`executor`]: the [`Executor`] dispatch strategy.
//! - [`platform`]: the host adapter ([`Platform`]) that backs
//!   `Executor::Default`/`Executor::MainThread`/`with_delay`.
//! - [`error`]: [`TaskFailure`], [`AggregateError`], [`AlreadyCompleted`].
//! - [`task`]/[`source`]: the public `Task`/`TaskSource` types.
//! - [`combinators`]: `when_all`, `when_all_result`, `when_any`, `with_delay`.
mod combinators;
mod core;
mod error;
mod executor;
mod platform;
mod source;
mod task;

pub use combinators::{when_all, when_all_result, when_any, with_delay};
pub use error::{AggregateError, AlreadyCompleted, TaskFailure};
pub use executor::{
    Continuation, Executor, ExecutorConfig, OperationQueueDispatch, QueueDispatch, Trampoline,
    executor_config, set_executor_config,
};
pub use platform::{
    BackgroundDispatch, MainThreadDispatch, Platform, StdBackground, StdMainThread, StdPlatform,
    StdTimer, TimerDriver, install_platform,
};
pub use source::TaskSource;
pub use task::Task;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn from_value_is_immediately_successful() {
        let task = Task::from_value(7);
        assert!(task.completed());
        assert!(!task.faulted());
        assert!(!task.cancelled());
        assert_eq!(task.result(), 7);
    }

    #[test]
    fn from_error_is_immediately_faulted() {
        let task = Task::<i32>::from_error(TaskFailure::from_message("boom"));
        assert!(task.faulted());
        assert_eq!(task.error().unwrap().to_string(), "boom");
    }

    #[test]
    fn cancelled_task_is_immediately_cancelled() {
        let task = Task::<i32>::cancelled_task();
        assert!(task.cancelled());
        assert!(!task.faulted());
    }

    #[test]
    fn continue_with_runs_after_completion_and_sees_antecedent() {
        let source = TaskSource::<i32>::new();
        let task = source.task();
        let continued = task.continue_with_on(Executor::Immediate, |t| t.result() + 1);
        source.set_result(41).unwrap();
        assert_eq!(continued.result(), 42);
    }

    #[test]
    fn continue_on_success_with_skips_closure_on_failure() {
        let task = Task::<i32>::from_error(TaskFailure::from_message("nope"));
        let continued = task.continue_on_success_with_on(Executor::Immediate, |value| value + 1);
        assert!(continued.faulted());
        assert_eq!(continued.error().unwrap().to_string(), "nope");
    }

    #[test]
    fn continue_on_success_with_propagates_cancellation() {
        let task = Task::<i32>::cancelled_task();
        let continued = task.continue_on_success_with_on(Executor::Immediate, |value| value + 1);
        assert!(continued.cancelled());
    }

    #[test]
    fn continue_with_task_flattens_inner_task() {
        let task = Task::from_value(1);
        let continued = task.continue_with_task_on(Executor::Immediate, |t| {
            Task::from_value(t.result() * 10)
        });
        assert_eq!(continued.result(), 10);
    }

    #[test]
    fn panicking_continuation_becomes_a_task_failure() {
        let task = Task::from_value(1);
        let continued: Task<i32> =
            task.continue_with_on(Executor::Immediate, |_| panic!("continuation exploded"));
        assert!(continued.faulted());
        assert_eq!(continued.error().unwrap().to_string(), "continuation exploded");
    }

    #[test]
    fn wait_until_completed_blocks_until_a_background_thread_completes_it() {
        let source = TaskSource::<i32>::new();
        let task = source.task();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            source.set_result(99).unwrap();
        });
        task.wait_until_completed();
        assert_eq!(task.result(), 99);
    }

    #[test]
    fn when_all_of_empty_is_immediately_successful() {
        let aggregate = when_all::<i32>(Vec::new());
        assert!(aggregate.completed());
        assert!(!aggregate.faulted());
    }

    #[test]
    fn when_all_result_preserves_input_order() {
        let tasks = vec![Task::from_value(1), Task::from_value(2), Task::from_value(3)];
        let aggregate = when_all_result(tasks);
        assert_eq!(aggregate.result(), vec![1, 2, 3]);
    }

    #[test]
    fn when_all_faults_when_any_input_faults() {
        let tasks = vec![
            Task::from_value(1),
            Task::<i32>::from_error(TaskFailure::from_message("first")),
            Task::<i32>::from_error(TaskFailure::from_message("second")),
        ];
        let aggregate = when_all(tasks);
        assert!(aggregate.faulted());
        let error = aggregate.error().unwrap();
        assert!(error.to_string().contains("2 of the aggregated tasks failed"));
    }

    #[test]
    fn when_all_cancels_when_no_faults_but_one_cancelled() {
        let tasks = vec![Task::from_value(1), Task::<i32>::cancelled_task()];
        let aggregate = when_all(tasks);
        assert!(aggregate.cancelled());
    }

    #[test]
    fn when_any_completes_with_the_first_finisher() {
        let already_done = Task::from_value(1);
        let source = TaskSource::<i32>::new();
        let pending = source.task();
        let aggregate = when_any(vec![pending, already_done.clone()]);
        let winner = aggregate.result();
        assert_eq!(winner.result(), 1);
    }

    #[test]
    #[should_panic(expected = "at least one input")]
    fn when_any_of_empty_is_a_programming_error() {
        let _ = when_any::<i32>(Vec::new());
    }

    #[test]
    fn with_delay_eventually_completes() {
        let delayed = with_delay(Duration::from_millis(5));
        delayed.wait_until_completed();
        assert!(delayed.completed());
        assert!(!delayed.faulted());
    }
}
