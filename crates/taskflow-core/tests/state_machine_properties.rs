//! Property-based coverage of the task state machine's core invariants
//! (spec.md §8, invariants 1-4 and 6): exactly-once completion, exactly-once
//! continuation invocation regardless of registration order, and the
//! mutual-exclusion of `faulted`/`cancelled`/`result`.
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::prelude::*;
use taskflow_core::{Executor, Task, TaskFailure, TaskSource};

#[derive(Debug, Clone, Copy)]
enum Settlement {
    Success,
    Failure,
    Cancelled,
}

fn settlement_strategy() -> impl Strategy<Value = Settlement> {
    prop_oneof![
        Just(Settlement::Success),
        Just(Settlement::Failure),
        Just(Settlement::Cancelled),
    ]
}

fn apply(source: &TaskSource<i32>, settlement: Settlement) -> Result<(), taskflow_core::AlreadyCompleted> {
    match settlement {
        Settlement::Success => source.set_result(1),
        Settlement::Failure => source.set_error(TaskFailure::from_message("boom")),
        Settlement::Cancelled => source.cancel(),
    }
}

proptest! {
    /// Invariant 1: only the first setter call ever succeeds, regardless of
    /// which settlement "wins" the race.
    #[test]
    fn only_first_setter_succeeds(first in settlement_strategy(), second in settlement_strategy()) {
        let source = TaskSource::<i32>::new();
        prop_assert!(apply(&source, first).is_ok());
        prop_assert!(apply(&source, second).is_err());
    }

    /// Invariant 3: the four observable flags are mutually consistent for
    /// every settlement, both when observed before and after completion.
    #[test]
    fn observable_state_is_consistent(settlement in settlement_strategy(), register_count in 0usize..5) {
        let source = TaskSource::<i32>::new();
        let task = source.task();

        let counters: Vec<_> = (0..register_count)
            .map(|_| Arc::new(AtomicUsize::new(0)))
            .collect();
        for counter in &counters {
            let counter = counter.clone();
            task.continue_with_on(Executor::Immediate, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        apply(&source, settlement).unwrap();

        prop_assert!(task.completed());
        match settlement {
            Settlement::Success => {
                prop_assert!(!task.faulted());
                prop_assert!(!task.cancelled());
                prop_assert_eq!(task.result(), 1);
            }
            Settlement::Failure => {
                prop_assert!(task.faulted());
                prop_assert!(!task.cancelled());
                prop_assert!(task.error().is_some());
            }
            Settlement::Cancelled => {
                prop_assert!(!task.faulted());
                prop_assert!(task.cancelled());
                prop_assert!(task.error().is_none());
            }
        }

        for counter in &counters {
            prop_assert_eq!(counter.load(Ordering::SeqCst), 1);
        }
    }

    /// Invariant 2 / round-trip law: continuations registered strictly after
    /// completion still run exactly once, identically to those registered
    /// before.
    #[test]
    fn late_registration_still_runs_exactly_once(settlement in settlement_strategy()) {
        let source = TaskSource::<i32>::new();
        let task = source.task();
        apply(&source, settlement).unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let counter = counter.clone();
            task.continue_with_on(Executor::Immediate, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        prop_assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    /// Invariant 4: `continue_on_success_with` only invokes its closure when
    /// the antecedent succeeded.
    #[test]
    fn continue_on_success_with_gates_on_success(settlement in settlement_strategy()) {
        let source = TaskSource::<i32>::new();
        let task = source.task();
        apply(&source, settlement).unwrap();

        let invoked = Arc::new(AtomicUsize::new(0));
        let invoked_in_closure = invoked.clone();
        let produced = task.continue_on_success_with_on(Executor::Immediate, move |value| {
            invoked_in_closure.fetch_add(1, Ordering::SeqCst);
            value
        });

        match settlement {
            Settlement::Success => {
                prop_assert_eq!(invoked.load(Ordering::SeqCst), 1);
                prop_assert!(!produced.faulted());
                prop_assert!(!produced.cancelled());
            }
            Settlement::Failure => {
                prop_assert_eq!(invoked.load(Ordering::SeqCst), 0);
                prop_assert!(produced.faulted());
            }
            Settlement::Cancelled => {
                prop_assert_eq!(invoked.load(Ordering::SeqCst), 0);
                prop_assert!(produced.cancelled());
            }
        }
    }
}
