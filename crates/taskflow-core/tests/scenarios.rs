//! End-to-end scenarios covering the task state machine's invariants and its
//! literal worked examples: an already-resolved task, a faulted task, the
//! interaction between `continueOnSuccessWith` and cancellation, chained
//! `continueWith` stages, the three aggregate outcomes of `when_all`, a race
//! between inputs to `when_any`, and the asynchrony contract of a
//! caller-supplied `Executor::Queue`.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use taskflow_core::{Executor, QueueDispatch, Task, TaskFailure, TaskSource, when_all, when_any};

#[test]
fn immediate_value() {
    let t = Task::from_value("X".to_string());
    assert!(t.completed());
    assert_eq!(t.result(), "X");
    assert!(!t.faulted());
    assert!(!t.cancelled());
}

#[test]
fn error_task() {
    #[derive(Debug, thiserror::Error)]
    #[error("E{code}")]
    struct CodedError {
        code: u32,
    }

    let t = Task::<String>::from_error(TaskFailure::new(CodedError { code: 1 }));
    assert!(t.completed());
    assert!(t.faulted());
    assert!(t.error().unwrap().to_string().contains("E1"));
}

#[test]
fn continuation_on_cancelled_via_continue_on_success_with() {
    let invoked = Arc::new(AtomicBool::new(false));
    let invoked_in_closure = invoked.clone();
    let produced = Task::<i32>::cancelled_task()
        .continue_on_success_with_on(Executor::Immediate, move |value| {
            invoked_in_closure.store(true, Ordering::SeqCst);
            value
        });
    assert!(!invoked.load(Ordering::SeqCst));
    assert!(produced.cancelled());
}

#[test]
fn chained_fives() {
    let counter = Arc::new(AtomicUsize::new(0));
    let observed = Arc::new(std::sync::Mutex::new(Vec::new()));

    let mut stage = Task::<()>::cancelled_task().continue_with_on(Executor::Immediate, {
        let counter = counter.clone();
        let observed = observed.clone();
        move |_antecedent| {
            let value = counter.fetch_add(1, Ordering::SeqCst) + 1;
            observed.lock().unwrap().push(value);
            value
        }
    });

    for _ in 0..4 {
        stage = stage.continue_with_on(Executor::Immediate, {
            let counter = counter.clone();
            let observed = observed.clone();
            move |_antecedent| {
                let value = counter.fetch_add(1, Ordering::SeqCst) + 1;
                observed.lock().unwrap().push(value);
                value
            }
        });
    }

    stage.wait_until_completed();
    assert_eq!(counter.load(Ordering::SeqCst), 5);
    assert_eq!(*observed.lock().unwrap(), vec![1, 2, 3, 4, 5]);
}

#[test]
fn when_all_mixed_failures() {
    #[derive(Debug, thiserror::Error)]
    #[error("E{code}")]
    struct CodedError {
        code: u32,
    }

    let tasks: Vec<Task<u32>> = (1..=20u32)
        .map(|code| {
            Task::execute_with_task(Executor::Default, move || {
                std::thread::sleep(Duration::from_millis(5));
                Task::from_error(TaskFailure::new(CodedError { code }))
            })
        })
        .collect();

    let aggregate = when_all(tasks);
    assert!(aggregate.faulted());
    let error = aggregate.error().unwrap();
    assert!(error.to_string().contains("20 of the aggregated tasks failed"));
}

#[test]
fn when_all_with_one_cancel() {
    let mut tasks: Vec<Task<u32>> = (1..20u32).map(Task::from_value).collect();
    tasks.push(Task::cancelled_task());

    let aggregate = when_all(tasks);
    assert!(aggregate.cancelled());
    assert!(!aggregate.faulted());
}

#[test]
fn when_any_with_fast_first() {
    let continuation_runs = Arc::new(AtomicUsize::new(0));

    let fast = Task::execute(Executor::Default, || {
        std::thread::sleep(Duration::from_millis(20));
        1_000i32
    });

    let mut inputs = vec![fast];
    for index in 0..20u32 {
        let continuation_runs = continuation_runs.clone();
        let slow = Task::execute(Executor::Default, move || {
            std::thread::sleep(Duration::from_millis(200));
            index
        });
        inputs.push(slow.continue_with_on(Executor::Immediate, move |t| {
            continuation_runs.fetch_add(1, Ordering::SeqCst);
            t.result()
        }));
    }

    let aggregate = when_any(inputs);
    aggregate.wait_until_completed();
    assert!(continuation_runs.load(Ordering::SeqCst) < 20);
}

#[test]
fn executor_queue_asynchrony() {
    struct ImmediateChannelQueue {
        sender: std::sync::mpsc::Sender<taskflow_core::Continuation>,
    }

    impl QueueDispatch for ImmediateChannelQueue {
        fn dispatch(&self, job: taskflow_core::Continuation) {
            let _ = self.sender.send(job);
        }
    }

    let (sender, receiver) = std::sync::mpsc::channel();
    let queue = Executor::queue(ImmediateChannelQueue { sender });

    let finished = Arc::new(AtomicBool::new(false));
    let source = TaskSource::<()>::new();
    let task = source.task();

    let finished_in_job = finished.clone();
    task.continue_with_on(queue, move |_| {
        finished_in_job.store(true, Ordering::SeqCst);
    });
    source.set_result(()).unwrap();

    assert!(!finished.load(Ordering::SeqCst));

    let job = receiver.recv().expect("queue received exactly one job");
    job();
    assert!(finished.load(Ordering::SeqCst));
}
