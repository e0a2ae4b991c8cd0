//! The `Executor` strategy type (spec.md §3, §4.1).
//!
//! # Design background (Why)
//! - Every continuation attached to a `Task` names the executor it should
//!   run on; the state machine itself never decides *where* code runs, only
//!   *that* it runs exactly once. Keeping this as a value-like enum (rather
//!   than a trait object everywhere) lets `Immediate`/`Default`/`MainThread`
//!   stay allocation-free while still letting callers plug in arbitrary
//!   queues via `Queue`/`OperationQueue`/`Closure`.
use std::borrow::Cow;
use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::platform::platform;

/// A unit of work scheduled onto an [`Executor`]. Continuations close over
/// whatever state they need (typically a cloned [`crate::Task`] handle), so
/// the executor never needs to thread an argument through.
pub type Continuation = Box<dyn FnOnce() + Send + 'static>;

/// Default bound on the `Default` executor's synchronous recursion depth
/// (spec.md §4.1: "e.g. 20").
const DEFAULT_MAX_SYNCHRONOUS_DEPTH: u32 = 20;

/// Default worker count for `StdPlatform`'s background dispatcher.
const DEFAULT_BACKGROUND_POOL_SIZE: usize = 4;

static MAX_SYNCHRONOUS_DEPTH: AtomicU32 = AtomicU32::new(DEFAULT_MAX_SYNCHRONOUS_DEPTH);
static BACKGROUND_POOL_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_BACKGROUND_POOL_SIZE);

/// Runtime knobs for `Executor::Default` and `StdPlatform`'s background
/// dispatcher: the synchronous recursion depth bound (spec.md §4.1) and the
/// background worker pool size. A plain, validated settings struct in the
/// style of the teacher's `TimeoutSettings` — not a dynamic configuration
/// service, since this library has no hot-reloadable runtime config.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecutorConfig {
    max_synchronous_depth: u32,
    background_pool_size: usize,
}

impl ExecutorConfig {
    /// Builds a config from explicit values, clamping both to their minimum
    /// of `1` so a misconfigured host cannot wedge dispatch entirely.
    pub const fn new(max_synchronous_depth: u32, background_pool_size: usize) -> Self {
        Self {
            max_synchronous_depth: if max_synchronous_depth == 0 {
                1
            } else {
                max_synchronous_depth
            },
            background_pool_size: if background_pool_size == 0 {
                1
            } else {
                background_pool_size
            },
        }
    }

    /// The recursion bound `Executor::Default` runs inline before falling
    /// back to the background pool.
    pub const fn max_synchronous_depth(&self) -> u32 {
        self.max_synchronous_depth
    }

    /// The number of worker threads `StdPlatform`'s background dispatcher
    /// starts with.
    pub const fn background_pool_size(&self) -> usize {
        self.background_pool_size
    }

    /// Builder-style override of [`ExecutorConfig::max_synchronous_depth`].
    pub const fn with_max_synchronous_depth(mut self, depth: u32) -> Self {
        self.max_synchronous_depth = if depth == 0 { 1 } else { depth };
        self
    }

    /// Builder-style override of [`ExecutorConfig::background_pool_size`].
    pub const fn with_background_pool_size(mut self, size: usize) -> Self {
        self.background_pool_size = if size == 0 { 1 } else { size };
        self
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SYNCHRONOUS_DEPTH, DEFAULT_BACKGROUND_POOL_SIZE)
    }
}

/// Overrides the process-wide executor configuration. Intended to be called
/// once, during host startup: `max_synchronous_depth` takes effect for every
/// `Executor::Default` dispatch from that point on, but
/// `background_pool_size` only takes effect if it runs before the default
/// `StdPlatform` is lazily installed (i.e. before the first task is
/// scheduled on `Executor::Default`/`Executor::MainThread`, or before
/// `with_delay` is first used).
pub fn set_executor_config(config: ExecutorConfig) {
    MAX_SYNCHRONOUS_DEPTH.store(config.max_synchronous_depth, Ordering::Relaxed);
    BACKGROUND_POOL_SIZE.store(config.background_pool_size, Ordering::Relaxed);
}

/// The executor configuration currently in effect.
pub fn executor_config() -> ExecutorConfig {
    ExecutorConfig::new(
        MAX_SYNCHRONOUS_DEPTH.load(Ordering::Relaxed),
        BACKGROUND_POOL_SIZE.load(Ordering::Relaxed),
    )
}

thread_local! {
    static SYNCHRONOUS_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// A caller-supplied handle for asynchronous, ordered dispatch (spec.md §3:
/// `Queue(handle)`).
///
/// Implementations must arrange for `execute` to return before `job` runs
/// (spec.md §4.1, §8 invariant 8); the state machine only requires that
/// `dispatch` schedule the job exactly once.
pub trait QueueDispatch: Send + Sync {
    /// Schedules `job` for asynchronous execution.
    fn dispatch(&self, job: Continuation);

    /// Human-readable label used by [`Executor::description`].
    fn label(&self) -> &str {
        "queue"
    }
}

/// A caller-supplied handle for operation-queue-style dispatch (spec.md §3:
/// `OperationQueue(handle)`).
pub trait OperationQueueDispatch: Send + Sync {
    /// Wraps `job` as an operation and enqueues it.
    fn enqueue(&self, job: Continuation);

    /// Human-readable label used by [`Executor::description`].
    fn label(&self) -> &str {
        "operation-queue"
    }
}

/// A caller-supplied trampoline (spec.md §3: `Closure(trampoline)`). The
/// trampoline decides entirely how and when `job` runs.
#[derive(Clone)]
pub struct Trampoline {
    label: Cow<'static, str>,
    run: Arc<dyn Fn(Continuation) + Send + Sync>,
}

impl Trampoline {
    /// Builds a trampoline from a labelled dispatch function.
    pub fn new(
        label: impl Into<Cow<'static, str>>,
        run: impl Fn(Continuation) + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            run: Arc::new(run),
        }
    }
}

/// Dispatch strategy attached to a continuation (spec.md §3, §4.1).
#[derive(Clone)]
pub enum Executor {
    /// Runs inline, synchronously, on the calling context. `execute` returns
    /// only after the closure has returned.
    Immediate,
    /// Runs inline while the per-thread recursion counter is below
    /// [`ExecutorConfig::max_synchronous_depth`]'s bound, otherwise falls
    /// back to the background dispatcher.
    Default,
    /// Runs inline if already on the main thread, otherwise schedules
    /// asynchronously onto it.
    MainThread,
    /// Asynchronous dispatch onto a caller-supplied serial/concurrent queue.
    Queue(Arc<dyn QueueDispatch>),
    /// Enqueues as an operation onto a caller-supplied operation queue.
    OperationQueue(Arc<dyn OperationQueueDispatch>),
    /// Delegates entirely to a caller-supplied trampoline.
    Closure(Trampoline),
}

impl Executor {
    /// Builds a [`Executor::Queue`] from any [`QueueDispatch`] implementation.
    pub fn queue(handle: impl QueueDispatch + 'static) -> Self {
        Executor::Queue(Arc::new(handle))
    }

    /// Builds a [`Executor::OperationQueue`] from any
    /// [`OperationQueueDispatch`] implementation.
    pub fn operation_queue(handle: impl OperationQueueDispatch + 'static) -> Self {
        Executor::OperationQueue(Arc::new(handle))
    }

    /// Arranges for `job` to be invoked exactly once, per this executor's
    /// semantics (spec.md §4.1).
    pub fn execute(&self, job: Continuation) {
        match self {
            Executor::Immediate => {
                tracing::trace!(executor = "immediate", "running continuation inline");
                job();
            }
            Executor::Default => self.execute_default(job),
            Executor::MainThread => {
                let platform = platform();
                if platform.main_thread().is_on_main_thread() {
                    tracing::trace!(executor = "main_thread", "already on main thread, running inline");
                    job();
                } else {
                    tracing::trace!(executor = "main_thread", "dispatching onto main thread");
                    platform.main_thread().dispatch(job);
                }
            }
            Executor::Queue(handle) => {
                tracing::trace!(executor = "queue", label = handle.label(), "dispatching onto queue");
                handle.dispatch(job);
            }
            Executor::OperationQueue(handle) => {
                tracing::trace!(
                    executor = "operation_queue",
                    label = handle.label(),
                    "enqueueing operation"
                );
                handle.enqueue(job);
            }
            Executor::Closure(trampoline) => {
                tracing::trace!(executor = "closure", label = %trampoline.label, "delegating to trampoline");
                (trampoline.run)(job);
            }
        }
    }

    fn execute_default(&self, job: Continuation) {
        let bound = MAX_SYNCHRONOUS_DEPTH.load(Ordering::Relaxed);
        let should_run_inline = SYNCHRONOUS_DEPTH.with(|depth| {
            if depth.get() < bound {
                depth.set(depth.get() + 1);
                true
            } else {
                false
            }
        });
        if should_run_inline {
            struct DepthGuard;
            impl Drop for DepthGuard {
                fn drop(&mut self) {
                    SYNCHRONOUS_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
                }
            }
            let _guard = DepthGuard;
            tracing::trace!(executor = "default", inline = true, "running continuation inline");
            job();
        } else {
            tracing::trace!(
                executor = "default",
                inline = false,
                "recursion bound reached, falling back to background pool"
            );
            platform().background().dispatch(job);
        }
    }

    /// Human-readable description, never empty (spec.md §3).
    pub fn description(&self) -> Cow<'static, str> {
        match self {
            Executor::Immediate => Cow::Borrowed("Immediate"),
            Executor::Default => Cow::Borrowed("Default"),
            Executor::MainThread => Cow::Borrowed("MainThread"),
            Executor::Queue(handle) => Cow::Owned(format!("Queue({})", handle.label())),
            Executor::OperationQueue(handle) => {
                Cow::Owned(format!("OperationQueue({})", handle.label()))
            }
            Executor::Closure(trampoline) => Cow::Owned(format!("Closure({})", trampoline.label)),
        }
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Executor::{}", self.description())
    }
}
