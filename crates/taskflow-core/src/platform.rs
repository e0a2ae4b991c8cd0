//! The platform adapter (spec.md §6): the narrow set of host primitives the
//! library needs in order to give `Executor::MainThread`, `Executor::Default`
//! and `with_delay` somewhere to actually run.
//!
//! # Design background (Why)
//! - spec.md treats `mainThreadDispatch`, `backgroundDispatch`,
//!   `queueDispatch`, `operationQueueEnqueue` and `scheduleTimer` as external
//!   collaborators the host supplies. Since this workspace has no separate
//!   out-of-tree host, [`StdPlatform`] below is the default, `std`-only
//!   implementation; [`crate::Executor::Queue`]/[`crate::Executor::OperationQueue`]
//!   bypass the platform entirely since their handles are supplied per call
//!   site, and a runtime-specific platform (e.g. the `taskflow-tokio` adapter
//!   crate) can be installed instead via [`install_platform`].
use std::sync::{Arc, Mutex, OnceLock, mpsc};
use std::thread::{self, ThreadId};
use std::time::Duration;

use crate::executor::Continuation;

/// Dispatch onto the host's main thread / UI runloop.
pub trait MainThreadDispatch: Send + Sync {
    /// Schedules `job` to run on the main thread.
    fn dispatch(&self, job: Continuation);
    /// True when the calling thread *is* the main thread.
    fn is_on_main_thread(&self) -> bool;
}

/// Dispatch onto the host's background pool.
pub trait BackgroundDispatch: Send + Sync {
    /// Schedules `job` for asynchronous, off-thread execution.
    fn dispatch(&self, job: Continuation);
}

/// Drives `with_delay`'s timer.
pub trait TimerDriver: Send + Sync {
    /// Invokes `job` after at least `delay` has elapsed.
    fn schedule(&self, delay: Duration, job: Continuation);
}

/// Aggregates the three host capabilities the core crate needs.
pub trait Platform: Send + Sync + 'static {
    /// The main-thread dispatcher.
    fn main_thread(&self) -> &dyn MainThreadDispatch;
    /// The background-pool dispatcher.
    fn background(&self) -> &dyn BackgroundDispatch;
    /// The delay timer.
    fn timer(&self) -> &dyn TimerDriver;
}

/// A minimal main-thread dispatcher built on a channel and a manual pump.
///
/// There is no portable, `std`-only way to force a closure to run on an
/// arbitrary OS thread without that thread cooperating, so `StdMainThread`
/// treats whichever thread first touches the default platform as "the main
/// thread" and queues work for it; the host is expected to drain the queue
/// periodically by calling [`StdMainThread::run_until_idle`] (directly, or
/// via [`StdPlatform::run_main_thread_until_idle`]) from that thread — the
/// same contract a GUI toolkit's runloop fulfills implicitly.
pub struct StdMainThread {
    id: ThreadId,
    sender: mpsc::Sender<Continuation>,
    receiver: Mutex<mpsc::Receiver<Continuation>>,
}

impl StdMainThread {
    /// Captures the calling thread as the main thread.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            id: thread::current().id(),
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    /// Runs every job currently queued, without blocking for more.
    pub fn run_until_idle(&self) {
        let receiver = self.receiver.lock().unwrap_or_else(|poison| poison.into_inner());
        while let Ok(job) = receiver.try_recv() {
            job();
        }
    }
}

impl Default for StdMainThread {
    fn default() -> Self {
        Self::new()
    }
}

impl MainThreadDispatch for StdMainThread {
    fn dispatch(&self, job: Continuation) {
        tracing::trace!("queueing job for main thread pump");
        // The receiver is only ever dropped along with `self`, so a closed
        // channel here would mean the platform itself is gone.
        let _ = self.sender.send(job);
    }

    fn is_on_main_thread(&self) -> bool {
        thread::current().id() == self.id
    }
}

/// A fixed-size pool of worker threads sharing one job queue, sized from
/// [`crate::ExecutorConfig::background_pool_size`] at construction time.
pub struct StdBackground {
    sender: mpsc::Sender<Continuation>,
}

impl StdBackground {
    /// Starts `worker_count` worker threads (clamped to at least 1) pulling
    /// from a shared channel.
    pub fn new(worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (sender, receiver) = mpsc::channel::<Continuation>();
        let receiver = Arc::new(Mutex::new(receiver));
        for index in 0..worker_count {
            let receiver = receiver.clone();
            thread::Builder::new()
                .name(format!("taskflow-background-{index}"))
                .spawn(move || {
                    loop {
                        let job = {
                            let receiver =
                                receiver.lock().unwrap_or_else(|poison| poison.into_inner());
                            receiver.recv()
                        };
                        match job {
                            Ok(job) => job(),
                            Err(_) => break,
                        }
                    }
                })
                .expect("failed to spawn taskflow background worker");
        }
        Self { sender }
    }
}

impl Default for StdBackground {
    fn default() -> Self {
        Self::new(crate::executor::executor_config().background_pool_size())
    }
}

impl BackgroundDispatch for StdBackground {
    fn dispatch(&self, job: Continuation) {
        tracing::trace!("dispatching job onto background worker pool");
        // The receivers only ever stop along with the pool itself, so a
        // closed channel here would mean the platform is already gone.
        let _ = self.sender.send(job);
    }
}

/// Schedules timers with a dedicated sleeping thread per timer.
#[derive(Default)]
pub struct StdTimer;

impl TimerDriver for StdTimer {
    fn schedule(&self, delay: Duration, job: Continuation) {
        tracing::trace!(delay_ms = delay.as_millis() as u64, "scheduling timer");
        thread::Builder::new()
            .name("taskflow-timer".into())
            .spawn(move || {
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                job();
            })
            .expect("failed to spawn taskflow timer thread");
    }
}

/// The default, `std`-only platform: one [`StdMainThread`] pump, a
/// [`crate::ExecutorConfig::background_pool_size`]-sized background worker pool,
/// and a thread-per-timer delay driver.
pub struct StdPlatform {
    main_thread: StdMainThread,
    background: StdBackground,
    timer: StdTimer,
}

impl StdPlatform {
    /// Builds a new platform, capturing the calling thread as the main
    /// thread.
    pub fn new() -> Self {
        Self {
            main_thread: StdMainThread::new(),
            background: StdBackground::default(),
            timer: StdTimer,
        }
    }

    /// Drains any work currently queued for the main thread. Must be called
    /// from the thread that constructed this platform.
    pub fn run_main_thread_until_idle(&self) {
        self.main_thread.run_until_idle();
    }
}

impl Default for StdPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for StdPlatform {
    fn main_thread(&self) -> &dyn MainThreadDispatch {
        &self.main_thread
    }

    fn background(&self) -> &dyn BackgroundDispatch {
        &self.background
    }

    fn timer(&self) -> &dyn TimerDriver {
        &self.timer
    }
}

static PLATFORM: OnceLock<Arc<dyn Platform>> = OnceLock::new();

/// Installs a host-supplied platform. Must be called before the first task
/// is ever scheduled on `Executor::Default`/`Executor::MainThread` or before
/// `with_delay` is first used — once the default [`StdPlatform`] has been
/// lazily installed, later calls are rejected and the platform already in
/// place (the caller's `Arc`, returned as `Err`) keeps running.
pub fn install_platform(platform: Arc<dyn Platform>) -> Result<(), Arc<dyn Platform>> {
    PLATFORM.set(platform)
}

pub(crate) fn platform() -> &'static Arc<dyn Platform> {
    PLATFORM.get_or_init(|| Arc::new(StdPlatform::new()))
}
