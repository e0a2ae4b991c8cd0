//! A [`taskflow_core::Platform`] backed by a Tokio runtime handle.
//!
//! # Design background (Why)
//! `taskflow-core` stays runtime-agnostic (its `StdPlatform` default uses
//! bare OS threads); hosts already running Tokio should not pay for a second
//! thread pool just to satisfy `Executor::Default`'s background fallback or
//! `with_delay`'s timer. This crate is the thin seam that lets such a host
//! install a [`TokioPlatform`] once, at startup, via
//! [`taskflow_core::install_platform`].
//!
//! Tokio has no notion of "the main thread" the way a GUI toolkit does, so
//! [`TokioPlatform::main_thread`] treats the thread that constructed it as
//! the main thread and otherwise posts work onto the runtime handle, same
//! trade-off `StdMainThread` documents for the default platform.
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use taskflow_core::{BackgroundDispatch, Continuation, MainThreadDispatch, Platform, TimerDriver};
use tokio::runtime::Handle;

/// Dispatches onto a captured [`Handle`] via `spawn_blocking`, since
/// continuations are plain `FnOnce() + Send` closures rather than futures.
pub struct TokioBackground {
    handle: Handle,
}

impl TokioBackground {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl BackgroundDispatch for TokioBackground {
    fn dispatch(&self, job: Continuation) {
        tracing::trace!(executor = "tokio_background", "dispatching job via spawn_blocking");
        self.handle.spawn_blocking(job);
    }
}

/// Treats the thread that built this platform as "the main thread"; other
/// threads have their work posted onto the runtime via `spawn_blocking`
/// instead of queued for a manual pump, since a Tokio host is expected to
/// always have its runtime driving forward progress.
pub struct TokioMainThread {
    id: ThreadId,
    handle: Handle,
}

impl TokioMainThread {
    pub fn new(handle: Handle) -> Self {
        Self {
            id: thread::current().id(),
            handle,
        }
    }
}

impl MainThreadDispatch for TokioMainThread {
    fn dispatch(&self, job: Continuation) {
        tracing::trace!(executor = "tokio_main_thread", "dispatching job via spawn_blocking");
        self.handle.spawn_blocking(job);
    }

    fn is_on_main_thread(&self) -> bool {
        thread::current().id() == self.id
    }
}

/// Schedules delayed work with `tokio::time::sleep` on the captured runtime.
pub struct TokioTimer {
    handle: Handle,
}

impl TokioTimer {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl TimerDriver for TokioTimer {
    fn schedule(&self, delay: Duration, job: Continuation) {
        tracing::trace!(delay_ms = delay.as_millis() as u64, "scheduling tokio timer");
        self.handle.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            // `job` is a blocking closure; hand it to a blocking thread
            // rather than running it inline on the async worker.
            let _ = tokio::task::spawn_blocking(job).await;
        });
    }
}

/// The Tokio-backed [`Platform`] implementation.
pub struct TokioPlatform {
    main_thread: TokioMainThread,
    background: TokioBackground,
    timer: TokioTimer,
}

impl TokioPlatform {
    /// Captures the given runtime handle (and the calling thread, as "the
    /// main thread") into a new platform.
    pub fn new(handle: Handle) -> Self {
        Self {
            main_thread: TokioMainThread::new(handle.clone()),
            background: TokioBackground::new(handle.clone()),
            timer: TokioTimer::new(handle),
        }
    }

    /// Convenience constructor capturing `Handle::current()`. Panics outside
    /// a Tokio runtime context, matching `Handle::current`'s own contract.
    pub fn from_current() -> Self {
        Self::new(Handle::current())
    }
}

impl Platform for TokioPlatform {
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

/// Installs a [`TokioPlatform`] built from `handle` as the process-wide
/// platform. Returns the platform already installed (if any) when called
/// more than once, same contract as [`taskflow_core::install_platform`].
pub fn install(handle: Handle) -> Result<(), Arc<dyn Platform>> {
    taskflow_core::install_platform(Arc::new(TokioPlatform::new(handle)))
}
