// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::pin::Pin;
use core::sync::atomic::{AtomicUsize, Ordering};
use core::task::{Context, Poll};
use core::time::Duration;
use std::fmt;
use std::sync::Arc;

use tracing::{Level, event};

struct DispatcherInner {
    sender: flume::Sender<async_task::Runnable>,
    receiver: flume::Receiver<async_task::Runnable>,
    thread_count: AtomicUsize,
    pending_count: AtomicUsize,
    max_threads: usize,
    idle_timeout: Duration,
}

impl DispatcherInner {
    /// Queues a runnable, counting it as pending until a worker has run it.
    fn enqueue(&self, runnable: async_task::Runnable) {
        let _ = self.pending_count.fetch_add(1, Ordering::Relaxed);
        if self.sender.send(runnable).is_err() {
            let _ = self.pending_count.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

/// A thread pool that executes blocking filesystem calls and drives
/// composite operations on behalf of the non-blocking completions.
///
/// Starts with a single worker thread and scales up to `max_threads`
/// when the pending count exceeds the current thread count. Idle workers
/// scale back down after `idle_timeout`; the last worker stays alive for
/// as long as the dispatcher does.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    /// Creates a new dispatcher with one initial worker thread.
    pub fn new(max_threads: usize, idle_timeout: Duration) -> Self {
        let (sender, receiver) = flume::unbounded();
        let dispatcher = Self {
            inner: Arc::new(DispatcherInner {
                sender,
                receiver,
                thread_count: AtomicUsize::new(0),
                pending_count: AtomicUsize::new(0),
                max_threads: max_threads.max(1),
                idle_timeout,
            }),
        };
        Self::spawn_worker(&dispatcher.inner);
        dispatcher
    }

    /// Dispatches a blocking operation to a worker thread.
    ///
    /// Returns a future that resolves to the operation's return value.
    /// If the closure panics, the panic is forwarded to the awaiting task.
    pub fn dispatch<T: Send + 'static>(&self, f: impl FnOnce() -> T + Send + 'static) -> DispatchFuture<T> {
        self.start(async move { f() })
    }

    /// Starts driving a future on the worker threads.
    ///
    /// The future is detached from the returned handle: it runs to completion
    /// whether the handle is polled, awaited or dropped. A panic inside the
    /// future is forwarded to the awaiting task.
    pub fn start<T: Send + 'static>(&self, fut: impl Future<Output = T> + Send + 'static) -> DispatchFuture<T> {
        let (sender, receiver) = flume::bounded(1);
        let guarded = CatchUnwind(Box::pin(fut));
        self.spawn(async move {
            // The receiver may be gone; the work itself is already done.
            let _ = sender.send(guarded.await);
        });
        DispatchFuture {
            outcome: Box::pin(receiver.into_recv_async()),
        }
    }

    /// Runs a future on the worker threads and detaches it.
    ///
    /// Every wakeup of the future reschedules it on the pool, so a future that
    /// awaits [`dispatch`](Self::dispatch)ed operations makes progress one step
    /// at a time without ever blocking a worker on its own sub-operations.
    pub fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) {
        let (runnable, task) = async_task::spawn(fut, self.schedule());
        task.detach();
        self.scale_up();
        runnable.schedule();
    }

    fn schedule(&self) -> impl Fn(async_task::Runnable) + Send + Sync + 'static {
        let inner = Arc::clone(&self.inner);
        move |runnable| inner.enqueue(runnable)
    }

    /// Adds a worker if the queue is backing up and we haven't hit the limit.
    fn scale_up(&self) {
        let pending = self.inner.pending_count.load(Ordering::Relaxed);
        let threads = self.inner.thread_count.load(Ordering::Acquire);

        if pending >= threads
            && threads < self.inner.max_threads
            && self
                .inner
                .thread_count
                .compare_exchange(threads, threads + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
        {
            Self::spawn_worker_already_counted(&self.inner);
        }
    }

    /// Spawns a worker thread and increments the thread count.
    fn spawn_worker(inner: &Arc<DispatcherInner>) {
        let _ = inner.thread_count.fetch_add(1, Ordering::AcqRel);
        Self::spawn_worker_already_counted(inner);
    }

    /// Spawns a worker thread, assuming the caller already incremented the count.
    ///
    /// If the OS refuses to start a thread, the count is rolled back and the
    /// queued work is picked up by the workers that do exist.
    fn spawn_worker_already_counted(inner: &Arc<DispatcherInner>) {
        let worker_inner = Arc::clone(inner);
        let spawned = std::thread::Builder::new()
            .name("file-handle-worker".into())
            .spawn(move || {
                Self::worker_loop(&worker_inner);
            });

        if let Err(error) = spawned {
            let _ = inner.thread_count.fetch_sub(1, Ordering::AcqRel);
            event!(Level::WARN, %error, "failed to spawn dispatcher worker thread");
        }
    }

    fn worker_loop(inner: &DispatcherInner) {
        loop {
            match inner.receiver.recv_timeout(inner.idle_timeout) {
                Ok(runnable) => {
                    let _ = inner.pending_count.fetch_sub(1, Ordering::Relaxed);
                    // Detached futures have nobody to forward a panic to; keep the worker alive.
                    if std::panic::catch_unwind(core::panic::AssertUnwindSafe(|| runnable.run())).is_err() {
                        event!(Level::WARN, "detached operation panicked");
                    }
                }
                Err(flume::RecvTimeoutError::Timeout) => {
                    // Scale down: CAS ensures at least one worker remains.
                    let mut count = inner.thread_count.load(Ordering::Relaxed);
                    loop {
                        if count <= 1 {
                            break;
                        }
                        match inner
                            .thread_count
                            .compare_exchange_weak(count, count - 1, Ordering::AcqRel, Ordering::Relaxed)
                        {
                            Ok(_) => return,
                            Err(actual) => count = actual,
                        }
                    }
                    // Last worker, keep running.
                }
                Err(flume::RecvTimeoutError::Disconnected) => {
                    let _ = inner.thread_count.fetch_sub(1, Ordering::AcqRel);
                    return;
                }
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("threads", &self.inner.thread_count.load(Ordering::Relaxed))
            .field("pending", &self.inner.pending_count.load(Ordering::Relaxed))
            .field("max_threads", &self.inner.max_threads)
            .finish()
    }
}

/// Converts a panic while polling the inner future into an error value.
struct CatchUnwind<F>(Pin<Box<F>>);

impl<F: Future> Future for CatchUnwind<F> {
    type Output = std::thread::Result<F::Output>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let fut = self.0.as_mut();
        match std::panic::catch_unwind(core::panic::AssertUnwindSafe(|| fut.poll(cx))) {
            Ok(Poll::Ready(value)) => Poll::Ready(Ok(value)),
            Ok(Poll::Pending) => Poll::Pending,
            Err(payload) => Poll::Ready(Err(payload)),
        }
    }
}

/// A future that resolves to the result of a dispatched operation.
///
/// Dropping it does not stop the operation. If the worker thread panics, the
/// panic is re-raised on the awaiting task via [`std::panic::resume_unwind`].
pub struct DispatchFuture<T: 'static> {
    outcome: Pin<Box<flume::r#async::RecvFut<'static, std::thread::Result<T>>>>,
}

impl<T: 'static> Future for DispatchFuture<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        match self.outcome.as_mut().poll(cx) {
            Poll::Ready(Ok(Ok(value))) => Poll::Ready(value),
            Poll::Ready(Ok(Err(payload))) => {
                // Re-raise the panic from the worker thread.
                std::panic::resume_unwind(payload);
            }
            Poll::Ready(Err(flume::RecvError::Disconnected)) => {
                std::panic::resume_unwind(Box::new("dispatched operation was dropped before it completed"));
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T: 'static> fmt::Debug for DispatchFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchFuture").finish_non_exhaustive()
    }
}
