// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Completion strategies.
//!
//! Every operation on a [`FileHandle`](crate::FileHandle) is implemented once,
//! as a blocking closure or as a step-by-step [`Plan`], and handed to a
//! completion strategy that decides where it runs and how the outcome is
//! delivered:
//!
//! | Strategy | Runs on | Delivers | Method returns |
//! |----------|---------|----------|----------------|
//! | [`Blocking`] | calling thread | return value | `Result<T>` |
//! | [`BlockingCallback`] | calling thread | callback, before returning | `()` |
//! | [`Async`] | worker pool | future | [`Pending<T>`] |
//! | [`Callback`] | worker pool | callback, on a worker thread | `()` |
//!
//! A non-blocking callback is never invoked on the calling thread. It may run
//! on a worker while the dispatching method is still returning, so it must
//! not rely on anything the caller does after the call.
//!
//! Nothing is cancelled once dispatched: every non-blocking operation runs to
//! completion or failure whether or not anyone observes the outcome.

use core::pin::Pin;
use core::task::{Context, Poll};
use std::fmt;

use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::plan::{self, Plan};

mod sealed {
    pub trait Sealed {}
}

/// A strategy for executing an operation and delivering its outcome.
///
/// This trait is sealed; the strategies are [`Blocking`], [`Async`],
/// [`Callback`] and [`BlockingCallback`].
pub trait Completion<T: Send + 'static>: sealed::Sealed {
    /// What the operation method returns under this strategy.
    type Output;

    #[doc(hidden)]
    fn run<F>(self, dispatcher: &Dispatcher, op: F) -> Self::Output
    where
        F: FnOnce() -> Result<T> + Send + 'static;

    #[doc(hidden)]
    fn drive<P>(self, dispatcher: &Dispatcher, plan: P) -> Self::Output
    where
        P: Plan<Output = T>;
}

/// Runs the operation on the calling thread and returns its result.
#[derive(Clone, Copy, Debug, Default)]
pub struct Blocking;

impl sealed::Sealed for Blocking {}

impl<T: Send + 'static> Completion<T> for Blocking {
    type Output = Result<T>;

    fn run<F>(self, _dispatcher: &Dispatcher, op: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        op()
    }

    fn drive<P>(self, _dispatcher: &Dispatcher, plan: P) -> Result<T>
    where
        P: Plan<Output = T>,
    {
        plan::drive_blocking(plan)
    }
}

/// Dispatches the operation to the worker pool and returns a future.
///
/// The operation is queued before the method returns and proceeds whether or
/// not the [`Pending`] future is polled. Dropping the future only discards the
/// outcome; the operation, and every remaining step of a composite, still
/// runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct Async;

impl sealed::Sealed for Async {}

impl<T: Send + 'static> Completion<T> for Async {
    type Output = Pending<T>;

    fn run<F>(self, dispatcher: &Dispatcher, op: F) -> Pending<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        Pending::new(dispatcher.dispatch(op))
    }

    fn drive<P>(self, dispatcher: &Dispatcher, plan: P) -> Pending<T>
    where
        P: Plan<Output = T>,
    {
        Pending::new(dispatcher.start(plan::drive_async(dispatcher.clone(), plan)))
    }
}

/// Dispatches the operation to the worker pool and hands the outcome to a
/// callback on a worker thread.
///
/// The callback fires exactly once, never on the calling thread, and possibly
/// before the dispatching method has returned. Composite operations run one
/// step at a time; the callback fires after the last step or the first
/// failing one.
pub struct Callback<F>(pub F);

impl<F> Callback<F> {
    /// Wraps `f`.
    ///
    /// Prefer this over the tuple constructor when passing a closure: it lets
    /// the compiler infer the closure's parameter type.
    pub const fn new<T>(f: F) -> Self
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        Self(f)
    }
}

impl<F> sealed::Sealed for Callback<F> {}

impl<T, F> Completion<T> for Callback<F>
where
    T: Send + 'static,
    F: FnOnce(Result<T>) + Send + 'static,
{
    type Output = ();

    fn run<O>(self, dispatcher: &Dispatcher, op: O)
    where
        O: FnOnce() -> Result<T> + Send + 'static,
    {
        let callback = self.0;
        dispatcher.spawn(async move { callback(op()) });
    }

    fn drive<P>(self, dispatcher: &Dispatcher, plan: P)
    where
        P: Plan<Output = T>,
    {
        let callback = self.0;
        let steps = plan::drive_async(dispatcher.clone(), plan);
        dispatcher.spawn(async move { callback(steps.await) });
    }
}

impl<F> fmt::Debug for Callback<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").finish_non_exhaustive()
    }
}

/// Runs the operation on the calling thread, then hands the outcome to a
/// callback before returning.
pub struct BlockingCallback<F>(pub F);

impl<F> BlockingCallback<F> {
    /// Wraps `f`. See [`Callback::new`].
    pub const fn new<T>(f: F) -> Self
    where
        F: FnOnce(Result<T>),
    {
        Self(f)
    }
}

impl<F> sealed::Sealed for BlockingCallback<F> {}

impl<T, F> Completion<T> for BlockingCallback<F>
where
    T: Send + 'static,
    F: FnOnce(Result<T>),
{
    type Output = ();

    fn run<O>(self, _dispatcher: &Dispatcher, op: O)
    where
        O: FnOnce() -> Result<T> + Send + 'static,
    {
        (self.0)(op());
    }

    fn drive<P>(self, _dispatcher: &Dispatcher, plan: P)
    where
        P: Plan<Output = T>,
    {
        (self.0)(plan::drive_blocking(plan));
    }
}

impl<F> fmt::Debug for BlockingCallback<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingCallback").finish_non_exhaustive()
    }
}

/// The future returned by operations run with [`Async`].
#[must_use = "the operation runs regardless; await the future to observe its outcome"]
pub struct Pending<T> {
    fut: Pin<Box<dyn Future<Output = Result<T>> + Send>>,
}

impl<T> Pending<T> {
    fn new(fut: impl Future<Output = Result<T>> + Send + 'static) -> Self {
        Self { fut: Box::pin(fut) }
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<T>> {
        self.fut.as_mut().poll(cx)
    }
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending").finish_non_exhaustive()
    }
}
