// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Composite operations as step-by-step state machines.
//!
//! A [`Plan`] never touches the filesystem itself. It yields one [`Step`] at a
//! time and is told the step's outcome before it is asked for the next one.
//! The same plan is therefore driven by a plain loop on the calling thread
//! ([`drive_blocking`]) or by a future that dispatches and awaits each step
//! ([`drive_async`]), with identical ordering and stop-on-first-error
//! behavior in both cases.

use std::ffi::OsString;
use std::path::PathBuf;

use tracing::{Level, event};

use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::primitives;
use crate::status::EntityKind;

/// A single native operation requested by a plan.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Step {
    /// Check that a path exists.
    Access(PathBuf),
    /// Create one directory with the given mode.
    Mkdir(PathBuf, u32),
    /// Classify a path without following a trailing symbolic link.
    Stat(PathBuf),
    /// List a directory's entry names.
    ReadDir(PathBuf),
    /// Remove a non-directory.
    Unlink(PathBuf),
    /// Remove an empty directory.
    Rmdir(PathBuf),
}

/// The payload of a successful step.
#[derive(Debug)]
pub enum StepOutput {
    /// The step has no payload.
    Done,
    /// Result of [`Step::Stat`].
    Kind(EntityKind),
    /// Result of [`Step::ReadDir`], sorted.
    Entries(Vec<OsString>),
}

/// A composite operation expressed as a sequence of [`Step`]s.
pub trait Plan: Send + 'static {
    /// The composite's payload on success.
    type Output: Send + 'static;

    /// Returns the next step, or `None` when the plan is complete.
    fn next_step(&mut self) -> Option<Step>;

    /// Consumes the outcome of the step last returned by [`next_step`](Plan::next_step).
    ///
    /// Returning an error aborts the plan; no further steps are requested.
    fn advance(&mut self, outcome: Result<StepOutput>) -> Result<()>;

    /// Produces the payload once [`next_step`](Plan::next_step) has returned `None`.
    fn finish(self) -> Self::Output;
}

/// Performs one step on the current thread.
pub fn execute(step: &Step) -> Result<StepOutput> {
    match step {
        Step::Access(path) => primitives::exists(path).map(|()| StepOutput::Done),
        Step::Mkdir(path, mode) => primitives::mkdir(path, *mode).map(|()| StepOutput::Done),
        Step::Stat(path) => primitives::lstat(path).map(|m| StepOutput::Kind(EntityKind::of(&m))),
        Step::ReadDir(path) => primitives::read_dir(path).map(StepOutput::Entries),
        Step::Unlink(path) => primitives::unlink(path).map(|()| StepOutput::Done),
        Step::Rmdir(path) => primitives::rmdir(path).map(|()| StepOutput::Done),
    }
}

/// Runs `plan` to completion on the calling thread.
pub fn drive_blocking<P: Plan>(mut plan: P) -> Result<P::Output> {
    while let Some(step) = plan.next_step() {
        event!(Level::DEBUG, ?step, "composite step");
        let outcome = execute(&step);
        plan.advance(outcome)?;
    }
    Ok(plan.finish())
}

/// Runs `plan` to completion, dispatching each step to the worker pool and
/// waiting for it before requesting the next one.
pub async fn drive_async<P: Plan>(dispatcher: Dispatcher, mut plan: P) -> Result<P::Output> {
    while let Some(step) = plan.next_step() {
        event!(Level::DEBUG, ?step, "composite step");
        let outcome = dispatcher.dispatch(move || execute(&step)).await;
        plan.advance(outcome)?;
    }
    Ok(plan.finish())
}
