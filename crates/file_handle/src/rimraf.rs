// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::PathBuf;

use crate::error::Result;
use crate::plan::{Plan, Step, StepOutput};
use crate::status::EntityKind;

#[derive(Debug)]
enum Work {
    /// List a directory and queue its entries.
    Enter(PathBuf),
    /// Classify an entry found while listing.
    Inspect(PathBuf),
    /// Remove a non-directory entry.
    Unlink(PathBuf),
    /// Remove a directory whose entries are all gone.
    Rmdir(PathBuf),
}

/// Removes a directory and everything beneath it.
///
/// Pending work lives on an explicit stack rather than the call stack, so
/// neither the depth nor the width of the tree affects native stack usage.
/// Entries are visited one at a time in name order. A directory is removed
/// right after its last entry. Entries are classified without following
/// symbolic links: a link to a directory is unlinked, never descended into.
///
/// The first failure aborts the plan; whatever was removed before it stays
/// removed.
#[derive(Debug)]
pub struct RimrafPlan {
    stack: Vec<Work>,
    current: Option<Work>,
    removed: usize,
}

impl RimrafPlan {
    pub fn new(root: PathBuf) -> Self {
        Self {
            stack: vec![Work::Enter(root)],
            current: None,
            removed: 0,
        }
    }
}

impl Plan for RimrafPlan {
    /// Number of entities removed, the root directory included.
    type Output = usize;

    fn next_step(&mut self) -> Option<Step> {
        let work = self.stack.pop()?;
        let step = match &work {
            Work::Enter(path) => Step::ReadDir(path.clone()),
            Work::Inspect(path) => Step::Stat(path.clone()),
            Work::Unlink(path) => Step::Unlink(path.clone()),
            Work::Rmdir(path) => Step::Rmdir(path.clone()),
        };
        self.current = Some(work);
        Some(step)
    }

    fn advance(&mut self, outcome: Result<StepOutput>) -> Result<()> {
        let output = outcome?;
        match (self.current.take(), output) {
            (Some(Work::Enter(dir)), StepOutput::Entries(names)) => {
                // Children are popped before the directory itself, first name first.
                let children: Vec<Work> = names.iter().rev().map(|name| Work::Inspect(dir.join(name))).collect();
                self.stack.push(Work::Rmdir(dir));
                self.stack.extend(children);
            }
            (Some(Work::Inspect(path)), StepOutput::Kind(EntityKind::Dir)) => self.stack.push(Work::Enter(path)),
            (Some(Work::Inspect(path)), StepOutput::Kind(EntityKind::File)) => self.stack.push(Work::Unlink(path)),
            (Some(Work::Unlink(_) | Work::Rmdir(_)), _) => self.removed += 1,
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> usize {
        self.removed
    }
}
