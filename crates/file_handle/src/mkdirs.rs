// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::path_utils::ancestor_chain;
use crate::plan::{Plan, Step, StepOutput};
use crate::status::EntityKind;

#[derive(Debug)]
enum Pending {
    /// Probing whether `chain[next]` exists.
    Probe,
    /// Creating `chain[next]`.
    Create,
    /// The leaf already existed; checking that it is a directory.
    VerifyLeaf,
}

/// Creates every missing directory on the way to a path, outermost first.
///
/// Ancestors that already exist are skipped. The leaf is always created; if
/// it turns out to exist already as a directory the plan still succeeds, and
/// if it exists as anything else the plan fails with
/// [`Error::FileAlreadyExists`]. Directories created before a failure are
/// left in place.
#[derive(Debug)]
pub struct MkdirsPlan {
    chain: Vec<PathBuf>,
    next: usize,
    mode: u32,
    pending: Option<Pending>,
}

impl MkdirsPlan {
    pub fn new(path: &std::path::Path, mode: u32) -> Self {
        Self {
            chain: ancestor_chain(path),
            next: 0,
            mode,
            pending: None,
        }
    }

    fn is_leaf(&self) -> bool {
        self.next + 1 == self.chain.len()
    }
}

impl Plan for MkdirsPlan {
    type Output = ();

    fn next_step(&mut self) -> Option<Step> {
        let path = self.chain.get(self.next)?.clone();
        let (pending, step) = match self.pending {
            None if self.is_leaf() => (Pending::Create, Step::Mkdir(path, self.mode)),
            None | Some(Pending::Probe) => (Pending::Probe, Step::Access(path)),
            Some(Pending::Create) => (Pending::Create, Step::Mkdir(path, self.mode)),
            Some(Pending::VerifyLeaf) => (Pending::VerifyLeaf, Step::Stat(path)),
        };
        self.pending = Some(pending);
        Some(step)
    }

    fn advance(&mut self, outcome: Result<StepOutput>) -> Result<()> {
        let pending = self.pending.take();
        match (pending, outcome) {
            (Some(Pending::Probe), Ok(_)) => self.next += 1,
            (Some(Pending::Probe), Err(_)) => self.pending = Some(Pending::Create),
            (Some(Pending::Create), Ok(_)) => self.next += 1,
            (Some(Pending::Create), Err(Error::FileAlreadyExists(_))) if self.is_leaf() => {
                self.pending = Some(Pending::VerifyLeaf);
            }
            (Some(Pending::VerifyLeaf), Ok(StepOutput::Kind(EntityKind::Dir))) => self.next += 1,
            (Some(Pending::VerifyLeaf), Ok(_)) => {
                return Err(Error::FileAlreadyExists(self.chain[self.next].clone()));
            }
            (_, Err(e)) => return Err(e),
            (None, Ok(_)) => {}
        }
        Ok(())
    }

    fn finish(self) {}
}
