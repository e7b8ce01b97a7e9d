// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fs::Metadata;

use crate::error::Result;

/// The binary outcome of an operation.
///
/// A [`Result`](crate::Result) already carries this information; `Status` exists
/// for callers that need the numeric sentinel, e.g. when forwarding outcomes
/// across a boundary that only understands integers.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u8)]
pub enum Status {
    /// The operation failed.
    Error = 0,
    /// The operation succeeded.
    Success = 1,
}

impl Status {
    /// Returns the status matching the given result.
    #[must_use]
    pub const fn of<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(_) => Self::Error,
        }
    }

    /// Returns `true` for [`Status::Success`].
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Selects which native call a dual-purpose primitive performs.
///
/// Used by [`FileHandle::remove`](crate::FileHandle::remove) and
/// [`FileHandle::read_contents`](crate::FileHandle::read_contents).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u8)]
pub enum EntityKind {
    /// A plain file (or anything that is not a directory).
    File = 3,
    /// A directory.
    Dir = 4,
}

impl EntityKind {
    /// Classifies metadata. Symbolic links and special files count as [`EntityKind::File`].
    #[must_use]
    pub fn of(metadata: &Metadata) -> Self {
        if metadata.is_dir() { Self::Dir } else { Self::File }
    }
}
