// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::ops::BitOr;

/// The accessibility checks requested from
/// [`FileHandle::access`](crate::FileHandle::access).
///
/// The bit values are those of POSIX `access(2)` and are forwarded unchanged.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct AccessMode(i32);

impl AccessMode {
    /// Existence only (`F_OK`).
    pub const EXISTS: Self = Self(0);
    /// Execute or search permission (`X_OK`).
    pub const EXECUTE: Self = Self(1);
    /// Write permission (`W_OK`).
    pub const WRITE: Self = Self(2);
    /// Read permission (`R_OK`).
    pub const READ: Self = Self(4);

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> i32 {
        self.0
    }

    /// Whether every bit of `other` is also set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for AccessMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl Default for AccessMode {
    fn default() -> Self {
        Self::EXISTS
    }
}
