// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Any failure reported by a [`FileHandle`](crate::FileHandle) operation or a
/// [`BufferedInputStream`](crate::BufferedInputStream).
///
/// Every variant maps to exactly one [`ErrorKind`]. Logical-state violations
/// (closing a descriptor that is not open, reading past a destination buffer)
/// are detected before any native call is attempted. Native failures are
/// translated once, at the primitive boundary, and otherwise carried verbatim
/// in [`Error::Native`].
///
/// # Thread safety
///
/// This type is thread-safe.
#[derive(Debug, Error)]
pub enum Error {
    /// A required argument was absent, or the source of a move or copy does not exist.
    #[error("source not found: {0}")]
    SourceNotFound(String),

    /// The path does not denote an existing entity where one was required.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// An exclusive create found the path already occupied.
    #[error("file already exists: {}", .0.display())]
    FileAlreadyExists(PathBuf),

    /// The path exists but is not a plain file.
    #[error("not a file: {}", .0.display())]
    NotAFile(PathBuf),

    /// The path exists but is not a directory.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// The buffered input stream has been closed.
    #[error("stream closed")]
    StreamClosed,

    /// A read window does not fit inside the destination buffer.
    #[error("index out of bounds: offset {offset} + length {length} exceeds capacity {capacity}")]
    IndexOutOfBounds {
        /// Start of the requested window in the destination.
        offset: usize,
        /// Length of the requested window.
        length: usize,
        /// Capacity of the destination.
        capacity: usize,
    },

    /// A descriptor-based operation was attempted on a handle with nothing open.
    #[error("file descriptor not found: {}", .0.display())]
    FileDescriptorNotFound(PathBuf),

    /// The target of a stat call does not exist.
    #[error("stat target not found: {}", .0.display())]
    StatTargetNotFound(PathBuf),

    /// A temporary directory was requested without a name prefix.
    #[error("prefix not found: a temporary directory needs a non-empty name prefix")]
    PrefixNotFound,

    /// `close` was called on a handle without an open descriptor.
    #[error("file not open: {}", .0.display())]
    FileNotOpen(PathBuf),

    /// A native filesystem call failed.
    #[error("{op} {}: {source}", path.display())]
    Native {
        /// Name of the native operation, e.g. `"mkdir"`.
        op: &'static str,
        /// The path the operation was applied to.
        path: PathBuf,
        /// The error reported by the operating system.
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::SourceNotFound(_) => ErrorKind::SourceNotFound,
            Self::FileNotFound(_) => ErrorKind::FileNotFound,
            Self::FileAlreadyExists(_) => ErrorKind::FileAlreadyExists,
            Self::NotAFile(_) => ErrorKind::NotAFile,
            Self::NotADirectory(_) => ErrorKind::NotADirectory,
            Self::StreamClosed => ErrorKind::StreamClosed,
            Self::IndexOutOfBounds { .. } => ErrorKind::IndexOutOfBounds,
            Self::FileDescriptorNotFound(_) => ErrorKind::FileDescriptorNotFound,
            Self::StatTargetNotFound(_) => ErrorKind::StatTargetNotFound,
            Self::PrefixNotFound => ErrorKind::PrefixNotFound,
            Self::FileNotOpen(_) => ErrorKind::FileNotOpen,
            Self::Native { .. } => ErrorKind::Native,
        }
    }

    /// Wraps a native failure without further translation.
    pub(crate) fn native(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Native {
            op,
            path: path.into(),
            source,
        }
    }

    /// Returns the underlying OS error kind, if this error came from a native call.
    #[must_use]
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Native { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

/// The closed set of failure causes.
///
/// The names returned by [`as_str`](ErrorKind::as_str) are stable and may be
/// matched on by callers that only see the rendered kind.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    /// `source-not-found`
    SourceNotFound,
    /// `file-not-found`
    FileNotFound,
    /// `file-already-exists`
    FileAlreadyExists,
    /// `not-a-file`
    NotAFile,
    /// `not-a-directory`
    NotADirectory,
    /// `stream-closed`
    StreamClosed,
    /// `index-out-of-bounds`
    IndexOutOfBounds,
    /// `file-descriptor-not-found`
    FileDescriptorNotFound,
    /// `stat-target-not-found`
    StatTargetNotFound,
    /// `prefix-not-found`
    PrefixNotFound,
    /// `file-not-open`
    FileNotOpen,
    /// `native`: an untranslated operating system failure.
    Native,
}

impl ErrorKind {
    /// Returns the stable name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SourceNotFound => "source-not-found",
            Self::FileNotFound => "file-not-found",
            Self::FileAlreadyExists => "file-already-exists",
            Self::NotAFile => "not-a-file",
            Self::NotADirectory => "not-a-directory",
            Self::StreamClosed => "stream-closed",
            Self::IndexOutOfBounds => "index-out-of-bounds",
            Self::FileDescriptorNotFound => "file-descriptor-not-found",
            Self::StatTargetNotFound => "stat-target-not-found",
            Self::PrefixNotFound => "prefix-not-found",
            Self::FileNotOpen => "file-not-open",
            Self::Native => "native",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A specialized `Result` for filesystem handle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a handle error as a standard I/O error, for callers that
/// interoperate with `std::io` based APIs.
impl From<Error> for io::Error {
    fn from(value: Error) -> Self {
        let kind = match value {
            Error::Native { source, .. } => return source,
            ref other => match other.kind() {
                ErrorKind::SourceNotFound | ErrorKind::FileNotFound | ErrorKind::StatTargetNotFound => io::ErrorKind::NotFound,
                ErrorKind::FileAlreadyExists => io::ErrorKind::AlreadyExists,
                ErrorKind::NotADirectory => io::ErrorKind::NotADirectory,
                ErrorKind::IndexOutOfBounds | ErrorKind::PrefixNotFound => io::ErrorKind::InvalidInput,
                ErrorKind::NotAFile
                | ErrorKind::StreamClosed
                | ErrorKind::FileDescriptorNotFound
                | ErrorKind::FileNotOpen
                | ErrorKind::Native => io::ErrorKind::Other,
            },
        };
        Self::new(kind, value)
    }
}
