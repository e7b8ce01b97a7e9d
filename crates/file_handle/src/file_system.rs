// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::Path;
use std::sync::{Arc, LazyLock};

use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::handle::FileHandle;
use crate::options::Options;

static SHARED: LazyLock<FileSystem> = LazyLock::new(FileSystem::new);

/// The context every [`FileHandle`] is bound to.
///
/// A `FileSystem` owns the worker pool that executes non-blocking operations
/// and the [`Options`] that tune them. It is cheap to clone; clones share the
/// same pool.
///
/// Handles created through [`FileHandle::new`] use the process-wide
/// [`FileSystem::shared`] instance.
#[derive(Clone, Debug)]
pub struct FileSystem {
    inner: Arc<FileSystemInner>,
}

#[derive(Debug)]
struct FileSystemInner {
    dispatcher: Dispatcher,
    options: Options,
}

impl FileSystem {
    /// Creates a filesystem context with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(Options::new())
    }

    /// Creates a filesystem context with the given options.
    #[must_use]
    pub fn with_options(options: Options) -> Self {
        Self {
            inner: Arc::new(FileSystemInner {
                dispatcher: Dispatcher::new(options.max_threads, options.idle_timeout),
                options,
            }),
        }
    }

    /// Returns the process-wide default context, creating it on first use.
    #[must_use]
    pub fn shared() -> Self {
        SHARED.clone()
    }

    /// Creates a handle for `path`, resolved against the current directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceNotFound`](crate::Error::SourceNotFound) if `path`
    /// is empty, or a native error if the current directory cannot be determined.
    pub fn file(&self, path: impl AsRef<Path>) -> Result<FileHandle> {
        FileHandle::in_file_system(self, path)
    }

    /// Returns the options this context was created with.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }
}

impl Default for FileSystem {
    fn default() -> Self {
        Self::new()
    }
}
