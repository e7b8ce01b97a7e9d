// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::time::Duration;

const DEFAULT_MAX_THREADS: usize = 4;
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_millis(250);
const DEFAULT_DIR_MODE: u32 = 0o777;
const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Tuning knobs for a [`FileSystem`](crate::FileSystem).
///
/// Generally speaking, when using `Options`, you'll first call [`Options::new`],
/// then chain calls to methods to set each option, then pass the result to
/// [`FileSystem::with_options`](crate::FileSystem::with_options).
///
/// ```
/// use core::time::Duration;
/// use file_handle::{FileSystem, Options};
///
/// let fs = FileSystem::with_options(Options::new().max_threads(2).watch_interval(Duration::from_millis(50)));
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Options {
    pub(crate) max_threads: usize,
    pub(crate) idle_timeout: Duration,
    pub(crate) watch_interval: Duration,
    pub(crate) dir_mode: u32,
    pub(crate) chunk_size: usize,
}

impl Options {
    /// Creates the default set of options.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_threads: DEFAULT_MAX_THREADS,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            watch_interval: DEFAULT_WATCH_INTERVAL,
            dir_mode: DEFAULT_DIR_MODE,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Upper bound on worker threads executing non-blocking operations.
    ///
    /// Values below one are raised to one.
    #[must_use]
    pub const fn max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// How long a surplus worker thread waits for work before exiting.
    #[must_use]
    pub const fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// How often a watch subscription samples the watched path.
    #[must_use]
    pub const fn watch_interval(mut self, watch_interval: Duration) -> Self {
        self.watch_interval = watch_interval;
        self
    }

    /// Mode bits for directories created by `mkdir` and `mkdirs`.
    ///
    /// Forwarded unchanged to the native call, so the process umask still
    /// applies. Ignored on platforms without POSIX modes.
    #[must_use]
    pub const fn dir_mode(mut self, dir_mode: u32) -> Self {
        self.dir_mode = dir_mode;
        self
    }

    /// Size of each chunk pulled from a file by a
    /// [`BufferedInputStream`](crate::BufferedInputStream).
    ///
    /// Values below one are raised to one.
    #[must_use]
    pub const fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}
