// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Path-centric filesystem handles with interchangeable completion strategies.
//!
//! A [`FileHandle`] wraps one absolute path, plus the descriptor and change
//! subscription opened through it, and exposes the whole set of filesystem
//! primitives on it: stat, access, open/close, positional read/write, rename,
//! unlink, mkdir, chmod, utimes, truncate, sync, directory listing and more.
//!
//! # Completion strategies
//!
//! Each operation is written once and takes a [`Completion`] value that
//! chooses where it runs and how the outcome comes back:
//!
//! ```no_run
//! use file_handle::{Async, Blocking, BlockingCallback, Callback, FileHandle};
//!
//! # async fn example() -> file_handle::Result<()> {
//! let file = FileHandle::new("/var/data/report.txt")?;
//!
//! // On the calling thread, as a `Result`.
//! file.write_all("draft", Blocking)?;
//!
//! // On the worker pool, as a future.
//! let bytes = file.read_all(Async).await?;
//!
//! // On the worker pool, delivered to a callback on a worker thread.
//! file.exists(Callback::new(|outcome: file_handle::Result<()>| {
//!     println!("exists: {}", outcome.is_ok());
//! }));
//!
//! // On the calling thread, delivered to a callback before returning.
//! file.unlink(BlockingCallback::new(|outcome: file_handle::Result<()>| {
//!     assert!(outcome.is_ok());
//! }));
//! # Ok(())
//! # }
//! ```
//!
//! Failures are always reported through the strategy as an [`Error`]; nothing
//! is recorded in global state. [`Status::of`] reduces any outcome to the
//! classic success/error sentinel.
//!
//! # Composite operations
//!
//! [`FileHandle::mkdirs`] creates a whole ancestor chain and
//! [`FileHandle::rimraf`] removes a whole tree. Both run one native call at a
//! time, in a deterministic order, and stop at the first failure without
//! rolling back what was already done. Their non-blocking forms never hold a
//! worker thread while waiting for the next step, and neither form recurses
//! on the native stack.
//!
//! # Buffered input
//!
//! [`BufferedInputStream`] reads a file, or a [`Window`] of it, into memory
//! once and then serves byte reads, `mark`/`reset` and `skip` from the
//! buffer. It also implements [`std::io::Read`] and [`std::io::Seek`].
//!
//! # Configuration
//!
//! Handles created with [`FileHandle::new`] run on the process-wide
//! [`FileSystem::shared`] context. A [`FileSystem`] built from [`Options`]
//! sets the worker pool size, the directory creation mode, the watch poll
//! interval and the stream chunk size:
//!
//! ```
//! use file_handle::{FileSystem, Options};
//!
//! let fs = FileSystem::with_options(Options::new().max_threads(2).dir_mode(0o750));
//! let logs = fs.file("logs")?;
//! # Ok::<(), file_handle::Error>(())
//! ```
//!
//! # Logging
//!
//! The crate emits [`tracing`](https://docs.rs/tracing) events: `DEBUG` for
//! composite steps and for descriptor, stream and watch lifecycle changes,
//! and `WARN` when a best-effort [`FileHandle::destroy`] swallows a failure.

pub use std::fs::Metadata;

pub use crate::access_mode::AccessMode;
pub use crate::completion::{Async, Blocking, BlockingCallback, Callback, Completion, Pending};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::file_system::FileSystem;
pub use crate::filter::{AcceptAll, EntryPredicate, Suffix};
pub use crate::handle::{Contents, FileHandle};
pub use crate::input_stream::{Acquisition, BufferedInputStream, Window};
pub use crate::open_flags::OpenFlags;
pub use crate::options::Options;
pub use crate::status::{EntityKind, Status};
pub use crate::watch::{Subscription, WatchEvent, WatchListener, WatchPolicy};

mod access_mode;
mod completion;
mod dispatcher;
mod error;
mod file_system;
mod filter;
mod handle;
mod input_stream;
mod mkdirs;
mod open_flags;
mod options;
mod path_utils;
mod plan;
mod primitives;
mod rimraf;
mod status;
mod watch;
