// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs::{File, Metadata};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{Level, event};

use crate::access_mode::AccessMode;
use crate::completion::Completion;
use crate::error::{Error, Result};
use crate::file_system::FileSystem;
use crate::filter::{self, AcceptAll, EntryPredicate};
use crate::mkdirs::MkdirsPlan;
use crate::open_flags::OpenFlags;
use crate::path_utils;
use crate::plan;
use crate::primitives;
use crate::rimraf::RimrafPlan;
use crate::status::EntityKind;
use crate::watch::{Subscription, WatchListener, WatchPolicy};

/// The payload of [`FileHandle::read_contents`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Contents {
    /// The bytes of a file.
    Bytes(Bytes),
    /// The sorted entry names of a directory.
    Entries(Vec<OsString>),
}

type Descriptor = Arc<Mutex<Option<Arc<File>>>>;

struct Watch {
    subscription: Subscription,
    policy: WatchPolicy,
}

/// A filesystem path plus the resources opened through it.
///
/// The path is made absolute and normalized once, when the handle is
/// created. A handle tracks at most one open descriptor (see [`open`]) and at
/// most one change subscription (see [`watch`]); both are released when the
/// handle is dropped.
///
/// Every operation takes a [`Completion`] strategy that decides whether it
/// runs on the calling thread or on the worker pool of the handle's
/// [`FileSystem`], and how its outcome is delivered:
///
/// ```no_run
/// use file_handle::{Async, Blocking, Callback, FileHandle};
///
/// # async fn demo() -> file_handle::Result<()> {
/// let dir = FileHandle::new("/tmp/reports/2024")?;
///
/// dir.mkdirs(Blocking)?;
/// let names = dir.list(Async).await?;
/// dir.rimraf(Callback::new(|outcome: file_handle::Result<usize>| {
///     println!("removed {:?} entities", outcome);
/// }));
/// # Ok(())
/// # }
/// ```
///
/// [`open`]: Self::open
/// [`watch`]: Self::watch
pub struct FileHandle {
    path: PathBuf,
    fs: FileSystem,
    descriptor: Descriptor,
    watch: Mutex<Option<Watch>>,
}

impl FileHandle {
    /// Creates a handle bound to [`FileSystem::shared`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceNotFound`] if `path` is empty.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        Self::in_file_system(&FileSystem::shared(), path)
    }

    /// Creates a handle for `rel` resolved against `parent`, bound to the
    /// same [`FileSystem`] as `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceNotFound`] if `rel` is empty.
    pub fn with_parent(parent: &Self, rel: impl AsRef<Path>) -> Result<Self> {
        let path = path_utils::resolve(&parent.path, rel)?;
        Ok(Self::at(parent.fs.clone(), path))
    }

    /// Creates a handle for `rel` resolved against the directory `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceNotFound`] if either path is empty.
    pub fn with_parent_path(parent: impl AsRef<Path>, rel: impl AsRef<Path>) -> Result<Self> {
        let base = path_utils::absolute(parent)?;
        let path = path_utils::resolve(&base, rel)?;
        Ok(Self::at(FileSystem::shared(), path))
    }

    pub(crate) fn in_file_system(fs: &FileSystem, path: impl AsRef<Path>) -> Result<Self> {
        let path = path_utils::absolute(path)?;
        Ok(Self::at(fs.clone(), path))
    }

    /// Wraps an already normalized absolute path.
    pub(crate) fn at(fs: FileSystem, path: PathBuf) -> Self {
        Self {
            path,
            fs,
            descriptor: Arc::new(Mutex::new(None)),
            watch: Mutex::new(None),
        }
    }

    /// The absolute, normalized path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The final path component, or `None` for the root.
    #[must_use]
    pub fn name(&self) -> Option<&OsStr> {
        self.path.file_name()
    }

    /// A handle for the containing directory, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.path.parent().map(|p| Self::at(self.fs.clone(), p.to_path_buf()))
    }

    /// A handle for `name` inside this directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceNotFound`] if `name` is empty.
    pub fn child(&self, name: impl AsRef<Path>) -> Result<Self> {
        Self::with_parent(self, name)
    }

    /// The context this handle runs its non-blocking operations on.
    #[must_use]
    pub fn file_system(&self) -> &FileSystem {
        &self.fs
    }

    /// Whether a descriptor is currently tracked.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.descriptor.lock().is_some()
    }

    /// Whether a change subscription is installed.
    #[must_use]
    pub fn is_watched(&self) -> bool {
        self.watch.lock().is_some()
    }

    fn run<T, C>(&self, completion: C, op: impl FnOnce() -> Result<T> + Send + 'static) -> C::Output
    where
        T: Send + 'static,
        C: Completion<T>,
    {
        completion.run(self.fs.dispatcher(), op)
    }

    fn open_descriptor(&self) -> Option<Arc<File>> {
        self.descriptor.lock().clone()
    }

    // Stat family

    /// Returns the metadata of the path, following symbolic links.
    ///
    /// A missing path reports [`Error::StatTargetNotFound`].
    pub fn stat<C: Completion<Metadata>>(&self, completion: C) -> C::Output {
        let path = self.path.clone();
        self.run(completion, move || primitives::stat(&path))
    }

    /// Like [`stat`](Self::stat), but describes a symbolic link itself.
    pub fn lstat<C: Completion<Metadata>>(&self, completion: C) -> C::Output {
        let path = self.path.clone();
        self.run(completion, move || primitives::lstat(&path))
    }

    /// Whether the path is a file or a directory.
    pub fn kind<C: Completion<EntityKind>>(&self, completion: C) -> C::Output {
        let path = self.path.clone();
        self.run(completion, move || primitives::kind(&path))
    }

    /// Succeeds if the path exists; fails with [`Error::FileNotFound`] otherwise.
    pub fn exists<C: Completion<()>>(&self, completion: C) -> C::Output {
        let path = self.path.clone();
        self.run(completion, move || primitives::exists(&path))
    }

    /// Succeeds if the path is a plain file. An existing non-file reports
    /// [`Error::NotAFile`].
    pub fn is_file<C: Completion<()>>(&self, completion: C) -> C::Output {
        let path = self.path.clone();
        self.run(completion, move || primitives::is_file(&path))
    }

    /// Succeeds if the path is a directory. An existing non-directory reports
    /// [`Error::NotADirectory`].
    pub fn is_dir<C: Completion<()>>(&self, completion: C) -> C::Output {
        let path = self.path.clone();
        self.run(completion, move || primitives::is_dir(&path))
    }

    /// Checks that the calling process may access the path as requested.
    pub fn access<C: Completion<()>>(&self, mode: AccessMode, completion: C) -> C::Output {
        let path = self.path.clone();
        self.run(completion, move || primitives::access(&path, mode))
    }

    // Descriptor

    /// Opens the path and tracks the resulting descriptor.
    ///
    /// Read-style flags and plain append flags require an existing plain
    /// file. Opening an already open handle replaces the tracked descriptor;
    /// the previous one is closed once no in-flight operation still uses it.
    pub fn open<C: Completion<()>>(&self, flags: OpenFlags, completion: C) -> C::Output {
        let path = self.path.clone();
        let slot = Arc::clone(&self.descriptor);
        self.run(completion, move || {
            let file = primitives::open(&path, flags)?;
            let replaced = slot.lock().replace(Arc::new(file)).is_some();
            event!(Level::DEBUG, path = %path.display(), %flags, replaced, "descriptor opened");
            Ok(())
        })
    }

    /// Stops tracking the open descriptor.
    ///
    /// The descriptor is detached when `close` is called, whatever the
    /// completion strategy. Without one, reports [`Error::FileNotOpen`].
    pub fn close<C: Completion<()>>(&self, completion: C) -> C::Output {
        let path = self.path.clone();
        let taken = self.descriptor.lock().take();
        self.run(completion, move || match taken {
            Some(file) => {
                drop(file);
                event!(Level::DEBUG, path = %path.display(), "descriptor closed");
                Ok(())
            }
            None => Err(Error::FileNotOpen(path)),
        })
    }

    /// Reads up to `len` bytes at `offset` from the open descriptor.
    ///
    /// Fewer bytes are returned at end of file. Without an open descriptor,
    /// reports [`Error::FileDescriptorNotFound`].
    pub fn read<C: Completion<Bytes>>(&self, offset: u64, len: usize, completion: C) -> C::Output {
        let path = self.path.clone();
        let file = self.open_descriptor();
        self.run(completion, move || {
            let file = file.ok_or_else(|| Error::FileDescriptorNotFound(path.clone()))?;
            primitives::read_at(&file, &path, offset, len)
        })
    }

    /// Writes `data` through the open descriptor, at `offset` when given and
    /// at the descriptor's cursor otherwise. Returns the number of bytes
    /// written.
    pub fn write<C: Completion<usize>>(&self, offset: Option<u64>, data: impl Into<Bytes>, completion: C) -> C::Output {
        let path = self.path.clone();
        let file = self.open_descriptor();
        let data = data.into();
        self.run(completion, move || {
            let file = file.ok_or_else(|| Error::FileDescriptorNotFound(path.clone()))?;
            primitives::write_at(&file, &path, offset, &data)
        })
    }

    /// Flushes the open descriptor's data and metadata to storage.
    pub fn sync<C: Completion<()>>(&self, completion: C) -> C::Output {
        let path = self.path.clone();
        let file = self.open_descriptor();
        self.run(completion, move || {
            let file = file.ok_or_else(|| Error::FileDescriptorNotFound(path.clone()))?;
            primitives::fsync(&file, &path)
        })
    }

    // Path operations

    /// Moves the path to `dest`. The handle keeps its original path.
    ///
    /// A relative `dest` is resolved against the current directory. A missing
    /// source reports [`Error::SourceNotFound`].
    pub fn rename<C: Completion<()>>(&self, dest: impl AsRef<Path>, completion: C) -> C::Output {
        let path = self.path.clone();
        let dest = path_utils::absolute(dest);
        self.run(completion, move || primitives::rename(&path, &dest?))
    }

    /// Copies the file's contents to `dest`, returning the number of bytes
    /// copied.
    pub fn copy_to<C: Completion<u64>>(&self, dest: impl AsRef<Path>, completion: C) -> C::Output {
        let path = self.path.clone();
        let dest = path_utils::absolute(dest);
        self.run(completion, move || primitives::copy(&path, &dest?))
    }

    /// Removes a non-directory.
    pub fn unlink<C: Completion<()>>(&self, completion: C) -> C::Output {
        let path = self.path.clone();
        self.run(completion, move || primitives::unlink(&path))
    }

    /// Removes an empty directory.
    pub fn rmdir<C: Completion<()>>(&self, completion: C) -> C::Output {
        let path = self.path.clone();
        self.run(completion, move || primitives::rmdir(&path))
    }

    /// Removes the path with the native call matching `kind`.
    pub fn remove<C: Completion<()>>(&self, kind: EntityKind, completion: C) -> C::Output {
        let path = self.path.clone();
        self.run(completion, move || primitives::remove(&path, kind))
    }

    /// Creates the directory with the configured
    /// [`dir_mode`](crate::Options::dir_mode).
    pub fn mkdir<C: Completion<()>>(&self, completion: C) -> C::Output {
        self.mkdir_mode(self.fs.options().dir_mode, completion)
    }

    /// Creates the directory with explicit POSIX mode bits.
    pub fn mkdir_mode<C: Completion<()>>(&self, mode: u32, completion: C) -> C::Output {
        let path = self.path.clone();
        self.run(completion, move || primitives::mkdir(&path, mode))
    }

    /// Sets POSIX mode bits, forwarded unchanged.
    pub fn chmod<C: Completion<()>>(&self, mode: u32, completion: C) -> C::Output {
        let path = self.path.clone();
        self.run(completion, move || primitives::chmod(&path, mode))
    }

    /// Sets access and modification times.
    pub fn utimes<C: Completion<()>>(&self, accessed: SystemTime, modified: SystemTime, completion: C) -> C::Output {
        let path = self.path.clone();
        self.run(completion, move || primitives::utimes(&path, accessed, modified))
    }

    /// Shrinks or extends the file to `len` bytes.
    pub fn truncate<C: Completion<()>>(&self, len: u64, completion: C) -> C::Output {
        let path = self.path.clone();
        self.run(completion, move || primitives::truncate(&path, len))
    }

    // Whole-entity convenience

    /// Reads a file's bytes or a directory's entry names, as selected by `kind`.
    pub fn read_contents<C: Completion<Contents>>(&self, kind: EntityKind, completion: C) -> C::Output {
        let path = self.path.clone();
        self.run(completion, move || match kind {
            EntityKind::File => primitives::read_file(&path).map(Contents::Bytes),
            EntityKind::Dir => primitives::read_dir(&path).map(Contents::Entries),
        })
    }

    /// Reads the whole file.
    pub fn read_all<C: Completion<Bytes>>(&self, completion: C) -> C::Output {
        let path = self.path.clone();
        self.run(completion, move || primitives::read_file(&path))
    }

    /// Replaces the file's contents with `data`, creating it if needed.
    pub fn write_all<C: Completion<()>>(&self, data: impl Into<Bytes>, completion: C) -> C::Output {
        let path = self.path.clone();
        let data = data.into();
        self.run(completion, move || primitives::write_file(&path, &data, false))
    }

    /// Appends `data` to the file, creating it if needed.
    pub fn append<C: Completion<()>>(&self, data: impl Into<Bytes>, completion: C) -> C::Output {
        let path = self.path.clone();
        let data = data.into();
        self.run(completion, move || primitives::write_file(&path, &data, true))
    }

    /// Creates an empty file. Anything already at the path reports
    /// [`Error::FileAlreadyExists`].
    pub fn create_file<C: Completion<()>>(&self, completion: C) -> C::Output {
        let path = self.path.clone();
        self.run(completion, move || primitives::create_file(&path))
    }

    /// Creates a uniquely named directory inside this one, its name starting
    /// with `prefix`, and returns a handle for it.
    ///
    /// An empty `prefix` reports [`Error::PrefixNotFound`].
    pub fn create_temp_dir<C: Completion<Self>>(&self, prefix: impl Into<String>, completion: C) -> C::Output {
        let path = self.path.clone();
        let prefix = prefix.into();
        let fs = self.fs.clone();
        self.run(completion, move || {
            primitives::create_temp_dir(&path, &prefix).map(|made| Self::at(fs, made))
        })
    }

    // Listing

    /// Lists the directory's entry names, sorted.
    pub fn list<C: Completion<Vec<OsString>>>(&self, completion: C) -> C::Output {
        self.list_filtered(AcceptAll, completion)
    }

    /// Lists the entry names `predicate` accepts, sorted.
    pub fn list_filtered<P, C>(&self, predicate: P, completion: C) -> C::Output
    where
        P: EntryPredicate,
        C: Completion<Vec<OsString>>,
    {
        let dir = Self::at(self.fs.clone(), self.path.clone());
        self.run(completion, move || {
            let names = primitives::read_dir(&dir.path)?;
            Ok(filter::apply(&predicate, &dir, names))
        })
    }

    /// Lists the directory's entries as child handles.
    pub fn list_files<C: Completion<Vec<Self>>>(&self, completion: C) -> C::Output {
        self.list_files_filtered(AcceptAll, completion)
    }

    /// Lists the entries `predicate` accepts as child handles.
    pub fn list_files_filtered<P, C>(&self, predicate: P, completion: C) -> C::Output
    where
        P: EntryPredicate,
        C: Completion<Vec<Self>>,
    {
        let dir = Self::at(self.fs.clone(), self.path.clone());
        self.run(completion, move || {
            let names = primitives::read_dir(&dir.path)?;
            let children = filter::apply(&predicate, &dir, names)
                .into_iter()
                .map(|name| Self::at(dir.fs.clone(), dir.path.join(name)))
                .collect();
            Ok(children)
        })
    }

    // Composites

    /// Creates the directory and every missing ancestor, outermost first.
    ///
    /// Succeeds if the directory already exists. Fails with
    /// [`Error::FileAlreadyExists`] if the path exists as something else.
    /// Ancestors created before a failure are kept.
    pub fn mkdirs<C: Completion<()>>(&self, completion: C) -> C::Output {
        let plan = MkdirsPlan::new(&self.path, self.fs.options().dir_mode);
        completion.drive(self.fs.dispatcher(), plan)
    }

    /// Removes the directory and everything beneath it, one entry at a time.
    ///
    /// Returns the number of removed entities, the directory included.
    /// Symbolic links inside the tree are removed, not followed. The first
    /// failure stops the walk; entries removed before it stay removed.
    pub fn rimraf<C: Completion<usize>>(&self, completion: C) -> C::Output {
        completion.drive(self.fs.dispatcher(), RimrafPlan::new(self.path.clone()))
    }

    /// Removes the path, file or tree, on the calling thread.
    ///
    /// Failures are logged and swallowed. Meant for cleanup paths that cannot
    /// act on an error anyway.
    pub fn destroy(&self) {
        destroy_path(&self.path);
    }

    /// Like [`destroy`](Self::destroy), but runs on the worker pool and
    /// returns immediately.
    pub fn destroy_detached(&self) {
        let path = self.path.clone();
        self.fs.dispatcher().spawn(async move { destroy_path(&path) });
    }

    // Watch

    /// Installs the handle's change subscription.
    ///
    /// The path must exist. A handle holds at most one subscription;
    /// watching again cancels the previous one without applying its policy.
    /// `policy` is applied by [`unwatch`](Self::unwatch).
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileNotFound`] if the path does not exist, or a native
    /// error if the watcher thread cannot be started.
    pub fn watch(&self, listener: impl WatchListener, policy: WatchPolicy) -> Result<()> {
        let subscription = self.subscribe(listener)?;
        let previous = self.watch.lock().replace(Watch { subscription, policy });
        // Dropping the previous subscription cancels it.
        drop(previous);
        Ok(())
    }

    /// Creates a change subscription that the caller owns, independent of
    /// the handle's own.
    ///
    /// # Errors
    ///
    /// Same as [`watch`](Self::watch).
    pub fn subscribe(&self, listener: impl WatchListener) -> Result<Subscription> {
        primitives::exists(&self.path)?;
        Subscription::start(self.path.clone(), self.fs.options().watch_interval, listener)
    }

    /// Cancels the handle's subscription, then applies its policy.
    ///
    /// Returns `false` if the handle was not watched.
    pub fn unwatch(&self) -> bool {
        let Some(Watch { mut subscription, policy }) = self.watch.lock().take() else {
            return false;
        };
        subscription.cancel();
        if policy == WatchPolicy::DeleteOnCancel {
            destroy_path(&self.path);
        }
        true
    }
}

/// Removes a file or a whole tree, logging instead of reporting the outcome.
fn destroy_path(path: &Path) {
    let outcome = primitives::lstat(path).and_then(|metadata| match EntityKind::of(&metadata) {
        EntityKind::Dir => plan::drive_blocking(RimrafPlan::new(path.to_path_buf())).map(drop),
        EntityKind::File => primitives::unlink(path),
    });
    match outcome {
        Ok(()) => event!(Level::DEBUG, path = %path.display(), "destroyed"),
        Err(error) => event!(Level::WARN, path = %path.display(), %error, "destroy failed"),
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .field("watched", &self.is_watched())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}
