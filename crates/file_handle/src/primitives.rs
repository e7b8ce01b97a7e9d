// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The blocking native calls behind every handle operation.
//!
//! Each function performs exactly one native operation (or a fixed, tiny
//! sequence for convenience calls such as `truncate`) and translates the
//! native failure into an [`Error`] at this boundary. Completion strategies
//! decide which thread runs them.

use std::ffi::OsString;
use std::fs::{File, Metadata};
use std::io::{self, ErrorKind as IoErrorKind, Write as _};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::status::EntityKind;

/// How a missing path is reported by a particular operation.
#[derive(Clone, Copy, Debug)]
pub enum Missing {
    /// Stat-family calls.
    StatTarget,
    /// The source of a move or copy.
    Source,
    /// Anything that operates on an existing entity.
    File,
}

/// Translates a native failure on `path`.
pub fn translate(op: &'static str, path: &Path, missing: Missing, err: io::Error) -> Error {
    match err.kind() {
        IoErrorKind::NotFound => match missing {
            Missing::StatTarget => Error::StatTargetNotFound(path.to_path_buf()),
            Missing::Source => Error::SourceNotFound(path.display().to_string()),
            Missing::File => Error::FileNotFound(path.to_path_buf()),
        },
        IoErrorKind::AlreadyExists => Error::FileAlreadyExists(path.to_path_buf()),
        IoErrorKind::NotADirectory => Error::NotADirectory(path.to_path_buf()),
        _ => Error::native(op, path, err),
    }
}

/// Reads the metadata of `path`, following symbolic links.
pub fn stat(path: &Path) -> Result<Metadata> {
    std::fs::metadata(path).map_err(|e| translate("stat", path, Missing::StatTarget, e))
}

/// Like [`stat`], but does not follow a trailing symbolic link.
pub fn lstat(path: &Path) -> Result<Metadata> {
    std::fs::symlink_metadata(path).map_err(|e| translate("lstat", path, Missing::StatTarget, e))
}

/// Classifies what `path` resolves to.
pub fn kind(path: &Path) -> Result<EntityKind> {
    stat(path).map(|m| EntityKind::of(&m))
}

/// Succeeds if `path` exists, whatever it is.
pub fn exists(path: &Path) -> Result<()> {
    match stat(path) {
        Ok(_) => Ok(()),
        Err(Error::StatTargetNotFound(p)) => Err(Error::FileNotFound(p)),
        Err(e) => Err(e),
    }
}

/// Succeeds if `path` is a plain file.
pub fn is_file(path: &Path) -> Result<()> {
    exists_as(path, EntityKind::File)
}

/// Succeeds if `path` is a directory.
pub fn is_dir(path: &Path) -> Result<()> {
    exists_as(path, EntityKind::Dir)
}

fn exists_as(path: &Path, expected: EntityKind) -> Result<()> {
    let metadata = match stat(path) {
        Ok(m) => m,
        Err(Error::StatTargetNotFound(p)) => return Err(Error::FileNotFound(p)),
        Err(e) => return Err(e),
    };
    match (expected, EntityKind::of(&metadata)) {
        (EntityKind::File, EntityKind::File) if metadata.is_file() => Ok(()),
        (EntityKind::Dir, EntityKind::Dir) => Ok(()),
        (EntityKind::File, _) => Err(Error::NotAFile(path.to_path_buf())),
        (EntityKind::Dir, _) => Err(Error::NotADirectory(path.to_path_buf())),
    }
}

#[cfg(unix)]
fn c_path(op: &'static str, path: &Path) -> Result<std::ffi::CString> {
    use std::os::unix::ffi::OsStrExt;
    std::ffi::CString::new(path.as_os_str().as_bytes())
        .map_err(|e| Error::native(op, path, io::Error::new(IoErrorKind::InvalidInput, e)))
}

/// Checks accessibility of `path` for the requested access.
#[cfg(unix)]
pub fn access(path: &Path, mode: crate::AccessMode) -> Result<()> {
    let c_path = c_path("access", path)?;

    // SAFETY: `c_path` is a valid NUL-terminated string that outlives the call.
    let rc = unsafe { libc::access(c_path.as_ptr(), mode.bits()) };
    if rc == 0 {
        Ok(())
    } else {
        Err(translate("access", path, Missing::File, io::Error::last_os_error()))
    }
}

/// Checks accessibility of `path` for the requested access.
///
/// Without POSIX permissions only existence and the read-only attribute are
/// consulted.
#[cfg(not(unix))]
pub fn access(path: &Path, mode: crate::AccessMode) -> Result<()> {
    let metadata = stat(path).map_err(|e| match e {
        Error::StatTargetNotFound(p) => Error::FileNotFound(p),
        other => other,
    })?;
    if mode.contains(crate::AccessMode::WRITE) && metadata.permissions().readonly() {
        return Err(Error::native(
            "access",
            path,
            io::Error::new(IoErrorKind::PermissionDenied, "read-only"),
        ));
    }
    Ok(())
}

/// Creates a single directory with the given permission bits.
pub fn mkdir(path: &Path, mode: u32) -> Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        let _ = builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(path).map_err(|e| translate("mkdir", path, Missing::File, e))
}

/// Lists the entry names of a directory, sorted.
pub fn read_dir(path: &Path) -> Result<Vec<OsString>> {
    let entries = std::fs::read_dir(path).map_err(|e| translate("readdir", path, Missing::File, e))?;
    let mut names = entries
        .map(|entry| entry.map(|e| e.file_name()))
        .collect::<io::Result<Vec<_>>>()
        .map_err(|e| translate("readdir", path, Missing::File, e))?;
    names.sort();
    Ok(names)
}

/// Removes a file or symbolic link.
pub fn unlink(path: &Path) -> Result<()> {
    std::fs::remove_file(path).map_err(|e| translate("unlink", path, Missing::File, e))
}

/// Removes an empty directory.
pub fn rmdir(path: &Path) -> Result<()> {
    std::fs::remove_dir(path).map_err(|e| translate("rmdir", path, Missing::File, e))
}

/// Removes a single entity with the native call matching `kind`.
pub fn remove(path: &Path, kind: EntityKind) -> Result<()> {
    match kind {
        EntityKind::File => unlink(path),
        EntityKind::Dir => rmdir(path),
    }
}

/// Moves `from` to `to`, replacing a file already at `to`.
pub fn rename(from: &Path, to: &Path) -> Result<()> {
    std::fs::rename(from, to).map_err(|e| translate("rename", from, Missing::Source, e))
}

/// Copies the contents and permissions of the file `from` to `to`.
pub fn copy(from: &Path, to: &Path) -> Result<u64> {
    std::fs::copy(from, to).map_err(|e| translate("copy", from, Missing::Source, e))
}

/// Sets the permission bits of `path`.
#[cfg(unix)]
pub fn chmod(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| translate("chmod", path, Missing::File, e))
}

/// Only the owner write bit is meaningful without POSIX permissions; it maps
/// to the read-only attribute.
#[cfg(not(unix))]
pub fn chmod(path: &Path, mode: u32) -> Result<()> {
    let mut permissions = stat(path)?.permissions();
    permissions.set_readonly(mode & 0o200 == 0);
    std::fs::set_permissions(path, permissions).map_err(|e| translate("chmod", path, Missing::File, e))
}

/// Sets the access and modification times of `path` without opening it, so
/// neither read permission on a file nor a descriptor on a directory is needed.
#[cfg(unix)]
pub fn utimes(path: &Path, accessed: SystemTime, modified: SystemTime) -> Result<()> {
    let c_path = c_path("utimes", path)?;
    let times = [timespec(path, accessed)?, timespec(path, modified)?];

    // SAFETY: `c_path` is NUL-terminated and `times` holds the two entries
    // `utimensat` reads; both outlive the call.
    let rc = unsafe { libc::utimensat(libc::AT_FDCWD, c_path.as_ptr(), times.as_ptr(), 0) };
    if rc == 0 {
        Ok(())
    } else {
        Err(translate("utimes", path, Missing::File, io::Error::last_os_error()))
    }
}

/// Converts `time` to a `timespec`, normalizing pre-epoch times so that the
/// nanosecond field stays positive.
#[cfg(unix)]
fn timespec(path: &Path, time: SystemTime) -> Result<libc::timespec> {
    let (secs, nanos) = match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(after) => (i128::from(after.as_secs()), after.subsec_nanos()),
        Err(before) => {
            let before = before.duration();
            match before.subsec_nanos() {
                0 => (-i128::from(before.as_secs()), 0),
                n => (-i128::from(before.as_secs()) - 1, 1_000_000_000 - n),
            }
        }
    };
    let out_of_range = || {
        Error::native(
            "utimes",
            path,
            io::Error::new(IoErrorKind::InvalidInput, format!("timestamp {time:?} is out of range")),
        )
    };
    Ok(libc::timespec {
        tv_sec: libc::time_t::try_from(secs).map_err(|_| out_of_range())?,
        tv_nsec: libc::c_long::try_from(nanos).map_err(|_| out_of_range())?,
    })
}

/// Sets the access and modification times of `path`.
///
/// The handle is opened for attribute writes only, with backup semantics so
/// that directories can be opened too.
#[cfg(windows)]
pub fn utimes(path: &Path, accessed: SystemTime, modified: SystemTime) -> Result<()> {
    use std::fs::FileTimes;
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_WRITE_ATTRIBUTES: u32 = 0x0100;
    const FILE_FLAG_BACKUP_SEMANTICS: u32 = 0x0200_0000;

    let file = std::fs::OpenOptions::new()
        .access_mode(FILE_WRITE_ATTRIBUTES)
        .custom_flags(FILE_FLAG_BACKUP_SEMANTICS)
        .open(path)
        .map_err(|e| translate("utimes", path, Missing::File, e))?;
    file.set_times(FileTimes::new().set_accessed(accessed).set_modified(modified))
        .map_err(|e| translate("utimes", path, Missing::File, e))
}

/// Sets the length of the file at `path`, zero-filling when it grows.
pub fn truncate(path: &Path, len: u64) -> Result<()> {
    let file = std::fs::OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| translate("truncate", path, Missing::File, e))?;
    file.set_len(len).map_err(|e| translate("truncate", path, Missing::File, e))
}

/// Opens `path` with the descriptor semantics of `flags`.
pub fn open(path: &Path, flags: crate::OpenFlags) -> Result<File> {
    if flags.requires_existing_file() {
        is_file(path)?;
    }
    flags
        .to_open_options()
        .open(path)
        .map_err(|e| translate("open", path, Missing::File, e))
}

/// Reads a whole file into memory.
pub fn read_file(path: &Path) -> Result<Bytes> {
    std::fs::read(path)
        .map(Bytes::from)
        .map_err(|e| translate("read", path, Missing::File, e))
}

/// Replaces or appends to the contents of a file, creating it if needed.
pub fn write_file(path: &Path, data: &[u8], append: bool) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .write(!append)
        .append(append)
        .truncate(!append)
        .create(true)
        .open(path)
        .map_err(|e| translate("write", path, Missing::File, e))?;
    file.write_all(data).map_err(|e| translate("write", path, Missing::File, e))
}

/// Creates an empty file, failing if anything already exists at `path`.
pub fn create_file(path: &Path) -> Result<()> {
    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map(drop)
        .map_err(|e| translate("create", path, Missing::File, e))
}

/// Creates a uniquely named directory inside `parent`.
pub fn create_temp_dir(parent: &Path, prefix: &str) -> Result<PathBuf> {
    if prefix.is_empty() {
        return Err(Error::PrefixNotFound);
    }
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(parent)
        .map(tempfile::TempDir::keep)
        .map_err(|e| translate("mkdtemp", parent, Missing::File, e))
}

/// Reads up to `len` bytes at `offset` without moving the cursor.
///
/// The buffer is capped at what the file holds past `offset`.
pub fn read_at(file: &File, path: &Path, offset: u64, len: usize) -> Result<Bytes> {
    let size = file.metadata().map_err(|e| Error::native("read", path, e))?.len();
    let remaining = usize::try_from(size.saturating_sub(offset)).unwrap_or(usize::MAX);
    let len = len.min(remaining);
    let mut buf = vec![0_u8; len];
    let mut total = 0;
    while total < len {
        let current = offset.saturating_add(total as u64);
        match positional_read(file, &mut buf[total..], current) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == IoErrorKind::Interrupted => {}
            Err(e) => return Err(Error::native("read", path, e)),
        }
    }
    buf.truncate(total);
    Ok(Bytes::from(buf))
}

/// Writes all of `data`, at `offset` when given, otherwise at the cursor.
pub fn write_at(file: &File, path: &Path, offset: Option<u64>, data: &[u8]) -> Result<usize> {
    let written = match offset {
        Some(offset) => positional_write_all(file, data, offset),
        None => {
            let mut f = file;
            f.write_all(data)
        }
    };
    written.map(|()| data.len()).map_err(|e| Error::native("write", path, e))
}

/// Flushes data and metadata of an open descriptor to the device.
pub fn fsync(file: &File, path: &Path) -> Result<()> {
    file.sync_all().map_err(|e| Error::native("fsync", path, e))
}

#[cfg(unix)]
fn positional_read(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn positional_read(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

#[cfg(unix)]
fn positional_write(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.write_at(buf, offset)
}

#[cfg(windows)]
fn positional_write(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_write(buf, offset)
}

/// Writes all of `buf` at `offset`, retrying on short writes.
fn positional_write_all(file: &File, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
    while !buf.is_empty() {
        match positional_write(file, buf, offset) {
            Ok(0) => return Err(io::Error::new(IoErrorKind::WriteZero, "failed to write whole buffer")),
            Ok(n) => {
                buf = &buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == IoErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
