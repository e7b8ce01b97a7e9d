// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::ops::Range;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use tracing::{Level, event};

use crate::completion::Completion;
use crate::error::{Error, Result};
use crate::handle::FileHandle;
use crate::open_flags::OpenFlags;
use crate::primitives;

/// The slice of a file a [`BufferedInputStream`] exposes.
///
/// A window applies only when both `offset` and `length` are non-zero;
/// otherwise the stream covers the whole file. The end is clamped to the
/// bytes actually acquired.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Window {
    offset: u64,
    length: u64,
}

impl Window {
    /// A window of `length` bytes starting at `offset`.
    #[must_use]
    pub const fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// The whole file.
    #[must_use]
    pub const fn full() -> Self {
        Self { offset: 0, length: 0 }
    }

    fn bounds(self, acquired: usize) -> Range<usize> {
        if self.offset == 0 || self.length == 0 {
            return 0..acquired;
        }
        let start = usize::try_from(self.offset).unwrap_or(usize::MAX).min(acquired);
        let end = usize::try_from(self.offset.saturating_add(self.length))
            .unwrap_or(usize::MAX)
            .min(acquired);
        start..end
    }
}

/// How a [`BufferedInputStream`] pulls the file into memory.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Acquisition {
    /// Take a single chunk of [`chunk_size`](crate::Options::chunk_size)
    /// bytes and treat it as the whole file.
    ///
    /// Files larger than one chunk are cut short. Use
    /// [`Accumulating`](Self::Accumulating) unless the file is known to be
    /// small.
    Blocking,
    /// Read chunk after chunk until end of file.
    #[default]
    Accumulating,
}

/// Reads a file in fixed-size chunks.
struct ChunkSource {
    file: File,
    chunk_size: usize,
}

impl ChunkSource {
    fn next_chunk(&mut self, path: &Path) -> Result<Option<Bytes>> {
        let mut chunk = BytesMut::zeroed(self.chunk_size.max(1));
        loop {
            match self.file.read(&mut chunk) {
                Ok(0) => return Ok(None),
                Ok(n) => {
                    chunk.truncate(n);
                    return Ok(Some(chunk.freeze()));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::native("read", path, e)),
            }
        }
    }

    fn acquire(mut self, path: &Path, acquisition: Acquisition, size_hint: usize) -> Result<Bytes> {
        match acquisition {
            Acquisition::Blocking => Ok(self.next_chunk(path)?.unwrap_or_default()),
            Acquisition::Accumulating => {
                let mut all = BytesMut::with_capacity(size_hint);
                while let Some(chunk) = self.next_chunk(path)? {
                    all.extend_from_slice(&chunk);
                }
                Ok(all.freeze())
            }
        }
    }
}

/// An in-memory, cursor-based reader over a file's bytes.
///
/// The contents are read exactly once, by [`open`](Self::open). Afterwards
/// every operation works on the buffer: positions run from zero to the end
/// of the [`Window`], reads past the end report end-of-data, and
/// [`mark`](Self::mark) / [`reset`](Self::reset) can revisit any earlier
/// position without limit.
///
/// [`close`](Self::close) drops the buffer and is final; reading a closed
/// stream reports [`Error::StreamClosed`].
pub struct BufferedInputStream {
    path: PathBuf,
    buf: Bytes,
    pos: usize,
    mark: usize,
    closed: bool,
}

impl BufferedInputStream {
    /// Reads the file behind `handle` into a new stream.
    ///
    /// The file must be an existing plain file. The stream reads through its
    /// own descriptor and leaves the handle's tracked descriptor alone.
    pub fn open<C>(handle: &FileHandle, window: Window, acquisition: Acquisition, completion: C) -> C::Output
    where
        C: Completion<Self>,
    {
        let path = handle.path().to_path_buf();
        let chunk_size = handle.file_system().options().chunk_size;
        completion.run(handle.file_system().dispatcher(), move || {
            let file = primitives::open(&path, OpenFlags::Read)?;
            let size = file.metadata().map_err(|e| Error::native("fstat", &path, e))?.len();
            let size_hint = usize::try_from(size).unwrap_or(0);
            let acquired = ChunkSource { file, chunk_size }.acquire(&path, acquisition, size_hint)?;
            let visible = window.bounds(acquired.len());
            event!(
                Level::DEBUG,
                path = %path.display(),
                size,
                acquired = acquired.len(),
                ?visible,
                ?acquisition,
                "stream opened"
            );
            Ok(Self::from_bytes(path, acquired.slice(visible)))
        })
    }

    fn from_bytes(path: PathBuf, buf: Bytes) -> Self {
        Self {
            path,
            buf,
            pos: 0,
            mark: 0,
            closed: false,
        }
    }

    fn count(&self) -> usize {
        self.buf.len()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed { Err(Error::StreamClosed) } else { Ok(()) }
    }

    /// The file the stream was read from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads one byte, or `None` at end-of-data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StreamClosed`] after [`close`](Self::close).
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        self.ensure_open()?;
        let byte = self.buf.get(self.pos).copied();
        if byte.is_some() {
            self.pos += 1;
        }
        Ok(byte)
    }

    /// Copies up to `len` bytes into `dst[off..off + len]`.
    ///
    /// Returns the number of bytes copied, which is zero when `len` is zero,
    /// or `None` at end-of-data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StreamClosed`] after [`close`](Self::close) and
    /// [`Error::IndexOutOfBounds`] if the range does not fit in `dst`.
    pub fn read_into(&mut self, dst: &mut [u8], off: usize, len: usize) -> Result<Option<usize>> {
        self.ensure_open()?;
        if off.checked_add(len).is_none_or(|end| end > dst.len()) {
            return Err(Error::IndexOutOfBounds {
                offset: off,
                length: len,
                capacity: dst.len(),
            });
        }
        if self.pos >= self.count() {
            return Ok(None);
        }
        let n = len.min(self.available());
        dst[off..off + n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(Some(n))
    }

    /// Remembers the current position for [`reset`](Self::reset).
    pub fn mark(&mut self) {
        self.mark = self.pos;
    }

    /// Returns to the last marked position, or to the start if nothing was
    /// marked.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StreamClosed`] after [`close`](Self::close).
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.pos = self.mark;
        Ok(())
    }

    /// Advances by up to `n` bytes without reading them and returns how far
    /// the position moved. Never moves past the end; a negative `n` moves
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StreamClosed`] after [`close`](Self::close).
    pub fn skip(&mut self, n: i64) -> Result<u64> {
        self.ensure_open()?;
        let wanted = usize::try_from(n.max(0)).unwrap_or(usize::MAX);
        let k = wanted.min(self.available());
        self.pos += k;
        Ok(k as u64)
    }

    /// Moves to `position`, clamped to the end, and returns the new position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StreamClosed`] after [`close`](Self::close).
    pub fn set_position(&mut self, position: usize) -> Result<usize> {
        self.ensure_open()?;
        self.pos = position.min(self.count());
        Ok(self.pos)
    }

    /// Bytes left before end-of-data.
    #[must_use]
    pub fn available(&self) -> usize {
        self.count() - self.pos
    }

    /// The current position, counted from the start of the window.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Drops the buffer and zeroes every cursor. Closing twice is harmless.
    pub fn close(&mut self) {
        if !self.closed {
            event!(Level::DEBUG, path = %self.path.display(), "stream closed");
        }
        self.buf = Bytes::new();
        self.pos = 0;
        self.mark = 0;
        self.closed = true;
    }
}

impl Read for BufferedInputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len();
        Ok(self.read_into(buf, 0, len)?.unwrap_or(0))
    }
}

impl Seek for BufferedInputStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => i128::from(n),
            SeekFrom::Current(n) => self.pos as i128 + i128::from(n),
            SeekFrom::End(n) => self.count() as i128 + i128::from(n),
        };
        if target < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream"));
        }
        let target = usize::try_from(target).unwrap_or(usize::MAX);
        Ok(self.set_position(target)? as u64)
    }
}

impl fmt::Debug for BufferedInputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedInputStream")
            .field("path", &self.path)
            .field("position", &self.pos)
            .field("count", &self.count())
            .field("mark", &self.mark)
            .field("closed", &self.closed)
            .finish()
    }
}
