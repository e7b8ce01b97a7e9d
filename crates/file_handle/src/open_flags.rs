// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt;
use core::str::FromStr;
use std::io;

use crate::error::Error;

/// The mode a [`FileHandle`](crate::FileHandle) opens its descriptor with.
///
/// Parsed from the conventional flag strings:
///
/// | Flag | Meaning |
/// |------|---------|
/// | `r`   | read; the file must exist |
/// | `r+`  | read and write; the file must exist |
/// | `rs`  | read with synchronous I/O; the file must exist |
/// | `rs+` | read and write with synchronous I/O; the file must exist |
/// | `w`   | write; create or truncate |
/// | `wx`  | write; fail if the file exists |
/// | `w+`  | read and write; create or truncate |
/// | `wx+` | read and write; fail if the file exists |
/// | `a`   | append; create if missing |
/// | `ax`  | append; fail if the file exists |
/// | `a+`  | read and append; create if missing |
/// | `ax+` | read and append; fail if the file exists |
///
/// ```
/// use file_handle::OpenFlags;
///
/// let flags: OpenFlags = "a+".parse().unwrap();
/// assert_eq!(flags, OpenFlags::AppendRead);
/// assert_eq!(flags.as_str(), "a+");
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OpenFlags {
    /// `r`
    Read,
    /// `r+`
    ReadWrite,
    /// `rs`
    ReadSync,
    /// `rs+`
    ReadWriteSync,
    /// `w`
    Write,
    /// `wx`
    WriteExclusive,
    /// `w+`
    WriteRead,
    /// `wx+`
    WriteReadExclusive,
    /// `a`
    Append,
    /// `ax`
    AppendExclusive,
    /// `a+`
    AppendRead,
    /// `ax+`
    AppendReadExclusive,
}

impl OpenFlags {
    /// Returns the flag string this value was parsed from.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "r",
            Self::ReadWrite => "r+",
            Self::ReadSync => "rs",
            Self::ReadWriteSync => "rs+",
            Self::Write => "w",
            Self::WriteExclusive => "wx",
            Self::WriteRead => "w+",
            Self::WriteReadExclusive => "wx+",
            Self::Append => "a",
            Self::AppendExclusive => "ax",
            Self::AppendRead => "a+",
            Self::AppendReadExclusive => "ax+",
        }
    }

    /// Whether opening requires the path to already denote a plain file.
    #[must_use]
    pub const fn requires_existing_file(self) -> bool {
        matches!(
            self,
            Self::Read | Self::ReadWrite | Self::ReadSync | Self::ReadWriteSync | Self::Append | Self::AppendRead
        )
    }

    /// Whether the opened descriptor is readable.
    #[must_use]
    pub const fn readable(self) -> bool {
        !matches!(self, Self::Write | Self::WriteExclusive | Self::Append | Self::AppendExclusive)
    }

    /// Whether the opened descriptor is writable.
    #[must_use]
    pub const fn writable(self) -> bool {
        !matches!(self, Self::Read | Self::ReadSync)
    }

    const fn append(self) -> bool {
        matches!(
            self,
            Self::Append | Self::AppendExclusive | Self::AppendRead | Self::AppendReadExclusive
        )
    }

    const fn exclusive(self) -> bool {
        matches!(
            self,
            Self::WriteExclusive | Self::WriteReadExclusive | Self::AppendExclusive | Self::AppendReadExclusive
        )
    }

    const fn truncate(self) -> bool {
        matches!(self, Self::Write | Self::WriteRead)
    }

    const fn create(self) -> bool {
        !self.requires_existing_file() || self.append()
    }

    const fn synchronous(self) -> bool {
        matches!(self, Self::ReadSync | Self::ReadWriteSync)
    }

    /// Translates the flags into native open options.
    pub(crate) fn to_open_options(self) -> std::fs::OpenOptions {
        let mut options = std::fs::OpenOptions::new();
        let _ = options
            .read(self.readable())
            .write(self.writable() && !self.append())
            .append(self.append())
            .truncate(self.truncate())
            .create(self.create() && !self.exclusive())
            .create_new(self.exclusive());

        #[cfg(unix)]
        if self.synchronous() {
            use std::os::unix::fs::OpenOptionsExt;
            let _ = options.custom_flags(libc::O_SYNC);
        }

        options
    }
}

impl FromStr for OpenFlags {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let flags = match s {
            "r" => Self::Read,
            "r+" => Self::ReadWrite,
            "rs" => Self::ReadSync,
            "rs+" => Self::ReadWriteSync,
            "w" => Self::Write,
            "wx" => Self::WriteExclusive,
            "w+" => Self::WriteRead,
            "wx+" => Self::WriteReadExclusive,
            "a" => Self::Append,
            "ax" => Self::AppendExclusive,
            "a+" => Self::AppendRead,
            "ax+" => Self::AppendReadExclusive,
            _ => {
                return Err(Error::native(
                    "open",
                    "",
                    io::Error::new(io::ErrorKind::InvalidInput, format!("unknown open flag {s:?}")),
                ));
            }
        };
        Ok(flags)
    }
}

impl fmt::Display for OpenFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
