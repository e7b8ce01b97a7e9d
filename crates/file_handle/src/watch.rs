// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Change notification for a single path.
//!
//! A [`Subscription`] owns a background thread that samples the path's
//! existence, length and modification time every
//! [`watch_interval`](crate::Options::watch_interval) and reports differences
//! to a [`WatchListener`]. Changes that cancel out between two samples are not
//! reported.

use core::time::Duration;
use std::fmt;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::SystemTime;

use tracing::{Level, event};

use crate::error::{Error, Result};

/// What happened to a watched path between two samples.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum WatchEvent {
    /// The path appeared.
    Created,
    /// The path's length or modification time changed.
    Changed,
    /// The path disappeared.
    Removed,
}

/// Receives [`WatchEvent`]s on the subscription's thread.
///
/// Any `Fn(&Path, WatchEvent)` closure is a `WatchListener`.
pub trait WatchListener: Send + 'static {
    /// Called once per detected change.
    fn on_event(&self, path: &Path, event: WatchEvent);
}

impl<F> WatchListener for F
where
    F: Fn(&Path, WatchEvent) + Send + 'static,
{
    fn on_event(&self, path: &Path, event: WatchEvent) {
        self(path, event);
    }
}

/// What [`FileHandle::unwatch`](crate::FileHandle::unwatch) does besides
/// cancelling the subscription.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum WatchPolicy {
    /// Leave the path alone.
    #[default]
    Keep,
    /// Destroy the path (a file or a whole tree) after cancelling.
    DeleteOnCancel,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Snapshot {
    len: u64,
    modified: Option<SystemTime>,
}

impl Snapshot {
    fn take(path: &Path) -> Option<Self> {
        std::fs::metadata(path).ok().map(|m| Self {
            len: m.len(),
            modified: m.modified().ok(),
        })
    }
}

fn compare(before: Option<Snapshot>, after: Option<Snapshot>) -> Option<WatchEvent> {
    match (before, after) {
        (None, Some(_)) => Some(WatchEvent::Created),
        (Some(_), None) => Some(WatchEvent::Removed),
        (Some(a), Some(b)) if a != b => Some(WatchEvent::Changed),
        _ => None,
    }
}

/// A live change subscription.
///
/// Cancelling stops the sampling thread and waits for it to exit, so no
/// listener call happens after [`cancel`](Self::cancel) returns unless it is
/// called from the listener itself. Dropping a subscription cancels it.
pub struct Subscription {
    path: PathBuf,
    stop: Option<flume::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Subscription {
    pub(crate) fn start(path: PathBuf, interval: Duration, listener: impl WatchListener) -> Result<Self> {
        let (stop, stopped) = flume::bounded::<()>(1);
        let watched = path.clone();
        let thread = std::thread::Builder::new()
            .name("file-handle-watch".into())
            .spawn(move || {
                let mut last = Snapshot::take(&watched);
                // Any message or a dropped sender ends the loop.
                while let Err(flume::RecvTimeoutError::Timeout) = stopped.recv_timeout(interval) {
                    let current = Snapshot::take(&watched);
                    if let Some(change) = compare(last, current) {
                        listener.on_event(&watched, change);
                    }
                    last = current;
                }
            })
            .map_err(|e| Error::native("watch", &path, e))?;

        event!(Level::DEBUG, path = %path.display(), "watch started");
        Ok(Self {
            path,
            stop: Some(stop),
            thread: Some(thread),
        })
    }

    /// The watched path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the subscription has not been cancelled yet.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.stop.is_some()
    }

    /// Stops watching. Calling this more than once has no further effect.
    pub fn cancel(&mut self) {
        let Some(stop) = self.stop.take() else {
            return;
        };
        drop(stop);
        if let Some(thread) = self.thread.take()
            && thread.thread().id() != std::thread::current().id()
        {
            let _ = thread.join();
        }
        event!(Level::DEBUG, path = %self.path.display(), "watch cancelled");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("path", &self.path)
            .field("active", &self.is_active())
            .finish()
    }
}
