// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
#![allow(clippy::missing_panics_doc, reason = "Tests")]
#![allow(clippy::missing_errors_doc, reason = "Tests")]
#![allow(unused_results, reason = "Tests")]
#![allow(missing_docs, reason = "Tests")]
#![allow(clippy::assertions_on_result_states, reason = "Tests use assert!(x.is_err()) for clarity")]
#![allow(clippy::std_instead_of_core, reason = "Tests prefer std imports")]

use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::sync::mpsc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use file_handle::{
    AccessMode, Async, Blocking, BlockingCallback, Callback, Contents, EntityKind, ErrorKind, FileHandle, FileSystem,
    OpenFlags, Options, Result, Status, Suffix, WatchEvent, WatchPolicy,
};
use tempfile::TempDir;

const PATIENCE: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn setup() -> (TempDir, FileSystem) {
    let tmp = TempDir::new().unwrap();
    let fs = FileSystem::with_options(Options::new().max_threads(2).watch_interval(Duration::from_millis(20)));
    (tmp, fs)
}

fn handle(fs: &FileSystem, tmp: &TempDir, rel: &str) -> FileHandle {
    fs.file(tmp.path().join(rel)).unwrap()
}

/// Runs an operation with a `Callback` completion and waits for the callback.
fn via_callback<T: Send + 'static>(start: impl FnOnce(Callback<Box<dyn FnOnce(Result<T>) + Send>>)) -> Result<T> {
    let (tx, rx) = mpsc::channel();
    start(Callback(Box::new(move |outcome| {
        tx.send(outcome).unwrap();
    })));
    rx.recv_timeout(PATIENCE).unwrap()
}

// ===========================================================================
// Stat family
// ===========================================================================

mod stat {
    use super::*;

    #[test]
    fn type_checks() {
        let (tmp, fs) = setup();
        let file = handle(&fs, &tmp, "f.txt");
        file.write_all("data", Blocking).unwrap();
        let dir = handle(&fs, &tmp, "");

        assert!(file.exists(Blocking).is_ok());
        assert!(file.is_file(Blocking).is_ok());
        assert_eq!(file.is_dir(Blocking).unwrap_err().kind(), ErrorKind::NotADirectory);
        assert_eq!(dir.is_file(Blocking).unwrap_err().kind(), ErrorKind::NotAFile);
        assert_eq!(file.kind(Blocking).unwrap(), EntityKind::File);
        assert_eq!(dir.kind(Blocking).unwrap(), EntityKind::Dir);
        assert_eq!(file.stat(Blocking).unwrap().len(), 4);
    }

    #[test]
    fn missing_path() {
        let (tmp, fs) = setup();
        let missing = handle(&fs, &tmp, "missing");
        assert_eq!(missing.exists(Blocking).unwrap_err().kind(), ErrorKind::FileNotFound);
        assert_eq!(missing.stat(Blocking).unwrap_err().kind(), ErrorKind::StatTargetNotFound);
        assert_eq!(Status::of(&missing.exists(Blocking)), Status::Error);
    }

    #[cfg(unix)]
    #[test]
    fn lstat_sees_the_link() {
        let (tmp, fs) = setup();
        std::fs::create_dir(tmp.path().join("target")).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("target"), tmp.path().join("link")).unwrap();
        let link = handle(&fs, &tmp, "link");
        assert!(link.stat(Blocking).unwrap().is_dir());
        assert!(link.lstat(Blocking).unwrap().file_type().is_symlink());
    }

    #[cfg(unix)]
    #[test]
    fn access_checks_permissions() {
        let (tmp, fs) = setup();
        let file = handle(&fs, &tmp, "f");
        file.write_all("x", Blocking).unwrap();
        assert!(file.access(AccessMode::READ | AccessMode::WRITE, Blocking).is_ok());
        assert!(file.access(AccessMode::EXECUTE, Blocking).is_err());
        assert_eq!(
            handle(&fs, &tmp, "nope").access(AccessMode::EXISTS, Blocking).unwrap_err().kind(),
            ErrorKind::FileNotFound
        );
    }
}

// ===========================================================================
// Descriptor
// ===========================================================================

mod descriptor {
    use super::*;

    #[test]
    fn open_write_read_close() {
        let (tmp, fs) = setup();
        let file = handle(&fs, &tmp, "data.bin");
        file.open(OpenFlags::WriteRead, Blocking).unwrap();
        assert!(file.is_open());

        assert_eq!(file.write(Some(0), "hello world", Blocking).unwrap(), 11);
        file.sync(Blocking).unwrap();
        assert_eq!(file.read(6, 5, Blocking).unwrap(), Bytes::from_static(b"world"));
        assert_eq!(file.read(9, 100, Blocking).unwrap(), Bytes::from_static(b"ld"));

        file.close(Blocking).unwrap();
        assert!(!file.is_open());
    }

    #[tokio::test]
    async fn oversized_read_returns_what_is_there() {
        let (tmp, fs) = setup();
        let file = handle(&fs, &tmp, "small");
        file.write_all("hello", Blocking).unwrap();
        file.open(OpenFlags::Read, Blocking).unwrap();
        let hello = Bytes::from_static(b"hello");

        assert_eq!(file.read(0, usize::MAX, Blocking).unwrap(), hello);
        assert_eq!(file.read(0, usize::MAX, Async).await.unwrap(), hello);
        let outcome: Result<Bytes> = via_callback(|cb| file.read(0, usize::MAX, cb));
        assert_eq!(outcome.unwrap(), hello);
        let mut delivered = None;
        file.read(3, usize::MAX, BlockingCallback::new(|r: Result<Bytes>| delivered = Some(r)));
        assert_eq!(delivered.unwrap().unwrap(), Bytes::from_static(b"lo"));
    }

    #[test]
    fn close_twice_reports_not_open_both_times() {
        let (tmp, fs) = setup();
        let file = handle(&fs, &tmp, "f");
        file.write_all("x", Blocking).unwrap();
        file.open(OpenFlags::Read, Blocking).unwrap();
        file.close(Blocking).unwrap();
        assert_eq!(file.close(Blocking).unwrap_err().kind(), ErrorKind::FileNotOpen);
        assert_eq!(file.close(Blocking).unwrap_err().kind(), ErrorKind::FileNotOpen);
    }

    #[test]
    fn read_flags_require_existing_file() {
        let (tmp, fs) = setup();
        let missing = handle(&fs, &tmp, "missing");
        for flags in [OpenFlags::Read, OpenFlags::ReadWrite, OpenFlags::Append, OpenFlags::AppendRead] {
            assert_eq!(missing.open(flags, Blocking).unwrap_err().kind(), ErrorKind::FileNotFound);
        }
        let dir = handle(&fs, &tmp, "");
        assert_eq!(dir.open(OpenFlags::Read, Blocking).unwrap_err().kind(), ErrorKind::NotAFile);
        assert!(!missing.is_open());
    }

    #[test]
    fn exclusive_flags_refuse_existing_file() {
        let (tmp, fs) = setup();
        let file = handle(&fs, &tmp, "f");
        file.open(OpenFlags::WriteExclusive, Blocking).unwrap();
        assert_eq!(
            file.open(OpenFlags::WriteExclusive, Blocking).unwrap_err().kind(),
            ErrorKind::FileAlreadyExists
        );
    }

    #[test]
    fn append_writes_at_end() {
        let (tmp, fs) = setup();
        let file = handle(&fs, &tmp, "log");
        file.write_all("one\n", Blocking).unwrap();
        file.open(OpenFlags::Append, Blocking).unwrap();
        file.write(None, "two\n", Blocking).unwrap();
        file.close(Blocking).unwrap();
        assert_eq!(file.read_all(Blocking).unwrap(), Bytes::from_static(b"one\ntwo\n"));
    }

    #[test]
    fn reopen_replaces_descriptor() {
        let (tmp, fs) = setup();
        let file = handle(&fs, &tmp, "f");
        file.write_all("abc", Blocking).unwrap();
        file.open(OpenFlags::Read, Blocking).unwrap();
        file.open(OpenFlags::ReadWrite, Blocking).unwrap();
        assert_eq!(file.write(Some(0), "X", Blocking).unwrap(), 1);
        file.close(Blocking).unwrap();
        assert_eq!(file.close(Blocking).unwrap_err().kind(), ErrorKind::FileNotOpen);
    }
}

// ===========================================================================
// Path operations
// ===========================================================================

mod path_ops {
    use super::*;

    #[test]
    fn rename_and_copy() {
        let (tmp, fs) = setup();
        let a = handle(&fs, &tmp, "a");
        a.write_all("payload", Blocking).unwrap();

        assert_eq!(a.copy_to(tmp.path().join("b"), Blocking).unwrap(), 7);
        a.rename(tmp.path().join("c"), Blocking).unwrap();

        assert_eq!(a.exists(Blocking).unwrap_err().kind(), ErrorKind::FileNotFound);
        assert_eq!(handle(&fs, &tmp, "c").read_all(Blocking).unwrap(), Bytes::from_static(b"payload"));
        assert_eq!(a.rename(tmp.path().join("d"), Blocking).unwrap_err().kind(), ErrorKind::SourceNotFound);
        assert_eq!(a.rename("", Blocking).unwrap_err().kind(), ErrorKind::SourceNotFound);
    }

    #[test]
    fn mkdir_unlink_rmdir_remove() {
        let (tmp, fs) = setup();
        let dir = handle(&fs, &tmp, "d");
        dir.mkdir(Blocking).unwrap();
        assert_eq!(dir.mkdir(Blocking).unwrap_err().kind(), ErrorKind::FileAlreadyExists);

        let file = dir.child("f").unwrap();
        file.create_file(Blocking).unwrap();
        assert_eq!(file.create_file(Blocking).unwrap_err().kind(), ErrorKind::FileAlreadyExists);
        file.unlink(Blocking).unwrap();
        dir.rmdir(Blocking).unwrap();

        dir.mkdir(Blocking).unwrap();
        dir.remove(EntityKind::Dir, Blocking).unwrap();
        file.parent().unwrap().mkdir(Blocking).unwrap();
        file.write_all("x", Blocking).unwrap();
        file.remove(EntityKind::File, Blocking).unwrap();
        assert!(file.exists(Blocking).is_err());
    }

    #[test]
    fn truncate_and_utimes() {
        let (tmp, fs) = setup();
        let file = handle(&fs, &tmp, "t");
        file.write_all("0123456789", Blocking).unwrap();
        file.truncate(4, Blocking).unwrap();
        assert_eq!(file.read_all(Blocking).unwrap(), Bytes::from_static(b"0123"));

        let then = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000_000);
        file.utimes(then, then, Blocking).unwrap();
        assert_eq!(file.stat(Blocking).unwrap().modified().unwrap(), then);
    }

    #[test]
    fn utimes_on_a_directory() {
        let (tmp, fs) = setup();
        let dir = handle(&fs, &tmp, "d");
        dir.mkdir(Blocking).unwrap();
        let then = SystemTime::UNIX_EPOCH + Duration::from_secs(1_500_000_000);
        dir.utimes(then, then, Blocking).unwrap();
        assert_eq!(dir.stat(Blocking).unwrap().modified().unwrap(), then);
    }

    #[cfg(unix)]
    #[test]
    fn utimes_on_an_unreadable_file() {
        let (tmp, fs) = setup();
        let file = handle(&fs, &tmp, "sealed");
        file.write_all("x", Blocking).unwrap();
        file.chmod(0o000, Blocking).unwrap();
        let then = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000_000);
        file.utimes(then, then, Blocking).unwrap();
        assert_eq!(file.stat(Blocking).unwrap().modified().unwrap(), then);
    }

    #[cfg(unix)]
    #[test]
    fn mode_bits_pass_through() {
        use std::os::unix::fs::PermissionsExt;

        let (tmp, _) = setup();
        let fs = FileSystem::with_options(Options::new().dir_mode(0o700));
        let dir = fs.file(tmp.path().join("private")).unwrap();
        dir.mkdir(Blocking).unwrap();
        assert_eq!(dir.stat(Blocking).unwrap().permissions().mode() & 0o777, 0o700);

        dir.chmod(0o750, Blocking).unwrap();
        assert_eq!(dir.stat(Blocking).unwrap().permissions().mode() & 0o777, 0o750);
    }

    #[test]
    fn temp_dirs() {
        let (tmp, fs) = setup();
        let base = handle(&fs, &tmp, "");
        let made = base.create_temp_dir("job-", Blocking).unwrap();
        assert!(made.is_dir(Blocking).is_ok());
        assert!(made.name().unwrap().to_string_lossy().starts_with("job-"));
        assert_eq!(base.create_temp_dir("", Blocking).unwrap_err().kind(), ErrorKind::PrefixNotFound);
    }
}

// ===========================================================================
// Contents and listing
// ===========================================================================

mod listing {
    use super::*;

    fn populate(tmp: &TempDir) {
        for name in ["b.log", "a.txt", "c.log"] {
            std::fs::write(tmp.path().join(name), name).unwrap();
        }
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
    }

    #[test]
    fn list_is_sorted() {
        let (tmp, fs) = setup();
        populate(&tmp);
        let dir = handle(&fs, &tmp, "");
        assert_eq!(dir.list(Blocking).unwrap(), ["a.txt", "b.log", "c.log", "sub"]);
    }

    #[test]
    fn filtered_listing() {
        let (tmp, fs) = setup();
        populate(&tmp);
        let dir = handle(&fs, &tmp, "");
        assert_eq!(dir.list_filtered(Suffix(".log".into()), Blocking).unwrap(), ["b.log", "c.log"]);

        let only_dirs = |d: &FileHandle, name: &OsStr| d.path().join(name).is_dir();
        let children = dir.list_files_filtered(only_dirs, Blocking).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].path(), tmp.path().join("sub"));
    }

    #[test]
    fn list_files_wraps_children() {
        let (tmp, fs) = setup();
        populate(&tmp);
        let children = handle(&fs, &tmp, "").list_files(Blocking).unwrap();
        let names: Vec<&OsStr> = children.iter().filter_map(FileHandle::name).collect();
        assert_eq!(names, ["a.txt", "b.log", "c.log", "sub"]);
        assert_eq!(children[0].read_all(Blocking).unwrap(), Bytes::from_static(b"a.txt"));
    }

    #[test]
    fn read_contents_by_kind() {
        let (tmp, fs) = setup();
        populate(&tmp);
        let file = handle(&fs, &tmp, "a.txt");
        assert_eq!(
            file.read_contents(EntityKind::File, Blocking).unwrap(),
            Contents::Bytes(Bytes::from_static(b"a.txt"))
        );
        let Contents::Entries(entries) = handle(&fs, &tmp, "sub").read_contents(EntityKind::Dir, Blocking).unwrap() else {
            panic!("expected entries");
        };
        assert!(entries.is_empty());
    }

    #[test]
    fn listing_a_file_fails() {
        let (tmp, fs) = setup();
        populate(&tmp);
        assert!(handle(&fs, &tmp, "a.txt").list(Blocking).is_err());
    }
}

// ===========================================================================
// Completion strategies
// ===========================================================================

mod completions {
    use super::*;

    #[tokio::test]
    async fn async_matches_blocking() {
        let (tmp, fs) = setup();
        let file = handle(&fs, &tmp, "f");
        file.write_all("async", Async).await.unwrap();
        assert_eq!(file.read_all(Async).await.unwrap(), file.read_all(Blocking).unwrap());
        assert_eq!(
            handle(&fs, &tmp, "none").exists(Async).await.unwrap_err().kind(),
            ErrorKind::FileNotFound
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn async_descriptor_lifecycle() {
        let (tmp, fs) = setup();
        let file = handle(&fs, &tmp, "f");
        file.open(OpenFlags::WriteRead, Async).await.unwrap();
        assert!(file.is_open());
        file.write(Some(0), "abc", Async).await.unwrap();
        assert_eq!(file.read(1, 2, Async).await.unwrap(), Bytes::from_static(b"bc"));
        file.close(Async).await.unwrap();
        assert_eq!(file.close(Async).await.unwrap_err().kind(), ErrorKind::FileNotOpen);
    }

    #[test]
    fn callback_fires_on_a_worker_thread() {
        let (tmp, fs) = setup();
        let dir = handle(&fs, &tmp, "");
        let caller = std::thread::current().id();
        let (tx, rx) = mpsc::channel();
        dir.is_dir(Callback::new(move |outcome: Result<()>| {
            tx.send((outcome.is_ok(), std::thread::current().id())).unwrap();
        }));
        let (ok, thread) = rx.recv_timeout(PATIENCE).unwrap();
        assert!(ok);
        assert_ne!(thread, caller);
    }

    #[test]
    fn dropped_pending_still_runs() {
        let (tmp, _) = setup();
        let fs = FileSystem::with_options(Options::new().max_threads(1));
        let file = fs.file(tmp.path().join("doomed")).unwrap();
        file.write_all("x", Blocking).unwrap();

        // Occupy the only worker so the unlink is still queued when its future is dropped.
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        file.exists(Callback::new(move |_: Result<()>| {
            let _ = gate_rx.recv();
        }));
        drop(file.unlink(Async));
        gate_tx.send(()).unwrap();

        let deadline = std::time::Instant::now() + PATIENCE;
        while tmp.path().join("doomed").exists() {
            assert!(std::time::Instant::now() < deadline, "unlink never ran");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn callback_reports_failures() {
        let (tmp, fs) = setup();
        let missing = handle(&fs, &tmp, "missing");
        let outcome: Result<Bytes> = via_callback(|cb| missing.read_all(cb));
        assert_eq!(outcome.unwrap_err().kind(), ErrorKind::FileNotFound);
    }

    #[test]
    fn blocking_callback_runs_before_return() {
        let (tmp, fs) = setup();
        let file = handle(&fs, &tmp, "f");
        let mut delivered = Vec::new();
        file.write_all("x", BlockingCallback::new(|r: Result<()>| delivered.push(Status::of(&r))));
        file.unlink(BlockingCallback::new(|r: Result<()>| delivered.push(Status::of(&r))));
        file.unlink(BlockingCallback::new(|r: Result<()>| delivered.push(Status::of(&r))));
        assert_eq!(delivered, [Status::Success, Status::Success, Status::Error]);
    }

    #[test]
    fn precondition_failures_use_the_strategy() {
        let (tmp, fs) = setup();
        let file = handle(&fs, &tmp, "f");
        let outcome: Result<()> = via_callback(|cb| file.sync(cb));
        assert_eq!(outcome.unwrap_err().kind(), ErrorKind::FileDescriptorNotFound);
    }
}

// ===========================================================================
// Watch
// ===========================================================================

mod watch {
    use super::*;

    #[test]
    fn watch_reports_changes_until_unwatched() {
        let (tmp, fs) = setup();
        let file = handle(&fs, &tmp, "w");
        file.write_all("1", Blocking).unwrap();

        let (tx, rx) = mpsc::channel();
        file.watch(
            move |_: &Path, event| {
                let _ = tx.send(event);
            },
            WatchPolicy::Keep,
        )
        .unwrap();
        assert!(file.is_watched());

        file.write_all("22", Blocking).unwrap();
        assert_eq!(rx.recv_timeout(PATIENCE).unwrap(), WatchEvent::Changed);

        assert!(file.unwatch());
        assert!(!file.unwatch());
        assert!(file.exists(Blocking).is_ok());
    }

    #[test]
    fn delete_on_cancel_destroys_tree() {
        let (tmp, fs) = setup();
        let dir = handle(&fs, &tmp, "scratch");
        dir.child("a/b").unwrap().mkdirs(Blocking).unwrap();
        dir.child("a/b/f").unwrap().write_all("x", Blocking).unwrap();

        dir.watch(|_: &Path, _| {}, WatchPolicy::DeleteOnCancel).unwrap();
        assert!(dir.unwatch());
        assert_eq!(dir.exists(Blocking).unwrap_err().kind(), ErrorKind::FileNotFound);
    }

    #[test]
    fn second_watch_replaces_first_without_its_policy() {
        let (tmp, fs) = setup();
        let file = handle(&fs, &tmp, "keep");
        file.write_all("x", Blocking).unwrap();

        file.watch(|_: &Path, _| {}, WatchPolicy::DeleteOnCancel).unwrap();
        file.watch(|_: &Path, _| {}, WatchPolicy::Keep).unwrap();
        assert!(file.exists(Blocking).is_ok());

        assert!(file.unwatch());
        assert!(file.exists(Blocking).is_ok());
    }

    #[test]
    fn owned_subscription_cancels() {
        let (tmp, fs) = setup();
        let file = handle(&fs, &tmp, "s");
        file.write_all("x", Blocking).unwrap();
        let mut sub = file.subscribe(|_: &Path, _| {}).unwrap();
        assert!(sub.is_active());
        assert!(!file.is_watched());
        sub.cancel();
        assert!(!sub.is_active());
    }
}

// ===========================================================================
// Construction
// ===========================================================================

#[test]
fn relative_paths_resolve_against_cwd() {
    let cwd = std::env::current_dir().unwrap();
    let h = FileHandle::new("some/./nested/../file").unwrap();
    assert_eq!(h.path(), cwd.join("some/file"));
    assert_eq!(h.name(), Some(OsString::from("file").as_os_str()));
}

#[test]
fn destroy_removes_files_and_trees() {
    let (tmp, fs) = setup();
    let file = handle(&fs, &tmp, "f");
    file.write_all("x", Blocking).unwrap();
    file.destroy();
    assert!(file.exists(Blocking).is_err());

    let tree = handle(&fs, &tmp, "t");
    tree.child("x/y").unwrap().mkdirs(Blocking).unwrap();
    tree.destroy();
    assert!(tree.exists(Blocking).is_err());
}

#[test]
fn destroy_detached_eventually_removes() {
    let (tmp, fs) = setup();
    let tree = handle(&fs, &tmp, "later");
    tree.child("deep/er").unwrap().mkdirs(Blocking).unwrap();
    tree.destroy_detached();

    let deadline = std::time::Instant::now() + PATIENCE;
    while tree.exists(Blocking).is_ok() {
        assert!(std::time::Instant::now() < deadline, "tree still present");
        std::thread::sleep(Duration::from_millis(10));
    }
}
