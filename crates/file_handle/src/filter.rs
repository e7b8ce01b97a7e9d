// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ffi::{OsStr, OsString};

use crate::handle::FileHandle;

/// Decides which directory entries a listing keeps.
///
/// `dir` is a handle for the directory being listed and `name` is the raw
/// entry name, exactly as the platform reports it. Any
/// `Fn(&FileHandle, &OsStr) -> bool` closure is an `EntryPredicate`.
///
/// Non-blocking listings evaluate the predicate on a worker thread, hence the
/// `Send + 'static` bound.
pub trait EntryPredicate: Send + 'static {
    /// Returns `true` to keep `name`.
    fn accept(&self, dir: &FileHandle, name: &OsStr) -> bool;
}

impl<F> EntryPredicate for F
where
    F: Fn(&FileHandle, &OsStr) -> bool + Send + 'static,
{
    fn accept(&self, dir: &FileHandle, name: &OsStr) -> bool {
        self(dir, name)
    }
}

/// Keeps every entry.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl EntryPredicate for AcceptAll {
    fn accept(&self, _dir: &FileHandle, _name: &OsStr) -> bool {
        true
    }
}

/// Keeps entries whose name ends with `suffix`.
#[derive(Clone, Debug)]
pub struct Suffix(pub String);

impl EntryPredicate for Suffix {
    fn accept(&self, _dir: &FileHandle, name: &OsStr) -> bool {
        name.to_string_lossy().ends_with(self.0.as_str())
    }
}

pub(crate) fn apply(predicate: &dyn EntryPredicate, dir: &FileHandle, names: Vec<OsString>) -> Vec<OsString> {
    names.into_iter().filter(|name| predicate.accept(dir, name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn closures_are_predicates() {
        let dir = FileHandle::new("/tmp").unwrap();
        let hidden = |_: &FileHandle, name: &OsStr| !name.to_string_lossy().starts_with('.');
        assert_eq!(apply(&hidden, &dir, names(&[".git", "src"])), names(&["src"]));
    }

    #[test]
    fn predicate_sees_the_containing_directory() {
        let dir = FileHandle::new("/var/data").unwrap();
        let only_here = |d: &FileHandle, _: &OsStr| d.path().ends_with("data");
        assert_eq!(apply(&only_here, &dir, names(&["a"])).len(), 1);
    }

    #[test]
    fn suffix_and_accept_all() {
        let dir = FileHandle::new("/tmp").unwrap();
        let all = names(&["a.log", "b.txt", "c.log"]);
        assert_eq!(apply(&Suffix(".log".into()), &dir, all.clone()), names(&["a.log", "c.log"]));
        assert_eq!(apply(&AcceptAll, &dir, all.clone()), all);
    }
}
