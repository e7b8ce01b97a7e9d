// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Resolves `path` against `base` and folds `.` and `..` lexically.
///
/// An absolute `path` ignores `base`. The result is always absolute as long
/// as `base` is; `..` at the root stays at the root.
///
/// # Limitations
///
/// Symbolic links are not resolved. `link/..` folds to the directory that
/// contains `link`, not to the parent of the link target.
pub fn resolve(base: &Path, path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(Error::SourceNotFound("a path is required".to_owned()));
    }

    let joined = base.join(path);
    let mut result = PathBuf::with_capacity(joined.as_os_str().len());

    for component in joined.components() {
        match component {
            Component::Prefix(p) => result.push(p.as_os_str()),
            Component::RootDir => result.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                // Popping never removes the root or prefix.
                if result.parent().is_some() {
                    let _ = result.pop();
                }
            }
            Component::Normal(c) => result.push(c),
        }
    }

    Ok(result)
}

/// Resolves `path` against the process working directory.
pub fn absolute(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    if path.is_absolute() {
        return resolve(Path::new(""), path);
    }
    let cwd = std::env::current_dir().map_err(|e| Error::native("getcwd", path, e))?;
    resolve(&cwd, path)
}

/// Returns every ancestor of `path` from the outermost to `path` itself,
/// skipping the bare root.
pub fn ancestor_chain(path: &Path) -> Vec<PathBuf> {
    let mut chain: Vec<PathBuf> = path
        .ancestors()
        .filter(|a| !a.as_os_str().is_empty() && a.parent().is_some())
        .map(Path::to_path_buf)
        .collect();
    chain.reverse();
    chain
}
