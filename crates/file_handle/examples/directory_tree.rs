// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Building and tearing down a directory tree.
//!
//! Creates nested directories with [`FileHandle::mkdirs`], lists them with a
//! filter, and removes everything with [`FileHandle::rimraf`].

use std::ffi::OsStr;

use file_handle::{Async, Blocking, FileHandle, FileSystem, Options, Suffix};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let tmp = tempfile::tempdir()?;
    let fs = FileSystem::with_options(Options::new().max_threads(2).dir_mode(0o755));
    let root = fs.file(tmp.path().join("project"))?;

    for dir in ["src/bin", "src/util", "docs"] {
        root.child(dir)?.mkdirs(Async).await?;
    }
    // Existing chains are fine.
    root.child("src/bin")?.mkdirs(Blocking)?;

    for file in ["src/lib.rs", "src/util/mod.rs", "docs/guide.md", "docs/notes.md"] {
        root.child(file)?.write_all("// placeholder\n", Blocking)?;
    }

    let docs = root.child("docs")?;
    println!("markdown: {:?}", docs.list_filtered(Suffix(".md".into()), Blocking)?);

    let dirs_only = |dir: &FileHandle, name: &OsStr| dir.path().join(name).is_dir();
    for child in root.child("src")?.list_files_filtered(dirs_only, Async).await? {
        println!("subdirectory: {child}");
    }

    let removed = root.rimraf(Async).await?;
    println!("removed {removed} entities");
    println!("still there: {}", root.exists(Blocking).is_ok());

    Ok(())
}
