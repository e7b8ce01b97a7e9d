// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! One operation, four completion strategies.
//!
//! Runs the same handle operations with [`Blocking`], [`BlockingCallback`],
//! [`Async`] and [`Callback`] and shows where each outcome is delivered.

use std::sync::mpsc;

use file_handle::{Async, Blocking, BlockingCallback, Callback, FileHandle, Status};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let tmp = tempfile::tempdir()?;
    let note = FileHandle::new(tmp.path().join("note.txt"))?;

    // Return value on the calling thread.
    note.write_all("written in blocking mode\n", Blocking)?;

    // Callback on the calling thread, before `append` returns.
    note.append(
        "appended in blocking-callback mode\n",
        BlockingCallback::new(|outcome: file_handle::Result<()>| println!("append: {:?}", Status::of(&outcome))),
    );

    // Future resolved by the worker pool.
    let bytes = note.read_all(Async).await?;
    print!("{}", String::from_utf8_lossy(&bytes));

    // Callback on a worker thread. Errors arrive the same way as payloads.
    let (tx, rx) = mpsc::channel();
    let missing = FileHandle::new(tmp.path().join("missing.txt"))?;
    missing.read_all(Callback::new(move |outcome: file_handle::Result<bytes::Bytes>| {
        let _ = tx.send(outcome.map(|b| b.len()));
    }));
    match rx.recv() {
        Ok(Err(error)) => println!("callback reported {} ({error})", error.kind()),
        Ok(Ok(len)) => println!("callback read {len} bytes"),
        Err(_) => println!("callback dropped"),
    }

    Ok(())
}
