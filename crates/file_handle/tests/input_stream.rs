// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
#![allow(clippy::missing_panics_doc, reason = "Tests")]
#![allow(unused_results, reason = "Tests")]
#![allow(missing_docs, reason = "Tests")]
#![allow(clippy::std_instead_of_core, reason = "Tests prefer std imports")]

use std::io::{Read, Seek, SeekFrom};
use std::sync::mpsc;
use std::time::Duration;

use file_handle::{
    Acquisition, Async, Blocking, BufferedInputStream, Callback, ErrorKind, FileHandle, FileSystem, Options, Result,
    Window,
};
use tempfile::TempDir;

fn file_with(contents: &[u8]) -> (TempDir, FileHandle) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("f.txt");
    std::fs::write(&path, contents).unwrap();
    let fs = FileSystem::with_options(Options::new().chunk_size(4));
    let handle = fs.file(path).unwrap();
    (tmp, handle)
}

fn open(handle: &FileHandle, window: Window) -> BufferedInputStream {
    BufferedInputStream::open(handle, window, Acquisition::Accumulating, Blocking).unwrap()
}

#[test]
fn window_of_hello() {
    let (_tmp, handle) = file_with(b"hello");
    let mut stream = open(&handle, Window::new(1, 3));
    assert_eq!(stream.available(), 3);

    let mut dst = [0_u8; 3];
    assert_eq!(stream.read_into(&mut dst, 0, 3).unwrap(), Some(3));
    assert_eq!(&dst, b"ell");
    assert_eq!(stream.read_byte().unwrap(), None);
}

#[test]
fn full_file_round_trip() {
    let data: Vec<u8> = (0..=255).cycle().take(1000).collect();
    let (_tmp, handle) = file_with(&data);
    let mut stream = open(&handle, Window::full());
    assert_eq!(stream.available(), data.len());

    let mut out = Vec::new();
    let mut dst = [0_u8; 7];
    while let Some(n) = stream.read_into(&mut dst, 0, 7).unwrap() {
        out.extend_from_slice(&dst[..n]);
    }
    assert_eq!(out, data);
    assert_eq!(stream.read_into(&mut dst, 0, 7).unwrap(), None);
    assert_eq!(stream.read_byte().unwrap(), None);
}

#[test]
fn zero_offset_or_length_means_whole_file() {
    let (_tmp, handle) = file_with(b"abcdef");
    assert_eq!(open(&handle, Window::new(0, 2)).available(), 6);
    assert_eq!(open(&handle, Window::new(2, 0)).available(), 6);
    assert_eq!(open(&handle, Window::new(4, 100)).available(), 2);
}

#[test]
fn blocking_acquisition_takes_one_chunk() {
    let (_tmp, handle) = file_with(b"0123456789");
    let stream = BufferedInputStream::open(&handle, Window::full(), Acquisition::Blocking, Blocking).unwrap();
    // chunk_size is 4 in these tests.
    assert_eq!(stream.available(), 4);
}

#[test]
fn mark_reset_skip() {
    let (_tmp, handle) = file_with(b"abcdefgh");
    let mut stream = open(&handle, Window::full());
    stream.skip(2).unwrap();
    stream.mark();
    let before = stream.position();
    stream.skip(4).unwrap();
    stream.reset().unwrap();
    assert_eq!(stream.position(), before);

    assert_eq!(stream.skip(-1).unwrap(), 0);
    assert_eq!(stream.skip(100).unwrap(), 6);
    assert_eq!(stream.position(), 8);
}

#[test]
fn closed_stream() {
    let (_tmp, handle) = file_with(b"abc");
    let mut stream = open(&handle, Window::full());
    stream.close();
    assert_eq!(stream.read_byte().unwrap_err().kind(), ErrorKind::StreamClosed);
    assert_eq!(stream.available(), 0);
    assert_eq!(stream.position(), 0);

    let mut buf = [0_u8; 1];
    let err = stream.read(&mut buf).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::Other);
}

#[test]
fn out_of_range_destination() {
    let (_tmp, handle) = file_with(b"abc");
    let mut stream = open(&handle, Window::full());
    let err = stream.read_into(&mut [0_u8; 2], 1, 2).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IndexOutOfBounds);
}

#[test]
fn std_reader() {
    let (_tmp, handle) = file_with(b"line one\nline two\n");
    let mut stream = open(&handle, Window::full());
    stream.seek(SeekFrom::Start(5)).unwrap();
    let mut rest = String::new();
    stream.read_to_string(&mut rest).unwrap();
    assert_eq!(rest, "one\nline two\n");
}

#[test]
fn missing_file() {
    let tmp = TempDir::new().unwrap();
    let handle = FileHandle::new(tmp.path().join("absent")).unwrap();
    let err = BufferedInputStream::open(&handle, Window::full(), Acquisition::Accumulating, Blocking).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileNotFound);
}

#[tokio::test]
async fn async_open() {
    let (_tmp, handle) = file_with(b"async bytes");
    let mut stream = BufferedInputStream::open(&handle, Window::new(6, 5), Acquisition::Accumulating, Async)
        .await
        .unwrap();
    let mut text = String::new();
    stream.read_to_string(&mut text).unwrap();
    assert_eq!(text, "bytes");
}

#[test]
fn callback_open() {
    let (_tmp, handle) = file_with(b"xyz");
    let (tx, rx) = mpsc::channel();
    BufferedInputStream::open(
        &handle,
        Window::full(),
        Acquisition::Accumulating,
        Callback::new(move |outcome: Result<BufferedInputStream>| tx.send(outcome.map(|s| s.available())).unwrap()),
    );
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap(), 3);
}
