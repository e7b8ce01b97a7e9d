// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Reading a file through a buffered input stream.
//!
//! Loads a window of a file into memory and walks it with `read_into`,
//! `mark`, `reset` and `skip`.

use file_handle::{Acquisition, Blocking, BufferedInputStream, FileHandle, Window};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let tmp = tempfile::tempdir()?;
    let file = FileHandle::new(tmp.path().join("alphabet.txt"))?;
    file.write_all("abcdefghijklmnopqrstuvwxyz", Blocking)?;

    let mut stream = BufferedInputStream::open(&file, Window::new(2, 10), Acquisition::Accumulating, Blocking)?;
    println!("window holds {} bytes", stream.available());

    let mut head = [0_u8; 3];
    let _ = stream.read_into(&mut head, 0, 3)?;
    println!("head: {}", String::from_utf8_lossy(&head));

    stream.mark();
    let skipped = stream.skip(4)?;
    println!("skipped {skipped}, next byte {:?}", stream.read_byte()?.map(char::from));
    stream.reset()?;
    println!("after reset, next byte {:?}", stream.read_byte()?.map(char::from));

    while let Some(byte) = stream.read_byte()? {
        print!("{}", char::from(byte));
    }
    println!();

    stream.close();
    println!("read after close: {:?}", stream.read_byte().map_err(|e| e.kind()));
    Ok(())
}
