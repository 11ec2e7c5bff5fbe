//! In-memory standard streams.
//!
//! These let a caller drive the interpreter without a terminal: feed a
//! built-in's input from a buffer and collect what it prints. External
//! programs cannot share a buffer with the shell, so both adapters hand the
//! child a null handle when converted to [`Stdio`].

use std::cell::RefCell;
use std::io::{Cursor, Read, Result as IoResult, Write};
use std::process::Stdio;
use std::rc::Rc;

/// Memory-backed standard input.
pub struct MemReader {
    cursor: Cursor<Vec<u8>>,
}

impl MemReader {
    /// Create a MemReader that will read from the provided buffer.
    pub fn new(buf: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(buf),
        }
    }
}

impl From<&str> for MemReader {
    fn from(text: &str) -> Self {
        Self::new(text.as_bytes().to_vec())
    }
}

impl Read for MemReader {
    fn read(&mut self, out: &mut [u8]) -> IoResult<usize> {
        self.cursor.read(out)
    }
}

impl crate::command::Stdin for MemReader {
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::null()
    }
}

/// Shared handle to the bytes collected by a [`MemWriter`].
#[derive(Clone, Default)]
pub struct Captured(Rc<RefCell<Vec<u8>>>);

impl Captured {
    /// Everything written so far, decoded lossily.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

/// Memory-backed standard output.
#[derive(Default)]
pub struct MemWriter {
    buf: Captured,
}

impl MemWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer together with a handle for reading back what it collects.
    pub fn with_handle() -> (Self, Captured) {
        let writer = MemWriter::new();
        let handle = writer.buf.clone();
        (writer, handle)
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf.0.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

impl crate::command::Stdout for MemWriter {
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::null()
    }
}
