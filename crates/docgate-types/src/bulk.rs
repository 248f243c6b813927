//! Incremental reader for bulk JSON arrays.
//!
//! A bulk request body is a JSON array of documents that may be far larger
//! than any single document. [`ArrayReader`] is fed the body chunk by chunk
//! and hands out one element at a time, so the memory held at any moment is
//! one element plus whatever part of the current chunk has not been read yet.
//!
//! The reader only understands array punctuation. Each element is returned
//! as raw bytes and decoded separately with [`BulkItem::decode`], which means
//! a malformed element does not stop the elements after it from being read.
//! Errors in the array structure itself (missing `[`, stray `,`, input ending
//! before `]`, data after `]`) are terminal.
//!
//! ```
//! use docgate_types::ArrayReader;
//!
//! let mut reader = ArrayReader::new();
//! reader.feed(br#"[{"datatype":"users","key":"1","data":{"n":"a"}},"#);
//! let first = reader.next_item().unwrap().unwrap();
//! assert_eq!(first.index, 0);
//! assert!(reader.next_item().unwrap().is_none());
//!
//! reader.feed(b"{}]");
//! assert!(reader.next_item().unwrap().is_some());
//! assert!(reader.finish().is_ok());
//! ```

use bytes::{Buf, Bytes, BytesMut};

use crate::codec::DocumentCodec;
use crate::doc::Doc;
use crate::error::TypeError;

/// Largest single array element accepted by default (16 MiB).
pub const DEFAULT_MAX_ITEM_SIZE: usize = 16 * 1024 * 1024;

/// One raw element of a bulk array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BulkItem {
    /// Zero-based position in the array.
    pub index: usize,
    /// The element's JSON text.
    pub raw: Bytes,
}

impl BulkItem {
    /// Decode the element as a document.
    pub fn decode(&self) -> Result<Doc, TypeError> {
        DocumentCodec::decode_doc(&self.raw)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Before the opening `[`.
    Open,
    /// Just after `[`: an element or `]`.
    First,
    /// Just after `,`: an element.
    Next,
    /// Inside an element.
    Element,
    /// After the closing `]`.
    Closed,
}

/// Pull-based splitter for a JSON array arriving in chunks.
#[derive(Debug)]
pub struct ArrayReader {
    buf: BytesMut,
    state: State,
    /// Bytes of the current element already scanned.
    scanned: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
    next_index: usize,
    max_item_size: usize,
    failure: Option<String>,
}

impl ArrayReader {
    pub fn new() -> Self {
        Self::with_max_item_size(DEFAULT_MAX_ITEM_SIZE)
    }

    pub fn with_max_item_size(max_item_size: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            state: State::Open,
            scanned: 0,
            depth: 0,
            in_string: false,
            escaped: false,
            next_index: 0,
            max_item_size,
            failure: None,
        }
    }

    /// Append the next chunk of input.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Number of elements handed out so far.
    pub fn items_read(&self) -> usize {
        self.next_index
    }

    /// Returns `true` once the closing `]` has been consumed.
    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    /// Take the next complete element.
    ///
    /// `Ok(None)` means more input is needed, or the array is closed.
    pub fn next_item(&mut self) -> Result<Option<BulkItem>, TypeError> {
        if let Some(reason) = &self.failure {
            return Err(TypeError::BulkStructure(reason.clone()));
        }

        loop {
            match self.state {
                State::Open => {
                    let Some(b) = self.skip_whitespace() else {
                        return Ok(None);
                    };
                    if b != b'[' {
                        return Err(self.fail(format!("expected '[', found {:?}", b as char)));
                    }
                    self.buf.advance(1);
                    self.state = State::First;
                }
                State::First | State::Next => {
                    let Some(b) = self.skip_whitespace() else {
                        return Ok(None);
                    };
                    match b {
                        b']' if self.state == State::First => {
                            self.buf.advance(1);
                            self.state = State::Closed;
                        }
                        b']' | b',' => {
                            return Err(self.fail(format!(
                                "unexpected {:?} where array element {} should start",
                                b as char, self.next_index
                            )));
                        }
                        _ => {
                            self.state = State::Element;
                            self.scanned = 0;
                            self.depth = 0;
                            self.in_string = false;
                            self.escaped = false;
                        }
                    }
                }
                State::Element => return self.scan_element(),
                State::Closed => {
                    if let Some(b) = self.skip_whitespace() {
                        return Err(self.fail(format!("unexpected {:?} after array", b as char)));
                    }
                    return Ok(None);
                }
            }
        }
    }

    /// Signal end of input. Fails unless the array was properly closed.
    pub fn finish(&mut self) -> Result<(), TypeError> {
        if let Some(reason) = &self.failure {
            return Err(TypeError::BulkStructure(reason.clone()));
        }
        if self.state != State::Closed {
            return Err(self.fail("unexpected end of input inside array".into()));
        }
        if let Some(b) = self.skip_whitespace() {
            return Err(self.fail(format!("unexpected {:?} after array", b as char)));
        }
        Ok(())
    }

    fn scan_element(&mut self) -> Result<Option<BulkItem>, TypeError> {
        while self.scanned < self.buf.len() {
            let b = self.buf[self.scanned];
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                }
            } else {
                match b {
                    b'"' => self.in_string = true,
                    b'{' | b'[' => self.depth += 1,
                    b'}' => self.depth = self.depth.saturating_sub(1),
                    b']' if self.depth > 0 => self.depth -= 1,
                    b',' | b']' if self.depth == 0 => {
                        if self.scanned > self.max_item_size {
                            break;
                        }
                        let raw = self.buf.split_to(self.scanned).freeze();
                        self.buf.advance(1);
                        self.scanned = 0;
                        self.state = if b == b',' { State::Next } else { State::Closed };
                        let index = self.next_index;
                        self.next_index += 1;
                        return Ok(Some(BulkItem { index, raw }));
                    }
                    _ => {}
                }
            }
            self.scanned += 1;
        }

        if self.scanned > self.max_item_size {
            return Err(self.fail(format!(
                "array element {} exceeds {} bytes",
                self.next_index, self.max_item_size
            )));
        }
        Ok(None)
    }

    /// Drop leading whitespace and peek at the next byte.
    fn skip_whitespace(&mut self) -> Option<u8> {
        let n = self
            .buf
            .iter()
            .take_while(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
            .count();
        self.buf.advance(n);
        self.buf.first().copied()
    }

    fn fail(&mut self, reason: String) -> TypeError {
        self.failure = Some(reason.clone());
        TypeError::BulkStructure(reason)
    }
}

impl Default for ArrayReader {
    fn default() -> Self {
        Self::new()
    }
}
