//! Read buffer with ANSI stripping and incremental pattern search.
//!
//! The buffer only holds output that no caller has consumed yet. Reads
//! consume a prefix up to the end of a match; anything after the match
//! stays for the next reader. Searches only rescan the last `search_depth`
//! bytes of what was already scanned, so large outputs (full BGP tables,
//! `show running-config`) are not searched quadratically.

use std::fmt;

use bytes::BytesMut;
use regex::bytes::Regex;

/// Buffer of unconsumed device output.
pub struct PatternBuffer {
    /// Unconsumed, ANSI-stripped output.
    buffer: BytesMut,

    /// How many already-scanned bytes are searched again on the next pass.
    search_depth: usize,

    /// Escape sequence parser; keeps state across chunk boundaries.
    parser: vte::Parser,
}

/// Collects printable text and line control bytes, drops escape sequences.
struct Stripper<'a> {
    out: &'a mut BytesMut,
}

impl vte::Perform for Stripper<'_> {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.out.extend_from_slice(&[byte]);
        }
    }
}

impl PatternBuffer {
    /// Create a new pattern buffer with the specified search depth.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            search_depth,
            parser: vte::Parser::new(),
        }
    }

    /// Extend the buffer with new data, stripping ANSI escape codes.
    pub fn extend(&mut self, data: &[u8]) {
        let mut stripper = Stripper {
            out: &mut self.buffer,
        };
        self.parser.advance(&mut stripper, data);
    }

    /// Find the first match of `pattern` that could involve bytes beyond
    /// `scanned`.
    ///
    /// The search restarts `search_depth` bytes before `scanned`, rounded
    /// back to a line start so `^` anchors stay meaningful. Returns
    /// absolute `(start, end)` offsets.
    pub fn search_from(&self, pattern: &Regex, scanned: usize) -> Option<(usize, usize)> {
        let start = self.region_start(scanned);
        pattern
            .find(&self.buffer[start..])
            .map(|m| (start + m.start(), start + m.end()))
    }

    /// Find the first occurrence of a literal, same region rules as
    /// [`search_from`](Self::search_from). Returns the end offset.
    pub fn find_literal(&self, needle: &[u8], scanned: usize) -> Option<usize> {
        let start = self.region_start(scanned.saturating_sub(needle.len()));
        memchr::memmem::find(&self.buffer[start..], needle).map(|pos| start + pos + needle.len())
    }

    fn region_start(&self, scanned: usize) -> usize {
        let floor = scanned.min(self.buffer.len()).saturating_sub(self.search_depth);
        if floor == 0 {
            return 0;
        }
        memchr::memrchr(b'\n', &self.buffer[..floor]).map_or(0, |nl| nl + 1)
    }

    /// Consume and return the first `at` bytes.
    pub fn split_to(&mut self, at: usize) -> Vec<u8> {
        self.buffer.split_to(at.min(self.buffer.len())).to_vec()
    }

    /// Take ownership of the buffer contents and reset.
    pub fn take(&mut self) -> Vec<u8> {
        self.buffer.split().to_vec()
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl fmt::Debug for PatternBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternBuffer")
            .field("len", &self.buffer.len())
            .field("search_depth", &self.search_depth)
            .finish()
    }
}
