//! Byte-level lexer (C6): wraps a [`BlockDevice`], normalizing line
//! endings and folds as bytes are pulled off it.
//!
//! Rewriting rules (`spec.md` §4.6): any of `CR`, `LF`, `CR LF` collapses
//! to a single `LF`; a line-fold (`LF` followed by `SP`/`HT`) collapses to
//! a single space, consuming the continuation byte; two consecutive `LF`s
//! in the normalized stream mark the header/body boundary.

use crate::block_device::BlockDevice;

const RECEIVE_CHUNK: usize = 4096;

pub struct Lexer<'a> {
    device: &'a mut dyn BlockDevice,
    raw: Vec<u8>,
    raw_pos: usize,
    rewritten: Vec<u8>,
    index: usize,
    content: Vec<u8>,
}

impl<'a> Lexer<'a> {
    pub fn new(device: &'a mut dyn BlockDevice) -> Self {
        Lexer {
            device,
            raw: Vec::new(),
            raw_pos: 0,
            rewritten: Vec::new(),
            index: 0,
            content: Vec::new(),
        }
    }

    fn ensure_more_raw(&mut self) -> bool {
        let before = self.raw.len();
        if !self.device.receive(&mut self.raw, RECEIVE_CHUNK) {
            return false;
        }
        self.raw.len() > before
    }

    fn next_raw_byte(&mut self) -> Option<u8> {
        if self.raw_pos >= self.raw.len() && !self.ensure_more_raw() {
            return None;
        }
        let b = self.raw[self.raw_pos];
        self.raw_pos += 1;
        Some(b)
    }

    fn peek_raw_byte(&mut self) -> Option<u8> {
        if self.raw_pos >= self.raw.len() && !self.ensure_more_raw() {
            return None;
        }
        self.raw.get(self.raw_pos).copied()
    }

    /// Pulls bytes from the device, normalizing as described above, until
    /// the header/body boundary is found (returns `true`) or the device
    /// signals end-of-stream mid-header (returns `false`).
    pub fn fetch_header(&mut self) -> bool {
        loop {
            let raw_byte = match self.next_raw_byte() {
                Some(b) => b,
                None => return false,
            };

            let normalized = if raw_byte == b'\r' {
                if self.peek_raw_byte() == Some(b'\n') {
                    self.next_raw_byte();
                }
                b'\n'
            } else {
                raw_byte
            };

            if normalized == b'\n' {
                if matches!(self.peek_raw_byte(), Some(b' ') | Some(b'\t')) {
                    self.next_raw_byte();
                    self.rewritten.push(b' ');
                    continue;
                }

                self.rewritten.push(b'\n');
                if self.rewritten.len() >= 2
                    && self.rewritten[self.rewritten.len() - 2] == b'\n'
                {
                    return true;
                }
            } else {
                self.rewritten.push(normalized);
            }
        }
    }

    /// Reads exactly `length` further bytes from the device into the
    /// content buffer (continuing from any raw bytes already buffered
    /// past the header boundary). Returns `false` on a short read.
    pub fn fetch_content(&mut self, length: usize) -> bool {
        while self.content.len() < length {
            if self.raw_pos < self.raw.len() {
                let take = (length - self.content.len()).min(self.raw.len() - self.raw_pos);
                self.content
                    .extend_from_slice(&self.raw[self.raw_pos..self.raw_pos + take]);
                self.raw_pos += take;
            } else if !self.ensure_more_raw() {
                return false;
            }
        }
        true
    }

    pub fn header_bytes(&self) -> &[u8] {
        &self.rewritten
    }

    pub fn take_content(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.content)
    }

    /// Reads the next byte at the current position in the rewritten
    /// header buffer, advancing it. Returns `None` at the end of the
    /// buffer -- this never touches the device.
    pub fn get(&mut self) -> Option<u8> {
        let b = self.rewritten.get(self.index).copied();
        if b.is_some() {
            self.index += 1;
        }
        b
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn set_index(&mut self, i: usize) {
        self.index = i;
    }

    pub fn device_mut(&mut self) -> &mut dyn BlockDevice {
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_device::test_support::CursorDevice;

    #[test]
    fn idempotent_for_already_normalized_input() {
        let mut device = CursorDevice::new(b"GET / HTTP/1.1\nHost: x\n\nbody");
        let mut lexer = Lexer::new(&mut device);
        assert!(lexer.fetch_header());
        assert_eq!(lexer.header_bytes(), b"GET / HTTP/1.1\nHost: x\n\n");
    }

    #[test]
    fn crlf_collapses_to_lf() {
        let mut device = CursorDevice::new(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n");
        let mut lexer = Lexer::new(&mut device);
        assert!(lexer.fetch_header());
        assert_eq!(lexer.header_bytes(), b"GET / HTTP/1.1\nHost: x\n\n");
    }

    #[test]
    fn lone_cr_collapses_to_lf() {
        let mut device = CursorDevice::new(b"GET / HTTP/1.1\rHost: x\r\r");
        let mut lexer = Lexer::new(&mut device);
        assert!(lexer.fetch_header());
        assert_eq!(lexer.header_bytes(), b"GET / HTTP/1.1\nHost: x\n\n");
    }

    #[test]
    fn line_fold_becomes_single_space() {
        let mut device = CursorDevice::new(b"GET / HTTP/1.0\r\nX-Foo: a\r\n b\r\n\r\n");
        let mut lexer = Lexer::new(&mut device);
        assert!(lexer.fetch_header());
        assert_eq!(lexer.header_bytes(), b"GET / HTTP/1.0\nX-Foo: a b\n\n");
    }

    #[test]
    fn truncated_stream_mid_header_fails() {
        let mut device = CursorDevice::new(b"GET / HTTP/1.1\nHost: x\n");
        let mut lexer = Lexer::new(&mut device);
        assert!(!lexer.fetch_header());
    }

    #[test]
    fn fetch_content_reads_declared_length_across_chunks() {
        let mut device = CursorDevice::with_chunk_size(b"GET / HTTP/1.1\n\nabc", 3);
        let mut lexer = Lexer::new(&mut device);
        assert!(lexer.fetch_header());
        assert!(lexer.fetch_content(3));
        assert_eq!(lexer.take_content(), b"abc");
    }

    #[test]
    fn fetch_content_short_read_fails() {
        let mut device = CursorDevice::new(b"GET / HTTP/1.1\n\nab");
        let mut lexer = Lexer::new(&mut device);
        assert!(lexer.fetch_header());
        assert!(!lexer.fetch_content(5));
    }
}
