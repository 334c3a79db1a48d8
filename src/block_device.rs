//! The block-device interface the core consumes (§6): an abstract
//! byte-oriented connection. Grounded in the `Readable`/`Writeable` split
//! `HttpServer::handle_client` drives in `server.rs`'s teacher version,
//! collapsed into one blocking trait since this library owns no async
//! runtime of its own.

use std::io::{Read, Write};
use std::net::TcpStream;

/// A blocking byte-stream collaborator. The core never closes the
/// device; lingering close is the caller's responsibility.
pub trait BlockDevice {
    /// Appends 1..=`max_bytes` bytes to `buffer` and returns `true`, or
    /// returns `false` on orderly close or error. A `max_bytes` of zero
    /// is a no-op that returns `true` without touching `buffer`.
    fn receive(&mut self, buffer: &mut Vec<u8>, max_bytes: usize) -> bool;

    /// Sends `bytes` in full, looping internally until done or the
    /// connection breaks.
    fn send(&mut self, bytes: &[u8]) -> bool;
}

/// A convenience adapter over `std::net::TcpStream`. Not part of the
/// core's hard engineering; callers may supply any `BlockDevice`.
pub struct TcpBlockDevice {
    stream: TcpStream,
}

impl TcpBlockDevice {
    pub fn new(stream: TcpStream) -> Self {
        TcpBlockDevice { stream }
    }
}

impl BlockDevice for TcpBlockDevice {
    fn receive(&mut self, buffer: &mut Vec<u8>, max_bytes: usize) -> bool {
        if max_bytes == 0 {
            return true;
        }

        let start = buffer.len();
        buffer.resize(start + max_bytes, 0);
        match self.stream.read(&mut buffer[start..]) {
            Ok(0) => {
                buffer.truncate(start);
                false
            }
            Ok(n) => {
                buffer.truncate(start + n);
                true
            }
            Err(_) => {
                buffer.truncate(start);
                false
            }
        }
    }

    fn send(&mut self, bytes: &[u8]) -> bool {
        self.stream.write_all(bytes).is_ok()
    }
}
