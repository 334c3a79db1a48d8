//! HTTP/1.x message lexer, request parser, and concurrent request
//! demultiplexer.
//!
//! The pieces compose top to bottom: a [`block_device::BlockDevice`]
//! supplies raw bytes, [`lexer::Lexer`] normalizes line endings and folds
//! and finds the header/body boundary, [`request_parser::parse`] turns
//! the header bytes into a [`request::Request`], and a [`demux::Demux`]
//! resolves that request to a registered handler by path, method,
//! content-type, and negotiated accept-type. [`processor::RequestProcessor`]
//! drives the whole cycle for one connection and owns the per-status-code
//! error-handler overrides.

pub mod accept;
mod ascii;
pub mod block_device;
pub mod codec;
pub mod demux;
pub mod error;
pub mod header;
pub mod lexer;
pub mod method;
pub mod mime;
pub mod ordered_mime_map;
pub mod processor;
pub mod request;
pub mod request_parser;
pub mod response;
pub mod status_code;
pub mod timestamp;
pub mod trie;
pub mod uri;
pub mod uri_parser;

pub use demux::{Demux, Handle, HandlerHolder, HandlerId};
pub use error::{Error, Result};
pub use processor::{ErrorHandle, RequestProcessor};
pub use request::Request;
pub use response::Response;
pub use status_code::StatusCode;

/// Builds a fresh, empty demultiplexer (no resources registered, only the
/// builtin MIME types/subtypes from [`mime::MimeRegistries::new`]).
pub fn make_demultiplexer() -> std::sync::Arc<Demux> {
    Demux::new()
}
