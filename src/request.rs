//! Parsed request data model (§3).

use crate::accept::AcceptPattern;
use crate::header::HeaderMap;
use crate::method::Method;
use crate::mime::Mime;
use crate::uri::Uri;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http10,
    Http11,
}

impl HttpVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVersion::Http10 => "HTTP/1.0",
            HttpVersion::Http11 => "HTTP/1.1",
        }
    }

    /// The connection mode a version implies when no `Connection` header
    /// is present: HTTP/1.0 defaults to close, HTTP/1.1 to keep-alive.
    pub fn default_connection(&self) -> ConnectionOption {
        match self {
            HttpVersion::Http10 => ConnectionOption::Close,
            HttpVersion::Http11 => ConnectionOption::KeepAlive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOption {
    Close,
    KeepAlive,
}

/// A fully parsed HTTP/1.x request (§3). Owns its header/content buffers;
/// lifetime is the request cycle.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub version: HttpVersion,
    pub uri: Uri,
    pub headers: HeaderMap,

    pub content_length: Option<u64>,
    pub content_type: Option<Mime>,
    pub content_md5: Option<[u8; 16]>,
    pub date: Option<i64>,
    pub connection: ConnectionOption,
    pub expect_continue: bool,
    pub from: Option<Vec<u8>>,
    pub referer: Option<Vec<u8>>,
    pub user_agent: Option<Vec<u8>>,

    pub accept: Vec<AcceptPattern>,
    pub content: Vec<u8>,
}
