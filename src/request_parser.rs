//! Request parser (C7): request line + header grammar over a lexer's
//! already-rewritten header bytes.
//!
//! Grounded in the trie-dispatch shape `original_source/src/http/parser/`
//! uses for headers (recognized names get a typed sub-parser, everything
//! else falls through to `parse_custom`), adapted here into a two-pass
//! design: every header line first lands in the generic [`HeaderMap`]
//! (which already implements the comma-join-on-repeat rule from `spec.md`
//! §3), then typed fields are read back out of that map. This means a
//! header repeated with conflicting values (e.g. two different
//! `Content-Length`s) naturally fails the typed parse instead of needing
//! separate bookkeeping.

use crate::accept::{parse_accept, AcceptPattern};
use crate::ascii::{to_lowercase, trim_ows};
use crate::codec::base64::decode_base64;
use crate::header;
use crate::header::HeaderMap;
use crate::method::Method;
use crate::mime::Mime;
use crate::request::{ConnectionOption, HttpVersion, Request};
use crate::timestamp::{parse_timestamp, INVALID_TIMESTAMP};
use crate::trie::Trie;
use crate::uri::Uri;
use crate::uri_parser::parse_uri;

/// What a caller needs to resolve MIME strings while parsing a request.
/// Implemented by [`crate::demux::Demux`], which owns the registries a
/// resource registration was validated against.
pub trait MimeResolver {
    fn parse_mime(&self, data: &[u8]) -> Mime;
    fn parse_accept(&self, data: &[u8]) -> Vec<AcceptPattern>;
}

/// Carries the connection mode determined so far (if any) alongside a
/// parse failure, so the processor can honor `spec.md` §9's resolution
/// for whether a 400 response should close the connection.
#[derive(Debug)]
pub struct ParseError {
    pub message: String,
    pub connection: Option<ConnectionOption>,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

fn err(msg: &str, connection: Option<ConnectionOption>) -> ParseError {
    ParseError {
        message: msg.to_string(),
        connection,
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            self.advance();
        }
    }

    /// Reads bytes up to (not including) the next `stop` byte. Leaves the
    /// cursor positioned on `stop` itself, or at EOF if `stop` never
    /// appears.
    fn read_until(&mut self, stop: u8) -> &'a [u8] {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == stop {
                break;
            }
            self.advance();
        }
        &self.data[start..self.pos]
    }

    fn expect(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.advance();
            true
        } else {
            false
        }
    }
}

fn method_trie() -> Trie<Method> {
    crate::method::method_trie()
}

/// Parses the bytes a lexer produced for one request's header section
/// (request line + header lines + the terminating blank line) into a
/// [`Request`]. `content` is left empty; the caller fills it in after a
/// separate `fetch_content` pass.
pub fn parse(header_bytes: &[u8], resolver: &dyn MimeResolver) -> Result<Request, ParseError> {
    let mut cursor = Cursor::new(header_bytes);

    let trie = method_trie();
    let m = trie.find(&header_bytes[cursor.pos..], header_bytes.len() - cursor.pos);
    if m.used_size == 0 {
        return Err(err("unrecognized request method", None));
    }
    let method = *m.value.unwrap();
    cursor.pos += m.used_size;

    if !matches!(cursor.peek(), Some(b' ') | Some(b'\t')) {
        return Err(err("expected whitespace after method", None));
    }
    cursor.skip_spaces();

    let target_start = cursor.pos;
    while !matches!(cursor.peek(), Some(b' ') | Some(b'\t') | None) {
        cursor.advance();
    }
    let target = &header_bytes[target_start..cursor.pos];
    if target.is_empty() {
        return Err(err("empty request target", None));
    }

    let uri: Uri = if target == b"*" && method == Method::Options {
        Uri {
            path: b"*".to_vec(),
            ..Uri::default()
        }
    } else {
        parse_uri(target).map_err(|_| err("invalid request-target uri", None))?
    };

    cursor.skip_spaces();
    let version_start = cursor.pos;
    while !matches!(cursor.peek(), Some(b'\n') | None) {
        cursor.advance();
    }
    let version_token = trim_ows(&header_bytes[version_start..cursor.pos]);
    let version = match version_token {
        b"HTTP/1.0" => HttpVersion::Http10,
        b"HTTP/1.1" => HttpVersion::Http11,
        _ => return Err(err("unrecognized http version", None)),
    };
    if !cursor.expect(b'\n') {
        return Err(err(
            "missing line terminator after request line",
            Some(version.default_connection()),
        ));
    }

    let mut headers = HeaderMap::new();
    // The version, once parsed, fixes the default connection mode; from
    // here on a failure can still report it even if headers never
    // resolve an explicit `Connection` value.
    let mut connection_so_far = version.default_connection();

    loop {
        if cursor.peek() == Some(b'\n') {
            cursor.advance();
            break;
        }

        let name_start = cursor.pos;
        while !matches!(cursor.peek(), Some(b':') | Some(b'\n') | None) {
            cursor.advance();
        }
        if !cursor.expect(b':') {
            return Err(err("malformed header line", Some(connection_so_far)));
        }
        let name = to_lowercase(&header_bytes[name_start..cursor.pos - 1]);
        if name.is_empty() {
            return Err(err("empty header name", Some(connection_so_far)));
        }

        cursor.skip_spaces();
        let value = trim_ows(cursor.read_until(b'\n'));
        if !cursor.expect(b'\n') {
            return Err(err(
                "missing line terminator after header value",
                Some(connection_so_far),
            ));
        }

        headers.append(name.as_bytes(), value);

        if name.as_bytes() == header::CONNECTION {
            if let Some(c) = parse_connection(value) {
                connection_so_far = c;
            }
        }
    }

    let content_length = match headers.get(header::CONTENT_LENGTH) {
        Some(raw) => Some(
            std::str::from_utf8(raw)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or_else(|| err("invalid content-length", Some(connection_so_far)))?,
        ),
        None => None,
    };

    let content_type = headers.get(header::CONTENT_TYPE).map(|v| resolver.parse_mime(v));

    let content_md5 = match headers.get(header::CONTENT_MD5) {
        Some(raw) => {
            let decoded = decode_base64(raw)
                .ok_or_else(|| err("malformed content-md5 base64", Some(connection_so_far)))?;
            if decoded.len() != 16 {
                return Err(err("content-md5 must decode to 16 bytes", Some(connection_so_far)));
            }
            let mut bytes = [0u8; 16];
            bytes.copy_from_slice(&decoded);
            Some(bytes)
        }
        None => None,
    };

    let date = headers.get(header::DATE).and_then(|raw| {
        let ts = parse_timestamp(raw);
        if ts == INVALID_TIMESTAMP {
            None
        } else {
            Some(ts)
        }
    });

    let connection = headers
        .get(header::CONNECTION)
        .and_then(parse_connection)
        .unwrap_or_else(|| version.default_connection());

    let expect_continue = headers
        .get(header::EXPECT)
        .map(|v| trim_ows(v).eq_ignore_ascii_case(b"100-continue"))
        .unwrap_or(false);

    let from = headers.get(header::FROM).map(|v| v.to_vec());
    let referer = headers.get(header::REFERER).map(|v| v.to_vec());
    let user_agent = headers.get(header::USER_AGENT).map(|v| v.to_vec());

    let accept = headers
        .get(header::ACCEPT)
        .map(|v| resolver.parse_accept(v))
        .unwrap_or_default();

    Ok(Request {
        method,
        version,
        uri,
        headers,
        content_length,
        content_type,
        content_md5,
        date,
        connection,
        expect_continue,
        from,
        referer,
        user_agent,
        accept,
        content: Vec::new(),
    })
}

/// Recognizes `close` / `keep-alive` / `persist` (the latter folded into
/// keep-alive, per `spec.md` §6).
fn parse_connection(value: &[u8]) -> Option<ConnectionOption> {
    let mut t: Trie<ConnectionOption> = Trie::new(true);
    t.insert(b"close", ConnectionOption::Close);
    t.insert(b"keep-alive", ConnectionOption::KeepAlive);
    t.insert(b"persist", ConnectionOption::KeepAlive);

    let value = trim_ows(value);
    let m = t.find(value, value.len());
    if m.used_size == value.len() {
        m.value.copied()
    } else {
        None
    }
}
