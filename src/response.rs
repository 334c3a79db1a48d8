//! Response writer (supplements `spec.md`, SPEC_FULL.md §4.11).

use crate::request::HttpVersion;
use crate::status_code::StatusCode;

/// A response a handler (or the processor's built-in error path) builds
/// up before it is serialized onto the wire.
#[derive(Debug, Clone)]
pub struct Response {
    pub status_code: StatusCode,
    pub reason: Option<String>,
    headers: Vec<(Vec<u8>, Vec<u8>)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status_code: StatusCode) -> Self {
        Response {
            status_code,
            reason: None,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Appends a header. Does not deduplicate by name: a handler that
    /// sets the same header twice gets both lines on the wire.
    pub fn set_header(&mut self, name: &[u8], value: &[u8]) {
        self.headers.push((name.to_vec(), value.to_vec()));
    }

    pub fn set_body(&mut self, body: Vec<u8>) {
        self.body = body;
    }

    pub fn headers(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.headers.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Writes the status line, headers, a blank line, then the body.
    /// `Content-Length` is always added or corrected to match `body`'s
    /// length -- a handler-supplied one is never trusted, matching
    /// `RequestHead::serialize` in the teacher crate's `request.rs`.
    pub fn serialize(&self, version: HttpVersion, out: &mut Vec<u8>) {
        let reason = self
            .reason
            .clone()
            .unwrap_or_else(|| self.status_code.reason().to_string());

        out.extend_from_slice(
            format!("{} {} {}\r\n", version.as_str(), self.status_code.as_u16(), reason).as_bytes(),
        );

        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case(b"content-length") {
                continue;
            }
            out.extend_from_slice(name);
            out.extend_from_slice(b": ");
            out.extend_from_slice(value);
            out.extend_from_slice(b"\r\n");
        }

        out.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status_code;

    #[test]
    fn serializes_status_line_and_body() {
        let mut res = Response::new(status_code::OK);
        res.set_body(b"hi".to_vec());
        let mut out = Vec::new();
        res.serialize(HttpVersion::Http11, &mut out);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 Ok\r\n"));
        assert!(text.contains("Content-Length: 2\r\n"));
        assert!(text.ends_with("\r\n\r\nhi"));
    }

    #[test]
    fn handler_supplied_content_length_is_overridden() {
        let mut res = Response::new(status_code::OK);
        res.set_header(b"Content-Length", b"999");
        res.set_body(b"abc".to_vec());
        let mut out = Vec::new();
        res.serialize(HttpVersion::Http11, &mut out);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Content-Length: 3\r\n"));
        assert!(!text.contains("999"));
    }
}
