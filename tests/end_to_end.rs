//! End-to-end scenarios driving [`hutznohmd::processor::RequestProcessor`]
//! over an in-memory device, matching the six walkthroughs in this
//! project's specification: a minimal GET against an unregistered
//! resource, a POST dispatched by content-type, accept negotiation by
//! insertion order, header line folding, repeated headers, and an RFC 850
//! date.
//!
//! `block_device::test_support::CursorDevice` is `#[cfg(test)]`-gated
//! inside the library crate itself, so it isn't visible here; this device
//! is the public-API equivalent, built the same way.

use std::io::{Cursor, Read};

use hutznohmd::block_device::BlockDevice;
use hutznohmd::demux::HandlerId;
use hutznohmd::method::Method;
use hutznohmd::mime::Mime;
use hutznohmd::status_code;
use hutznohmd::{make_demultiplexer, RequestProcessor};

struct MemoryDevice {
    input: Cursor<Vec<u8>>,
    pub sent: Vec<u8>,
}

impl MemoryDevice {
    fn new(input: &[u8]) -> Self {
        MemoryDevice {
            input: Cursor::new(input.to_vec()),
            sent: Vec::new(),
        }
    }
}

impl BlockDevice for MemoryDevice {
    fn receive(&mut self, buffer: &mut Vec<u8>, max_bytes: usize) -> bool {
        if max_bytes == 0 {
            return true;
        }
        let start = buffer.len();
        buffer.resize(start + max_bytes, 0);
        match self.input.read(&mut buffer[start..]) {
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
        self.sent.extend_from_slice(bytes);
        true
    }
}

fn response_text(device: &MemoryDevice) -> String {
    String::from_utf8_lossy(&device.sent).into_owned()
}

#[test]
fn minimal_get_against_unregistered_resource_yields_404() {
    let demux = make_demultiplexer();
    let processor = RequestProcessor::new(demux);

    let mut device = MemoryDevice::new(b"GET /missing HTTP/1.1\r\nHost: example.test\r\n\r\n");
    let keep_alive = processor.handle_one_request(&mut device);

    assert!(keep_alive);
    assert!(response_text(&device).starts_with("HTTP/1.1 404 Not Found\r\n"));
}

#[test]
fn post_dispatched_by_content_type_yields_200() {
    let demux = make_demultiplexer();
    let json = Mime {
        type_id: demux.register_mime_type(b"application"),
        subtype_id: demux.register_mime_subtype(b"json"),
    };

    let _handle = demux
        .connect(
            HandlerId {
                path: b"/items".to_vec(),
                method: Method::Post,
                content_type: json,
                accept_type: json,
            },
            |req, res| {
                res.set_body(req.content.clone());
                status_code::CREATED
            },
        )
        .unwrap();

    let processor = RequestProcessor::new(demux);
    let body = b"{\"ok\":true}";
    let request = format!(
        "POST /items HTTP/1.1\r\nContent-Type: application/json\r\nAccept: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        std::str::from_utf8(body).unwrap()
    );
    let mut device = MemoryDevice::new(request.as_bytes());
    processor.handle_one_request(&mut device);

    let text = response_text(&device);
    assert!(text.starts_with("HTTP/1.1 201 Created\r\n"));
    assert!(text.contains("Content-Type: application/json"));
    assert!(text.ends_with("{\"ok\":true}"));
}

#[test]
fn accept_negotiation_prefers_insertion_order_on_wildcard() {
    let demux = make_demultiplexer();
    let none = Mime::none();
    let xml = Mime {
        type_id: demux.register_mime_type(b"application"),
        subtype_id: demux.register_mime_subtype(b"xml"),
    };
    let html = Mime {
        type_id: xml.type_id,
        subtype_id: demux.register_mime_subtype(b"html"),
    };

    let _first = demux
        .connect(
            HandlerId { path: b"/doc".to_vec(), method: Method::Get, content_type: none, accept_type: xml },
            |_req, res| {
                res.set_body(b"<xml/>".to_vec());
                status_code::OK
            },
        )
        .unwrap();
    let _second = demux
        .connect(
            HandlerId { path: b"/doc".to_vec(), method: Method::Get, content_type: none, accept_type: html },
            |_req, res| {
                res.set_body(b"<html/>".to_vec());
                status_code::OK
            },
        )
        .unwrap();

    let processor = RequestProcessor::new(demux);
    let mut device = MemoryDevice::new(b"GET /doc HTTP/1.1\r\nAccept: application/*\r\n\r\n");
    processor.handle_one_request(&mut device);

    assert!(response_text(&device).ends_with("<xml/>"));
}

#[test]
fn folded_header_line_is_joined_with_a_space() {
    let demux = make_demultiplexer();
    let none = Mime::none();
    let _handle = demux
        .connect(
            HandlerId { path: b"/folded".to_vec(), method: Method::Get, content_type: none, accept_type: none },
            |req, res| {
                res.set_body(req.user_agent.clone().unwrap_or_default());
                status_code::OK
            },
        )
        .unwrap();

    let processor = RequestProcessor::new(demux);
    let mut device = MemoryDevice::new(
        b"GET /folded HTTP/1.1\r\nUser-Agent: Example\r\n Continued\r\n\r\n",
    );
    processor.handle_one_request(&mut device);

    assert!(response_text(&device).ends_with("Example Continued"));
}

#[test]
fn repeated_headers_are_comma_joined_before_dispatch() {
    let demux = make_demultiplexer();
    let none = Mime::none();
    let _handle = demux
        .connect(
            HandlerId { path: b"/allow".to_vec(), method: Method::Get, content_type: none, accept_type: none },
            |req, res| {
                let value = req.headers.get(b"allow").unwrap_or(b"").to_vec();
                res.set_body(value);
                status_code::OK
            },
        )
        .unwrap();

    let processor = RequestProcessor::new(demux);
    let mut device = MemoryDevice::new(b"GET /allow HTTP/1.1\r\nAllow: GET\r\nAllow: HEAD\r\n\r\n");
    processor.handle_one_request(&mut device);

    assert!(response_text(&device).ends_with("GET, HEAD"));
}

#[test]
fn rfc850_date_header_is_parsed_to_epoch_seconds() {
    let demux = make_demultiplexer();
    let none = Mime::none();
    let _handle = demux
        .connect(
            HandlerId { path: b"/when".to_vec(), method: Method::Get, content_type: none, accept_type: none },
            |req, res| {
                res.set_body(req.date.unwrap_or(-1).to_string().into_bytes());
                status_code::OK
            },
        )
        .unwrap();

    let processor = RequestProcessor::new(demux);
    let mut device = MemoryDevice::new(
        b"GET /when HTTP/1.1\r\nDate: Sunday, 06-Nov-94 08:49:37 GMT\r\n\r\n",
    );
    processor.handle_one_request(&mut device);

    assert!(response_text(&device).ends_with("784111777"));
}

#[test]
fn keep_alive_persists_across_requests_on_http11() {
    let demux = make_demultiplexer();
    let none = Mime::none();
    let _handle = demux
        .connect(
            HandlerId { path: b"/ping".to_vec(), method: Method::Get, content_type: none, accept_type: none },
            |_req, res| {
                res.set_body(b"pong".to_vec());
                status_code::OK
            },
        )
        .unwrap();

    let processor = RequestProcessor::new(demux);
    let mut device = MemoryDevice::new(b"GET /ping HTTP/1.1\r\n\r\n");
    assert!(processor.handle_one_request(&mut device));

    let mut closing_device = MemoryDevice::new(b"GET /ping HTTP/1.1\r\nConnection: close\r\n\r\n");
    assert!(!processor.handle_one_request(&mut closing_device));
}
