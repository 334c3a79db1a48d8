//! URI parser state machine.
//!
//! A direct translation of `uri::parse`/`parse_authority`/`parse_scheme` in
//! `original_source/src/http/parser/utility/uri.cpp`, including the
//! doubled-slash disambiguation between a path and an authority, and the
//! inline percent-decoding `parse_uri_word` performs while scanning each
//! component. Character classes (authority, path, query, fragment) match
//! `original_source/unittest/http/parser/utility/charactercompare.cpp`.

use crate::codec::percent::from_hex;
use crate::error::{err_msg, Result};
use crate::trie::Trie;
use crate::uri::{parse_query, Scheme, Uri};

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    fn get(&mut self) -> Option<u8> {
        if self.pos < self.data.len() {
            let b = self.data[self.pos];
            self.pos += 1;
            Some(b)
        } else {
            None
        }
    }
}

fn is_valid_uri_authority_character(c: u8) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            b':' | b'-' | b'.' | b'_' | b'~' | b'%' | b'!' | b'$' | b'&' | b'\'' | b'(' | b')'
                | b'*' | b'+' | b',' | b';' | b'=' | b'[' | b']'
        )
}

fn is_valid_uri_path_character(c: u8) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            b'-' | b'.' | b'_' | b'~' | b'%' | b'!' | b'$' | b'&' | b'\'' | b'(' | b')' | b'*'
                | b'+' | b',' | b';' | b'=' | b':' | b'/' | b'[' | b']' | b'@'
        )
}

fn is_valid_uri_query_character(c: u8) -> bool {
    is_valid_uri_path_character(c) || c == b'?'
}

fn is_valid_uri_fragment_character(c: u8) -> bool {
    is_valid_uri_query_character(c) || c == b'#'
}

fn scheme_trie() -> Trie<Scheme> {
    let mut t = Trie::new(true);
    t.insert(b"http", Scheme::Http);
    t.insert(b"mailto", Scheme::Mailto);
    t
}

/// Reads an alphabetic token starting at the byte already held in
/// `character` and looks it up in `trie`, advancing the cursor past
/// whatever the longest match consumed.
fn parse_token_via_trie<V: Clone>(
    trie: &Trie<V>,
    cursor: &mut Cursor<'_>,
    character: &mut Option<u8>,
) -> Option<V> {
    let mut buf = Vec::new();
    if let Some(c) = character {
        buf.push(*c);
    }
    let mut lookahead_pos = cursor.pos;
    while lookahead_pos < cursor.data.len() && cursor.data[lookahead_pos].is_ascii_alphabetic() {
        buf.push(cursor.data[lookahead_pos]);
        lookahead_pos += 1;
    }

    let m = trie.find(&buf, buf.len());
    if m.used_size == 0 {
        return None;
    }

    let mut advanced = 1usize.min(m.used_size);
    while advanced < m.used_size {
        cursor.pos += 1;
        advanced += 1;
    }
    *character = if cursor.pos < cursor.data.len() {
        let b = cursor.data[cursor.pos];
        cursor.pos += 1;
        Some(b)
    } else {
        cursor.pos += 1;
        None
    };

    m.value.cloned()
}

fn parse_scheme(cursor: &mut Cursor<'_>, character: &mut Option<u8>) -> Result<Scheme> {
    let trie = scheme_trie();
    parse_token_via_trie(&trie, cursor, character).ok_or_else(|| err_msg("uri: unrecognized scheme"))
}

/// Scans a URI component, decoding `%HH` escapes in place as they're
/// encountered, stopping at the first byte `is_valid` rejects.
fn parse_uri_word(
    cursor: &mut Cursor<'_>,
    character: &mut Option<u8>,
    is_valid: fn(u8) -> bool,
) -> Result<Vec<u8>> {
    let mut result = Vec::new();

    while let Some(c) = *character {
        if !is_valid(c) {
            break;
        }

        if c == b'%' {
            let a = cursor.get().ok_or_else(|| err_msg("uri: truncated percent escape"))?;
            let b = cursor.get().ok_or_else(|| err_msg("uri: truncated percent escape"))?;
            let hi = from_hex(a).ok_or_else(|| err_msg("uri: invalid percent escape"))?;
            let lo = from_hex(b).ok_or_else(|| err_msg("uri: invalid percent escape"))?;
            result.push((hi << 4) | lo);
        } else {
            result.push(c);
        }

        *character = cursor.get();
    }

    Ok(result)
}

fn parse_authority(cursor: &mut Cursor<'_>, character: &mut Option<u8>, uri: &mut Uri) -> Result<()> {
    let userinfo = parse_uri_word(cursor, character, is_valid_uri_authority_character)?;

    if *character != Some(b'@') {
        // No userinfo after all: everything scanned so far is the host.
        uri.host = userinfo;
    } else {
        uri.userinfo = Some(userinfo);
        *character = cursor.get();
        uri.host = parse_uri_word(cursor, character, is_valid_uri_authority_character)?;
    }

    if *character == Some(b':') {
        *character = cursor.get();

        let mut value: i64 = 0;
        let mut any = false;
        while let Some(b) = *character {
            if b.is_ascii_digit() {
                any = true;
                value = value * 10 + (b - b'0') as i64;
                *character = cursor.get();
            } else {
                break;
            }
        }

        if any {
            if value >= 65536 {
                return Err(err_msg("uri: port out of range"));
            }
            if value > 0 {
                uri.port = Some(value as u16);
            }
        }
    }

    Ok(())
}

/// Parses `data` as a complete URI. Fails if any byte remains unconsumed
/// after the fragment (or path/query) component stops scanning.
pub fn parse_uri(data: &[u8]) -> Result<Uri> {
    let mut cursor = Cursor::new(data);
    let mut character = cursor.get();
    let mut uri = Uri::default();

    if character != Some(b'/') {
        uri.scheme = parse_scheme(&mut cursor, &mut character)?;
        if character != Some(b':') {
            return Err(err_msg("uri: expected ':' after scheme"));
        }
        character = cursor.get();
    }

    let mut path = Vec::new();
    if character == Some(b'/') {
        let last_character = character;
        path.push(b'/');
        character = cursor.get();

        if last_character == Some(b'/') && character == Some(b'/') {
            // Not a path after all: it's an authority.
            path.clear();
            character = cursor.get();
            parse_authority(&mut cursor, &mut character, &mut uri)?;
        }
    }

    if character != Some(b'?') && character != Some(b'#') {
        let tail = parse_uri_word(&mut cursor, &mut character, is_valid_uri_path_character)?;
        path.extend(tail);
    }
    uri.path = path;

    if character == Some(b'?') {
        character = cursor.get();
        let q = parse_uri_word(&mut cursor, &mut character, is_valid_uri_query_character)?;
        uri.query = parse_query(&q);
    }

    if character == Some(b'#') {
        character = cursor.get();
        uri.fragment = parse_uri_word(&mut cursor, &mut character, is_valid_uri_fragment_character)?;
    }

    if character.is_some() {
        return Err(err_msg("uri: trailing data after uri"));
    }

    Ok(uri)
}
