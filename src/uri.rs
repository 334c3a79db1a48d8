//! URI data model (C5).
//!
//! The component split (scheme, userinfo, host, port, path, query,
//! fragment) and the authority-vs-path disambiguation on a doubled slash
//! are grounded in `uri::parse` in
//! `original_source/src/http/parser/utility/uri.cpp`.

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::uri_parser::parse_uri;

/// A recognized URI scheme. `Unknown` covers origin-form targets that
/// begin directly with `/` (no `scheme:` prefix).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Unknown,
    Http,
    Mailto,
}

#[derive(Debug, Clone, Default)]
pub struct Uri {
    pub scheme: Scheme,
    pub userinfo: Option<Vec<u8>>,
    pub host: Vec<u8>,
    pub port: Option<u16>,
    pub path: Vec<u8>,
    pub query: HashMap<Vec<u8>, Vec<u8>>,
    pub fragment: Vec<u8>,
}

impl Default for Scheme {
    fn default() -> Self {
        Scheme::Unknown
    }
}

impl Uri {
    pub fn has_authority(&self) -> bool {
        !self.host.is_empty() || self.userinfo.is_some() || self.port.is_some()
    }
}

impl FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_uri(s.as_bytes())
    }
}

/// Splits a query string on `&` and `=`, joining repeated keys with `,`
/// (per `spec.md` §4.5).
pub fn parse_query(data: &[u8]) -> HashMap<Vec<u8>, Vec<u8>> {
    let mut map: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();
    if data.is_empty() {
        return map;
    }

    for pair in data.split(|&b| b == b'&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = match pair.iter().position(|&b| b == b'=') {
            Some(i) => (&pair[..i], &pair[i + 1..]),
            None => (pair, &pair[pair.len()..]),
        };

        map.entry(key.to_vec())
            .and_modify(|existing| {
                existing.push(b',');
                existing.extend_from_slice(value);
            })
            .or_insert_with(|| value.to_vec());
    }

    map
}
