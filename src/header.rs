//! Header name constants and the case-insensitive header map (§3, §4.7).

use std::collections::HashMap;

use crate::ascii::to_lowercase;

pub const CONTENT_LENGTH: &[u8] = b"content-length";
pub const CONTENT_TYPE: &[u8] = b"content-type";
pub const CONTENT_MD5: &[u8] = b"content-md5";
pub const DATE: &[u8] = b"date";
pub const CONNECTION: &[u8] = b"connection";
pub const EXPECT: &[u8] = b"expect";
pub const FROM: &[u8] = b"from";
pub const REFERER: &[u8] = b"referer";
pub const USER_AGENT: &[u8] = b"user-agent";
pub const ACCEPT: &[u8] = b"accept";

/// Header name → value, repeated headers joined with `, ` in arrival
/// order. Lookups lowercase the queried name so callers never have to.
#[derive(Debug, Default, Clone)]
pub struct HeaderMap {
    values: HashMap<Vec<u8>, Vec<u8>>,
}

impl HeaderMap {
    pub fn new() -> Self {
        HeaderMap::default()
    }

    /// Adds `value` under `name`. A second call with the same name (any
    /// case) appends `, value` to the existing entry instead of
    /// overwriting it.
    pub fn append(&mut self, name: &[u8], value: &[u8]) {
        let key = to_lowercase(name).into_bytes();
        self.values
            .entry(key)
            .and_modify(|existing| {
                existing.extend_from_slice(b", ");
                existing.extend_from_slice(value);
            })
            .or_insert_with(|| value.to_vec());
    }

    pub fn get(&self, name: &[u8]) -> Option<&[u8]> {
        let key = to_lowercase(name).into_bytes();
        self.values.get(&key).map(|v| v.as_slice())
    }

    pub fn contains(&self, name: &[u8]) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.values.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
