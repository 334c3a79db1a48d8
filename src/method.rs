//! Request method, recognized via a trie over the 8 verbs `spec.md` §3
//! lists (the teacher's enum also carries `PATCH`; dropped here since it's
//! absent from the data model).

use crate::trie::Trie;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Connect => "CONNECT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
        }
    }
}

pub fn method_trie() -> Trie<Method> {
    let mut t = Trie::new(false);
    t.insert(b"GET", Method::Get);
    t.insert(b"HEAD", Method::Head);
    t.insert(b"POST", Method::Post);
    t.insert(b"PUT", Method::Put);
    t.insert(b"DELETE", Method::Delete);
    t.insert(b"CONNECT", Method::Connect);
    t.insert(b"OPTIONS", Method::Options);
    t.insert(b"TRACE", Method::Trace);
    t
}

impl std::convert::TryFrom<&[u8]> for Method {
    type Error = &'static str;

    fn try_from(value: &[u8]) -> std::result::Result<Self, Self::Error> {
        let t = method_trie();
        let m = t.find(value, value.len());
        if m.used_size == value.len() {
            Ok(*m.value.unwrap())
        } else {
            Err("invalid method")
        }
    }
}
