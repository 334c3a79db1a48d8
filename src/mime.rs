//! MIME media-type registry (C4).
//!
//! Grounded in `mime_data` from
//! `original_source/libhutzohmd/src/request/mime_data.hpp`: a trie maps
//! registered tokens to small integer tags, a reverse map recovers the
//! token for unregistration, and `WILDCARD` is pre-registered as `"*"`
//! ahead of any caller-supplied token.

use std::collections::HashMap;

use crate::trie::Trie;

pub type MimeId = u32;

pub const INVALID: MimeId = 0;
pub const NONE: MimeId = 1;
pub const WILDCARD: MimeId = 2;

const FIRST_FREE_VALUE: MimeId = 3;

/// One `mime_data` instance: either the type half or the subtype half of a
/// [`MimeRegistries`].
pub struct MimeRegistry {
    next_value: MimeId,
    registered: HashMap<MimeId, Vec<u8>>,
    tokens: Trie<MimeId>,
}

impl MimeRegistry {
    fn new() -> Self {
        let mut registry = MimeRegistry {
            next_value: FIRST_FREE_VALUE,
            registered: HashMap::new(),
            tokens: Trie::new(true),
        };
        let wildcard = registry.register(b"*");
        debug_assert_eq!(wildcard, WILDCARD);
        registry
    }

    /// Registers `token`, returning its tag. A token already registered
    /// returns the tag it was originally assigned rather than failing.
    /// An empty token returns [`INVALID`].
    pub fn register(&mut self, token: &[u8]) -> MimeId {
        if token.is_empty() {
            return INVALID;
        }
        if let Some(existing) = self.lookup_exact(token) {
            return existing;
        }

        let value = self.next_value;
        if self.tokens.insert(token, value) {
            self.next_value += 1;
            self.registered.insert(value, token.to_vec());
            value
        } else {
            INVALID
        }
    }

    /// Unregisters `id`. Returns `false` if `id` was never registered
    /// through this instance.
    pub fn unregister(&mut self, id: MimeId) -> bool {
        match self.registered.remove(&id) {
            Some(token) => self.tokens.erase(&token),
            None => false,
        }
    }

    /// Looks up `data` for an exact, whole-slice match. A partial match
    /// (the trie recognizes only a prefix of `data`) counts as no match,
    /// per the registry's `parse` semantics.
    pub fn parse(&self, data: &[u8]) -> MimeId {
        let m = self.tokens.find(data, data.len());
        if m.used_size == data.len() {
            *m.value.unwrap_or(&INVALID)
        } else {
            INVALID
        }
    }

    pub fn is_registered(&self, id: MimeId) -> bool {
        self.registered.contains_key(&id)
    }

    pub fn name_of(&self, id: MimeId) -> Option<&[u8]> {
        self.registered.get(&id).map(|v| v.as_slice())
    }

    fn lookup_exact(&self, token: &[u8]) -> Option<MimeId> {
        let m = self.tokens.find(token, token.len());
        if m.used_size == token.len() {
            m.value.copied()
        } else {
            None
        }
    }
}

/// A parsed `type/subtype` pair. Either half may be [`WILDCARD`]; a failed
/// parse carries [`INVALID`] in both halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mime {
    pub type_id: MimeId,
    pub subtype_id: MimeId,
}

impl Mime {
    pub fn invalid() -> Self {
        Mime { type_id: INVALID, subtype_id: INVALID }
    }

    /// The "unset" value: a resource or registration with no
    /// content-type restriction. Distinct from [`Mime::invalid`], which
    /// marks a parse failure.
    pub fn none() -> Self {
        Mime { type_id: NONE, subtype_id: NONE }
    }

    pub fn is_wildcard(&self) -> bool {
        self.type_id == WILDCARD || self.subtype_id == WILDCARD
    }

    pub fn is_valid(&self) -> bool {
        self.type_id != INVALID && self.subtype_id != INVALID
    }

    /// The invariant from `spec.md` §3: `type_id == NONE` iff
    /// `subtype_id == NONE`.
    pub fn is_fully_set_or_unset(&self) -> bool {
        (self.type_id == NONE) == (self.subtype_id == NONE)
    }
}

impl Default for Mime {
    fn default() -> Self {
        Mime::none()
    }
}

/// The pair of registries (type, subtype) a demultiplexer shares across
/// every resource it serves.
pub struct MimeRegistries {
    pub types: MimeRegistry,
    pub subtypes: MimeRegistry,
}

const BUILTIN_TYPES: &[&[u8]] = &[
    b"application", b"audio", b"example", b"image", b"message", b"model", b"multipart", b"text",
    b"video",
];

const BUILTIN_SUBTYPES: &[&[u8]] = &[b"plain"];

impl MimeRegistries {
    pub fn new() -> Self {
        let mut types = MimeRegistry::new();
        for token in BUILTIN_TYPES {
            types.register(token);
        }

        let mut subtypes = MimeRegistry::new();
        for token in BUILTIN_SUBTYPES {
            subtypes.register(token);
        }

        MimeRegistries { types, subtypes }
    }

    /// Splits `data` on `/`, stopping at the first whitespace byte (any
    /// trailing `;q=...` parameters belong to the accept-header parser, not
    /// here). Returns an invalid [`Mime`] if there's no `/`, or if either
    /// half fails to resolve to a fully-matched registered token.
    pub fn parse_mime(&self, data: &[u8]) -> Mime {
        let limit = data
            .iter()
            .position(|&b| b == b' ' || b == b'\t' || b == b';')
            .unwrap_or(data.len());
        let slice = &data[..limit];

        let slash = match slice.iter().position(|&b| b == b'/') {
            Some(p) => p,
            None => return Mime::invalid(),
        };

        let type_id = self.types.parse(&slice[..slash]);
        let subtype_id = self.subtypes.parse(&slice[slash + 1..]);

        if type_id == INVALID || subtype_id == INVALID {
            Mime::invalid()
        } else {
            Mime { type_id, subtype_id }
        }
    }
}

impl Default for MimeRegistries {
    fn default() -> Self {
        Self::new()
    }
}
