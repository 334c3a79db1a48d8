//! Ordered MIME map (C8): per-resource accept dispatch.
//!
//! Grounded in the `find`/`find_ordered` split in
//! `original_source/src/demux/demultiplexer_ordered_mime_map.cpp` -- a
//! direct hash lookup when the query MIME is fully concrete, a linear
//! insertion-order scan when either half is a wildcard. Usage counters
//! and the `enabled` flag are layered on top per `spec.md` §4.8, since
//! that retrieved snapshot predates both.

use std::collections::HashMap;

use crate::mime::Mime;

struct Entry<H> {
    handler: H,
    usage_counter: usize,
    enabled: bool,
}

/// Maps a resource's registered accept-MIME patterns to handlers,
/// preserving the order handlers were inserted (the operator's declared
/// preference for wildcard-accept lookups).
pub struct OrderedMimeMap<H> {
    entries: HashMap<Mime, Entry<H>>,
    order: Vec<Mime>,
}

impl<H> OrderedMimeMap<H> {
    pub fn new() -> Self {
        OrderedMimeMap {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Inserts `mime -> handler`. Rejects any wildcard component and any
    /// duplicate key.
    pub fn insert(&mut self, mime: Mime, handler: H) -> bool {
        if mime.is_wildcard() || self.entries.contains_key(&mime) {
            return false;
        }
        self.entries.insert(
            mime,
            Entry {
                handler,
                usage_counter: 0,
                enabled: true,
            },
        );
        self.order.push(mime);
        true
    }

    /// Removes `mime`. Refuses (returns `false`) while its usage counter
    /// is nonzero.
    pub fn erase(&mut self, mime: &Mime) -> bool {
        match self.entries.get(mime) {
            Some(e) if e.usage_counter > 0 => false,
            Some(_) => {
                self.entries.remove(mime);
                self.order.retain(|m| m != mime);
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves `pattern` against the stored concrete keys. A concrete
    /// pattern does a direct (enabled-only) hash lookup; a pattern
    /// carrying any wildcard walks insertion order and returns the first
    /// enabled, compatible concrete key.
    pub fn find(&self, pattern: Mime) -> Option<Mime> {
        if !pattern.is_wildcard() {
            return self
                .entries
                .get(&pattern)
                .filter(|e| e.enabled)
                .map(|_| pattern);
        }

        self.order
            .iter()
            .find(|m| {
                self.entries
                    .get(m)
                    .map(|e| e.enabled && mime_matches(**m, pattern))
                    .unwrap_or(false)
            })
            .copied()
    }

    pub fn handler(&self, mime: &Mime) -> Option<&H> {
        self.entries.get(mime).map(|e| &e.handler)
    }

    pub fn increase_usage_counter(&mut self, mime: &Mime) {
        if let Some(e) = self.entries.get_mut(mime) {
            e.usage_counter += 1;
        }
    }

    pub fn decrease_usage_counter(&mut self, mime: &Mime) {
        if let Some(e) = self.entries.get_mut(mime) {
            e.usage_counter = e.usage_counter.saturating_sub(1);
        }
    }

    pub fn is_used(&self, mime: &Mime) -> bool {
        self.entries.get(mime).map(|e| e.usage_counter > 0).unwrap_or(false)
    }

    pub fn set_availability(&mut self, mime: &Mime, enabled: bool) -> bool {
        match self.entries.get_mut(mime) {
            Some(e) => {
                e.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn is_available(&self, mime: &Mime) -> bool {
        self.entries.get(mime).map(|e| e.enabled).unwrap_or(false)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Mime> {
        self.order.iter()
    }
}

fn mime_matches(concrete: Mime, pattern: Mime) -> bool {
    use crate::mime::WILDCARD;
    (pattern.type_id == WILDCARD || pattern.type_id == concrete.type_id)
        && (pattern.subtype_id == WILDCARD || pattern.subtype_id == concrete.subtype_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::{MimeId, WILDCARD};

    fn mime(t: MimeId, s: MimeId) -> Mime {
        Mime {
            type_id: t,
            subtype_id: s,
        }
    }

    #[test]
    fn wildcard_lookup_respects_insertion_order() {
        let mut map = OrderedMimeMap::new();
        map.insert(mime(10, 20), "first");
        map.insert(mime(10, 30), "second");

        let found = map.find(mime(WILDCARD, WILDCARD)).unwrap();
        assert_eq!(map.handler(&found), Some(&"first"));
    }

    #[test]
    fn disabled_entry_skipped_for_wildcard_and_concrete() {
        let mut map = OrderedMimeMap::new();
        map.insert(mime(10, 20), "first");
        map.insert(mime(10, 30), "second");
        map.set_availability(&mime(10, 20), false);

        assert_eq!(map.find(mime(10, 20)), None);
        let found = map.find(mime(WILDCARD, WILDCARD)).unwrap();
        assert_eq!(map.handler(&found), Some(&"second"));
    }

    #[test]
    fn erase_refused_while_in_use() {
        let mut map = OrderedMimeMap::new();
        map.insert(mime(10, 20), "h");
        map.increase_usage_counter(&mime(10, 20));
        assert!(!map.erase(&mime(10, 20)));
        map.decrease_usage_counter(&mime(10, 20));
        assert!(map.erase(&mime(10, 20)));
    }

    #[test]
    fn wildcard_key_cannot_be_inserted() {
        let mut map: OrderedMimeMap<&str> = OrderedMimeMap::new();
        assert!(!map.insert(mime(WILDCARD, 20), "x"));
    }
}
