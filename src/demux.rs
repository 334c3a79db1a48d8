//! Request demultiplexer (C9): a concurrency-safe registry resolving
//! `(path, method, content-type, accept-list)` to a single handler.
//!
//! Grounded in `spec.md` §4.9/§5. A `Mutex` guards the resource map and
//! the MIME registries (C4); a `Condvar` lets `disconnect` block until a
//! handler's usage counter drops to zero, matching the spec's
//! no-erase-in-use invariant. The handler reference itself is an `Arc`
//! so [`HandlerHolder`] can run the callback after releasing the lock
//! (`spec.md` §9: "the demultiplexer invokes user callbacks only after
//! releasing its lock").

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

use crate::accept::{parse_accept, AcceptPattern};
use crate::method::Method;
use crate::mime::{Mime, MimeId, MimeRegistries};
use crate::ordered_mime_map::OrderedMimeMap;
use crate::request::Request;
use crate::request_parser::MimeResolver;
use crate::response::Response;
use crate::status_code::StatusCode;

pub type HandlerCallback = dyn Fn(&Request, &mut Response) -> StatusCode + Send + Sync;

/// Identifies a registration: the resource key plus the accept-MIME the
/// handler was registered under (`spec.md` §3's "Handler handle").
#[derive(Debug, Clone)]
pub struct HandlerId {
    pub path: Vec<u8>,
    pub method: Method,
    pub content_type: Mime,
    pub accept_type: Mime,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ResourceKey {
    path: Vec<u8>,
    method: Method,
    content_type: Mime,
}

struct Registration {
    callback: Arc<HandlerCallback>,
}

struct Inner {
    resources: HashMap<ResourceKey, OrderedMimeMap<Registration>>,
    mime: MimeRegistries,
}

pub struct Demux {
    inner: Mutex<Inner>,
    condvar: Condvar,
}

pub(crate) enum Lookup {
    Found(HandlerHolder),
    ResourceMissing,
    NoAcceptableVariant,
}

impl Demux {
    pub fn new() -> Arc<Self> {
        Arc::new(Demux {
            inner: Mutex::new(Inner {
                resources: HashMap::new(),
                mime: MimeRegistries::new(),
            }),
            condvar: Condvar::new(),
        })
    }

    pub fn register_mime_type(&self, token: &[u8]) -> MimeId {
        self.inner.lock().unwrap().mime.types.register(token)
    }

    pub fn register_mime_subtype(&self, token: &[u8]) -> MimeId {
        self.inner.lock().unwrap().mime.subtypes.register(token)
    }

    pub fn unregister_mime_type(&self, id: MimeId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if mime_id_in_use(&inner, |k| k.type_id == id) {
            log::warn!("refusing to unregister mime type {}: still in use", id);
            return false;
        }
        inner.mime.types.unregister(id)
    }

    pub fn unregister_mime_subtype(&self, id: MimeId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if mime_id_in_use(&inner, |k| k.subtype_id == id) {
            log::warn!("refusing to unregister mime subtype {}: still in use", id);
            return false;
        }
        inner.mime.subtypes.unregister(id)
    }

    pub fn mime_to_string(&self, mime: Mime) -> Option<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        let type_name = inner.mime.types.name_of(mime.type_id)?;
        let subtype_name = inner.mime.subtypes.name_of(mime.subtype_id)?;
        let mut s = type_name.to_vec();
        s.push(b'/');
        s.extend_from_slice(subtype_name);
        Some(s)
    }

    fn mime_registered_or_none(inner: &Inner, mime: Mime) -> bool {
        mime == Mime::none()
            || (inner.mime.types.is_registered(mime.type_id)
                && inner.mime.subtypes.is_registered(mime.subtype_id))
    }

    /// Registers a handler. Validates that neither `content_type` nor
    /// `accept_type` carries a wildcard component, that each is either
    /// fully set or fully unset, that set tags are currently registered,
    /// and that the path is non-empty and carries no `?`/`#`.
    pub fn connect<F>(self: &Arc<Self>, id: HandlerId, callback: F) -> Option<Handle>
    where
        F: Fn(&Request, &mut Response) -> StatusCode + Send + Sync + 'static,
    {
        if id.path.is_empty() || id.path.contains(&b'?') || id.path.contains(&b'#') {
            log::warn!("connect: invalid resource path");
            return None;
        }
        if id.content_type.is_wildcard() || id.accept_type.is_wildcard() {
            log::warn!("connect: wildcard not allowed as a stored handler key");
            return None;
        }
        if !id.content_type.is_fully_set_or_unset() || !id.accept_type.is_fully_set_or_unset() {
            log::warn!("connect: mime pair partially set");
            return None;
        }

        let mut inner = self.inner.lock().unwrap();
        if !Self::mime_registered_or_none(&inner, id.content_type)
            || !Self::mime_registered_or_none(&inner, id.accept_type)
        {
            log::warn!("connect: mime tag not currently registered");
            return None;
        }

        let key = ResourceKey {
            path: id.path.clone(),
            method: id.method,
            content_type: id.content_type,
        };

        let map = inner.resources.entry(key.clone()).or_insert_with(OrderedMimeMap::new);
        let inserted = map.insert(
            id.accept_type,
            Registration {
                callback: Arc::new(callback),
            },
        );
        if !inserted {
            if map.is_empty() {
                inner.resources.remove(&key);
            }
            log::warn!("connect: duplicate accept-type registration");
            return None;
        }

        Some(Handle {
            demux: Arc::clone(self),
            key,
            accept: id.accept_type,
        })
    }

    fn disconnect(&self, key: &ResourceKey, accept: Mime) {
        let mut inner = self.inner.lock().unwrap();
        loop {
            let used = inner
                .resources
                .get(key)
                .map(|m| m.is_used(&accept))
                .unwrap_or(false);
            if !used {
                break;
            }
            inner = self.condvar.wait(inner).unwrap();
        }

        if let Some(map) = inner.resources.get_mut(key) {
            map.erase(&accept);
            if map.is_empty() {
                inner.resources.remove(key);
            }
        }
    }

    fn set_enabled(&self, key: &ResourceKey, accept: Mime, enabled: bool) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.resources.get_mut(key) {
            Some(map) => map.set_availability(&accept, enabled),
            None => false,
        }
    }

    fn is_enabled(&self, key: &ResourceKey, accept: Mime) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .resources
            .get(key)
            .map(|m| m.is_available(&accept))
            .unwrap_or(false)
    }

    fn release(&self, key: &ResourceKey, mime: Mime) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(map) = inner.resources.get_mut(key) {
            map.decrease_usage_counter(&mime);
            if !map.is_used(&mime) {
                self.condvar.notify_all();
            }
        }
    }

    /// Resolves a request to a handler, per `spec.md` §4.9: a request
    /// carrying a wildcard `Content-Type` never matches (clients must not
    /// send one); otherwise the resource is looked up by
    /// `(path, method, content_type)`, then the request's `Accept`
    /// patterns are tried in order, falling back to `*/*` as a last
    /// resort.
    pub(crate) fn lookup(self: &Arc<Self>, request: &Request) -> Lookup {
        let content_type = request.content_type.unwrap_or_else(Mime::none);
        if content_type.is_wildcard() {
            return Lookup::ResourceMissing;
        }

        let key = ResourceKey {
            path: request.uri.path.clone(),
            method: request.method,
            content_type,
        };

        let mut inner = self.inner.lock().unwrap();
        let map = match inner.resources.get_mut(&key) {
            Some(m) => m,
            None => return Lookup::ResourceMissing,
        };

        let wildcard = Mime {
            type_id: crate::mime::WILDCARD,
            subtype_id: crate::mime::WILDCARD,
        };
        let mut patterns: Vec<Mime> = request
            .accept
            .iter()
            .filter(|p| p.mime.is_valid() || p.mime.is_wildcard())
            .map(|p| p.mime)
            .collect();
        patterns.push(wildcard);

        for pattern in patterns {
            if let Some(concrete) = map.find(pattern) {
                map.increase_usage_counter(&concrete);
                let callback = Arc::clone(&map.handler(&concrete).unwrap().callback);
                return Lookup::Found(HandlerHolder {
                    demux: Arc::clone(self),
                    key,
                    mime: concrete,
                    callback,
                });
            }
        }

        Lookup::NoAcceptableVariant
    }

    /// The public surface from `spec.md` §6: collapses the richer
    /// [`Lookup`] outcome the processor needs down to a plain option.
    pub fn determine_request_handler(self: &Arc<Self>, request: &Request) -> Option<HandlerHolder> {
        match self.lookup(request) {
            Lookup::Found(h) => Some(h),
            _ => None,
        }
    }
}

impl MimeResolver for Demux {
    fn parse_mime(&self, data: &[u8]) -> Mime {
        self.inner.lock().unwrap().mime.parse_mime(data)
    }

    fn parse_accept(&self, data: &[u8]) -> Vec<AcceptPattern> {
        let inner = self.inner.lock().unwrap();
        parse_accept(data, &inner.mime)
    }
}

fn mime_id_in_use(inner: &Inner, matches_id: impl Fn(&Mime) -> bool) -> bool {
    inner.resources.iter().any(|(key, map)| {
        matches_id(&key.content_type) || map.keys().any(&matches_id)
    })
}

/// A scoped value that keeps a registration's usage counter >= 1 for the
/// duration of a request. Decrements (and wakes any pending `disconnect`)
/// on drop.
pub struct HandlerHolder {
    demux: Arc<Demux>,
    key: ResourceKey,
    pub mime: Mime,
    pub callback: Arc<HandlerCallback>,
}

impl Drop for HandlerHolder {
    fn drop(&mut self) {
        self.demux.release(&self.key, self.mime);
    }
}

/// Returned by [`Demux::connect`]. Dropping it disconnects the handler,
/// blocking if a request is still in flight against it.
pub struct Handle {
    demux: Arc<Demux>,
    key: ResourceKey,
    accept: Mime,
}

impl Handle {
    pub fn enable(&self) {
        self.demux.set_enabled(&self.key, self.accept, true);
    }

    pub fn disable(&self) {
        self.demux.set_enabled(&self.key, self.accept, false);
    }

    pub fn is_enabled(&self) -> bool {
        self.demux.is_enabled(&self.key, self.accept)
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.demux.disconnect(&self.key, self.accept);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;
    use crate::mime::WILDCARD;
    use crate::status_code;

    fn content_type_mime(demux: &Arc<Demux>, type_tok: &[u8], subtype_tok: &[u8]) -> Mime {
        Mime {
            type_id: demux.register_mime_type(type_tok),
            subtype_id: demux.register_mime_subtype(subtype_tok),
        }
    }

    fn sample_request(path: &[u8], method: Method, content_type: Option<Mime>, accept: Vec<AcceptPattern>) -> Request {
        Request {
            method,
            version: crate::request::HttpVersion::Http11,
            uri: crate::uri::Uri {
                path: path.to_vec(),
                ..Default::default()
            },
            headers: crate::header::HeaderMap::new(),
            content_length: None,
            content_type,
            content_md5: None,
            date: None,
            connection: crate::request::ConnectionOption::KeepAlive,
            expect_continue: false,
            from: None,
            referer: None,
            user_agent: None,
            accept,
            content: Vec::new(),
        }
    }

    #[test]
    fn connect_then_lookup_succeeds() {
        let demux = Demux::new();
        let text_plain = content_type_mime(&demux, b"text", b"plain");

        let _handle = demux
            .connect(
                HandlerId {
                    path: b"/x".to_vec(),
                    method: Method::Post,
                    content_type: text_plain,
                    accept_type: text_plain,
                },
                |_req, _res| status_code::OK,
            )
            .unwrap();

        let req = sample_request(
            b"/x",
            Method::Post,
            Some(text_plain),
            vec![AcceptPattern { mime: text_plain, quality: 100 }],
        );
        assert!(demux.determine_request_handler(&req).is_some());
    }

    #[test]
    fn wildcard_request_content_type_never_matches() {
        let demux = Demux::new();
        let req = sample_request(b"/x", Method::Get, Some(Mime { type_id: WILDCARD, subtype_id: WILDCARD }), vec![]);
        assert!(demux.determine_request_handler(&req).is_none());
    }

    #[test]
    fn accept_wildcard_prefers_insertion_order() {
        let demux = Demux::new();
        let text_plain = content_type_mime(&demux, b"text", b"plain");
        let xml = content_type_mime(&demux, b"application", b"xml");
        let html = content_type_mime(&demux, b"text", b"html");

        let _h1 = demux
            .connect(
                HandlerId { path: b"/p".to_vec(), method: Method::Get, content_type: text_plain, accept_type: xml },
                |_req, _res| status_code::OK,
            )
            .unwrap();
        let _h2 = demux
            .connect(
                HandlerId { path: b"/p".to_vec(), method: Method::Get, content_type: text_plain, accept_type: html },
                |_req, _res| status_code::OK,
            )
            .unwrap();

        let req = sample_request(
            b"/p",
            Method::Get,
            Some(text_plain),
            vec![AcceptPattern {
                mime: Mime { type_id: text_plain.type_id, subtype_id: WILDCARD },
                quality: 100,
            }],
        );
        let holder = demux.determine_request_handler(&req).unwrap();
        assert_eq!(holder.mime, xml);
    }

    #[test]
    fn in_use_handler_blocks_disconnect_until_released() {
        let demux = Demux::new();
        let text_plain = content_type_mime(&demux, b"text", b"plain");
        let handle = demux
            .connect(
                HandlerId { path: b"/x".to_vec(), method: Method::Get, content_type: text_plain, accept_type: text_plain },
                |_req, _res| status_code::OK,
            )
            .unwrap();

        let req = sample_request(b"/x", Method::Get, Some(text_plain), vec![]);
        let holder = demux.determine_request_handler(&req).unwrap();

        let demux2 = Arc::clone(&demux);
        let t = std::thread::spawn(move || {
            drop(handle);
        });

        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(!t.is_finished());

        drop(holder);
        t.join().unwrap();
        let _ = demux2;
    }

    #[test]
    fn unregister_refused_while_referenced() {
        let demux = Demux::new();
        let type_id = demux.register_mime_type(b"vnd.example");
        let subtype_id = demux.register_mime_subtype(b"custom");
        let mime = Mime { type_id, subtype_id };

        let _handle = demux
            .connect(
                HandlerId { path: b"/x".to_vec(), method: Method::Get, content_type: mime, accept_type: mime },
                |_req, _res| status_code::OK,
            )
            .unwrap();

        assert!(!demux.unregister_mime_type(type_id));
        assert!(!demux.unregister_mime_subtype(subtype_id));
    }
}
