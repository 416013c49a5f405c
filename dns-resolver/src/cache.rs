//! The response cache: a TTL-aware, thread-safe map from `(qname,
//! qtype)` to a previously observed message.
//!
//! This caches whole messages, not individual records, which is a
//! deliberate departure from a full recursive resolver's per-record
//! cache: the simpler shape is sufficient for the single-hop CNAME
//! stitching and NOERROR-with-authority admission rule this project
//! needs, and keeps the whole cache under one lock with predictable
//! critical sections.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dns_types::protocol::types::{DomainName, Message, RecordData, RecordType, Rcode};

const MUTEX_POISON_MESSAGE: &str =
    "[INTERNAL ERROR] cache mutex poisoned, cannot recover from this - aborting";

/// A minimum TTL floor applied when every record contributing to an
/// entry has a non-positive TTL, so a reply of nothing-but-zeroes
/// still gets evicted eventually rather than cached forever.
const MINIMUM_TTL: Duration = Duration::from_secs(60);

type Key = (DomainName, RecordType);

struct Entry {
    message: Message,
    expiry: Instant,
}

/// A convenience wrapper around a `Cache` which lets it be shared
/// between tasks. Cloning gives a new handle to the same underlying
/// cache.
#[derive(Clone)]
pub struct SharedCache {
    inner: Arc<Mutex<Cache>>,
}

impl SharedCache {
    pub fn new() -> Self {
        SharedCache {
            inner: Arc::new(Mutex::new(Cache::new())),
        }
    }

    /// Insert `message` under `(qname, qtype)`, computing its expiry
    /// from the TTLs of the records it carries. No-op if the message
    /// isn't admissible (see `Cache::store`).
    pub fn store(&self, qname: &DomainName, qtype: RecordType, message: Message, now: Instant) {
        self.inner
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .store(qname, qtype, message, now);
    }

    /// Look up `(qname, qtype)`, following a single CNAME hop if the
    /// direct entry isn't present but a chain is available.
    pub fn lookup(&self, qname: &DomainName, qtype: RecordType, now: Instant) -> Option<Message> {
        self.inner.lock().expect(MUTEX_POISON_MESSAGE).lookup(qname, qtype, now)
    }

    /// Remove every expired entry.
    pub fn sweep(&self, now: Instant) {
        self.inner.lock().expect(MUTEX_POISON_MESSAGE).sweep(now);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().expect(MUTEX_POISON_MESSAGE).entries.len()
    }
}

impl Default for SharedCache {
    fn default() -> Self {
        Self::new()
    }
}

/// The cache itself. Prefer `SharedCache` for anything crossing a
/// task boundary.
struct Cache {
    entries: HashMap<Key, Entry>,
}

impl Cache {
    fn new() -> Self {
        Cache {
            entries: HashMap::new(),
        }
    }

    fn store(&mut self, qname: &DomainName, qtype: RecordType, message: Message, now: Instant) {
        if message.header.rcode != Rcode::NoError {
            return;
        }
        if message.answers.is_empty() && message.authority.is_empty() {
            return;
        }

        let ttl = min_ttl(&message).unwrap_or(MINIMUM_TTL);
        let expiry = now + ttl;
        self.entries.insert(
            (qname.clone(), qtype),
            Entry { message, expiry },
        );
    }

    fn lookup(&mut self, qname: &DomainName, qtype: RecordType, now: Instant) -> Option<Message> {
        if let Some(message) = self.get_live(qname, qtype, now) {
            return Some(message);
        }

        let cname_key = (qname.clone(), RecordType::CNAME);
        let cname_message = self.get_live_by_key(&cname_key, now)?;
        let cname_rr = cname_message.answers.first()?;
        let RecordData::CNAME { cname: target } = &cname_rr.rdata else {
            return None;
        };
        let target_message = self.get_live(target, qtype, now)?;

        let mut stitched = cname_message.make_response();
        stitched.header.is_authoritative = cname_message.header.is_authoritative;
        stitched.answers.push(cname_rr.clone());
        stitched.answers.extend(target_message.answers);
        Some(stitched)
    }

    fn get_live(&mut self, qname: &DomainName, qtype: RecordType, now: Instant) -> Option<Message> {
        self.get_live_by_key(&(qname.clone(), qtype), now)
    }

    fn get_live_by_key(&mut self, key: &Key, now: Instant) -> Option<Message> {
        match self.entries.get(key) {
            Some(entry) if entry.expiry > now => Some(entry.message.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn sweep(&mut self, now: Instant) {
        self.entries.retain(|_, entry| entry.expiry > now);
    }
}

/// The minimum TTL across every record in the message, treating a
/// non-positive TTL as absent unless every record is non-positive (in
/// which case there's nothing to take a minimum of, so the caller
/// falls back to `MINIMUM_TTL`).
fn min_ttl(message: &Message) -> Option<Duration> {
    message
        .answers
        .iter()
        .chain(message.authority.iter())
        .chain(message.additional.iter())
        .filter(|rr| rr.ttl > 0)
        .map(|rr| Duration::from_secs(u64::from(rr.ttl)))
        .min()
}
