//! Connection registry (§4.B): the process-wide mapping from endpoint
//! identifier to live duplex session, the single blessed piece of
//! process-wide shared state (§9 "Global mutable registry"). Grounded in
//! the teacher's `PresenceTracker` (src/routes/mod.rs) — a read-mostly
//! `RwLock<HashMap<...>>` guarding presence — generalized from a
//! room-scoped presence count to a process-wide one-session-per-endpoint
//! map, and from `std::sync::RwLock` to `parking_lot::RwLock` (no poisoning
//! to thread through every read).

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Write capability onto a live session. One implementation per transport;
/// the websocket session (§4.G) is the only one in this crate, but keeping
/// the registry generic over this trait is what lets §4.D/§4.E/§4.F push
/// envelopes without depending on the websocket crate directly, and is what
/// lets the router/group engine be unit-tested against an in-memory fake.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Write one frame. `false` means the write failed or the session is
    /// gone; the caller treats the recipient as offline for this delivery
    /// (§7 "Write failure to a session").
    async fn send(&self, frame: String) -> bool;

    /// Best-effort close, called when this entry is superseded by a
    /// reconnect (§4.B, §9 "Reconnect supersedes prior session").
    async fn close(&self);
}

struct Entry {
    outbound: Arc<dyn Outbound>,
    online: bool,
}

#[derive(Default)]
pub struct Registry {
    entries: RwLock<HashMap<String, Entry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id` with `outbound`. If a prior entry existed it is
    /// superseded: returned so the caller (session lifecycle) can close it
    /// — the registry itself never blocks on I/O (invariant 1).
    pub fn register(&self, id: &str, outbound: Arc<dyn Outbound>) -> Option<Arc<dyn Outbound>> {
        let mut entries = self.entries.write();
        entries
            .insert(
                id.to_string(),
                Entry {
                    outbound,
                    online: true,
                },
            )
            .map(|prev| prev.outbound)
    }

    /// Removes `id` only if its current entry is still the handle the
    /// caller believes it owns — a compare-and-delete on handle identity so
    /// a superseded session's own deregister (on read failure) can never
    /// delete the entry the new owner just installed (§9).
    pub fn deregister(&self, id: &str, handle: &Arc<dyn Outbound>) {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get(id)
            && Arc::ptr_eq(&entry.outbound, handle)
        {
            entries.remove(id);
        }
    }

    pub fn lookup(&self, id: &str) -> Option<(Arc<dyn Outbound>, bool)> {
        let entries = self.entries.read();
        entries.get(id).map(|e| (e.outbound.clone(), e.online))
    }

    pub fn is_online(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    /// `(id, online)` for every registered session — used for presence
    /// broadcasts and the global presence control endpoint (§4.B, §4.H).
    pub fn snapshot(&self) -> Vec<(String, bool)> {
        self.entries
            .read()
            .iter()
            .map(|(id, e)| (id.clone(), e.online))
            .collect()
    }

    /// Every registered id except `exclude` — used for presence broadcasts
    /// ("every other online session", §4.G step 2).
    pub fn other_ids(&self, exclude: &str) -> Vec<String> {
        self.entries
            .read()
            .keys()
            .filter(|id| id.as_str() != exclude)
            .cloned()
            .collect()
    }
}
