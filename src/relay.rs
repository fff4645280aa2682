//! Shared handle bundling the persistence store and the connection registry
//! — the two pieces of state every routing component (§4.D/E/F) and every
//! control-plane handler (§4.H) needs. Grounded in the teacher's pattern of
//! passing `&State<Db>` / `&State<EventBus>` into every route; here the two
//! pieces are bundled into one `Relay` so session/router/group code (which
//! lives outside Rocket's request-guard world, in the websocket read loop)
//! can hold a plain `Arc<Relay>` instead of two separate `Arc`s.

use crate::codec;
use crate::db::Store;
use crate::registry::Registry;
use std::sync::Arc;

pub struct Relay {
    pub store: Arc<Store>,
    pub registry: Arc<Registry>,
}

impl Relay {
    pub fn new(store: Arc<Store>, registry: Arc<Registry>) -> Arc<Self> {
        Arc::new(Relay { store, registry })
    }

    /// Encode and write `value` to `to_id`'s live session, if any. Returns
    /// `false` if the recipient is offline or the write failed — in both
    /// cases the caller treats the recipient as offline for this delivery
    /// (§7).
    pub async fn push_json<T: serde::Serialize>(&self, to_id: &str, value: &T) -> bool {
        let Some((outbound, online)) = self.registry.lookup(to_id) else {
            return false;
        };
        if !online {
            return false;
        }
        let Ok(frame) = codec::encode(value) else {
            return false;
        };
        outbound.send(frame).await
    }

    pub fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}
