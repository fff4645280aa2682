//! Direct-message router (§4.D): dispatch rules for an inbound chat
//! envelope, inline delivery, and the receipt lifecycle. Grounded in the
//! teacher's `send_message`/`send_dm` handlers (src/routes/dm.rs,
//! src/routes.rs) for the "validate, persist, notify" shape, generalized
//! from "always persist + publish to an SSE broadcast channel" to
//! "attempt a direct write to the recipient's session first, persist only
//! on failure" — the store is the fallback path here, not the only path.

use crate::db::record_from_envelope;
use crate::group;
use crate::models::{ChatEnvelope, Content, DeliveryStatus};
use crate::relay::Relay;

/// Entry point for every inbound chat/receipt envelope (§4.C default path).
pub async fn handle(relay: &Relay, envelope: ChatEnvelope) {
    let envelope = envelope.with_defaults(Relay::now_millis());

    if crate::models::is_group_id(&envelope.to_id) {
        group::handle_group_message(relay, envelope).await;
        return;
    }

    match envelope.content.as_control_str() {
        Some("delivered") => {
            relay.store.mark_direct_message(&envelope.id, true, false);
            persist_if_not_inline_delivered(relay, envelope).await;
        }
        Some("read") => {
            relay.store.mark_direct_message(&envelope.id, true, true);
            persist_if_not_inline_delivered(relay, envelope).await;
        }
        // Presence is broadcast by the session lifecycle, not echoed from
        // clients (§4.D rule 4).
        Some("status_update") => {}
        _ => {
            persist_if_not_inline_delivered(relay, envelope).await;
        }
    }
}

async fn persist_if_not_inline_delivered(relay: &Relay, envelope: ChatEnvelope) {
    if !inline_delivery(relay, &envelope).await {
        relay.store.insert_direct_message(&record_from_envelope(&envelope));
    }
}

/// Attempt to write `envelope` straight onto the recipient's live session
/// (§4.D "Inline delivery"). Returns `true` iff the write succeeded, in
/// which case the caller must not persist.
pub async fn inline_delivery(relay: &Relay, envelope: &ChatEnvelope) -> bool {
    if !relay.push_json(&envelope.to_id, envelope).await {
        return false;
    }

    let is_delivered_receipt = envelope.is_receipt("delivered");
    let is_read_receipt = envelope.is_receipt("read");

    if !is_delivered_receipt && !is_read_receipt {
        let receipt = ChatEnvelope {
            id: format!("delivery_{}", envelope.id),
            from_id: envelope.to_id.clone(),
            to_id: envelope.from_id.clone(),
            content: Content::Text("delivered".to_string()),
            timestamp: Relay::now_millis(),
            delivered: false,
            read_status: false,
            status: DeliveryStatus::Delivered,
            reply_to: None,
        };
        // Inline-only: a failed write of an auto-receipt is never persisted,
        // and never itself triggers another auto-receipt (§9 "Receipt loops").
        let _ = relay.push_json(&envelope.from_id, &receipt).await;
    }

    if is_read_receipt {
        relay.store.mark_direct_message(&envelope.id, true, true);
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use crate::registry::{Outbound, Registry};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    struct Capture {
        frames: Mutex<Vec<String>>,
        fail: bool,
    }

    impl Capture {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                frames: Mutex::new(vec![]),
                fail,
            })
        }
    }

    #[async_trait]
    impl Outbound for Capture {
        async fn send(&self, frame: String) -> bool {
            if self.fail {
                return false;
            }
            self.frames.lock().await.push(frame);
            true
        }
        async fn close(&self) {}
    }

    fn relay() -> Arc<Relay> {
        Relay::new(Arc::new(Store::open_in_memory()), Arc::new(Registry::new()))
    }

    fn chat(id: &str, from: &str, to: &str, content: &str) -> ChatEnvelope {
        ChatEnvelope {
            id: id.to_string(),
            from_id: from.to_string(),
            to_id: to.to_string(),
            content: Content::Text(content.to_string()),
            timestamp: 0,
            delivered: false,
            read_status: false,
            status: DeliveryStatus::Sent,
            reply_to: None,
        }
    }

    #[tokio::test]
    async fn offline_recipient_persists_undelivered() {
        let relay = relay();
        handle(&relay, chat("m1", "A", "B", "hi")).await;
        let rows = relay.store.direct_messages_for("A");
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].delivered);
    }

    #[tokio::test]
    async fn online_recipient_gets_inline_delivery_and_auto_receipt() {
        let relay = relay();
        let b_session = Capture::new(false);
        relay.registry.register("B", b_session.clone());
        handle(&relay, chat("m1", "A", "B", "hi")).await;

        // Not persisted: inline delivery to B succeeded.
        assert!(relay.store.direct_messages_for("A").is_empty());

        let frames = b_session.frames.lock().await;
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("\"content\":\"hi\""));
    }

    #[tokio::test]
    async fn read_receipt_marks_store_row_delivered_and_read() {
        let relay = relay();
        relay.store.insert_direct_message(&record_from_envelope(&chat("m1", "A", "B", "hi")));
        handle(&relay, chat("m1", "B", "A", "read")).await;
        let rows = relay.store.direct_messages_for("A");
        let row = rows.iter().find(|r| r.id == "m1").unwrap();
        assert!(row.delivered);
        assert!(row.read_status);
    }

    #[tokio::test]
    async fn status_update_is_ignored() {
        let relay = relay();
        handle(&relay, chat("m1", "A", "B", "status_update")).await;
        assert!(relay.store.direct_messages_for("A").is_empty());
    }

    #[tokio::test]
    async fn receipt_persisted_only_if_not_inline_delivered() {
        let relay = relay();
        // B offline: the read receipt itself should be persisted.
        handle(&relay, chat("read_m1", "B", "A", "read")).await;
        let rows = relay.store.direct_messages_for("A");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "read_m1");
    }
}
