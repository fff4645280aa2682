//! Session lifecycle (§4.G): websocket handshake, registry registration,
//! presence broadcast, initial sync of anything missed while offline, the
//! read loop, and deregistration on disconnect. Grounded in Rocket's own
//! `rocket_ws` chat examples for the channel/split shape, generalized from
//! an echo loop into the register -> sync -> dispatch -> deregister
//! sequence §4.G describes, and in the teacher's `PresenceGuard` (now
//! superseded by [`Registry`]) for the "RAII cleanup on drop" idea, which
//! here becomes an explicit deregister once the read loop ends rather than
//! a `Drop` impl, since the websocket channel closure already owns that
//! point in the control flow.

use crate::codec;
use crate::models::{ChatEnvelope, DeliveryStatus, Envelope, PresenceEnvelope};
use crate::registry::Outbound;
use crate::relay::Relay;
use crate::{router, signaling};
use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use rocket::{State, get};
use rocket_ws::{Message, WebSocket, stream::DuplexStream};
use std::sync::Arc;
use tokio::sync::Mutex;

struct WsSession {
    sink: Mutex<SplitSink<DuplexStream, Message>>,
}

#[async_trait]
impl Outbound for WsSession {
    async fn send(&self, frame: String) -> bool {
        self.sink.lock().await.send(Message::Text(frame)).await.is_ok()
    }

    async fn close(&self) {
        let _ = self.sink.lock().await.close().await;
    }
}

/// Duplex endpoint for one session (§4.G). The path segment is the
/// endpoint identifier the client was minted by [`crate::routes::control::mint_id`]
/// or a prior session.
#[get("/ws/<endpoint_id>")]
pub fn connect(endpoint_id: String, ws: WebSocket, relay: &State<Arc<Relay>>) -> rocket_ws::Channel<'static> {
    let relay = relay.inner().clone();
    ws.channel(move |stream| {
        Box::pin(async move {
            let (sink, mut source) = stream.split();
            let session: Arc<dyn Outbound> = Arc::new(WsSession { sink: Mutex::new(sink) });

            if let Some(previous) = relay.registry.register(&endpoint_id, session.clone()) {
                previous.close().await;
            }
            tracing::info!(endpoint = %endpoint_id, "session registered");

            broadcast_presence(&relay, &endpoint_id, true).await;
            run_initial_sync(&relay, &endpoint_id).await;

            while let Some(Ok(message)) = source.next().await {
                let text = match message {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };
                dispatch(&relay, &text).await;
            }

            relay.registry.deregister(&endpoint_id, &session);
            tracing::info!(endpoint = %endpoint_id, "session deregistered");
            broadcast_presence(&relay, &endpoint_id, false).await;

            Ok(())
        })
    })
}

async fn dispatch(relay: &Relay, frame: &str) {
    match codec::decode(frame) {
        Ok(Envelope::Chat(envelope)) => router::handle(relay, envelope).await,
        Ok(Envelope::Signaling(envelope)) => signaling::handle(relay, envelope).await,
        Ok(Envelope::Other) => {}
        Err(error) => tracing::warn!(%error, "dropped unparseable frame"),
    }
}

/// Notify every other online session of a presence change (§4.G step 2, §6).
async fn broadcast_presence(relay: &Relay, endpoint_id: &str, online: bool) {
    let envelope = if online {
        PresenceEnvelope::online(endpoint_id)
    } else {
        PresenceEnvelope::offline(endpoint_id)
    };
    for other in relay.registry.other_ids(endpoint_id) {
        relay.push_json(&other, &envelope).await;
    }
}

/// Replay anything addressed to `endpoint_id` that arrived while it was
/// offline: undelivered direct messages (flagged delivered here, with a
/// synthesized receipt fired back to each original sender) and recent
/// group history for every group it belongs to (§4.G step 3, §4.A).
async fn run_initial_sync(relay: &Relay, endpoint_id: &str) {
    let pending: Vec<_> = relay
        .store
        .direct_messages_for(endpoint_id)
        .into_iter()
        .filter(|r| r.to_id == endpoint_id && !r.delivered)
        .collect();

    // Flag every undelivered row as delivered in one transaction before
    // replaying any of them (§4.G step 3a "batched in a single transaction"),
    // then push each envelope and its synthesized receipt individually.
    let pending_ids: Vec<String> = pending.iter().map(|r| r.id.clone()).collect();
    relay.store.mark_delivered_batch(&pending_ids);

    for mut record in pending {
        record.delivered = true;
        let envelope = crate::db::envelope_from_record(&record);
        if !relay.push_json(endpoint_id, &envelope).await {
            continue;
        }
        let receipt = ChatEnvelope {
            id: format!("delivery_{}", record.id),
            from_id: endpoint_id.to_string(),
            to_id: record.from_id.clone(),
            content: crate::models::Content::Text("delivered".to_string()),
            timestamp: Relay::now_millis(),
            delivered: false,
            read_status: false,
            status: DeliveryStatus::Delivered,
            reply_to: None,
        };
        relay.push_json(&record.from_id, &receipt).await;
    }

    for group in relay.store.groups_for_user(endpoint_id) {
        for message in relay.store.latest_group_messages(&group.id, 50) {
            let envelope = ChatEnvelope {
                id: message.id,
                from_id: message.from_id,
                to_id: group.id.clone(),
                content: codec::inflate_content(&message.content),
                timestamp: message.timestamp,
                delivered: true,
                read_status: message.read_by.iter().any(|r| r == endpoint_id),
                status: DeliveryStatus::Delivered,
                reply_to: codec::inflate_reply_to(&message.reply_to),
            };
            let _ = relay.push_json(endpoint_id, &envelope).await;
        }
    }
}
