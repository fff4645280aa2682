//! Control-plane endpoints for identifier minting, presence probing, and
//! direct-message history (§4.H). Grounded in the teacher's `routes/dm.rs`
//! (history fetch/list shape) and `routes/presence.rs` (presence query
//! shape), generalized from room-scoped history to the participant-scoped
//! range the direct-message store exposes.

use crate::db::envelope_from_record;
use crate::ids;
use crate::models::ChatEnvelope;
use crate::relay::Relay;
use rocket::serde::json::Json;
use rocket::{State, delete, get};
use serde_json::{Value, json};
use std::sync::Arc;

/// Mint a fresh endpoint identifier. No uniqueness is guaranteed server-side
/// (§9 "Identifier collisions") — a collision just means two clients briefly
/// share a session until one reconnects.
#[get("/api/generate-id")]
pub fn mint_id() -> Json<Value> {
    Json(json!({ "id": ids::generate_endpoint_id() }))
}

#[get("/api/presence")]
pub fn global_presence(relay: &State<Arc<Relay>>) -> Json<Vec<Value>> {
    let entries = relay
        .registry
        .snapshot()
        .into_iter()
        .map(|(id, online)| json!({ "id": id, "online": online }))
        .collect();
    Json(entries)
}

/// Presence probe (§6 `GET /.../api/status/{id}`).
#[get("/api/status/<endpoint_id>")]
pub fn presence_probe(endpoint_id: String, relay: &State<Arc<Relay>>) -> Json<Value> {
    let online = relay.registry.is_online(&endpoint_id);
    Json(json!({ "online": online }))
}

/// Full direct-message history for `user_id`, ascending by timestamp
/// (§4.A Range by participant).
#[get("/api/messages/<user_id>")]
pub fn direct_history(user_id: String, relay: &State<Arc<Relay>>) -> Json<Vec<ChatEnvelope>> {
    let envelopes = relay
        .store
        .direct_messages_for(&user_id)
        .iter()
        .map(envelope_from_record)
        .collect();
    Json(envelopes)
}

/// Delete every message between `user_id` and `contact_id` (§4.A Purge).
#[delete("/api/messages/<user_id>/<contact_id>")]
pub fn purge_conversation(user_id: String, contact_id: String, relay: &State<Arc<Relay>>) -> Json<Value> {
    relay.store.purge_conversation(&user_id, &contact_id);
    Json(json!({ "success": true }))
}
