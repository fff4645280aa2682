//! Health and operational stats (§4.H). Grounded in the teacher's
//! `health`/`stats` handlers (src/routes/system.rs), pared down from the
//! teacher's many room/file/webhook counters to the four collections this
//! store actually has.

use crate::relay::Relay;
use rocket::serde::json::Json;
use rocket::{State, get};
use serde_json::{Value, json};
use std::sync::Arc;

#[get("/api/health")]
pub fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "endpoint-relay",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[get("/api/stats")]
pub fn stats(relay: &State<Arc<Relay>>) -> Json<Value> {
    let store_stats = relay.store.stats();
    let online_sessions = relay.registry.snapshot().len();
    Json(json!({
        "direct_messages": store_stats.direct_messages,
        "groups": store_stats.groups,
        "group_messages": store_stats.group_messages,
        "online_sessions": online_sessions,
    }))
}

#[rocket::catch(404)]
pub fn not_found() -> Json<Value> {
    Json(json!({ "error": "not found" }))
}
