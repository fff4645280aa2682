//! Group control-plane endpoints (§4.H): creation, roster, history, and
//! moderation. Each handler is a thin Rocket wrapper over [`crate::group`] —
//! the same "request guard does I/O, handler does shape" split the
//! teacher's `routes/rooms.rs` uses, with the group engine standing in for
//! what the teacher inlined directly in the route function.

use crate::codec;
use crate::error::RelayError;
use crate::group;
use crate::models::{
    AddMembersRequest, AdminActionRequest, ChatEnvelope, CreateGroupRequest, DeliveryStatus,
    Group, GroupMember, LeaveGroupRequest,
};
use crate::relay::Relay;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, get, post};
use std::sync::Arc;

#[post("/api/groups", data = "<req>")]
pub fn create_group(req: Json<CreateGroupRequest>, relay: &State<Arc<Relay>>) -> Result<Json<Group>, RelayError> {
    group::create_group(relay, req.into_inner()).map(Json)
}

#[get("/api/groups/<group_id>")]
pub fn get_group(group_id: String, relay: &State<Arc<Relay>>) -> Option<Json<Group>> {
    relay.store.group_by_id(&group_id).map(Json)
}

#[get("/api/users/<user_id>/groups")]
pub fn list_groups(user_id: String, relay: &State<Arc<Relay>>) -> Json<Vec<Group>> {
    Json(relay.store.groups_for_user(&user_id))
}

#[get("/api/groups/<group_id>/members")]
pub fn list_members(group_id: String, relay: &State<Arc<Relay>>) -> Json<Vec<GroupMember>> {
    let members = relay
        .store
        .members_excluding_banned(&group_id)
        .into_iter()
        .map(|mut m| {
            m.online = Some(relay.registry.is_online(&m.user_id));
            m
        })
        .collect();
    Json(members)
}

#[post("/api/groups/<group_id>/members", data = "<req>")]
pub async fn add_members(
    group_id: String,
    req: Json<AddMembersRequest>,
    relay: &State<Arc<Relay>>,
) -> Result<Status, RelayError> {
    group::add_members(relay, &group_id, req.into_inner()).await?;
    Ok(Status::NoContent)
}

/// Most recent `limit` messages (default 100, §4.A) for explicit history
/// fetch, distinct from the 50-message initial-sync replay in §4.G. Only a
/// non-banned member of the group may fetch its history (§4.H, §6).
#[get("/api/groups/<group_id>/messages?<user_id>&<limit>")]
pub fn group_messages(
    group_id: String,
    user_id: String,
    limit: Option<i64>,
    relay: &State<Arc<Relay>>,
) -> Result<Json<Vec<ChatEnvelope>>, RelayError> {
    let member = relay
        .store
        .member(&group_id, &user_id)
        .ok_or_else(|| RelayError::NotAMember(user_id.clone()))?;
    if member.is_banned {
        return Err(RelayError::Banned(user_id));
    }

    let records = relay.store.latest_group_messages(&group_id, limit.unwrap_or(100));
    let envelopes = records
        .into_iter()
        .map(|record| ChatEnvelope {
            id: record.id,
            from_id: record.from_id,
            to_id: group_id.clone(),
            read_status: record.read_by.iter().any(|r| r == &user_id),
            content: codec::inflate_content(&record.content),
            timestamp: record.timestamp,
            delivered: true,
            status: DeliveryStatus::Delivered,
            reply_to: codec::inflate_reply_to(&record.reply_to),
        })
        .collect();
    Ok(Json(envelopes))
}

#[post("/api/groups/<group_id>/admin", data = "<req>")]
pub async fn admin_action(
    group_id: String,
    req: Json<AdminActionRequest>,
    relay: &State<Arc<Relay>>,
) -> Result<Status, RelayError> {
    group::admin_action(relay, &group_id, req.into_inner()).await?;
    Ok(Status::NoContent)
}

#[post("/api/groups/<group_id>/leave", data = "<req>")]
pub async fn leave_group(
    group_id: String,
    req: Json<LeaveGroupRequest>,
    relay: &State<Arc<Relay>>,
) -> Result<Status, RelayError> {
    group::leave_group(relay, &group_id, req.into_inner()).await?;
    Ok(Status::NoContent)
}
