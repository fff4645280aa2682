//! Group engine (§4.E): membership moderation, chat fan-out, and the
//! notification/disconnect side effects moderation actions trigger.
//! Grounded in the teacher's `routes/rooms.rs` roster + broadcast handlers
//! for the "look up membership, mutate, notify everyone online" shape,
//! generalized from a single `member` role to the role/mute/ban state this
//! spec's group moderation needs, and from SSE broadcast to direct
//! `Outbound` writes through the registry.

use crate::codec;
use crate::error::RelayError;
use crate::models::{
    AddMembersRequest, AdminActionKind, AdminActionRequest, ChatEnvelope, CreateGroupRequest,
    Group, GroupMember, GroupMessageRecord, GroupNotificationData, GroupNotificationEnvelope,
    GroupDisconnectEnvelope, LeaveGroupRequest, MemberRole, SystemEnvelope,
};
use crate::relay::Relay;

/// Create a group with `req.created_by` seated as its sole initial admin and
/// `req.initial_members` seated as plain members (§4.A, §4.E).
pub fn create_group(relay: &Relay, req: CreateGroupRequest) -> Result<Group, RelayError> {
    if req.name.trim().is_empty() {
        return Err(RelayError::BadRequest("group name must not be empty".to_string()));
    }
    let now = Relay::now_millis();
    let group = Group {
        id: crate::ids::generate_group_id(),
        name: req.name,
        description: req.description,
        created_by: req.created_by.clone(),
        created_at: now,
        member_count: 0,
        last_activity: None,
        last_message: None,
    };
    let mut members = vec![(req.created_by.clone(), MemberRole::Admin)];
    for user_id in req.initial_members {
        if user_id != req.created_by {
            members.push((user_id, MemberRole::Member));
        }
    }
    relay.store.create_group(&group, &members, now);
    relay
        .store
        .group_by_id(&group.id)
        .ok_or_else(|| RelayError::Storage("group vanished immediately after creation".to_string()))
}

/// Add `req.user_ids` as plain members, re-activating anyone previously
/// banned or muted in this group (§4.A `ON CONFLICT` upsert semantics).
/// Any current non-banned member may add others — membership is not
/// admin-gated, only moderation actions are.
pub async fn add_members(relay: &Relay, group_id: &str, req: AddMembersRequest) -> Result<(), RelayError> {
    require_active_member(relay, group_id, &req.added_by)?;
    let now = Relay::now_millis();
    for user_id in &req.user_ids {
        relay.store.add_group_member(group_id, user_id, MemberRole::Member, now);
    }
    notify_group(
        relay,
        group_id,
        "member_added",
        &format!("{} added {} member(s)", req.added_by, req.user_ids.len()),
    )
    .await;
    Ok(())
}

/// Apply one moderation action (§4.E state machine: member/muted/admin/banned).
pub async fn admin_action(relay: &Relay, group_id: &str, req: AdminActionRequest) -> Result<(), RelayError> {
    let actor = require_active_member(relay, group_id, &req.performed_by)?;
    if actor.role != MemberRole::Admin {
        return Err(RelayError::NotAdmin(req.performed_by.clone()));
    }
    let target = relay
        .store
        .member(group_id, &req.target_user_id)
        .ok_or_else(|| RelayError::NotAMember(req.target_user_id.clone()))?;

    match req.action {
        AdminActionKind::Mute => {
            relay.store.set_member_state(group_id, &target.user_id, target.role, true, target.is_banned);
        }
        AdminActionKind::Unmute => {
            relay.store.set_member_state(group_id, &target.user_id, target.role, false, target.is_banned);
        }
        AdminActionKind::Promote => {
            relay.store.set_member_state(group_id, &target.user_id, MemberRole::Admin, target.is_muted, target.is_banned);
        }
        AdminActionKind::Demote => {
            if target.role == MemberRole::Admin && relay.store.admin_count(group_id) <= 1 {
                return Err(RelayError::LastAdmin);
            }
            relay.store.set_member_state(group_id, &target.user_id, MemberRole::Member, target.is_muted, target.is_banned);
        }
        AdminActionKind::Ban => {
            if target.role == MemberRole::Admin && relay.store.admin_count(group_id) <= 1 {
                return Err(RelayError::LastAdmin);
            }
            relay.store.set_member_state(group_id, &target.user_id, target.role, target.is_muted, true);
            disconnect_member(relay, group_id, &target.user_id, "banned").await;
        }
        AdminActionKind::Unban => {
            relay.store.set_member_state(group_id, &target.user_id, target.role, target.is_muted, false);
        }
    }

    notify_group(
        relay,
        group_id,
        action_kind_str(req.action),
        &format!("{} applied {:?} to {}", req.performed_by, req.action, req.target_user_id),
    )
    .await;
    Ok(())
}

/// Remove `req.user_id` from the group, refusing to strand it adminless
/// while other members remain (§4.E "leave guard").
pub async fn leave_group(relay: &Relay, group_id: &str, req: LeaveGroupRequest) -> Result<(), RelayError> {
    let member = require_active_member(relay, group_id, &req.user_id)?;
    let others = relay
        .store
        .members_excluding_banned(group_id)
        .into_iter()
        .filter(|m| m.user_id != req.user_id)
        .count();
    if member.role == MemberRole::Admin && relay.store.admin_count(group_id) <= 1 && others > 0 {
        return Err(RelayError::LastAdmin);
    }
    relay.store.remove_group_member(group_id, &req.user_id);
    notify_group(relay, group_id, "member_left", &format!("{} left the group", req.user_id)).await;
    Ok(())
}

/// Inbound group envelope dispatch (§4.E), mirroring the direct-message
/// router's shape: membership/ban/mute gates, then either a read-receipt
/// mutation or a persist-and-fan-out chat message.
pub async fn handle_group_message(relay: &Relay, envelope: ChatEnvelope) {
    let group_id = envelope.to_id.clone();
    let sender = envelope.from_id.clone();

    let Some(member) = relay.store.member(&group_id, &sender) else {
        notify_sender_error(relay, &sender, "not a member of this group").await;
        return;
    };
    if member.is_banned {
        notify_sender_error(relay, &sender, "banned from this group").await;
        return;
    }

    match envelope.content.as_control_str() {
        Some("read") => {
            relay.store.mark_group_message_read(&envelope.id, &sender);
            return;
        }
        // Presence is driven by the session lifecycle, not echoed (§4.D rule 4,
        // reused verbatim for group envelopes).
        Some("status_update") => return,
        _ => {}
    }

    if member.is_muted {
        notify_sender_error(relay, &sender, "muted in this group").await;
        return;
    }

    let record = GroupMessageRecord {
        id: envelope.id.clone(),
        group_id: group_id.clone(),
        from_id: sender.clone(),
        content: codec::canonicalize_content(&envelope.content),
        reply_to: codec::canonicalize_reply_to(&envelope.reply_to),
        timestamp: envelope.timestamp,
        // The sender always counts as having read its own message (invariant 5).
        read_by: vec![sender.clone()],
    };
    relay.store.insert_group_message(&record);

    // Fan out as a normal chat envelope: readStatus true iff the recipient
    // is the sender, status delivered (§4.E fan-out step 5). Every actual
    // recipient here is by definition not the sender (skipped below), so
    // both fields are forced rather than carried over from the inbound wire
    // values, which may have arrived with arbitrary flags set.
    let mut outbound = envelope.clone();
    outbound.delivered = true;
    outbound.status = crate::models::DeliveryStatus::Delivered;
    for m in relay.store.members_excluding_banned(&group_id) {
        if m.user_id == sender {
            continue;
        }
        outbound.read_status = m.user_id == sender;
        relay.push_json(&m.user_id, &outbound).await;
    }
}

fn require_active_member(relay: &Relay, group_id: &str, user_id: &str) -> Result<GroupMember, RelayError> {
    if relay.store.group_by_id(group_id).is_none() {
        return Err(RelayError::GroupNotFound(group_id.to_string()));
    }
    let member = relay
        .store
        .member(group_id, user_id)
        .ok_or_else(|| RelayError::NotAMember(user_id.to_string()))?;
    if member.is_banned {
        return Err(RelayError::Banned(user_id.to_string()));
    }
    Ok(member)
}

fn action_kind_str(kind: AdminActionKind) -> &'static str {
    match kind {
        AdminActionKind::Mute => "member_muted",
        AdminActionKind::Unmute => "member_unmuted",
        AdminActionKind::Ban => "member_banned",
        AdminActionKind::Unban => "member_unbanned",
        AdminActionKind::Promote => "member_promoted",
        AdminActionKind::Demote => "member_demoted",
    }
}

async fn notify_group(relay: &Relay, group_id: &str, kind: &'static str, message: &str) {
    let envelope = GroupNotificationEnvelope {
        message_type: "group_notification",
        group_id: group_id.to_string(),
        data: GroupNotificationData {
            id: format!("note_{}", Relay::now_millis()),
            group_id: group_id.to_string(),
            kind: kind.to_string(),
            message: message.to_string(),
            timestamp: Relay::now_millis(),
            metadata: serde_json::json!({}),
        },
    };
    for m in relay.store.members_excluding_banned(group_id) {
        relay.push_json(&m.user_id, &envelope).await;
    }
}

async fn disconnect_member(relay: &Relay, group_id: &str, user_id: &str, reason: &str) {
    let envelope = GroupDisconnectEnvelope {
        message_type: "group_disconnect",
        group_id: group_id.to_string(),
        reason: reason.to_string(),
    };
    relay.push_json(user_id, &envelope).await;
}

async fn notify_sender_error(relay: &Relay, sender: &str, message: &str) {
    let envelope = SystemEnvelope {
        id: format!("err_{}", Relay::now_millis()),
        from_id: "system",
        to_id: sender.to_string(),
        content: message.to_string(),
        timestamp: Relay::now_millis(),
    };
    relay.push_json(sender, &envelope).await;
}
