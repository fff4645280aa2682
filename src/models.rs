use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Group identifiers carry this fixed prefix; anything else names a direct user.
pub const GROUP_PREFIX: &str = "GROUP_";

pub fn is_group_id(id: &str) -> bool {
    id.starts_with(GROUP_PREFIX)
}

// --- Wire envelopes -------------------------------------------------------

/// Structured chat content: `{type, text?, file?}`. `file` is opaque metadata,
/// never bytes — the server never sees file data (§1 Out of scope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredContent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<Value>,
}

/// `content` is either a plain string or a structured payload (§3 Envelope).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Structured(StructuredContent),
}

impl Content {
    /// Coerce to the string comparable with the reserved control strings
    /// `delivered` | `read` | `status_update` — structured content never
    /// matches one of these, so this is the cheap discriminant check used
    /// by the router without touching the canonical-string codec path.
    pub fn as_control_str(&self) -> Option<&str> {
        match self {
            Content::Text(s) => Some(s.as_str()),
            Content::Structured(_) => None,
        }
    }
}

/// A quoted message reference (§3 `replyTo`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyTo {
    #[serde(rename = "messageId")]
    pub message_id: String,
    #[serde(rename = "fromId")]
    pub from_id: String,
    pub content: Content,
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
}

impl Default for DeliveryStatus {
    fn default() -> Self {
        DeliveryStatus::Sent
    }
}

impl<'de> serde::Deserialize<'de> for DeliveryStatus {
    /// A caller-sent empty string normalizes to `sent`, same as an omitted
    /// field (§3 "server defaults empty to `sent`") — a derived enum
    /// deserializer would instead reject `""` as an unknown variant and drop
    /// the whole envelope as malformed (§7).
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        match raw.as_str() {
            "" | "sent" => Ok(DeliveryStatus::Sent),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "read" => Ok(DeliveryStatus::Read),
            other => Err(serde::de::Error::unknown_variant(other, &["sent", "delivered", "read"])),
        }
    }
}

/// The default envelope variant: chat message or receipt (§3, §4.C).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEnvelope {
    pub id: String,
    #[serde(rename = "fromId")]
    pub from_id: String,
    #[serde(rename = "toId")]
    pub to_id: String,
    pub content: Content,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub delivered: bool,
    #[serde(default, rename = "readStatus")]
    pub read_status: bool,
    #[serde(default)]
    pub status: DeliveryStatus,
    #[serde(default, rename = "replyTo", skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<ReplyTo>,
}

impl ChatEnvelope {
    /// Fill server-side defaults: zero/missing timestamp becomes "now", and
    /// an empty status string becomes `sent` (§3 Chat envelope fields).
    pub fn with_defaults(mut self, now_millis: i64) -> Self {
        if self.timestamp == 0 {
            self.timestamp = now_millis;
        }
        self
    }

    pub fn is_receipt(&self, kind: &str) -> bool {
        self.content.as_control_str() == Some(kind)
    }
}

/// Opaque peer-to-peer session-establishment payload, forwarded verbatim
/// (§4.F). The server never inspects `payload` beyond routing by `toId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalingEnvelope {
    #[serde(rename = "fromId")]
    pub from_id: String,
    #[serde(rename = "toId")]
    pub to_id: String,
    #[serde(flatten)]
    pub payload: Value,
}

/// The tagged union the codec (§4.C) parses every inbound frame into.
#[derive(Debug, Clone)]
pub enum Envelope {
    Chat(ChatEnvelope),
    Signaling(SignalingEnvelope),
    /// Recognized but otherwise inert on the inbound path; the server only
    /// ever emits these, it never needs to parse one back in.
    Other,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupNotificationData {
    pub id: String,
    #[serde(rename = "groupId")]
    pub group_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub timestamp: i64,
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupNotificationEnvelope {
    #[serde(rename = "messageType")]
    pub message_type: &'static str,
    #[serde(rename = "groupId")]
    pub group_id: String,
    pub data: GroupNotificationData,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupDisconnectEnvelope {
    #[serde(rename = "messageType")]
    pub message_type: &'static str,
    #[serde(rename = "groupId")]
    pub group_id: String,
    pub reason: String,
}

/// A `fromId: "system"` plain-string error envelope (§7, §4.E fan-out).
#[derive(Debug, Clone, Serialize)]
pub struct SystemEnvelope {
    pub id: String,
    #[serde(rename = "fromId")]
    pub from_id: &'static str,
    #[serde(rename = "toId")]
    pub to_id: String,
    pub content: String,
    pub timestamp: i64,
}

/// `{id: "status_" + u, fromId: u, content: "status_update", status}` (§6).
#[derive(Debug, Clone, Serialize)]
pub struct PresenceEnvelope {
    pub id: String,
    #[serde(rename = "fromId")]
    pub from_id: String,
    pub content: &'static str,
    pub status: &'static str,
}

impl PresenceEnvelope {
    pub fn online(endpoint_id: &str) -> Self {
        PresenceEnvelope {
            id: format!("status_{endpoint_id}"),
            from_id: endpoint_id.to_string(),
            content: "status_update",
            status: "online",
        }
    }

    pub fn offline(endpoint_id: &str) -> Self {
        PresenceEnvelope {
            id: format!("status_{endpoint_id}"),
            from_id: endpoint_id.to_string(),
            content: "status_update",
            status: "offline",
        }
    }
}

// --- Persisted records ----------------------------------------------------

/// Persisted form of a chat envelope (§3 Direct-message record). `content`
/// and `reply_to` are canonicalized to strings by the codec before storage.
#[derive(Debug, Clone)]
pub struct DirectMessageRecord {
    pub id: String,
    pub from_id: String,
    pub to_id: String,
    pub content: String,
    pub reply_to: Option<String>,
    pub timestamp: i64,
    pub delivered: bool,
    pub read_status: bool,
    pub status: DeliveryStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "createdBy")]
    pub created_by: String,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "memberCount")]
    pub member_count: i64,
    #[serde(rename = "lastActivity", skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<i64>,
    #[serde(rename = "lastMessage", skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Member,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMember {
    #[serde(rename = "groupId")]
    pub group_id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub role: MemberRole,
    #[serde(rename = "joinedAt")]
    pub joined_at: i64,
    #[serde(rename = "isMuted")]
    pub is_muted: bool,
    #[serde(rename = "isBanned")]
    pub is_banned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct GroupMessageRecord {
    pub id: String,
    pub from_id: String,
    pub group_id: String,
    pub content: String,
    pub reply_to: Option<String>,
    pub timestamp: i64,
    pub read_by: Vec<String>,
}

// --- Control-plane DTOs ----------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "createdBy")]
    pub created_by: String,
    #[serde(default, rename = "initialMembers")]
    pub initial_members: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddMembersRequest {
    #[serde(rename = "userIds")]
    pub user_ids: Vec<String>,
    #[serde(rename = "addedBy")]
    pub added_by: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminActionKind {
    Mute,
    Unmute,
    Ban,
    Unban,
    Promote,
    Demote,
}

#[derive(Debug, Deserialize)]
pub struct AdminActionRequest {
    #[serde(rename = "performedBy")]
    pub performed_by: String,
    #[serde(rename = "targetUserId")]
    pub target_user_id: String,
    pub action: AdminActionKind,
}

#[derive(Debug, Deserialize)]
pub struct LeaveGroupRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
}
