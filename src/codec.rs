//! Envelope codec (§4.C): parse/emit the tagged JSON envelopes on each
//! session, and the single helper that canonicalizes polymorphic `content`
//! into the string form the store persists.

use crate::models::{ChatEnvelope, Content, Envelope, ReplyTo};
use serde_json::Value;

/// Parse one inbound JSON frame into the tagged variant the rest of the
/// server dispatches on. `messageType == webrtc_signaling` selects the
/// signaling variant; anything else (absent or unrecognized) falls through
/// to the chat/receipt path, the default per §4.C.
pub fn decode(frame: &str) -> serde_json::Result<Envelope> {
    let raw: Value = serde_json::from_str(frame)?;
    let message_type = raw.get("messageType").and_then(Value::as_str);

    match message_type {
        Some("webrtc_signaling") => {
            let signaling = serde_json::from_value(raw)?;
            Ok(Envelope::Signaling(signaling))
        }
        // group_notification / group_disconnect are server → client only;
        // the server never needs to decode one on the inbound path.
        Some("group_notification") | Some("group_disconnect") => Ok(Envelope::Other),
        _ => {
            let chat = serde_json::from_value(raw)?;
            Ok(Envelope::Chat(chat))
        }
    }
}

pub fn encode<T: serde::Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(value)
}

/// Canonicalize the polymorphic `content` field to a string for persistence:
/// strings pass through, structured content becomes its JSON serialization
/// (§4.C, §9 "Polymorphic content").
pub fn canonicalize_content(content: &Content) -> String {
    match content {
        Content::Text(s) => s.clone(),
        Content::Structured(structured) => {
            serde_json::to_string(structured).unwrap_or_default()
        }
    }
}

/// Inverse of [`canonicalize_content`]: if the persisted string parses as the
/// structured shape, re-inflate it; otherwise treat it as plain text (§9).
pub fn inflate_content(stored: &str) -> Content {
    match serde_json::from_str::<crate::models::StructuredContent>(stored) {
        Ok(structured) if structured.text.is_some() || structured.file.is_some() => {
            Content::Structured(structured)
        }
        _ => Content::Text(stored.to_string()),
    }
}

pub fn canonicalize_reply_to(reply_to: &Option<ReplyTo>) -> Option<String> {
    reply_to.as_ref().and_then(|r| serde_json::to_string(r).ok())
}

pub fn inflate_reply_to(stored: &Option<String>) -> Option<ReplyTo> {
    stored
        .as_ref()
        .and_then(|s| serde_json::from_str(s).ok())
}

pub fn decode_chat_for_test(frame: &str) -> serde_json::Result<ChatEnvelope> {
    serde_json::from_str(frame)
}
