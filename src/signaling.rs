//! WebRTC signaling relay (§4.F): forward an opaque signaling payload to its
//! named recipient, verbatim, with no persistence and no inline-delivery
//! fallback. Grounded in the router's `inline_delivery` shape (src/router.rs)
//! stripped down to its single write step — signaling is purely best-effort,
//! session establishment retries on the client side, not the server's.

use crate::models::SignalingEnvelope;
use crate::relay::Relay;

/// Forward `envelope` to `to_id` if it has a live session. Dropped silently
/// if the recipient is offline (§4.F, §9 "Signaling is fire-and-forget").
pub async fn handle(relay: &Relay, envelope: SignalingEnvelope) {
    let delivered = relay.push_json(&envelope.to_id, &envelope).await;
    if !delivered {
        tracing::debug!(to = %envelope.to_id, from = %envelope.from_id, "dropped signaling payload, recipient offline");
    }
}
