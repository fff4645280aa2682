//! Endpoint identifier minting (§4.H, §3). Grounded in the teacher's
//! `generate_admin_key`/`generate_webhook_token` helpers (src/db.rs) —
//! same "format a short random token" shape, generalized from hex-encoded
//! UUID bits to uniform-random uppercase-alphanumeric characters.

use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const DEFAULT_ID_LEN: usize = 4;

/// Mint a random identifier, uniform over uppercase-alphanumeric characters.
/// The server performs no collision detection (§9 "Identifier collisions") —
/// callers may retry on collision, but this function is allowed to return
/// duplicates.
pub fn generate_endpoint_id() -> String {
    generate_endpoint_id_of_len(DEFAULT_ID_LEN)
}

pub fn generate_endpoint_id_of_len(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..ALPHABET.len());
            ALPHABET[idx] as char
        })
        .collect()
}

pub fn generate_group_id() -> String {
    format!("{}{}", crate::models::GROUP_PREFIX, generate_endpoint_id())
}
