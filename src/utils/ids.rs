//! Opaque identifiers for conversations and messages.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a short, URL-safe identifier: random base36 followed by the
/// current time in milliseconds, also base36.
pub fn generate_id() -> String {
    let mut bytes = [0u8; 8];
    let random = match getrandom::fill(&mut bytes) {
        Ok(()) => u64::from_le_bytes(bytes),
        Err(err) => {
            tracing::debug!("system randomness unavailable, using counter ids: {err}");
            let nanos = Utc::now().timestamp_subsec_nanos() as u64;
            FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed).rotate_left(32) ^ nanos
        }
    };
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    format!("{}{}", to_base36(random), to_base36(millis))
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::with_capacity(13);
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
