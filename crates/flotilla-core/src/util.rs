//! Byte math, key generation, and local port probing.

use std::net::TcpListener;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};

const BYTES_PER_GB: f64 = 1_073_741_824.0;

/// Current time as epoch milliseconds.
pub fn now_ms() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Key generation failed because the OS entropy source was unavailable.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("entropy: {0}")]
    Entropy(#[from] rand::Error),
}

/// Generate a 32-byte key, base64-encoded.
pub fn key32() -> Result<String, KeyError> {
    let mut key = [0u8; 32];
    OsRng.try_fill_bytes(&mut key)?;
    Ok(STANDARD.encode(key))
}

/// Generate a random alphanumeric token of the given length.
pub fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Sum two counters, resetting to 0 on overflow (wrapped counters are
/// treated as corrupt).
pub fn safe_sum(a: i64, b: i64) -> i64 {
    a.checked_add(b).unwrap_or(0)
}

/// Round to the given number of decimal places.
pub fn round_float(val: f64, precision: u32) -> f64 {
    let ratio = 10f64.powi(precision as i32);
    (val * ratio).round() / ratio
}

/// Convert a byte counter to gigabytes, rounded to 2 decimals.
/// Negative inputs clamp to 0.
pub fn bytes_to_gb(bytes: i64) -> f64 {
    if bytes < 0 {
        return 0.0;
    }
    round_float(bytes as f64 / BYTES_PER_GB, 2)
}

/// Convert gigabytes to a byte counter; non-finite, negative, or
/// overflowing inputs yield 0.
pub fn gb_to_bytes(gb: f64) -> i64 {
    if !gb.is_finite() || gb < 0.0 {
        return 0;
    }
    let bytes = gb * BYTES_PER_GB;
    if !bytes.is_finite() || bytes > i64::MAX as f64 {
        return 0;
    }
    bytes as i64
}

/// Ask the OS for a currently-free TCP port by binding ephemeral and
/// releasing immediately. The port may be taken again before use; callers
/// tolerate the race.
pub fn free_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Whether the given port can be bound right now.
pub fn port_free(port: u16) -> bool {
    TcpListener::bind(("0.0.0.0", port)).is_ok()
}

/// All non-zero ports are unique (0 means disabled).
pub fn ports_distinct(ports: &[u16]) -> bool {
    let mut seen = std::collections::HashSet::new();
    for &port in ports {
        if port != 0 && !seen.insert(port) {
            return false;
        }
    }
    true
}
