//! User entity.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Monotonic numeric id; never reused, even across deletions.
    pub id: i64,
    /// Opaque stable identity (uuid hex), used in profile links.
    pub identity: String,
    pub enabled: bool,
    pub shadowsocks_method: String,
    /// 32-byte base64 credential.
    pub shadowsocks_password: String,
    /// Usage in GB, always `bytes_to_gb(usage_bytes)`.
    pub usage: f64,
    pub usage_bytes: i64,
    /// Quota in GB; 0 means unlimited.
    pub quota: f64,
    /// Epoch seconds of the last usage reset.
    pub usage_reset_at: i64,
}

impl User {
    /// Whether the quota is exhausted (0 = unlimited).
    pub fn over_quota(&self) -> bool {
        self.quota > 0.0 && self.usage > self.quota
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(usage: f64, quota: f64) -> User {
        User {
            id: 1,
            identity: "a".repeat(32),
            enabled: true,
            shadowsocks_method: "chacha20-ietf-poly1305".into(),
            shadowsocks_password: "pw".into(),
            usage,
            usage_bytes: 0,
            quota,
            usage_reset_at: 0,
        }
    }

    #[test]
    fn zero_quota_is_unlimited() {
        assert!(!user(1000.0, 0.0).over_quota());
        assert!(user(10.01, 10.0).over_quota());
        assert!(!user(10.0, 10.0).over_quota());
    }
}
