//! Fleet-wide settings.

use flotilla_core::defaults;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub admin_password: String,
    /// Host advertised to nodes and profile links.
    pub host: String,
    /// Display-only multiplier applied to reported usage.
    pub traffic_ratio: f64,
    /// Forward proxy used as the push fallback path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_policy: Option<ResetPolicy>,
    /// Role inbound ports; 0 disables a role.
    #[serde(default)]
    pub relay_port: u16,
    #[serde(default)]
    pub reverse_port: u16,
    #[serde(default)]
    pub direct_port: u16,
    #[serde(default)]
    pub encryption_options: EncryptionOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetPolicy {
    Monthly,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncryptionOptions {
    pub vmess: Vec<String>,
    pub vless: Vec<String>,
    pub trojan: Vec<String>,
    pub ss: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            admin_password: "password".into(),
            host: "127.0.0.1".into(),
            traffic_ratio: 1.0,
            forward_proxy: None,
            reset_policy: None,
            relay_port: defaults::RELAY_PORT,
            reverse_port: defaults::REVERSE_PORT,
            direct_port: defaults::DIRECT_PORT,
            encryption_options: EncryptionOptions {
                vmess: ["auto", "none", "zero", "aes-128-gcm"]
                    .map(String::from)
                    .to_vec(),
                vless: vec!["none".into()],
                trojan: vec!["none".into()],
                ss: [
                    "aes-128-gcm",
                    "aes-256-gcm",
                    "chacha20-poly1305",
                    "xchacha20-poly1305",
                    "chacha20-ietf-poly1305",
                    "2022-blake3-aes-128-gcm",
                    "2022-blake3-aes-256-gcm",
                ]
                .map(String::from)
                .to_vec(),
            },
        }
    }
}

impl Settings {
    pub fn role_ports(&self) -> [u16; 3] {
        [self.relay_port, self.reverse_port, self.direct_port]
    }
}
