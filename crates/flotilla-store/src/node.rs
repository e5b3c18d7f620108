//! Node entity: one remote worker in the fleet.

use serde::{Deserialize, Serialize};

/// Sync status of a node's config channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    /// No attempt has completed yet (or a re-push is due).
    #[default]
    #[serde(rename = "")]
    Processing,
    #[serde(rename = "available")]
    Available,
    /// Reachable, but only through the configured forward proxy.
    #[serde(rename = "dirty")]
    Dirty,
    #[serde(rename = "unavailable")]
    Unavailable,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Shadowsocks,
    Vmess,
    Vless,
    Trojan,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Tcp,
    Ws,
    Http,
    Grpc,
    Kcp,
    Httpupgrade,
    Xhttp,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    #[default]
    None,
    Tls,
    Reality,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TlsSettings {
    #[serde(default)]
    pub server_name: String,
    #[serde(default)]
    pub allow_insecure: bool,
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub alpn: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealitySettings {
    #[serde(default)]
    pub dest: String,
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub short_ids: Vec<String>,
    #[serde(default)]
    pub server_names: Vec<String>,
    #[serde(default)]
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Monotonic numeric id; never reused.
    pub id: i64,
    pub host: String,
    /// Control channel.
    pub http_port: u16,
    pub http_token: String,
    /// Data-plane inbound the node listens on for user traffic.
    pub listening_port: u16,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub transport: Transport,
    #[serde(default)]
    pub security: Security,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reality: Option<RealitySettings>,
    #[serde(default)]
    pub encryption: String,
    #[serde(default)]
    pub push_status: NodeStatus,
    #[serde(default)]
    pub pull_status: NodeStatus,
    /// Epoch milliseconds of the last successful push / pull.
    #[serde(default)]
    pub pushed_at: i64,
    #[serde(default)]
    pub pulled_at: i64,
    #[serde(default)]
    pub usage: f64,
    #[serde(default)]
    pub usage_bytes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_like_the_wire_format() {
        assert_eq!(
            serde_json::to_string(&NodeStatus::Processing).unwrap(),
            r#""""#
        );
        assert_eq!(
            serde_json::to_string(&NodeStatus::Dirty).unwrap(),
            r#""dirty""#
        );
        let status: NodeStatus = serde_json::from_str(r#""unavailable""#).unwrap();
        assert_eq!(status, NodeStatus::Unavailable);
    }

    #[test]
    fn enums_use_lowercase_wire_names() {
        assert_eq!(
            serde_json::to_string(&Protocol::Shadowsocks).unwrap(),
            r#""shadowsocks""#
        );
        assert_eq!(
            serde_json::to_string(&Transport::Httpupgrade).unwrap(),
            r#""httpupgrade""#
        );
        assert_eq!(
            serde_json::to_string(&Security::Reality).unwrap(),
            r#""reality""#
        );
    }
}
