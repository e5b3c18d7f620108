//! Typed engine configuration document.
//!
//! Models the subset of the engine's JSON config the control plane
//! generates: inbounds/outbounds with shadowsocks settings, routing rules
//! and balancers, reverse portals/bridges, and the sync metadata block.

use serde::{Deserialize, Serialize};

pub const API_TAG: &str = "api";
pub const OUT_TAG: &str = "out";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    pub log: Log,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<Api>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<Policy>,
    pub inbounds: Vec<Inbound>,
    pub outbounds: Vec<Outbound>,
    pub routing: Routing,
    #[serde(default, skip_serializing_if = "Reverse::is_empty")]
    pub reverse: Reverse,
}

/// Who generated this config and when; carried on pushed/pulled node
/// configs so operators can tell stale documents apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub updated_at: String,
    pub updated_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    pub loglevel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Api {
    pub tag: String,
    pub services: Vec<String>,
}

/// Empty object enabling the engine's stats collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSettings {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub levels: PolicyLevels,
    pub system: SystemPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyLevels {
    #[serde(rename = "0")]
    pub zero: LevelPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelPolicy {
    pub stats_user_uplink: bool,
    pub stats_user_downlink: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemPolicy {
    pub stats_inbound_uplink: bool,
    pub stats_inbound_downlink: bool,
    pub stats_outbound_uplink: bool,
    pub stats_outbound_downlink: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inbound {
    pub tag: String,
    pub listen: String,
    pub port: u16,
    pub protocol: String,
    pub settings: InboundSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clients: Vec<Client>,
}

/// One user credential on a shadowsocks inbound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    /// User id string; doubles as the `user>>><id>>>>…` counter key.
    pub email: String,
    pub password: String,
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outbound {
    pub tag: String,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<OutboundSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutboundSettings {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<ServerEndpoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEndpoint {
    pub address: String,
    pub port: u16,
    pub method: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Routing {
    pub rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub balancers: Vec<Balancer>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inbound_tag: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbound_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balancer_tag: Option<String>,
}

impl Rule {
    pub fn to_outbound(inbound: &str, outbound: &str) -> Self {
        Self {
            rule_type: "field".into(),
            inbound_tag: vec![inbound.into()],
            outbound_tag: Some(outbound.into()),
            ..Self::default()
        }
    }

    pub fn to_balancer(inbound: &str, balancer: &str) -> Self {
        Self {
            rule_type: "field".into(),
            inbound_tag: vec![inbound.into()],
            balancer_tag: Some(balancer.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balancer {
    pub tag: String,
    pub selector: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reverse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bridges: Vec<ReverseItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub portals: Vec<ReverseItem>,
}

impl Reverse {
    pub fn is_empty(&self) -> bool {
        self.bridges.is_empty() && self.portals.is_empty()
    }
}

/// One end of a reverse tunnel, joined to its peer by the domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverseItem {
    pub tag: String,
    pub domain: String,
}

impl EngineConfig {
    /// Base config: the stats api inbound (port filled in by the writer),
    /// the `out` freedom outbound, and stats collection enabled.
    pub fn new(log_level: &str) -> Self {
        Self {
            metadata: None,
            log: Log {
                loglevel: log_level.to_string(),
            },
            api: Some(Api {
                tag: API_TAG.into(),
                services: vec!["StatsService".into()],
            }),
            stats: Some(StatsSettings::default()),
            policy: Some(Policy {
                levels: PolicyLevels {
                    zero: LevelPolicy {
                        stats_user_uplink: true,
                        stats_user_downlink: true,
                    },
                },
                system: SystemPolicy {
                    stats_inbound_uplink: true,
                    stats_inbound_downlink: true,
                    stats_outbound_uplink: true,
                    stats_outbound_downlink: true,
                },
            }),
            inbounds: vec![Inbound {
                tag: API_TAG.into(),
                listen: "127.0.0.1".into(),
                port: 0,
                protocol: "dokodemo-door".into(),
                settings: InboundSettings {
                    address: Some("127.0.0.1".into()),
                    ..InboundSettings::default()
                },
            }],
            outbounds: vec![Outbound {
                tag: OUT_TAG.into(),
                protocol: "freedom".into(),
                settings: None,
            }],
            routing: Routing {
                rules: vec![Rule::to_outbound(API_TAG, API_TAG)],
                balancers: Vec::new(),
            },
            reverse: Reverse::default(),
        }
    }

    pub fn make_shadowsocks_inbound(
        tag: &str,
        password: &str,
        method: &str,
        network: &str,
        port: u16,
        clients: Vec<Client>,
    ) -> Inbound {
        Inbound {
            tag: tag.to_string(),
            listen: "0.0.0.0".into(),
            port,
            protocol: "shadowsocks".into(),
            settings: InboundSettings {
                address: None,
                method: Some(method.to_string()),
                password: Some(password.to_string()),
                network: Some(network.to_string()),
                clients,
            },
        }
    }

    pub fn make_shadowsocks_outbound(
        tag: &str,
        address: &str,
        password: &str,
        method: &str,
        port: u16,
    ) -> Outbound {
        Outbound {
            tag: tag.to_string(),
            protocol: "shadowsocks".into(),
            settings: Some(OutboundSettings {
                servers: vec![ServerEndpoint {
                    address: address.to_string(),
                    port,
                    method: method.to_string(),
                    password: password.to_string(),
                }],
            }),
        }
    }

    pub fn find_inbound(&self, tag: &str) -> Option<&Inbound> {
        self.inbounds.iter().find(|i| i.tag == tag)
    }

    pub fn find_inbound_mut(&mut self, tag: &str) -> Option<&mut Inbound> {
        self.inbounds.iter_mut().find(|i| i.tag == tag)
    }

    pub fn find_outbound(&self, tag: &str) -> Option<&Outbound> {
        self.outbounds.iter().find(|o| o.tag == tag)
    }

    pub fn find_balancer_mut(&mut self, tag: &str) -> Option<&mut Balancer> {
        self.routing.balancers.iter_mut().find(|b| b.tag == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_config_has_api_and_out() {
        let config = EngineConfig::new("warning");
        assert!(config.find_inbound(API_TAG).is_some());
        assert!(config.find_outbound(OUT_TAG).is_some());
        assert_eq!(config.log.loglevel, "warning");
    }

    #[test]
    fn shadowsocks_inbound_shape() {
        let clients = vec![Client {
            email: "3".into(),
            password: "pw".into(),
            method: "chacha20-ietf-poly1305".into(),
        }];
        let inbound = EngineConfig::make_shadowsocks_inbound(
            "relay",
            "key",
            "chacha20-ietf-poly1305",
            "tcp,udp",
            8443,
            clients,
        );
        assert_eq!(inbound.tag, "relay");
        assert_eq!(inbound.port, 8443);
        assert_eq!(inbound.settings.clients.len(), 1);
        assert_eq!(inbound.settings.network.as_deref(), Some("tcp,udp"));
    }

    #[test]
    fn serializes_without_empty_sections() {
        let config = EngineConfig::new("warning");
        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("metadata").is_none());
        assert!(json.get("reverse").is_none());
        assert!(json.get("routing").unwrap().get("balancers").is_none());
    }

    #[test]
    fn round_trips() {
        let mut config = EngineConfig::new("debug");
        config.inbounds.push(EngineConfig::make_shadowsocks_inbound(
            "internal-3",
            "key",
            "2022-blake3-aes-128-gcm",
            "tcp",
            40001,
            Vec::new(),
        ));
        config.reverse.portals.push(ReverseItem {
            tag: "portal-3".into(),
            domain: "s3.reverse.proxy".into(),
        });
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
