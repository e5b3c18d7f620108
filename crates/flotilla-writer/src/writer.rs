//! Local and mirror config rendering.

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use flotilla_core::defaults::{SHADOWSOCKS_2022_METHOD, SHADOWSOCKS_METHOD};
use flotilla_core::util::key32;
use flotilla_core::KeyError;
use flotilla_engine::{
    Balancer, Client, EngineConfig, Metadata, ReverseItem, Rule, API_TAG, OUT_TAG,
};
use flotilla_store::{Content, Node, User};

use crate::ports::PortAllocator;

const RELAY_BALANCER: &str = "relay";
const PORTAL_BALANCER: &str = "portal";

#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error("entropy: {0}")]
    Entropy(#[from] KeyError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("time: {0}")]
    Time(#[from] time::error::Format),
}

fn internal_tag(node_id: i64) -> String {
    format!("internal-{node_id}")
}

fn relay_tag(node_id: i64) -> String {
    format!("relay-{node_id}")
}

fn portal_tag(node_id: i64) -> String {
    format!("portal-{node_id}")
}

/// Per-node reverse tunnel domain; matched on the node side as `full:`.
fn reverse_domain(node_id: i64) -> String {
    format!("s{node_id}.reverse.proxy")
}

pub struct Writer {
    log_level: String,
}

impl Writer {
    pub fn new(log_level: impl Into<String>) -> Self {
        Self {
            log_level: log_level.into(),
        }
    }

    fn clients(users: &[User]) -> Vec<Client> {
        users
            .iter()
            .filter(|u| u.enabled)
            .map(|u| Client {
                email: u.id.to_string(),
                password: u.shadowsocks_password.clone(),
                method: u.shadowsocks_method.clone(),
            })
            .collect()
    }

    /// Render the manager's own engine config from the fleet state.
    pub fn local_config(
        &self,
        content: &Content,
        ports: &mut dyn PortAllocator,
    ) -> Result<EngineConfig, WriterError> {
        let clients = Self::clients(&content.users);
        let mut config = EngineConfig::new(&self.log_level);

        let api_port = ports.free_port()?;
        if let Some(api) = config.find_inbound_mut(API_TAG) {
            api.port = api_port;
        }

        let settings = &content.settings;
        if !clients.is_empty() {
            let roles = [
                ("relay", settings.relay_port),
                ("reverse", settings.reverse_port),
                ("direct", settings.direct_port),
            ];
            for (tag, port) in roles {
                if port == 0 {
                    continue;
                }
                let key = key32()?;
                // Losing the port race means skipping the role, not failing.
                if ports.port_free(port) {
                    config.inbounds.push(EngineConfig::make_shadowsocks_inbound(
                        tag,
                        &key,
                        SHADOWSOCKS_METHOD,
                        "tcp,udp",
                        port,
                        clients.clone(),
                    ));
                }
            }

            config.routing.rules.push(Rule::to_outbound("direct", OUT_TAG));
            if !content.nodes.is_empty() {
                config
                    .routing
                    .rules
                    .push(Rule::to_balancer("relay", RELAY_BALANCER));
                config
                    .routing
                    .rules
                    .push(Rule::to_balancer("reverse", PORTAL_BALANCER));
            }
        }

        if !content.nodes.is_empty() {
            config.routing.balancers.push(Balancer {
                tag: RELAY_BALANCER.into(),
                selector: Vec::new(),
            });
            config.routing.balancers.push(Balancer {
                tag: PORTAL_BALANCER.into(),
                selector: Vec::new(),
            });
        }

        for node in &content.nodes {
            // Manager end of the node's reverse tunnel.
            let inbound_port = ports.free_port()?;
            let key = key32()?;
            config.inbounds.push(EngineConfig::make_shadowsocks_inbound(
                &internal_tag(node.id),
                &key,
                SHADOWSOCKS_2022_METHOD,
                "tcp",
                inbound_port,
                Vec::new(),
            ));
            config.reverse.portals.push(ReverseItem {
                tag: portal_tag(node.id),
                domain: reverse_domain(node.id),
            });
            config
                .routing
                .rules
                .push(Rule::to_outbound(&internal_tag(node.id), &portal_tag(node.id)));
            if let Some(balancer) = config.find_balancer_mut(PORTAL_BALANCER) {
                balancer.selector.push(portal_tag(node.id));
            }

            // Relay path toward the node.
            let outbound_port = ports.free_port()?;
            let key = key32()?;
            config.outbounds.push(EngineConfig::make_shadowsocks_outbound(
                &relay_tag(node.id),
                &node.host,
                &key,
                SHADOWSOCKS_2022_METHOD,
                outbound_port,
            ));
            if let Some(balancer) = config.find_balancer_mut(RELAY_BALANCER) {
                balancer.selector.push(relay_tag(node.id));
            }
        }

        Ok(config)
    }

    /// Render the mirror config for one node from the fleet state and the
    /// currently-loaded local config. Deterministic over its inputs.
    pub fn remote_config(
        &self,
        content: &Content,
        node: &Node,
        local: &EngineConfig,
        updated_at: OffsetDateTime,
        shared_password: &str,
    ) -> Result<EngineConfig, WriterError> {
        let mut config = EngineConfig::new(&self.log_level);
        config.metadata = Some(Metadata {
            updated_at: updated_at.format(&Rfc3339)?,
            updated_by: content.settings.host.clone(),
        });

        // Node end of the relay path: mirror of the local relay-<id>
        // outbound, so both sides agree on credentials.
        if let Some(server) = local
            .find_outbound(&relay_tag(node.id))
            .and_then(|o| o.settings.as_ref())
            .and_then(|s| s.servers.first())
        {
            config.inbounds.push(EngineConfig::make_shadowsocks_inbound(
                "direct",
                &server.password,
                &server.method,
                "tcp",
                server.port,
                Vec::new(),
            ));
            config.routing.rules.push(Rule::to_outbound("direct", OUT_TAG));
        }

        // Node end of the reverse tunnel: mirror of the local
        // internal-<id> inbound.
        if let Some(internal) = local.find_inbound(&internal_tag(node.id)) {
            config.outbounds.push(EngineConfig::make_shadowsocks_outbound(
                "internal",
                &content.settings.host,
                internal.settings.password.as_deref().unwrap_or_default(),
                internal.settings.method.as_deref().unwrap_or_default(),
                internal.port,
            ));
            config.reverse.bridges.push(ReverseItem {
                tag: "bridge".into(),
                domain: reverse_domain(node.id),
            });
            config.routing.rules.push(Rule {
                rule_type: "field".into(),
                inbound_tag: vec!["bridge".into()],
                domain: vec![format!("full:{}", reverse_domain(node.id))],
                outbound_tag: Some("internal".into()),
                balancer_tag: None,
            });
            config.routing.rules.push(Rule::to_outbound("bridge", OUT_TAG));
        }

        // User entry point on the node. Per-protocol inbounds
        // (vmess/vless/trojan) are not wired up yet; every node protocol
        // takes the shadowsocks path.
        config.inbounds.push(EngineConfig::make_shadowsocks_inbound(
            "remote",
            shared_password,
            SHADOWSOCKS_METHOD,
            "tcp",
            node.listening_port,
            Self::clients(&content.users),
        ));
        config.routing.rules.push(Rule::to_outbound("remote", OUT_TAG));

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedPorts;
    use flotilla_store::{NodeStatus, Settings, Stats};
    use time::macros::datetime;

    fn user(id: i64, enabled: bool) -> User {
        User {
            id,
            identity: format!("{id:032x}"),
            enabled,
            shadowsocks_method: SHADOWSOCKS_METHOD.into(),
            shadowsocks_password: format!("user-key-{id}"),
            usage: 0.0,
            usage_bytes: 0,
            quota: 0.0,
            usage_reset_at: 1,
        }
    }

    fn node(id: i64) -> Node {
        Node {
            id,
            host: format!("10.0.0.{id}"),
            http_port: 8080,
            http_token: "token".into(),
            listening_port: 8446,
            protocol: Default::default(),
            transport: Default::default(),
            security: Default::default(),
            tls: None,
            reality: None,
            encryption: String::new(),
            push_status: NodeStatus::Processing,
            pull_status: NodeStatus::Processing,
            pushed_at: 0,
            pulled_at: 0,
            usage: 0.0,
            usage_bytes: 0,
        }
    }

    fn content(users: Vec<User>, nodes: Vec<Node>) -> Content {
        Content {
            settings: Settings::default(),
            stats: Stats::default(),
            users,
            nodes,
        }
    }

    #[test]
    fn one_user_no_nodes_has_roles_only() {
        let writer = Writer::new("warning");
        let content = content(vec![user(1, true)], Vec::new());
        let config = writer
            .local_config(&content, &mut FixedPorts::new(40000))
            .unwrap();

        for tag in ["relay", "reverse", "direct"] {
            let inbound = config.find_inbound(tag).unwrap();
            assert_eq!(inbound.settings.clients.len(), 1);
        }
        assert!(config.routing.balancers.is_empty());
        assert!(config.reverse.portals.is_empty());
        assert!(config.find_outbound("relay-1").is_none());
    }

    #[test]
    fn one_node_no_users_has_tunnel_only() {
        let writer = Writer::new("warning");
        let content = content(Vec::new(), vec![node(4)]);
        let config = writer
            .local_config(&content, &mut FixedPorts::new(40000))
            .unwrap();

        assert!(config.find_inbound("relay").is_none());
        assert!(config.find_inbound("reverse").is_none());
        assert!(config.find_inbound("direct").is_none());

        assert!(config.find_inbound("internal-4").is_some());
        assert!(config.find_outbound("relay-4").is_some());
        assert_eq!(config.reverse.portals.len(), 1);
        assert_eq!(config.reverse.portals[0].domain, "s4.reverse.proxy");

        assert_eq!(config.routing.balancers.len(), 2);
        for balancer in &config.routing.balancers {
            assert_eq!(balancer.selector.len(), 1);
        }
    }

    #[test]
    fn disabled_role_port_is_omitted() {
        let writer = Writer::new("warning");
        let mut content = content(vec![user(1, true)], Vec::new());
        content.settings.reverse_port = 0;
        let config = writer
            .local_config(&content, &mut FixedPorts::new(40000))
            .unwrap();
        assert!(config.find_inbound("relay").is_some());
        assert!(config.find_inbound("reverse").is_none());
        assert!(config.find_inbound("direct").is_some());
    }

    #[test]
    fn lost_port_race_skips_the_role() {
        let writer = Writer::new("warning");
        let content = content(vec![user(1, true)], Vec::new());
        let mut ports = FixedPorts::with_busy(40000, [Settings::default().relay_port]);
        let config = writer.local_config(&content, &mut ports).unwrap();
        assert!(config.find_inbound("relay").is_none());
        assert!(config.find_inbound("reverse").is_some());
    }

    #[test]
    fn disabled_users_are_not_clients() {
        let writer = Writer::new("warning");
        let content = content(vec![user(1, false)], Vec::new());
        let config = writer
            .local_config(&content, &mut FixedPorts::new(40000))
            .unwrap();
        assert!(config.find_inbound("relay").is_none());
        assert!(config.find_inbound("direct").is_none());
    }

    #[test]
    fn mirror_credentials_match_local_config() {
        let writer = Writer::new("warning");
        let content = content(vec![user(1, true)], vec![node(2)]);
        let local = writer
            .local_config(&content, &mut FixedPorts::new(40000))
            .unwrap();
        let remote = writer
            .remote_config(
                &content,
                &content.nodes[0],
                &local,
                datetime!(2025-06-01 12:00 UTC),
                "shared-password",
            )
            .unwrap();

        let relay_out = local.find_outbound("relay-2").unwrap();
        let server = &relay_out.settings.as_ref().unwrap().servers[0];
        let direct_in = remote.find_inbound("direct").unwrap();
        assert_eq!(direct_in.settings.password.as_deref(), Some(server.password.as_str()));
        assert_eq!(direct_in.settings.method.as_deref(), Some(server.method.as_str()));
        assert_eq!(direct_in.port, server.port);

        let internal_in = local.find_inbound("internal-2").unwrap();
        let internal_out = remote.find_outbound("internal").unwrap();
        let out_server = &internal_out.settings.as_ref().unwrap().servers[0];
        assert_eq!(Some(out_server.password.as_str()), internal_in.settings.password.as_deref());
        assert_eq!(Some(out_server.method.as_str()), internal_in.settings.method.as_deref());
        assert_eq!(out_server.port, internal_in.port);
        assert_eq!(out_server.address, content.settings.host);
    }

    #[test]
    fn mirror_is_deterministic_over_its_inputs() {
        let writer = Writer::new("warning");
        let content = content(vec![user(1, true)], vec![node(2)]);
        let local = writer
            .local_config(&content, &mut FixedPorts::new(40000))
            .unwrap();
        let at = datetime!(2025-06-01 12:00 UTC);
        let a = writer
            .remote_config(&content, &content.nodes[0], &local, at, "pw")
            .unwrap();
        let b = writer
            .remote_config(&content, &content.nodes[0], &local, at, "pw")
            .unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn mirror_carries_metadata_and_shared_password() {
        let writer = Writer::new("warning");
        let content = content(vec![user(1, true), user(2, false)], vec![node(3)]);
        let local = writer
            .local_config(&content, &mut FixedPorts::new(40000))
            .unwrap();
        let remote = writer
            .remote_config(
                &content,
                &content.nodes[0],
                &local,
                datetime!(2025-06-01 12:00 UTC),
                "shared-password",
            )
            .unwrap();

        let metadata = remote.metadata.as_ref().unwrap();
        assert_eq!(metadata.updated_at, "2025-06-01T12:00:00Z");
        assert_eq!(metadata.updated_by, "127.0.0.1");

        let remote_in = remote.find_inbound("remote").unwrap();
        assert_eq!(remote_in.port, 8446);
        assert_eq!(remote_in.settings.password.as_deref(), Some("shared-password"));
        // only the enabled user is a client
        assert_eq!(remote_in.settings.clients.len(), 1);
        assert_eq!(remote_in.settings.clients[0].email, "1");

        assert_eq!(remote.reverse.bridges.len(), 1);
        assert_eq!(remote.reverse.bridges[0].domain, "s3.reverse.proxy");
        let bridge_rule = remote
            .routing
            .rules
            .iter()
            .find(|r| r.inbound_tag == ["bridge"] && !r.domain.is_empty())
            .unwrap();
        assert_eq!(bridge_rule.domain, vec!["full:s3.reverse.proxy"]);
    }
}
