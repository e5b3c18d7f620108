//! Counter reconciliation, pull-liveness sweeping, and usage resets.
//!
//! Pure over the fleet state; the coordinator calls these with the store
//! lock held.

use std::collections::HashMap;

use time::OffsetDateTime;
use tracing::{debug, info};

use flotilla_core::defaults::PULL_LIVENESS_WINDOW_MS;
use flotilla_core::util::{bytes_to_gb, safe_sum};
use flotilla_engine::StatEntry;
use flotilla_store::{Content, NodeStatus};

/// Apply counters from the local engine. Returns true when a quota breach
/// disabled a user and a config sync is due.
pub(crate) fn apply_local_counters(content: &mut Content, entries: &[StatEntry]) -> bool {
    let mut users: HashMap<&str, i64> = HashMap::new();
    let mut nodes: HashMap<&str, i64> = HashMap::new();

    for entry in entries {
        let Some((domain, key)) = entry.domain_key() else {
            continue;
        };
        match domain {
            "user" => *users.entry(key).or_default() += entry.value,
            "inbound" => {
                if let Some(id) = key.strip_prefix("internal-") {
                    *nodes.entry(id).or_default() += entry.value;
                } else if matches!(key, "reverse" | "relay" | "direct") {
                    content.stats.total_usage_bytes =
                        safe_sum(content.stats.total_usage_bytes, entry.value);
                }
            }
            "outbound" => {
                if let Some(id) = key.strip_prefix("relay-") {
                    *nodes.entry(id).or_default() += entry.value;
                }
            }
            _ => {}
        }
    }

    for node in &mut content.nodes {
        if let Some(&bytes) = nodes.get(node.id.to_string().as_str()) {
            node.usage_bytes = safe_sum(node.usage_bytes, bytes);
        }
        node.usage = bytes_to_gb(node.usage_bytes);
    }

    content.stats.total_usage = bytes_to_gb(content.stats.total_usage_bytes);

    apply_user_counters(content, &users)
}

/// Apply counters pulled from one node. Only the node's own `remote`
/// inbound contributes to its usage; user counters apply as usual.
pub(crate) fn apply_remote_counters(
    content: &mut Content,
    node_id: i64,
    entries: &[StatEntry],
) -> bool {
    let mut users: HashMap<&str, i64> = HashMap::new();
    let mut node_bytes: i64 = 0;

    for entry in entries {
        let Some((domain, key)) = entry.domain_key() else {
            continue;
        };
        match (domain, key) {
            ("user", id) => *users.entry(id).or_default() += entry.value,
            ("inbound", "remote") => node_bytes += entry.value,
            _ => {}
        }
    }

    if let Some(node) = content.find_node_mut(node_id) {
        node.usage_bytes = safe_sum(node.usage_bytes, node_bytes);
        node.usage = bytes_to_gb(node.usage_bytes);
    }

    content.stats.total_usage_bytes = safe_sum(content.stats.total_usage_bytes, node_bytes);
    content.stats.total_usage = bytes_to_gb(content.stats.total_usage_bytes);

    apply_user_counters(content, &users)
}

fn apply_user_counters(content: &mut Content, users: &HashMap<&str, i64>) -> bool {
    let mut should_sync = false;
    for user in &mut content.users {
        let Some(&bytes) = users.get(user.id.to_string().as_str()) else {
            continue;
        };
        user.usage_bytes = safe_sum(user.usage_bytes, bytes);
        user.usage = bytes_to_gb(user.usage_bytes);
        if user.over_quota() {
            user.enabled = false;
            should_sync = true;
            debug!(user = user.id, "user disabled: quota exhausted");
        }
    }
    should_sync
}

/// Mark nodes that have not pulled their config within the liveness window
/// as unavailable. Returns true when any status changed.
pub(crate) fn sweep_pull_statuses(content: &mut Content, now_ms: i64) -> bool {
    let mut changed = false;
    for node in &mut content.nodes {
        if now_ms - node.pulled_at > PULL_LIVENESS_WINDOW_MS
            && node.pull_status != NodeStatus::Unavailable
        {
            info!(node = node.id, "node marked unavailable: pull overdue");
            node.pull_status = NodeStatus::Unavailable;
            changed = true;
        }
    }
    changed
}

/// Reset usage for every user whose last reset falls in an earlier month.
/// Returns true when any user changed.
pub(crate) fn reset_expired_usages(content: &mut Content, now: OffsetDateTime) -> bool {
    let mut changed = false;
    for user in &mut content.users {
        let last = OffsetDateTime::from_unix_timestamp(user.usage_reset_at)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);
        if (last.year(), last.month()) == (now.year(), now.month()) {
            continue;
        }
        user.usage = 0.0;
        user.usage_bytes = 0;
        user.enabled = true;
        user.usage_reset_at = now.unix_timestamp();
        changed = true;
    }
    changed
}
