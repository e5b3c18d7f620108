//! Workspace-wide default values and protocol constants.

use std::time::Duration;

/// Shadowsocks AEAD method used for user-facing role inbounds.
pub const SHADOWSOCKS_METHOD: &str = "chacha20-ietf-poly1305";

/// Shadowsocks 2022 method used on the manager⇄node tunnel endpoints.
pub const SHADOWSOCKS_2022_METHOD: &str = "2022-blake3-aes-128-gcm";

/// Soft limit on fleet size; exceeding it logs a warning.
pub const MAX_NODES: usize = 6;

/// Re-push interval for nodes whose push status is unavailable/processing.
pub const SYNC_OUTDATED_INTERVAL: Duration = Duration::from_secs(10);

/// Pull-status sweep interval.
pub const PULL_STATUS_INTERVAL: Duration = Duration::from_secs(60);

/// Local and remote stats collection interval.
pub const STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Store backup interval.
pub const BACKUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Monthly usage-reset check interval.
pub const USAGE_RESET_INTERVAL: Duration = Duration::from_secs(3600);

/// A node that has not pulled its config within this window is unavailable.
pub const PULL_LIVENESS_WINDOW_MS: i64 = 60_000;

/// Default timeout for control-plane HTTP requests.
pub const HTTP_TIMEOUT_SECS: u64 = 10;

/// Default role inbound ports; 0 disables a role.
pub const RELAY_PORT: u16 = 8443;
pub const REVERSE_PORT: u16 = 8444;
pub const DIRECT_PORT: u16 = 8445;
