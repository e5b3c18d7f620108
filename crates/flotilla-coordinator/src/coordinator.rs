//! The coordinator: periodic workers, per-node push state machine, and
//! triggered config synchronization.

use std::sync::Arc;

use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use flotilla_core::defaults;
use flotilla_core::util::now_ms;
use flotilla_engine::{Engine, StatEntry};
use flotilla_store::{Node, NodeStatus, ResetPolicy, Store};
use flotilla_writer::{OsPorts, Writer};

use crate::client::HttpClient;
use crate::error::SyncError;
use crate::reconcile;
use crate::state::SecretsState;
use crate::worker;

pub struct Coordinator {
    store: Arc<Store>,
    engine: Arc<dyn Engine>,
    writer: Arc<Writer>,
    client: HttpClient,
    state: Arc<SecretsState>,
    shutdown: CancellationToken,
}

impl Coordinator {
    pub fn new(
        store: Arc<Store>,
        engine: Arc<dyn Engine>,
        writer: Arc<Writer>,
        client: HttpClient,
        state: Arc<SecretsState>,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            engine,
            writer,
            client,
            state,
            shutdown,
        })
    }

    pub fn state(&self) -> &Arc<SecretsState> {
        &self.state
    }

    /// Startup: synchronous local sync (failure here aborts the process),
    /// then the remote fan-out and the periodic workers.
    pub async fn run(self: Arc<Self>) -> Result<(), SyncError> {
        info!("coordinator: running");
        self.sync_local_config().await?;
        self.clone().sync_remote_configs();
        self.spawn_workers();
        Ok(())
    }

    fn spawn_workers(self: Arc<Self>) {
        let this = self.clone();
        worker::spawn(
            "sync-outdated-configs",
            defaults::SYNC_OUTDATED_INTERVAL,
            self.shutdown.clone(),
            move || {
                let this = Arc::clone(&this);
                async move { this.sync_outdated_configs() }
            },
        );

        let this = self.clone();
        worker::spawn(
            "pull-statuses",
            defaults::PULL_STATUS_INTERVAL,
            self.shutdown.clone(),
            move || {
                let this = Arc::clone(&this);
                async move {
                    if let Err(e) = this.sync_node_pull_statuses() {
                        error!(error = %e, "coordinator: cannot sweep pull statuses");
                    }
                }
            },
        );

        let this = self.clone();
        worker::spawn(
            "local-stats",
            defaults::STATS_INTERVAL,
            self.shutdown.clone(),
            move || {
                let this = Arc::clone(&this);
                async move {
                    if let Err(e) = this.sync_local_stats().await {
                        error!(error = %e, "coordinator: cannot sync local stats");
                    }
                }
            },
        );

        let this = self.clone();
        worker::spawn(
            "remote-stats",
            defaults::STATS_INTERVAL,
            self.shutdown.clone(),
            move || {
                let this = Arc::clone(&this);
                async move { this.sync_remote_stats() }
            },
        );

        let this = self.clone();
        worker::spawn(
            "backup",
            defaults::BACKUP_INTERVAL,
            self.shutdown.clone(),
            move || {
                let this = Arc::clone(&this);
                async move { this.backup() }
            },
        );

        let this = self.clone();
        worker::spawn(
            "reset-usages",
            defaults::USAGE_RESET_INTERVAL,
            self.shutdown.clone(),
            move || {
                let this = Arc::clone(&this);
                async move {
                    if let Err(e) = this.reset_user_usages() {
                        error!(error = %e, "coordinator: cannot reset user usages");
                    }
                }
            },
        );
    }

    /// Full resync: rebuild and load the local config, then fan out node
    /// pushes. Called on startup and on every fleet-state change.
    pub async fn sync_configs(self: Arc<Self>) {
        info!("coordinator: syncing configs");
        if let Err(e) = self.sync_local_config().await {
            error!(error = %e, "coordinator: cannot sync local config");
            return;
        }
        self.sync_remote_configs();
    }

    fn spawn_sync(self: Arc<Self>) {
        tokio::spawn(async move { self.sync_configs().await });
    }

    async fn sync_local_config(&self) -> Result<(), SyncError> {
        debug!("coordinator: syncing local config");
        let local = {
            let content = self.store.lock();
            self.writer.local_config(&content, &mut OsPorts)?
        };
        let local = Arc::new(local);
        self.state.record_local_build(Arc::clone(&local));
        self.engine.set_config((*local).clone());
        self.engine.restart().await?;
        Ok(())
    }

    fn sync_remote_configs(self: Arc<Self>) {
        debug!("coordinator: syncing remote configs");
        let ids: Vec<i64> = self.store.lock().nodes.iter().map(|n| n.id).collect();
        for id in ids {
            let this = self.clone();
            tokio::spawn(async move { this.sync_remote_config(id).await });
        }
    }

    /// Re-push nodes that never succeeded or went unavailable; available
    /// and dirty nodes are refreshed only by a full sync.
    pub fn sync_outdated_configs(self: Arc<Self>) {
        debug!("coordinator: syncing outdated configs");
        let ids: Vec<i64> = self
            .store
            .lock()
            .nodes
            .iter()
            .filter(|n| {
                matches!(
                    n.push_status,
                    NodeStatus::Unavailable | NodeStatus::Processing
                )
            })
            .map(|n| n.id)
            .collect();
        for id in ids {
            let this = self.clone();
            tokio::spawn(async move { this.sync_remote_config(id).await });
        }
    }

    /// Push one node's mirror config: direct first, then through the
    /// forward proxy. The outcome drives the node's push status.
    pub async fn sync_remote_config(&self, node_id: i64) {
        // Snapshot under the lock; compute and push outside it. A
        // concurrent mutation is picked up by the next push.
        let (content, node, proxy) = {
            let guard = self.store.lock();
            let Some(node) = guard.find_node(node_id) else {
                return;
            };
            let node = node.clone();
            let proxy = guard.settings.forward_proxy.clone();
            ((*guard).clone(), node, proxy)
        };
        let Some(local) = self.state.local_config() else {
            warn!(node = node_id, "coordinator: no local config yet, skipping push");
            return;
        };

        let config = match self.writer.remote_config(
            &content,
            &node,
            &local,
            self.state.updated_at(),
            self.state.shared_password(),
        ) {
            Ok(config) => config,
            Err(e) => {
                error!(node = node_id, error = %e, "coordinator: cannot render node config");
                return;
            }
        };

        let url = config_url(&node);
        info!(url = %url, proxy = proxy.as_deref().unwrap_or(""), "coordinator: pushing node config");

        let mut proxied = false;
        let mut result = self
            .client
            .request(Method::POST, &url, &node.http_token, Some(&config))
            .await;
        if result.is_err() {
            if let Some(proxy) = proxy.as_deref() {
                proxied = true;
                result = self
                    .client
                    .request_through(proxy, Method::POST, &url, &node.http_token, Some(&config))
                    .await;
            }
        }

        let mut guard = self.store.lock();
        let Some(node) = guard.find_node_mut(node_id) else {
            return;
        };
        match result {
            Ok(_) => {
                node.pushed_at = now_ms();
                node.push_status = if proxied {
                    NodeStatus::Dirty
                } else {
                    NodeStatus::Available
                };
                debug!(url = %url, proxied, "coordinator: node config pushed");
            }
            Err(e) => {
                node.push_status = NodeStatus::Unavailable;
                error!(url = %url, proxied, error = %e, "coordinator: cannot push node config");
            }
        }
    }

    pub async fn sync_local_stats(self: Arc<Self>) -> Result<(), SyncError> {
        debug!("coordinator: syncing local stats");
        let entries = self.engine.query_stats().await?;
        let should_sync = {
            let mut guard = self.store.lock();
            let should_sync = reconcile::apply_local_counters(&mut guard, &entries);
            self.store.save(&guard)?;
            should_sync
        };
        if should_sync {
            self.spawn_sync();
        }
        Ok(())
    }

    fn sync_remote_stats(self: Arc<Self>) {
        let nodes: Vec<Node> = self.store.lock().nodes.clone();
        if nodes.is_empty() {
            debug!("coordinator: no nodes configured, remote stats disabled");
            return;
        }
        debug!("coordinator: syncing remote stats");
        for node in nodes {
            let this = self.clone();
            tokio::spawn(async move { this.sync_remote_node_stats(node).await });
        }
    }

    async fn sync_remote_node_stats(self: Arc<Self>, node: Node) {
        let url = stats_url(&node);
        let response = match self.client.get(&url, &node.http_token).await {
            Ok(response) => response,
            Err(e) => {
                error!(url = %url, error = %e, "coordinator: cannot fetch node stats");
                return;
            }
        };
        let entries: Vec<StatEntry> = match serde_json::from_slice(&response) {
            Ok(entries) => entries,
            Err(e) => {
                error!(url = %url, error = %e, "coordinator: cannot decode node stats");
                return;
            }
        };

        let should_sync = {
            let mut guard = self.store.lock();
            let should_sync = reconcile::apply_remote_counters(&mut guard, node.id, &entries);
            if let Err(e) = self.store.save(&guard) {
                error!(url = %url, error = %e, "coordinator: cannot save node stats");
            }
            should_sync
        };
        if should_sync {
            self.spawn_sync();
        }
    }

    fn sync_node_pull_statuses(&self) -> Result<(), SyncError> {
        debug!("coordinator: sweeping pull statuses");
        let mut guard = self.store.lock();
        if reconcile::sweep_pull_statuses(&mut guard, now_ms()) {
            self.store.save(&guard)?;
        }
        Ok(())
    }

    fn backup(&self) {
        debug!("coordinator: backing up store");
        let guard = self.store.lock();
        match self.store.backup(&guard) {
            Ok(path) => debug!(path = %path.display(), "store backed up"),
            Err(e) => error!(error = %e, "coordinator: cannot back up store"),
        }
    }

    fn reset_user_usages(self: Arc<Self>) -> Result<(), SyncError> {
        let changed = {
            let mut guard = self.store.lock();
            if guard.settings.reset_policy != Some(ResetPolicy::Monthly) {
                return Ok(());
            }
            let changed =
                reconcile::reset_expired_usages(&mut guard, time::OffsetDateTime::now_utc());
            if changed {
                self.store.save(&guard)?;
            }
            changed
        };
        if changed {
            info!("coordinator: user usages reset");
            self.spawn_sync();
        }
        Ok(())
    }
}

fn config_url(node: &Node) -> String {
    format!("http://{}:{}/v1/configs", node.host, node.http_port)
}

fn stats_url(node: &Node) -> String {
    format!("http://{}:{}/v1/stats", node.host, node.http_port)
}
