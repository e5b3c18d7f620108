//! The snapshot store: one JSON document, one mutex, rotating backups.

use std::path::{Path, PathBuf};

use parking_lot::{Mutex, MutexGuard};
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use flotilla_core::defaults::MAX_NODES;
use flotilla_core::util::{key32, now_ms, ports_distinct, random_token};

use crate::node::Node;
use crate::settings::Settings;
use crate::stats::Stats;
use crate::user::User;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("time: {0}")]
    Time(#[from] time::error::Format),
    #[error("validation: {0}")]
    Validation(String),
}

/// The whole fleet state as persisted.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Content {
    pub settings: Settings,
    pub stats: Stats,
    pub users: Vec<User>,
    pub nodes: Vec<Node>,
}

impl Default for Content {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            stats: Stats {
                total_usage_reset_at: now_ms(),
                ..Stats::default()
            },
            users: Vec::new(),
            nodes: Vec::new(),
        }
    }
}

impl Content {
    pub fn find_user(&self, id: i64) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn find_node(&self, id: i64) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn find_node_mut(&mut self, id: i64) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn count_active_users(&self) -> usize {
        self.users.iter().filter(|u| u.enabled).count()
    }

    /// Next user id: one past the last element, never reused.
    pub fn gen_user_id(&self) -> i64 {
        self.users.last().map(|u| u.id + 1).unwrap_or(1)
    }

    pub fn gen_node_id(&self) -> i64 {
        self.nodes.last().map(|n| n.id + 1).unwrap_or(1)
    }

    /// Opaque user identity: uuid with the dashes stripped.
    pub fn gen_user_identity(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    /// Fresh 32-byte base64 credential, collision-checked against existing
    /// users. Degrades to a 16-char random string if entropy is exhausted.
    pub fn gen_user_password(&self) -> String {
        loop {
            let key = key32().unwrap_or_else(|_| random_token(16));
            if !self.users.iter().any(|u| u.shadowsocks_password == key) {
                return key;
            }
        }
    }

    /// Forward migration applied on load: users from before usage resets
    /// existed get stamped with the current time.
    fn migrate(&mut self) {
        let now = now_ms();
        for user in &mut self.users {
            if user.usage_reset_at == 0 {
                user.usage_reset_at = now;
            }
        }
    }

    fn validate(&self) -> Result<(), StoreError> {
        let s = &self.settings;
        if s.admin_password.len() < 8 || s.admin_password.len() > 32 {
            return Err(StoreError::Validation(
                "settings.admin_password must be 8..=32 chars".into(),
            ));
        }
        if s.host.is_empty() || s.host.len() > 128 {
            return Err(StoreError::Validation(
                "settings.host must be 1..=128 chars".into(),
            ));
        }
        if !(1.0..=1024.0).contains(&s.traffic_ratio) {
            return Err(StoreError::Validation(
                "settings.traffic_ratio must be 1..=1024".into(),
            ));
        }
        if !ports_distinct(&s.role_ports()) {
            return Err(StoreError::Validation(
                "settings role ports must be distinct".into(),
            ));
        }
        for user in &self.users {
            if user.usage < 0.0 || user.usage_bytes < 0 || user.quota < 0.0 {
                return Err(StoreError::Validation(format!(
                    "user {}: negative usage or quota",
                    user.id
                )));
            }
        }
        for node in &self.nodes {
            if node.host.is_empty() || node.host.len() > 128 {
                return Err(StoreError::Validation(format!(
                    "node {}: host must be 1..=128 chars",
                    node.id
                )));
            }
            if node.http_port == 0 || node.listening_port == 0 {
                return Err(StoreError::Validation(format!(
                    "node {}: ports must be non-zero",
                    node.id
                )));
            }
            if node.http_token.is_empty() {
                return Err(StoreError::Validation(format!(
                    "node {}: http_token is empty",
                    node.id
                )));
            }
        }
        Ok(())
    }
}

pub struct Store {
    path: PathBuf,
    backup_dir: PathBuf,
    content: Mutex<Content>,
}

impl Store {
    pub fn new(path: PathBuf, backup_dir: PathBuf) -> Self {
        Self {
            path,
            backup_dir,
            content: Mutex::new(Content::default()),
        }
    }

    /// Load the snapshot if it exists, otherwise persist the defaults.
    pub fn init(&self) -> Result<(), StoreError> {
        let mut content = self.content.lock();
        if self.path.is_file() {
            *content = self.load()?;
            info!(path = %self.path.display(), users = content.users.len(),
                nodes = content.nodes.len(), "store loaded");
        } else {
            self.save(&content)?;
            info!(path = %self.path.display(), "store initialized");
        }
        if content.nodes.len() > MAX_NODES {
            warn!(
                nodes = content.nodes.len(),
                cap = MAX_NODES,
                "fleet exceeds the supported node cap"
            );
        }
        Ok(())
    }

    fn load(&self) -> Result<Content, StoreError> {
        let data = std::fs::read(&self.path)?;
        let mut content: Content = serde_json::from_slice(&data)?;
        content.migrate();
        content.validate()?;
        Ok(content)
    }

    /// Acquire the fleet-state lock. Callers performing read-modify-write
    /// keep the guard across the whole sequence, including `save`.
    pub fn lock(&self) -> MutexGuard<'_, Content> {
        self.content.lock()
    }

    /// Persist the given content; the caller holds the lock.
    pub fn save(&self, content: &Content) -> Result<(), StoreError> {
        let data = serde_json::to_vec(content)?;
        write_atomic(&self.path, &data)?;
        Ok(())
    }

    /// Write a backup copy whose name rotates by weekday and hour, keeping
    /// the backup set bounded at one file per hour of the week.
    pub fn backup(&self, content: &Content) -> Result<PathBuf, StoreError> {
        let stamp = OffsetDateTime::now_utc()
            .format(format_description!("[weekday repr:short]-[hour]"))?
            .to_lowercase();
        std::fs::create_dir_all(&self.backup_dir)?;
        let path = self.backup_dir.join(format!("backup-{stamp}.json"));
        let data = serde_json::to_vec(content)?;
        write_atomic(&path, &data)?;
        Ok(path)
    }

    /// Final save on shutdown; errors are logged, not propagated.
    pub fn close(&self) {
        let content = self.content.lock();
        if let Err(e) = self.save(&content) {
            error!(error = %e, "store: cannot save on close");
        }
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeStatus;

    fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(
            dir.path().join("database.json"),
            dir.path().join("backups"),
        );
        (dir, store)
    }

    fn test_node(id: i64) -> Node {
        Node {
            id,
            host: "10.0.0.1".into(),
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

    fn test_user(id: i64) -> User {
        User {
            id,
            identity: format!("{id:032x}"),
            enabled: true,
            shadowsocks_method: "chacha20-ietf-poly1305".into(),
            shadowsocks_password: format!("pw-{id}"),
            usage: 0.0,
            usage_bytes: 0,
            quota: 0.0,
            usage_reset_at: 1,
        }
    }

    #[test]
    fn init_writes_defaults() {
        let (_dir, store) = temp_store();
        store.init().unwrap();
        let content = store.lock();
        assert_eq!(content.settings.admin_password, "password");
        assert!(content.users.is_empty());
    }

    #[test]
    fn init_loads_existing_snapshot() {
        let (_dir, store) = temp_store();
        {
            store.init().unwrap();
            let mut content = store.lock();
            content.users.push(test_user(1));
            store.save(&content).unwrap();
        }
        let store2 = Store::new(store.path.clone(), store.backup_dir.clone());
        store2.init().unwrap();
        assert_eq!(store2.lock().users.len(), 1);
    }

    #[test]
    fn load_stamps_zero_reset_timestamps() {
        let (_dir, store) = temp_store();
        {
            store.init().unwrap();
            let mut content = store.lock();
            let mut user = test_user(1);
            user.usage_reset_at = 0;
            content.users.push(user);
            store.save(&content).unwrap();
        }
        let store2 = Store::new(store.path.clone(), store.backup_dir.clone());
        store2.init().unwrap();
        assert!(store2.lock().users[0].usage_reset_at > 0);
    }

    #[test]
    fn load_rejects_invalid_content() {
        let (_dir, store) = temp_store();
        {
            store.init().unwrap();
            let mut content = store.lock();
            content.settings.traffic_ratio = 0.0;
            store.save(&content).unwrap();
        }
        let store2 = Store::new(store.path.clone(), store.backup_dir.clone());
        assert!(matches!(
            store2.init(),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn backup_path_rotates_by_weekday_hour() {
        let (dir, store) = temp_store();
        store.init().unwrap();
        let path = store.backup(&store.lock()).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("backup-"));
        assert!(name.ends_with(".json"));
        // backup-mon-15.json
        assert_eq!(name.len(), "backup-mon-15.json".len());
        assert!(path.starts_with(dir.path().join("backups")));
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut content = Content::default();
        assert_eq!(content.gen_user_id(), 1);
        content.users.push(test_user(1));
        content.users.push(test_user(2));
        assert_eq!(content.gen_user_id(), 3);
        // deleting an earlier user does not free its id
        content.users.remove(0);
        assert_eq!(content.gen_user_id(), 3);

        assert_eq!(content.gen_node_id(), 1);
        content.nodes.push(test_node(4));
        assert_eq!(content.gen_node_id(), 5);
    }

    #[test]
    fn generated_password_avoids_collisions() {
        let mut content = Content::default();
        let mut user = test_user(1);
        user.shadowsocks_password = content.gen_user_password();
        content.users.push(user);
        let other = content.gen_user_password();
        assert_ne!(other, content.users[0].shadowsocks_password);
    }

    #[test]
    fn identity_is_32_hex_chars() {
        let content = Content::default();
        let identity = content.gen_user_identity();
        assert_eq!(identity.len(), 32);
        assert!(identity.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn count_active_skips_disabled() {
        let mut content = Content::default();
        content.users.push(test_user(1));
        let mut disabled = test_user(2);
        disabled.enabled = false;
        content.users.push(disabled);
        assert_eq!(content.count_active_users(), 1);
    }
}
