//! Identity persistence: `User`/`Role`/`Namespace` records live as
//! ordinary keys in the same KV store (spec §3 — "the identity model is
//! a tenant of its own KV store"), routed through the storage façade so
//! they inherit its WAL durability and replication guarantees.
//!
//! The distilled spec describes the on-disk encoding as "binary"; since
//! this store's value type is `String` (spec §3's `Value: opaque
//! string`), records are serialized with `serde_json` rather than a raw
//! byte encoding — the same crate the teacher already links for its
//! REST layer, repurposed here as the ASCII-safe record format.
//!
//! All reads/writes go through `Storage::{get,set,del}_uncounted`: this
//! is internal bookkeeping, not client KV traffic, and must not move the
//! `stat` counters that `get`/`set`/`del` report.

use crate::config::ServerConfig;
use crate::error::{DbError, Result};
use crate::identity::namespace::{namespace_key, NAMESPACES_LIST_KEY};
use crate::identity::role::Role;
use crate::identity::user::User;
use crate::storage::Storage;
use std::collections::BTreeSet;
use std::sync::Arc;

const USERS_LIST_KEY: &str = "users";
const ROLES_LIST_KEY: &str = "roles";

fn user_key(name: &str) -> String {
    format!("user:{name}")
}

fn role_key(name: &str) -> String {
    format!("role:{name}")
}

pub struct IdentityStore {
    storage: Arc<Storage>,
}

impl IdentityStore {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    async fn get_list(&self, key: &str) -> Result<Vec<String>> {
        match self.storage.get_uncounted(key).await {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(DbError::KeyNotFound) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn save_list(&self, key: &str, items: &[String]) -> Result<()> {
        let raw = serde_json::to_string(items)?;
        self.storage.set_uncounted(key, &raw, None).await
    }

    async fn add_to_list(&self, key: &str, item: &str) -> Result<()> {
        let mut items = self.get_list(key).await?;
        if !items.iter().any(|i| i == item) {
            items.push(item.to_string());
            self.save_list(key, &items).await?;
        }
        Ok(())
    }

    async fn remove_from_list(&self, key: &str, item: &str) -> Result<()> {
        let mut items = self.get_list(key).await?;
        items.retain(|i| i != item);
        self.save_list(key, &items).await
    }

    // ---- Users ----------------------------------------------------

    pub async fn create_user(&self, username: &str, password: &str, roles: Vec<String>) -> Result<()> {
        if self.storage.get_uncounted(&user_key(username)).await.is_ok() {
            return Err(DbError::UserAlreadyExists);
        }
        let user = User::new(username, password, roles)?;
        self.save_user(&user).await?;
        self.add_to_list(USERS_LIST_KEY, username).await
    }

    pub async fn get_user(&self, username: &str) -> Result<User> {
        let raw = self.storage.get_uncounted(&user_key(username)).await.map_err(|e| match e {
            DbError::KeyNotFound => DbError::UserNotFound,
            other => other,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// `SaveRaw`: persists the current state of a `User` record,
    /// including role-list mutations from `assign_role`/`divest_role`.
    pub async fn save_user(&self, user: &User) -> Result<()> {
        let raw = serde_json::to_string(user)?;
        self.storage.set_uncounted(&user_key(&user.username), &raw, None).await
    }

    pub async fn delete_user(&self, username: &str) -> Result<()> {
        self.storage.del_uncounted(&user_key(username)).await.map_err(|e| match e {
            DbError::KeyNotFound => DbError::UserNotFound,
            other => other,
        })?;
        self.remove_from_list(USERS_LIST_KEY, username).await
    }

    pub async fn list_users(&self) -> Result<Vec<String>> {
        self.get_list(USERS_LIST_KEY).await
    }

    pub async fn assign_role(&self, username: &str, role_name: &str) -> Result<User> {
        self.get_role(role_name).await?;
        let mut user = self.get_user(username).await?;
        if !user.roles.iter().any(|r| r == role_name) {
            user.roles.push(role_name.to_string());
            self.save_user(&user).await?;
        }
        Ok(user)
    }

    /// True removal, not a call-through to `assign_role` (spec §9 open
    /// question: the source's `divestRole` calling `AssignRole` looks
    /// like a bug).
    pub async fn divest_role(&self, username: &str, role_name: &str) -> Result<User> {
        let mut user = self.get_user(username).await?;
        user.roles.retain(|r| r != role_name);
        self.save_user(&user).await?;
        Ok(user)
    }

    // ---- Roles ------------------------------------------------------

    pub async fn create_role(&self, name: &str, perms: &str, namespace: &str) -> Result<()> {
        if !self.namespace_exists(namespace).await {
            return Err(DbError::NamespaceNotFound);
        }
        if self.storage.get_uncounted(&role_key(name)).await.is_ok() {
            return Err(DbError::RoleAlreadyExists);
        }
        let role = Role::parse(name, perms, namespace)?;
        self.save_role(&role).await?;
        self.add_to_list(ROLES_LIST_KEY, name).await
    }

    async fn save_role(&self, role: &Role) -> Result<()> {
        let raw = serde_json::to_string(role)?;
        self.storage.set_uncounted(&role_key(&role.name), &raw, None).await
    }

    pub async fn get_role(&self, name: &str) -> Result<Role> {
        let raw = self.storage.get_uncounted(&role_key(name)).await.map_err(|e| match e {
            DbError::KeyNotFound => DbError::RoleNotFound,
            other => other,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Refuses if any user still lists this role (spec §4.5 `delRole`).
    pub async fn delete_role(&self, name: &str) -> Result<()> {
        for username in self.list_users().await? {
            let user = self.get_user(&username).await?;
            if user.roles.iter().any(|r| r == name) {
                return Err(DbError::RoleInUseByUser);
            }
        }
        self.storage.del_uncounted(&role_key(name)).await.map_err(|e| match e {
            DbError::KeyNotFound => DbError::RoleNotFound,
            other => other,
        })?;
        self.remove_from_list(ROLES_LIST_KEY, name).await
    }

    pub async fn list_roles(&self) -> Result<Vec<String>> {
        self.get_list(ROLES_LIST_KEY).await
    }

    // ---- Namespaces ---------------------------------------------------

    pub async fn create_namespace(&self, name: &str) -> Result<()> {
        if self.namespace_exists(name).await {
            return Err(DbError::NamespaceAlreadyExists);
        }
        self.storage.set_uncounted(&namespace_key(name), name, None).await?;
        self.add_to_list(NAMESPACES_LIST_KEY, name).await
    }

    pub async fn namespace_exists(&self, name: &str) -> bool {
        self.storage.get_uncounted(&namespace_key(name)).await.is_ok()
    }

    /// Refuses if any role is still scoped to this namespace (spec §4.5
    /// `deleteNS` / end-to-end scenario 3).
    pub async fn delete_namespace(&self, name: &str) -> Result<()> {
        for role_name in self.list_roles().await? {
            let role = self.get_role(&role_name).await?;
            if role.namespace == name {
                return Err(DbError::NamespaceInUseByRole(role_name));
            }
        }
        self.storage.del_uncounted(&namespace_key(name)).await.map_err(|e| match e {
            DbError::KeyNotFound => DbError::NamespaceNotFound,
            other => other,
        })?;
        self.remove_from_list(NAMESPACES_LIST_KEY, name).await
    }

    pub async fn list_namespaces(&self) -> Result<Vec<String>> {
        self.get_list(NAMESPACES_LIST_KEY).await
    }

    /// Namespaces visible to `user`: every namespace if admin, else the
    /// deduplicated set of namespaces named by the user's roles (spec §9
    /// open question: treated as a set).
    pub async fn visible_namespaces(&self, user: &User, is_admin: bool) -> Result<Vec<String>> {
        if is_admin {
            return self.list_namespaces().await;
        }
        let mut seen = BTreeSet::new();
        for role_name in &user.roles {
            if let Ok(role) = self.get_role(role_name).await {
                seen.insert(role.namespace);
            }
        }
        Ok(seen.into_iter().collect())
    }

    // ---- Bootstrap ----------------------------------------------------

    /// Creates the admin user and any `default_roles`/`default_namespaces`
    /// /`default_users` named in config, idempotently (spec §9: "create
    /// if absent").
    pub async fn bootstrap_defaults(&self, config: &ServerConfig) -> Result<()> {
        if self.storage.get_uncounted(&user_key(&config.root_username)).await.is_err() {
            self.create_user(&config.root_username, &config.root_password, Vec::new()).await?;
        }

        for name in &config.default_namespaces {
            if !self.namespace_exists(name).await {
                self.create_namespace(name).await?;
            }
        }

        for role in &config.default_roles {
            if self.storage.get_uncounted(&role_key(&role.name)).await.is_err() {
                self.create_role(&role.name, &role.perms, &role.namespace).await?;
            }
        }

        for user in &config.default_users {
            if self.storage.get_uncounted(&user_key(&user.username)).await.is_err() {
                self.create_user(&user.username, &user.password, user.roles.clone()).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressionKind;
    use crate::engine::Engine;
    use crate::idgen::IdGenerator;
    use crate::storage::Role as StorageRole;
    use crate::wal::Wal;
    use std::time::Duration;

    async fn test_store() -> (IdentityStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let wal = Arc::new(
            Wal::open(dir.path(), 1, Duration::from_millis(10), 1024 * 1024, CompressionKind::None)
                .unwrap(),
        );
        let engine = Arc::new(Engine::new());
        let idgen = Arc::new(IdGenerator::new());
        let storage = Storage::new(engine, wal, idgen, StorageRole::Master);
        (IdentityStore::new(storage), dir)
    }

    #[tokio::test]
    async fn create_then_get_user_round_trips() {
        let (store, _dir) = test_store().await;
        store.create_user("alice", "pw", vec![]).await.unwrap();
        let user = store.get_user("alice").await.unwrap();
        assert!(user.verify_password("pw"));
    }

    #[tokio::test]
    async fn create_user_twice_errors() {
        let (store, _dir) = test_store().await;
        store.create_user("alice", "pw", vec![]).await.unwrap();
        assert!(matches!(store.create_user("alice", "pw", vec![]).await, Err(DbError::UserAlreadyExists)));
    }

    #[tokio::test]
    async fn assign_then_divest_role_is_a_true_removal() {
        let (store, _dir) = test_store().await;
        store.create_namespace("t1").await.unwrap();
        store.create_role("rw_t1", "rw", "t1").await.unwrap();
        store.create_user("bob", "pw", vec![]).await.unwrap();

        store.assign_role("bob", "rw_t1").await.unwrap();
        let user = store.get_user("bob").await.unwrap();
        assert_eq!(user.roles, vec!["rw_t1".to_string()]);

        store.divest_role("bob", "rw_t1").await.unwrap();
        let user = store.get_user("bob").await.unwrap();
        assert!(user.roles.is_empty());
    }

    #[tokio::test]
    async fn delete_namespace_refused_while_role_references_it() {
        let (store, _dir) = test_store().await;
        store.create_namespace("t3").await.unwrap();
        store.create_role("rw_t3", "rw", "t3").await.unwrap();

        assert!(matches!(
            store.delete_namespace("t3").await,
            Err(DbError::NamespaceInUseByRole(_))
        ));

        store.delete_role("rw_t3").await.unwrap();
        store.delete_namespace("t3").await.unwrap();
        assert!(!store.namespace_exists("t3").await);
    }

    #[tokio::test]
    async fn delete_role_refused_while_user_references_it() {
        let (store, _dir) = test_store().await;
        store.create_namespace("t1").await.unwrap();
        store.create_role("rw_t1", "rw", "t1").await.unwrap();
        store.create_user("bob", "pw", vec!["rw_t1".to_string()]).await.unwrap();

        assert!(matches!(store.delete_role("rw_t1").await, Err(DbError::RoleInUseByUser)));
    }

    #[tokio::test]
    async fn bootstrap_defaults_is_idempotent() {
        let (store, _dir) = test_store().await;
        let config = ServerConfig::default();
        store.bootstrap_defaults(&config).await.unwrap();
        store.bootstrap_defaults(&config).await.unwrap();
        let user = store.get_user(&config.root_username).await.unwrap();
        assert!(user.verify_password(&config.root_password));
    }
}
