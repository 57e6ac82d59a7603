//! Command registry, session/auth gate, and dispatch (spec §4.5).
//!
//! Grounded on the teacher's `network/server.rs` `process_request`
//! dispatch shape (one lookup, one parse, one match-and-respond) and
//! `security/rbac.rs`'s admin-bypass idiom for the `adminOnly` gate.

pub mod handlers;

use crate::config::ServerConfig;
use crate::error::DbError;
use crate::identity::{IdentityStore, User};
use crate::parser::commands::CommandType;
use crate::parser::{self, ParsedCommand};
use crate::session::SessionStore;
use crate::storage::Storage;
use std::sync::Arc;

/// Per-invocation scratch: the session's user (possibly mutated by a
/// handler) and whether it needs to be persisted afterward.
pub struct HandlerOutcome {
    pub user: User,
    pub user_changed: bool,
}

pub struct Executor {
    pub storage: Arc<Storage>,
    pub identity: IdentityStore,
    pub sessions: Arc<SessionStore>,
    pub config: Arc<ServerConfig>,
}

fn is_admin_only(command: CommandType) -> bool {
    matches!(
        command,
        CommandType::CreateUser
            | CommandType::GetUser
            | CommandType::DeleteUser
            | CommandType::AssignRole
            | CommandType::DivestRole
            | CommandType::Users
            | CommandType::Sessions
            | CommandType::CreateRole
            | CommandType::GetRole
            | CommandType::DeleteRole
            | CommandType::Roles
            | CommandType::CreateNs
            | CommandType::DeleteNs
            | CommandType::Stat
    )
}

impl Executor {
    pub fn new(storage: Arc<Storage>, identity: IdentityStore, sessions: Arc<SessionStore>, config: Arc<ServerConfig>) -> Self {
        Self { storage, identity, sessions, config }
    }

    pub fn is_admin(&self, user: &User) -> bool {
        user.username == self.config.root_username
    }

    /// Parses and executes `query` on behalf of `session_id`, always
    /// returning a formatted `[ok] …` / `[error] …` string — this is the
    /// boundary across which no `DbError` ever escapes raw.
    pub async fn execute(&self, session_id: &str, query: &str) -> String {
        let cmd = match parser::parse(query) {
            Ok(cmd) => cmd,
            Err(e) => return format!("[error] {e}"),
        };

        if matches!(cmd.command, CommandType::Login) {
            return match handlers::login(self, session_id, &cmd).await {
                Ok(s) => s,
                Err(e) => format!("[error] {e}"),
            };
        }

        let session = match self.sessions.get(session_id) {
            Ok(s) => s,
            Err(_) => return format!("[error] {}", DbError::AuthenticationRequired),
        };

        if is_admin_only(cmd.command) && !self.is_admin(&session.user) {
            return format!("[error] {}", DbError::PermissionDenied);
        }

        let mut outcome = HandlerOutcome { user: session.user, user_changed: false };
        let result = self.dispatch(&mut outcome, &cmd, session_id).await;

        if outcome.user_changed {
            if let Err(e) = self.identity.save_user(&outcome.user).await {
                tracing::error!(error = %e, "failed to persist session user mutation");
            }
            self.sessions.update_user(session_id, outcome.user.clone());
        }

        match result {
            Ok(s) => s,
            Err(e) => format!("[error] {e}"),
        }
    }

    async fn dispatch(
        &self,
        outcome: &mut HandlerOutcome,
        cmd: &ParsedCommand,
        session_id: &str,
    ) -> crate::error::Result<String> {
        use handlers::*;
        match cmd.command {
            CommandType::Get => get(self, outcome, cmd).await,
            CommandType::Set => set(self, outcome, cmd).await,
            CommandType::Del => del(self, outcome, cmd).await,
            CommandType::Watch => watch(self, outcome, cmd).await,
            CommandType::Login => unreachable!("handled before dispatch"),
            CommandType::CreateUser => create_user(self, cmd).await,
            CommandType::GetUser => get_user(self, cmd).await,
            CommandType::DeleteUser => delete_user(self, cmd).await,
            CommandType::AssignRole => assign_role(self, cmd).await,
            CommandType::DivestRole => divest_role(self, cmd).await,
            CommandType::Users => users(self).await,
            CommandType::Sessions => sessions(self).await,
            CommandType::Me => me(self, outcome).await,
            CommandType::CreateRole => create_role(self, cmd).await,
            CommandType::GetRole => get_role(self, cmd).await,
            CommandType::DeleteRole => delete_role(self, cmd).await,
            CommandType::Roles => roles(self).await,
            CommandType::CreateNs => create_ns(self, cmd).await,
            CommandType::DeleteNs => delete_ns(self, cmd).await,
            CommandType::Ns => ns(self, outcome).await,
            CommandType::SetNs => {
                let _ = session_id;
                set_ns(self, outcome, cmd).await
            }
            CommandType::Help => help(self).await,
            CommandType::Stat => stat(self).await,
        }
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

    async fn test_executor() -> (Executor, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let wal = Arc::new(
            Wal::open(dir.path(), 1, Duration::from_millis(10), 1024 * 1024, CompressionKind::None)
                .unwrap(),
        );
        let engine = Arc::new(Engine::new());
        let idgen = Arc::new(IdGenerator::new());
        let storage = Storage::new(engine, wal, idgen, StorageRole::Master);
        let identity = IdentityStore::new(storage.clone());

        let mut config = ServerConfig::default();
        config.default_namespaces = vec!["tenant1".to_string(), "tenant2".to_string()];
        config.default_roles = vec![
            crate::config::DefaultRole {
                name: "rw_tenant1".to_string(),
                perms: "rw".to_string(),
                namespace: "tenant1".to_string(),
            },
            crate::config::DefaultRole {
                name: "r_tenant1".to_string(),
                perms: "r".to_string(),
                namespace: "tenant1".to_string(),
            },
            crate::config::DefaultRole {
                name: "r_tenant2".to_string(),
                perms: "r".to_string(),
                namespace: "tenant2".to_string(),
            },
        ];
        config.default_users = vec![
            crate::config::DefaultUser {
                username: "user2".to_string(),
                password: "user123".to_string(),
                roles: vec!["rw_tenant1".to_string(), "r_tenant2".to_string()],
            },
            crate::config::DefaultUser {
                username: "user1".to_string(),
                password: "user123".to_string(),
                roles: vec!["r_tenant1".to_string()],
            },
        ];
        identity.bootstrap_defaults(&config).await.unwrap();

        let sessions = Arc::new(SessionStore::new());
        (Executor::new(storage, identity, sessions, Arc::new(config)), dir)
    }

    #[tokio::test]
    async fn end_to_end_scenario_one_read_permission_and_namespace_isolation() {
        let (executor, _dir) = test_executor().await;
        assert_eq!(executor.execute("s1", "login user2 user123").await, "[ok]");
        assert_eq!(executor.execute("s1", "set foo bar ns tenant1").await, "[ok]");
        assert_eq!(executor.execute("s1", "get foo ns tenant1").await, "[ok] bar");
        assert_eq!(executor.execute("s1", "get foo ns tenant2").await, "[error] key not found");
    }

    #[tokio::test]
    async fn end_to_end_scenario_two_permission_denied_without_write() {
        let (executor, _dir) = test_executor().await;
        executor.execute("s1", "login user1 user123").await;
        // user1 only has read ("r") on tenant1.
        assert_eq!(executor.execute("s1", "set foo bar ns tenant1").await, "[error] permission denied");
    }

    #[tokio::test]
    async fn end_to_end_scenario_three_namespace_deletion_guarded_by_role() {
        let (executor, _dir) = test_executor().await;
        executor.execute("root", "login root root").await;
        assert_eq!(executor.execute("root", "create ns t3").await, "[ok]");
        assert_eq!(executor.execute("root", "create role rw_t3 rw t3").await, "[ok]");
        assert_eq!(
            executor.execute("root", "delete ns t3").await,
            "[error] this namespace is still used by the role rw_t3"
        );
        assert_eq!(executor.execute("root", "delete role rw_t3").await, "[ok]");
        assert_eq!(executor.execute("root", "delete ns t3").await, "[ok]");
    }

    #[tokio::test]
    async fn commands_before_login_require_authentication() {
        let (executor, _dir) = test_executor().await;
        assert_eq!(executor.execute("fresh", "get foo").await, "[error] authentication required");
    }

    #[tokio::test]
    async fn non_admin_cannot_run_admin_only_commands() {
        let (executor, _dir) = test_executor().await;
        executor.execute("s1", "login user2 user123").await;
        assert_eq!(executor.execute("s1", "create ns t9").await, "[error] permission denied");
    }

    #[tokio::test]
    async fn stat_reports_each_counter_under_its_own_label() {
        let (executor, _dir) = test_executor().await;
        executor.execute("s1", "login user2 user123").await;
        executor.execute("s1", "set foo bar ns tenant1").await;
        executor.execute("s1", "set foo baz ns tenant1").await;
        executor.execute("s1", "get foo ns tenant1").await;
        executor.execute("s1", "del foo ns tenant1").await;

        executor.execute("root", "login root root").await;
        let report = executor.execute("root", "stat").await;
        assert!(report.contains("gets=1"), "{report}");
        assert!(report.contains("sets=2"), "{report}");
        assert!(report.contains("dels=1"), "{report}");
    }
}
