//! Per-command handlers. Each returns the final `[ok] …` text on
//! success; errors propagate as `Result::Err` and are formatted into
//! `[error] …` by `Executor::execute`, the single place a `DbError`
//! crosses into wire text.
//!
//! Grounded on the teacher's `network/server.rs` `process_request`
//! dispatch and `security/rbac.rs` permission-check idiom, narrowed to
//! the flat r/w/d-over-namespace model this system uses.

use crate::config::parse_duration;
use crate::error::{DbError, Result};
use crate::executor::{Executor, HandlerOutcome};
use crate::identity::Role;
use crate::parser::ParsedCommand;

/// Resolves the namespace a GET/SET/DEL/WATCH/SetNs targets: an explicit
/// `ns` argument (which must exist), or the session's active namespace.
async fn resolve_namespace(executor: &Executor, outcome: &HandlerOutcome, explicit_ns: Option<&str>) -> Result<String> {
    if let Some(ns) = explicit_ns {
        if !executor.identity.namespace_exists(ns).await {
            return Err(DbError::NamespaceNotFound);
        }
        return Ok(ns.to_string());
    }
    outcome
        .user
        .active_role
        .as_ref()
        .map(|r| r.namespace.clone())
        .ok_or(DbError::NamespaceNotFound)
}

/// Resolves the role that governs `namespace` for this user (a
/// synthetic full-permission role for the admin user), then checks the
/// requested permission bits.
async fn check_permission(
    executor: &Executor,
    outcome: &HandlerOutcome,
    namespace: &str,
    get: bool,
    set: bool,
    del: bool,
) -> Result<()> {
    let role = if executor.is_admin(&outcome.user) {
        Role::full(namespace)
    } else {
        let mut matched = None;
        for name in &outcome.user.roles {
            if let Ok(role) = executor.identity.get_role(name).await {
                if role.namespace == namespace {
                    matched = Some(role);
                    break;
                }
            }
        }
        matched.ok_or(DbError::PermissionDenied)?
    };
    if role.allows(get, set, del) {
        Ok(())
    } else {
        Err(DbError::PermissionDenied)
    }
}

fn key_for(namespace: &str, name: &str) -> String {
    format!("{namespace}:{name}")
}

pub async fn get(executor: &Executor, outcome: &mut HandlerOutcome, cmd: &ParsedCommand) -> Result<String> {
    let key_name = cmd.get("key").expect("required by schema");
    let ns = resolve_namespace(executor, outcome, cmd.get("ns")).await?;
    check_permission(executor, outcome, &ns, true, false, false).await?;
    let value = executor.storage.get(&key_for(&ns, key_name)).await?;
    Ok(format!("[ok] {value}"))
}

pub async fn set(executor: &Executor, outcome: &mut HandlerOutcome, cmd: &ParsedCommand) -> Result<String> {
    let key_name = cmd.get("key").expect("required by schema");
    let value = cmd.get("value").expect("required by schema");
    let ns = resolve_namespace(executor, outcome, cmd.get("ns")).await?;
    check_permission(executor, outcome, &ns, false, true, false).await?;
    let ttl = match cmd.get("ttl") {
        Some(raw) => Some(parse_duration(raw)?),
        None => None,
    };
    executor.storage.set(&key_for(&ns, key_name), value, ttl).await?;
    Ok("[ok]".to_string())
}

pub async fn del(executor: &Executor, outcome: &mut HandlerOutcome, cmd: &ParsedCommand) -> Result<String> {
    let key_name = cmd.get("key").expect("required by schema");
    let ns = resolve_namespace(executor, outcome, cmd.get("ns")).await?;
    check_permission(executor, outcome, &ns, false, false, true).await?;
    executor.storage.del(&key_for(&ns, key_name)).await?;
    Ok("[ok]".to_string())
}

pub async fn watch(executor: &Executor, outcome: &mut HandlerOutcome, cmd: &ParsedCommand) -> Result<String> {
    let key_name = cmd.get("key").expect("required by schema");
    let ns = resolve_namespace(executor, outcome, cmd.get("ns")).await?;
    check_permission(executor, outcome, &ns, true, false, false).await?;
    let rx = executor.storage.watch(&key_for(&ns, key_name));
    match tokio::time::timeout(executor.config.network_idle_timeout, rx).await {
        Ok(Ok(value)) => Ok(format!("[ok] {value}")),
        Ok(Err(_)) => Ok("[ok]".to_string()),
        Err(_) => Ok("[ok]".to_string()), // cancelled: idle timeout stands in for ctx.Done
    }
}

pub async fn login(executor: &Executor, session_id: &str, cmd: &ParsedCommand) -> Result<String> {
    let username = cmd.get("user").expect("required by schema");
    let password = cmd.get("pass").expect("required by schema");
    let user = executor
        .identity
        .get_user(username)
        .await
        .map_err(|_| DbError::AuthenticationFailed)?;
    if !user.verify_password(password) {
        return Err(DbError::AuthenticationFailed);
    }
    executor.sessions.delete(session_id);
    executor.sessions.create(session_id, user)?;
    Ok("[ok]".to_string())
}

pub async fn create_user(executor: &Executor, cmd: &ParsedCommand) -> Result<String> {
    let username = cmd.get("user").expect("required by schema");
    let password = cmd.get("pass").expect("required by schema");
    executor.identity.create_user(username, password, Vec::new()).await?;
    Ok("[ok]".to_string())
}

pub async fn get_user(executor: &Executor, cmd: &ParsedCommand) -> Result<String> {
    let username = cmd.get("user").expect("required by schema");
    let user = executor.identity.get_user(username).await?;
    Ok(format!("[ok] {} roles={}", user.username, user.roles.join(",")))
}

pub async fn delete_user(executor: &Executor, cmd: &ParsedCommand) -> Result<String> {
    let username = cmd.get("user").expect("required by schema");
    executor.identity.delete_user(username).await?;
    Ok("[ok]".to_string())
}

pub async fn assign_role(executor: &Executor, cmd: &ParsedCommand) -> Result<String> {
    let username = cmd.get("user").expect("required by schema");
    let role = cmd.get("role").expect("required by schema");
    executor.identity.assign_role(username, role).await?;
    Ok("[ok]".to_string())
}

pub async fn divest_role(executor: &Executor, cmd: &ParsedCommand) -> Result<String> {
    let username = cmd.get("user").expect("required by schema");
    let role = cmd.get("role").expect("required by schema");
    executor.identity.divest_role(username, role).await?;
    Ok("[ok]".to_string())
}

pub async fn users(executor: &Executor) -> Result<String> {
    let list = executor.identity.list_users().await?;
    Ok(format!("[ok] {}", list.join(",")))
}

pub async fn sessions(executor: &Executor) -> Result<String> {
    let list = executor.sessions.list();
    Ok(format!("[ok] {}", list.join(",")))
}

pub async fn me(_executor: &Executor, outcome: &HandlerOutcome) -> Result<String> {
    Ok(format!("[ok] {} roles={}", outcome.user.username, outcome.user.roles.join(",")))
}

pub async fn create_role(executor: &Executor, cmd: &ParsedCommand) -> Result<String> {
    let name = cmd.get("name").expect("required by schema");
    let perms = cmd.get("perms").expect("required by schema");
    let ns = cmd.get("ns").expect("required by schema");
    executor.identity.create_role(name, perms, ns).await?;
    Ok("[ok]".to_string())
}

pub async fn get_role(executor: &Executor, cmd: &ParsedCommand) -> Result<String> {
    let name = cmd.get("name").expect("required by schema");
    let role = executor.identity.get_role(name).await?;
    Ok(format!("[ok] {} {} {}", role.name, role.perms_string(), role.namespace))
}

pub async fn delete_role(executor: &Executor, cmd: &ParsedCommand) -> Result<String> {
    let name = cmd.get("name").expect("required by schema");
    executor.identity.delete_role(name).await?;
    Ok("[ok]".to_string())
}

pub async fn roles(executor: &Executor) -> Result<String> {
    let list = executor.identity.list_roles().await?;
    Ok(format!("[ok] {}", list.join(",")))
}

pub async fn create_ns(executor: &Executor, cmd: &ParsedCommand) -> Result<String> {
    let ns = cmd.get("ns").expect("required by schema");
    executor.identity.create_namespace(ns).await?;
    Ok("[ok]".to_string())
}

pub async fn delete_ns(executor: &Executor, cmd: &ParsedCommand) -> Result<String> {
    let ns = cmd.get("ns").expect("required by schema");
    executor.identity.delete_namespace(ns).await?;
    Ok("[ok]".to_string())
}

pub async fn ns(executor: &Executor, outcome: &HandlerOutcome) -> Result<String> {
    let is_admin = executor.is_admin(&outcome.user);
    let list = executor.identity.visible_namespaces(&outcome.user, is_admin).await?;
    Ok(format!("[ok] {}", list.join(",")))
}

/// `setNamespace`: mutates the session user's active role in place
/// (spec §4.5). Returns the role that was matched so the caller can
/// stash it on `outcome.user` and persist the session.
pub async fn set_ns(executor: &Executor, outcome: &mut HandlerOutcome, cmd: &ParsedCommand) -> Result<String> {
    let target_ns = cmd.get("ns").expect("required by schema");
    if !executor.identity.namespace_exists(target_ns).await {
        return Err(DbError::NamespaceNotFound);
    }
    let role = if executor.is_admin(&outcome.user) {
        Role::full(target_ns)
    } else {
        let mut matched = None;
        for name in &outcome.user.roles {
            if let Ok(role) = executor.identity.get_role(name).await {
                if role.namespace == target_ns {
                    matched = Some(role);
                    break;
                }
            }
        }
        matched.ok_or(DbError::PermissionDenied)?
    };
    outcome.user.active_role = Some(role);
    outcome.user_changed = true;
    Ok("[ok]".to_string())
}

pub async fn help(_executor: &Executor) -> Result<String> {
    use crate::parser::commands::all_commands;
    let lines: Vec<&str> = all_commands().iter().map(|c| c.canonical()).collect();
    Ok(format!("[ok] {}", lines.join(", ")))
}

pub async fn stat(executor: &Executor) -> Result<String> {
    let snapshot = executor.storage.stats();
    Ok(format!(
        "[ok] uptime={} gets={} sets={} dels={} expired={}",
        snapshot.uptime_secs, snapshot.total_gets, snapshot.total_sets, snapshot.total_dels, snapshot.expired_keys
    ))
}

