//! `User`: a persisted identity record plus the per-session active role
//! the executor swaps in when a session switches namespace.
//!
//! Grounded on the teacher's `security/authentication.rs` password-hash
//! flow (`bcrypt`-style verify-on-login), narrowed to the fields spec §3
//! actually names.

use crate::identity::role::Role;
use crate::error::{DbError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password_hash: String,
    pub roles: Vec<String>,
    /// Not persisted: recomputed each time a session selects a namespace
    /// (spec §4.5's `setNamespace`).
    #[serde(skip)]
    pub active_role: Option<Role>,
}

impl User {
    pub fn new(username: impl Into<String>, password: &str, roles: Vec<String>) -> Result<Self> {
        let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|e| DbError::Internal(format!("password hash failed: {e}")))?;
        Ok(User { username: username.into(), password_hash, roles, active_role: None })
    }

    pub fn verify_password(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.password_hash).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_verifies_its_own_password() {
        let user = User::new("alice", "s3cret", vec![]).unwrap();
        assert!(user.verify_password("s3cret"));
        assert!(!user.verify_password("wrong"));
    }
}
