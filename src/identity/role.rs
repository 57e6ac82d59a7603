//! `Role`: a permission triple (`get`/`set`/`del`) scoped to exactly one
//! namespace, with the `r`/`w`/`d` string representation named in spec §3.
//!
//! Grounded on the teacher's `security/rbac.rs` role shape, narrowed from
//! its hierarchical/time-windowed model down to the flat triple this
//! system actually needs.

use crate::error::{DbError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub get: bool,
    pub set: bool,
    pub del: bool,
    pub namespace: String,
}

impl Role {
    /// Parses a 1-3 character permission string drawn from `{r, w, d}`.
    /// Duplicate or unrecognized characters are rejected.
    pub fn parse(name: impl Into<String>, perms: &str, namespace: impl Into<String>) -> Result<Self> {
        if perms.is_empty() || perms.len() > 3 {
            return Err(DbError::InvalidSyntax(format!(
                "perms must be 1-3 characters from {{r,w,d}}, got {perms:?}"
            )));
        }
        let mut role = Role { name: name.into(), get: false, set: false, del: false, namespace: namespace.into() };
        let mut seen = std::collections::HashSet::new();
        for c in perms.chars() {
            if !seen.insert(c) {
                return Err(DbError::InvalidSyntax(format!("duplicate perm character {c:?}")));
            }
            match c {
                'r' => role.get = true,
                'w' => role.set = true,
                'd' => role.del = true,
                other => {
                    return Err(DbError::InvalidSyntax(format!("unknown perm character {other:?}")))
                }
            }
        }
        Ok(role)
    }

    pub fn perms_string(&self) -> String {
        let mut s = String::new();
        if self.get {
            s.push('r');
        }
        if self.set {
            s.push('w');
        }
        if self.del {
            s.push('d');
        }
        s
    }

    /// Synthetic full-permission role handed to the admin user for
    /// whichever namespace it is currently operating on (spec §4.5).
    pub fn full(namespace: impl Into<String>) -> Self {
        Role { name: "__admin__".to_string(), get: true, set: true, del: true, namespace: namespace.into() }
    }

    pub fn allows(&self, get: bool, set: bool, del: bool) -> bool {
        (!get || self.get) && (!set || self.set) && (!del || self.del)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_perm_letter() {
        let r = Role::parse("rw_t3", "rw", "t3").unwrap();
        assert!(r.get && r.set && !r.del);
        assert_eq!(r.perms_string(), "rw");
    }

    #[test]
    fn rejects_duplicate_letters() {
        assert!(Role::parse("x", "rr", "t3").is_err());
    }

    #[test]
    fn rejects_unknown_letters() {
        assert!(Role::parse("x", "rx", "t3").is_err());
    }

    #[test]
    fn full_role_allows_everything() {
        let r = Role::full("t3");
        assert!(r.allows(true, true, true));
    }
}
