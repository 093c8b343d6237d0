//! User roles for operation authorization

use serde::{Deserialize, Serialize};
use std::fmt;

/// Roles assigned to users.
///
/// Admin bypasses ownership checks everywhere; researcher and observer are
/// regular users and only differ in how the reporting UI treats them.
/// Unknown role strings in stored documents fall back to observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Researcher,
    #[default]
    #[serde(other)]
    Observer,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Researcher => write!(f, "researcher"),
            Role::Observer => write!(f, "observer"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(
            serde_json::from_str::<Role>("\"researcher\"").unwrap(),
            Role::Researcher
        );
    }

    #[test]
    fn test_unknown_role_falls_back_to_observer() {
        assert_eq!(
            serde_json::from_str::<Role>("\"superuser\"").unwrap(),
            Role::Observer
        );
    }

    #[test]
    fn test_only_admin_is_admin() {
        assert!(Role::Admin.is_admin());
        assert!(!Role::Researcher.is_admin());
        assert!(!Role::Observer.is_admin());
    }
}
