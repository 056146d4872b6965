//! Role model - the closed set of account roles and the privilege predicate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Staff,
    Coach,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Staff => "staff",
            Role::Coach => "coach",
            Role::Member => "member",
        }
    }

    /// Parse a role label case-insensitively.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "manager" => Some(Role::Manager),
            "staff" => Some(Role::Staff),
            "coach" => Some(Role::Coach),
            "member" => Some(Role::Member),
            _ => None,
        }
    }

    /// Roles subject to the two-factor policy.
    pub fn is_privileged(&self) -> bool {
        match self {
            Role::Admin | Role::Manager | Role::Staff | Role::Coach => true,
            Role::Member => false,
        }
    }
}

/// Roles resolved for one account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivilegeSet {
    roles: BTreeSet<Role>,
}

impl PrivilegeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_roles(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: roles.into_iter().collect(),
        }
    }

    /// Build from provider labels; unknown labels are skipped.
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let mut roles = BTreeSet::new();
        for label in labels {
            match Role::parse(label) {
                Some(role) => {
                    roles.insert(role);
                }
                None => tracing::debug!(label = %label, "Ignoring unknown role label"),
            }
        }
        Self { roles }
    }

    pub fn insert(&mut self, role: Role) -> bool {
        self.roles.insert(role)
    }

    pub fn contains(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.roles.iter().copied()
    }

    /// True when any role falls under the two-factor policy.
    pub fn is_privileged(&self) -> bool {
        self.roles.iter().any(Role::is_privileged)
    }
}

impl FromIterator<Role> for PrivilegeSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self::from_roles(iter)
    }
}
