use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{Action, RoleGrant, authorize::holds_action};

/// Effective permission set of a user: the deduplicated, lexicographically
/// sorted union of direct actions and actions reachable through roles.
///
/// Computed per issuance and never cached. The sort order is load-bearing:
/// authorization binary-searches `actions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermissionSet {
    pub actions: Vec<String>,
    pub roles: Vec<String>,
}

impl EffectivePermissionSet {
    /// Merge direct grants with role-derived grants.
    ///
    /// Inactive actions and inactive roles (with all their actions) are
    /// dropped. Empty inputs yield empty sets.
    pub fn merge(direct: &[Action], via_roles: &[RoleGrant]) -> Self {
        let mut actions: BTreeSet<&str> = direct
            .iter()
            .filter(|a| a.active)
            .map(|a| a.name.as_str())
            .collect();
        let mut roles: BTreeSet<&str> = BTreeSet::new();

        for grant in via_roles.iter().filter(|g| g.role.active) {
            roles.insert(grant.role.name.as_str());
            actions.extend(
                grant
                    .actions
                    .iter()
                    .filter(|a| a.active)
                    .map(|a| a.name.as_str()),
            );
        }

        Self {
            actions: actions.into_iter().map(str::to_string).collect(),
            roles: roles.into_iter().map(str::to_string).collect(),
        }
    }

    /// Sort and deduplicate both lists, for sets assembled by hand.
    pub fn normalized(self) -> Self {
        let actions: BTreeSet<String> = self.actions.into_iter().collect();
        let roles: BTreeSet<String> = self.roles.into_iter().collect();
        Self {
            actions: actions.into_iter().collect(),
            roles: roles.into_iter().collect(),
        }
    }

    pub fn contains_action(&self, name: &str) -> bool {
        holds_action(&self.actions, name)
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.roles.is_empty()
    }
}
