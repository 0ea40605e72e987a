//! Permission lookups for chat features.
//!
//! Herald never evaluates permissions itself. The host process implements
//! [`PermissionProvider`] against whatever permission system it runs, and the
//! channel registry and moderation paths consult it through this trait.

use herald_events::PlayerId;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// Permission node that exempts a player from being muted.
pub const MUTE_EXEMPT: &str = "herald.mute.exempt";

/// Host-provided permission checks.
///
/// Implementations must be cheap and non-blocking; lookups happen on the
/// chat submission path.
pub trait PermissionProvider: Send + Sync {
    /// Returns `true` if the player holds the given permission node.
    fn has_permission(&self, player: PlayerId, node: &str) -> bool;
}

/// Fixed in-memory permission table.
///
/// Useful for tests and standalone deployments that have no real permission
/// backend. Grants are per-player; there is no wildcard or inheritance.
pub struct StaticPermissions {
    grants: RwLock<HashMap<PlayerId, HashSet<String>>>,
}

impl StaticPermissions {
    /// Creates an empty table. No player holds any permission.
    pub fn new() -> Self {
        Self {
            grants: RwLock::new(HashMap::new()),
        }
    }

    /// Grants a permission node to a player.
    pub fn grant(&self, player: PlayerId, node: impl Into<String>) {
        self.grants
            .write()
            .expect("permission table lock poisoned")
            .entry(player)
            .or_default()
            .insert(node.into());
    }

    /// Revokes a permission node from a player.
    pub fn revoke(&self, player: PlayerId, node: &str) {
        if let Some(nodes) = self
            .grants
            .write()
            .expect("permission table lock poisoned")
            .get_mut(&player)
        {
            nodes.remove(node);
        }
    }
}

impl Default for StaticPermissions {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionProvider for StaticPermissions {
    fn has_permission(&self, player: PlayerId, node: &str) -> bool {
        self.grants
            .read()
            .expect("permission table lock poisoned")
            .get(&player)
            .map(|nodes| nodes.contains(node))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_are_per_player() {
        let perms = StaticPermissions::new();
        let alice = PlayerId::new();
        let bob = PlayerId::new();

        perms.grant(alice, MUTE_EXEMPT);

        assert!(perms.has_permission(alice, MUTE_EXEMPT));
        assert!(!perms.has_permission(bob, MUTE_EXEMPT));
    }

    #[test]
    fn revoke_removes_only_that_node() {
        let perms = StaticPermissions::new();
        let alice = PlayerId::new();

        perms.grant(alice, MUTE_EXEMPT);
        perms.grant(alice, "herald.channel.staff");
        perms.revoke(alice, MUTE_EXEMPT);

        assert!(!perms.has_permission(alice, MUTE_EXEMPT));
        assert!(perms.has_permission(alice, "herald.channel.staff"));
    }
}
