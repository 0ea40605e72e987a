//! Named broadcast scopes and their visibility rules.
//!
//! The registry holds an immutable snapshot of all configured channels.
//! Reload builds a complete replacement snapshot and swaps it in under a
//! single write lock, so readers either see the old configuration or the new
//! one, never a mix. A document that fails validation leaves the current
//! snapshot untouched.

use crate::channels::{ChannelConfigError, ChannelSettings, ChannelsConfig};
use crate::permissions::PermissionProvider;
use crate::players::PlayerRegistry;
use herald_events::{ChannelName, PlayerId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// A single configured chat channel.
#[derive(Debug, Clone)]
pub struct ChatChannel {
    /// Unique channel name
    pub name: ChannelName,
    /// Format template handed to the host's renderer
    pub format: String,
    /// Whether players are placed in this channel automatically
    pub join_by_default: bool,
    /// Permission node required to see this channel, if any
    pub see_permission: Option<String>,
}

impl ChatChannel {
    fn from_settings(settings: &ChannelSettings) -> Self {
        Self {
            name: ChannelName::new(settings.name.clone()),
            format: settings.format.clone(),
            join_by_default: settings.join_by_default,
            see_permission: settings.see_permission.clone(),
        }
    }
}

/// One immutable generation of channel configuration.
struct ChannelSet {
    by_name: HashMap<ChannelName, Arc<ChatChannel>>,
    ordered: Vec<Arc<ChatChannel>>,
    default_channel: Option<ChannelName>,
}

impl ChannelSet {
    fn empty() -> Self {
        Self {
            by_name: HashMap::new(),
            ordered: Vec::new(),
            default_channel: None,
        }
    }

    fn from_config(config: &ChannelsConfig) -> Self {
        let mut by_name = HashMap::new();
        let mut ordered = Vec::new();
        for settings in &config.channels {
            let channel = Arc::new(ChatChannel::from_settings(settings));
            by_name.insert(channel.name.clone(), channel.clone());
            ordered.push(channel);
        }
        Self {
            by_name,
            ordered,
            default_channel: Some(ChannelName::new(config.default_channel.clone())),
        }
    }
}

/// Thread-safe registry of chat channels.
///
/// Starts empty; call [`reload`](Self::reload) with a validated
/// [`ChannelsConfig`] to populate it. Lookups hand out `Arc<ChatChannel>`
/// snapshots, so a reload never invalidates a channel a caller is holding.
pub struct ChannelRegistry {
    set: RwLock<Arc<ChannelSet>>,
    permissions: Arc<dyn PermissionProvider>,
    players: Arc<PlayerRegistry>,
}

impl ChannelRegistry {
    /// Creates an empty registry.
    pub fn new(permissions: Arc<dyn PermissionProvider>, players: Arc<PlayerRegistry>) -> Self {
        Self {
            set: RwLock::new(Arc::new(ChannelSet::empty())),
            permissions,
            players,
        }
    }

    fn snapshot(&self) -> Arc<ChannelSet> {
        self.set.read().expect("channel set lock poisoned").clone()
    }

    /// Replaces the entire channel set from a configuration document.
    ///
    /// The document is validated first; on error the registry keeps serving
    /// the previous set. Returns the number of channels loaded.
    pub fn reload(&self, config: &ChannelsConfig) -> Result<usize, ChannelConfigError> {
        config.validate()?;
        let next = Arc::new(ChannelSet::from_config(config));
        let count = next.ordered.len();
        *self.set.write().expect("channel set lock poisoned") = next;
        info!(
            "Loaded {} chat channels (default: {})",
            count, config.default_channel
        );
        Ok(count)
    }

    /// Looks up a channel by name.
    pub fn channel(&self, name: &ChannelName) -> Option<Arc<ChatChannel>> {
        self.snapshot().by_name.get(name).cloned()
    }

    /// The configured default channel, if the registry has been loaded.
    pub fn default_channel(&self) -> Option<Arc<ChatChannel>> {
        let set = self.snapshot();
        let name = set.default_channel.as_ref()?;
        set.by_name.get(name).cloned()
    }

    /// All channels in configuration order.
    pub fn channels(&self) -> Vec<Arc<ChatChannel>> {
        self.snapshot().ordered.clone()
    }

    /// Number of configured channels.
    pub fn len(&self) -> usize {
        self.snapshot().ordered.len()
    }

    /// Returns `true` if no configuration has been loaded.
    pub fn is_empty(&self) -> bool {
        self.snapshot().ordered.is_empty()
    }

    /// Decides whether a message in `channel` from `sender` should reach
    /// `recipient`.
    ///
    /// The recipient must hold the channel's see-permission (when one is
    /// configured) and must not be ignoring the sender. Unknown channels are
    /// visible to nobody.
    pub fn visible_to(
        &self,
        channel: &ChannelName,
        sender: PlayerId,
        recipient: PlayerId,
    ) -> bool {
        let Some(channel) = self.channel(channel) else {
            return false;
        };
        if let Some(node) = &channel.see_permission {
            if !self.permissions.has_permission(recipient, node) {
                return false;
            }
        }
        !self.players.is_ignoring(recipient, sender)
    }
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = self.snapshot();
        f.debug_struct("ChannelRegistry")
            .field("channels", &set.ordered.len())
            .field("default_channel", &set.default_channel)
            .finish()
    }
}
