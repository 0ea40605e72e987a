//! Player chat profiles.

use herald_events::{ChannelName, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Chat-facing state for a single player.
///
/// Records live in memory while the player's profile is loaded on this server
/// and are written out through [`PlayerStore`](crate::players::PlayerStore)
/// when dirty. The same record shape travels between servers as profile-sync
/// deltas, so every field here must stay serializable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Stable player identity
    pub id: PlayerId,
    /// Account name, never changes while online
    pub username: String,
    /// Display name override, `None` when unset
    pub nickname: Option<String>,
    /// Whether the player is currently muted
    pub muted: bool,
    /// Channels the player has joined
    pub memberships: HashSet<ChannelName>,
    /// Players whose messages this player has chosen not to see
    pub ignoring: HashSet<PlayerId>,
}

impl PlayerRecord {
    /// Creates a fresh record with no nickname, no mute, and no memberships.
    pub fn new(id: PlayerId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            nickname: None,
            muted: false,
            memberships: HashSet::new(),
            ignoring: HashSet::new(),
        }
    }

    /// The name to show in chat: the nickname when set, otherwise the
    /// account name.
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.username)
    }

    /// Returns `true` if the player has joined the given channel.
    pub fn is_member(&self, channel: &ChannelName) -> bool {
        self.memberships.contains(channel)
    }

    /// Returns `true` if the player is ignoring the other player.
    pub fn is_ignoring(&self, other: PlayerId) -> bool {
        self.ignoring.contains(&other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_nickname() {
        let mut record = PlayerRecord::new(PlayerId::new(), "Steve");
        assert_eq!(record.display_name(), "Steve");

        record.nickname = Some("Captain".to_string());
        assert_eq!(record.display_name(), "Captain");
    }

    #[test]
    fn record_survives_json_round_trip() {
        let mut record = PlayerRecord::new(PlayerId::new(), "Alex");
        record.muted = true;
        record.memberships.insert(ChannelName::from("global"));
        record.ignoring.insert(PlayerId::new());

        let json = serde_json::to_string(&record).unwrap();
        let parsed: PlayerRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, record.id);
        assert_eq!(parsed.username, "Alex");
        assert!(parsed.muted);
        assert!(parsed.is_member(&ChannelName::from("global")));
        assert_eq!(parsed.ignoring.len(), 1);
    }
}
