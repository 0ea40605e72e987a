//! In-memory registry of loaded player profiles.
//!
//! One record per player whose profile is live on this server. Local
//! mutations go through the registry so the matching profile event is
//! published exactly once; the registry also subscribes to remote-origin
//! profile events and folds them back into its records, which keeps mute
//! state and nicknames consistent across the fleet without any extra wiring.

use crate::players::PlayerRecord;
use dashmap::DashMap;
use herald_events::{
    ChannelMembershipChangedEvent, ChannelName, EventBus, MuteStateChangedEvent,
    NicknameChangedEvent, PlayerId, PlayerJoinedEvent,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, trace};

/// Returned when an operation targets a player whose profile is not loaded
/// on this server.
#[derive(Debug, Clone, Copy, Error)]
#[error("no profile loaded for player {0}")]
pub struct UnknownPlayer(pub PlayerId);

/// Thread-safe registry of loaded [`PlayerRecord`]s.
pub struct PlayerRegistry {
    players: DashMap<PlayerId, PlayerRecord>,
    events: Arc<EventBus>,
}

impl PlayerRegistry {
    /// Creates a registry bound to an event bus.
    ///
    /// The registry immediately subscribes to the profile events so that
    /// remote-origin changes are applied to local records. Local-origin
    /// instances of the same events are skipped by those handlers; the
    /// mutating call already applied them.
    pub fn new(events: Arc<EventBus>) -> Arc<Self> {
        let registry = Arc::new(Self {
            players: DashMap::new(),
            events,
        });
        registry.subscribe_remote_sync();
        registry
    }

    fn subscribe_remote_sync(self: &Arc<Self>) {
        let me = self.clone();
        self.events.subscribe::<NicknameChangedEvent, _>(move |event| {
            if !event.origin.is_local() {
                me.apply_remote_nickname(event);
            }
            Ok(())
        });

        let me = self.clone();
        self.events.subscribe::<MuteStateChangedEvent, _>(move |event| {
            if !event.origin.is_local() {
                me.apply_remote_mute(event);
            }
            Ok(())
        });

        let me = self.clone();
        self.events
            .subscribe::<ChannelMembershipChangedEvent, _>(move |event| {
                if !event.origin.is_local() {
                    me.apply_remote_membership(event);
                }
                Ok(())
            });
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Loads (or refreshes) a player's profile and announces the join.
    pub fn player_joined(&self, player: PlayerId, username: impl Into<String>) {
        let username = username.into();
        {
            let mut record = self
                .players
                .entry(player)
                .or_insert_with(|| PlayerRecord::new(player, username.clone()));
            record.username = username.clone();
        }
        info!("Player {} joined as {}", player, username);
        self.events.publish(&PlayerJoinedEvent::now(player, username));
    }

    /// Unloads a player's profile, returning the final record so the caller
    /// can persist it one last time.
    pub fn player_left(&self, player: PlayerId) -> Option<PlayerRecord> {
        let removed = self.players.remove(&player).map(|(_, record)| record);
        if removed.is_some() {
            debug!("Unloaded profile for {}", player);
        }
        removed
    }

    // ========================================================================
    // Local Mutations
    // ========================================================================
    //
    // Each mutator updates the record, drops the map guard, and only then
    // publishes the profile event. Handlers are free to read the registry.

    /// Sets or clears a player's nickname.
    pub fn set_nickname(
        &self,
        player: PlayerId,
        nickname: Option<String>,
    ) -> Result<(), UnknownPlayer> {
        let previous = {
            let mut record = self.players.get_mut(&player).ok_or(UnknownPlayer(player))?;
            if record.nickname == nickname {
                return Ok(());
            }
            std::mem::replace(&mut record.nickname, nickname.clone())
        };
        self.events
            .publish(&NicknameChangedEvent::local(player, previous, nickname));
        Ok(())
    }

    /// Sets a player's muted flag.
    pub fn set_muted(&self, player: PlayerId, muted: bool) -> Result<(), UnknownPlayer> {
        {
            let mut record = self.players.get_mut(&player).ok_or(UnknownPlayer(player))?;
            if record.muted == muted {
                return Ok(());
            }
            record.muted = muted;
        }
        self.events
            .publish(&MuteStateChangedEvent::local(player, muted));
        Ok(())
    }

    /// Adds the player to a channel. Returns `true` if the membership is new.
    pub fn join_channel(
        &self,
        player: PlayerId,
        channel: ChannelName,
    ) -> Result<bool, UnknownPlayer> {
        let joined = {
            let mut record = self.players.get_mut(&player).ok_or(UnknownPlayer(player))?;
            record.memberships.insert(channel.clone())
        };
        if joined {
            self.events
                .publish(&ChannelMembershipChangedEvent::local(player, channel, true));
        }
        Ok(joined)
    }

    /// Removes the player from a channel. Returns `true` if they were a member.
    pub fn leave_channel(
        &self,
        player: PlayerId,
        channel: ChannelName,
    ) -> Result<bool, UnknownPlayer> {
        let left = {
            let mut record = self.players.get_mut(&player).ok_or(UnknownPlayer(player))?;
            record.memberships.remove(&channel)
        };
        if left {
            self.events
                .publish(&ChannelMembershipChangedEvent::local(player, channel, false));
        }
        Ok(left)
    }

    /// Starts or stops ignoring another player. Returns `true` if the ignore
    /// list changed.
    ///
    /// Ignore lists are a local preference and are not synced across servers.
    /// No event is published; callers that persist profiles should mark the
    /// record dirty themselves.
    pub fn set_ignoring(
        &self,
        player: PlayerId,
        target: PlayerId,
        ignoring: bool,
    ) -> Result<bool, UnknownPlayer> {
        let mut record = self.players.get_mut(&player).ok_or(UnknownPlayer(player))?;
        let changed = if ignoring {
            record.ignoring.insert(target)
        } else {
            record.ignoring.remove(&target)
        };
        Ok(changed)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Returns a snapshot of a player's record.
    pub fn get(&self, player: PlayerId) -> Option<PlayerRecord> {
        self.players.get(&player).map(|record| record.clone())
    }

    /// Returns `true` if `player` is ignoring `target`. Unknown players
    /// ignore nobody.
    pub fn is_ignoring(&self, player: PlayerId, target: PlayerId) -> bool {
        self.players
            .get(&player)
            .map(|record| record.is_ignoring(target))
            .unwrap_or(false)
    }

    /// Number of profiles currently loaded.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Returns `true` if no profiles are loaded.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// IDs of all loaded profiles.
    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|entry| *entry.key()).collect()
    }

    // ========================================================================
    // Remote Application
    // ========================================================================

    fn apply_remote_nickname(&self, event: &NicknameChangedEvent) {
        match self.players.get_mut(&event.player_id) {
            Some(mut record) => {
                record.nickname = event.nickname.clone();
                debug!("Applied remote nickname change for {}", event.player_id);
            }
            None => trace!(
                "Nickname sync for {} skipped, profile not loaded here",
                event.player_id
            ),
        }
    }

    fn apply_remote_mute(&self, event: &MuteStateChangedEvent) {
        match self.players.get_mut(&event.player_id) {
            Some(mut record) => {
                record.muted = event.muted;
                debug!(
                    "Applied remote mute change for {} (muted: {})",
                    event.player_id, event.muted
                );
            }
            None => trace!(
                "Mute sync for {} skipped, profile not loaded here",
                event.player_id
            ),
        }
    }

    fn apply_remote_membership(&self, event: &ChannelMembershipChangedEvent) {
        match self.players.get_mut(&event.player_id) {
            Some(mut record) => {
                if event.joined {
                    record.memberships.insert(event.channel.clone());
                } else {
                    record.memberships.remove(&event.channel);
                }
                debug!(
                    "Applied remote membership change for {} in {}",
                    event.player_id, event.channel
                );
            }
            None => trace!(
                "Membership sync for {} skipped, profile not loaded here",
                event.player_id
            ),
        }
    }
}

impl std::fmt::Debug for PlayerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerRegistry")
            .field("loaded", &self.players.len())
            .finish()
    }
}
