//! Chat submission pipeline.
//!
//! The host calls [`ChatPipeline::submit`] with raw player input. The
//! pipeline applies mute suppression, resolves the channel (falling back to
//! the configured default), stamps a fresh message ID, and publishes the
//! message as a local [`ChatMessageEvent`]. Everything downstream, relaying
//! included, hangs off that event.

use crate::channels::ChannelRegistry;
use crate::players::{PlayerRegistry, UnknownPlayer};
use herald_events::{ChannelName, ChatMessageEvent, EventBus, MessageId, PlayerId};
use std::sync::Arc;
use tracing::debug;

/// What happened to a submitted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOutcome {
    /// Published locally under this message ID
    Sent(MessageId),
    /// The sender is muted; nothing was published
    Muted,
    /// No such channel and no default to fall back to
    UnknownChannel,
}

/// Turns player input into chat events.
pub struct ChatPipeline {
    events: Arc<EventBus>,
    players: Arc<PlayerRegistry>,
    channels: Arc<ChannelRegistry>,
}

impl ChatPipeline {
    pub fn new(
        events: Arc<EventBus>,
        players: Arc<PlayerRegistry>,
        channels: Arc<ChannelRegistry>,
    ) -> Self {
        Self {
            events,
            players,
            channels,
        }
    }

    /// Submits a chat message.
    ///
    /// `channel` may be `None` to speak in the default channel. A channel
    /// name that is not configured also falls back to the default; only a
    /// registry with no default at all yields
    /// [`ChatOutcome::UnknownChannel`].
    pub fn submit(
        &self,
        sender: PlayerId,
        channel: Option<&ChannelName>,
        content: impl Into<String>,
    ) -> Result<ChatOutcome, UnknownPlayer> {
        let record = self.players.get(sender).ok_or(UnknownPlayer(sender))?;

        if record.muted {
            debug!("Suppressed chat from muted player {}", record.username);
            return Ok(ChatOutcome::Muted);
        }

        let resolved = match channel {
            Some(name) => match self.channels.channel(name) {
                Some(channel) => channel,
                None => match self.channels.default_channel() {
                    Some(default) => {
                        debug!("Unknown channel {}, falling back to {}", name, default.name);
                        default
                    }
                    None => return Ok(ChatOutcome::UnknownChannel),
                },
            },
            None => match self.channels.default_channel() {
                Some(default) => default,
                None => return Ok(ChatOutcome::UnknownChannel),
            },
        };

        let message_id = MessageId::new();
        self.events.publish(&ChatMessageEvent::local(
            message_id,
            sender,
            record.display_name().to_string(),
            resolved.name.clone(),
            content.into(),
        ));
        Ok(ChatOutcome::Sent(message_id))
    }

    /// Loads a player's profile and joins them to every channel marked
    /// join-by-default.
    pub fn player_joined(&self, player: PlayerId, username: impl Into<String>) {
        self.players.player_joined(player, username);
        for channel in self.channels.channels() {
            if channel.join_by_default {
                // Cannot fail, the record was just inserted.
                let _ = self.players.join_channel(player, channel.name.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::ChannelsConfig;
    use crate::permissions::StaticPermissions;
    use herald_events::EventOrigin;
    use std::sync::Mutex;

    fn setup() -> (Arc<EventBus>, Arc<PlayerRegistry>, Arc<ChannelRegistry>, ChatPipeline) {
        let events = Arc::new(EventBus::new());
        let players = PlayerRegistry::new(events.clone());
        let channels = Arc::new(ChannelRegistry::new(
            Arc::new(StaticPermissions::new()),
            players.clone(),
        ));
        channels.reload(&ChannelsConfig::default()).unwrap();
        let pipeline = ChatPipeline::new(events.clone(), players.clone(), channels.clone());
        (events, players, channels, pipeline)
    }

    fn capture_chat(events: &EventBus) -> Arc<Mutex<Vec<ChatMessageEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        events.subscribe::<ChatMessageEvent, _>(move |event| {
            seen_clone.lock().unwrap().push(event.clone());
            Ok(())
        });
        seen
    }

    #[test]
    fn submit_publishes_local_event() {
        let (events, players, _channels, pipeline) = setup();
        let seen = capture_chat(&events);

        let sender = PlayerId::new();
        players.player_joined(sender, "Steve");

        let outcome = pipeline
            .submit(sender, Some(&ChannelName::from("staff")), "hi team")
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let event = &seen[0];
        assert_eq!(outcome, ChatOutcome::Sent(event.message_id));
        assert_eq!(event.origin, EventOrigin::Local);
        assert_eq!(event.channel, ChannelName::from("staff"));
        assert_eq!(event.sender_name, "Steve");
        assert_eq!(event.content, "hi team");
    }

    #[test]
    fn display_name_reflects_nickname() {
        let (events, players, _channels, pipeline) = setup();
        let seen = capture_chat(&events);

        let sender = PlayerId::new();
        players.player_joined(sender, "Steve");
        players.set_nickname(sender, Some("Captain".to_string())).unwrap();

        pipeline.submit(sender, None, "ahoy").unwrap();

        assert_eq!(seen.lock().unwrap()[0].sender_name, "Captain");
    }

    #[test]
    fn muted_sender_is_suppressed() {
        let (events, players, _channels, pipeline) = setup();
        let seen = capture_chat(&events);

        let sender = PlayerId::new();
        players.player_joined(sender, "Steve");
        players.set_muted(sender, true).unwrap();

        let outcome = pipeline.submit(sender, None, "can you hear me").unwrap();

        assert_eq!(outcome, ChatOutcome::Muted);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn unknown_channel_falls_back_to_default() {
        let (events, players, _channels, pipeline) = setup();
        let seen = capture_chat(&events);

        let sender = PlayerId::new();
        players.player_joined(sender, "Steve");

        pipeline
            .submit(sender, Some(&ChannelName::from("nonexistent")), "hello")
            .unwrap();

        assert_eq!(seen.lock().unwrap()[0].channel, ChannelName::from("global"));
    }

    #[test]
    fn missing_channel_is_default_when_unspecified() {
        let (events, players, _channels, pipeline) = setup();
        let seen = capture_chat(&events);

        let sender = PlayerId::new();
        players.player_joined(sender, "Steve");
        pipeline.submit(sender, None, "hello").unwrap();

        assert_eq!(seen.lock().unwrap()[0].channel, ChannelName::from("global"));
    }

    #[test]
    fn empty_registry_yields_unknown_channel() {
        let events = Arc::new(EventBus::new());
        let players = PlayerRegistry::new(events.clone());
        let channels = Arc::new(ChannelRegistry::new(
            Arc::new(StaticPermissions::new()),
            players.clone(),
        ));
        let pipeline = ChatPipeline::new(events.clone(), players.clone(), channels);

        let sender = PlayerId::new();
        players.player_joined(sender, "Steve");

        let outcome = pipeline.submit(sender, None, "anyone").unwrap();
        assert_eq!(outcome, ChatOutcome::UnknownChannel);
    }

    #[test]
    fn unknown_sender_is_an_error() {
        let (_events, _players, _channels, pipeline) = setup();
        assert!(pipeline.submit(PlayerId::new(), None, "boo").is_err());
    }

    #[test]
    fn join_applies_default_channel_memberships() {
        let (_events, players, _channels, pipeline) = setup();

        let player = PlayerId::new();
        pipeline.player_joined(player, "Steve");

        let record = players.get(player).unwrap();
        assert!(record.is_member(&ChannelName::from("global")));
        assert!(!record.is_member(&ChannelName::from("staff")));
    }
}
