//! Mute toggling and fleet-wide message deletion.

use crate::messaging::SignatureCache;
use crate::permissions::{PermissionProvider, MUTE_EXEMPT};
use crate::players::{PlayerRegistry, UnknownPlayer};
use herald_events::{EventBus, MessageDeletedEvent, MessageId, PlayerId};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of a mute toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuteOutcome {
    /// The player is now muted
    Muted,
    /// The player is no longer muted
    Unmuted,
    /// The player holds the exempt permission and was left unmuted
    Exempt,
}

/// Result of a deletion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The message was retracted locally and the request broadcast
    Deleted,
    /// The message is not in the signature cache; nothing happened
    NotFound,
}

/// Moderation entry points.
///
/// Both operations work by publishing events; the messaging manager picks
/// those up and broadcasts them, so a mute or deletion performed here takes
/// effect across the fleet without moderation knowing about transports.
pub struct Moderation {
    events: Arc<EventBus>,
    players: Arc<PlayerRegistry>,
    signatures: Arc<SignatureCache>,
    permissions: Arc<dyn PermissionProvider>,
}

impl Moderation {
    pub fn new(
        events: Arc<EventBus>,
        players: Arc<PlayerRegistry>,
        signatures: Arc<SignatureCache>,
        permissions: Arc<dyn PermissionProvider>,
    ) -> Self {
        Self {
            events,
            players,
            signatures,
            permissions,
        }
    }

    /// Flips a player's mute state.
    ///
    /// Unmuting always works. Muting is refused with
    /// [`MuteOutcome::Exempt`] when the target holds [`MUTE_EXEMPT`].
    pub fn toggle_mute(&self, target: PlayerId) -> Result<MuteOutcome, UnknownPlayer> {
        let record = self.players.get(target).ok_or(UnknownPlayer(target))?;

        if record.muted {
            self.players.set_muted(target, false)?;
            info!("Unmuted {}", record.username);
            Ok(MuteOutcome::Unmuted)
        } else if self.permissions.has_permission(target, MUTE_EXEMPT) {
            debug!("{} is exempt from mutes", record.username);
            Ok(MuteOutcome::Exempt)
        } else {
            self.players.set_muted(target, true)?;
            info!("Muted {}", record.username);
            Ok(MuteOutcome::Muted)
        }
    }

    /// Retracts a recent message everywhere.
    ///
    /// Consumes the local signature record, so deleting the same message
    /// twice reports [`DeleteOutcome::NotFound`] the second time.
    pub fn delete_message(&self, message_id: MessageId) -> DeleteOutcome {
        match self.signatures.take(&message_id) {
            Some(record) => {
                info!("Deleted message {} from {}", message_id, record.sender);
                self.events.publish(&MessageDeletedEvent::local(message_id));
                DeleteOutcome::Deleted
            }
            None => {
                debug!("Message {} is not deletable, not in the cache", message_id);
                DeleteOutcome::NotFound
            }
        }
    }

    /// Message IDs a deletion command can currently target, for completion.
    pub fn message_id_suggestions(&self) -> Vec<String> {
        self.signatures.id_suggestions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::SignatureRecord;
    use crate::permissions::StaticPermissions;
    use herald_events::{ChannelName, MuteStateChangedEvent};
    use std::sync::Mutex;

    fn setup() -> (
        Arc<EventBus>,
        Arc<PlayerRegistry>,
        Arc<SignatureCache>,
        Arc<StaticPermissions>,
        Moderation,
    ) {
        let events = Arc::new(EventBus::new());
        let players = PlayerRegistry::new(events.clone());
        let signatures = Arc::new(SignatureCache::default());
        let permissions = Arc::new(StaticPermissions::new());
        let moderation = Moderation::new(
            events.clone(),
            players.clone(),
            signatures.clone(),
            permissions.clone(),
        );
        (events, players, signatures, permissions, moderation)
    }

    #[test]
    fn toggle_cycles_between_muted_and_unmuted() {
        let (events, players, _signatures, _permissions, moderation) = setup();
        let player = PlayerId::new();
        players.player_joined(player, "Steve");

        let changes = Arc::new(Mutex::new(Vec::new()));
        let changes_clone = changes.clone();
        events.subscribe::<MuteStateChangedEvent, _>(move |event| {
            changes_clone.lock().unwrap().push(event.muted);
            Ok(())
        });

        assert_eq!(moderation.toggle_mute(player).unwrap(), MuteOutcome::Muted);
        assert!(players.get(player).unwrap().muted);

        assert_eq!(moderation.toggle_mute(player).unwrap(), MuteOutcome::Unmuted);
        assert!(!players.get(player).unwrap().muted);

        assert_eq!(changes.lock().unwrap().as_slice(), [true, false]);
    }

    #[test]
    fn exempt_player_is_not_muted() {
        let (_events, players, _signatures, permissions, moderation) = setup();
        let admin = PlayerId::new();
        players.player_joined(admin, "Admin");
        permissions.grant(admin, MUTE_EXEMPT);

        assert_eq!(moderation.toggle_mute(admin).unwrap(), MuteOutcome::Exempt);
        assert!(!players.get(admin).unwrap().muted);
    }

    #[test]
    fn exempt_player_can_still_be_unmuted() {
        let (_events, players, _signatures, permissions, moderation) = setup();
        let admin = PlayerId::new();
        players.player_joined(admin, "Admin");

        // Muted first, granted the exemption afterwards.
        moderation.toggle_mute(admin).unwrap();
        permissions.grant(admin, MUTE_EXEMPT);

        assert_eq!(moderation.toggle_mute(admin).unwrap(), MuteOutcome::Unmuted);
    }

    #[test]
    fn toggling_unknown_player_fails() {
        let (_events, _players, _signatures, _permissions, moderation) = setup();
        assert!(moderation.toggle_mute(PlayerId::new()).is_err());
    }

    #[test]
    fn delete_publishes_once_then_reports_not_found() {
        let (events, _players, signatures, _permissions, moderation) = setup();
        let message_id = MessageId::new();
        signatures.remember(
            message_id,
            SignatureRecord::new(PlayerId::new(), ChannelName::from("global")),
        );

        let deletions = Arc::new(Mutex::new(Vec::new()));
        let deletions_clone = deletions.clone();
        events.subscribe::<MessageDeletedEvent, _>(move |event| {
            deletions_clone.lock().unwrap().push(event.message_id);
            Ok(())
        });

        assert_eq!(moderation.delete_message(message_id), DeleteOutcome::Deleted);
        assert_eq!(moderation.delete_message(message_id), DeleteOutcome::NotFound);
        assert_eq!(deletions.lock().unwrap().as_slice(), [message_id]);
    }

    #[test]
    fn deleting_unknown_message_publishes_nothing() {
        let (events, _players, _signatures, _permissions, moderation) = setup();

        let count = Arc::new(Mutex::new(0usize));
        let count_clone = count.clone();
        events.subscribe::<MessageDeletedEvent, _>(move |_event| {
            *count_clone.lock().unwrap() += 1;
            Ok(())
        });

        assert_eq!(
            moderation.delete_message(MessageId::new()),
            DeleteOutcome::NotFound
        );
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn suggestions_track_cache_contents() {
        let (_events, _players, signatures, _permissions, moderation) = setup();
        assert!(moderation.message_id_suggestions().is_empty());

        let message_id = MessageId::new();
        signatures.remember(
            message_id,
            SignatureRecord::new(PlayerId::new(), ChannelName::from("global")),
        );

        assert_eq!(moderation.message_id_suggestions(), [message_id.to_string()]);
    }
}
