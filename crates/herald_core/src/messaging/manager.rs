//! Bridges the local event bus onto the packet transport.
//!
//! One [`MessagingManager`] runs per server process. Outbound, it watches the
//! bus for local-origin chat, deletion, and profile events and broadcasts
//! them as packets stamped with this server's ID. Inbound, it decodes packets
//! from the transport, drops everything this server broadcast itself, and
//! republishes the rest as remote-origin events.
//!
//! The origin stamp is the only loop protection there is, so it is not
//! optional: transports are allowed to echo a publisher's own packets back
//! (the in-memory bus always does), and without the self-echo check every
//! message would arrive twice at its origin.
//!
//! Hosts normally reach the manager through [`Messaging`], which defers
//! connecting until the first real use.

use crate::messaging::packet::{
    ChatRelayPayload, DeleteRequestPayload, PacketDecodeError, PacketEnvelope, PacketKind,
    ProfileSyncPayload,
};
use crate::messaging::service::{PacketService, PacketServiceFactory, PacketSink, TransportError};
use crate::messaging::signatures::{SignatureCache, SignatureRecord};
use herald_events::{
    ChannelMembershipChangedEvent, ChatMessageEvent, EventBus, EventOrigin, MessageDeletedEvent,
    MuteStateChangedEvent, NicknameChangedEvent, ServerId, SubscriptionId,
};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, trace, warn};

/// Connected messaging pipeline for one server.
pub struct MessagingManager {
    server_id: ServerId,
    events: Arc<EventBus>,
    signatures: Arc<SignatureCache>,
    transport: Arc<dyn PacketService>,
    runtime: tokio::runtime::Handle,
    subscriptions: Mutex<Vec<SubscriptionId>>,
}

impl MessagingManager {
    /// Connects through the factory and wires both directions: a transport
    /// subscription for inbound packets and bus subscriptions for outbound
    /// events.
    pub async fn start(
        server_id: ServerId,
        events: Arc<EventBus>,
        signatures: Arc<SignatureCache>,
        factory: &dyn PacketServiceFactory,
    ) -> Result<Arc<Self>, TransportError> {
        let transport = factory.connect().await?;
        let manager = Arc::new(Self {
            server_id,
            events,
            signatures,
            transport,
            runtime: tokio::runtime::Handle::current(),
            subscriptions: Mutex::new(Vec::new()),
        });
        manager.subscribe_inbound().await?;
        manager.subscribe_outbound();
        info!("Messaging online as server {}", server_id);
        Ok(manager)
    }

    /// This server's identity on the wire.
    pub fn server_id(&self) -> ServerId {
        self.server_id
    }

    /// Detaches from the event bus and closes the transport. After this the
    /// manager relays nothing in either direction.
    pub async fn shutdown(&self) -> Result<(), TransportError> {
        let ids: Vec<SubscriptionId> = self
            .subscriptions
            .lock()
            .expect("subscription list lock poisoned")
            .drain(..)
            .collect();
        for id in ids {
            self.events.unsubscribe(id);
        }
        self.transport.shutdown().await
    }

    // ========================================================================
    // Inbound: transport -> bus
    // ========================================================================

    async fn subscribe_inbound(self: &Arc<Self>) -> Result<(), TransportError> {
        for kind in PacketKind::ALL {
            let me = self.clone();
            let sink: PacketSink = Arc::new(move |data| me.handle_inbound(&data));
            self.transport.subscribe(kind.topic(), sink).await?;
        }
        Ok(())
    }

    fn handle_inbound(&self, data: &[u8]) {
        let envelope = match PacketEnvelope::decode(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Discarding undecodable packet: {}", e);
                return;
            }
        };

        if envelope.origin == self.server_id {
            trace!("Discarding own {:?} broadcast", envelope.kind);
            return;
        }

        let result = match envelope.kind {
            PacketKind::ChatRelay => self.accept_chat_relay(&envelope),
            PacketKind::DeleteRequest => self.accept_delete_request(&envelope),
            PacketKind::ProfileSync => self.accept_profile_sync(&envelope),
        };
        if let Err(e) = result {
            warn!("Discarding packet from {}: {}", envelope.origin, e);
        }
    }

    fn accept_chat_relay(&self, envelope: &PacketEnvelope) -> Result<(), PacketDecodeError> {
        let payload: ChatRelayPayload = envelope.parse_payload()?;
        debug!(
            "📨 Chat relay from server {} in channel {}",
            envelope.origin, payload.channel
        );

        // Remember the message here too. Deletion can be initiated on any
        // server, so every server that saw the message keeps its record.
        self.signatures.remember(
            payload.message_id,
            SignatureRecord::new(payload.sender, payload.channel.clone()),
        );

        self.events.publish(&ChatMessageEvent {
            message_id: payload.message_id,
            sender: payload.sender,
            sender_name: payload.sender_name,
            channel: payload.channel,
            content: payload.content,
            origin: EventOrigin::Remote(envelope.origin),
            timestamp: envelope.sent_at,
        });
        Ok(())
    }

    fn accept_delete_request(&self, envelope: &PacketEnvelope) -> Result<(), PacketDecodeError> {
        let payload: DeleteRequestPayload = envelope.parse_payload()?;
        match self.signatures.take(&payload.message_id) {
            Some(_) => {
                debug!(
                    "📨 Delete request for message {} from server {}",
                    payload.message_id, envelope.origin
                );
                self.events.publish(&MessageDeletedEvent {
                    message_id: payload.message_id,
                    origin: EventOrigin::Remote(envelope.origin),
                    timestamp: envelope.sent_at,
                });
            }
            None => trace!(
                "Delete request for unknown message {}, nothing to retract",
                payload.message_id
            ),
        }
        Ok(())
    }

    fn accept_profile_sync(&self, envelope: &PacketEnvelope) -> Result<(), PacketDecodeError> {
        let payload: ProfileSyncPayload = envelope.parse_payload()?;
        let origin = EventOrigin::Remote(envelope.origin);
        let timestamp = envelope.sent_at;
        match payload {
            ProfileSyncPayload::Nickname {
                player_id,
                previous,
                nickname,
            } => self.events.publish(&NicknameChangedEvent {
                player_id,
                previous,
                nickname,
                origin,
                timestamp,
            }),
            ProfileSyncPayload::Mute { player_id, muted } => {
                self.events.publish(&MuteStateChangedEvent {
                    player_id,
                    muted,
                    origin,
                    timestamp,
                })
            }
            ProfileSyncPayload::Membership {
                player_id,
                channel,
                joined,
            } => self.events.publish(&ChannelMembershipChangedEvent {
                player_id,
                channel,
                joined,
                origin,
                timestamp,
            }),
        }
        Ok(())
    }

    // ========================================================================
    // Outbound: bus -> transport
    // ========================================================================
    //
    // Handlers run synchronously on the publishing thread; the actual sends
    // are spawned onto the runtime so chat submission never waits on the
    // wire. Only local-origin events go out. Remote-origin events came FROM
    // the wire, and relaying them again would circulate packets forever.

    fn subscribe_outbound(self: &Arc<Self>) {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .expect("subscription list lock poisoned");

        let me = self.clone();
        subscriptions.push(self.events.subscribe::<ChatMessageEvent, _>(move |event| {
            if event.origin.is_local() {
                me.relay_chat(event);
            }
            Ok(())
        }));

        let me = self.clone();
        subscriptions.push(self.events.subscribe::<MessageDeletedEvent, _>(move |event| {
            if event.origin.is_local() {
                me.relay(
                    PacketKind::DeleteRequest,
                    &DeleteRequestPayload {
                        message_id: event.message_id,
                    },
                );
            }
            Ok(())
        }));

        let me = self.clone();
        subscriptions.push(self.events.subscribe::<NicknameChangedEvent, _>(move |event| {
            if event.origin.is_local() {
                me.relay(
                    PacketKind::ProfileSync,
                    &ProfileSyncPayload::Nickname {
                        player_id: event.player_id,
                        previous: event.previous.clone(),
                        nickname: event.nickname.clone(),
                    },
                );
            }
            Ok(())
        }));

        let me = self.clone();
        subscriptions.push(self.events.subscribe::<MuteStateChangedEvent, _>(move |event| {
            if event.origin.is_local() {
                me.relay(
                    PacketKind::ProfileSync,
                    &ProfileSyncPayload::Mute {
                        player_id: event.player_id,
                        muted: event.muted,
                    },
                );
            }
            Ok(())
        }));

        let me = self.clone();
        subscriptions.push(self.events.subscribe::<ChannelMembershipChangedEvent, _>(
            move |event| {
                if event.origin.is_local() {
                    me.relay(
                        PacketKind::ProfileSync,
                        &ProfileSyncPayload::Membership {
                            player_id: event.player_id,
                            channel: event.channel.clone(),
                            joined: event.joined,
                        },
                    );
                }
                Ok(())
            },
        ));
    }

    fn encode<T: Serialize>(&self, kind: PacketKind, payload: &T) -> Option<Vec<u8>> {
        match PacketEnvelope::with_payload(kind, self.server_id, payload) {
            Ok(envelope) => Some(envelope.encode()),
            Err(e) => {
                error!("Failed to encode {:?} packet: {}", kind, e);
                None
            }
        }
    }

    /// Relays a local chat message, remembering its signature record once
    /// the transport accepts it.
    fn relay_chat(self: &Arc<Self>, event: &ChatMessageEvent) {
        let payload = ChatRelayPayload {
            message_id: event.message_id,
            sender: event.sender,
            sender_name: event.sender_name.clone(),
            channel: event.channel.clone(),
            content: event.content.clone(),
        };
        let Some(data) = self.encode(PacketKind::ChatRelay, &payload) else {
            return;
        };

        let record = SignatureRecord::new(event.sender, event.channel.clone());
        let message_id = event.message_id;
        let me = self.clone();
        self.runtime.spawn(async move {
            match me.transport.publish(PacketKind::ChatRelay.topic(), data).await {
                Ok(()) => {
                    me.signatures.remember(message_id, record);
                    debug!("📤 Relayed chat message {}", message_id);
                }
                Err(e) => warn!("Failed to relay chat message {}: {}", message_id, e),
            }
        });
    }

    /// Fire-and-forget broadcast of a non-chat packet.
    fn relay<T: Serialize>(self: &Arc<Self>, kind: PacketKind, payload: &T) {
        let Some(data) = self.encode(kind, payload) else {
            return;
        };
        let transport = self.transport.clone();
        self.runtime.spawn(async move {
            if let Err(e) = transport.publish(kind.topic(), data).await {
                warn!("Failed to broadcast {:?} packet: {}", kind, e);
            }
        });
    }
}

impl std::fmt::Debug for MessagingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagingManager")
            .field("server_id", &self.server_id)
            .finish()
    }
}

/// Lazily-connecting front for [`MessagingManager`].
///
/// Construction is cheap and infallible: the server ID is minted, nothing
/// touches the transport. The first [`manager`](Self::manager) call connects
/// through the factory; if that fails the error goes to the caller and the
/// next call tries again. Features that do not need the wire never pay for
/// it, and a dead broker at boot does not take the server down.
pub struct Messaging {
    server_id: ServerId,
    events: Arc<EventBus>,
    signatures: Arc<SignatureCache>,
    factory: Arc<dyn PacketServiceFactory>,
    manager: OnceCell<Arc<MessagingManager>>,
}

impl Messaging {
    /// Creates the front with a fresh per-process server ID.
    pub fn new(
        events: Arc<EventBus>,
        signatures: Arc<SignatureCache>,
        factory: Arc<dyn PacketServiceFactory>,
    ) -> Self {
        Self {
            server_id: ServerId::new(),
            events,
            signatures,
            factory,
            manager: OnceCell::new(),
        }
    }

    /// The identity packets from this process will carry.
    pub fn server_id(&self) -> ServerId {
        self.server_id
    }

    /// The signature cache shared with the manager.
    pub fn signatures(&self) -> &Arc<SignatureCache> {
        &self.signatures
    }

    /// Returns the connected manager, connecting on first use.
    pub async fn manager(&self) -> Result<Arc<MessagingManager>, TransportError> {
        let manager = self
            .manager
            .get_or_try_init(|| {
                MessagingManager::start(
                    self.server_id,
                    self.events.clone(),
                    self.signatures.clone(),
                    self.factory.as_ref(),
                )
            })
            .await?;
        Ok(manager.clone())
    }

    /// Returns `true` once a manager has been connected.
    pub fn is_connected(&self) -> bool {
        self.manager.initialized()
    }

    /// Shuts the manager down if one was ever connected.
    pub async fn shutdown(&self) -> Result<(), TransportError> {
        match self.manager.get() {
            Some(manager) => manager.shutdown().await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Messaging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Messaging")
            .field("server_id", &self.server_id)
            .field("connected", &self.is_connected())
            .finish()
    }
}
