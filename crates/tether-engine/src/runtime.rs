//! Engine runtime: a single tokio task owning the session state, wired to
//! the transport, the store and the flavor providers.
//!
//! Mirrors the command/notification channel pattern of the transport
//! layer: callers send [`EngineCommand`]s in and consume [`EngineEvent`]s
//! out. Every state transition runs inside the one task, so no locks are
//! needed anywhere in the engine.

use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use tether_net::{EnvelopeStream, Transport};
use tether_shared::protocol::{Envelope, Message};
use tether_shared::types::{
    ActivityKind, Gender, LinkRecord, PeerId, PresenceSnapshot, RoomCode, WeatherInfo,
};
use tether_shared::PeerIdentity;
use tether_store::Database;

use crate::clock::MonotonicClock;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::flavor::Providers;
use crate::session::{Dispatch, SessionState};

/// Commands the presentation layer sends into the engine task.
#[derive(Debug)]
pub enum EngineCommand {
    /// Start a handshake toward a room code.
    RequestLink { target: RoomCode },

    /// Internal: the single scheduled handshake re-send.
    ResendHandshake { target: RoomCode },

    /// Set the owner's activity. Weather and caption enrichment happen
    /// here, bounded by the configured timeout.
    SetActivity {
        kind: ActivityKind,
        custom_label: Option<String>,
        mood_label: Option<String>,
    },

    /// Rename the owner.
    SetName { name: String },

    SendMessage { partner_id: PeerId, text: String },

    SetTyping { partner_id: PeerId, is_typing: bool },

    /// Destructive: drop the whole thread with this partner. The caller
    /// is responsible for confirming with the user first.
    ClearThread { partner_id: PeerId },

    Unlink { partner_id: PeerId },

    RotateRoomCode,

    /// Whether the conversation view is focused; gates chat notifications.
    SetFocused { focused: bool },

    GetOverview { reply: oneshot::Sender<Overview> },

    GetThread {
        partner_id: PeerId,
        reply: oneshot::Sender<Vec<Message>>,
    },

    Shutdown,
}

/// Snapshot of engine state for the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub peer_id: PeerId,
    pub room_code: RoomCode,
    pub own: PresenceSnapshot,
    pub links: Vec<LinkRecord>,
    pub typing: Vec<PeerId>,
}

/// Handle returned by [`spawn_engine`].
pub struct EngineHandle {
    pub commands: mpsc::Sender<EngineCommand>,
    pub events: mpsc::Receiver<EngineEvent>,
    pub peer_id: PeerId,
    pub room_code: RoomCode,
    pub task: tokio::task::JoinHandle<()>,
}

/// Spawn the engine in a background tokio task.
///
/// Loads (or creates) the identity and last-known state from the store,
/// subscribes to the transport, and returns the command/event channel
/// pair. The subscription is attached before this function returns, so
/// traffic published afterwards is never missed.
pub fn spawn_engine(
    db: Database,
    transport: Arc<dyn Transport>,
    providers: Providers,
    config: EngineConfig,
) -> Result<EngineHandle, EngineError> {
    let identity = db.load_or_create_identity()?;
    let own = match db.load_own_snapshot()? {
        Some(snapshot) => snapshot,
        None => {
            let snapshot = PresenceSnapshot::new("Me", Gender::Female, Utc::now());
            db.save_own_snapshot(&snapshot)?;
            snapshot
        }
    };
    let links = db.list_links()?;

    let peer_id = identity.id();
    let room_code = identity.room_code().clone();
    let clock = MonotonicClock::resume_from(own.updated_at());

    let mut session = SessionState::new(identity, own);
    session.restore_links(links);

    let inbound = transport.subscribe();

    let (cmd_tx, cmd_rx) = mpsc::channel(config.channel_capacity);
    let (event_tx, event_rx) = mpsc::channel(config.channel_capacity);

    let runtime = Runtime {
        session,
        db,
        transport,
        providers,
        config,
        clock,
        cmd_tx: cmd_tx.clone(),
        event_tx,
        focused: true,
    };

    info!(peer = %peer_id.short(), code = %room_code, "engine started");

    let task = tokio::spawn(runtime.run(cmd_rx, inbound));

    Ok(EngineHandle {
        commands: cmd_tx,
        events: event_rx,
        peer_id,
        room_code,
        task,
    })
}

struct Runtime {
    session: SessionState,
    db: Database,
    transport: Arc<dyn Transport>,
    providers: Providers,
    config: EngineConfig,
    clock: MonotonicClock,
    /// Clone of our own command sender, used by the re-send timer.
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_tx: mpsc::Sender<EngineEvent>,
    focused: bool,
}

impl Runtime {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<EngineCommand>, mut inbound: EnvelopeStream) {
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(EngineCommand::Shutdown) | None => {
                            info!("engine shutting down");
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd).await,
                    }
                }
                maybe_envelope = inbound.next() => {
                    match maybe_envelope {
                        Some(envelope) => self.handle_inbound(envelope).await,
                        None => {
                            warn!("transport stream ended");
                            break;
                        }
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    async fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::RequestLink { target } => {
                let envelope = self.session.request_link(target.clone());
                self.publish(envelope);

                // One fixed-delay re-send covers the race where the remote
                // subscriber attaches after the first publish.
                let tx = self.cmd_tx.clone();
                let delay = self.config.handshake_resend_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(EngineCommand::ResendHandshake { target }).await;
                });
            }

            EngineCommand::ResendHandshake { target } => {
                if let Some(envelope) = self.session.handshake_resend(&target) {
                    debug!(target = %target, "re-sending handshake");
                    self.publish(envelope);
                }
            }

            EngineCommand::SetActivity {
                kind,
                custom_label,
                mood_label,
            } => {
                let weather = self.fetch_weather().await;
                let status_label = if custom_label.is_some() {
                    "Custom Status"
                } else {
                    "Automatic Sync"
                };
                let mood = mood_label.unwrap_or_else(|| {
                    self.session.own_snapshot().activity.mood_label.clone()
                });
                let caption = self.providers.captions.caption(kind, status_label, &mood);

                let stamp = self.clock.next();
                let envelope = self.session.apply_local_update(stamp, |own| {
                    own.activity.kind = kind;
                    own.activity.custom_label = custom_label;
                    own.activity.status_label = status_label.to_string();
                    own.activity.mood_label = mood;
                    own.activity.caption = caption;
                    own.activity.weather = weather;
                });
                self.persist_own();
                self.publish(envelope);
            }

            EngineCommand::SetName { name } => {
                let stamp = self.clock.next();
                let envelope = self.session.apply_local_update(stamp, |own| own.name = name);
                self.persist_own();
                self.publish(envelope);
            }

            EngineCommand::SendMessage { partner_id, text } => {
                let sent_at = self.clock.next();
                match self.session.compose_message(partner_id, &text, sent_at) {
                    Ok((thread_key, message, envelope)) => {
                        if let Err(e) = self.db.insert_message(&thread_key, &message) {
                            error!(error = %e, "failed to store outbound message");
                        }
                        self.publish(envelope);
                    }
                    Err(e) => {
                        warn!(partner = %partner_id.short(), error = %e, "message not sent");
                    }
                }
            }

            EngineCommand::SetTyping {
                partner_id,
                is_typing,
            } => match self.session.typing_envelope(partner_id, is_typing) {
                Ok(envelope) => self.publish(envelope),
                Err(e) => debug!(error = %e, "typing indicator dropped"),
            },

            EngineCommand::ClearThread { partner_id } => {
                let thread_key = self.session.thread_key_with(partner_id);
                match self.db.clear_thread(&thread_key) {
                    Ok(removed) => info!(thread = %thread_key, removed, "thread cleared"),
                    Err(e) => error!(error = %e, "failed to clear thread"),
                }
            }

            EngineCommand::Unlink { partner_id } => {
                if let Some((envelope, event)) = self.session.unlink(partner_id) {
                    self.publish(envelope);
                    if self.apply_event(&event) {
                        self.forward(event).await;
                    }
                }
            }

            EngineCommand::RotateRoomCode => {
                let room_code = self.session.rotate_room_code();
                let identity =
                    PeerIdentity::from_parts(self.session.local_id(), room_code.clone());
                if let Err(e) = self.db.save_identity(&identity) {
                    error!(error = %e, "failed to persist rotated room code");
                }
                self.forward(EngineEvent::RoomCodeRotated { room_code }).await;
            }

            EngineCommand::SetFocused { focused } => {
                self.focused = focused;
            }

            EngineCommand::GetOverview { reply } => {
                let overview = Overview {
                    peer_id: self.session.local_id(),
                    room_code: self.session.room_code().clone(),
                    own: self.session.own_snapshot().clone(),
                    links: self.session.links().cloned().collect(),
                    typing: self.session.typing_partners().collect(),
                };
                let _ = reply.send(overview);
            }

            EngineCommand::GetThread { partner_id, reply } => {
                let thread_key = self.session.thread_key_with(partner_id);
                let messages = self.db.messages_for_thread(&thread_key).unwrap_or_else(|e| {
                    error!(error = %e, "failed to load thread");
                    Vec::new()
                });
                let _ = reply.send(messages);
            }

            // Handled in the select loop.
            EngineCommand::Shutdown => {}
        }
    }

    // ------------------------------------------------------------------
    // Inbound traffic
    // ------------------------------------------------------------------

    async fn handle_inbound(&mut self, envelope: Envelope) {
        debug!(
            sender = %envelope.sender_id.short(),
            kind = envelope.payload.kind(),
            "inbound envelope"
        );

        let Dispatch {
            reply,
            events,
            touched,
        } = self.session.handle_envelope(envelope, Utc::now());

        if let Some(reply) = reply {
            self.publish(reply);
        }

        // Liveness bumps without a dedicated event still reach the store.
        for partner_id in touched {
            if let Some(record) = self.session.link(partner_id) {
                if let Err(e) = self.db.upsert_link(record) {
                    error!(error = %e, "failed to persist link");
                }
            }
        }

        for event in events {
            if self.apply_event(&event) {
                self.forward(event).await;
            }
        }
    }

    /// Write an event through to the store and fire notifications.
    ///
    /// Returns `false` when the event must not be forwarded (a message
    /// that turned out to be a duplicate, or a failed write).
    fn apply_event(&mut self, event: &EngineEvent) -> bool {
        match event {
            EngineEvent::LinkEstablished { record } => {
                if let Err(e) = self.db.upsert_link(record) {
                    error!(error = %e, "failed to persist new link");
                }
                true
            }

            EngineEvent::PartnerUpdated {
                record,
                activity_changed,
            } => {
                if let Err(e) = self.db.upsert_link(record) {
                    error!(error = %e, "failed to persist link update");
                }
                if *activity_changed {
                    self.providers.notifier.notify(
                        &record.partner_snapshot.name,
                        &format!("Now {}", record.partner_snapshot.activity.display_label()),
                        "presence",
                    );
                }
                true
            }

            EngineEvent::PartnerUnlinked { partner_id, .. } => {
                if let Err(e) = self.db.delete_link(*partner_id) {
                    error!(error = %e, "failed to delete link");
                }
                true
            }

            EngineEvent::MessageReceived {
                thread_key,
                message,
            } => match self.db.insert_message(thread_key, message) {
                Ok(true) => {
                    if !self.focused {
                        let sender_name = self
                            .session
                            .link(message.sender_id)
                            .map(|r| r.partner_snapshot.name.clone())
                            .unwrap_or_else(|| "Partner".to_string());
                        self.providers
                            .notifier
                            .notify(&sender_name, &message.text, thread_key);
                    }
                    true
                }
                Ok(false) => {
                    debug!(id = %message.id, "duplicate message ignored");
                    false
                }
                Err(e) => {
                    error!(error = %e, "failed to store message");
                    false
                }
            },

            EngineEvent::TypingChanged { .. } | EngineEvent::RoomCodeRotated { .. } => true,
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn fetch_weather(&mut self) -> Option<WeatherInfo> {
        let coords = match timeout(self.config.weather_timeout, self.providers.geolocator.locate())
            .await
        {
            Ok(coords) => coords,
            Err(_) => {
                debug!("geolocation timed out");
                None
            }
        };

        match timeout(self.config.weather_timeout, self.providers.weather.fetch(coords)).await {
            Ok(weather) => weather,
            Err(_) => {
                debug!("weather lookup timed out, publishing without it");
                None
            }
        }
    }

    fn persist_own(&self) {
        if let Err(e) = self.db.save_own_snapshot(self.session.own_snapshot()) {
            error!(error = %e, "failed to persist own snapshot");
        }
    }

    fn publish(&self, envelope: Envelope) {
        if let Err(e) = self.transport.publish(envelope) {
            error!(error = %e, "publish failed");
        }
    }

    async fn forward(&mut self, event: EngineEvent) {
        debug!(kind = event.kind(), "engine event");
        if self.event_tx.send(event).await.is_err() {
            debug!("event receiver dropped");
        }
    }
}
