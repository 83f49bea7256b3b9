//! The session/link protocol state machine.
//!
//! [`SessionState`] is synchronous and does no I/O: local operations
//! return the envelopes to publish, and [`SessionState::handle_envelope`]
//! turns one inbound envelope into an optional reply plus a list of
//! [`EngineEvent`]s. The runtime owns the publishing, persistence and
//! timers around it, which keeps every protocol transition directly
//! testable.
//!
//! Addressing is dual-mode: a handshake finds a stranger by room code,
//! everything afterwards is matched by peer id. A peer can therefore
//! rotate its code mid-session without breaking established links.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use tether_shared::constants::MAX_CHAT_TEXT_LEN;
use tether_shared::protocol::{thread_key, Envelope, Message, Payload};
use tether_shared::types::{LinkRecord, PeerId, PresenceSnapshot, RoomCode};
use tether_shared::PeerIdentity;

use crate::error::EngineError;
use crate::events::EngineEvent;

/// Pairing progress toward one candidate partner, keyed by room code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Unlinked,
    HandshakeSent,
    Linked,
}

/// Everything one inbound envelope produced.
#[derive(Debug, Default)]
pub struct Dispatch {
    /// Envelope to publish in response (the handshake reply).
    pub reply: Option<Envelope>,

    /// State changes to surface to the consumer and write through to the
    /// store, in order.
    pub events: Vec<EngineEvent>,

    /// Partners whose `last_seen_at` moved without a dedicated event
    /// (stale snapshot, typing, chat). The caller re-persists these rows.
    pub touched: Vec<PeerId>,
}

/// The authoritative local view: the owner's identity and snapshot plus
/// one [`LinkRecord`] per confirmed partner. Single writer, no locks;
/// cross-peer concurrency is absorbed entirely by the merge rule.
pub struct SessionState {
    identity: PeerIdentity,
    own: PresenceSnapshot,
    links: HashMap<PeerId, LinkRecord>,
    /// Outstanding outbound handshakes by target room code, kept verbatim
    /// for the single re-send.
    pending: HashMap<RoomCode, Envelope>,
    /// Partners currently composing. Ephemeral, never persisted.
    typing: HashSet<PeerId>,
}

impl SessionState {
    pub fn new(identity: PeerIdentity, own: PresenceSnapshot) -> Self {
        Self {
            identity,
            own,
            links: HashMap::new(),
            pending: HashMap::new(),
            typing: HashSet::new(),
        }
    }

    /// Re-seed partner links from the store at startup.
    pub fn restore_links(&mut self, links: Vec<LinkRecord>) {
        for record in links {
            self.links.insert(record.partner_id, record);
        }
    }

    pub fn local_id(&self) -> PeerId {
        self.identity.id()
    }

    pub fn room_code(&self) -> &RoomCode {
        self.identity.room_code()
    }

    pub fn own_snapshot(&self) -> &PresenceSnapshot {
        &self.own
    }

    pub fn link(&self, partner_id: PeerId) -> Option<&LinkRecord> {
        self.links.get(&partner_id)
    }

    pub fn links(&self) -> impl Iterator<Item = &LinkRecord> {
        self.links.values()
    }

    pub fn typing_partners(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.typing.iter().copied()
    }

    pub fn link_state(&self, code: &RoomCode) -> LinkState {
        if self.links.values().any(|r| &r.partner_room_code == code) {
            LinkState::Linked
        } else if self.pending.contains_key(code) {
            LinkState::HandshakeSent
        } else {
            LinkState::Unlinked
        }
    }

    // ------------------------------------------------------------------
    // Local operations
    // ------------------------------------------------------------------

    /// Start a handshake toward a room code.
    ///
    /// Fire-and-forget: the returned envelope is published now and once
    /// more after a short delay. There is no failure transition; an
    /// unanswered request simply stays pending until the user retries.
    pub fn request_link(&mut self, target: RoomCode) -> Envelope {
        let envelope = self.handshake(target.clone(), true);
        self.pending.insert(target.clone(), envelope.clone());
        info!(target = %target, "handshake sent");
        envelope
    }

    /// The envelope for the scheduled re-send, if the handshake is still
    /// outstanding.
    pub fn handshake_resend(&self, target: &RoomCode) -> Option<Envelope> {
        self.pending.get(target).cloned()
    }

    fn handshake(&self, target_room_code: RoomCode, is_initiator: bool) -> Envelope {
        Envelope {
            sender_id: self.local_id(),
            sender_room_code: self.room_code().clone(),
            payload: Payload::HandshakeRequest {
                target_room_code,
                snapshot: self.own.clone(),
                is_initiator,
            },
        }
    }

    /// Rotate the local room code. Links are untouched; only future
    /// discovery is affected.
    pub fn rotate_room_code(&mut self) -> RoomCode {
        let code = self.identity.rotate_room_code();
        info!(code = %code, "room code rotated");
        code
    }

    /// Apply a mutation to the owner's own snapshot and stamp it.
    ///
    /// `stamp` must come from the monotonic clock; it is what makes this
    /// update win over everything the owner published before. Returns the
    /// broadcast for every linked partner.
    pub fn apply_local_update(
        &mut self,
        stamp: DateTime<Utc>,
        mutate: impl FnOnce(&mut PresenceSnapshot),
    ) -> Envelope {
        mutate(&mut self.own);
        self.own.activity.updated_at = stamp;

        debug!(stamp = %stamp, "own snapshot updated");

        Envelope {
            sender_id: self.local_id(),
            sender_room_code: self.room_code().clone(),
            payload: Payload::PresenceUpdate {
                snapshot: self.own.clone(),
            },
        }
    }

    /// Build a chat message for a linked partner.
    ///
    /// Returns the thread key, the message to append locally (optimistic)
    /// and the envelope to publish.
    pub fn compose_message(
        &self,
        partner_id: PeerId,
        text: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<(String, Message, Envelope), EngineError> {
        if !self.links.contains_key(&partner_id) {
            return Err(EngineError::UnknownPartner(partner_id));
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::EmptyMessage);
        }
        if text.chars().count() > MAX_CHAT_TEXT_LEN {
            return Err(EngineError::MessageTooLong);
        }

        let message = Message {
            id: Uuid::new_v4(),
            sender_id: self.local_id(),
            text: text.to_string(),
            sent_at,
        };

        let envelope = Envelope {
            sender_id: self.local_id(),
            sender_room_code: self.room_code().clone(),
            payload: Payload::Chat {
                target_id: partner_id,
                message: message.clone(),
            },
        };

        Ok((thread_key(self.local_id(), partner_id), message, envelope))
    }

    /// Composing indicator toward one partner. Lightweight and lossy.
    pub fn typing_envelope(
        &self,
        partner_id: PeerId,
        is_typing: bool,
    ) -> Result<Envelope, EngineError> {
        if !self.links.contains_key(&partner_id) {
            return Err(EngineError::UnknownPartner(partner_id));
        }
        Ok(Envelope {
            sender_id: self.local_id(),
            sender_room_code: self.room_code().clone(),
            payload: Payload::Typing {
                target_id: partner_id,
                is_typing,
            },
        })
    }

    /// Tear down a link locally and build the notification for the
    /// partner. Returns `None` when no such link exists.
    pub fn unlink(&mut self, partner_id: PeerId) -> Option<(Envelope, EngineEvent)> {
        self.links.remove(&partner_id)?;
        self.typing.remove(&partner_id);
        info!(partner = %partner_id.short(), "link removed");

        let envelope = Envelope {
            sender_id: self.local_id(),
            sender_room_code: self.room_code().clone(),
            payload: Payload::Unlink {
                target_id: partner_id,
            },
        };
        let event = EngineEvent::PartnerUnlinked {
            partner_id,
            remote_initiated: false,
        };
        Some((envelope, event))
    }

    /// The thread key shared with a partner, for reads and clears.
    pub fn thread_key_with(&self, partner_id: PeerId) -> String {
        thread_key(self.local_id(), partner_id)
    }

    // ------------------------------------------------------------------
    // Inbound dispatch
    // ------------------------------------------------------------------

    /// Process one envelope off the wire.
    ///
    /// Irrelevant traffic (own broadcasts, wrong room code, unknown
    /// senders) is dropped here without touching any state. Everything a
    /// relevant envelope changes is reported in the returned [`Dispatch`].
    pub fn handle_envelope(&mut self, envelope: Envelope, now: DateTime<Utc>) -> Dispatch {
        let mut dispatch = Dispatch::default();
        let sender_id = envelope.sender_id;
        let sender_room_code = envelope.sender_room_code;

        // Self-filter: a peer sees its own broadcasts on a shared channel.
        if sender_id == self.local_id() {
            return dispatch;
        }

        let known = self.links.contains_key(&sender_id);
        let targets_my_code = matches!(
            &envelope.payload,
            Payload::HandshakeRequest { target_room_code, .. }
                if target_room_code == self.room_code()
        );

        if !known && !targets_my_code {
            debug!(
                sender = %sender_id.short(),
                kind = envelope.payload.kind(),
                "dropping irrelevant envelope"
            );
            return dispatch;
        }

        match envelope.payload {
            Payload::HandshakeRequest {
                target_room_code,
                snapshot,
                is_initiator,
            } => {
                if &target_room_code != self.room_code() {
                    // A known partner handshaking toward some other code.
                    debug!(target = %target_room_code, "handshake not for us");
                    return dispatch;
                }

                // Any request reaching the correct code is implicit
                // consent; there is no approval step.
                self.pending.remove(&sender_room_code);
                self.accept_link(sender_id, sender_room_code.clone(), snapshot, now, &mut dispatch);

                if is_initiator {
                    dispatch.reply = Some(self.handshake(sender_room_code, false));
                }
            }

            Payload::PresenceUpdate { snapshot } => {
                if let Some(record) = self.links.get_mut(&sender_id) {
                    record.last_seen_at = now;
                    match merge_snapshot(record, snapshot) {
                        Some(activity_changed) => dispatch.events.push(EngineEvent::PartnerUpdated {
                            record: record.clone(),
                            activity_changed,
                        }),
                        None => dispatch.touched.push(sender_id),
                    }
                }
            }

            Payload::Chat { target_id, message } => {
                if target_id != self.local_id() {
                    return dispatch;
                }
                if let Some(record) = self.links.get_mut(&sender_id) {
                    record.last_seen_at = now;
                    dispatch.touched.push(sender_id);
                    // Composing ends when the message lands.
                    if self.typing.remove(&sender_id) {
                        dispatch.events.push(EngineEvent::TypingChanged {
                            partner_id: sender_id,
                            is_typing: false,
                        });
                    }
                    dispatch.events.push(EngineEvent::MessageReceived {
                        thread_key: thread_key(self.local_id(), sender_id),
                        message,
                    });
                }
            }

            Payload::Typing { target_id, is_typing } => {
                if target_id != self.local_id() {
                    return dispatch;
                }
                if let Some(record) = self.links.get_mut(&sender_id) {
                    record.last_seen_at = now;
                    dispatch.touched.push(sender_id);
                    let changed = if is_typing {
                        self.typing.insert(sender_id)
                    } else {
                        self.typing.remove(&sender_id)
                    };
                    if changed {
                        dispatch.events.push(EngineEvent::TypingChanged {
                            partner_id: sender_id,
                            is_typing,
                        });
                    }
                }
            }

            Payload::Unlink { target_id } => {
                if target_id != self.local_id() {
                    return dispatch;
                }
                if self.links.remove(&sender_id).is_some() {
                    self.typing.remove(&sender_id);
                    info!(partner = %sender_id.short(), "link removed by partner");
                    dispatch.events.push(EngineEvent::PartnerUnlinked {
                        partner_id: sender_id,
                        remote_initiated: true,
                    });
                }
            }
        }

        dispatch
    }

    /// Create or refresh the link for a peer whose handshake reached us.
    fn accept_link(
        &mut self,
        partner_id: PeerId,
        partner_room_code: RoomCode,
        snapshot: PresenceSnapshot,
        now: DateTime<Utc>,
        dispatch: &mut Dispatch,
    ) {
        match self.links.get_mut(&partner_id) {
            Some(record) => {
                record.partner_room_code = partner_room_code;
                record.last_seen_at = now;
                match merge_snapshot(record, snapshot) {
                    Some(activity_changed) => dispatch.events.push(EngineEvent::PartnerUpdated {
                        record: record.clone(),
                        activity_changed,
                    }),
                    None => dispatch.touched.push(partner_id),
                }
            }
            None => {
                let record = LinkRecord {
                    partner_id,
                    partner_room_code,
                    partner_snapshot: snapshot,
                    last_seen_at: now,
                };
                info!(partner = %partner_id.short(), "link established");
                self.links.insert(partner_id, record.clone());
                dispatch.events.push(EngineEvent::LinkEstablished { record });
            }
        }
    }
}

/// Last-write-wins merge of an inbound snapshot into a link record.
///
/// Snapshots with `updated_at` at or below the stored stamp are already
/// seen or stale out-of-order deliveries and are dropped. Returns whether
/// the activity itself changed when the merge is accepted, `None` when
/// it was dropped.
fn merge_snapshot(record: &mut LinkRecord, incoming: PresenceSnapshot) -> Option<bool> {
    let stored = &record.partner_snapshot;
    if incoming.updated_at() <= stored.updated_at() {
        debug!(
            partner = %record.partner_id.short(),
            incoming = %incoming.updated_at(),
            stored = %stored.updated_at(),
            "dropping stale snapshot"
        );
        return None;
    }

    let activity_changed = incoming.activity.kind != stored.activity.kind
        || incoming.activity.custom_label != stored.activity.custom_label;
    record.partner_snapshot = incoming;
    Some(activity_changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tether_shared::types::{ActivityKind, Gender};

    fn session(name: &str) -> SessionState {
        SessionState::new(
            PeerIdentity::generate(),
            PresenceSnapshot::new(name, Gender::Female, Utc::now()),
        )
    }

    /// Deliver an envelope and apply any handshake reply back to the
    /// original sender, as the transport would.
    fn link_pair(x: &mut SessionState, y: &mut SessionState) {
        let now = Utc::now();
        let request = x.request_link(y.room_code().clone());
        let dispatch = y.handle_envelope(request, now);
        let reply = dispatch.reply.expect("responder should reply");
        let dispatch = x.handle_envelope(reply, now);
        assert!(dispatch.reply.is_none());
    }

    fn presence_from(peer: &mut SessionState, stamp: DateTime<Utc>) -> Envelope {
        peer.apply_local_update(stamp, |_| {})
    }

    #[test]
    fn test_handshake_symmetry() {
        let mut x = session("Xiomara");
        let mut y = session("Yusuf");

        link_pair(&mut x, &mut y);

        let x_view = x.link(y.local_id()).expect("x should hold y's link");
        let y_view = y.link(x.local_id()).expect("y should hold x's link");
        assert_eq!(x_view.partner_snapshot.name, "Yusuf");
        assert_eq!(y_view.partner_snapshot.name, "Xiomara");
        assert_eq!(x.link_state(y.room_code()), LinkState::Linked);
        assert_eq!(y.link_state(x.room_code()), LinkState::Linked);
    }

    #[test]
    fn test_handshake_stays_pending_without_listener() {
        // There is deliberately no timeout or failure transition; an
        // unanswered request stays pending until the user retries.
        let mut x = session("X");
        let target = RoomCode::generate();

        let first = x.request_link(target.clone());
        assert_eq!(x.link_state(&target), LinkState::HandshakeSent);

        let resend = x.handshake_resend(&target).expect("still pending");
        assert_eq!(first, resend);
        assert_eq!(x.link_state(&target), LinkState::HandshakeSent);
    }

    #[test]
    fn test_self_filter() {
        let mut x = session("X");
        let own = x.apply_local_update(Utc::now(), |s| s.name = "Renamed".to_string());

        let dispatch = x.handle_envelope(own, Utc::now());

        assert!(dispatch.reply.is_none());
        assert!(dispatch.events.is_empty());
        assert_eq!(x.links().count(), 0);
    }

    #[test]
    fn test_last_write_wins_under_reorder() {
        let mut x = session("X");
        let mut y = session("Y");
        link_pair(&mut x, &mut y);

        let base = Utc::now() + Duration::seconds(10);
        let older = y.apply_local_update(base, |s| s.activity.mood_label = "old".to_string());
        let newer = y.apply_local_update(base + Duration::seconds(1), |s| {
            s.activity.mood_label = "new".to_string()
        });

        // Delivered newest first; the late older snapshot must lose.
        let accepted = x.handle_envelope(newer, Utc::now());
        assert_eq!(accepted.events.len(), 1);
        let dropped = x.handle_envelope(older, Utc::now());
        assert!(dropped.events.is_empty());
        assert_eq!(dropped.touched.len(), 1);

        let record = x.link(y.local_id()).unwrap();
        assert_eq!(record.partner_snapshot.activity.mood_label, "new");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut x = session("X");
        let mut y = session("Y");
        link_pair(&mut x, &mut y);

        let update = presence_from(&mut y, Utc::now() + Duration::seconds(5));

        let first = x.handle_envelope(update.clone(), Utc::now());
        assert_eq!(first.events.len(), 1);
        let before = x.link(y.local_id()).unwrap().partner_snapshot.clone();

        // Duplicate delivery of the same stamp changes nothing.
        let second = x.handle_envelope(update, Utc::now());
        assert!(second.events.is_empty());
        assert_eq!(x.link(y.local_id()).unwrap().partner_snapshot, before);
    }

    #[test]
    fn test_full_snapshot_carries_prior_fields() {
        let mut x = session("X");
        let mut y = session("Y");
        link_pair(&mut x, &mut y);

        let base = Utc::now() + Duration::seconds(10);
        let first = y.apply_local_update(base, |s| {
            s.activity.kind = ActivityKind::Coding;
            s.activity.custom_label = None;
        });
        x.handle_envelope(first, Utc::now());

        let second = y.apply_local_update(base + Duration::seconds(1), |s| {
            s.activity.mood_label = "\u{1F624} Focused".to_string()
        });
        x.handle_envelope(second, Utc::now());

        // Each update is a whole snapshot, so both changes survive.
        let stored = &x.link(y.local_id()).unwrap().partner_snapshot;
        assert_eq!(stored.activity.kind, ActivityKind::Coding);
        assert_eq!(stored.activity.mood_label, "\u{1F624} Focused");
    }

    #[test]
    fn test_unlink_is_one_sided_safe() {
        let mut x = session("X");
        let mut y = session("Y");
        link_pair(&mut x, &mut y);

        let (envelope, _) = x.unlink(y.local_id()).expect("link existed");
        assert!(x.link(y.local_id()).is_none());

        let dispatch = y.handle_envelope(envelope, Utc::now());
        assert!(matches!(
            dispatch.events.as_slice(),
            [EngineEvent::PartnerUnlinked { remote_initiated: true, .. }]
        ));
        assert!(y.link(x.local_id()).is_none());
    }

    #[test]
    fn test_lost_unlink_does_not_resurrect() {
        let mut x = session("X");
        let mut y = session("Y");
        link_pair(&mut x, &mut y);

        // X unlinks but the envelope is lost; Y keeps its stale record.
        x.unlink(y.local_id());

        // Y's later traffic must not recreate X's side of the link.
        let update = presence_from(&mut y, Utc::now() + Duration::seconds(5));
        let dispatch = x.handle_envelope(update, Utc::now());
        assert!(dispatch.events.is_empty());
        assert!(x.link(y.local_id()).is_none());
    }

    #[test]
    fn test_code_rotation_keeps_existing_links() {
        let mut x = session("X");
        let mut y = session("Y");
        link_pair(&mut x, &mut y);

        x.rotate_room_code();

        // Matched by sender id, not by code.
        let update = presence_from(&mut y, Utc::now() + Duration::seconds(5));
        let dispatch = x.handle_envelope(update, Utc::now());
        assert_eq!(dispatch.events.len(), 1);

        // But a handshake aimed at the old code no longer lands.
        let mut z = session("Z");
        let old_code = y.room_code().clone();
        y.rotate_room_code();
        let request = z.request_link(old_code);
        let dispatch = y.handle_envelope(request, Utc::now());
        assert!(dispatch.reply.is_none());
        assert!(y.link(z.local_id()).is_none());
    }

    #[test]
    fn test_simultaneous_initiators_converge() {
        let mut x = session("X");
        let mut y = session("Y");

        // Both sides initiate before either request arrives.
        let from_x = x.request_link(y.room_code().clone());
        let from_y = y.request_link(x.room_code().clone());

        let now = Utc::now();
        let reply_from_y = y.handle_envelope(from_x, now).reply.unwrap();
        let reply_from_x = x.handle_envelope(from_y, now).reply.unwrap();
        x.handle_envelope(reply_from_y, now);
        y.handle_envelope(reply_from_x, now);

        assert_eq!(x.links().count(), 1);
        assert_eq!(y.links().count(), 1);
        assert_eq!(x.link_state(y.room_code()), LinkState::Linked);
        assert_eq!(y.link_state(x.room_code()), LinkState::Linked);
    }

    #[test]
    fn test_chat_from_stranger_is_dropped() {
        let mut x = session("X");
        let stranger = session("S");

        let mut linked = session("L");
        link_pair(&mut linked, &mut x);

        // A stranger knows X's id somehow and injects a message.
        let envelope = Envelope {
            sender_id: stranger.local_id(),
            sender_room_code: stranger.room_code().clone(),
            payload: Payload::Chat {
                target_id: x.local_id(),
                message: Message {
                    id: Uuid::new_v4(),
                    sender_id: stranger.local_id(),
                    text: "hello".to_string(),
                    sent_at: Utc::now(),
                },
            },
        };

        let dispatch = x.handle_envelope(envelope, Utc::now());
        assert!(dispatch.events.is_empty());
    }

    #[test]
    fn test_chat_addressed_elsewhere_is_ignored() {
        let mut x = session("X");
        let mut y = session("Y");
        let mut z = session("Z");
        link_pair(&mut x, &mut y);
        link_pair(&mut z, &mut y);

        // Y writes to Z; X also sees the broadcast but must not file it.
        let (_, _, envelope) = y
            .compose_message(z.local_id(), "for z only", Utc::now())
            .unwrap();
        let dispatch = x.handle_envelope(envelope, Utc::now());

        assert!(!dispatch
            .events
            .iter()
            .any(|e| matches!(e, EngineEvent::MessageReceived { .. })));
    }

    #[test]
    fn test_typing_last_received_wins() {
        let mut x = session("X");
        let mut y = session("Y");
        link_pair(&mut x, &mut y);

        let typing = y.typing_envelope(x.local_id(), true).unwrap();
        let dispatch = x.handle_envelope(typing.clone(), Utc::now());
        assert_eq!(dispatch.events.len(), 1);
        assert_eq!(x.typing_partners().count(), 1);

        // Duplicate true is absorbed silently.
        let dispatch = x.handle_envelope(typing, Utc::now());
        assert!(dispatch.events.is_empty());

        let stopped = y.typing_envelope(x.local_id(), false).unwrap();
        x.handle_envelope(stopped, Utc::now());
        assert_eq!(x.typing_partners().count(), 0);
    }

    #[test]
    fn test_inbound_chat_clears_typing() {
        let mut x = session("X");
        let mut y = session("Y");
        link_pair(&mut x, &mut y);

        let typing = y.typing_envelope(x.local_id(), true).unwrap();
        x.handle_envelope(typing, Utc::now());

        let (_, _, chat) = y
            .compose_message(x.local_id(), "sent it", Utc::now())
            .unwrap();
        x.handle_envelope(chat, Utc::now());

        assert_eq!(x.typing_partners().count(), 0);
    }

    #[test]
    fn test_compose_message_validation() {
        let mut x = session("X");
        let mut y = session("Y");
        link_pair(&mut x, &mut y);

        assert!(matches!(
            x.compose_message(PeerId::generate(), "hi", Utc::now()),
            Err(EngineError::UnknownPartner(_))
        ));
        assert!(matches!(
            x.compose_message(y.local_id(), "   ", Utc::now()),
            Err(EngineError::EmptyMessage)
        ));

        let long = "a".repeat(MAX_CHAT_TEXT_LEN + 1);
        assert!(matches!(
            x.compose_message(y.local_id(), &long, Utc::now()),
            Err(EngineError::MessageTooLong)
        ));
    }

    #[test]
    fn test_handshake_embedded_snapshot_is_merged() {
        let mut x = session("X");
        let mut y = session("Y");
        link_pair(&mut x, &mut y);

        // Y re-handshakes with a newer snapshot; the merge rule applies
        // to handshake-embedded snapshots exactly as to updates.
        y.apply_local_update(Utc::now() + Duration::seconds(5), |s| {
            s.activity.kind = ActivityKind::Gaming;
        });
        let request = y.request_link(x.room_code().clone());
        let dispatch = x.handle_envelope(request, Utc::now());

        assert!(matches!(
            dispatch.events.as_slice(),
            [EngineEvent::PartnerUpdated { activity_changed: true, .. }]
        ));
        assert_eq!(
            x.link(y.local_id()).unwrap().partner_snapshot.activity.kind,
            ActivityKind::Gaming
        );
    }
}
