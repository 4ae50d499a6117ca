//! Roster store for Parley.
//!
//! The roster is the ordered set of every peer the local session knows about,
//! together with each peer's message log and unseen flag. It is driven by two
//! kinds of input:
//! - server events (snapshot, connect, disconnect, inbound message)
//! - local user actions (outbound message, selection)
//!
//! Iteration order is "most recently active first": whenever a peer takes part
//! in a message, in either direction, it moves to the front. Connection events
//! never reorder.
//!
//! Peers live in an arena; the order is a separate list of arena slots, so
//! moving a peer to the front never touches the peer itself. Listeners receive
//! an owned [`RosterSnapshot`] and can keep it without aliasing the store.

use std::collections::HashMap;
use std::fmt;

use parley_chat_types::{PeerEntry, PeerId};
use thiserror::Error;

use crate::peer::{Direction, Message, Peer, PeerStatus};

/// Error type for roster operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    /// The operation referenced a peer that was never seen.
    #[error("unknown peer: {0}")]
    UnknownPeer(PeerId),

    /// Message content was empty or whitespace-only.
    #[error("message content must not be empty")]
    EmptyContent,
}

/// Callback invoked after every roster mutation.
pub type RosterListener = Box<dyn FnMut(&RosterSnapshot) + Send>;

/// Owned, ordered copy of the roster at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterSnapshot {
    peers: Vec<Peer>,
    selected: Option<PeerId>,
}

impl RosterSnapshot {
    /// Peers in roster order (most recently active first).
    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    /// Peer identifiers in roster order.
    pub fn order(&self) -> Vec<&PeerId> {
        self.peers.iter().map(Peer::id).collect()
    }

    /// Look up a peer by id.
    pub fn get(&self, id: &PeerId) -> Option<&Peer> {
        self.peers.iter().find(|p| p.id() == id)
    }

    /// Peers other than the local session, in roster order.
    pub fn others(&self) -> impl Iterator<Item = &Peer> {
        self.peers.iter().filter(|p| !p.is_self())
    }

    /// Currently selected peer, if any.
    pub fn selected(&self) -> Option<&Peer> {
        self.selected.as_ref().and_then(|id| self.get(id))
    }

    /// Number of peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// True when no peers are known.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Process-local roster state.
///
/// Not internally synchronized: the owner applies events one at a time.
#[derive(Default)]
pub struct RosterStore {
    /// Arena of peers; slots are never reused until the next snapshot.
    peers: Vec<Peer>,
    /// Peer id to arena slot.
    index: HashMap<PeerId, usize>,
    /// Arena slots in roster order.
    order: Vec<usize>,
    selected: Option<PeerId>,
    local_id: Option<PeerId>,
    listener: Option<RosterListener>,
}

impl RosterStore {
    /// Create an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    // ===========================================
    // Server-driven mutations
    // ===========================================

    /// Replace the roster with the server's authoritative list.
    ///
    /// Snapshot order becomes roster order. Peers that were already known keep
    /// their message log and unseen flag; peers missing from the snapshot are
    /// dropped. If the selected peer is gone the selection is cleared.
    pub fn apply_snapshot(&mut self, entries: Vec<PeerEntry>) {
        let mut previous: HashMap<PeerId, Peer> = self
            .peers
            .drain(..)
            .map(|peer| (peer.id.clone(), peer))
            .collect();
        self.index.clear();
        self.order.clear();

        for entry in entries {
            if self.index.contains_key(&entry.id) {
                tracing::warn!(peer = %entry.id, "duplicate peer in snapshot, keeping first");
                continue;
            }
            let status = if entry.connected {
                PeerStatus::Online
            } else {
                PeerStatus::Offline
            };
            let mut peer = match previous.remove(&entry.id) {
                Some(mut known) => {
                    known.status = status;
                    known
                }
                None => Peer::new(entry.id, entry.display_name, status),
            };
            peer.is_self = self.local_id.as_ref() == Some(&peer.id);
            self.push(peer);
        }

        if let Some(selected) = &self.selected {
            if !self.index.contains_key(selected) {
                self.selected = None;
            }
        }

        self.notify();
    }

    /// Mark a peer online, inserting it at the back if it is new.
    pub fn upsert_connected(&mut self, id: PeerId, display_name: String) {
        match self.index.get(&id) {
            Some(&slot) => self.peers[slot].status = PeerStatus::Online,
            None => {
                let mut peer = Peer::new(id, display_name, PeerStatus::Online);
                peer.is_self = self.local_id.as_ref() == Some(&peer.id);
                self.push(peer);
            }
        }
        self.notify();
    }

    /// Mark a peer offline. Unknown peers are ignored.
    ///
    /// Returns whether the peer was known.
    pub fn mark_disconnected(&mut self, id: &PeerId) -> bool {
        let Some(&slot) = self.index.get(id) else {
            tracing::debug!(peer = %id, "disconnect for unknown peer ignored");
            return false;
        };
        self.peers[slot].status = PeerStatus::Offline;
        self.notify();
        true
    }

    /// Append a message received from `id`.
    ///
    /// Sets the unseen flag unless `id` is the current selection, and moves
    /// the peer to the front. An unknown sender leaves the roster untouched.
    pub fn record_inbound(
        &mut self,
        id: &PeerId,
        content: String,
        timestamp: String,
    ) -> Result<(), RosterError> {
        if content.trim().is_empty() {
            tracing::warn!(peer = %id, "dropping empty inbound message");
            return Err(RosterError::EmptyContent);
        }
        let Some(&slot) = self.index.get(id) else {
            tracing::warn!(peer = %id, "message from unknown peer dropped");
            return Err(RosterError::UnknownPeer(id.clone()));
        };

        let is_selected = self.selected.as_ref() == Some(id);
        let peer = &mut self.peers[slot];
        peer.messages
            .push(Message::new(content, Direction::Inbound, timestamp));
        if !is_selected {
            peer.has_unseen = true;
        }

        self.move_to_front(slot);
        self.notify();
        Ok(())
    }

    // ===========================================
    // User-driven mutations
    // ===========================================

    /// Append a message sent by the local user to `id`.
    ///
    /// The peer must already be known. Clears its unseen flag and moves it to
    /// the front.
    pub fn record_outbound(
        &mut self,
        id: &PeerId,
        content: String,
        timestamp: String,
    ) -> Result<(), RosterError> {
        if content.trim().is_empty() {
            return Err(RosterError::EmptyContent);
        }
        let slot = *self
            .index
            .get(id)
            .ok_or_else(|| RosterError::UnknownPeer(id.clone()))?;

        let peer = &mut self.peers[slot];
        peer.messages
            .push(Message::new(content, Direction::Outbound, timestamp));
        peer.has_unseen = false;

        self.move_to_front(slot);
        self.notify();
        Ok(())
    }

    /// Make `id` the active conversation and clear its unseen flag.
    ///
    /// Selecting the same peer again is a no-op apart from the notification.
    pub fn select_peer(&mut self, id: &PeerId) -> Result<&Peer, RosterError> {
        let slot = *self
            .index
            .get(id)
            .ok_or_else(|| RosterError::UnknownPeer(id.clone()))?;

        self.selected = Some(id.clone());
        self.peers[slot].has_unseen = false;
        self.notify();
        Ok(&self.peers[slot])
    }

    // ===========================================
    // Session identity
    // ===========================================

    /// Record the local session's identifier and re-mark `is_self`.
    pub fn set_local_id(&mut self, id: PeerId) {
        for peer in &mut self.peers {
            peer.is_self = peer.id == id;
        }
        self.local_id = Some(id);
        self.notify();
    }

    /// Flag the local session's own entry as online once the transport is up.
    pub fn mark_self_online(&mut self) {
        let Some(slot) = self.local_id.as_ref().and_then(|id| self.index.get(id).copied()) else {
            return;
        };
        if self.peers[slot].status != PeerStatus::Online {
            self.peers[slot].status = PeerStatus::Online;
            self.notify();
        }
    }

    /// The local session's identifier, once known.
    pub fn local_id(&self) -> Option<&PeerId> {
        self.local_id.as_ref()
    }

    // ===========================================
    // Subscription
    // ===========================================

    /// Register the listener, replacing any previous one.
    ///
    /// Returns `true` if a listener was replaced.
    pub fn subscribe<F>(&mut self, listener: F) -> bool
    where
        F: FnMut(&RosterSnapshot) + Send + 'static,
    {
        self.listener.replace(Box::new(listener)).is_some()
    }

    /// Remove the listener. Returns `true` if one was registered.
    pub fn unsubscribe(&mut self) -> bool {
        self.listener.take().is_some()
    }

    // ===========================================
    // Read access
    // ===========================================

    /// Look up a peer by id.
    pub fn peer(&self, id: &PeerId) -> Option<&Peer> {
        self.index.get(id).map(|&slot| &self.peers[slot])
    }

    /// Whether `id` is in the roster.
    pub fn contains(&self, id: &PeerId) -> bool {
        self.index.contains_key(id)
    }

    /// Peers in roster order (most recently active first).
    pub fn peers(&self) -> impl Iterator<Item = &Peer> {
        self.order.iter().map(|&slot| &self.peers[slot])
    }

    /// Peers other than the local session, in roster order.
    pub fn others(&self) -> impl Iterator<Item = &Peer> {
        self.peers().filter(|p| !p.is_self())
    }

    /// Currently selected peer, if any.
    pub fn selected(&self) -> Option<&Peer> {
        self.selected.as_ref().and_then(|id| self.peer(id))
    }

    /// Identifier of the currently selected peer, if any.
    pub fn selected_id(&self) -> Option<&PeerId> {
        self.selected.as_ref()
    }

    /// Number of peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// True when no peers are known.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Owned copy of the roster in order.
    pub fn snapshot(&self) -> RosterSnapshot {
        RosterSnapshot {
            peers: self.peers().cloned().collect(),
            selected: self.selected.clone(),
        }
    }

    fn push(&mut self, peer: Peer) {
        let slot = self.peers.len();
        self.index.insert(peer.id.clone(), slot);
        self.peers.push(peer);
        self.order.push(slot);
    }

    fn move_to_front(&mut self, slot: usize) {
        if let Some(pos) = self.order.iter().position(|&s| s == slot) {
            self.order.remove(pos);
            self.order.insert(0, slot);
        }
    }

    fn notify(&mut self) {
        if self.listener.is_none() {
            return;
        }
        let snapshot = self.snapshot();
        if let Some(listener) = self.listener.as_mut() {
            listener(&snapshot);
        }
    }
}

impl fmt::Debug for RosterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RosterStore")
            .field("order", &self.snapshot().order())
            .field("selected", &self.selected)
            .field("local_id", &self.local_id)
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}
