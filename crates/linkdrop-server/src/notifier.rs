//! Per-room membership push channels.
//!
//! A room's owner can hold open a server-push stream and be told, without
//! polling, when a peer's room assignment changes. Each room has at most
//! one live subscription: a single producer (the directory) and zero or one
//! consumer (the owner's open stream). Notification is best-effort - a
//! consumer that disappeared or fell behind never blocks or fails the
//! assignment that triggered the signal.
//!
//! Dropping a subscription does NOT delete the room; room deletion is an
//! explicit directory operation.

use std::{collections::HashMap, sync::Mutex};

use linkdrop_core::{PeerId, RoomId};
use tokio::sync::mpsc;

/// Buffered joins per subscription before notifications are dropped.
const CHANNEL_CAPACITY: usize = 16;

/// Registry of per-room push channels.
#[derive(Default)]
pub struct MembershipNotifier {
    channels: Mutex<HashMap<RoomId, mpsc::Sender<PeerId>>>,
}

impl MembershipNotifier {
    /// Create a notifier with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a push channel for `room_id`, replacing any previous one.
    ///
    /// The receiver yields the id of each peer assigned to the room while
    /// the subscription is live.
    pub fn subscribe(&self, room_id: RoomId) -> mpsc::Receiver<PeerId> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        if let Ok(mut channels) = self.channels.lock() {
            channels.insert(room_id, tx);
        }
        rx
    }

    /// Signal that `peer_id` was assigned to `room_id`.
    ///
    /// No-op when nobody subscribed. A disconnected consumer is reaped
    /// here; a full channel drops the signal rather than block.
    pub fn notify(&self, room_id: &RoomId, peer_id: &PeerId) {
        let Ok(mut channels) = self.channels.lock() else {
            tracing::error!("notifier mutex poisoned, dropping notification");
            return;
        };

        let Some(tx) = channels.get(room_id) else { return };

        match tx.try_send(peer_id.clone()) {
            Ok(()) => {},
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(%room_id, "subscriber gone, reaping membership channel");
                channels.remove(room_id);
            },
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(%room_id, "membership channel full, dropping notification");
            },
        }
    }

    /// Drop the subscription for `room_id`, if any.
    pub fn unsubscribe(&self, room_id: &RoomId) {
        if let Ok(mut channels) = self.channels.lock() {
            channels.remove(room_id);
        }
    }
}
