//! Durable key-value backing for peers and rooms.
//!
//! The directory owns two record families: peers keyed by transport
//! identity and rooms keyed by server-generated id, with a secondary
//! code-to-id index so code lookup is O(1) instead of a scan over every
//! live room. Code uniqueness is enforced by a conditional insert: the
//! check and the write happen under one lock, so two concurrent creations
//! can never both win the same code.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use linkdrop_core::{Peer, PeerId, Room, RoomCode, RoomId};
use thiserror::Error;

/// Errors from the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Conditional room insert lost to a live room holding the same code.
    #[error("room code {0} already in use")]
    CodeTaken(RoomCode),

    /// The backing medium failed.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Key-value persistence for directory records.
///
/// Implementations must make `insert_room` atomic with respect to code
/// uniqueness: between the code check and the write, no other insert may
/// interleave.
pub trait Store: Send + Sync + 'static {
    /// Create or replace a peer record.
    fn put_peer(&self, peer: &Peer) -> Result<(), StoreError>;

    /// Look up a peer by transport identity.
    fn peer(&self, id: &PeerId) -> Result<Option<Peer>, StoreError>;

    /// Insert a room, failing with [`StoreError::CodeTaken`] if a live room
    /// already holds its code. Updates the code index on success.
    fn insert_room(&self, room: &Room) -> Result<(), StoreError>;

    /// Look up a room by id.
    fn room(&self, id: &RoomId) -> Result<Option<Room>, StoreError>;

    /// Look up a room by code via the secondary index.
    fn room_by_code(&self, code: &RoomCode) -> Result<Option<Room>, StoreError>;

    /// Remove a room and free its code. Returns the removed record.
    fn remove_room(&self, id: &RoomId) -> Result<Option<Room>, StoreError>;
}

#[derive(Default)]
struct Inner {
    peers: HashMap<PeerId, Peer>,
    rooms: HashMap<RoomId, Room>,
    /// Secondary index: live code -> room id.
    codes: HashMap<RoomCode, RoomId>,
}

/// In-memory [`Store`] behind a single mutex.
///
/// The one lock is what serializes the generate/check/persist sequence for
/// room codes.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Backend("store mutex poisoned".to_owned()))
    }
}

impl Store for MemoryStore {
    fn put_peer(&self, peer: &Peer) -> Result<(), StoreError> {
        self.locked()?.peers.insert(peer.id.clone(), peer.clone());
        Ok(())
    }

    fn peer(&self, id: &PeerId) -> Result<Option<Peer>, StoreError> {
        Ok(self.locked()?.peers.get(id).cloned())
    }

    fn insert_room(&self, room: &Room) -> Result<(), StoreError> {
        let mut inner = self.locked()?;
        if inner.codes.contains_key(&room.code) {
            return Err(StoreError::CodeTaken(room.code.clone()));
        }
        inner.codes.insert(room.code.clone(), room.id);
        inner.rooms.insert(room.id, room.clone());
        Ok(())
    }

    fn room(&self, id: &RoomId) -> Result<Option<Room>, StoreError> {
        Ok(self.locked()?.rooms.get(id).cloned())
    }

    fn room_by_code(&self, code: &RoomCode) -> Result<Option<Room>, StoreError> {
        let inner = self.locked()?;
        Ok(inner.codes.get(code).and_then(|id| inner.rooms.get(id)).cloned())
    }

    fn remove_room(&self, id: &RoomId) -> Result<Option<Room>, StoreError> {
        let mut inner = self.locked()?;
        let removed = inner.rooms.remove(id);
        if let Some(room) = &removed {
            inner.codes.remove(&room.code);
        }
        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn room(code: &str) -> Room {
        Room {
            id: Uuid::new_v4(),
            user_id: PeerId::from("owner"),
            code: RoomCode::parse(code).unwrap(),
            created: Utc::now(),
            updated: Utc::now(),
        }
    }

    #[test]
    fn insert_room_rejects_duplicate_code() {
        let store = MemoryStore::new();
        let first = room("AB12CD");
        let second = room("AB12CD");

        store.insert_room(&first).unwrap();
        let result = store.insert_room(&second);

        assert_eq!(result, Err(StoreError::CodeTaken(first.code.clone())));
        // The loser left no trace in either index.
        assert_eq!(store.room(&second.id).unwrap(), None);
        assert_eq!(store.room_by_code(&first.code).unwrap(), Some(first));
    }

    #[test]
    fn remove_room_frees_the_code() {
        let store = MemoryStore::new();
        let first = room("AB12CD");
        store.insert_room(&first).unwrap();
        store.remove_room(&first.id).unwrap();

        assert_eq!(store.room_by_code(&first.code).unwrap(), None);

        // The code is reusable once the room is gone.
        let second = room("AB12CD");
        store.insert_room(&second).unwrap();
    }

    #[test]
    fn put_peer_replaces_existing_record() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let peer = Peer { id: PeerId::from("p1"), room_id: None, created: now, updated: now };
        store.put_peer(&peer).unwrap();

        let replacement = Peer { room_id: Some(Uuid::new_v4()), ..peer.clone() };
        store.put_peer(&replacement).unwrap();

        assert_eq!(store.peer(&peer.id).unwrap(), Some(replacement));
    }

    #[test]
    fn lookups_miss_cleanly() {
        let store = MemoryStore::new();
        assert_eq!(store.peer(&PeerId::from("ghost")).unwrap(), None);
        assert_eq!(store.room(&Uuid::new_v4()).unwrap(), None);
        assert_eq!(store.room_by_code(&RoomCode::parse("ZZZZZZ").unwrap()).unwrap(), None);
    }
}
