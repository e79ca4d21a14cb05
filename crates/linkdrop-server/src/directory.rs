//! Room directory: identity registration, room minting, code resolution.
//!
//! The directory is request-scoped: every method takes `&self` and is safe
//! under concurrent invocation by many peers. The only shared mutable
//! resource is the backing store, whose conditional room insert serializes
//! code-uniqueness checks against concurrent creation.

use chrono::Utc;
use linkdrop_core::{Environment, Peer, PeerId, Room, RoomCode, RoomId};
use tokio::sync::mpsc;

use crate::{
    error::DirectoryError,
    notifier::MembershipNotifier,
    store::{Store, StoreError},
};

/// Rendezvous service mapping ephemeral short codes to waiting peers.
pub struct RoomDirectory<E, S>
where
    E: Environment,
    S: Store,
{
    env: E,
    store: S,
    notifier: MembershipNotifier,
}

impl<E, S> RoomDirectory<E, S>
where
    E: Environment,
    S: Store,
{
    /// Create a directory over the given store.
    pub fn new(env: E, store: S) -> Self {
        Self { env, store, notifier: MembershipNotifier::new() }
    }

    /// Register a peer identity, or re-register an existing one.
    ///
    /// Re-registration is create-or-replace, not an error: the record is
    /// reset with no room assignment. Peers are never deleted.
    pub fn register(&self, peer_id: PeerId) -> Result<Peer, DirectoryError> {
        let now = Utc::now();
        let peer = Peer { id: peer_id, room_id: None, created: now, updated: now };
        self.store.put_peer(&peer)?;
        tracing::info!(peer = %peer.id, "peer registered");
        Ok(peer)
    }

    /// Assign a peer to a room, overwriting any previous assignment.
    ///
    /// Signals the new room's membership channel with the peer id.
    /// Idempotent: repeating the same assignment yields the same terminal
    /// state with a refreshed `updated` timestamp.
    ///
    /// # Errors
    ///
    /// `PeerNotFound` for an unknown peer; `RoomNotFound` when the target
    /// room is not live (a set `room_id` must always reference a live
    /// room).
    pub fn assign_room(&self, peer_id: &PeerId, room_id: RoomId) -> Result<Peer, DirectoryError> {
        let mut peer = self
            .store
            .peer(peer_id)?
            .ok_or_else(|| DirectoryError::PeerNotFound(peer_id.clone()))?;

        if self.store.room(&room_id)?.is_none() {
            return Err(DirectoryError::RoomNotFound);
        }

        peer.room_id = Some(room_id);
        peer.updated = Utc::now();
        self.store.put_peer(&peer)?;

        self.notifier.notify(&room_id, &peer.id);
        tracing::info!(peer = %peer.id, %room_id, "peer assigned to room");
        Ok(peer)
    }

    /// Mint a room for `owner` and return it, short code included.
    ///
    /// Code generation retries until a free code wins the conditional
    /// insert; a collision is resolved here and is never user-visible.
    ///
    /// # Errors
    ///
    /// `PeerNotFound` if the owner never registered.
    pub fn create_room(&self, owner: &PeerId) -> Result<Room, DirectoryError> {
        if self.store.peer(owner)?.is_none() {
            return Err(DirectoryError::PeerNotFound(owner.clone()));
        }

        let room = loop {
            let now = Utc::now();
            let candidate = Room {
                id: self.new_room_id(),
                user_id: owner.clone(),
                code: RoomCode::generate(&self.env),
                created: now,
                updated: now,
            };

            match self.store.insert_room(&candidate) {
                Ok(()) => break candidate,
                Err(StoreError::CodeTaken(code)) => {
                    tracing::debug!(%code, "room code collision, regenerating");
                },
                Err(err) => return Err(err.into()),
            }
        };

        // The owner link is populated through the same assignment path
        // joiners use. On failure, unwind the half-created room.
        if let Err(err) = self.assign_room(owner, room.id) {
            if let Err(cleanup) = self.store.remove_room(&room.id) {
                tracing::error!(room_id = %room.id, %cleanup, "failed to unwind room");
            }
            return Err(err);
        }

        tracing::info!(room_id = %room.id, code = %room.code, owner = %owner, "room created");
        Ok(room)
    }

    /// Resolve a submitted code to its room.
    ///
    /// Input is normalized (uppercased) before the index lookup, so
    /// comparison is case-insensitive.
    ///
    /// # Errors
    ///
    /// `Validation` for malformed codes; `RoomNotFound` for codes never
    /// issued.
    pub fn room_by_code(&self, code: &str) -> Result<Room, DirectoryError> {
        let code = RoomCode::parse(code)?;
        self.store.room_by_code(&code)?.ok_or(DirectoryError::RoomNotFound)
    }

    /// Look up a room by id.
    pub fn room(&self, room_id: &RoomId) -> Result<Room, DirectoryError> {
        self.store.room(room_id)?.ok_or(DirectoryError::RoomNotFound)
    }

    /// Delete a room on its owner's departure.
    ///
    /// Deletion is an explicit operation, decoupled from any notification
    /// stream's lifecycle. Closes the room's membership channel and clears
    /// the owner's room assignment when it still references the deleted
    /// room. Joiners' assignments are not touched;
    /// their records simply outlive the room the way the owner's record
    /// outlives a dropped connection.
    ///
    /// # Errors
    ///
    /// `PeerNotFound`/`RoomNotFound` for unknown ids; `NotOwner` when the
    /// requester does not own the room.
    pub fn delete_room(
        &self,
        room_id: &RoomId,
        requester: &PeerId,
    ) -> Result<Room, DirectoryError> {
        let mut peer = self
            .store
            .peer(requester)?
            .ok_or_else(|| DirectoryError::PeerNotFound(requester.clone()))?;

        let room = self.store.room(room_id)?.ok_or(DirectoryError::RoomNotFound)?;
        if room.user_id != peer.id {
            return Err(DirectoryError::NotOwner(peer.id));
        }

        self.store.remove_room(room_id)?;
        self.notifier.unsubscribe(room_id);

        // Only clear the assignment if it still points at the deleted
        // room; the owner may have moved on to another room since.
        if peer.room_id == Some(*room_id) {
            peer.room_id = None;
            peer.updated = Utc::now();
            self.store.put_peer(&peer)?;
        }

        tracing::info!(%room_id, owner = %peer.id, "room deleted");
        Ok(room)
    }

    /// Open the membership push channel for a room.
    ///
    /// # Errors
    ///
    /// `RoomNotFound` when the room is not live.
    pub fn subscribe_members(
        &self,
        room_id: RoomId,
    ) -> Result<mpsc::Receiver<PeerId>, DirectoryError> {
        if self.store.room(&room_id)?.is_none() {
            return Err(DirectoryError::RoomNotFound);
        }
        Ok(self.notifier.subscribe(room_id))
    }

    /// Derive a fresh v4 room id from the environment's RNG.
    fn new_room_id(&self) -> RoomId {
        let mut bytes = [0u8; 16];
        self.env.random_bytes(&mut bytes);
        uuid::Builder::from_random_bytes(bytes).into_uuid()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicU8, Ordering},
    };

    use crate::store::MemoryStore;

    use super::*;

    /// Env with a scriptable byte source so code collisions are forceable.
    #[derive(Clone)]
    struct ScriptedEnv {
        bytes: Arc<Mutex<Vec<u8>>>,
        fallback: Arc<AtomicU8>,
    }

    impl ScriptedEnv {
        fn new(script: &[u8]) -> Self {
            Self { bytes: Arc::new(Mutex::new(script.to_vec())), fallback: Arc::new(AtomicU8::new(0)) }
        }
    }

    impl Environment for ScriptedEnv {
        type Instant = std::time::Instant;

        fn now(&self) -> Self::Instant {
            std::time::Instant::now()
        }

        fn sleep(&self, _d: std::time::Duration) -> impl std::future::Future<Output = ()> + Send {
            std::future::ready(())
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            let mut script = self.bytes.lock().unwrap();
            for byte in buffer.iter_mut() {
                *byte = if script.is_empty() {
                    self.fallback.fetch_add(1, Ordering::Relaxed).wrapping_mul(37)
                } else {
                    script.remove(0)
                };
            }
        }
    }

    fn directory() -> RoomDirectory<ScriptedEnv, MemoryStore> {
        RoomDirectory::new(ScriptedEnv::new(&[]), MemoryStore::new())
    }

    fn owner(dir: &RoomDirectory<ScriptedEnv, MemoryStore>) -> PeerId {
        let id = PeerId::from("11111111-1111-4111-8111-111111111111");
        dir.register(id.clone()).unwrap();
        id
    }

    #[test]
    fn register_creates_unassigned_peer() {
        let dir = directory();
        let peer = dir.register(PeerId::from("p1")).unwrap();
        assert_eq!(peer.room_id, None);
    }

    #[test]
    fn reregistration_resets_the_assignment() {
        let dir = directory();
        let id = owner(&dir);
        dir.create_room(&id).unwrap();

        let peer = dir.register(id.clone()).unwrap();
        assert_eq!(peer.room_id, None);
    }

    #[test]
    fn create_room_links_the_owner() {
        let dir = directory();
        let id = owner(&dir);

        let room = dir.create_room(&id).unwrap();

        assert_eq!(room.user_id, id);
        let peer = dir.store.peer(&id).unwrap().unwrap();
        assert_eq!(peer.room_id, Some(room.id));
    }

    #[test]
    fn create_room_for_unknown_owner_fails_and_leaks_nothing() {
        let dir = directory();
        let result = dir.create_room(&PeerId::from("ghost"));
        assert!(matches!(result, Err(DirectoryError::PeerNotFound(_))));
    }

    #[test]
    fn code_collision_is_resolved_by_regeneration() {
        // Two identical 6-byte draws, then distinct ones. Each room draws
        // 16 id bytes then 6 code bytes.
        let mut script = Vec::new();
        for _ in 0..2 {
            script.extend([0u8; 16]); // id bytes (ids may collide in test, codes matter)
            script.extend([1, 2, 3, 4, 5, 6]); // same code both times
        }
        let env = ScriptedEnv::new(&script);
        let dir = RoomDirectory::new(env, MemoryStore::new());

        let a = PeerId::from("a");
        let b = PeerId::from("b");
        dir.register(a.clone()).unwrap();
        dir.register(b.clone()).unwrap();

        let first = dir.create_room(&a).unwrap();
        // Second creation draws the same code, loses the conditional
        // insert, and retries from the fallback stream.
        let second = dir.create_room(&b).unwrap();

        assert_ne!(first.code, second.code);
    }

    #[test]
    fn room_by_code_is_case_insensitive() {
        let dir = directory();
        let id = owner(&dir);
        let room = dir.create_room(&id).unwrap();

        let found = dir.room_by_code(&room.code.as_str().to_ascii_lowercase()).unwrap();
        assert_eq!(found, room);
    }

    #[test]
    fn room_by_code_rejects_bad_lengths() {
        let dir = directory();
        assert!(matches!(dir.room_by_code("AB12"), Err(DirectoryError::Validation(_))));
    }

    #[test]
    fn never_issued_code_is_not_found() {
        let dir = directory();
        assert!(matches!(dir.room_by_code("000000"), Err(DirectoryError::RoomNotFound)));
    }

    #[test]
    fn assign_room_unknown_peer_leaves_store_unchanged() {
        let dir = directory();
        let id = owner(&dir);
        let room = dir.create_room(&id).unwrap();

        let result = dir.assign_room(&PeerId::from("ghost"), room.id);
        assert!(matches!(result, Err(DirectoryError::PeerNotFound(_))));
        assert_eq!(dir.store.peer(&PeerId::from("ghost")).unwrap(), None);
    }

    #[test]
    fn assign_room_requires_a_live_room() {
        let dir = directory();
        let id = owner(&dir);

        let result = dir.assign_room(&id, uuid::Uuid::new_v4());
        assert!(matches!(result, Err(DirectoryError::RoomNotFound)));
    }

    #[test]
    fn assign_room_is_idempotent() {
        let dir = directory();
        let id = owner(&dir);
        let room = dir.create_room(&id).unwrap();

        let joiner = PeerId::from("joiner");
        dir.register(joiner.clone()).unwrap();

        let first = dir.assign_room(&joiner, room.id).unwrap();
        let second = dir.assign_room(&joiner, room.id).unwrap();

        assert_eq!(first.room_id, second.room_id);
        assert!(second.updated >= first.updated);
    }

    #[test]
    fn assignment_signals_the_membership_channel() {
        let dir = directory();
        let id = owner(&dir);
        let room = dir.create_room(&id).unwrap();

        let mut rx = dir.subscribe_members(room.id).unwrap();

        let joiner = PeerId::from("joiner");
        dir.register(joiner.clone()).unwrap();
        dir.assign_room(&joiner, room.id).unwrap();

        assert_eq!(rx.try_recv().unwrap(), joiner);
    }

    #[test]
    fn delete_room_requires_the_owner() {
        let dir = directory();
        let id = owner(&dir);
        let room = dir.create_room(&id).unwrap();

        let joiner = PeerId::from("joiner");
        dir.register(joiner.clone()).unwrap();

        let result = dir.delete_room(&room.id, &joiner);
        assert!(matches!(result, Err(DirectoryError::NotOwner(_))));
        assert!(dir.room(&room.id).is_ok());
    }

    #[test]
    fn delete_room_frees_code_and_clears_owner() {
        let dir = directory();
        let id = owner(&dir);
        let room = dir.create_room(&id).unwrap();

        dir.delete_room(&room.id, &id).unwrap();

        assert!(matches!(dir.room(&room.id), Err(DirectoryError::RoomNotFound)));
        assert!(matches!(
            dir.room_by_code(room.code.as_str()),
            Err(DirectoryError::RoomNotFound)
        ));
        assert_eq!(dir.store.peer(&id).unwrap().unwrap().room_id, None);
    }

    #[test]
    fn deleting_an_old_room_keeps_a_newer_assignment() {
        let dir = directory();
        let id = owner(&dir);
        let first = dir.create_room(&id).unwrap();
        let second = dir.create_room(&id).unwrap();

        dir.delete_room(&first.id, &id).unwrap();

        assert_eq!(dir.store.peer(&id).unwrap().unwrap().room_id, Some(second.id));
        assert!(dir.room(&second.id).is_ok());
    }

    #[test]
    fn subscribe_requires_a_live_room() {
        let dir = directory();
        let result = dir.subscribe_members(uuid::Uuid::new_v4());
        assert!(matches!(result, Err(DirectoryError::RoomNotFound)));
    }

    #[test]
    fn concurrent_creation_never_duplicates_codes() {
        let dir = Arc::new(RoomDirectory::new(ScriptedEnv::new(&[]), MemoryStore::new()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let dir = Arc::clone(&dir);
                std::thread::spawn(move || {
                    let id = PeerId::new(format!("peer-{i}"));
                    dir.register(id.clone()).unwrap();
                    dir.create_room(&id).unwrap()
                })
            })
            .collect();

        let rooms: Vec<Room> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let mut codes: Vec<&str> = rooms.iter().map(|r| r.code.as_str()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), rooms.len(), "all live codes must be unique");
    }
}
