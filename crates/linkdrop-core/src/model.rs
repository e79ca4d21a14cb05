//! Data model shared between the directory service and its clients.
//!
//! Field names on the wire (`id`, `room_id`, `user_id`, `code`, `created`,
//! `updated`) are a compatibility surface with the deployed HTTP service and
//! must not be renamed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::code::RoomCode;

/// Opaque peer identity issued by the transport layer.
///
/// The directory never interprets the contents; it is a lookup key. The HTTP
/// layer validates the shape (UUID) at the boundary, mirroring what the
/// transport actually issues.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Wrap a transport-issued identity.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Server-generated room identity.
pub type RoomId = Uuid;

/// A registered peer and its current room assignment.
///
/// Created the first time an identity registers; mutated only through
/// explicit room-assignment updates. Peers are never deleted by this service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Transport-issued identity.
    pub id: PeerId,
    /// Room this peer currently belongs to, if any.
    ///
    /// Invariant: when set, references a live room.
    pub room_id: Option<RoomId>,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
    /// Last update timestamp.
    pub updated: DateTime<Utc>,
}

/// A rendezvous record binding a short code to an owning peer.
///
/// A room is a star-topology hub: joiners connect only to the owner, never
/// to each other. Exactly one owner, created by exactly one explicit call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Server-generated, globally unique id.
    pub id: RoomId,
    /// The owning peer. Wire name `user_id` for compatibility.
    pub user_id: PeerId,
    /// Human-shareable short code, unique among live rooms.
    pub code: RoomCode,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
    /// Last update timestamp.
    pub updated: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn peer_serializes_with_wire_field_names() {
        let peer = Peer {
            id: PeerId::from("b4c9a289-ca91-4a11-b6ef-3b4e9e6d32f7"),
            room_id: None,
            created: Utc::now(),
            updated: Utc::now(),
        };

        let json = serde_json::to_value(&peer).unwrap();
        assert_eq!(json["id"], "b4c9a289-ca91-4a11-b6ef-3b4e9e6d32f7");
        assert!(json["room_id"].is_null());
        assert!(json["created"].is_string());
        assert!(json["updated"].is_string());
    }

    #[test]
    fn room_owner_serializes_as_user_id() {
        let room = Room {
            id: Uuid::nil(),
            user_id: PeerId::from("owner"),
            code: RoomCode::parse("AB12CD").unwrap(),
            created: Utc::now(),
            updated: Utc::now(),
        };

        let json = serde_json::to_value(&room).unwrap();
        assert_eq!(json["user_id"], "owner");
        assert_eq!(json["code"], "AB12CD");
    }

    #[test]
    fn peer_roundtrips_through_json() {
        let peer = Peer {
            id: PeerId::from("p1"),
            room_id: Some(Uuid::nil()),
            created: Utc::now(),
            updated: Utc::now(),
        };

        let json = serde_json::to_string(&peer).unwrap();
        let back: Peer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, peer);
    }
}
