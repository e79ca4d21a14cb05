//! Client state machine.
//!
//! The `Client` is the top-level state machine that owns one connection
//! record per remote peer and turns raw transport notifications into
//! application-confirmed, duplicate-free logical connections. Pure state
//! machine - returns actions, caller handles I/O.

use std::collections::BTreeMap;

use linkdrop_core::{Environment, PeerId};

use crate::{
    connection::{Connection, ConnectionAction, ConnectionConfig, ConnectionState},
    error::ClientError,
    event::{ClientAction, ClientEvent},
};

/// Client state machine for one local peer.
///
/// Records are keyed by remote peer identity, which guarantees at most one
/// logical connection per remote peer even when the transport surfaces
/// duplicate notifications (simultaneous connect attempts from both sides).
/// The first notification wins; later ones for a live record are ignored.
///
/// # Type Parameters
///
/// - `E`: Environment implementation for time
pub struct Client<E: Environment> {
    /// One record per remote peer, iterated in stable order.
    connections: BTreeMap<PeerId, Connection<E::Instant>>,

    /// Handshake tunables.
    config: ConnectionConfig,

    /// Environment for deadlines.
    env: E,
}

impl<E: Environment> Client<E> {
    /// Create a client with the given environment and config.
    pub fn new(env: E, config: ConnectionConfig) -> Self {
        Self { connections: BTreeMap::new(), config, env }
    }

    /// Number of connection records, pending included.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Handshake state of the record for `remote`, if one exists.
    pub fn state(&self, remote: &PeerId) -> Option<ConnectionState> {
        self.connections.get(remote).map(Connection::state)
    }

    /// Remote peers whose connections are safe for application payloads.
    pub fn confirmed_peers(&self) -> impl Iterator<Item = &PeerId> {
        self.connections.iter().filter(|(_, c)| c.is_confirmed()).map(|(peer, _)| peer)
    }

    /// Process an event and return resulting actions.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the event cannot be processed.
    pub fn handle(
        &mut self,
        event: ClientEvent<E::Instant>,
    ) -> Result<Vec<ClientAction>, ClientError> {
        match event {
            ClientEvent::InboundConnected { remote } => Ok(self.handle_inbound(remote)),
            ClientEvent::OutboundConnected { remote } => Ok(self.handle_outbound(remote)),
            ClientEvent::MessageReceived { remote, data } => self.handle_message(remote, data),
            ClientEvent::ConnectionClosed { remote } => Ok(self.handle_closed(&remote)),
            ClientEvent::TransportError { remote, reason } => {
                Ok(vec![ClientAction::PeerError { remote, reason }])
            },
            ClientEvent::Broadcast { payload } => Ok(self.handle_broadcast(&payload)),
            ClientEvent::Tick { now } => Ok(self.handle_tick(now)),
        }
    }

    /// Handle an inbound-connection notification.
    fn handle_inbound(&mut self, remote: PeerId) -> Vec<ClientAction> {
        if self.connections.contains_key(&remote) {
            tracing::debug!(%remote, "duplicate connection notification ignored");
            return vec![];
        }

        let (conn, actions) = Connection::accept();
        self.connections.insert(remote.clone(), conn);
        Self::attach_remote(&remote, actions)
    }

    /// Handle a locally initiated connection producing a handle.
    fn handle_outbound(&mut self, remote: PeerId) -> Vec<ClientAction> {
        if self.connections.contains_key(&remote) {
            tracing::debug!(%remote, "duplicate connection notification ignored");
            return vec![];
        }

        let deadline = self.env.now() + self.config.handshake_timeout;
        let (conn, actions) = Connection::connect(deadline);
        self.connections.insert(remote.clone(), conn);
        Self::attach_remote(&remote, actions)
    }

    /// Handle an inbound message on an established handle.
    fn handle_message(
        &mut self,
        remote: PeerId,
        data: String,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let conn = self
            .connections
            .get_mut(&remote)
            .ok_or_else(|| ClientError::UnknownConnection { remote: remote.clone() })?;

        let actions = conn.handle_message(data);
        Ok(Self::attach_remote(&remote, actions))
    }

    /// Handle the transport closing a handle.
    ///
    /// The application discards the connection on close; errors on the same
    /// handle have already been forwarded separately.
    fn handle_closed(&mut self, remote: &PeerId) -> Vec<ClientAction> {
        if self.connections.remove(remote).is_none() {
            return vec![];
        }
        vec![ClientAction::ConnectionDropped { remote: remote.clone() }]
    }

    /// Fan a payload out to every confirmed connection.
    ///
    /// Each resulting send is independent; one channel failing at the
    /// transport must not block the others, so the driver executes these
    /// without rollback. Pending records receive nothing.
    fn handle_broadcast(&self, payload: &str) -> Vec<ClientAction> {
        self.confirmed_peers()
            .map(|remote| ClientAction::Send {
                remote: remote.clone(),
                data: payload.to_owned(),
            })
            .collect()
    }

    /// Discard pending records whose handshake deadline passed.
    fn handle_tick(&mut self, now: E::Instant) -> Vec<ClientAction> {
        let expired: Vec<PeerId> = self
            .connections
            .iter()
            .filter(|(_, conn)| conn.timed_out(now))
            .map(|(peer, _)| peer.clone())
            .collect();

        expired
            .into_iter()
            .map(|remote| {
                self.connections.remove(&remote);
                tracing::warn!(%remote, "handshake timed out, discarding record");
                ClientAction::HandshakeFailed { remote }
            })
            .collect()
    }

    /// Pair connection-level actions with the peer they concern.
    fn attach_remote(remote: &PeerId, actions: Vec<ConnectionAction>) -> Vec<ClientAction> {
        actions
            .into_iter()
            .map(|action| match action {
                ConnectionAction::Ready => {
                    ClientAction::ConnectionReady { remote: remote.clone() }
                },
                ConnectionAction::SendToken(token) => {
                    ClientAction::Send { remote: remote.clone(), data: token.to_owned() }
                },
                ConnectionAction::Deliver(payload) => {
                    ClientAction::Deliver { remote: remote.clone(), payload }
                },
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::{Duration, Instant};

    use crate::connection::{PILOT, READY};

    use super::*;

    #[derive(Clone)]
    struct TestEnv;

    impl Environment for TestEnv {
        type Instant = Instant;

        fn now(&self) -> Self::Instant {
            Instant::now()
        }

        fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            std::future::ready(())
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            // Deterministic for tests
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = i as u8;
            }
        }
    }

    fn client() -> Client<TestEnv> {
        Client::new(TestEnv, ConnectionConfig::default())
    }

    fn peer(name: &str) -> PeerId {
        PeerId::from(name)
    }

    #[test]
    fn inbound_connection_is_ready_immediately() {
        let mut client = client();

        let actions =
            client.handle(ClientEvent::InboundConnected { remote: peer("joiner") }).unwrap();

        assert_eq!(actions, vec![ClientAction::ConnectionReady { remote: peer("joiner") }]);
        assert_eq!(client.state(&peer("joiner")), Some(ConnectionState::Confirmed));
    }

    #[test]
    fn outbound_connection_announces_ready_and_pends() {
        let mut client = client();

        let actions =
            client.handle(ClientEvent::OutboundConnected { remote: peer("host") }).unwrap();

        assert_eq!(
            actions,
            vec![ClientAction::Send { remote: peer("host"), data: READY.to_owned() }]
        );
        assert_eq!(client.state(&peer("host")), Some(ConnectionState::Pending));
    }

    #[test]
    fn pilot_confirms_and_fires_ready_once() {
        let mut client = client();
        client.handle(ClientEvent::OutboundConnected { remote: peer("host") }).unwrap();

        let actions = client
            .handle(ClientEvent::MessageReceived {
                remote: peer("host"),
                data: PILOT.to_owned(),
            })
            .unwrap();

        assert_eq!(actions, vec![ClientAction::ConnectionReady { remote: peer("host") }]);
        assert_eq!(client.state(&peer("host")), Some(ConnectionState::Confirmed));
    }

    #[test]
    fn pilot_literal_is_plain_data_once_confirmed() {
        let mut client = client();
        client.handle(ClientEvent::OutboundConnected { remote: peer("host") }).unwrap();
        client
            .handle(ClientEvent::MessageReceived { remote: peer("host"), data: PILOT.to_owned() })
            .unwrap();

        let actions = client
            .handle(ClientEvent::MessageReceived {
                remote: peer("host"),
                data: PILOT.to_owned(),
            })
            .unwrap();

        assert_eq!(
            actions,
            vec![ClientAction::Deliver { remote: peer("host"), payload: PILOT.to_owned() }]
        );
    }

    #[test]
    fn duplicate_notifications_collapse_to_one_record() {
        let mut client = client();

        let first =
            client.handle(ClientEvent::InboundConnected { remote: peer("joiner") }).unwrap();
        assert_eq!(first.len(), 1);

        // Simultaneous connect attempts can surface a second notification
        // for the same peer; it must not produce a second ready event.
        let second =
            client.handle(ClientEvent::InboundConnected { remote: peer("joiner") }).unwrap();
        assert!(second.is_empty());

        let third =
            client.handle(ClientEvent::OutboundConnected { remote: peer("joiner") }).unwrap();
        assert!(third.is_empty());

        assert_eq!(client.connection_count(), 1);
    }

    #[test]
    fn broadcast_reaches_only_confirmed_connections() {
        let mut client = client();

        client.handle(ClientEvent::InboundConnected { remote: peer("a") }).unwrap();
        client.handle(ClientEvent::InboundConnected { remote: peer("b") }).unwrap();
        client.handle(ClientEvent::OutboundConnected { remote: peer("c") }).unwrap();

        let actions = client
            .handle(ClientEvent::Broadcast { payload: "https://example.com".to_owned() })
            .unwrap();

        assert_eq!(
            actions,
            vec![
                ClientAction::Send { remote: peer("a"), data: "https://example.com".to_owned() },
                ClientAction::Send { remote: peer("b"), data: "https://example.com".to_owned() },
            ]
        );
    }

    #[test]
    fn handshake_timeout_discards_the_record() {
        let mut client = client();
        client.handle(ClientEvent::OutboundConnected { remote: peer("host") }).unwrap();

        let late = Instant::now() + Duration::from_secs(60);
        let actions = client.handle(ClientEvent::Tick { now: late }).unwrap();

        assert_eq!(actions, vec![ClientAction::HandshakeFailed { remote: peer("host") }]);
        assert_eq!(client.connection_count(), 0);
    }

    #[test]
    fn tick_leaves_live_handshakes_alone() {
        let mut client = client();
        client.handle(ClientEvent::OutboundConnected { remote: peer("host") }).unwrap();

        let actions = client.handle(ClientEvent::Tick { now: Instant::now() }).unwrap();

        assert!(actions.is_empty());
        assert_eq!(client.connection_count(), 1);
    }

    #[test]
    fn close_removes_the_record() {
        let mut client = client();
        client.handle(ClientEvent::InboundConnected { remote: peer("joiner") }).unwrap();

        let actions =
            client.handle(ClientEvent::ConnectionClosed { remote: peer("joiner") }).unwrap();

        assert_eq!(actions, vec![ClientAction::ConnectionDropped { remote: peer("joiner") }]);
        assert_eq!(client.connection_count(), 0);

        // A peer that reconnects later starts a fresh record.
        let actions =
            client.handle(ClientEvent::InboundConnected { remote: peer("joiner") }).unwrap();
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn transport_error_is_forwarded_without_state_change() {
        let mut client = client();
        client.handle(ClientEvent::OutboundConnected { remote: peer("host") }).unwrap();

        let actions = client
            .handle(ClientEvent::TransportError {
                remote: peer("host"),
                reason: "ice failed".to_owned(),
            })
            .unwrap();

        assert_eq!(
            actions,
            vec![ClientAction::PeerError { remote: peer("host"), reason: "ice failed".to_owned() }]
        );
        assert_eq!(client.state(&peer("host")), Some(ConnectionState::Pending));
    }

    #[test]
    fn message_on_unknown_connection_fails() {
        let mut client = client();

        let result = client.handle(ClientEvent::MessageReceived {
            remote: peer("stranger"),
            data: "hello".to_owned(),
        });

        assert_eq!(result, Err(ClientError::UnknownConnection { remote: peer("stranger") }));
    }
}
