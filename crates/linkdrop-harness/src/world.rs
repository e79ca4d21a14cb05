//! Two-peer simulation world.
//!
//! `World` wires a host client and a joiner client back to back through
//! in-memory FIFO pipes, standing in for the datachannel transport. Driving
//! the world is synchronous: feed an event, pump until the pipes drain, then
//! inspect the application-visible actions each side accumulated.

use std::collections::VecDeque;
use std::time::Duration;

use linkdrop_client::{Client, ClientAction, ClientEvent, ConnectionConfig, ConnectionState};
use linkdrop_core::PeerId;

use crate::sim::SimEnv;

/// Which endpoint an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The room owner, accepting connections.
    Host,
    /// The peer that resolved a code and dialed in.
    Joiner,
}

impl Side {
    fn other(self) -> Self {
        match self {
            Self::Host => Self::Joiner,
            Self::Joiner => Self::Host,
        }
    }
}

/// A host and a joiner connected by lossless in-order pipes.
pub struct World {
    env: SimEnv,
    host: Client<SimEnv>,
    joiner: Client<SimEnv>,
    host_id: PeerId,
    joiner_id: PeerId,
    to_host: VecDeque<String>,
    to_joiner: VecDeque<String>,
    /// Application-visible actions the host produced, in order.
    pub host_log: Vec<ClientAction>,
    /// Application-visible actions the joiner produced, in order.
    pub joiner_log: Vec<ClientAction>,
}

impl World {
    /// Build a world from a seed. Both clients share the simulated clock.
    pub fn new(seed: u64) -> Self {
        let env = SimEnv::new(seed);
        Self {
            host: Client::new(env.clone(), ConnectionConfig::default()),
            joiner: Client::new(env.clone(), ConnectionConfig::default()),
            env,
            host_id: PeerId::from("11111111-1111-4111-8111-111111111111"),
            joiner_id: PeerId::from("22222222-2222-4222-8222-222222222222"),
            to_host: VecDeque::new(),
            to_joiner: VecDeque::new(),
            host_log: Vec::new(),
            joiner_log: Vec::new(),
        }
    }

    /// Identity the host registers under.
    pub fn host_id(&self) -> &PeerId {
        &self.host_id
    }

    /// Identity the joiner registers under.
    pub fn joiner_id(&self) -> &PeerId {
        &self.joiner_id
    }

    /// The shared simulation environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Handshake state on one side for its remote peer.
    pub fn state(&self, side: Side) -> Option<ConnectionState> {
        match side {
            Side::Host => self.host.state(&self.joiner_id),
            Side::Joiner => self.joiner.state(&self.host_id),
        }
    }

    /// Feed an event to one side and capture the resulting actions.
    ///
    /// Sends go onto the pipe toward the other side; everything else is
    /// appended to that side's log. Messages addressed to a discarded
    /// record are dropped, the way a transport delivering to a closed
    /// handle would drop them.
    pub fn feed(&mut self, side: Side, event: ClientEvent<crate::sim::SimInstant>) {
        let client = match side {
            Side::Host => &mut self.host,
            Side::Joiner => &mut self.joiner,
        };
        let Ok(actions) = client.handle(event) else {
            return;
        };
        for action in actions {
            match action {
                ClientAction::Send { data, .. } => match side.other() {
                    Side::Host => self.to_host.push_back(data),
                    Side::Joiner => self.to_joiner.push_back(data),
                },
                other => match side {
                    Side::Host => self.host_log.push(other),
                    Side::Joiner => self.joiner_log.push(other),
                },
            }
        }
    }

    /// Deliver queued messages until both pipes are empty.
    pub fn pump(&mut self) {
        loop {
            if let Some(data) = self.to_host.pop_front() {
                let remote = self.joiner_id.clone();
                self.feed(Side::Host, ClientEvent::MessageReceived { remote, data });
                continue;
            }
            if let Some(data) = self.to_joiner.pop_front() {
                let remote = self.host_id.clone();
                self.feed(Side::Joiner, ClientEvent::MessageReceived { remote, data });
                continue;
            }
            break;
        }
    }

    /// Joiner dials the host: both transports notify, then messages flow.
    pub fn connect(&mut self) {
        let host_remote = self.joiner_id.clone();
        let joiner_remote = self.host_id.clone();
        self.feed(Side::Joiner, ClientEvent::OutboundConnected { remote: joiner_remote });
        self.feed(Side::Host, ClientEvent::InboundConnected { remote: host_remote });
        self.pump();
    }

    /// Both sides dial simultaneously: each sees an inbound and an
    /// outbound notification for the same peer.
    pub fn connect_simultaneous(&mut self) {
        let host_remote = self.joiner_id.clone();
        let joiner_remote = self.host_id.clone();
        self.feed(Side::Host, ClientEvent::InboundConnected { remote: host_remote.clone() });
        self.feed(Side::Joiner, ClientEvent::OutboundConnected { remote: joiner_remote.clone() });
        self.feed(Side::Host, ClientEvent::OutboundConnected { remote: host_remote });
        self.feed(Side::Joiner, ClientEvent::InboundConnected { remote: joiner_remote });
        self.pump();
    }

    /// Joiner dials but nothing makes it across the wire.
    pub fn connect_lossy(&mut self) {
        let host_remote = self.joiner_id.clone();
        let joiner_remote = self.host_id.clone();
        self.feed(Side::Joiner, ClientEvent::OutboundConnected { remote: joiner_remote });
        self.feed(Side::Host, ClientEvent::InboundConnected { remote: host_remote });
        self.to_host.clear();
        self.to_joiner.clear();
    }

    /// Fan a payload out from one side, delivering to the other.
    pub fn broadcast(&mut self, side: Side, payload: &str) {
        self.feed(side, ClientEvent::Broadcast { payload: payload.to_owned() });
        self.pump();
    }

    /// Advance simulated time and fire both peers' timers.
    pub fn advance_and_tick(&mut self, delta: Duration) {
        self.env.advance(delta);
        let now = linkdrop_core::Environment::now(&self.env);
        self.feed(Side::Host, ClientEvent::Tick { now });
        self.feed(Side::Joiner, ClientEvent::Tick { now });
    }

    /// Payloads delivered to the application on one side, in order.
    pub fn delivered(&self, side: Side) -> Vec<&str> {
        let log = match side {
            Side::Host => &self.host_log,
            Side::Joiner => &self.joiner_log,
        };
        log.iter()
            .filter_map(|action| match action {
                ClientAction::Deliver { payload, .. } => Some(payload.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Number of `ConnectionReady` events one side has surfaced.
    pub fn ready_count(&self, side: Side) -> usize {
        let log = match side {
            Side::Host => &self.host_log,
            Side::Joiner => &self.joiner_log,
        };
        log.iter().filter(|a| matches!(a, ClientAction::ConnectionReady { .. })).count()
    }
}
