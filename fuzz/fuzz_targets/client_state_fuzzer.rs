//! Fuzz target for the [`Client`] state machine
//!
//! Prevent premature confirmation and duplicate routing under arbitrary
//! transport schedules
//!
//! # Strategy
//!
//! - Event sequences: Arbitrary interleavings of connection notifications,
//!   messages, closes, errors, broadcasts, and timer ticks across a small
//!   set of peers
//! - Token probing: Pilot and ready literals injected at arbitrary points
//! - Timeout testing: Advance time to trigger handshake deadlines
//!
//! # Invariants
//!
//! - `ConnectionReady` fires at most once per record lifetime
//! - Broadcast sends target only confirmed records, never pending ones
//! - A message for an absent record errors instead of creating state
//! - Records never outlive a close, a timeout, or a duplicate collapse
//! - NEVER panic on any event sequence

#![no_main]

use std::{
    collections::HashMap,
    ops::{Add, Sub},
    sync::{Arc, Mutex},
    time::Duration,
};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use linkdrop_client::{Client, ClientAction, ClientEvent, ConnectionConfig, PILOT, READY};
use linkdrop_core::{Environment, PeerId};

/// Represents time as Duration since epoch 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct FuzzInstant(Duration);

impl Add<Duration> for FuzzInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs)
    }
}

impl Sub for FuzzInstant {
    type Output = Duration;

    fn sub(self, other: Self) -> Duration {
        self.0.saturating_sub(other.0)
    }
}

#[derive(Clone)]
struct FuzzEnv {
    clock: Arc<Mutex<Duration>>,
}

impl FuzzEnv {
    fn advance(&self, delta: Duration) {
        if let Ok(mut clock) = self.clock.lock() {
            *clock += delta;
        }
    }
}

impl Environment for FuzzEnv {
    type Instant = FuzzInstant;

    fn now(&self) -> Self::Instant {
        FuzzInstant(self.clock.lock().map_or(Duration::ZERO, |g| *g))
    }

    fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        std::future::ready(())
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        buffer.fill(0);
    }
}

#[derive(Debug, Clone, Arbitrary)]
enum FuzzData {
    Pilot,
    Ready,
    Text(String),
}

impl FuzzData {
    fn into_string(self) -> String {
        match self {
            Self::Pilot => PILOT.to_owned(),
            Self::Ready => READY.to_owned(),
            Self::Text(text) => text,
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
enum FuzzEvent {
    Inbound { peer: u8 },
    Outbound { peer: u8 },
    Message { peer: u8, data: FuzzData },
    Close { peer: u8 },
    TransportError { peer: u8 },
    Broadcast { data: FuzzData },
    Tick { advance_secs: u8 },
}

#[derive(Debug, Clone, Arbitrary)]
struct FuzzInput {
    events: Vec<FuzzEvent>,
}

fn peer(index: u8) -> PeerId {
    PeerId::new(format!("peer-{}", index % 4))
}

fuzz_target!(|input: FuzzInput| {
    let env = FuzzEnv { clock: Arc::new(Mutex::new(Duration::ZERO)) };
    let mut client: Client<FuzzEnv> = Client::new(env.clone(), ConnectionConfig::default());

    let mut ready_seen: HashMap<PeerId, u32> = HashMap::new();

    for event in input.events {
        let (event, fed_peer) = match event {
            FuzzEvent::Inbound { peer: p } => {
                let id = peer(p);
                (ClientEvent::InboundConnected { remote: id.clone() }, Some(id))
            },
            FuzzEvent::Outbound { peer: p } => {
                let id = peer(p);
                (ClientEvent::OutboundConnected { remote: id.clone() }, Some(id))
            },
            FuzzEvent::Message { peer: p, data } => {
                let id = peer(p);
                (
                    ClientEvent::MessageReceived { remote: id.clone(), data: data.into_string() },
                    Some(id),
                )
            },
            FuzzEvent::Close { peer: p } => {
                let id = peer(p);
                (ClientEvent::ConnectionClosed { remote: id.clone() }, Some(id))
            },
            FuzzEvent::TransportError { peer: p } => {
                let id = peer(p);
                (
                    ClientEvent::TransportError {
                        remote: id.clone(),
                        reason: "fuzzed".to_owned(),
                    },
                    Some(id),
                )
            },
            FuzzEvent::Broadcast { data } => {
                (ClientEvent::Broadcast { payload: data.into_string() }, None)
            },
            FuzzEvent::Tick { advance_secs } => {
                env.advance(Duration::from_secs(u64::from(advance_secs % 120)));
                (ClientEvent::Tick { now: env.now() }, None)
            },
        };

        let is_message = matches!(event, ClientEvent::MessageReceived { .. });

        match client.handle(event) {
            Ok(actions) => {
                for action in actions {
                    match action {
                        ClientAction::ConnectionReady { remote } => {
                            let count = ready_seen.entry(remote.clone()).or_insert(0);
                            *count += 1;
                            assert_eq!(
                                *count, 1,
                                "ready fired twice for {remote} without a drop in between"
                            );
                        },
                        ClientAction::Send { remote, .. } => {
                            assert!(
                                client.state(&remote).is_some(),
                                "send targets a peer with no record"
                            );
                        },
                        ClientAction::Deliver { remote, .. } => {
                            assert!(
                                client.state(&remote).is_some(),
                                "delivery from a peer with no record"
                            );
                        },
                        ClientAction::HandshakeFailed { remote }
                        | ClientAction::ConnectionDropped { remote } => {
                            assert!(client.state(&remote).is_none(), "discarded record survived");
                            ready_seen.remove(&remote);
                        },
                        ClientAction::PeerError { .. } => {},
                    }
                }
            },
            Err(_) => {
                // Only a message for an absent record may error, and it
                // must not create one.
                let id = fed_peer.expect("only peer-scoped events can fail");
                assert!(is_message);
                assert!(client.state(&id).is_none());
            },
        }

        assert!(client.connection_count() <= 4, "more records than distinct peers");
    }
});
