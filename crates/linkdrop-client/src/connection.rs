//! Per-connection handshake state machine.
//!
//! The transport surfaces connection establishment asymmetrically: the
//! accepting side learns "someone connected to me" while the initiating
//! side learns "my connect call produced a handle", and neither signal
//! proves the remote application has attached its receive path yet. The
//! handshake removes that ambiguity with two sentinel tokens exchanged over
//! the channel itself:
//!
//! 1. The initiating side sends [`READY`] as soon as its handle exists and
//!    its receive path is wired up.
//! 2. The accepting side, already able to receive by definition, answers
//!    the first [`READY`] with [`PILOT`].
//! 3. Receiving [`PILOT`] while `Pending` confirms the initiating side.
//!
//! Tokens are consumed by the handshake and never surface as application
//! data in the slot where they are special; once a side is `Confirmed`,
//! the literal token strings are ordinary payloads.
//!
//! A `Pending` record carries a deadline; the owning [`Client`] discards
//! records whose deadline passes, so a lost pilot surfaces as a timeout
//! instead of a silent hang.
//!
//! [`Client`]: crate::client::Client

use std::time::Duration;

/// Sentinel confirming the accepting side's channel is live.
///
/// Only special on an initiating record that is still `Pending`.
pub const PILOT: &str = "pilot";

/// Sentinel announcing the initiating side's receive path is attached.
///
/// Only special on an accepting record that has not yet sent its pilot.
pub const READY: &str = "ready";

/// Handshake progress of a single logical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initiating side, pilot not yet seen. Application data must not be
    /// broadcast here.
    Pending,
    /// Safe for application payloads in both directions.
    Confirmed,
}

/// Which transport notification created this record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    /// Created from an inbound-connection notification.
    Accepting,
    /// Created from a local connect call.
    Initiating,
}

/// Tunables for the handshake.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// How long an initiating record may stay `Pending` before it is
    /// discarded.
    pub handshake_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { handshake_timeout: Duration::from_secs(10) }
    }
}

/// Effects produced by a connection state transition.
///
/// The caller attaches the remote peer identity; the record itself does not
/// know who it talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// The connection just became safe to use; surface it to the
    /// application exactly once.
    Ready,
    /// Push a handshake token over the channel.
    SendToken(&'static str),
    /// Hand an application payload up unchanged.
    Deliver(String),
}

/// State for one logical connection to a remote peer.
#[derive(Debug, Clone)]
pub struct Connection<I> {
    state: ConnectionState,
    role: ConnectionRole,
    /// Accepting side only: whether the pilot answer went out already.
    pilot_sent: bool,
    /// Initiating side only: discard the record once this passes.
    deadline: Option<I>,
}

impl<I: Copy + Ord> Connection<I> {
    /// Create a record for an inbound-connection notification.
    ///
    /// The accepting side's own listener is attached by definition, so the
    /// record is `Confirmed` immediately and the ready signal fires before
    /// any token is sent.
    pub fn accept() -> (Self, Vec<ConnectionAction>) {
        let conn = Self {
            state: ConnectionState::Confirmed,
            role: ConnectionRole::Accepting,
            pilot_sent: false,
            deadline: None,
        };
        (conn, vec![ConnectionAction::Ready])
    }

    /// Create a record for a locally initiated connection.
    ///
    /// Announces readiness to the remote side and waits for the pilot; the
    /// record stays `Pending` until it arrives or `deadline` passes.
    pub fn connect(deadline: I) -> (Self, Vec<ConnectionAction>) {
        let conn = Self {
            state: ConnectionState::Pending,
            role: ConnectionRole::Initiating,
            pilot_sent: false,
            deadline: Some(deadline),
        };
        (conn, vec![ConnectionAction::SendToken(READY)])
    }

    /// Current handshake state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Which side of the transport notification this record represents.
    pub fn role(&self) -> ConnectionRole {
        self.role
    }

    /// Whether application payloads may be pushed on this record.
    pub fn is_confirmed(&self) -> bool {
        self.state == ConnectionState::Confirmed
    }

    /// Process one inbound message in arrival order.
    pub fn handle_message(&mut self, data: String) -> Vec<ConnectionAction> {
        match self.state {
            ConnectionState::Pending => {
                if data == PILOT {
                    self.state = ConnectionState::Confirmed;
                    self.deadline = None;
                    tracing::debug!("pilot received, connection confirmed");
                    vec![ConnectionAction::Ready]
                } else {
                    // The token is only special while pending; anything else
                    // is application data even before confirmation.
                    vec![ConnectionAction::Deliver(data)]
                }
            },
            ConnectionState::Confirmed => {
                if self.role == ConnectionRole::Accepting && !self.pilot_sent && data == READY {
                    self.pilot_sent = true;
                    tracing::debug!("remote ready, answering with pilot");
                    vec![ConnectionAction::SendToken(PILOT)]
                } else {
                    vec![ConnectionAction::Deliver(data)]
                }
            },
        }
    }

    /// Whether the record's handshake deadline has passed.
    pub fn timed_out(&self, now: I) -> bool {
        self.state == ConnectionState::Pending && self.deadline.is_some_and(|d| d <= now)
    }
}
