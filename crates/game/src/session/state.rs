use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// `Idle` only describes a session that has never connected. Once a
/// connection ends the state stays at `Disconnected` or `TimedOut`, after
/// the network thread is gone too, so the host can still see how the last
/// session ended. Either one allows a fresh `begin_connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Idle = 0,
    Connecting = 1,
    Connected = 2,
    Disconnected = 3,
    TimedOut = 4,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Disconnected,
            4 => ConnectionState::TimedOut,
            _ => ConnectionState::Idle,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }
}

/// Connection state shared between the network thread, which writes it, and
/// the application thread, which reads it. Stored as a single atomic so the
/// two derived flags can never disagree.
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    state: Arc<AtomicU8>,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStatus {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(ConnectionState::Idle as u8)),
        }
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Moves to `Connecting` unless an attempt is already in flight or
    /// established. Returns whether this caller won the transition.
    pub fn begin_connect(&self) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if ConnectionState::from_u8(current).is_active() {
                    None
                } else {
                    Some(ConnectionState::Connecting as u8)
                }
            })
            .is_ok()
    }

    /// Stores `to` only if the state is still `from`.
    pub fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn trying_to_connect(&self) -> bool {
        self.get() == ConnectionState::Connecting
    }

    pub fn connected_to_server(&self) -> bool {
        self.get() == ConnectionState::Connected
    }
}
