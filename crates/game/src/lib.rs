pub mod net;
pub mod session;

pub use net::{
    CLIENT_VERSION, ClientMessage, ConnectionParameters, DEFAULT_PORT, ItemType, NetworkStats,
    PacketError, PacketLossSimulation, ServerMessage, Transport, TransportError, TransportEvent,
    UdpHost, Version,
};
pub use session::{
    ConnectionManager, ConnectionState, Frontend, Instruction, PlayerState, Session,
};
