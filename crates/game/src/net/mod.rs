mod codec;
mod config;
mod protocol;
mod stats;
mod tracking;
mod transport;

pub use codec::{
    PacketError, PacketReader, PacketWriter, decode_client_message, decode_server_message,
    decode_server_payload, encode_client_message, encode_server_message,
};
pub use config::{ConnectionParameters, LivenessTimeout};
pub use protocol::{
    CHANNEL_ID, CLIENT_VERSION, ClientMessage, ClientOpcode, DEFAULT_PORT, DisconnectReason,
    ITEM_COST, ItemType, LoginResponse, LoginResponseCode, MAX_FRAME_SIZE, MAX_USERNAME_LEN,
    PurchaseItemResponseCode, PurchasedItem, ServerMessage, ServerOpcode, Version, item_name,
};
pub use stats::{NetworkStats, PacketLossSimulation};
pub use tracking::{
    AckTracker, OutstandingMessage, ReceiveTracker, ReliableReceiver, ReliableSender,
    sequence_greater_than,
};
pub use transport::{
    Datagram, DatagramBody, DatagramHeader, MAX_DATAGRAM_SIZE, PROTOCOL_MAGIC, PROTOCOL_VERSION,
    PeerState, Transport, TransportError, TransportEvent, UdpHost,
};
