//! Reliable, ordered delivery over a single UDP socket.
//!
//! `UdpHost` talks to exactly one peer. Every datagram carries a sequence
//! number and an ack window for the datagrams received from the peer;
//! reliable payloads ride on those datagrams and are retransmitted until a
//! datagram carrying them is acknowledged. Pings keep the peer alive and the
//! liveness timeout decides when a silent peer is abandoned.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize, rancor};

use super::config::{ConnectionParameters, LivenessTimeout};
use super::stats::{NetworkStats, PacketLossSimulation};
use super::tracking::{AckTracker, ReceiveTracker, ReliableReceiver, ReliableSender};

pub const PROTOCOL_MAGIC: u32 = 0x4B52_5531;
pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_DATAGRAM_SIZE: usize = 1400;

const CONNECT_RETRY: Duration = Duration::from_millis(250);
const DISCONNECT_COPIES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    None,
    Connect,
    Disconnect,
    Timeout,
    Receive { channel: u8, data: Vec<u8> },
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
    #[error("could not resolve {0}")]
    Resolve(String),
    #[error("peer is not connected")]
    NotConnected,
    #[error("payload of {0} bytes does not fit in a datagram")]
    PayloadTooLarge(usize),
    #[error("datagram encoding failed: {0}")]
    Encode(rancor::Error),
}

/// The connection primitive the session loop drives.
pub trait Transport {
    /// Queues `data` for reliable, ordered delivery on `channel`.
    fn send(&mut self, channel: u8, data: &[u8]) -> Result<(), TransportError>;

    /// Returns an already-queued event without touching the network.
    fn check_events(&mut self) -> Option<TransportEvent>;

    /// Performs I/O for at most `timeout`, returning the first event produced.
    fn service(&mut self, timeout: Duration) -> Result<Option<TransportEvent>, TransportError>;

    /// Pushes every queued datagram onto the wire now.
    fn flush(&mut self) -> Result<(), TransportError>;

    /// Tells the peer we are leaving. No further events are produced.
    fn disconnect(&mut self);

    /// Releases the underlying resources.
    fn close(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct DatagramHeader {
    pub magic: u32,
    pub version: u32,
    pub sequence: u32,
    pub ack: u32,
    pub ack_bitfield: u32,
}

impl DatagramHeader {
    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum DatagramBody {
    Connect { connect_id: u64 },
    Accept { connect_id: u64 },
    Disconnect,
    Ping,
    Ack,
    Payload { channel: u8, order: u32, data: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Datagram {
    pub header: DatagramHeader,
    pub body: DatagramBody,
}

impl Datagram {
    pub fn serialize(&self) -> Result<Vec<u8>, rancor::Error> {
        rkyv::to_bytes::<rancor::Error>(self).map(|aligned| aligned.into_vec())
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, rancor::Error> {
        let mut aligned = AlignedVec::<16>::with_capacity(data.len());
        aligned.extend_from_slice(data);
        rkyv::from_bytes::<Self, rancor::Error>(&aligned)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Listening,
    Connecting,
    Connected,
    Disconnected,
}

pub struct UdpHost {
    socket: UdpSocket,
    remote_addr: Option<SocketAddr>,
    state: PeerState,
    connect_id: u64,
    send_sequence: u32,
    ack_tracker: AckTracker,
    receive_tracker: ReceiveTracker,
    reliable_out: ReliableSender,
    reliable_in: HashMap<u8, ReliableReceiver>,
    events: VecDeque<TransportEvent>,
    ack_owed: bool,
    stats: NetworkStats,
    recv_buffer: [u8; MAX_DATAGRAM_SIZE],
    ping_interval: Duration,
    timeout: LivenessTimeout,
    started: Instant,
    last_send_time: Instant,
    last_receive_time: Instant,
    loss_sim: PacketLossSimulation,
    closed: bool,
}

impl UdpHost {
    fn bind<A: ToSocketAddrs>(addr: A, params: &ConnectionParameters) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        let now = Instant::now();

        Ok(Self {
            socket,
            remote_addr: None,
            state: PeerState::Disconnected,
            connect_id: 0,
            send_sequence: 1,
            ack_tracker: AckTracker::new(256),
            receive_tracker: ReceiveTracker::new(),
            reliable_out: ReliableSender::new(),
            reliable_in: HashMap::new(),
            events: VecDeque::new(),
            ack_owed: false,
            stats: NetworkStats::default(),
            recv_buffer: [0u8; MAX_DATAGRAM_SIZE],
            ping_interval: params.ping_interval(),
            timeout: params.timeout,
            started: now,
            last_send_time: now,
            last_receive_time: now,
            loss_sim: PacketLossSimulation::default(),
            closed: false,
        })
    }

    /// Binds an ephemeral local port and starts the handshake with
    /// `params.host:params.port`. A `Connect` event follows once the peer accepts.
    pub fn connect(params: &ConnectionParameters) -> Result<Self, TransportError> {
        let target = format!("{}:{}", params.host, params.port);
        let remote = target
            .to_socket_addrs()
            .map_err(|_| TransportError::Resolve(target.clone()))?
            .next()
            .ok_or_else(|| TransportError::Resolve(target.clone()))?;

        let local = if remote.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };

        let mut host = Self::bind(local, params)?;
        host.remote_addr = Some(remote);
        host.state = PeerState::Connecting;
        host.connect_id = rand::random();
        host.send_body(DatagramBody::Connect {
            connect_id: host.connect_id,
        })?;

        log::debug!("Handshake started with {}", remote);
        Ok(host)
    }

    /// Binds `addr` and waits for the first peer to connect.
    pub fn listen<A: ToSocketAddrs>(
        addr: A,
        params: &ConnectionParameters,
    ) -> Result<Self, TransportError> {
        let mut host = Self::bind(addr, params)?;
        host.state = PeerState::Listening;
        Ok(host)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn set_packet_loss(&mut self, sim: PacketLossSimulation) {
        self.loss_sim = sim;
    }

    fn send_body(&mut self, body: DatagramBody) -> Result<u32, TransportError> {
        let addr = self.remote_addr.ok_or(TransportError::NotConnected)?;

        let sequence = self.send_sequence;
        self.send_sequence = self.send_sequence.wrapping_add(1);
        let (ack, ack_bitfield) = self.receive_tracker.ack_data();

        let datagram = Datagram {
            header: DatagramHeader {
                magic: PROTOCOL_MAGIC,
                version: PROTOCOL_VERSION,
                sequence,
                ack,
                ack_bitfield,
            },
            body,
        };
        let bytes = datagram.serialize().map_err(TransportError::Encode)?;
        if bytes.len() > MAX_DATAGRAM_SIZE {
            return Err(TransportError::PayloadTooLarge(bytes.len()));
        }

        self.ack_tracker.track(sequence);
        self.ack_owed = false;
        self.last_send_time = Instant::now();
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += bytes.len() as u64;

        if self.loss_sim.should_drop() {
            self.stats.packets_dropped += 1;
            return Ok(sequence);
        }

        match self.socket.send_to(&bytes, addr) {
            Ok(_) => Ok(sequence),
            // Buffer pressure behaves like loss; reliable data is resent.
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(sequence),
            Err(e) => Err(e.into()),
        }
    }

    fn send_due_reliable(&mut self) -> Result<(), TransportError> {
        if self.state != PeerState::Connected {
            return Ok(());
        }

        let rto = self.ack_tracker.retransmit_timeout();
        let due: Vec<(u32, u8, Vec<u8>, bool)> = self
            .reliable_out
            .due(rto)
            .map(|m| (m.order, m.channel, m.data.clone(), m.transmissions > 0))
            .collect();

        for (order, channel, data, resend) in due {
            let sequence = self.send_body(DatagramBody::Payload {
                channel,
                order,
                data,
            })?;
            if resend {
                self.stats.retransmissions += 1;
            }
            self.reliable_out.mark_sent(order, sequence);
        }

        Ok(())
    }

    fn update_timers(&mut self) -> Result<(), TransportError> {
        match self.state {
            PeerState::Connecting => {
                if self.started.elapsed() >= self.timeout.maximum() {
                    log::debug!("Handshake timed out");
                    self.state = PeerState::Disconnected;
                    self.events.push_back(TransportEvent::Timeout);
                } else if self.last_send_time.elapsed() >= CONNECT_RETRY {
                    self.send_body(DatagramBody::Connect {
                        connect_id: self.connect_id,
                    })?;
                }
            }
            PeerState::Connected => {
                let awaiting_ack = self.reliable_out.pending() > 0;
                if self
                    .timeout
                    .is_expired(self.last_receive_time.elapsed(), awaiting_ack)
                {
                    log::debug!(
                        "Peer silent for {:?} with {} unacked messages",
                        self.last_receive_time.elapsed(),
                        self.reliable_out.pending()
                    );
                    self.state = PeerState::Disconnected;
                    self.events.push_back(TransportEvent::Timeout);
                    return Ok(());
                }

                self.send_due_reliable()?;

                if self.last_send_time.elapsed() >= self.ping_interval {
                    self.send_body(DatagramBody::Ping)?;
                }
            }
            PeerState::Listening | PeerState::Disconnected => {}
        }

        Ok(())
    }

    fn receive_one(&mut self, wait: Duration) -> Result<(), TransportError> {
        self.socket.set_read_timeout(Some(wait.max(Duration::from_millis(1))))?;

        let (size, addr) = match self.socket.recv_from(&mut self.recv_buffer) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Ok(());
            }
            // ICMP port unreachable surfaces here on some platforms; liveness handles it.
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let datagram = match Datagram::deserialize(&self.recv_buffer[..size]) {
            Ok(datagram) if datagram.header.is_valid() => datagram,
            Ok(_) => {
                log::debug!("Ignoring datagram with foreign header from {}", addr);
                return Ok(());
            }
            Err(e) => {
                log::debug!("Ignoring malformed datagram from {}: {}", addr, e);
                return Ok(());
            }
        };

        self.handle_datagram(datagram, addr, size)
    }

    fn handle_datagram(
        &mut self,
        datagram: Datagram,
        addr: SocketAddr,
        size: usize,
    ) -> Result<(), TransportError> {
        if self.state == PeerState::Listening {
            let DatagramBody::Connect { connect_id } = datagram.body else {
                return Ok(());
            };
            log::info!("Accepted peer {}", addr);
            self.remote_addr = Some(addr);
            self.connect_id = connect_id;
            self.state = PeerState::Connected;
            self.last_receive_time = Instant::now();
            self.events.push_back(TransportEvent::Connect);
        }

        if self.remote_addr != Some(addr) {
            return Ok(());
        }

        if !self.receive_tracker.record(datagram.header.sequence) {
            return Ok(());
        }

        let acked = self
            .ack_tracker
            .process_ack(datagram.header.ack, datagram.header.ack_bitfield);
        if !acked.is_empty() {
            self.reliable_out.acknowledge(&acked);
        }

        self.stats.packets_received += 1;
        self.stats.bytes_received += size as u64;
        self.stats.rtt_ms = self.ack_tracker.srtt();
        self.stats.rtt_variance = self.ack_tracker.rtt_var();
        self.last_receive_time = Instant::now();

        match datagram.body {
            DatagramBody::Connect { connect_id } => {
                if connect_id == self.connect_id && self.state == PeerState::Connected {
                    self.send_body(DatagramBody::Accept { connect_id })?;
                }
            }
            DatagramBody::Accept { connect_id } => {
                if self.state == PeerState::Connecting && connect_id == self.connect_id {
                    self.state = PeerState::Connected;
                    self.events.push_back(TransportEvent::Connect);
                }
            }
            DatagramBody::Disconnect => {
                if self.state == PeerState::Connected || self.state == PeerState::Connecting {
                    self.state = PeerState::Disconnected;
                    self.events.push_back(TransportEvent::Disconnect);
                }
            }
            DatagramBody::Ping => self.ack_owed = true,
            DatagramBody::Ack => {}
            DatagramBody::Payload {
                channel,
                order,
                data,
            } => {
                self.ack_owed = true;
                if self.state != PeerState::Connected {
                    return Ok(());
                }
                let ready = self.reliable_in.entry(channel).or_default().accept(order, data);
                self.events.extend(
                    ready
                        .into_iter()
                        .map(|data| TransportEvent::Receive { channel, data }),
                );
            }
        }

        Ok(())
    }
}

impl Transport for UdpHost {
    fn send(&mut self, channel: u8, data: &[u8]) -> Result<(), TransportError> {
        if self.state != PeerState::Connected {
            return Err(TransportError::NotConnected);
        }
        if data.len() > MAX_DATAGRAM_SIZE - 64 {
            return Err(TransportError::PayloadTooLarge(data.len()));
        }
        self.reliable_out.push(channel, data.to_vec());
        Ok(())
    }

    fn check_events(&mut self) -> Option<TransportEvent> {
        self.events.pop_front()
    }

    fn service(&mut self, timeout: Duration) -> Result<Option<TransportEvent>, TransportError> {
        let deadline = Instant::now() + timeout;

        loop {
            self.update_timers()?;
            if let Some(event) = self.events.pop_front() {
                return Ok(Some(event));
            }

            let now = Instant::now();
            if now >= deadline || self.state == PeerState::Disconnected {
                break;
            }
            self.receive_one(deadline - now)?;

            if let Some(event) = self.events.pop_front() {
                return Ok(Some(event));
            }
        }

        if self.ack_owed && self.state == PeerState::Connected {
            self.send_body(DatagramBody::Ack)?;
        }

        Ok(None)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.send_due_reliable()?;
        if self.ack_owed && self.state == PeerState::Connected {
            self.send_body(DatagramBody::Ack)?;
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        if matches!(self.state, PeerState::Connected | PeerState::Connecting) {
            for _ in 0..DISCONNECT_COPIES {
                if let Err(e) = self.send_body(DatagramBody::Disconnect) {
                    log::debug!("Failed to send disconnect: {}", e);
                    break;
                }
            }
        }
        self.state = PeerState::Disconnected;
        self.events.clear();
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.disconnect();
        log::debug!(
            "Transport closed: {} sent, {} received, {} retransmitted, rtt {:.1} ms",
            self.stats.packets_sent,
            self.stats.packets_received,
            self.stats.retransmissions,
            self.stats.rtt_ms
        );
    }
}
