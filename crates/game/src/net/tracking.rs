use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

const SEQUENCE_WRAP_THRESHOLD: u32 = u32::MAX / 2;
const MIN_RETRANSMIT: Duration = Duration::from_millis(100);
const MAX_RETRANSMIT: Duration = Duration::from_millis(2000);

#[inline]
pub fn sequence_greater_than(s1: u32, s2: u32) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_WRAP_THRESHOLD))
        || ((s1 < s2) && (s2 - s1 > SEQUENCE_WRAP_THRESHOLD))
}

#[derive(Debug, Clone)]
struct InFlight {
    sequence: u32,
    send_time: Instant,
    acked: bool,
}

/// Datagrams we sent that the peer has not acknowledged yet, plus the
/// smoothed round trip derived from the ones it has.
#[derive(Debug)]
pub struct AckTracker {
    in_flight: VecDeque<InFlight>,
    max_in_flight: usize,
    srtt: f32,
    rtt_var: f32,
}

impl AckTracker {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            in_flight: VecDeque::with_capacity(max_in_flight),
            max_in_flight,
            srtt: 100.0,
            rtt_var: 50.0,
        }
    }

    pub fn track(&mut self, sequence: u32) {
        while self.in_flight.len() >= self.max_in_flight {
            self.in_flight.pop_front();
        }

        self.in_flight.push_back(InFlight {
            sequence,
            send_time: Instant::now(),
            acked: false,
        });
    }

    /// Marks every tracked datagram covered by `ack`/`ack_bitfield` and
    /// returns their sequences.
    pub fn process_ack(&mut self, ack: u32, ack_bitfield: u32) -> Vec<u32> {
        let now = Instant::now();
        let mut acked = Vec::new();
        let mut samples = Vec::new();

        for entry in self.in_flight.iter_mut().filter(|e| !e.acked) {
            let covered = entry.sequence == ack
                || (sequence_greater_than(ack, entry.sequence) && {
                    let diff = ack.wrapping_sub(entry.sequence);
                    diff <= 32 && ack_bitfield & (1 << (diff - 1)) != 0
                });

            if covered {
                entry.acked = true;
                acked.push(entry.sequence);
                samples.push(now.duration_since(entry.send_time).as_secs_f32() * 1000.0);
            }
        }

        for rtt in samples {
            self.update_rtt(rtt);
        }

        while self.in_flight.front().is_some_and(|e| e.acked) {
            self.in_flight.pop_front();
        }

        acked
    }

    fn update_rtt(&mut self, rtt: f32) {
        const ALPHA: f32 = 0.125;
        const BETA: f32 = 0.25;

        let diff = (rtt - self.srtt).abs();
        self.rtt_var = (1.0 - BETA) * self.rtt_var + BETA * diff;
        self.srtt = (1.0 - ALPHA) * self.srtt + ALPHA * rtt;
    }

    pub fn srtt(&self) -> f32 {
        self.srtt
    }

    pub fn rtt_var(&self) -> f32 {
        self.rtt_var
    }

    pub fn retransmit_timeout(&self) -> Duration {
        let ms = self.srtt + 4.0 * self.rtt_var;
        Duration::from_secs_f32(ms / 1000.0).clamp(MIN_RETRANSMIT, MAX_RETRANSMIT)
    }
}

/// Builds the ack header for datagrams we receive and filters duplicates.
#[derive(Debug)]
pub struct ReceiveTracker {
    last_received: u32,
    received_bitfield: u32,
    recent: VecDeque<u32>,
    max_recent: usize,
}

impl Default for ReceiveTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveTracker {
    pub fn new() -> Self {
        Self {
            last_received: 0,
            received_bitfield: 0,
            recent: VecDeque::with_capacity(128),
            max_recent: 128,
        }
    }

    /// Returns false for a datagram we have already seen.
    pub fn record(&mut self, sequence: u32) -> bool {
        if self.recent.contains(&sequence) {
            return false;
        }

        if self.recent.len() >= self.max_recent {
            self.recent.pop_front();
        }
        self.recent.push_back(sequence);

        if sequence_greater_than(sequence, self.last_received) {
            let diff = sequence.wrapping_sub(self.last_received);
            self.received_bitfield = if diff <= 32 {
                self.received_bitfield.checked_shl(diff).unwrap_or(0) | (1 << (diff - 1))
            } else {
                0
            };
            self.last_received = sequence;
        } else {
            let diff = self.last_received.wrapping_sub(sequence);
            if diff > 0 && diff <= 32 {
                self.received_bitfield |= 1 << (diff - 1);
            }
        }

        true
    }

    pub fn ack_data(&self) -> (u32, u32) {
        (self.last_received, self.received_bitfield)
    }
}

#[derive(Debug, Clone)]
pub struct OutstandingMessage {
    pub order: u32,
    pub channel: u8,
    pub data: Vec<u8>,
    pub last_sent: Option<Instant>,
    pub carried_by: Vec<u32>,
    pub transmissions: u32,
}

/// Reliable messages awaiting acknowledgement, in send order.
#[derive(Debug, Default)]
pub struct ReliableSender {
    next_order: u32,
    outstanding: VecDeque<OutstandingMessage>,
}

impl ReliableSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, channel: u8, data: Vec<u8>) -> u32 {
        let order = self.next_order;
        self.next_order = self.next_order.wrapping_add(1);
        self.outstanding.push_back(OutstandingMessage {
            order,
            channel,
            data,
            last_sent: None,
            carried_by: Vec::new(),
            transmissions: 0,
        });
        order
    }

    /// Messages never sent, or sent longer than `rto` ago without an ack.
    pub fn due(&mut self, rto: Duration) -> impl Iterator<Item = &mut OutstandingMessage> {
        self.outstanding
            .iter_mut()
            .filter(move |m| m.last_sent.is_none_or(|sent| sent.elapsed() >= rto))
    }

    pub fn mark_sent(&mut self, order: u32, datagram_sequence: u32) {
        if let Some(message) = self.outstanding.iter_mut().find(|m| m.order == order) {
            message.carried_by.push(datagram_sequence);
            message.last_sent = Some(Instant::now());
            message.transmissions += 1;
        }
    }

    pub fn acknowledge(&mut self, datagram_sequences: &[u32]) -> usize {
        let before = self.outstanding.len();
        self.outstanding
            .retain(|m| !m.carried_by.iter().any(|s| datagram_sequences.contains(s)));
        before - self.outstanding.len()
    }

    pub fn pending(&self) -> usize {
        self.outstanding.len()
    }
}

/// Reorders reliable messages so each is delivered once, in send order.
#[derive(Debug, Default)]
pub struct ReliableReceiver {
    next_expected: u32,
    buffered: BTreeMap<u32, Vec<u8>>,
}

impl ReliableReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&mut self, order: u32, data: Vec<u8>) -> Vec<Vec<u8>> {
        if order != self.next_expected && !sequence_greater_than(order, self.next_expected) {
            return Vec::new();
        }

        self.buffered.entry(order).or_insert(data);

        let mut ready = Vec::new();
        while let Some(data) = self.buffered.remove(&self.next_expected) {
            ready.push(data);
            self.next_expected = self.next_expected.wrapping_add(1);
        }
        ready
    }

    pub fn buffered(&self) -> usize {
        self.buffered.len()
    }
}
