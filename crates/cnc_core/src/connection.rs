//! Reliable packet delivery over an unreliable transport.
//!
//! A [`Connection`] frames application packets with a [`PacketHeader`],
//! keeps them on its [`CommBuffer`] send queue until the peer ACKs them,
//! and re-sends them on a timer. Inbound packets that need an ACK are
//! de-duplicated and delivered strictly in id order; packets that don't
//! are delivered as they arrive.
//!
//! Timing is driven by the caller through `now`, in whatever tick unit the
//! host uses. Nothing here blocks.

use crate::comm_queue::CommBuffer;
use crate::config::CommRules;

/// Size of the framing header in bytes.
pub const HEADER_LEN: usize = 7;

/// Packet kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketCode {
    /// Data the peer must acknowledge.
    DataAck = 0,
    /// Data sent once with no acknowledgement.
    DataNoAck = 1,
    /// Acknowledgement of a `DataAck` packet.
    Ack = 2,
}

impl PacketCode {
    /// Code for a wire byte.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::DataAck),
            1 => Some(Self::DataNoAck),
            2 => Some(Self::Ack),
            _ => None,
        }
    }
}

/// Framing prepended to every packet.
///
/// Layout (little-endian): magic `u16`, code `u8`, packet id `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketHeader {
    /// Identifies packets belonging to this game.
    pub magic: u16,
    /// Packet kind.
    pub code: PacketCode,
    /// Sequential id, counted separately per code.
    pub packet_id: u32,
}

impl PacketHeader {
    /// Header bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..2].copy_from_slice(&self.magic.to_le_bytes());
        out[2] = self.code as u8;
        out[3..].copy_from_slice(&self.packet_id.to_le_bytes());
        out
    }

    /// Parse the header at the front of a packet.
    #[must_use]
    pub fn decode(packet: &[u8]) -> Option<Self> {
        if packet.len() < HEADER_LEN {
            return None;
        }
        Some(Self {
            magic: u16::from_le_bytes([packet[0], packet[1]]),
            code: PacketCode::from_u8(packet[2])?,
            packet_id: u32::from_le_bytes([packet[3], packet[4], packet[5], packet[6]]),
        })
    }
}

/// Where framed packets go.
pub trait Transport {
    /// Transmit one framed packet. Delivery is not guaranteed.
    fn send(&mut self, packet: &[u8]);
}

/// Collects transmitted packets in memory.
#[derive(Debug, Clone, Default)]
pub struct LoopbackTransport {
    /// Packets sent and not yet taken.
    pub outbox: Vec<Vec<u8>>,
}

impl LoopbackTransport {
    /// Create an empty loopback.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything sent so far.
    pub fn drain(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.outbox)
    }
}

impl Transport for LoopbackTransport {
    fn send(&mut self, packet: &[u8]) {
        self.outbox.push(packet.to_vec());
    }
}

/// Connection tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Magic number stamped on and required of every packet.
    pub magic: u16,
    /// Send queue capacity.
    pub send_slots: usize,
    /// Receive queue capacity.
    pub receive_slots: usize,
    /// Largest application payload in bytes.
    pub max_packet_len: usize,
    /// Samples before the response-time average starts decaying.
    pub response_window: u32,
    /// Ticks between retransmissions.
    pub retry_delta: u32,
    /// Transmissions after which the link is considered lost.
    pub max_retries: Option<u32>,
    /// Ticks after the first transmission after which the link is
    /// considered lost.
    pub timeout: Option<u32>,
}

impl From<&CommRules> for ConnectionConfig {
    fn from(rules: &CommRules) -> Self {
        Self {
            magic: rules.magic,
            send_slots: rules.send_slots,
            receive_slots: rules.receive_slots,
            max_packet_len: rules.max_packet_len,
            response_window: rules.response_window,
            retry_delta: rules.retry_delta,
            max_retries: rules.max_retries,
            timeout: rules.timeout,
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::from(&CommRules::default())
    }
}

/// One end of a reliable link.
#[derive(Debug)]
pub struct Connection<T: Transport> {
    config: ConnectionConfig,
    queue: CommBuffer,
    transport: T,
    next_ack_id: u32,
    next_no_ack_id: u32,
    last_seq_id: Option<u32>,
    last_read_id: Option<u32>,
}

impl<T: Transport> Connection<T> {
    /// Create a connection sending through `transport`.
    pub fn new(config: ConnectionConfig, transport: T) -> Self {
        let queue = CommBuffer::with_response_window(
            config.send_slots,
            config.receive_slots,
            config.max_packet_len + HEADER_LEN,
            config.response_window,
        );
        Self {
            config,
            queue,
            transport,
            next_ack_id: 0,
            next_no_ack_id: 0,
            last_seq_id: None,
            last_read_id: None,
        }
    }

    /// Drop all queued packets and restart the id sequences.
    pub fn init(&mut self) {
        self.queue.init();
        self.next_ack_id = 0;
        self.next_no_ack_id = 0;
        self.last_seq_id = None;
        self.last_read_id = None;
    }

    /// The packet queues.
    #[must_use]
    pub const fn queue(&self) -> &CommBuffer {
        &self.queue
    }

    /// The transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Highest id such that every `DataAck` packet up to it has arrived.
    #[must_use]
    pub const fn last_seq_id(&self) -> Option<u32> {
        self.last_seq_id
    }

    /// Frame `data` and queue it for transmission.
    ///
    /// Returns false if the send queue is full or the payload too long.
    pub fn send_packet(&mut self, data: &[u8], ack_required: bool) -> bool {
        let (code, id) = if ack_required {
            (PacketCode::DataAck, self.next_ack_id)
        } else {
            (PacketCode::DataNoAck, self.next_no_ack_id)
        };
        let header = PacketHeader {
            magic: self.config.magic,
            code,
            packet_id: id,
        };
        let mut packet = Vec::with_capacity(HEADER_LEN + data.len());
        packet.extend_from_slice(&header.encode());
        packet.extend_from_slice(data);
        if self.queue.queue_send(&packet).is_none() {
            return false;
        }
        if ack_required {
            self.next_ack_id = self.next_ack_id.wrapping_add(1);
        } else {
            self.next_no_ack_id = self.next_no_ack_id.wrapping_add(1);
        }
        true
    }

    /// Free receive slots.
    fn free_receive_slots(&self) -> usize {
        self.queue.max_receive() - self.queue.num_receive()
    }

    fn expected_id(&self) -> u32 {
        self.last_seq_id.map_or(0, |id| id.wrapping_add(1))
    }

    fn is_queued(&self, id: u32) -> bool {
        self.queue.receive_entries().any(|entry| {
            PacketHeader::decode(entry.buffer())
                .is_some_and(|h| h.code == PacketCode::DataAck && h.packet_id == id)
        })
    }

    /// Handle a packet arriving from the peer.
    ///
    /// Returns true if the packet was accepted, including recognised
    /// resends and ACKs.
    pub fn receive_packet(&mut self, packet: &[u8]) -> bool {
        let Some(header) = PacketHeader::decode(packet) else {
            tracing::debug!(len = packet.len(), "Dropping short packet");
            return false;
        };
        if header.magic != self.config.magic {
            return false;
        }

        match header.code {
            PacketCode::Ack => {
                let found = self.queue.send_entries_mut().find(|entry| {
                    PacketHeader::decode(entry.buffer())
                        .is_some_and(|h| h.code == PacketCode::DataAck && h.packet_id == header.packet_id)
                });
                if let Some(entry) = found {
                    entry.is_ack = true;
                }
                true
            }
            PacketCode::DataNoAck => {
                // Keep the last slot for the packet that advances the sequence.
                if self.free_receive_slots() <= 1 {
                    return false;
                }
                self.queue.queue_receive(packet).is_some()
            }
            PacketCode::DataAck => {
                let id = header.packet_id;
                let is_resend = self.last_seq_id.is_some_and(|last| id <= last) || self.is_queued(id);
                if is_resend {
                    tracing::debug!(packet_id = id, "Duplicate packet dropped");
                } else {
                    if self.free_receive_slots() <= 1 && id != self.expected_id() {
                        return false;
                    }
                    if self.queue.queue_receive(packet).is_none() {
                        return false;
                    }
                    while self.is_queued(self.expected_id()) {
                        self.last_seq_id = Some(self.expected_id());
                    }
                }

                let ack = PacketHeader {
                    magic: self.config.magic,
                    code: PacketCode::Ack,
                    packet_id: id,
                };
                self.transport.send(&ack.encode());
                true
            }
        }
    }

    /// Next packet for the application, header stripped.
    ///
    /// `DataAck` packets come out strictly in id order; `DataNoAck`
    /// packets come out as soon as they are reached.
    pub fn get_packet(&mut self) -> Option<Vec<u8>> {
        let next_read = self.last_read_id.map_or(0, |id| id.wrapping_add(1));
        for index in 0..self.queue.num_receive() {
            let Some(entry) = self.queue.get_receive(index) else {
                continue;
            };
            if entry.is_read {
                continue;
            }
            let Some(header) = PacketHeader::decode(entry.buffer()) else {
                continue;
            };
            let deliver = match header.code {
                PacketCode::DataAck => header.packet_id == next_read,
                _ => true,
            };
            if !deliver {
                continue;
            }
            let payload = entry.buffer()[HEADER_LEN..].to_vec();
            if let Some(entry) = self.queue.get_receive_mut(index) {
                entry.is_read = true;
            }
            if header.code == PacketCode::DataAck {
                self.last_read_id = Some(header.packet_id);
            }
            return Some(payload);
        }
        None
    }

    /// Retransmit and clean up.
    ///
    /// Drops acknowledged sends, transmits new packets, re-sends packets
    /// older than the retry delta, then discards receive entries the
    /// application has finished with.
    ///
    /// Returns false if a packet has exhausted its retries or timed out.
    pub fn service(&mut self, now: u32) -> bool {
        for entry in self.queue.drain_acked_sends() {
            let is_data_ack = PacketHeader::decode(entry.buffer()).is_some_and(|h| h.code == PacketCode::DataAck);
            if is_data_ack {
                self.queue.add_delay(now.wrapping_sub(entry.first_time));
            }
        }

        let mut healthy = true;
        let retry_delta = self.config.retry_delta;
        let (max_retries, timeout) = (self.config.max_retries, self.config.timeout);
        let mut outgoing = Vec::new();
        for entry in self.queue.send_entries_mut() {
            if entry.is_ack {
                continue;
            }
            let is_no_ack = PacketHeader::decode(entry.buffer()).is_some_and(|h| h.code == PacketCode::DataNoAck);
            if entry.send_count == 0 {
                entry.first_time = now;
            } else if now.wrapping_sub(entry.last_time) <= retry_delta {
                continue;
            }
            if max_retries.is_some_and(|max| entry.send_count >= max)
                || timeout.is_some_and(|limit| entry.send_count > 0 && now.wrapping_sub(entry.first_time) > limit)
            {
                healthy = false;
                continue;
            }
            entry.last_time = now;
            entry.send_count += 1;
            outgoing.push(entry.buffer().to_vec());
            if is_no_ack {
                entry.is_ack = true;
            }
        }
        for packet in &outgoing {
            self.transport.send(packet);
        }
        if !healthy {
            tracing::warn!(now, "Connection packet exceeded retry limit");
        }

        let last_seq = self.last_seq_id;
        self.queue.retain_receives(|entry| {
            if !entry.is_read {
                return true;
            }
            match PacketHeader::decode(entry.buffer()) {
                Some(h) if h.code == PacketCode::DataAck => last_seq.map_or(true, |last| h.packet_id > last),
                _ => false,
            }
        });

        healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConnectionConfig {
        ConnectionConfig {
            send_slots: 8,
            receive_slots: 8,
            retry_delta: 10,
            max_retries: Some(5),
            timeout: None,
            ..ConnectionConfig::default()
        }
    }

    fn pair() -> (Connection<LoopbackTransport>, Connection<LoopbackTransport>) {
        (
            Connection::new(config(), LoopbackTransport::new()),
            Connection::new(config(), LoopbackTransport::new()),
        )
    }

    /// Move every packet `from` has transmitted into `to`.
    fn deliver(from: &mut Connection<LoopbackTransport>, to: &mut Connection<LoopbackTransport>) {
        for packet in from.transport_mut().drain() {
            to.receive_packet(&packet);
        }
    }

    #[test]
    fn test_header_round_trip() {
        let header = PacketHeader {
            magic: 0x1234,
            code: PacketCode::Ack,
            packet_id: 77,
        };
        assert_eq!(PacketHeader::decode(&header.encode()), Some(header));
        assert_eq!(PacketHeader::decode(&[0; 3]), None);
    }

    #[test]
    fn test_in_order_delivery_and_ack() {
        let (mut a, mut b) = pair();
        assert!(a.send_packet(b"one", true));
        assert!(a.send_packet(b"two", true));
        a.service(0);
        deliver(&mut a, &mut b);

        assert_eq!(b.get_packet().as_deref(), Some(&b"one"[..]));
        assert_eq!(b.get_packet().as_deref(), Some(&b"two"[..]));
        assert_eq!(b.get_packet(), None);

        deliver(&mut b, &mut a);
        a.service(5);
        assert_eq!(a.queue().num_send(), 0);
    }

    #[test]
    fn test_out_of_order_waits_for_gap() {
        let (mut a, mut b) = pair();
        a.send_packet(b"zero", true);
        a.send_packet(b"one", true);
        a.service(0);
        let mut packets = a.transport_mut().drain();
        packets.reverse();

        b.receive_packet(&packets[0]);
        assert_eq!(b.get_packet(), None);
        assert_eq!(b.last_seq_id(), None);

        b.receive_packet(&packets[1]);
        assert_eq!(b.last_seq_id(), Some(1));
        assert_eq!(b.get_packet().as_deref(), Some(&b"zero"[..]));
        assert_eq!(b.get_packet().as_deref(), Some(&b"one"[..]));
    }

    #[test]
    fn test_duplicates_are_acked_not_queued() {
        let (mut a, mut b) = pair();
        a.send_packet(b"x", true);
        a.service(0);
        let packet = a.transport_mut().drain().remove(0);

        assert!(b.receive_packet(&packet));
        assert!(b.receive_packet(&packet));
        assert_eq!(b.queue().num_receive(), 1);
        assert_eq!(b.transport_mut().drain().len(), 2);
    }

    #[test]
    fn test_resend_after_retry_delta() {
        let (mut a, _) = pair();
        a.send_packet(b"lost", true);
        a.service(0);
        assert_eq!(a.transport_mut().drain().len(), 1);
        a.service(5);
        assert!(a.transport_mut().drain().is_empty());
        a.service(11);
        assert_eq!(a.transport_mut().drain().len(), 1);
    }

    #[test]
    fn test_retry_limit() {
        let (mut a, _) = pair();
        a.send_packet(b"lost", true);
        let mut now = 0;
        let mut healthy = true;
        for _ in 0..10 {
            healthy = a.service(now);
            now += 20;
        }
        assert!(!healthy);
    }

    #[test]
    fn test_no_ack_sent_once() {
        let (mut a, mut b) = pair();
        a.send_packet(b"fire and forget", false);
        a.service(0);
        deliver(&mut a, &mut b);
        a.service(100);
        assert!(a.transport_mut().drain().is_empty());
        assert_eq!(a.queue().num_send(), 0);
        assert_eq!(b.get_packet().as_deref(), Some(&b"fire and forget"[..]));
        assert!(b.transport_mut().drain().is_empty());
    }

    #[test]
    fn test_foreign_magic_ignored() {
        let (_, mut b) = pair();
        let header = PacketHeader {
            magic: 0xBEEF,
            code: PacketCode::DataAck,
            packet_id: 0,
        };
        assert!(!b.receive_packet(&header.encode()));
        assert_eq!(b.queue().num_receive(), 0);
    }

    #[test]
    fn test_last_slot_reserved() {
        let mut b = Connection::new(
            ConnectionConfig {
                receive_slots: 2,
                ..config()
            },
            LoopbackTransport::new(),
        );
        let packet = |id: u32| {
            PacketHeader {
                magic: b.config.magic,
                code: PacketCode::DataAck,
                packet_id: id,
            }
            .encode()
        };
        let (p1, p2, p0) = (packet(1), packet(2), packet(0));
        assert!(b.receive_packet(&p1));
        assert!(!b.receive_packet(&p2));
        assert!(b.receive_packet(&p0));
        assert_eq!(b.last_seq_id(), Some(1));
    }

    #[test]
    fn test_read_entries_cleaned() {
        let (mut a, mut b) = pair();
        a.send_packet(b"a", true);
        a.send_packet(b"b", false);
        a.service(0);
        deliver(&mut a, &mut b);
        while b.get_packet().is_some() {}
        b.service(0);
        assert_eq!(b.queue().num_receive(), 0);
    }
}
