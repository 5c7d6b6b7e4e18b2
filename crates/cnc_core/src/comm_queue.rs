//! Send and receive packet queues with ACK bookkeeping.
//!
//! A [`CommBuffer`] holds outbound packets until the peer acknowledges them
//! and inbound packets until the application consumes them. Capacities are
//! fixed at construction; a full queue is reported as `None` and the caller
//! retries on a later frame.
//!
//! Timing here is transport timing and differs between peers. Only the FIFO
//! order of each direction matters to the simulation.
//!
//! # Example
//!
//! ```
//! use cnc_core::comm_queue::CommBuffer;
//!
//! let mut queue = CommBuffer::new(4, 4, 64);
//! assert_eq!(queue.queue_send(b"hello"), Some(0));
//! if let Some(entry) = queue.next_send() {
//!     entry.is_ack = true;
//! }
//! assert_eq!(queue.unqueue_next_send().as_deref(), Some(&b"hello"[..]));
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

/// Samples folded into the response-time average before it starts decaying.
pub const RESPONSE_WINDOW: u32 = 256;

/// An outbound packet awaiting acknowledgement.
///
/// Presence in the queue is the "active" state; an entry never exists
/// without a complete packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendEntry {
    /// The peer has acknowledged this packet.
    pub is_ack: bool,
    /// Time of the first transmission.
    pub first_time: u32,
    /// Time of the most recent transmission.
    pub last_time: u32,
    /// Number of transmissions so far.
    pub send_count: u32,
    buffer: Box<[u8]>,
}

impl SendEntry {
    /// Packet bytes.
    #[must_use]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }
}

/// An inbound packet awaiting the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveEntry {
    /// The application has read this packet.
    pub is_read: bool,
    /// An acknowledgement has been sent for this packet.
    pub is_ack: bool,
    buffer: Box<[u8]>,
}

impl ReceiveEntry {
    /// Packet bytes.
    #[must_use]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }
}

/// Running round-trip statistics.
///
/// Until `window` samples have been seen the mean is the plain average.
/// After that each new sample displaces one mean-sized share of the sum,
/// so the average decays toward recent values. The maximum is never reset
/// by the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseStats {
    window: u32,
    num_delay: u32,
    delay_sum: u64,
    mean_delay: u32,
    max_delay: u32,
}

impl ResponseStats {
    /// Create empty statistics with the given window.
    #[must_use]
    pub fn new(window: u32) -> Self {
        Self {
            window: window.max(1),
            num_delay: 0,
            delay_sum: 0,
            mean_delay: 0,
            max_delay: 0,
        }
    }

    /// Fold in one round-trip sample.
    pub fn add_delay(&mut self, delay: u32) {
        if self.num_delay == self.window {
            self.delay_sum = self.delay_sum.saturating_sub(u64::from(self.mean_delay));
            self.delay_sum += u64::from(delay);
            let window = u64::from(self.window);
            self.mean_delay = ((self.delay_sum + window / 2) / window) as u32;
        } else {
            self.num_delay += 1;
            self.delay_sum += u64::from(delay);
            self.mean_delay = (self.delay_sum / u64::from(self.num_delay)) as u32;
        }
        self.max_delay = self.max_delay.max(delay);
    }

    /// Average response time.
    #[must_use]
    pub const fn average(&self) -> u32 {
        self.mean_delay
    }

    /// Largest response time seen.
    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max_delay
    }

    /// Number of samples currently contributing to the average.
    #[must_use]
    pub const fn samples(&self) -> u32 {
        self.num_delay
    }

    /// Forget all samples.
    pub fn reset(&mut self) {
        *self = Self::new(self.window);
    }
}

impl Default for ResponseStats {
    fn default() -> Self {
        Self::new(RESPONSE_WINDOW)
    }
}

/// Fixed-capacity send and receive queues for one connection.
#[derive(Debug, Clone)]
pub struct CommBuffer {
    max_send: usize,
    max_receive: usize,
    max_len: usize,
    send: VecDeque<SendEntry>,
    receive: VecDeque<ReceiveEntry>,
    send_total: u64,
    receive_total: u64,
    stats: ResponseStats,
}

impl CommBuffer {
    /// Create queues holding `num_send` and `num_receive` packets of at most
    /// `max_len` bytes each.
    #[must_use]
    pub fn new(num_send: usize, num_receive: usize, max_len: usize) -> Self {
        Self::with_response_window(num_send, num_receive, max_len, RESPONSE_WINDOW)
    }

    /// Like [`CommBuffer::new`] with a custom response-time window.
    #[must_use]
    pub fn with_response_window(
        num_send: usize,
        num_receive: usize,
        max_len: usize,
        window: u32,
    ) -> Self {
        Self {
            max_send: num_send,
            max_receive: num_receive,
            max_len,
            send: VecDeque::with_capacity(num_send),
            receive: VecDeque::with_capacity(num_receive),
            send_total: 0,
            receive_total: 0,
            stats: ResponseStats::new(window),
        }
    }

    /// Drop every queued packet and reset the counters and statistics.
    pub fn init(&mut self) {
        self.send.clear();
        self.receive.clear();
        self.send_total = 0;
        self.receive_total = 0;
        self.stats.reset();
    }

    // ========================================================================
    // Send queue
    // ========================================================================

    /// Copy a packet onto the send queue.
    ///
    /// Returns the queue position, or `None` if the queue is full or the
    /// packet is longer than the slot size.
    pub fn queue_send(&mut self, buf: &[u8]) -> Option<usize> {
        if self.send.len() >= self.max_send || buf.len() > self.max_len {
            return None;
        }
        self.send.push_back(SendEntry {
            is_ack: false,
            first_time: 0,
            last_time: 0,
            send_count: 0,
            buffer: buf.into(),
        });
        self.send_total += 1;
        Some(self.send.len() - 1)
    }

    /// Remove the oldest send entry if it has been acknowledged.
    pub fn unqueue_next_send(&mut self) -> Option<Vec<u8>> {
        if self.send.front().is_some_and(|entry| entry.is_ack) {
            self.send.pop_front().map(|entry| entry.buffer.into_vec())
        } else {
            None
        }
    }

    /// Remove the send entry at a queue position regardless of its state.
    pub fn unqueue_send(&mut self, index: usize) -> Option<Vec<u8>> {
        self.send.remove(index).map(|entry| entry.buffer.into_vec())
    }

    /// Oldest packet not yet acknowledged.
    pub fn next_send(&mut self) -> Option<&mut SendEntry> {
        self.send.iter_mut().find(|entry| !entry.is_ack)
    }

    /// Send entry at a queue position.
    #[must_use]
    pub fn get_send(&self, index: usize) -> Option<&SendEntry> {
        self.send.get(index)
    }

    /// Mutable send entry at a queue position.
    pub fn get_send_mut(&mut self, index: usize) -> Option<&mut SendEntry> {
        self.send.get_mut(index)
    }

    /// Iterate send entries oldest first.
    pub fn send_entries(&self) -> impl Iterator<Item = &SendEntry> {
        self.send.iter()
    }

    /// Iterate send entries mutably, oldest first.
    pub fn send_entries_mut(&mut self) -> impl Iterator<Item = &mut SendEntry> {
        self.send.iter_mut()
    }

    /// Drop every acknowledged send entry, returning them oldest first.
    pub fn drain_acked_sends(&mut self) -> Vec<SendEntry> {
        let mut acked = Vec::new();
        let mut kept = VecDeque::with_capacity(self.max_send);
        for entry in self.send.drain(..) {
            if entry.is_ack {
                acked.push(entry);
            } else {
                kept.push_back(entry);
            }
        }
        self.send = kept;
        acked
    }

    /// Number of queued outbound packets.
    #[must_use]
    pub fn num_send(&self) -> usize {
        self.send.len()
    }

    /// Send queue capacity.
    #[must_use]
    pub const fn max_send(&self) -> usize {
        self.max_send
    }

    /// Packets ever queued for sending.
    #[must_use]
    pub const fn send_total(&self) -> u64 {
        self.send_total
    }

    // ========================================================================
    // Receive queue
    // ========================================================================

    /// Copy an inbound packet onto the receive queue.
    pub fn queue_receive(&mut self, buf: &[u8]) -> Option<usize> {
        if self.receive.len() >= self.max_receive || buf.len() > self.max_len {
            return None;
        }
        self.receive.push_back(ReceiveEntry {
            is_read: false,
            is_ack: false,
            buffer: buf.into(),
        });
        self.receive_total += 1;
        Some(self.receive.len() - 1)
    }

    /// Remove the oldest receive entry if the application has read it.
    pub fn unqueue_next_receive(&mut self) -> Option<Vec<u8>> {
        if self.receive.front().is_some_and(|entry| entry.is_read) {
            self.receive.pop_front().map(|entry| entry.buffer.into_vec())
        } else {
            None
        }
    }

    /// Remove the receive entry at a queue position regardless of its state.
    pub fn unqueue_receive(&mut self, index: usize) -> Option<Vec<u8>> {
        self.receive.remove(index).map(|entry| entry.buffer.into_vec())
    }

    /// Oldest packet the application has not read yet.
    pub fn next_receive(&mut self) -> Option<&mut ReceiveEntry> {
        self.receive.iter_mut().find(|entry| !entry.is_read)
    }

    /// Receive entry at a queue position.
    #[must_use]
    pub fn get_receive(&self, index: usize) -> Option<&ReceiveEntry> {
        self.receive.get(index)
    }

    /// Mutable receive entry at a queue position.
    pub fn get_receive_mut(&mut self, index: usize) -> Option<&mut ReceiveEntry> {
        self.receive.get_mut(index)
    }

    /// Iterate receive entries oldest first.
    pub fn receive_entries(&self) -> impl Iterator<Item = &ReceiveEntry> {
        self.receive.iter()
    }

    /// Keep only the receive entries matching the predicate.
    pub fn retain_receives<F>(&mut self, keep: F)
    where
        F: FnMut(&ReceiveEntry) -> bool,
    {
        self.receive.retain(keep);
    }

    /// Number of queued inbound packets.
    #[must_use]
    pub fn num_receive(&self) -> usize {
        self.receive.len()
    }

    /// Receive queue capacity.
    #[must_use]
    pub const fn max_receive(&self) -> usize {
        self.max_receive
    }

    /// Packets ever accepted onto the receive queue.
    #[must_use]
    pub const fn receive_total(&self) -> u64 {
        self.receive_total
    }

    /// Largest packet accepted.
    #[must_use]
    pub const fn max_len(&self) -> usize {
        self.max_len
    }

    // ========================================================================
    // Response time
    // ========================================================================

    /// Fold in one round-trip sample.
    pub fn add_delay(&mut self, delay: u32) {
        self.stats.add_delay(delay);
    }

    /// Average round-trip time.
    #[must_use]
    pub const fn avg_response_time(&self) -> u32 {
        self.stats.average()
    }

    /// Largest round-trip time seen.
    #[must_use]
    pub const fn max_response_time(&self) -> u32 {
        self.stats.max()
    }

    /// Forget all round-trip samples.
    pub fn reset_response_time(&mut self) {
        self.stats.reset();
    }

    /// Round-trip statistics.
    #[must_use]
    pub const fn response_stats(&self) -> &ResponseStats {
        &self.stats
    }
}

/// A [`CommBuffer`] shared between the simulation and a network thread.
///
/// The network thread fills the receive queue and drains the send queue; the
/// simulation thread does the opposite. Each access takes the lock for the
/// duration of one call.
#[derive(Debug, Clone)]
pub struct SharedCommBuffer {
    inner: Arc<Mutex<CommBuffer>>,
}

impl SharedCommBuffer {
    /// Wrap a buffer for sharing.
    #[must_use]
    pub fn new(buffer: CommBuffer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(buffer)),
        }
    }

    /// Lock the buffer for a compound operation.
    pub fn lock(&self) -> MutexGuard<'_, CommBuffer> {
        self.inner.lock()
    }

    /// Queue an outbound packet.
    pub fn queue_send(&self, buf: &[u8]) -> Option<usize> {
        self.inner.lock().queue_send(buf)
    }

    /// Queue an inbound packet.
    pub fn queue_receive(&self, buf: &[u8]) -> Option<usize> {
        self.inner.lock().queue_receive(buf)
    }

    /// Take the oldest unread inbound packet, marking it read and removing it.
    pub fn take_receive(&self) -> Option<Vec<u8>> {
        let mut queue = self.inner.lock();
        let index = queue.receive_entries().position(|entry| !entry.is_read)?;
        queue.unqueue_receive(index)
    }

    /// Take the oldest outbound packet regardless of acknowledgement.
    pub fn take_send(&self) -> Option<Vec<u8>> {
        let mut queue = self.inner.lock();
        if queue.num_send() == 0 {
            return None;
        }
        queue.unqueue_send(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_send_capacity() {
        let mut queue = CommBuffer::new(4, 4, 16);
        for i in 0..4u8 {
            assert_eq!(queue.queue_send(&[i]), Some(usize::from(i)));
        }
        assert_eq!(queue.queue_send(&[4]), None);

        assert_eq!(queue.unqueue_send(0), Some(vec![0]));
        assert_eq!(queue.queue_send(&[4]), Some(3));

        let drained: Vec<Vec<u8>> = (0..4).filter_map(|_| queue.unqueue_send(0)).collect();
        assert_eq!(drained, vec![vec![1], vec![2], vec![3], vec![4]]);
        assert_eq!(queue.send_total(), 5);
    }

    #[test]
    fn test_oversized_packet_rejected() {
        let mut queue = CommBuffer::new(2, 2, 4);
        assert_eq!(queue.queue_send(&[0; 5]), None);
        assert_eq!(queue.queue_receive(&[0; 5]), None);
        assert_eq!(queue.queue_send(&[0; 4]), Some(0));
    }

    #[test]
    fn test_unqueue_next_requires_ack() {
        let mut queue = CommBuffer::new(4, 4, 16);
        queue.queue_send(b"a");
        queue.queue_send(b"b");
        assert_eq!(queue.unqueue_next_send(), None);

        if let Some(entry) = queue.get_send_mut(1) {
            entry.is_ack = true;
        }
        // Oldest is still un-ACKed.
        assert_eq!(queue.unqueue_next_send(), None);
        assert_eq!(queue.next_send().map(|e| e.buffer().to_vec()), Some(b"a".to_vec()));

        if let Some(entry) = queue.next_send() {
            entry.is_ack = true;
        }
        assert_eq!(queue.next_send().map(|e| e.buffer().to_vec()), None);
        assert_eq!(queue.unqueue_next_send(), Some(b"a".to_vec()));
        assert_eq!(queue.unqueue_next_send(), Some(b"b".to_vec()));
        assert_eq!(queue.num_send(), 0);
    }

    #[test]
    fn test_drain_acked_keeps_order() {
        let mut queue = CommBuffer::new(4, 4, 16);
        for byte in [1u8, 2, 3, 4] {
            queue.queue_send(&[byte]);
        }
        for i in [0, 2] {
            if let Some(entry) = queue.get_send_mut(i) {
                entry.is_ack = true;
            }
        }
        let acked = queue.drain_acked_sends();
        assert_eq!(acked.len(), 2);
        assert_eq!(queue.get_send(0).map(SendEntry::buffer), Some(&[2u8][..]));
        assert_eq!(queue.get_send(1).map(SendEntry::buffer), Some(&[4u8][..]));
    }

    #[test]
    fn test_receive_read_flow() {
        let mut queue = CommBuffer::new(2, 2, 16);
        queue.queue_receive(b"x");
        queue.queue_receive(b"y");
        assert_eq!(queue.queue_receive(b"z"), None);

        let entry = queue.next_receive().map(|e| {
            e.is_read = true;
            e.buffer().to_vec()
        });
        assert_eq!(entry, Some(b"x".to_vec()));
        assert_eq!(queue.unqueue_next_receive(), Some(b"x".to_vec()));
        assert_eq!(queue.unqueue_next_receive(), None);
        assert_eq!(queue.receive_total(), 2);
    }

    #[test]
    fn test_response_time_average() {
        let mut queue = CommBuffer::with_response_window(4, 4, 16, 4);
        for delay in [10, 20, 30, 40] {
            queue.add_delay(delay);
        }
        assert_eq!(queue.avg_response_time(), 25);
        assert_eq!(queue.max_response_time(), 40);

        // Window is full: the average now decays toward new samples.
        queue.add_delay(5);
        assert!(queue.avg_response_time() < 25);
        assert_eq!(queue.max_response_time(), 40);

        queue.reset_response_time();
        assert_eq!(queue.avg_response_time(), 0);
        assert_eq!(queue.max_response_time(), 0);
    }

    #[test]
    fn test_default_window_average() {
        let mut stats = ResponseStats::default();
        for delay in [10, 20, 30, 40] {
            stats.add_delay(delay);
        }
        assert_eq!(stats.average(), 25);
        assert_eq!(stats.max(), 40);
        assert_eq!(stats.samples(), 4);
    }

    #[test]
    fn test_init_clears_everything() {
        let mut queue = CommBuffer::new(2, 2, 16);
        queue.queue_send(b"a");
        queue.queue_receive(b"b");
        queue.add_delay(9);
        queue.init();
        assert_eq!(queue.num_send(), 0);
        assert_eq!(queue.num_receive(), 0);
        assert_eq!(queue.send_total(), 0);
        assert_eq!(queue.avg_response_time(), 0);
    }

    #[test]
    fn test_shared_buffer_across_threads() {
        let shared = SharedCommBuffer::new(CommBuffer::new(8, 8, 16));
        let network = shared.clone();
        let handle = std::thread::spawn(move || {
            for i in 0..5u8 {
                while network.queue_receive(&[i]).is_none() {
                    std::thread::yield_now();
                }
            }
        });
        handle.join().expect("network thread panicked");

        let received: Vec<Vec<u8>> = std::iter::from_fn(|| shared.take_receive()).collect();
        assert_eq!(received, (0..5u8).map(|i| vec![i]).collect::<Vec<_>>());
    }

    proptest! {
        #[test]
        fn prop_send_queue_is_fifo(packets in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..16), 0..32)) {
            let mut queue = CommBuffer::new(8, 8, 16);
            let mut expected = std::collections::VecDeque::new();
            for packet in &packets {
                if queue.queue_send(packet).is_some() {
                    expected.push_back(packet.clone());
                } else {
                    prop_assert_eq!(queue.num_send(), 8);
                    prop_assert_eq!(queue.unqueue_send(0), expected.pop_front());
                    prop_assert!(queue.queue_send(packet).is_some());
                    expected.push_back(packet.clone());
                }
            }
            while let Some(out) = queue.unqueue_send(0) {
                prop_assert_eq!(Some(out), expected.pop_front());
            }
            prop_assert!(expected.is_empty());
        }
    }
}
