use std::sync::Arc;
use bytes::Bytes;
use tracing::{debug, trace, warn};
use crate::channel::sequence::SequenceNumber;
use crate::channel::window::{ChannelSlot, SlotWindow};
use crate::config::ChannelConfig;
use crate::error::ChannelError;

/// A packet handed to the application, in sequence order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveredPacket {
    pub sequence: SequenceNumber,
    pub packet_type: u8,
    pub payload: Bytes,
}

impl From<ChannelSlot> for DeliveredPacket {
    fn from(slot: ChannelSlot) -> Self {
        DeliveredPacket {
            sequence: slot.sequence,
            packet_type: slot.packet_type,
            payload: slot.payload,
        }
    }
}

/// Classification of an incoming packet. The sender expects an acknowledgement for all of
///  them - for `Duplicate`, the previous acknowledgement was apparently lost.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// The packet was the next one in sequence. It is the first entry, followed by previously
    ///  buffered packets it unblocked, all in sequence order.
    Deliverable(Vec<DeliveredPacket>),
    /// The packet arrived ahead of a gap and is held back until the gap is filled
    Buffered,
    /// The packet was delivered or buffered before, and must not be processed again
    Duplicate,
}

/// Sequenced, acknowledged delivery between the local node and one peer.
///
/// The send side assigns consecutive sequence numbers and keeps every packet in the send window
///  until the peer acknowledges it, retransmitting on a fixed interval. The receive side delivers
///  packets strictly in sequence, holding back packets that arrive ahead of a gap.
///
/// Both windows have the same fixed capacity, and slots are addressed by `sequence % capacity`.
///  Acknowledgements are per sequence number, not cumulative.
///
/// Both ends start counting at zero, without a handshake. A channel is a single mutable unit:
///  sequence assignment and the corresponding slot write must not be split, so shared access
///  must lock the whole channel.
pub struct ReliableChannel {
    config: Arc<ChannelConfig>,

    next_send: SequenceNumber,
    /// the oldest sequence number that may still be unacknowledged - sends are refused if
    ///  they would be a full window ahead of it
    send_low_water_mark: SequenceNumber,
    send_window: SlotWindow,
    last_resend_sweep: Option<u64>,

    next_expected: SequenceNumber,
    receive_window: SlotWindow,
}

impl ReliableChannel {
    pub fn new(config: Arc<ChannelConfig>) -> ReliableChannel {
        let window_size = config.window_size;
        ReliableChannel {
            config,
            next_send: SequenceNumber::ZERO,
            send_low_water_mark: SequenceNumber::ZERO,
            send_window: SlotWindow::new(window_size),
            last_resend_sweep: None,
            next_expected: SequenceNumber::ZERO,
            receive_window: SlotWindow::new(window_size),
        }
    }

    pub fn window_size(&self) -> u64 {
        self.send_window.capacity()
    }

    pub fn next_send_sequence(&self) -> SequenceNumber {
        self.next_send
    }

    pub fn send_low_water_mark(&self) -> SequenceNumber {
        self.send_low_water_mark
    }

    pub fn next_expected(&self) -> SequenceNumber {
        self.next_expected
    }

    /// number of sent packets awaiting acknowledgement
    pub fn outstanding_count(&self) -> usize {
        self.send_window.len()
    }

    /// number of received packets held back because of a gap
    pub fn pending_receive_count(&self) -> usize {
        self.receive_window.len()
    }

    pub fn last_resend_sweep(&self) -> Option<u64> {
        self.last_resend_sweep
    }

    /// Registers a packet for sending, returning its sequence number. The caller is expected to
    ///  transmit it right away; the channel keeps it for retransmission until it is acknowledged.
    pub fn enqueue_send(&mut self, now: u64, payload: Bytes, packet_type: u8) -> Result<SequenceNumber, ChannelError> {
        if payload.is_empty() {
            return Err(ChannelError::InvalidArgument("empty payload"));
        }

        // sequence numbers are addressed modulo the window size, so a packet a full window
        //  ahead of the oldest unacknowledged one would share its slot
        if self.next_send - self.send_low_water_mark >= self.window_size() {
            debug!("send window full: {} outstanding, oldest unacknowledged is #{}", self.outstanding_count(), self.send_low_water_mark);
            return Err(ChannelError::WindowFull);
        }

        let sequence = self.next_send;
        self.next_send += 1;

        trace!("enqueueing packet #{} of type {} with {} bytes", sequence, packet_type, payload.len());
        let previous = self.send_window.insert(ChannelSlot {
            sequence,
            packet_type,
            payload,
            inserted_at: now,
            last_attempt: None,
        });
        debug_assert!(previous.is_none(), "send window slot for #{} was still occupied", sequence);

        Ok(sequence)
    }

    /// Retires an acknowledged packet. Acknowledgements for packets that are not outstanding
    ///  (acknowledged before, or never sent) are reported but harmless.
    pub fn on_ack(&mut self, sequence: SequenceNumber) -> Result<(), ChannelError> {
        if self.send_window.remove(sequence).is_none() {
            trace!("ack for #{} which is not outstanding", sequence);
            return Err(ChannelError::UnknownSequence(sequence.to_raw()));
        }

        trace!("packet #{} acknowledged", sequence);
        while self.send_low_water_mark < self.next_send && !self.send_window.contains(self.send_low_water_mark) {
            self.send_low_water_mark += 1;
        }
        Ok(())
    }

    /// Returns all outstanding packets whose last transmission is at least the resend interval
    ///  ago, in sequence order, and marks them as transmitted at `now`. The caller must
    ///  retransmit all of them.
    pub fn due_for_resend(&mut self, now: u64) -> Vec<ChannelSlot> {
        let resend_interval = self.config.resend_interval_millis();
        self.last_resend_sweep = Some(now);

        let mut result = Vec::new();
        let mut sequence = self.send_low_water_mark;
        while sequence < self.next_send {
            if let Some(slot) = self.send_window.get_mut(sequence) {
                let last_sent = slot.last_attempt.unwrap_or(slot.inserted_at);
                if now.saturating_sub(last_sent) >= resend_interval {
                    slot.last_attempt = Some(now);
                    result.push(slot.clone());
                }
            }
            sequence += 1;
        }

        if !result.is_empty() {
            debug!("{} of {} outstanding packets due for resend", result.len(), self.outstanding_count());
        }
        result
    }

    /// Classifies an incoming packet, delivering it (and whatever it unblocks) if it is the next
    ///  one in sequence.
    ///
    /// A packet more than a window ahead of the next expected one is rejected: buffering it
    ///  would evict pending data. It must not be acknowledged, so the sender retries later.
    pub fn on_receive(&mut self, now: u64, sequence: SequenceNumber, payload: Bytes, packet_type: u8) -> Result<ReceiveOutcome, ChannelError> {
        if payload.is_empty() {
            return Err(ChannelError::InvalidArgument("empty payload"));
        }

        if sequence < self.next_expected {
            trace!("packet #{} is a duplicate, next expected is #{}", sequence, self.next_expected);
            return Ok(ReceiveOutcome::Duplicate);
        }

        if sequence == self.next_expected {
            let mut delivered = vec![DeliveredPacket { sequence, packet_type, payload }];
            self.next_expected += 1;

            while let Some(slot) = self.receive_window.remove(self.next_expected) {
                delivered.push(slot.into());
                self.next_expected += 1;
            }

            trace!("packet #{} in sequence - delivering {} packets, next expected is #{}", sequence, delivered.len(), self.next_expected);
            return Ok(ReceiveOutcome::Deliverable(delivered));
        }

        if sequence - self.next_expected >= self.window_size() {
            warn!("packet #{} is outside the receive window starting at #{} - dropping", sequence, self.next_expected);
            return Err(ChannelError::SequenceOutOfWindow {
                sequence: sequence.to_raw(),
                next_expected: self.next_expected.to_raw(),
            });
        }

        if self.receive_window.contains(sequence) {
            trace!("packet #{} is already buffered", sequence);
            return Ok(ReceiveOutcome::Duplicate);
        }

        let previous = self.receive_window.insert(ChannelSlot {
            sequence,
            packet_type,
            payload,
            inserted_at: now,
            last_attempt: None,
        });
        if let Some(previous) = previous {
            warn!("receive window slot collision: #{} replaced stale #{} (next expected #{})", sequence, previous.sequence, self.next_expected);
        }

        trace!("packet #{} buffered, waiting for #{}", sequence, self.next_expected);
        Ok(ReceiveOutcome::Buffered)
    }

    /// Releases all buffered packets and resets sequence numbers, e.g. when the peer disconnects
    pub fn clear(&mut self) {
        debug!("clearing channel: {} outstanding, {} pending", self.outstanding_count(), self.pending_receive_count());

        self.send_window.clear();
        self.receive_window.clear();
        self.next_send = SequenceNumber::ZERO;
        self.send_low_water_mark = SequenceNumber::ZERO;
        self.next_expected = SequenceNumber::ZERO;
        self.last_resend_sweep = None;
    }
}
