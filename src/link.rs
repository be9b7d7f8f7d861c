use async_trait::async_trait;
#[cfg(test)] use mockall::automock;
use std::net::SocketAddr;
use std::sync::Arc;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::sync::RwLock;
use tracing::{debug, trace};
use crate::buf_ext::BufExt;
use crate::channel::packet_type::GroupPacketType;
use crate::channel::reliable_channel::{DeliveredPacket, ReceiveOutcome, ReliableChannel};
use crate::channel::sequence::SequenceNumber;
use crate::config::ChannelConfig;
use crate::error::{ChannelError, LinkError};
use crate::mono_time::MonoClock;

/// packet type and sequence number
pub const LOSSLESS_HEADER_LEN: usize = 9;
pub const ACK_PACKET_LEN: usize = 9;

/// Abstraction for putting a packet on the wire, introduced to facilitate mocking the I/O part
///  away for testing
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PacketSender: Send + Sync + 'static {
    async fn send_packet(&self, to: SocketAddr, packet: &[u8]);
}

pub fn encode_lossless(packet_type: u8, sequence: SequenceNumber, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(LOSSLESS_HEADER_LEN + payload.len());
    buf.put_u8(packet_type);
    buf.put_u64(sequence.to_raw());
    buf.put_slice(payload);
    buf.freeze()
}

pub fn encode_ack(sequence: SequenceNumber) -> [u8; ACK_PACKET_LEN] {
    let mut result = [0u8; ACK_PACKET_LEN];
    let mut buf: &mut [u8] = &mut result;
    buf.put_u8(GroupPacketType::MessageAck.into());
    buf.put_u64(sequence.to_raw());
    result
}

fn get_sequence(buf: &mut &[u8], total_len: usize) -> Result<SequenceNumber, LinkError> {
    let raw = buf.checked_get_u64()
        .map_err(|_| LinkError::Truncated { needed: LOSSLESS_HEADER_LEN, available: total_len })?;
    Ok(SequenceNumber::from_raw(raw))
}

/// Glue between a peer's [ReliableChannel] and the network: frames outgoing packets, parses
///  incoming ones, acknowledges received packets and retransmits unacknowledged ones.
///
/// The channel is guarded as a whole, so sequence assignment and the send window update happen
///  atomically. Packets are put on the wire after the lock is released.
pub struct PeerLink {
    peer_addr: SocketAddr,
    channel: Arc<RwLock<ReliableChannel>>,
    sender: Arc<dyn PacketSender>,
    clock: Arc<dyn MonoClock>,
}

impl PeerLink {
    pub fn new(config: Arc<ChannelConfig>, peer_addr: SocketAddr, sender: Arc<dyn PacketSender>, clock: Arc<dyn MonoClock>) -> PeerLink {
        PeerLink {
            peer_addr,
            channel: Arc::new(RwLock::new(ReliableChannel::new(config))),
            sender,
            clock,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Sends a lossless packet, returning its sequence number. Fails without sending anything
    ///  if the send window is full.
    pub async fn send(&self, packet_type: GroupPacketType, payload: Bytes) -> Result<SequenceNumber, LinkError> {
        if !packet_type.is_lossless() {
            return Err(LinkError::NotLossless(packet_type));
        }

        let packet_type: u8 = packet_type.into();
        let sequence = self.channel.write().await
            .enqueue_send(self.clock.now_millis(), payload.clone(), packet_type)?;

        trace!("sending packet #{} to {:?}", sequence, self.peer_addr);
        self.sender.send_packet(self.peer_addr, &encode_lossless(packet_type, sequence, &payload)).await;
        Ok(sequence)
    }

    /// Handles a packet received from the peer, returning the packets that became deliverable
    ///  in sequence order.
    ///
    /// Every accepted packet is acknowledged, including duplicates. A packet outside the receive
    ///  window is dropped without acknowledgement.
    pub async fn on_packet(&self, packet: &[u8]) -> Result<Vec<DeliveredPacket>, LinkError> {
        let mut buf = packet;
        if !buf.has_remaining() {
            return Err(LinkError::Truncated { needed: 1, available: 0 });
        }

        let raw_type = buf.get_u8();
        let packet_type = GroupPacketType::try_from(raw_type)
            .map_err(|_| LinkError::UnknownPacketType(raw_type))?;

        if packet_type == GroupPacketType::MessageAck {
            let sequence = get_sequence(&mut buf, packet.len())?;
            self.on_ack(sequence).await;
            return Ok(vec![]);
        }
        if !packet_type.is_lossless() {
            return Err(LinkError::NotLossless(packet_type));
        }

        let sequence = get_sequence(&mut buf, packet.len())?;
        let payload = Bytes::copy_from_slice(buf);

        let outcome = self.channel.write().await
            .on_receive(self.clock.now_millis(), sequence, payload, raw_type)?;

        self.sender.send_packet(self.peer_addr, &encode_ack(sequence)).await;

        match outcome {
            ReceiveOutcome::Deliverable(delivered) => Ok(delivered),
            ReceiveOutcome::Buffered | ReceiveOutcome::Duplicate => Ok(vec![]),
        }
    }

    async fn on_ack(&self, sequence: SequenceNumber) {
        match self.channel.write().await.on_ack(sequence) {
            Ok(()) => {}
            Err(ChannelError::UnknownSequence(_)) => trace!("ignoring ack for #{} from {:?}", sequence, self.peer_addr),
            Err(e) => debug!("ack for #{} from {:?} failed: {}", sequence, self.peer_addr, e),
        }
    }

    /// Retransmits all packets that are due, returning their number. This is intended to be
    ///  called periodically, at a fraction of the resend interval.
    pub async fn resend_due(&self) -> usize {
        let due = self.channel.write().await
            .due_for_resend(self.clock.now_millis());

        for slot in &due {
            trace!("resending packet #{} to {:?}", slot.sequence, self.peer_addr);
            self.sender.send_packet(self.peer_addr, &encode_lossless(slot.packet_type, slot.sequence, &slot.payload)).await;
        }
        due.len()
    }

    /// Drops all buffered packets in both directions, e.g. when the peer leaves the group
    pub async fn clear(&self) {
        debug!("clearing link to {:?}", self.peer_addr);
        self.channel.write().await.clear();
    }

    pub async fn outstanding_count(&self) -> usize {
        self.channel.read().await.outstanding_count()
    }

    pub async fn pending_receive_count(&self) -> usize {
        self.channel.read().await.pending_receive_count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;
    use super::*;
    use rstest::rstest;
    use tokio::runtime::Builder;
    use crate::mono_time::MockMonoClock;

    const PEER: ([u8; 4], u16) = ([10, 0, 0, 2], 33445);

    fn peer_addr() -> SocketAddr {
        SocketAddr::from(PEER)
    }

    fn config() -> Arc<ChannelConfig> {
        Arc::new(ChannelConfig {
            window_size: 4,
            resend_interval: Duration::from_millis(100),
        })
    }

    fn clock(now: Arc<AtomicU64>) -> Arc<dyn MonoClock> {
        let mut clock = MockMonoClock::new();
        clock.expect_now_millis()
            .returning(move || now.load(Ordering::SeqCst));
        Arc::new(clock)
    }

    fn expect_sent(sender: &mut MockPacketSender, expected: Vec<u8>, times: usize) {
        sender.expect_send_packet()
            .withf(move |to, packet| *to == peer_addr() && packet.to_vec() == expected)
            .times(times)
            .return_const(());
    }

    fn link(sender: MockPacketSender, now: Arc<AtomicU64>) -> PeerLink {
        PeerLink::new(config(), peer_addr(), Arc::new(sender), clock(now))
    }

    fn run(f: impl std::future::Future<Output = ()>) {
        let rt = Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build().unwrap();
        rt.block_on(f);
    }

    #[test]
    fn test_encode_lossless() {
        assert_eq!(
            encode_lossless(7, SequenceNumber::from_raw(0x0102), &[9, 8]).as_ref(),
            &[7, 0,0,0,0,0,0,1,2, 9,8]
        );
    }

    #[test]
    fn test_encode_ack() {
        assert_eq!(encode_ack(SequenceNumber::from_raw(5)), [9, 0,0,0,0,0,0,0,5]);
    }

    #[test]
    fn test_send() {
        let mut sender = MockPacketSender::new();
        expect_sent(&mut sender, vec![0, 0,0,0,0,0,0,0,0, 1,2,3], 1);
        expect_sent(&mut sender, vec![5, 0,0,0,0,0,0,0,1, 4], 1);

        let link = link(sender, Arc::new(AtomicU64::new(0)));
        run(async move {
            assert_eq!(link.send(GroupPacketType::Broadcast, Bytes::from_static(&[1, 2, 3])).await, Ok(SequenceNumber::from_raw(0)));
            assert_eq!(link.send(GroupPacketType::SyncResponse, Bytes::from_static(&[4])).await, Ok(SequenceNumber::from_raw(1)));
            assert_eq!(link.outstanding_count().await, 2);
        });
    }

    #[rstest]
    #[case::ping(GroupPacketType::Ping)]
    #[case::invite_request(GroupPacketType::InviteRequest)]
    #[case::ack(GroupPacketType::MessageAck)]
    fn test_send_lossy_type(#[case] packet_type: GroupPacketType) {
        let link = link(MockPacketSender::new(), Arc::new(AtomicU64::new(0)));
        run(async move {
            assert_eq!(link.send(packet_type, Bytes::from_static(&[1])).await, Err(LinkError::NotLossless(packet_type)));
            assert_eq!(link.outstanding_count().await, 0);
        });
    }

    #[test]
    fn test_send_window_full() {
        let mut sender = MockPacketSender::new();
        sender.expect_send_packet()
            .times(4)
            .return_const(());

        let link = link(sender, Arc::new(AtomicU64::new(0)));
        run(async move {
            for _ in 0..4 {
                link.send(GroupPacketType::Broadcast, Bytes::from_static(&[1])).await.unwrap();
            }
            assert_eq!(link.send(GroupPacketType::Broadcast, Bytes::from_static(&[1])).await, Err(LinkError::Channel(ChannelError::WindowFull)));
        });
    }

    #[test]
    fn test_ack_retires_packet() {
        let mut sender = MockPacketSender::new();
        sender.expect_send_packet()
            .times(1)
            .return_const(());

        let link = link(sender, Arc::new(AtomicU64::new(0)));
        run(async move {
            link.send(GroupPacketType::Broadcast, Bytes::from_static(&[1])).await.unwrap();
            assert_eq!(link.on_packet(&encode_ack(SequenceNumber::from_raw(0))).await, Ok(vec![]));
            assert_eq!(link.outstanding_count().await, 0);

            // repeated ack is ignored
            assert_eq!(link.on_packet(&encode_ack(SequenceNumber::from_raw(0))).await, Ok(vec![]));
        });
    }

    #[test]
    fn test_receive_acks_and_delivers() {
        let mut sender = MockPacketSender::new();
        expect_sent(&mut sender, vec![9, 0,0,0,0,0,0,0,1], 1);
        expect_sent(&mut sender, vec![9, 0,0,0,0,0,0,0,0], 2);

        let link = link(sender, Arc::new(AtomicU64::new(0)));
        run(async move {
            assert_eq!(link.on_packet(&[0, 0,0,0,0,0,0,0,1, 22]).await, Ok(vec![]));
            assert_eq!(link.pending_receive_count().await, 1);

            let delivered = link.on_packet(&[7, 0,0,0,0,0,0,0,0, 11]).await.unwrap();
            assert_eq!(delivered, vec![
                DeliveredPacket { sequence: SequenceNumber::from_raw(0), packet_type: 7, payload: Bytes::from_static(&[11]) },
                DeliveredPacket { sequence: SequenceNumber::from_raw(1), packet_type: 0, payload: Bytes::from_static(&[22]) },
            ]);

            // duplicate is acknowledged again, but not delivered
            assert_eq!(link.on_packet(&[7, 0,0,0,0,0,0,0,0, 11]).await, Ok(vec![]));
        });
    }

    #[test]
    fn test_receive_out_of_window_is_not_acked() {
        let link = link(MockPacketSender::new(), Arc::new(AtomicU64::new(0)));
        run(async move {
            assert_eq!(
                link.on_packet(&[0, 0,0,0,0,0,0,0,4, 1]).await,
                Err(LinkError::Channel(ChannelError::SequenceOutOfWindow { sequence: 4, next_expected: 0 }))
            );
        });
    }

    #[rstest]
    #[case::empty(vec![], LinkError::Truncated { needed: 1, available: 0 })]
    #[case::short_header(vec![0, 0,0,0], LinkError::Truncated { needed: 9, available: 4 })]
    #[case::short_ack(vec![9, 0,0], LinkError::Truncated { needed: 9, available: 3 })]
    #[case::unknown_type(vec![10, 0,0,0,0,0,0,0,0, 1], LinkError::UnknownPacketType(10))]
    #[case::lossy_type(vec![8, 0,0,0,0,0,0,0,0, 1], LinkError::NotLossless(GroupPacketType::Ping))]
    #[case::empty_payload(vec![0, 0,0,0,0,0,0,0,0], LinkError::Channel(ChannelError::InvalidArgument("empty payload")))]
    fn test_receive_malformed(#[case] packet: Vec<u8>, #[case] expected: LinkError) {
        let link = link(MockPacketSender::new(), Arc::new(AtomicU64::new(0)));
        run(async move {
            assert_eq!(link.on_packet(&packet).await, Err(expected));
            assert_eq!(link.pending_receive_count().await, 0);
        });
    }

    #[test]
    fn test_resend_due() {
        let now = Arc::new(AtomicU64::new(0));

        let mut sender = MockPacketSender::new();
        expect_sent(&mut sender, vec![0, 0,0,0,0,0,0,0,0, 1], 2);
        expect_sent(&mut sender, vec![0, 0,0,0,0,0,0,0,1, 2], 3);

        let link = link(sender, now.clone());
        run(async move {
            link.send(GroupPacketType::Broadcast, Bytes::from_static(&[1])).await.unwrap();
            link.send(GroupPacketType::Broadcast, Bytes::from_static(&[2])).await.unwrap();

            now.store(99, Ordering::SeqCst);
            assert_eq!(link.resend_due().await, 0);

            now.store(100, Ordering::SeqCst);
            assert_eq!(link.resend_due().await, 2);

            link.on_packet(&encode_ack(SequenceNumber::from_raw(0))).await.unwrap();
            now.store(200, Ordering::SeqCst);
            assert_eq!(link.resend_due().await, 1);
        });
    }

    #[test]
    fn test_clear() {
        let mut sender = MockPacketSender::new();
        sender.expect_send_packet()
            .return_const(());

        let now = Arc::new(AtomicU64::new(0));
        let link = link(sender, now.clone());
        run(async move {
            link.send(GroupPacketType::Broadcast, Bytes::from_static(&[1])).await.unwrap();
            link.on_packet(&[0, 0,0,0,0,0,0,0,2, 1]).await.unwrap();

            link.clear().await;
            assert_eq!(link.outstanding_count().await, 0);
            assert_eq!(link.pending_receive_count().await, 0);

            now.store(1000, Ordering::SeqCst);
            assert_eq!(link.resend_due().await, 0);
        });
    }
}
