use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Packet types exchanged between the peers of a group. The reliable channel stores the tag as
///  a plain `u8` and does not interpret it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum GroupPacketType {
    Broadcast = 0,
    InviteRequest = 1,
    InviteResponse = 2,
    InviteResponseReject = 3,
    SyncRequest = 4,
    SyncResponse = 5,
    FriendInvite = 6,
    NewPeer = 7,
    Ping = 8,
    MessageAck = 9,
}

impl GroupPacketType {
    /// Lossless packets go through a peer's reliable channel and are acknowledged; all other
    ///  packets are fire-and-forget
    pub fn is_lossless(&self) -> bool {
        matches!(self,
            GroupPacketType::Broadcast
            | GroupPacketType::SyncRequest
            | GroupPacketType::SyncResponse
            | GroupPacketType::NewPeer
            | GroupPacketType::InviteResponse
        )
    }
}
