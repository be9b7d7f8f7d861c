use std::fmt::{Debug, Display, Formatter};
use std::net::SocketAddr;

pub const PUBLIC_KEY_SIZE: usize = 32;
pub const CHAT_ID_SIZE: usize = 32;

/// Maximum number of TCP relays a peer may disclose in a single announce. This is part of the
///  wire format, so it is not configurable.
pub const MAX_ANNOUNCED_TCP_RELAYS: usize = 1;

/// A peer's long-term encryption public key. Opaque to this crate.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PublicKey(pub [u8; PUBLIC_KEY_SIZE]);

/// Public key material identifying a group chat
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ChatId(pub [u8; CHAT_ID_SIZE]);

fn fmt_key_prefix(key: &[u8], f: &mut Formatter<'_>) -> std::fmt::Result {
    for b in &key[..4] {
        write!(f, "{:02x}", b)?;
    }
    write!(f, "..")
}

impl Debug for PublicKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fmt_key_prefix(&self.0, f)
    }
}
impl Display for PublicKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fmt_key_prefix(&self.0, f)
    }
}

impl Debug for ChatId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "chat:")?;
        fmt_key_prefix(&self.0, f)
    }
}
impl Display for ChatId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fmt_key_prefix(&self.0, f)
    }
}

/// A TCP relay through which a peer can be reached if direct contact fails
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AnnounceNode {
    pub public_key: PublicKey,
    pub addr: SocketAddr,
}

/// A peer's self-reported contact information
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Announce {
    pub peer_public_key: PublicKey,
    pub addr: Option<SocketAddr>,
    pub tcp_relays: Vec<AnnounceNode>,
}

impl Announce {
    /// An announce is usable for establishing contact only if it carries an address or at least
    ///  one relay
    pub fn is_valid(&self) -> bool {
        self.addr.is_some() || !self.tcp_relays.is_empty()
    }
}

/// An announce bound to the group it is published for - the unit exchanged during discovery
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PublicAnnounce {
    pub chat_id: ChatId,
    pub announce: Announce,
}

/// An announce as stored locally, together with the (monotonic) time it was received
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PeerAnnounce {
    pub announce: Announce,
    pub received_at: u64,
}
