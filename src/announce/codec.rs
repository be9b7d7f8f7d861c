//! Wire codec for announces. All layouts are fixed-order and big-endian:
//!
//! ```ascii
//! Announce:
//!  0: peer public key (32 bytes)
//! 32: address present flag (u8): 0 or 1
//! 33: relay count (u8), at most MAX_ANNOUNCED_TCP_RELAYS
//! 34: packed address (7 or 19 bytes), only if the flag is set
//!  *: relay nodes, each: public key (32 bytes) + packed address (7 or 19 bytes)
//!
//! PublicAnnounce:
//!  0: chat id (32 bytes)
//! 32: Announce
//!
//! Announce list: Announces back to back, without a count prefix
//! ```
//!
//! The input to decoding is untrusted. Decoding checks every length before reading, and a unit
//!  that fails to decode is rejected as a whole.

use bytes::BufMut;
use tracing::{trace, warn};
use crate::announce::ip_port::{packed_len, put_ip_port, try_get_ip_port, AddrKind, PACKED_IP_PORT_MAX_SIZE};
use crate::announce::types::{Announce, AnnounceNode, ChatId, PublicAnnounce, PublicKey, CHAT_ID_SIZE, MAX_ANNOUNCED_TCP_RELAYS, PUBLIC_KEY_SIZE};
use crate::buf_ext::{BufExt, BufMutExt};
use crate::error::AnnounceError;
use crate::safe_converter::{PrecheckedCast, SafeCast};

pub const ANNOUNCE_MIN_SIZE: usize = PUBLIC_KEY_SIZE + 1 + 1;
pub const ANNOUNCE_MAX_SIZE: usize = ANNOUNCE_MIN_SIZE
    + PACKED_IP_PORT_MAX_SIZE
    + MAX_ANNOUNCED_TCP_RELAYS * (PUBLIC_KEY_SIZE + PACKED_IP_PORT_MAX_SIZE);
pub const PUBLIC_ANNOUNCE_MAX_SIZE: usize = CHAT_ID_SIZE + ANNOUNCE_MAX_SIZE;

/// The number of bytes `encode_announce` writes for an announce
pub fn encoded_len(announce: &Announce) -> usize {
    ANNOUNCE_MIN_SIZE
        + announce.addr.as_ref().map(packed_len).unwrap_or(0)
        + announce.tcp_relays.iter()
            .map(|relay| PUBLIC_KEY_SIZE + packed_len(&relay.addr))
            .sum::<usize>()
}

/// Writes an announce to the start of `buf`, returning the number of bytes written. Nothing is
///  written if the announce does not fit.
pub fn encode_announce(buf: &mut [u8], announce: &Announce) -> Result<usize, AnnounceError> {
    if announce.tcp_relays.len() > MAX_ANNOUNCED_TCP_RELAYS {
        return Err(AnnounceError::RelayCountExceeded(announce.tcp_relays.len()));
    }

    let len = encoded_len(announce);
    let mut w: &mut [u8] = buf;
    w.ensure_remaining_mut(len)?;

    w.put_slice(&announce.peer_public_key.0);
    w.put_u8(announce.addr.is_some() as u8);
    w.put_u8(announce.tcp_relays.len().prechecked_cast());

    if let Some(addr) = &announce.addr {
        put_ip_port(&mut w, addr, AddrKind::Udp)?;
    }
    for relay in &announce.tcp_relays {
        w.put_slice(&relay.public_key.0);
        put_ip_port(&mut w, &relay.addr, AddrKind::Tcp)?;
    }

    Ok(len)
}

/// Reads an announce from the start of `data`, returning it together with the number of bytes
///  consumed. Trailing data is left alone.
pub fn decode_announce(data: &[u8]) -> Result<(Announce, usize), AnnounceError> {
    if data.len() < ANNOUNCE_MIN_SIZE {
        return Err(AnnounceError::Truncated { needed: ANNOUNCE_MIN_SIZE, available: data.len() });
    }

    let mut buf = data;
    let peer_public_key = PublicKey(buf.checked_get_array()?);
    let addr_flag = buf.checked_get_u8()?;
    let relay_count: usize = buf.checked_get_u8()?.safe_cast();

    if relay_count > MAX_ANNOUNCED_TCP_RELAYS {
        return Err(AnnounceError::RelayCountExceeded(relay_count));
    }

    let addr = match addr_flag {
        0 => None,
        1 => {
            let (addr, _) = try_get_ip_port(&mut buf, false)
                .map_err(|_| AnnounceError::Malformed("address"))?;
            Some(addr)
        }
        _ => return Err(AnnounceError::Malformed("address present flag")),
    };

    let mut tcp_relays = Vec::with_capacity(relay_count);
    for _ in 0..relay_count {
        let public_key = PublicKey(buf.checked_get_array()
            .map_err(|_| AnnounceError::Malformed("relay list"))?);
        let (addr, _) = try_get_ip_port(&mut buf, true)
            .map_err(|_| AnnounceError::Malformed("relay list"))?;
        tcp_relays.push(AnnounceNode { public_key, addr });
    }

    let consumed = data.len() - buf.len();
    Ok((Announce { peer_public_key, addr, tcp_relays }, consumed))
}

pub fn encode_public_announce(buf: &mut [u8], public_announce: &PublicAnnounce) -> Result<usize, AnnounceError> {
    let needed = CHAT_ID_SIZE + encoded_len(&public_announce.announce);
    if buf.len() < needed {
        return Err(AnnounceError::BufferTooSmall { needed, available: buf.len() });
    }

    buf[..CHAT_ID_SIZE].copy_from_slice(&public_announce.chat_id.0);
    let announce_len = encode_announce(&mut buf[CHAT_ID_SIZE..], &public_announce.announce)?;
    Ok(CHAT_ID_SIZE + announce_len)
}

pub fn decode_public_announce(data: &[u8]) -> Result<(PublicAnnounce, usize), AnnounceError> {
    let mut buf = data;
    let chat_id = ChatId(buf.checked_get_array()?);

    let (announce, announce_len) = decode_announce(buf)?;
    Ok((PublicAnnounce { chat_id, announce }, CHAT_ID_SIZE + announce_len))
}

/// Writes announces back to back, returning the total number of bytes written. Nothing is
///  written if the list as a whole does not fit.
pub fn encode_announce_list(buf: &mut [u8], announces: &[Announce]) -> Result<usize, AnnounceError> {
    if announces.is_empty() {
        return Err(AnnounceError::InvalidArgument("empty announce list"));
    }
    if announces.len() > u8::MAX as usize {
        return Err(AnnounceError::InvalidArgument("too many announces for a list"));
    }

    if let Some(announce) = announces.iter().find(|a| a.tcp_relays.len() > MAX_ANNOUNCED_TCP_RELAYS) {
        return Err(AnnounceError::RelayCountExceeded(announce.tcp_relays.len()));
    }
    let total_len = announces.iter()
        .map(encoded_len)
        .sum::<usize>();
    buf.ensure_remaining_mut(total_len)?;

    let mut offset = 0;
    for announce in announces {
        offset += encode_announce(&mut buf[offset..], announce)?;
    }
    Ok(offset)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAnnounceList {
    pub announces: Vec<Announce>,
    pub consumed: usize,
}

/// Reads up to `max_count` announces. Decoding stops at the first announce that fails to
///  decode; the announces read before it are returned, so callers must compare the count with
///  what they expected.
pub fn decode_announce_list(data: &[u8], max_count: usize) -> Result<DecodedAnnounceList, AnnounceError> {
    if max_count == 0 {
        return Err(AnnounceError::InvalidArgument("zero max count"));
    }

    let mut announces = Vec::new();
    let mut offset = 0;
    while announces.len() < max_count && offset < data.len() {
        match decode_announce(&data[offset..]) {
            Ok((announce, len)) => {
                trace!("decoded announce from {:?} ({} bytes)", announce.peer_public_key, len);
                announces.push(announce);
                offset += len;
            }
            Err(e) => {
                warn!("announce list: decoding failed at offset {} of {}: {} - keeping {} announces", offset, data.len(), e, announces.len());
                break;
            }
        }
    }

    Ok(DecodedAnnounceList {
        announces,
        consumed: offset,
    })
}
