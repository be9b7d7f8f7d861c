use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use bytes::BufMut;
use crate::buf_ext::{BufExt, BufMutExt};
use crate::error::AnnounceError;

/// The transport a packed address refers to. It is encoded in the address family byte.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AddrKind {
    Udp,
    Tcp,
}

const FAMILY_UDP_V4: u8 = 2;
const FAMILY_UDP_V6: u8 = 10;
const FAMILY_TCP_V4: u8 = 130;
const FAMILY_TCP_V6: u8 = 138;

/// family byte + IPv6 address + port
pub const PACKED_IP_PORT_MAX_SIZE: usize = 1 + 16 + 2;

pub fn packed_len(addr: &SocketAddr) -> usize {
    match addr {
        SocketAddr::V4(_) => 1 + 4 + 2,
        SocketAddr::V6(_) => 1 + 16 + 2,
    }
}

/// Packed layout (all numbers BE):
/// ```ascii
/// 0: address family (u8): 2 = UDP/IPv4, 10 = UDP/IPv6, 130 = TCP/IPv4, 138 = TCP/IPv6
/// 1: IP address (4 or 16 bytes)
/// *: port (u16)
/// ```
pub fn put_ip_port(buf: &mut impl BufMut, addr: &SocketAddr, kind: AddrKind) -> Result<usize, AnnounceError> {
    let len = packed_len(addr);
    buf.ensure_remaining_mut(len)?;

    match addr {
        SocketAddr::V4(data) => {
            buf.put_u8(match kind {
                AddrKind::Udp => FAMILY_UDP_V4,
                AddrKind::Tcp => FAMILY_TCP_V4,
            });
            buf.put_u32(data.ip().to_bits());
            buf.put_u16(data.port());
        }
        SocketAddr::V6(data) => {
            buf.put_u8(match kind {
                AddrKind::Udp => FAMILY_UDP_V6,
                AddrKind::Tcp => FAMILY_TCP_V6,
            });
            buf.put_u128(data.ip().to_bits());
            buf.put_u16(data.port());
        }
    }
    Ok(len)
}

/// Reads a packed address. TCP families are only accepted if `allow_tcp` is set - an
///  announce's own address must be a UDP address, relays are TCP.
pub fn try_get_ip_port(buf: &mut &[u8], allow_tcp: bool) -> Result<(SocketAddr, AddrKind), AnnounceError> {
    let family = buf.checked_get_u8()?;

    let (is_v6, kind) = match family {
        FAMILY_UDP_V4 => (false, AddrKind::Udp),
        FAMILY_UDP_V6 => (true, AddrKind::Udp),
        FAMILY_TCP_V4 if allow_tcp => (false, AddrKind::Tcp),
        FAMILY_TCP_V6 if allow_tcp => (true, AddrKind::Tcp),
        _ => return Err(AnnounceError::Malformed("invalid address family")),
    };

    let addr = if is_v6 {
        let ip = buf.checked_get_u128()?;
        let port = buf.checked_get_u16()?;
        SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::from(ip), port, 0, 0))
    }
    else {
        let ip = buf.checked_get_u32()?;
        let port = buf.checked_get_u16()?;
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::from(ip), port))
    };
    Ok((addr, kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::v4_udp(SocketAddr::from(([1,2,3,4], 33445)), AddrKind::Udp, vec![2, 1,2,3,4, 130,165])]
    #[case::v4_tcp(SocketAddr::from(([1,2,3,4], 443)), AddrKind::Tcp, vec![130, 1,2,3,4, 1,187])]
    #[case::v6_udp(SocketAddr::from(([0,0,0,0,0,0,0,1], 5)), AddrKind::Udp, vec![10, 0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,1, 0,5])]
    #[case::v6_tcp(SocketAddr::from(([0x2001,0xdb8,0,0,0,0,0,2], 7)), AddrKind::Tcp, vec![138, 0x20,0x01,0x0d,0xb8,0,0,0,0,0,0,0,0,0,0,0,2, 0,7])]
    fn test_put_ip_port(#[case] addr: SocketAddr, #[case] kind: AddrKind, #[case] expected: Vec<u8>) {
        let mut storage = [0u8; PACKED_IP_PORT_MAX_SIZE];
        let mut buf: &mut [u8] = &mut storage;
        let len = put_ip_port(&mut buf, &addr, kind).unwrap();

        assert_eq!(len, expected.len());
        assert_eq!(&storage[..len], expected.as_slice());

        let mut read: &[u8] = &storage[..len];
        assert_eq!(try_get_ip_port(&mut read, true), Ok((addr, kind)));
        assert!(read.is_empty());
    }

    #[test]
    fn test_put_ip_port_too_small() {
        let mut storage = [0u8; 6];
        let mut buf: &mut [u8] = &mut storage;
        assert_eq!(
            put_ip_port(&mut buf, &SocketAddr::from(([1,2,3,4], 5)), AddrKind::Udp),
            Err(AnnounceError::BufferTooSmall { needed: 7, available: 6 })
        );
        assert_eq!(storage, [0u8; 6]);
    }

    #[rstest]
    #[case::unknown_family(vec![3, 1,2,3,4, 0,5], true)]
    #[case::tcp_not_allowed(vec![130, 1,2,3,4, 0,5], false)]
    #[case::tcp6_not_allowed(vec![138, 0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,1, 0,5], false)]
    fn test_get_ip_port_malformed(#[case] data: Vec<u8>, #[case] allow_tcp: bool) {
        let mut buf: &[u8] = &data;
        assert!(matches!(try_get_ip_port(&mut buf, allow_tcp), Err(AnnounceError::Malformed(_))));
    }

    #[rstest]
    #[case::empty(vec![])]
    #[case::v4_short(vec![2, 1,2,3,4, 0])]
    #[case::v6_short(vec![10, 0,0,0,0])]
    fn test_get_ip_port_truncated(#[case] data: Vec<u8>) {
        let mut buf: &[u8] = &data;
        assert!(matches!(try_get_ip_port(&mut buf, true), Err(AnnounceError::Truncated { .. })));
    }
}
