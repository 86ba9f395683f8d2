//! `IpAddr` with a port number and a transport protocol.

use std::net::{
    IpAddr,
    Ipv4Addr,
    Ipv6Addr,
    SocketAddr,
};

use nom::bytes::complete::take;
use nom::combinator::{map, map_opt, verify};
use nom::number::complete::{be_u16, le_u8};
use nom::sequence::terminated;

use onion_binary_io::*;

/// Size of serialized `IpPort` struct.
pub const SIZE_IPPORT: usize = 19;

/// IPv4 is padded with 12 bytes of zeros so that both IPv4 and IPv6 have the
/// same stored size.
pub const IPV4_PADDING_SIZE: usize = 12;

/// Transport protocol type: `UDP` or `TCP`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ProtocolType {
    /// `UDP` type.
    Udp,
    /// `TCP` type. Used for addresses of clients connected to a TCP relay.
    Tcp,
}

/** `IpAddr` with a port number. IPv4 is padded with 12 bytes of zeros so
that both IPv4 and IPv6 have the same stored size.

Serialized form:

Length      | Content
----------- | ------
`1`         | IpType
`4` or `16` | IPv4 or IPv6 address
`0` or `12` | Padding for IPv4
`2`         | Port

*/
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct IpPort {
    /// Type of protocol
    pub protocol: ProtocolType,
    /// IP address
    pub ip_addr: IpAddr,
    /// Port number
    pub port: u16
}

/// Decode IP Type byte into protocol and address family.
fn ip_type_from_u8(ip_type: u8) -> Option<(ProtocolType, bool)> {
    match ip_type {
        2 => Some((ProtocolType::Udp, true)),
        10 => Some((ProtocolType::Udp, false)),
        130 => Some((ProtocolType::Tcp, true)),
        138 => Some((ProtocolType::Tcp, false)),
        _ => None,
    }
}

impl IpPort {
    /** Get IP Type byte.

    Value | Type
    ----- | ----
    `2`   | UDP IPv4
    `10`  | UDP IPv6
    `130` | TCP IPv4
    `138` | TCP IPv6

    */
    fn ip_type(&self) -> u8 {
        match (self.protocol, self.ip_addr.is_ipv4()) {
            (ProtocolType::Udp, true) => 2,
            (ProtocolType::Udp, false) => 10,
            (ProtocolType::Tcp, true) => 130,
            (ProtocolType::Tcp, false) => 138,
        }
    }

    /// Parse `IpPort` that must have UDP protocol type.
    pub fn from_udp_bytes(input: &[u8]) -> IResult<&[u8], IpPort> {
        verify(IpPort::from_bytes, |ip_port: &IpPort| ip_port.is_udp())(input)
    }

    /// Whether this address can be reached with a UDP socket.
    pub fn is_udp(&self) -> bool {
        self.protocol == ProtocolType::Udp
    }

    /// Create new `IpPort` from `SocketAddr` with UDP type.
    pub fn from_udp_saddr(saddr: SocketAddr) -> IpPort {
        IpPort {
            protocol: ProtocolType::Udp,
            ip_addr: saddr.ip(),
            port: saddr.port()
        }
    }

    /// Create new `IpPort` from `SocketAddr` with TCP type.
    pub fn from_tcp_saddr(saddr: SocketAddr) -> IpPort {
        IpPort {
            protocol: ProtocolType::Tcp,
            ip_addr: saddr.ip(),
            port: saddr.port()
        }
    }

    /// Convert `IpPort` to `SocketAddr`.
    pub fn to_saddr(&self) -> SocketAddr {
        SocketAddr::new(self.ip_addr, self.port)
    }
}

impl FromBytes for IpPort {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, (protocol, is_ipv4)) = map_opt(le_u8, ip_type_from_u8)(input)?;
        let (input, ip_addr) = if is_ipv4 {
            terminated(map(Ipv4Addr::from_bytes, IpAddr::V4), take(IPV4_PADDING_SIZE))(input)?
        } else {
            map(Ipv6Addr::from_bytes, IpAddr::V6)(input)?
        };
        let (input, port) = be_u16(input)?;
        Ok((input, IpPort { protocol, ip_addr, port }))
    }
}

impl ToBytes for IpPort {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_be_u8!(self.ip_type()) >>
            gen_call!(|buf, ip_addr| IpAddr::to_bytes(ip_addr, buf), &self.ip_addr) >>
            gen_cond!(self.ip_addr.is_ipv4(), gen_slice!(&[0; IPV4_PADDING_SIZE])) >>
            gen_be_u16!(self.port)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    encode_decode_test!(
        ip_port_udp_ipv4_encode_decode,
        IpPort {
            protocol: ProtocolType::Udp,
            ip_addr: "5.6.7.8".parse().unwrap(),
            port: 12345
        }
    );

    encode_decode_test!(
        ip_port_tcp_ipv6_encode_decode,
        IpPort {
            protocol: ProtocolType::Tcp,
            ip_addr: "2001:db8::ff00:42:8329".parse().unwrap(),
            port: 12345
        }
    );

    #[test]
    fn ip_port_size_is_fixed() {
        let ipv4 = IpPort::from_udp_saddr("5.6.7.8:12345".parse().unwrap());
        let ipv6 = IpPort::from_tcp_saddr("[2001:db8::1]:12345".parse().unwrap());
        for ip_port in &[ipv4, ipv6] {
            let mut buf = [0; 32];
            let (_, size) = ip_port.to_bytes((&mut buf, 0)).unwrap();
            assert_eq!(size, SIZE_IPPORT);
        }
    }

    #[test]
    fn ip_port_ipv4_layout() {
        let ip_port = IpPort::from_udp_saddr("1.2.3.4:258".parse().unwrap());
        let mut buf = [0; SIZE_IPPORT];
        ip_port.to_bytes((&mut buf, 0)).unwrap();
        let mut expected = [0; SIZE_IPPORT];
        expected[0] = 2;
        expected[1..5].copy_from_slice(&[1, 2, 3, 4]);
        expected[17] = 1;
        expected[18] = 2;
        assert_eq!(buf, expected);
    }

    #[test]
    fn ip_port_unknown_family() {
        let mut buf = [0; SIZE_IPPORT];
        buf[0] = 42;
        assert!(IpPort::from_bytes(&buf).is_err());
        // AF_UNSPEC is not accepted either
        buf[0] = 0;
        assert!(IpPort::from_bytes(&buf).is_err());
    }

    #[test]
    fn ip_port_from_udp_bytes_rejects_tcp() {
        let ip_port = IpPort::from_tcp_saddr("5.6.7.8:12345".parse().unwrap());
        let mut buf = [0; SIZE_IPPORT];
        ip_port.to_bytes((&mut buf, 0)).unwrap();
        assert!(IpPort::from_udp_bytes(&buf).is_err());
        assert_eq!(IpPort::from_bytes(&buf).unwrap().1, ip_port);
    }

    #[test]
    fn ip_port_truncated() {
        let ip_port = IpPort::from_udp_saddr("[2001:db8::1]:12345".parse().unwrap());
        let mut buf = [0; SIZE_IPPORT];
        ip_port.to_bytes((&mut buf, 0)).unwrap();
        assert!(IpPort::from_bytes(&buf[..SIZE_IPPORT - 1]).is_err());
    }

    #[test]
    fn ip_port_saddr() {
        let saddr: SocketAddr = "5.6.7.8:12345".parse().unwrap();
        assert_eq!(IpPort::from_udp_saddr(saddr).to_saddr(), saddr);
        assert!(!IpPort::from_tcp_saddr(saddr).is_udp());
    }
}
