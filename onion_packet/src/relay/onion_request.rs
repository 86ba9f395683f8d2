/*! OnionRequest packet
*/

use super::*;

use onion_binary_io::*;
use onion_crypto::*;
use crate::ip_port::*;
use crate::onion::{
    ONION_MAX_PACKET_SIZE,
    ONION_REQUEST_0_MIN_INNER_SIZE,
    ONION_REQUEST_0_MAX_INNER_SIZE,
};

use nom::bytes::complete::tag;
use nom::combinator::{rest, verify};

/** Sent by client to TCP relay.
The relay acts as the first node of onion path: it packs payload from this
request to `OnionRequest1` packet and sends it to UDP socket. Return address
from `OnionRequest1` will contain TCP address so that when the relay gets
`OnionResponse1` it will know that this response should be delivered to the
TCP client connected to it.

Serialized form:

Length      | Content
----------- | ------
`1`         | `0x08`
`24`        | Nonce
`1`         | IpType
`4` or `16` | IPv4 or IPv6 address
`0` or `12` | Padding for IPv4
`2`         | Port
`32`        | PublicKey
variable    | Payload

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OnionRequest {
    /// Nonce that was used for payload encryption
    pub nonce: Nonce,
    /// Address of the second onion node
    pub ip_port: IpPort,
    /// Temporary `PublicKey` for the current encrypted payload
    pub temporary_pk: PublicKey,
    /// Encrypted payload
    pub payload: Vec<u8>
}

impl FromBytes for OnionRequest {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = tag(&[TCP_ONION_REQUEST_KIND][..])(input)?;
        let (input, nonce) = Nonce::from_bytes(input)?;
        let (input, ip_port) = IpPort::from_bytes(input)?;
        let (input, temporary_pk) = PublicKey::from_bytes(input)?;
        let (input, payload) = verify(
            rest,
            |payload: &[u8]| payload.len() > ONION_REQUEST_0_MIN_INNER_SIZE && payload.len() <= ONION_REQUEST_0_MAX_INNER_SIZE
        )(input)?;
        Ok((input, OnionRequest { nonce, ip_port, temporary_pk, payload: payload.to_vec() }))
    }
}

impl ToBytes for OnionRequest {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_cond!(
                self.payload.len() <= ONION_REQUEST_0_MIN_INNER_SIZE || self.payload.len() > ONION_REQUEST_0_MAX_INNER_SIZE,
                |buf| gen_error(buf, 0)
            ) >>
            gen_be_u8!(TCP_ONION_REQUEST_KIND) >>
            gen_slice!(self.nonce.as_ref()) >>
            gen_call!(|buf, ip_port| IpPort::to_bytes(ip_port, buf), &self.ip_port) >>
            gen_slice!(self.temporary_pk.as_bytes()) >>
            gen_slice!(self.payload.as_slice()) >>
            gen_len_limit(ONION_MAX_PACKET_SIZE)
        )
    }
}

#[cfg(test)]
mod tests {
    use rand::thread_rng;

    use super::*;

    encode_decode_test!(
        onion_request_encode_decode,
        OnionRequest {
            nonce: [42; NONCEBYTES],
            ip_port: IpPort {
                protocol: ProtocolType::Udp,
                ip_addr: "5.6.7.8".parse().unwrap(),
                port: 12345,
            },
            temporary_pk: SecretKey::generate(&mut thread_rng()).public_key(),
            payload: vec![42; ONION_REQUEST_0_MIN_INNER_SIZE + 1]
        }
    );

    #[test]
    fn onion_request_payload_size() {
        let mut packet = OnionRequest {
            nonce: [42; NONCEBYTES],
            ip_port: IpPort::from_udp_saddr("5.6.7.8:12345".parse().unwrap()),
            temporary_pk: SecretKey::generate(&mut thread_rng()).public_key(),
            payload: vec![42; ONION_REQUEST_0_MIN_INNER_SIZE]
        };
        let mut buf = [0; ONION_MAX_PACKET_SIZE];
        assert!(packet.to_bytes((&mut buf, 0)).is_err());

        packet.payload = vec![42; ONION_REQUEST_0_MAX_INNER_SIZE];
        let (_, size) = packet.to_bytes((&mut buf, 0)).unwrap();
        assert_eq!(OnionRequest::from_bytes(&buf[..size]).unwrap().1, packet);

        packet.payload.push(42);
        assert!(packet.to_bytes((&mut buf, 0)).is_err());
    }

    #[test]
    fn onion_request_wrong_kind() {
        let packet = OnionRequest {
            nonce: [42; NONCEBYTES],
            ip_port: IpPort::from_udp_saddr("5.6.7.8:12345".parse().unwrap()),
            temporary_pk: SecretKey::generate(&mut thread_rng()).public_key(),
            payload: vec![42; ONION_REQUEST_0_MIN_INNER_SIZE + 1]
        };
        let mut buf = [0; ONION_MAX_PACKET_SIZE];
        let (_, size) = packet.to_bytes((&mut buf, 0)).unwrap();
        buf[0] = 0x09;
        assert!(OnionRequest::from_bytes(&buf[..size]).is_err());
    }
}
