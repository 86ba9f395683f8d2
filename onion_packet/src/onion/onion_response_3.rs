/*! OnionResponse3 packet
*/

use super::*;

use nom::bytes::complete::{tag, take};
use nom::combinator::map_parser;

/** Third onion response packet. It's sent back from the destination node to the third node from onion chain.

Serialized form:

Length   | Content
-------- | ------
`1`      | `0x8c`
`177`    | `OnionReturn`
variable | Payload

where the first byte of payload is one of `0x84`, `0x86` or `0x88`

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OnionResponse3 {
    /// Return address encrypted by the third node from onion chain
    pub onion_return: OnionReturn,
    /// Announce or data response
    pub payload: Vec<u8>
}

impl FromBytes for OnionResponse3 {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = verify(rest_len, |len| *len > 1 + ONION_RETURN_3_SIZE && *len <= ONION_MAX_PACKET_SIZE)(input)?;
        let (input, _) = tag(&[PacketKind::OnionResponse3 as u8][..])(input)?;
        let (input, onion_return) = map_parser(take(ONION_RETURN_3_SIZE), OnionReturn::from_bytes)(input)?;
        let (input, payload) = inner_onion_response(input)?;
        Ok((input, OnionResponse3 { onion_return, payload: payload.to_vec() }))
    }
}

impl ToBytes for OnionResponse3 {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_cond!(
                self.payload.is_empty() || self.onion_return.payload.len() + NONCEBYTES != ONION_RETURN_3_SIZE,
                |buf| gen_error(buf, 0)
            ) >>
            gen_be_u8!(PacketKind::OnionResponse3 as u8) >>
            gen_call!(|buf, onion_return| OnionReturn::to_bytes(onion_return, buf), &self.onion_return) >>
            gen_slice!(self.payload.as_slice()) >>
            gen_len_limit(ONION_MAX_PACKET_SIZE)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONION_RETURN_3_PAYLOAD_SIZE: usize = ONION_RETURN_3_SIZE - NONCEBYTES;

    encode_decode_test!(
        onion_response_3_encode_decode,
        OnionResponse3 {
            onion_return: OnionReturn {
                nonce: [42; NONCEBYTES],
                payload: vec![42; ONION_RETURN_3_PAYLOAD_SIZE]
            },
            payload: vec![PacketKind::AnnounceResponseOld as u8, 42, 42]
        }
    );

    #[test]
    fn onion_response_3_empty_payload() {
        let mut bytes = vec![PacketKind::OnionResponse3 as u8];
        bytes.extend_from_slice(&[42; ONION_RETURN_3_SIZE]);
        assert!(OnionResponse3::from_bytes(&bytes).is_err());

        let packet = OnionResponse3 {
            onion_return: OnionReturn {
                nonce: [42; NONCEBYTES],
                payload: vec![42; ONION_RETURN_3_PAYLOAD_SIZE]
            },
            payload: Vec::new()
        };
        let mut buf = [0; ONION_MAX_PACKET_SIZE];
        assert!(packet.to_bytes((&mut buf, 0)).is_err());
    }

    #[test]
    fn onion_response_3_invalid_kind() {
        let mut bytes = vec![PacketKind::OnionResponse3 as u8];
        bytes.extend_from_slice(&[42; ONION_RETURN_3_SIZE]);
        bytes.extend_from_slice(&[PacketKind::AnnounceRequest as u8, 42]);
        assert!(OnionResponse3::from_bytes(&bytes).is_err());
    }

    #[test]
    fn onion_response_3_too_big() {
        let mut bytes = vec![PacketKind::OnionResponse3 as u8];
        bytes.extend_from_slice(&[42; ONION_RETURN_3_SIZE]);
        bytes.push(PacketKind::AnnounceResponseOld as u8);
        bytes.resize(ONION_MAX_PACKET_SIZE, 42);
        assert!(OnionResponse3::from_bytes(&bytes).is_ok());
        bytes.push(42);
        assert!(OnionResponse3::from_bytes(&bytes).is_err());
    }
}
