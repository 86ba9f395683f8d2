/*! OnionResponse2 packet
*/

use super::*;

use nom::bytes::complete::{tag, take};
use nom::combinator::map_parser;

/** Second onion response packet. It's sent back from the third to the second node from onion chain.

Serialized form:

Length   | Content
-------- | ------
`1`      | `0x8d`
`118`    | `OnionReturn`
variable | Payload

where the first byte of payload is one of `0x84`, `0x86` or `0x88`

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OnionResponse2 {
    /// Return address encrypted by the second node from onion chain
    pub onion_return: OnionReturn,
    /// Announce or data response
    pub payload: Vec<u8>
}

impl FromBytes for OnionResponse2 {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = verify(rest_len, |len| *len > 1 + ONION_RETURN_2_SIZE && *len <= ONION_MAX_PACKET_SIZE)(input)?;
        let (input, _) = tag(&[PacketKind::OnionResponse2 as u8][..])(input)?;
        let (input, onion_return) = map_parser(take(ONION_RETURN_2_SIZE), OnionReturn::from_bytes)(input)?;
        let (input, payload) = inner_onion_response(input)?;
        Ok((input, OnionResponse2 { onion_return, payload: payload.to_vec() }))
    }
}

impl ToBytes for OnionResponse2 {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_cond!(
                self.payload.is_empty() || self.onion_return.payload.len() + NONCEBYTES != ONION_RETURN_2_SIZE,
                |buf| gen_error(buf, 0)
            ) >>
            gen_be_u8!(PacketKind::OnionResponse2 as u8) >>
            gen_call!(|buf, onion_return| OnionReturn::to_bytes(onion_return, buf), &self.onion_return) >>
            gen_slice!(self.payload.as_slice()) >>
            gen_len_limit(ONION_MAX_PACKET_SIZE)
        )
    }
}
