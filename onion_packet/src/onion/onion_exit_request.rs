/*! OnionExitRequest packet
*/

use super::*;

use nom::bytes::complete::take;
use nom::combinator::map_parser;

/** Request that the third node from onion chain sends to the destination node.

It's an announce or data request with the return address appended. The
destination node should put the `OnionReturn` to the `OnionResponse3` packet
in order to send a response back.

Serialized form:

Length   | Content
-------- | ------
variable | Payload
`177`    | `OnionReturn`

where the first byte of payload is one of `0x83`, `0x85` or `0x87`

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OnionExitRequest {
    /// Announce or data request
    pub payload: Vec<u8>,
    /// Return address encrypted by the third node from onion chain
    pub onion_return: OnionReturn
}

impl FromBytes for OnionExitRequest {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, rest_len) = verify(rest_len, |len| *len > ONION_RETURN_3_SIZE && *len <= ONION_MAX_PACKET_SIZE)(input)?;
        let (input, payload) = map_parser(take(rest_len - ONION_RETURN_3_SIZE), inner_onion_request)(input)?;
        let (input, onion_return) = OnionReturn::from_bytes(input)?;
        Ok((input, OnionExitRequest {
            payload: payload.to_vec(),
            onion_return
        }))
    }
}

impl ToBytes for OnionExitRequest {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_cond!(
                self.payload.is_empty() || self.onion_return.payload.len() + NONCEBYTES != ONION_RETURN_3_SIZE,
                |buf| gen_error(buf, 0)
            ) >>
            gen_slice!(self.payload.as_slice()) >>
            gen_call!(|buf, onion_return| OnionReturn::to_bytes(onion_return, buf), &self.onion_return) >>
            gen_len_limit(ONION_MAX_PACKET_SIZE)
        )
    }
}
