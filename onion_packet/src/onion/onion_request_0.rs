/*! OnionRequest0 packet with OnionRequest0Payload
*/

use super::*;

/// Inner payload is forwarded by the first node and should contain two more
/// onion layers.
pub const ONION_REQUEST_0_MIN_INNER_SIZE: usize = ONION_SEND_BASE * 2 - PUBLICKEYBYTES;

/// `OnionRequest1` packet with inner payload from `OnionRequest0Payload` (or
/// from TCP `OnionRequest`) shouldn't be bigger than `ONION_MAX_PACKET_SIZE`.
pub const ONION_REQUEST_0_MAX_INNER_SIZE: usize = ONION_MAX_PACKET_SIZE - (1 + NONCEBYTES + PUBLICKEYBYTES + ONION_RETURN_1_SIZE);

/** Request that the creator of onion path sends to the first node of the
path. The layer is encrypted with the real DHT key pair of the creator since
the first node knows it anyway.

Serialized form:

Length   | Content
-------- | ------
`1`      | `0x80`
`24`     | `Nonce`
`32`     | DHT `PublicKey` of the creator
variable | Encrypted `OnionRequest0Payload`

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OnionRequest0 {
    /// Nonce that is shared by all three layers
    pub nonce: Nonce,
    /// Key to compute shared secret for this layer
    pub temporary_pk: PublicKey,
    /// Encrypted `OnionRequest0Payload`
    pub payload: Vec<u8>
}

impl FromBytes for OnionRequest0 {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = verify(rest_len, |len| *len > 1 + ONION_SEND_1 && *len <= ONION_MAX_PACKET_SIZE)(input)?;
        let (input, _) = tag(&[PacketKind::OnionRequest0 as u8][..])(input)?;
        let (input, nonce) = Nonce::from_bytes(input)?;
        let (input, temporary_pk) = PublicKey::from_bytes(input)?;
        let (input, payload) = rest(input)?;
        Ok((input, OnionRequest0 {
            nonce,
            temporary_pk,
            payload: payload.to_vec()
        }))
    }
}

impl ToBytes for OnionRequest0 {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_cond!(
                NONCEBYTES + PUBLICKEYBYTES + self.payload.len() <= ONION_SEND_1,
                |buf| gen_error(buf, 0)
            ) >>
            gen_be_u8!(PacketKind::OnionRequest0 as u8) >>
            gen_slice!(self.nonce.as_ref()) >>
            gen_slice!(self.temporary_pk.as_bytes()) >>
            gen_slice!(self.payload.as_slice()) >>
            gen_len_limit(ONION_MAX_PACKET_SIZE)
        )
    }
}

impl OnionRequest0 {
    /// Decrypt the layer intended for the first node.
    pub fn get_payload(&self, shared_secret: &SalsaBox) -> Result<OnionRequest0Payload, GetPayloadError> {
        open_layer(shared_secret, &self.nonce, &self.payload)
    }
}

/** Decrypted layer of `OnionRequest0`. The first node sends `inner` to
`ip_port` as `OnionRequest1`.

Serialized form:

Length   | Content
-------- | ------
`19`     | UDP `IpPort` of the second node
`32`     | Temporary `PublicKey` for the second layer
variable | Encrypted `OnionRequest1Payload`

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OnionRequest0Payload {
    /// Address of the second node
    pub ip_port: IpPort,
    /// Key to compute shared secret for the second layer
    pub temporary_pk: PublicKey,
    /// Second layer
    pub inner: Vec<u8>
}

impl FromBytes for OnionRequest0Payload {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, ip_port) = IpPort::from_udp_bytes(input)?;
        let (input, temporary_pk) = PublicKey::from_bytes(input)?;
        let (input, inner) = verify(
            rest,
            |inner: &[u8]| inner.len() > ONION_REQUEST_0_MIN_INNER_SIZE && inner.len() <= ONION_REQUEST_0_MAX_INNER_SIZE
        )(input)?;
        Ok((input, OnionRequest0Payload {
            ip_port,
            temporary_pk,
            inner: inner.to_vec()
        }))
    }
}

impl ToBytes for OnionRequest0Payload {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_cond!(!self.ip_port.is_udp(), |buf| gen_error(buf, 0)) >>
            gen_call!(|buf, ip_port| IpPort::to_bytes(ip_port, buf), &self.ip_port) >>
            gen_slice!(self.temporary_pk.as_bytes()) >>
            gen_slice!(self.inner.as_slice())
        )
    }
}
