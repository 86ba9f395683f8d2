/*! OnionRequest1 packet with OnionRequest1Payload
*/

use super::*;

/** Request that the first node of onion path sends to the second one. The
layer is encrypted with a temporary key pair generated by the creator of the
path.

Serialized form:

Length   | Content
-------- | ------
`1`      | `0x81`
`24`     | `Nonce`
`32`     | Temporary `PublicKey`
variable | Encrypted `OnionRequest1Payload`
`59`     | `OnionReturn` of the first node

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OnionRequest1 {
    /// Nonce that is shared by all three layers
    pub nonce: Nonce,
    /// Key to compute shared secret for this layer
    pub temporary_pk: PublicKey,
    /// Encrypted `OnionRequest1Payload`
    pub payload: Vec<u8>,
    /// Return address created by the first node
    pub onion_return: OnionReturn
}

impl FromBytes for OnionRequest1 {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = verify(rest_len, |len| *len > 1 + ONION_SEND_2 && *len <= ONION_MAX_PACKET_SIZE)(input)?;
        let (input, _) = tag(&[PacketKind::OnionRequest1 as u8][..])(input)?;
        let (input, nonce) = Nonce::from_bytes(input)?;
        let (input, temporary_pk) = PublicKey::from_bytes(input)?;
        let (input, (payload, onion_return)) = layer_with_return(ONION_RETURN_1_SIZE)(input)?;
        Ok((input, OnionRequest1 {
            nonce,
            temporary_pk,
            payload: payload.to_vec(),
            onion_return
        }))
    }
}

impl ToBytes for OnionRequest1 {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_cond!(
                self.onion_return.payload.len() + NONCEBYTES != ONION_RETURN_1_SIZE ||
                    self.payload.len() <= ONION_SEND_BASE * 2 - PUBLICKEYBYTES,
                |buf| gen_error(buf, 0)
            ) >>
            gen_be_u8!(PacketKind::OnionRequest1 as u8) >>
            gen_slice!(self.nonce.as_ref()) >>
            gen_slice!(self.temporary_pk.as_bytes()) >>
            gen_slice!(self.payload.as_slice()) >>
            gen_call!(|buf, onion_return| OnionReturn::to_bytes(onion_return, buf), &self.onion_return) >>
            gen_len_limit(ONION_MAX_PACKET_SIZE)
        )
    }
}

impl OnionRequest1 {
    /// Decrypt the layer intended for the second node.
    pub fn get_payload(&self, shared_secret: &SalsaBox) -> Result<OnionRequest1Payload, GetPayloadError> {
        open_layer(shared_secret, &self.nonce, &self.payload)
    }
}

/** Decrypted layer of `OnionRequest1`. The second node sends `inner` to
`ip_port` as `OnionRequest2`.

Serialized form:

Length   | Content
-------- | ------
`19`     | UDP `IpPort` of the third node
`32`     | Temporary `PublicKey` for the third layer
variable | Encrypted `OnionRequest2Payload`

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OnionRequest1Payload {
    /// Address of the third node
    pub ip_port: IpPort,
    /// Key to compute shared secret for the third layer
    pub temporary_pk: PublicKey,
    /// Third layer
    pub inner: Vec<u8>
}

impl FromBytes for OnionRequest1Payload {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, ip_port) = IpPort::from_udp_bytes(input)?;
        let (input, temporary_pk) = PublicKey::from_bytes(input)?;
        let (input, inner) = verify(rest, |inner: &[u8]| inner.len() > ONION_SEND_BASE - PUBLICKEYBYTES)(input)?;
        Ok((input, OnionRequest1Payload {
            ip_port,
            temporary_pk,
            inner: inner.to_vec()
        }))
    }
}

impl ToBytes for OnionRequest1Payload {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_cond!(!self.ip_port.is_udp(), |buf| gen_error(buf, 0)) >>
            gen_call!(|buf, ip_port| IpPort::to_bytes(ip_port, buf), &self.ip_port) >>
            gen_slice!(self.temporary_pk.as_bytes()) >>
            gen_slice!(self.inner.as_slice())
        )
    }
}
