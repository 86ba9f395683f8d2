/*! OnionRequest2 packet with OnionRequest2Payload
*/

use super::*;

/** Request that the second node of onion path sends to the third one. This
is the last layer, its payload tells the third node where the destination is.

Serialized form:

Length   | Content
-------- | ------
`1`      | `0x82`
`24`     | `Nonce`
`32`     | Temporary `PublicKey`
variable | Encrypted `OnionRequest2Payload`
`118`    | `OnionReturn` of the second node

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OnionRequest2 {
    /// Nonce that is shared by all three layers
    pub nonce: Nonce,
    /// Key to compute shared secret for this layer
    pub temporary_pk: PublicKey,
    /// Encrypted `OnionRequest2Payload`
    pub payload: Vec<u8>,
    /// Return address created by the second node
    pub onion_return: OnionReturn
}

impl FromBytes for OnionRequest2 {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = verify(rest_len, |len| *len > 1 + ONION_SEND_3 && *len <= ONION_MAX_PACKET_SIZE)(input)?;
        let (input, _) = tag(&[PacketKind::OnionRequest2 as u8][..])(input)?;
        let (input, nonce) = Nonce::from_bytes(input)?;
        let (input, temporary_pk) = PublicKey::from_bytes(input)?;
        let (input, (payload, onion_return)) = layer_with_return(ONION_RETURN_2_SIZE)(input)?;
        Ok((input, OnionRequest2 {
            nonce,
            temporary_pk,
            payload: payload.to_vec(),
            onion_return
        }))
    }
}

impl ToBytes for OnionRequest2 {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_cond!(
                self.onion_return.payload.len() + NONCEBYTES != ONION_RETURN_2_SIZE ||
                    self.payload.len() <= ONION_SEND_BASE - PUBLICKEYBYTES,
                |buf| gen_error(buf, 0)
            ) >>
            gen_be_u8!(PacketKind::OnionRequest2 as u8) >>
            gen_slice!(self.nonce.as_ref()) >>
            gen_slice!(self.temporary_pk.as_bytes()) >>
            gen_slice!(self.payload.as_slice()) >>
            gen_call!(|buf, onion_return| OnionReturn::to_bytes(onion_return, buf), &self.onion_return) >>
            gen_len_limit(ONION_MAX_PACKET_SIZE)
        )
    }
}

impl OnionRequest2 {
    /// Decrypt the layer intended for the third node.
    pub fn get_payload(&self, shared_secret: &SalsaBox) -> Result<OnionRequest2Payload, GetPayloadError> {
        open_layer(shared_secret, &self.nonce, &self.payload)
    }
}

/** Decrypted layer of `OnionRequest2`. The third node sends `inner` to the
destination at `ip_port` as is.

Serialized form:

Length   | Content
-------- | ------
`19`     | UDP `IpPort` of the destination
variable | Announce or data request

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OnionRequest2Payload {
    /// Address of the destination
    pub ip_port: IpPort,
    /// Request for the destination, starts with its packet kind
    pub inner: Vec<u8>
}

impl FromBytes for OnionRequest2Payload {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, ip_port) = IpPort::from_udp_bytes(input)?;
        let (input, inner) = inner_onion_request(input)?;
        Ok((input, OnionRequest2Payload {
            ip_port,
            inner: inner.to_vec()
        }))
    }
}

impl ToBytes for OnionRequest2Payload {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_cond!(!self.ip_port.is_udp(), |buf| gen_error(buf, 0)) >>
            gen_call!(|buf, ip_port| IpPort::to_bytes(ip_port, buf), &self.ip_port) >>
            gen_slice!(self.inner.as_slice())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::thread_rng;

    fn onion_return() -> OnionReturn {
        OnionReturn {
            nonce: [42; NONCEBYTES],
            payload: vec![42; ONION_RETURN_2_SIZE - NONCEBYTES]
        }
    }

    fn payload(kind: PacketKind) -> OnionRequest2Payload {
        OnionRequest2Payload {
            ip_port: IpPort::from_udp_saddr("5.6.7.8:12345".parse().unwrap()),
            inner: vec![kind as u8, 42, 42]
        }
    }

    encode_decode_test!(
        onion_request_2_encode_decode,
        OnionRequest2 {
            nonce: [42; NONCEBYTES],
            temporary_pk: SecretKey::generate(&mut thread_rng()).public_key(),
            payload: vec![42; ONION_SEND_BASE],
            onion_return: onion_return()
        }
    );

    encode_decode_test!(
        onion_request_2_payload_encode_decode,
        payload(PacketKind::OnionDataRequest)
    );

    #[test]
    fn onion_request_2_splits_onion_return() {
        let mut bytes = vec![PacketKind::OnionRequest2 as u8];
        bytes.resize(1 + ONION_SEND_3, 42);
        assert!(OnionRequest2::from_bytes(&bytes).is_err());

        bytes.push(43);
        let (_, packet) = OnionRequest2::from_bytes(&bytes).unwrap();
        assert_eq!(packet.payload.len(), ONION_SEND_BASE - PUBLICKEYBYTES + 1);
        assert_eq!(packet.onion_return.payload.len() + NONCEBYTES, ONION_RETURN_2_SIZE);
        assert_eq!(packet.onion_return.payload.last(), Some(&43));
    }

    #[test]
    fn onion_request_2_payload_accepts_requests_only() {
        let mut buf = [0; ONION_MAX_PACKET_SIZE];
        for kind in [
            PacketKind::AnnounceRequest,
            PacketKind::AnnounceRequestOld,
            PacketKind::OnionDataRequest,
        ] {
            let (_, size) = payload(kind).to_bytes((&mut buf, 0)).unwrap();
            assert!(OnionRequest2Payload::from_bytes(&buf[..size]).is_ok(), "{:?}", kind);
        }
        for kind in [PacketKind::AnnounceResponse, PacketKind::OnionResponse3, PacketKind::OnionRequest0] {
            let (_, size) = payload(kind).to_bytes((&mut buf, 0)).unwrap();
            assert!(OnionRequest2Payload::from_bytes(&buf[..size]).is_err(), "{:?}", kind);
        }
        // nothing to forward
        assert!(OnionRequest2Payload::from_bytes(&buf[..SIZE_IPPORT]).is_err());
    }

    #[test]
    fn onion_request_2_get_payload() {
        let mut rng = thread_rng();
        let temporary_sk = SecretKey::generate(&mut rng);
        let node_sk = SecretKey::generate(&mut rng);
        let payload = payload(PacketKind::AnnounceRequest);
        let (nonce, encrypted) = seal_layer(&SalsaBox::new(&node_sk.public_key(), &temporary_sk), &payload);
        let packet = OnionRequest2 {
            nonce,
            temporary_pk: temporary_sk.public_key(),
            payload: encrypted,
            onion_return: onion_return()
        };

        assert_eq!(packet.get_payload(&SalsaBox::new(&packet.temporary_pk, &node_sk)).unwrap(), payload);
    }
}
