/*! Onion UDP Packets
*/

mod onion_request_0;
mod onion_request_1;
mod onion_request_2;
mod onion_exit_request;
mod onion_response_1;
mod onion_response_2;
mod onion_response_3;

pub use self::onion_request_0::*;
pub use self::onion_request_1::*;
pub use self::onion_request_2::*;
pub use self::onion_exit_request::*;
pub use self::onion_response_1::*;
pub use self::onion_response_2::*;
pub use self::onion_response_3::*;

use onion_binary_io::*;
use onion_crypto::*;
use crate::errors::*;
use crate::ip_port::*;
use crate::packet_kind::PacketKind;

use crypto_box::SalsaBox;
use rand::{CryptoRng, Rng};
use xsalsa20poly1305::XSalsa20Poly1305;
use xsalsa20poly1305::aead::{Aead, AeadCore};
use nom::bytes::complete::{tag, take};
use nom::combinator::{cond, eof, rest, rest_len, verify};

/// The maximum size of onion packet including public key, nonce, packet kind
/// byte, onion return.
pub const ONION_MAX_PACKET_SIZE: usize = 1400;

/// Size of first `OnionReturn` struct with no inner `OnionReturn`s.
pub const ONION_RETURN_1_SIZE: usize = NONCEBYTES + SIZE_IPPORT + MACBYTES; // 59
/// Size of second `OnionReturn` struct with one inner `OnionReturn`.
pub const ONION_RETURN_2_SIZE: usize = NONCEBYTES + SIZE_IPPORT + MACBYTES + ONION_RETURN_1_SIZE; // 118
/// Size of third `OnionReturn` struct with two inner `OnionReturn`s.
pub const ONION_RETURN_3_SIZE: usize = NONCEBYTES + SIZE_IPPORT + MACBYTES + ONION_RETURN_2_SIZE; // 177

/// Overhead of one onion layer: next `IpPort`, next `PublicKey` and MAC.
pub const ONION_SEND_BASE: usize = PUBLICKEYBYTES + SIZE_IPPORT + MACBYTES; // 67
/// Overhead of `OnionRequest2` packet without packet kind byte.
pub const ONION_SEND_3: usize = NONCEBYTES + ONION_SEND_BASE + ONION_RETURN_2_SIZE; // 209
/// Overhead of `OnionRequest1` packet without packet kind byte.
pub const ONION_SEND_2: usize = NONCEBYTES + ONION_SEND_BASE * 2 + ONION_RETURN_1_SIZE; // 217
/// Overhead of `OnionRequest0` packet without packet kind byte.
pub const ONION_SEND_1: usize = NONCEBYTES + ONION_SEND_BASE * 3; // 225

/// Maximum size of data that can be sent through an onion path.
pub const ONION_MAX_DATA_SIZE: usize = ONION_MAX_PACKET_SIZE - (ONION_SEND_1 + 1); // 1 is for packet_id
/// Maximum size of data that can be sent back through an onion path.
pub const ONION_RESPONSE_MAX_DATA_SIZE: usize = ONION_MAX_PACKET_SIZE - (1 + ONION_RETURN_3_SIZE); // 1 is for packet_id

/// Parse the rest of input as a request that the third node may forward to
/// the destination.
fn inner_onion_request(input: &[u8]) -> IResult<&[u8], &[u8]> {
    verify(rest, |inner: &[u8]| inner.first()
        .and_then(|&kind| PacketKind::from_u8(kind))
        .map_or(false, PacketKind::is_onion_request)
    )(input)
}

/// Parse the rest of input as a response that may be sent back through onion
/// path.
fn inner_onion_response(input: &[u8]) -> IResult<&[u8], &[u8]> {
    verify(rest, |inner: &[u8]| inner.first()
        .and_then(|&kind| PacketKind::from_u8(kind))
        .map_or(false, PacketKind::is_onion_response)
    )(input)
}

/// Decrypt onion layer with the key shared with the node that sent it and
/// parse it as `P`.
fn open_layer<P: FromBytes>(shared_secret: &SalsaBox, nonce: &Nonce, payload: &[u8]) -> Result<P, GetPayloadError> {
    let decrypted = shared_secret.decrypt(nonce.into(), payload)
        .map_err(|_| GetPayloadError::decrypt())?;
    let layer = match P::from_bytes(&decrypted) {
        Err(error) => Err(GetPayloadError::deserialize(error, decrypted.clone())),
        Ok((_, layer)) => Ok(layer),
    };
    layer
}

/// Split the rest of input into encrypted layer and `OnionReturn` of
/// `return_size` bytes at the end.
fn layer_with_return(return_size: usize) -> impl Fn(&[u8]) -> IResult<&[u8], (&[u8], OnionReturn)> {
    move |input| {
        let (input, len) = verify(rest_len, |len| *len > return_size)(input)?;
        let (input, layer) = take(len - return_size)(input)?;
        let (input, onion_return) = OnionReturn::from_bytes(input)?;
        Ok((input, (layer, onion_return)))
    }
}

/// Encrypt onion layer the way the previous node does it.
#[cfg(test)]
fn seal_bytes(shared_secret: &SalsaBox, layer: &[u8]) -> (Nonce, Vec<u8>) {
    let nonce = SalsaBox::generate_nonce(&mut rand::thread_rng());
    (nonce.into(), shared_secret.encrypt(&nonce, layer).unwrap())
}

#[cfg(test)]
fn seal_layer<P: ToBytes>(shared_secret: &SalsaBox, layer: &P) -> (Nonce, Vec<u8>) {
    let mut buf = [0; ONION_MAX_PACKET_SIZE];
    let (_, size) = layer.to_bytes((&mut buf, 0)).unwrap();
    seal_bytes(shared_secret, &buf[..size])
}

/** Encrypted onion return addresses. Payload contains encrypted with symmetric
key `IpPort` and possibly inner `OnionReturn`.

When DHT node receives OnionRequest packet it appends `OnionReturn` to the end
of the next request packet it will send. So when DHT node receives OnionResponse
packet it will know where to send the next response packet by decrypting
`OnionReturn` from received packet. If node can't decrypt `OnionReturn` that
means that onion path is expired and packet should be dropped.

Serialized form:

Length                | Content
--------              | ------
`24`                  | `Nonce`
`35` or `94` or `153` | Payload

where payload is encrypted inner `OnionReturn`

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OnionReturn {
    /// Nonce for the current encrypted payload
    pub nonce: Nonce,
    /// Encrypted payload
    pub payload: Vec<u8>
}

impl FromBytes for OnionReturn {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, nonce) = Nonce::from_bytes(input)?;
        let (input, payload) = rest(input)?;
        Ok((input, OnionReturn { nonce, payload: payload.to_vec() }))
    }
}

impl ToBytes for OnionReturn {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_slice!(self.nonce.as_ref()) >>
            gen_slice!(self.payload.as_slice())
        )
    }
}

impl OnionReturn {
    fn inner_to_bytes<'a>(ip_port: &IpPort, inner: Option<&OnionReturn>, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_call!(|buf, ip_port| IpPort::to_bytes(ip_port, buf), ip_port) >>
            gen_call!(|buf, inner| match inner {
                Some(inner) => OnionReturn::to_bytes(inner, buf),
                None => Ok(buf)
            }, inner)
        )
    }

    fn inner_from_bytes(input: &[u8]) -> IResult<&[u8], (IpPort, Option<OnionReturn>)> {
        let (input, ip_port) = IpPort::from_bytes(input)?;
        let (input, rest_len) = rest_len(input)?;
        let (input, inner) = cond(rest_len > 0, OnionReturn::from_bytes)(input)?;
        let (input, _) = eof(input)?;
        Ok((input, (ip_port, inner)))
    }

    /// Create new `OnionReturn` object using symmetric key for encryption.
    pub fn new<R: Rng + CryptoRng>(rng: &mut R, symmetric_key: &XSalsa20Poly1305, ip_port: &IpPort, inner: Option<&OnionReturn>) -> Result<OnionReturn, EncryptPayloadError> {
        let nonce = XSalsa20Poly1305::generate_nonce(rng);
        let mut buf = [0; ONION_RETURN_2_SIZE + SIZE_IPPORT];
        let (_, size) = OnionReturn::inner_to_bytes(ip_port, inner, (&mut buf, 0))?;
        let payload = symmetric_key.encrypt(&nonce, &buf[..size])
            .map_err(|_| EncryptPayloadError::Encrypt)?;

        Ok(OnionReturn {
            nonce: nonce.into(),
            payload
        })
    }

    /** Decrypt payload with symmetric key and try to parse it as `IpPort` with possibly inner `OnionReturn`.

    Returns `Error` in case of failure:

    - fails to decrypt
    - fails to parse as `IpPort` with possibly inner `OnionReturn`
    */
    pub fn get_payload(&self, symmetric_key: &XSalsa20Poly1305) -> Result<(IpPort, Option<OnionReturn>), GetPayloadError> {
        let decrypted = symmetric_key.decrypt((&self.nonce).into(), self.payload.as_slice())
            .map_err(|_| GetPayloadError::decrypt())?;
        match OnionReturn::inner_from_bytes(&decrypted) {
            Err(error) => {
                Err(GetPayloadError::deserialize(error, decrypted.clone()))
            },
            Ok((_, inner)) => {
                Ok(inner)
            }
        }
    }
}
