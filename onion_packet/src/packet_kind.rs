/*! Packet kinds that are relevant for the onion layer.
*/

use nom::combinator::map_opt;
use nom::number::complete::le_u8;

use onion_binary_io::*;

/** Leading byte of onion related packets.

`OnionRequest*` and `OnionResponse*` are relayed by the onion layer itself.
Announce and data packets are carried inside them: relays only look at their
first byte to make sure that the destination gets a packet it can handle.
*/
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PacketKind {
    /// Request sent by the path creator to the first node.
    OnionRequest0       = 0x80,
    /// Request sent by the first node to the second node.
    OnionRequest1       = 0x81,
    /// Request sent by the second node to the third node.
    OnionRequest2       = 0x82,
    /// Announce request of the previous protocol version.
    AnnounceRequestOld  = 0x83,
    /// Announce response of the previous protocol version.
    AnnounceResponseOld = 0x84,
    /// Data request for the announced node.
    OnionDataRequest    = 0x85,
    /// Data response delivered to the path creator.
    OnionDataResponse   = 0x86,
    /// Announce request.
    AnnounceRequest     = 0x87,
    /// Announce response.
    AnnounceResponse    = 0x88,
    /// Response sent by the destination to the third node.
    OnionResponse3      = 0x8c,
    /// Response sent by the third node to the second node.
    OnionResponse2      = 0x8d,
    /// Response sent by the second node to the first node.
    OnionResponse1      = 0x8e,
}

impl PacketKind {
    /// Convert a byte to `PacketKind` if it's known.
    pub fn from_u8(kind: u8) -> Option<PacketKind> {
        match kind {
            0x80 => Some(PacketKind::OnionRequest0),
            0x81 => Some(PacketKind::OnionRequest1),
            0x82 => Some(PacketKind::OnionRequest2),
            0x83 => Some(PacketKind::AnnounceRequestOld),
            0x84 => Some(PacketKind::AnnounceResponseOld),
            0x85 => Some(PacketKind::OnionDataRequest),
            0x86 => Some(PacketKind::OnionDataResponse),
            0x87 => Some(PacketKind::AnnounceRequest),
            0x88 => Some(PacketKind::AnnounceResponse),
            0x8c => Some(PacketKind::OnionResponse3),
            0x8d => Some(PacketKind::OnionResponse2),
            0x8e => Some(PacketKind::OnionResponse1),
            _ => None,
        }
    }

    /// Whether the third node is allowed to forward this packet to the
    /// destination.
    pub fn is_onion_request(self) -> bool {
        matches!(self,
            PacketKind::AnnounceRequest |
            PacketKind::AnnounceRequestOld |
            PacketKind::OnionDataRequest
        )
    }

    /// Whether the destination is allowed to send this packet back through
    /// onion path.
    pub fn is_onion_response(self) -> bool {
        matches!(self,
            PacketKind::AnnounceResponse |
            PacketKind::AnnounceResponseOld |
            PacketKind::OnionDataResponse
        )
    }
}

impl FromBytes for PacketKind {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        map_opt(le_u8, PacketKind::from_u8)(input)
    }
}

impl ToBytes for PacketKind {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        gen_be_u8!(buf, *self as u8)
    }
}
